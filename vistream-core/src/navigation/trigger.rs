//! Restarts the loading-bar simulation whenever the route identity changes.

use super::route::RouteLocation;
use super::router::Router;
use crate::loading_bar::LoadingBar;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Watches a [`Router`] and activates the [`LoadingBar`] on every route change
pub struct NavigationTrigger {
    loading_bar: Arc<LoadingBar>,
    router: Arc<dyn Router>,
    cancel_token: CancellationToken,
}

impl NavigationTrigger {
    /// Create a new navigation trigger
    ///
    /// # Arguments
    /// * `loading_bar` - Shared loading bar to activate
    /// * `router` - Router whose location is observed
    /// * `cancel_token` - Optional external cancellation token for graceful shutdown
    pub fn new(
        loading_bar: Arc<LoadingBar>,
        router: Arc<dyn Router>,
        cancel_token: Option<CancellationToken>,
    ) -> Self {
        Self {
            loading_bar,
            router,
            cancel_token: cancel_token.unwrap_or_default(),
        }
    }

    /// Get a clone of the cancellation token
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Start the trigger in a background task
    #[must_use]
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        // Subscribe first so a navigation racing with startup is not missed
        let mut rx = self.router.subscribe();
        let mut current = self.router.location().await;

        info!("Navigation trigger started at {}", current);
        self.loading_bar.activate().await;

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!("Navigation trigger shutting down");
                    break;
                }
                event = rx.recv() => {
                    match event {
                        Ok(location) => {
                            self.on_location(&mut current, location).await;
                        }
                        Err(RecvError::Closed) => {
                            info!("Router channel closed, stopping navigation trigger");
                            break;
                        }
                        Err(RecvError::Lagged(n)) => {
                            warn!("Missed {} route changes, resyncing with router", n);
                            let location = self.router.location().await;
                            self.on_location(&mut current, location).await;
                        }
                    }
                }
            }
        }
    }

    async fn on_location(&self, current: &mut RouteLocation, location: RouteLocation) {
        if *current == location {
            debug!("Route identity unchanged ({}), not restarting progress", location);
            return;
        }

        debug!("Route changed: {} -> {}", current, location);
        *current = location;
        self.loading_bar.activate().await;
    }
}
