//! Navigation wrapped with immediate loading feedback.

use super::router::{NavigateOptions, Router};
use crate::config::NavigationConfig;
use crate::error::Result;
use crate::loading_bar::LoadingBar;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Shows the loading bar before handing a navigation to the [`Router`].
///
/// The bar is started at 0, then the navigation runs after a short delay so
/// the bar gets a chance to render first. The route change itself triggers
/// the simulated ramp through [`super::NavigationTrigger`].
pub struct NavigateWithLoading {
    loading_bar: Arc<LoadingBar>,
    router: Arc<dyn Router>,
    delay: Duration,
}

impl NavigateWithLoading {
    #[must_use]
    pub fn new(
        loading_bar: Arc<LoadingBar>,
        router: Arc<dyn Router>,
        config: &NavigationConfig,
    ) -> Self {
        Self {
            loading_bar,
            router,
            delay: config.pre_navigate_delay(),
        }
    }

    /// Start the bar, wait, then navigate to `to`.
    ///
    /// When the target resolves to the current route identity no route
    /// change follows, so the bar is finished here instead of left at 0.
    ///
    /// # Errors
    ///
    /// Returns whatever error the underlying router reports. The bar is left
    /// as started in that case.
    pub async fn navigate(&self, to: &str, options: NavigateOptions) -> Result<()> {
        self.loading_bar.start_loading().await;
        tokio::time::sleep(self.delay).await;

        let before = self.router.location().await;
        self.router.navigate(to, options).await?;

        if self.router.location().await == before {
            debug!("Navigation to '{}' kept route {}, finishing loading bar", to, before);
            self.loading_bar.finish_loading().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoadingBarConfig;
    use crate::error::CoreError;
    use crate::navigation::route::RouteLocation;
    use crate::navigation::router::MemoryRouter;
    use crate::progress::ProgressState;
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tokio::sync::broadcast;
    use tokio::time::{sleep, Instant};

    struct FailingRouter {
        tx: broadcast::Sender<RouteLocation>,
    }

    #[async_trait]
    impl Router for FailingRouter {
        async fn location(&self) -> RouteLocation {
            RouteLocation::parse("/").unwrap()
        }

        async fn navigate(&self, to: &str, _options: NavigateOptions) -> Result<()> {
            Err(CoreError::InvalidRoute {
                reason: format!("refusing '{to}'"),
            })
        }

        fn subscribe(&self) -> broadcast::Receiver<RouteLocation> {
            self.tx.subscribe()
        }
    }

    fn test_bar() -> Arc<LoadingBar> {
        LoadingBar::with_rng(LoadingBarConfig::default(), None, StdRng::seed_from_u64(5))
    }

    #[tokio::test(start_paused = true)]
    async fn test_bar_shows_before_navigation() {
        let bar = test_bar();
        let router = MemoryRouter::new("/").unwrap();
        let nav = Arc::new(NavigateWithLoading::new(
            bar.clone(),
            router.clone(),
            &NavigationConfig::default(),
        ));

        let started = Instant::now();
        let task = tokio::spawn({
            let nav = nav.clone();
            async move { nav.navigate("/watch/4", NavigateOptions::default()).await }
        });

        sleep(Duration::from_millis(10)).await;
        let state = bar.state().await;
        assert!(state.is_loading);
        assert!(state.progress.abs() < f64::EPSILON);
        assert_eq!(router.location().await.path, "/");

        task.await.unwrap().unwrap();
        assert!(Instant::now() - started >= Duration::from_millis(50));
        assert_eq!(router.location().await.path, "/watch/4");
    }

    #[tokio::test(start_paused = true)]
    async fn test_router_error_propagates() {
        let bar = test_bar();
        let (tx, _) = broadcast::channel(4);
        let nav = NavigateWithLoading::new(
            bar.clone(),
            Arc::new(FailingRouter { tx }),
            &NavigationConfig::default(),
        );

        let err = nav
            .navigate("/anywhere", NavigateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRoute { .. }));
        assert!(bar.state().await.is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_route_hides_bar() {
        let bar = test_bar();
        let router = MemoryRouter::new("/search?q=a").unwrap();
        let nav = NavigateWithLoading::new(bar.clone(), router, &NavigationConfig::default());

        nav.navigate("?q=a", NavigateOptions::replace()).await.unwrap();
        assert!((bar.state().await.progress - 100.0).abs() < f64::EPSILON);

        sleep(Duration::from_millis(250)).await;
        assert_eq!(bar.state().await, ProgressState::default());
    }
}
