//! Routing primitive and an in-memory history implementation.

use super::route::RouteLocation;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

/// Options for a single navigation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigateOptions {
    /// Replace the current history entry instead of pushing a new one
    pub replace: bool,
    /// Opaque state attached to the new history entry
    pub state: Option<String>,
}

impl NavigateOptions {
    #[must_use]
    pub fn replace() -> Self {
        Self {
            replace: true,
            state: None,
        }
    }

    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }
}

/// Trait for routers that expose the current location and can navigate.
///
/// Implementations broadcast the new location after every successful
/// navigation, even when the location did not change.
#[async_trait]
pub trait Router: Send + Sync {
    /// The current location.
    async fn location(&self) -> RouteLocation;

    /// Navigate to `to`, resolved against the current location.
    ///
    /// # Errors
    ///
    /// Returns an error if the target cannot be resolved or the navigation fails.
    async fn navigate(&self, to: &str, options: NavigateOptions) -> Result<()>;

    /// Subscribe to location changes.
    fn subscribe(&self) -> broadcast::Receiver<RouteLocation>;
}

#[derive(Debug, Clone)]
struct HistoryEntry {
    location: RouteLocation,
    state: Option<String>,
}

/// Router backed by an in-memory history stack
pub struct MemoryRouter {
    history: RwLock<Vec<HistoryEntry>>,
    event_tx: broadcast::Sender<RouteLocation>,
}

impl MemoryRouter {
    /// Create a router positioned at `initial`.
    ///
    /// # Errors
    ///
    /// Returns an error if `initial` is not an absolute path.
    pub fn new(initial: &str) -> Result<Arc<Self>> {
        Self::with_capacity(initial, 32)
    }

    /// Create a router whose location channel buffers `capacity` changes.
    ///
    /// # Errors
    ///
    /// Returns an error if `initial` is not an absolute path.
    pub fn with_capacity(initial: &str, capacity: usize) -> Result<Arc<Self>> {
        let (event_tx, _) = broadcast::channel(capacity);
        let location = RouteLocation::parse(initial)?;

        Ok(Arc::new(Self {
            history: RwLock::new(vec![HistoryEntry {
                location,
                state: None,
            }]),
            event_tx,
        }))
    }

    /// Pop the current entry. Returns `false` when already at the first entry.
    pub async fn back(&self) -> bool {
        let mut history = self.history.write().await;
        if history.len() <= 1 {
            return false;
        }
        history.pop();
        if let Some(entry) = history.last() {
            debug!("Navigated back to {}", entry.location);
            let _ = self.event_tx.send(entry.location.clone());
        }
        true
    }

    /// State attached to the current entry
    pub async fn current_state(&self) -> Option<String> {
        self.history
            .read()
            .await
            .last()
            .and_then(|entry| entry.state.clone())
    }

    /// Number of entries in the history stack
    pub async fn history_len(&self) -> usize {
        self.history.read().await.len()
    }
}

#[async_trait]
impl Router for MemoryRouter {
    async fn location(&self) -> RouteLocation {
        // The stack is never empty: `back` keeps the first entry
        self.history
            .read()
            .await
            .last()
            .map_or_else(root_location, |entry| entry.location.clone())
    }

    async fn navigate(&self, to: &str, options: NavigateOptions) -> Result<()> {
        let mut history = self.history.write().await;
        let current = history.last().map(|entry| entry.location.clone());
        let location = match current {
            Some(current) => current.resolve(to)?,
            None => RouteLocation::parse(to)?,
        };

        let entry = HistoryEntry {
            location: location.clone(),
            state: options.state,
        };
        if options.replace {
            history.pop();
        }
        history.push(entry);

        debug!(replace = options.replace, "Navigated to {}", location);
        let _ = self.event_tx.send(location);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<RouteLocation> {
        self.event_tx.subscribe()
    }
}

fn root_location() -> RouteLocation {
    RouteLocation {
        path: "/".to_string(),
        query: String::new(),
    }
}
