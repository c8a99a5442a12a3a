//! Playback session actor.
//!
//! A [`PlaybackHandle`] owns a background task that drives a
//! [`PlaybackController`]. Commands arrive over an mpsc channel. Source
//! probing runs in its own task under a child token, so a newer load or
//! shutdown cancels it; its outcome comes back over a second channel tagged
//! with the load generation. Delayed source assignment is a deadline polled
//! alongside both channels.

use super::controller::PlaybackController;
use super::media::{MediaElement, MediaEvent};
use super::state::PlaybackState;
use crate::config::PlaybackConfig;
use crate::error::{CoreError, Result};
use crate::probe::{resolve_source, SourceProbe};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

enum PlaybackCommand {
    Load { filename: String },
    Media(MediaEvent),
    Retry,
    SetVolume(f64),
    ToggleMute,
}

struct PendingAssign {
    path: String,
    deadline: Instant,
}

/// Result of probing for one load
struct ProbeOutcome {
    generation: u64,
    path: Option<String>,
}

struct PlaybackSession<E: MediaElement> {
    controller: PlaybackController<E>,
    probe: Arc<dyn SourceProbe>,
    command_rx: mpsc::Receiver<PlaybackCommand>,
    outcome_tx: mpsc::Sender<ProbeOutcome>,
    outcome_rx: mpsc::Receiver<ProbeOutcome>,
    state: Arc<RwLock<PlaybackState>>,
    event_tx: broadcast::Sender<PlaybackState>,
    cancel_token: CancellationToken,
    generation: u64,
    probe_token: Option<CancellationToken>,
    pending: Option<PendingAssign>,
}

impl<E: MediaElement + 'static> PlaybackSession<E> {
    async fn run(mut self) {
        info!("Playback session started");

        loop {
            let deadline = self.pending.as_ref().map(|p| p.deadline);

            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    info!("Playback session shutting down");
                    break;
                }
                command = self.command_rx.recv() => {
                    let Some(command) = command else {
                        debug!("All playback handles dropped");
                        break;
                    };
                    self.handle(command);
                    self.publish().await;
                }
                Some(outcome) = self.outcome_rx.recv() => {
                    self.probed(outcome);
                    self.publish().await;
                }
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some(pending) = self.pending.take() {
                        self.controller.assign(&pending.path);
                        self.publish().await;
                    }
                }
            }
        }

        self.cancel_probe();
    }

    fn handle(&mut self, command: PlaybackCommand) {
        match command {
            PlaybackCommand::Load { filename } => self.load(filename),
            PlaybackCommand::Media(event) => {
                if matches!(event, MediaEvent::Error { .. }) {
                    self.pending = None;
                }
                self.controller.handle_media(event);
            }
            PlaybackCommand::Retry => {
                if let Some(path) = self.controller.begin_retry() {
                    self.schedule(path, self.controller.config().retry_delay());
                }
            }
            PlaybackCommand::SetVolume(level) => {
                self.controller.set_volume(level);
            }
            PlaybackCommand::ToggleMute => {
                let muted = self.controller.toggle_mute();
                debug!("Muted: {}", muted);
            }
        }
    }

    fn load(&mut self, filename: String) {
        self.pending = None;
        self.cancel_probe();
        self.generation += 1;
        self.controller.begin(&filename);

        let token = self.cancel_token.child_token();
        self.probe_token = Some(token.clone());

        let probe = self.probe.clone();
        let prefixes = self.controller.config().source_prefixes.clone();
        let outcome_tx = self.outcome_tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            let path = tokio::select! {
                () = token.cancelled() => {
                    debug!("Probing for {} cancelled", filename);
                    return;
                }
                path = resolve_source(probe.as_ref(), &prefixes, &filename) => path,
            };
            let _ = outcome_tx.send(ProbeOutcome { generation, path }).await;
        });
    }

    fn probed(&mut self, outcome: ProbeOutcome) {
        if outcome.generation != self.generation {
            debug!("Dropping probe result of a superseded load");
            return;
        }
        self.probe_token = None;

        if let Some(path) = outcome.path {
            self.controller.source_resolved(&path);
            self.schedule(path, self.controller.config().assign_delay());
        } else {
            self.controller.source_missing();
        }
    }

    fn cancel_probe(&mut self) {
        if let Some(token) = self.probe_token.take() {
            token.cancel();
        }
    }

    fn schedule(&mut self, path: String, delay: std::time::Duration) {
        self.pending = Some(PendingAssign {
            path,
            deadline: Instant::now() + delay,
        });
    }

    async fn publish(&mut self) {
        let snapshot = self.controller.state().clone();
        let mut state = self.state.write().await;
        if *state != snapshot {
            *state = snapshot.clone();
            let _ = self.event_tx.send(snapshot);
        }
    }
}

/// Handle to a running playback session.
///
/// Dropping the handle stops the session and releases the element.
pub struct PlaybackHandle {
    command_tx: mpsc::Sender<PlaybackCommand>,
    state: Arc<RwLock<PlaybackState>>,
    event_tx: broadcast::Sender<PlaybackState>,
    cancel_token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PlaybackHandle {
    /// Spawn a session driving `element`
    ///
    /// # Arguments
    /// * `element` - Media element to drive
    /// * `probe` - Existence probe used before assigning a source
    /// * `config` - Candidate prefixes and timing
    /// * `cancel_token` - Optional parent token for graceful shutdown
    pub fn spawn<E: MediaElement + 'static>(
        element: E,
        probe: Arc<dyn SourceProbe>,
        config: PlaybackConfig,
        cancel_token: Option<CancellationToken>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (outcome_tx, outcome_rx) = mpsc::channel(4);
        let (event_tx, _) = broadcast::channel(32);
        let state = Arc::new(RwLock::new(PlaybackState::default()));
        let cancel_token = cancel_token.map_or_else(CancellationToken::new, |t| t.child_token());

        let session = PlaybackSession {
            controller: PlaybackController::new(element, config),
            probe,
            command_rx,
            outcome_tx,
            outcome_rx,
            state: state.clone(),
            event_tx: event_tx.clone(),
            cancel_token: cancel_token.clone(),
            generation: 0,
            probe_token: None,
            pending: None,
        };
        let task = tokio::spawn(session.run());

        Self {
            command_tx,
            state,
            event_tx,
            cancel_token,
            task: Some(task),
        }
    }

    async fn send(&self, command: PlaybackCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| CoreError::SessionClosed)
    }

    /// Probe for `filename` and load the first path that exists.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SessionClosed`] if the session has stopped.
    pub async fn load(&self, filename: impl Into<String>) -> Result<()> {
        self.send(PlaybackCommand::Load {
            filename: filename.into(),
        })
        .await
    }

    /// Forward a lifecycle signal from the element.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SessionClosed`] if the session has stopped.
    pub async fn media_event(&self, event: MediaEvent) -> Result<()> {
        self.send(PlaybackCommand::Media(event)).await
    }

    /// Retry after an error. Ignored in any other status.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SessionClosed`] if the session has stopped.
    pub async fn retry(&self) -> Result<()> {
        self.send(PlaybackCommand::Retry).await
    }

    /// # Errors
    ///
    /// Returns [`CoreError::SessionClosed`] if the session has stopped.
    pub async fn set_volume(&self, level: f64) -> Result<()> {
        self.send(PlaybackCommand::SetVolume(level)).await
    }

    /// # Errors
    ///
    /// Returns [`CoreError::SessionClosed`] if the session has stopped.
    pub async fn toggle_mute(&self) -> Result<()> {
        self.send(PlaybackCommand::ToggleMute).await
    }

    /// Get the latest published state
    pub async fn state(&self) -> PlaybackState {
        self.state.read().await.clone()
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackState> {
        self.event_tx.subscribe()
    }

    /// Stop the session and wait for it to release the element.
    pub async fn close(mut self) {
        self.cancel_token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::controller::tests::{Call, MockElement};
    use crate::playback::state::{PlaybackFailure, PlaybackStatus};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::sleep;

    struct StaticProbe {
        existing: Vec<String>,
        probed: Mutex<Vec<String>>,
    }

    impl StaticProbe {
        fn new(existing: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                existing: existing.iter().map(ToString::to_string).collect(),
                probed: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl SourceProbe for StaticProbe {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn exists(&self, path: &str) -> Result<bool> {
            self.probed.lock().unwrap().push(path.to_string());
            Ok(self.existing.iter().any(|p| p == path))
        }
    }

    /// Reports every path as existing, taking `delay` for paths under `slow_file`
    struct DelayedProbe {
        slow_file: &'static str,
        delay: Duration,
    }

    #[async_trait]
    impl SourceProbe for DelayedProbe {
        fn name(&self) -> &'static str {
            "delayed"
        }

        async fn exists(&self, path: &str) -> Result<bool> {
            if path.ends_with(self.slow_file) {
                sleep(self.delay).await;
            }
            Ok(true)
        }
    }

    fn slow_probe(slow_file: &'static str) -> Arc<DelayedProbe> {
        Arc::new(DelayedProbe {
            slow_file,
            delay: Duration::from_secs(30),
        })
    }

    fn element_error() -> MediaEvent {
        MediaEvent::Error {
            code: Some(3),
            message: Some("decode".to_string()),
        }
    }

    async fn settle() {
        sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_assigns_after_delay() {
        let element = MockElement::default();
        let handle = PlaybackHandle::spawn(
            element.clone(),
            StaticProbe::new(&["./videos/a.mp4"]),
            PlaybackConfig::default(),
            None,
        );

        handle.load("a.mp4").await.unwrap();
        settle().await;
        assert_eq!(handle.state().await.status, PlaybackStatus::Idle);
        assert!(element.calls().is_empty());

        sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.state().await.status, PlaybackStatus::Loading);
        assert_eq!(
            element.calls(),
            [Call::SetSrc("./videos/a.mp4".to_string()), Call::Load]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_then_retry_reassigns() {
        let element = MockElement::default();
        let handle = PlaybackHandle::spawn(
            element.clone(),
            StaticProbe::new(&["/videos/a.mp4"]),
            PlaybackConfig::default(),
            None,
        );
        handle.load("a.mp4").await.unwrap();
        sleep(Duration::from_millis(150)).await;
        handle.media_event(MediaEvent::LoadStart).await.unwrap();
        settle().await;
        assert_eq!(handle.state().await.status, PlaybackStatus::Loading);

        handle.media_event(element_error()).await.unwrap();
        settle().await;
        let state = handle.state().await;
        assert!(matches!(
            state.status,
            PlaybackStatus::Error(PlaybackFailure::ElementReported { .. })
        ));
        assert!(state.loading_progress.abs() < f64::EPSILON);

        handle.retry().await.unwrap();
        settle().await;
        assert_eq!(handle.state().await.status, PlaybackStatus::Loading);

        sleep(Duration::from_millis(100)).await;
        let calls = element.calls();
        assert_eq!(
            calls[calls.len() - 4..],
            [
                Call::SetSrc(String::new()),
                Call::Load,
                Call::SetSrc("/videos/a.mp4".to_string()),
                Call::Load,
            ]
        );
        assert_eq!(handle.state().await.status, PlaybackStatus::Loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_source_never_loads() {
        let element = MockElement::default();
        let probe = StaticProbe::new(&[]);
        let handle = PlaybackHandle::spawn(
            element.clone(),
            probe.clone(),
            PlaybackConfig::default(),
            None,
        );
        let mut rx = handle.subscribe();

        handle.load("gone.mp4").await.unwrap();
        sleep(Duration::from_millis(500)).await;

        let failure = PlaybackFailure::SourceNotFound {
            filename: "gone.mp4".to_string(),
        };
        assert_eq!(handle.state().await.status, PlaybackStatus::Error(failure.clone()));
        assert!(failure.user_message().contains("not found"));
        assert!(element.calls().is_empty());
        assert_eq!(probe.probed.lock().unwrap().len(), 3);

        while let Ok(published) = rx.try_recv() {
            assert_ne!(published.status, PlaybackStatus::CanPlay);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_buffering_progress_reported() {
        let handle = PlaybackHandle::spawn(
            MockElement::default(),
            StaticProbe::new(&["/videos/a.mp4"]),
            PlaybackConfig::default(),
            None,
        );
        handle.load("a.mp4").await.unwrap();
        sleep(Duration::from_millis(150)).await;

        for event in [
            MediaEvent::CanPlay,
            MediaEvent::Playing,
            MediaEvent::Waiting,
            MediaEvent::Progress {
                buffered_end: 30.0,
                duration: 60.0,
            },
        ] {
            handle.media_event(event).await.unwrap();
        }
        settle().await;

        let state = handle.state().await;
        assert_eq!(state.status, PlaybackStatus::Buffering);
        assert!((state.loading_progress - 50.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_load_cancels_pending_assignment() {
        let element = MockElement::default();
        let handle = PlaybackHandle::spawn(
            element.clone(),
            StaticProbe::new(&["/videos/a.mp4", "/videos/b.mp4"]),
            PlaybackConfig::default(),
            None,
        );

        handle.load("a.mp4").await.unwrap();
        sleep(Duration::from_millis(50)).await;
        handle.load("b.mp4").await.unwrap();
        sleep(Duration::from_millis(200)).await;

        assert_eq!(
            element.calls(),
            [Call::SetSrc("/videos/b.mp4".to_string()), Call::Load]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_does_not_wait_for_source_lookup() {
        let element = MockElement::default();
        let handle = PlaybackHandle::spawn(
            element.clone(),
            slow_probe("a.mp4"),
            PlaybackConfig::default(),
            None,
        );
        handle.load("a.mp4").await.unwrap();
        settle().await;

        let closed = tokio::time::timeout(Duration::from_secs(1), handle.close()).await;
        assert!(closed.is_ok(), "close waited for the source lookup");
        assert!(element.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_load_supersedes_slow_lookup() {
        let element = MockElement::default();
        let handle = PlaybackHandle::spawn(
            element.clone(),
            slow_probe("a.mp4"),
            PlaybackConfig::default(),
            None,
        );

        handle.load("a.mp4").await.unwrap();
        settle().await;
        handle.load("b.mp4").await.unwrap();
        sleep(Duration::from_millis(150)).await;

        assert_eq!(handle.state().await.status, PlaybackStatus::Loading);
        assert_eq!(
            element.calls(),
            [Call::SetSrc("/videos/b.mp4".to_string()), Call::Load]
        );

        sleep(Duration::from_secs(120)).await;
        assert_eq!(element.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_session_rejects_commands() {
        let parent = CancellationToken::new();
        let handle = PlaybackHandle::spawn(
            MockElement::default(),
            StaticProbe::new(&[]),
            PlaybackConfig::default(),
            Some(parent.clone()),
        );
        parent.cancel();
        settle().await;

        let err = handle.load("a.mp4").await.unwrap_err();
        assert!(matches!(err, CoreError::SessionClosed));
        handle.close().await;
    }
}
