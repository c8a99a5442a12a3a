//! Playback controller for one media element.
//!
//! The controller owns the element and the [`PlaybackState`] and keeps the
//! two consistent. It never waits: probing and delayed source assignment are
//! driven by [`super::session`].

use super::media::{MediaDiagnostics, MediaElement, MediaEvent};
use super::state::{PlaybackEvent, PlaybackState, PlaybackStatus};
use crate::config::PlaybackConfig;
use crate::probe::candidate_paths;
use tracing::{debug, error, info, warn};

pub struct PlaybackController<E: MediaElement> {
    element: E,
    config: PlaybackConfig,
    state: PlaybackState,
    /// Video filename of the current mount
    filename: Option<String>,
    /// Path that last passed the existence probe
    resolved: Option<String>,
}

impl<E: MediaElement> PlaybackController<E> {
    #[must_use]
    pub fn new(element: E, config: PlaybackConfig) -> Self {
        Self {
            element,
            config,
            state: PlaybackState::default(),
            filename: None,
            resolved: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &PlaybackState {
        &self.state
    }

    #[must_use]
    pub const fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    #[must_use]
    pub const fn element(&self) -> &E {
        &self.element
    }

    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    fn transition(&mut self, event: PlaybackEvent) {
        let next = self
            .state
            .clone()
            .apply(event, self.config.buffering_floor);
        if next.status != self.state.status {
            debug!("Playback status {:?} -> {:?}", self.state.status, next.status);
        }
        self.state = next;
    }

    /// Start over for a new video. The state goes back to idle until a source
    /// is assigned.
    pub fn begin(&mut self, filename: &str) {
        info!("Loading video {}", filename);
        self.filename = Some(filename.to_string());
        self.resolved = None;
        self.transition(PlaybackEvent::Reset);
    }

    /// Record the path that passed the existence probe
    pub fn source_resolved(&mut self, path: &str) {
        self.resolved = Some(path.to_string());
    }

    /// No candidate path exists; fail without touching the element.
    pub fn source_missing(&mut self) {
        let filename = self.filename.clone().unwrap_or_default();
        error!("Video file not found: {}", filename);
        self.transition(PlaybackEvent::SourceMissing { filename });
    }

    /// Hand `path` to the element and start loading it.
    pub fn assign(&mut self, path: &str) {
        if self.state.status.is_error() {
            warn!("Not assigning {} while in error state", path);
            return;
        }
        debug!("Assigning source {}", path);
        self.element.set_src(path);
        self.element.load();
        self.transition(PlaybackEvent::SourceAssigned);
    }

    /// Apply a lifecycle signal from the element
    pub fn handle_media(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::Error { code, message } => {
                let diagnostics = MediaDiagnostics {
                    error_code: code,
                    message,
                    ..self.element.diagnostics()
                };
                error!("Video loading error: {}", diagnostics);
                self.transition(PlaybackEvent::ElementFailed { diagnostics });
            }
            MediaEvent::LoadedMetadata if self.state.status.is_active() => {
                self.element.set_volume(self.config.default_volume);
                self.transition(PlaybackEvent::Media(MediaEvent::LoadedMetadata));
            }
            event => self.transition(PlaybackEvent::Media(event)),
        }
    }

    /// Leave the error state: detach the source and force a reload.
    ///
    /// Returns the path to reassign once the retry delay has elapsed, or
    /// `None` when there is nothing to retry.
    pub fn begin_retry(&mut self) -> Option<String> {
        if !self.state.status.is_error() {
            debug!("Retry ignored in status {:?}", self.state.status);
            return None;
        }
        let path = self.retry_path()?;

        info!("Retrying video load with {}", path);
        self.element.set_src("");
        self.element.load();
        self.transition(PlaybackEvent::Retry);
        Some(path)
    }

    /// The last resolved path, else the first candidate for the filename
    fn retry_path(&self) -> Option<String> {
        if let Some(path) = &self.resolved {
            return Some(path.clone());
        }
        let filename = self.filename.as_deref()?;
        candidate_paths(&self.config.source_prefixes, filename).next()
    }

    /// Set the element volume. Levels outside `0.0..=1.0` are rejected.
    pub fn set_volume(&mut self, level: f64) -> bool {
        if !(0.0..=1.0).contains(&level) {
            warn!("Ignoring out-of-range volume {}", level);
            return false;
        }
        self.element.set_volume(level);
        true
    }

    /// Flip the muted flag and return the new value
    pub fn toggle_mute(&mut self) -> bool {
        let muted = !self.element.muted();
        self.element.set_muted(muted);
        muted
    }

    #[must_use]
    pub fn status(&self) -> &PlaybackStatus {
        &self.state.status
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::playback::state::PlaybackFailure;
    use std::sync::{Arc, Mutex};

    /// Element calls recorded by [`MockElement`]
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Call {
        SetSrc(String),
        Load,
        SetVolume(f64),
        SetMuted(bool),
    }

    #[derive(Clone, Default)]
    pub(crate) struct MockElement {
        pub(crate) calls: Arc<Mutex<Vec<Call>>>,
        pub(crate) ready_state: u8,
        src: String,
        volume: f64,
        muted: bool,
    }

    impl MockElement {
        pub(crate) fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl MediaElement for MockElement {
        fn set_src(&mut self, src: &str) {
            self.src = src.to_string();
            self.calls.lock().unwrap().push(Call::SetSrc(src.to_string()));
        }

        fn src(&self) -> String {
            self.src.clone()
        }

        fn load(&mut self) {
            self.calls.lock().unwrap().push(Call::Load);
        }

        fn set_volume(&mut self, volume: f64) {
            self.volume = volume;
            self.calls.lock().unwrap().push(Call::SetVolume(volume));
        }

        fn volume(&self) -> f64 {
            self.volume
        }

        fn set_muted(&mut self, muted: bool) {
            self.muted = muted;
            self.calls.lock().unwrap().push(Call::SetMuted(muted));
        }

        fn muted(&self) -> bool {
            self.muted
        }

        fn ready_state(&self) -> u8 {
            self.ready_state
        }
    }

    fn controller() -> PlaybackController<MockElement> {
        PlaybackController::new(MockElement::default(), PlaybackConfig::default())
    }

    fn element_error() -> MediaEvent {
        MediaEvent::Error {
            code: Some(4),
            message: None,
        }
    }

    #[test]
    fn test_assign_loads_element() {
        let mut c = controller();
        c.begin("a.mp4");
        c.source_resolved("/videos/a.mp4");
        c.assign("/videos/a.mp4");

        assert_eq!(c.status(), &PlaybackStatus::Loading);
        assert_eq!(
            c.element().calls(),
            [Call::SetSrc("/videos/a.mp4".to_string()), Call::Load]
        );
    }

    #[test]
    fn test_metadata_applies_default_volume() {
        let mut c = controller();
        c.begin("a.mp4");
        c.assign("/videos/a.mp4");
        c.handle_media(MediaEvent::LoadedMetadata);

        assert!((c.element().volume() - 0.5).abs() < f64::EPSILON);
        assert!((c.state().loading_progress - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_retry_reuses_resolved_path() {
        let mut c = controller();
        c.begin("a.mp4");
        c.source_resolved("./videos/a.mp4");
        c.assign("./videos/a.mp4");
        c.handle_media(element_error());
        let PlaybackStatus::Error(PlaybackFailure::ElementReported { diagnostics }) = c.status()
        else {
            unreachable!("element error expected");
        };
        assert_eq!(diagnostics.error_code, Some(4));
        assert_eq!(diagnostics.current_src, "./videos/a.mp4");

        let path = c.begin_retry();
        assert_eq!(path.as_deref(), Some("./videos/a.mp4"));
        assert_eq!(c.status(), &PlaybackStatus::Loading);
        assert!(c.element().src().is_empty());
    }

    #[test]
    fn test_error_captures_ready_state() {
        let element = MockElement {
            ready_state: 1,
            ..MockElement::default()
        };
        let mut c = PlaybackController::new(element, PlaybackConfig::default());
        c.begin("a.mp4");
        c.assign("/videos/a.mp4");
        c.handle_media(MediaEvent::Error {
            code: Some(2),
            message: Some("network".to_string()),
        });

        let PlaybackStatus::Error(PlaybackFailure::ElementReported { diagnostics }) = c.status()
        else {
            unreachable!("element error expected");
        };
        assert_eq!(diagnostics.ready_state, 1);
        assert_eq!(diagnostics.message.as_deref(), Some("network"));
        assert!(diagnostics.to_string().contains("ready_state=1"));
    }

    #[test]
    fn test_retry_after_missing_source_uses_first_candidate() {
        let mut c = controller();
        c.begin("a.mp4");
        c.source_missing();
        assert!(matches!(
            c.status(),
            PlaybackStatus::Error(PlaybackFailure::SourceNotFound { .. })
        ));
        assert!(c.element().calls().is_empty());

        assert_eq!(c.begin_retry().as_deref(), Some("/videos/a.mp4"));
    }

    #[test]
    fn test_retry_outside_error_is_noop() {
        let mut c = controller();
        c.begin("a.mp4");
        c.assign("/videos/a.mp4");
        assert_eq!(c.begin_retry(), None);
        assert_eq!(c.status(), &PlaybackStatus::Loading);
    }

    #[test]
    fn test_volume_controls() {
        let mut c = controller();
        assert!(c.set_volume(0.8));
        assert!(!c.set_volume(1.5));
        assert!(!c.set_volume(-0.1));
        assert!((c.element().volume() - 0.8).abs() < f64::EPSILON);

        assert!(c.toggle_mute());
        assert!(!c.toggle_mute());
    }
}
