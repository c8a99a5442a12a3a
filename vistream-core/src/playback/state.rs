//! Playback status of a single media element and its pure transition.

use super::media::{MediaDiagnostics, MediaEvent};
use std::fmt;

/// Progress milestones reported while a source loads
pub mod milestones {
    pub const LOAD_START: f64 = 10.0;
    pub const LOADED_METADATA: f64 = 30.0;
    pub const CAN_PLAY: f64 = 90.0;
    pub const LOADED_DATA: f64 = 100.0;
}

/// Why playback failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackFailure {
    /// No candidate path passed the existence probe
    SourceNotFound { filename: String },
    /// The media element raised an error while loading or playing
    ElementReported { diagnostics: MediaDiagnostics },
}

impl PlaybackFailure {
    /// Message shown to the viewer
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::SourceNotFound { filename } => {
                format!("Video file not found: {filename}. Please contact support.")
            }
            Self::ElementReported { .. } => {
                "The video could not be played. Try again.".to_string()
            }
        }
    }
}

impl fmt::Display for PlaybackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceNotFound { filename } => write!(f, "source not found: {filename}"),
            Self::ElementReported { diagnostics } => {
                write!(f, "media element error: {diagnostics}")
            }
        }
    }
}

/// Status of the media element
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Loading,
    CanPlay,
    Playing,
    Buffering,
    /// Terminal until an explicit retry
    Error(PlaybackFailure),
}

impl PlaybackStatus {
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Whether a source is attached and loading or playing
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Loading | Self::CanPlay | Self::Playing | Self::Buffering
        )
    }
}

/// Status plus the heuristic loading progress
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    /// Estimate in `0..=100`, derived from milestones and buffered ranges
    pub loading_progress: f64,
}

/// Inputs to [`PlaybackState::apply`]
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// A new video was requested; back to idle while it is probed
    Reset,
    /// A source path was handed to the element
    SourceAssigned,
    /// Probing found no candidate
    SourceMissing { filename: String },
    /// Lifecycle signal from the element
    Media(MediaEvent),
    /// The element failed, with diagnostics captured from it
    ElementFailed { diagnostics: MediaDiagnostics },
    /// Explicit retry out of the error state
    Retry,
}

impl PlaybackState {
    /// Compute the state that follows `event`.
    ///
    /// `buffering_floor` is the lowest progress reported once buffered
    /// ranges are known.
    #[must_use]
    pub fn apply(self, event: PlaybackEvent, buffering_floor: f64) -> Self {
        match event {
            PlaybackEvent::Reset => Self::default(),
            PlaybackEvent::SourceAssigned => {
                if self.status.is_error() {
                    return self;
                }
                Self {
                    status: PlaybackStatus::Loading,
                    loading_progress: 0.0,
                }
            }
            PlaybackEvent::SourceMissing { filename } => Self {
                status: PlaybackStatus::Error(PlaybackFailure::SourceNotFound { filename }),
                loading_progress: 0.0,
            },
            PlaybackEvent::Retry => {
                if !self.status.is_error() {
                    return self;
                }
                Self {
                    status: PlaybackStatus::Loading,
                    loading_progress: 0.0,
                }
            }
            PlaybackEvent::ElementFailed { diagnostics } => {
                if self.status.is_error() {
                    return self;
                }
                let failure = PlaybackFailure::ElementReported { diagnostics };
                Self {
                    status: PlaybackStatus::Error(failure),
                    loading_progress: 0.0,
                }
            }
            PlaybackEvent::Media(MediaEvent::Error { code, message }) => self.apply(
                PlaybackEvent::ElementFailed {
                    diagnostics: MediaDiagnostics {
                        error_code: code,
                        message,
                        ..MediaDiagnostics::default()
                    },
                },
                buffering_floor,
            ),
            PlaybackEvent::Media(event) => self.apply_media(event, buffering_floor),
        }
    }

    fn apply_media(self, event: MediaEvent, buffering_floor: f64) -> Self {
        use PlaybackStatus::{Buffering, CanPlay, Error, Idle, Loading, Playing};

        // Nothing is attached while idle, and errors stay put until retried
        if matches!(self.status, Idle | Error(_)) {
            return self;
        }

        let status = self.status;
        match (status, event) {
            (status, MediaEvent::LoadStart) => Self {
                status,
                loading_progress: milestones::LOAD_START,
            },
            (status, MediaEvent::LoadedMetadata) => Self {
                status,
                loading_progress: milestones::LOADED_METADATA,
            },
            (Loading, MediaEvent::CanPlay) => Self {
                status: CanPlay,
                loading_progress: milestones::CAN_PLAY,
            },
            (Loading | CanPlay, MediaEvent::LoadedData) => Self {
                status: CanPlay,
                loading_progress: milestones::LOADED_DATA,
            },
            (Loading | CanPlay | Buffering, MediaEvent::Playing) => Self {
                status: Playing,
                loading_progress: self.loading_progress,
            },
            (Playing, MediaEvent::Waiting) => Self {
                status: Buffering,
                loading_progress: self.loading_progress,
            },
            (
                status,
                MediaEvent::Progress {
                    buffered_end,
                    duration,
                },
            ) => Self {
                loading_progress: buffered_progress(buffered_end, duration, buffering_floor)
                    .unwrap_or(self.loading_progress),
                status,
            },
            (status, _) => Self {
                status,
                loading_progress: self.loading_progress,
            },
        }
    }
}

/// Estimate loading progress from the buffered range.
///
/// Returns `min(buffered_end / duration, 1) * 100`, never below `floor`, or
/// `None` when the duration is unknown.
#[must_use]
pub fn buffered_progress(buffered_end: f64, duration: f64, floor: f64) -> Option<f64> {
    if !(duration.is_finite() && duration > 0.0) || buffered_end.is_nan() {
        return None;
    }
    let ratio = (buffered_end / duration).clamp(0.0, 1.0);
    Some((ratio * 100.0).max(floor))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLOOR: f64 = 40.0;

    fn state(status: PlaybackStatus, loading_progress: f64) -> PlaybackState {
        PlaybackState {
            status,
            loading_progress,
        }
    }

    fn media(state: PlaybackState, event: MediaEvent) -> PlaybackState {
        state.apply(PlaybackEvent::Media(event), FLOOR)
    }

    fn element_error() -> MediaEvent {
        MediaEvent::Error {
            code: Some(2),
            message: Some("network".to_string()),
        }
    }

    #[test]
    fn test_load_sequence() {
        let s = PlaybackState::default().apply(PlaybackEvent::SourceAssigned, FLOOR);
        assert_eq!(s, state(PlaybackStatus::Loading, 0.0));

        let s = media(s, MediaEvent::LoadStart);
        assert_eq!(s, state(PlaybackStatus::Loading, 10.0));
        let s = media(s, MediaEvent::LoadedMetadata);
        assert_eq!(s, state(PlaybackStatus::Loading, 30.0));
        let s = media(s, MediaEvent::CanPlay);
        assert_eq!(s, state(PlaybackStatus::CanPlay, 90.0));
        let s = media(s, MediaEvent::LoadedData);
        assert_eq!(s, state(PlaybackStatus::CanPlay, 100.0));
        let s = media(s, MediaEvent::Playing);
        assert_eq!(s.status, PlaybackStatus::Playing);
    }

    #[test]
    fn test_stall_and_resume() {
        let s = media(state(PlaybackStatus::Playing, 100.0), MediaEvent::Waiting);
        assert_eq!(s.status, PlaybackStatus::Buffering);
        let s = media(s, MediaEvent::Playing);
        assert_eq!(s.status, PlaybackStatus::Playing);
    }

    #[test]
    fn test_error_from_loading_resets_progress() {
        let s = media(state(PlaybackStatus::Loading, 30.0), element_error());
        assert!(matches!(
            s.status,
            PlaybackStatus::Error(PlaybackFailure::ElementReported { .. })
        ));
        assert!(s.loading_progress.abs() < f64::EPSILON);
    }

    #[test]
    fn test_error_is_terminal_until_retry() {
        let failed = media(state(PlaybackStatus::Loading, 0.0), element_error());
        for event in [
            MediaEvent::LoadStart,
            MediaEvent::CanPlay,
            MediaEvent::Playing,
            MediaEvent::Progress {
                buffered_end: 10.0,
                duration: 20.0,
            },
        ] {
            assert_eq!(media(failed.clone(), event), failed);
        }
        assert_eq!(failed.clone().apply(PlaybackEvent::SourceAssigned, FLOOR), failed);

        let retried = failed.apply(PlaybackEvent::Retry, FLOOR);
        assert_eq!(retried, state(PlaybackStatus::Loading, 0.0));
    }

    #[test]
    fn test_retry_ignored_outside_error() {
        let playing = state(PlaybackStatus::Playing, 100.0);
        assert_eq!(playing.clone().apply(PlaybackEvent::Retry, FLOOR), playing);
    }

    #[test]
    fn test_missing_source_message() {
        let s = PlaybackState::default().apply(
            PlaybackEvent::SourceMissing {
                filename: "a.mp4".to_string(),
            },
            FLOOR,
        );
        let failure = PlaybackFailure::SourceNotFound {
            filename: "a.mp4".to_string(),
        };
        assert_eq!(s.status, PlaybackStatus::Error(failure.clone()));
        assert!(failure.user_message().contains("not found"));
        assert!(failure.user_message().contains("a.mp4"));

        let decode = PlaybackFailure::ElementReported {
            diagnostics: MediaDiagnostics::default(),
        };
        assert!(!decode.user_message().contains("not found"));
    }

    #[test]
    fn test_buffering_progress() {
        let s = media(
            state(PlaybackStatus::Buffering, 10.0),
            MediaEvent::Progress {
                buffered_end: 30.0,
                duration: 60.0,
            },
        );
        assert!((s.loading_progress - 50.0).abs() < f64::EPSILON);
        assert_eq!(s.status, PlaybackStatus::Buffering);
    }

    #[test]
    fn test_buffered_progress_bounds() {
        assert_eq!(buffered_progress(5.0, 100.0, FLOOR), Some(40.0));
        assert_eq!(buffered_progress(200.0, 100.0, FLOOR), Some(100.0));
        assert_eq!(buffered_progress(5.0, 0.0, FLOOR), None);
        assert_eq!(buffered_progress(5.0, f64::NAN, FLOOR), None);
    }

    #[test]
    fn test_media_events_ignored_while_idle() {
        let idle = PlaybackState::default();
        assert_eq!(media(idle.clone(), MediaEvent::CanPlay), idle);
    }
}
