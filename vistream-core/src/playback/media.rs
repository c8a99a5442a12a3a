//! Media element abstraction.

use std::fmt;

/// Snapshot of element fields captured when an error is reported
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaDiagnostics {
    pub error_code: Option<u16>,
    pub message: Option<String>,
    pub network_state: u8,
    pub ready_state: u8,
    pub current_src: String,
}

impl fmt::Display for MediaDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "code={} message={} network_state={} ready_state={} src='{}'",
            self.error_code
                .map_or_else(|| "none".to_string(), |c| c.to_string()),
            self.message.as_deref().unwrap_or("none"),
            self.network_state,
            self.ready_state,
            self.current_src
        )
    }
}

/// Lifecycle signals raised by a media element
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    LoadStart,
    LoadedMetadata,
    LoadedData,
    CanPlay,
    Playing,
    /// Playback stalled waiting for data
    Waiting,
    /// Buffered ranges grew; both values in seconds
    Progress { buffered_end: f64, duration: f64 },
    /// The element failed; the rest of the diagnostics is read from the element
    Error {
        code: Option<u16>,
        message: Option<String>,
    },
}

/// A video element the playback controller drives.
///
/// Setters are fire-and-forget; the element reports back through
/// [`MediaEvent`]s delivered to the playback session.
pub trait MediaElement: Send {
    /// Assign the source path. An empty path detaches the current source.
    fn set_src(&mut self, src: &str);

    /// Current source path, empty when detached
    fn src(&self) -> String;

    /// Restart loading of the current source
    fn load(&mut self);

    fn set_volume(&mut self, volume: f64);

    fn volume(&self) -> f64;

    fn set_muted(&mut self, muted: bool);

    fn muted(&self) -> bool;

    /// `readyState` of the element, from 0 (nothing) to 4 (enough data)
    fn ready_state(&self) -> u8;

    /// Fields worth logging when the element fails
    fn diagnostics(&self) -> MediaDiagnostics {
        MediaDiagnostics {
            ready_state: self.ready_state(),
            current_src: self.src(),
            ..MediaDiagnostics::default()
        }
    }
}
