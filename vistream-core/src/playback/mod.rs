//! Video playback state machine and the session that drives it.

pub mod controller;
pub mod media;
pub mod session;
pub mod state;

pub use controller::PlaybackController;
pub use media::{MediaDiagnostics, MediaElement, MediaEvent};
pub use session::PlaybackHandle;
pub use state::{buffered_progress, PlaybackEvent, PlaybackFailure, PlaybackState, PlaybackStatus};
