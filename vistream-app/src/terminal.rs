//! Media element stand-in for the terminal host.
//!
//! There is no decoder behind it: calls are logged, and lifecycle events are
//! typed in by the user with the `media` command.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::info;
use vistream_core::{MediaDiagnostics, MediaElement, MediaEvent};

const LOG_TARGET: &str = "vistream::video";

/// `networkState` values of an HTML media element
const NETWORK_EMPTY: u8 = 0;
const NETWORK_LOADING: u8 = 2;

/// `readyState` values of an HTML media element
const HAVE_NOTHING: u8 = 0;
const HAVE_METADATA: u8 = 1;
const HAVE_CURRENT_DATA: u8 = 2;
const HAVE_FUTURE_DATA: u8 = 3;
const HAVE_ENOUGH_DATA: u8 = 4;

/// Ready state shared between the element and the command loop.
///
/// The user stands in for the decoder, so the typed lifecycle events are
/// what move it forward.
#[derive(Debug, Clone, Default)]
pub struct ReadyState(Arc<AtomicU8>);

impl ReadyState {
    #[must_use]
    pub fn get(&self) -> u8 {
        self.0.load(Ordering::Relaxed)
    }

    /// Advance the ready state the way a browser would for `event`.
    pub fn observe(&self, event: &MediaEvent) {
        let state = match event {
            MediaEvent::LoadStart => HAVE_NOTHING,
            MediaEvent::LoadedMetadata => HAVE_METADATA,
            MediaEvent::LoadedData | MediaEvent::Waiting => HAVE_CURRENT_DATA,
            MediaEvent::CanPlay => HAVE_FUTURE_DATA,
            MediaEvent::Playing => HAVE_ENOUGH_DATA,
            MediaEvent::Progress { .. } | MediaEvent::Error { .. } => return,
        };
        self.0.store(state, Ordering::Relaxed);
    }

    fn reset(&self) {
        self.0.store(HAVE_NOTHING, Ordering::Relaxed);
    }
}

pub struct TerminalVideo {
    src: String,
    volume: f64,
    muted: bool,
    network_state: u8,
    ready_state: ReadyState,
}

impl TerminalVideo {
    #[must_use]
    pub fn new(ready_state: ReadyState) -> Self {
        Self {
            src: String::new(),
            volume: 1.0,
            muted: false,
            network_state: NETWORK_EMPTY,
            ready_state,
        }
    }
}

impl MediaElement for TerminalVideo {
    fn set_src(&mut self, src: &str) {
        if src.is_empty() {
            info!(target: LOG_TARGET, "Source cleared");
        } else {
            info!(target: LOG_TARGET, "Source set to {}", src);
        }
        self.src = src.to_string();
    }

    fn src(&self) -> String {
        self.src.clone()
    }

    fn load(&mut self) {
        self.network_state = if self.src.is_empty() {
            NETWORK_EMPTY
        } else {
            NETWORK_LOADING
        };
        self.ready_state.reset();
        info!(target: LOG_TARGET, "load() called, src='{}'", self.src);
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume;
        info!(target: LOG_TARGET, "Volume {:.0}%", volume * 100.0);
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        info!(target: LOG_TARGET, "{}", if muted { "Muted" } else { "Unmuted" });
    }

    fn muted(&self) -> bool {
        self.muted
    }

    fn ready_state(&self) -> u8 {
        self.ready_state.get()
    }

    fn diagnostics(&self) -> MediaDiagnostics {
        MediaDiagnostics {
            network_state: self.network_state,
            ready_state: self.ready_state(),
            current_src: self.src.clone(),
            ..MediaDiagnostics::default()
        }
    }
}
