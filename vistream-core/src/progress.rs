//! Loading-bar progress state and its pure transition function.

/// Progress value at which a cycle is complete
pub const MAX_PROGRESS: f64 = 100.0;

/// Clamp a progress value into `0..=100`.
#[must_use]
pub fn clamp_progress(value: f64) -> f64 {
    value.clamp(0.0, MAX_PROGRESS)
}

/// The shared state behind the loading bar
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProgressState {
    /// Whether the indicator should render
    pub is_loading: bool,
    /// Current progress, always within `0..=100`
    pub progress: f64,
}

/// Inputs to [`ProgressState::apply`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressEvent {
    /// A new cycle begins (route change or manual start)
    Start,
    /// Simulator tick. Adds `increment`, never going past `ceiling`.
    Tick { increment: f64, ceiling: f64 },
    /// Manual progress update
    Set(f64),
    /// Completion timer fired
    ForceComplete,
    /// Settle delay after completion elapsed
    SettleElapsed,
}

impl ProgressState {
    /// Compute the state that follows `event`.
    #[must_use]
    pub fn apply(self, event: ProgressEvent) -> Self {
        match event {
            ProgressEvent::Start => Self {
                is_loading: true,
                progress: 0.0,
            },
            ProgressEvent::Tick { increment, ceiling } => {
                if !self.is_loading || self.progress >= ceiling {
                    return self;
                }
                Self {
                    progress: clamp_progress((self.progress + increment.max(0.0)).min(ceiling)),
                    ..self
                }
            }
            ProgressEvent::Set(value) => {
                if value.is_nan() {
                    return self;
                }
                Self {
                    progress: clamp_progress(value),
                    ..self
                }
            }
            ProgressEvent::ForceComplete => Self {
                progress: MAX_PROGRESS,
                ..self
            },
            ProgressEvent::SettleElapsed => Self::default(),
        }
    }

    /// Whether ticks can no longer advance this state.
    #[must_use]
    pub fn tick_exhausted(&self, ceiling: f64) -> bool {
        !self.is_loading || self.progress >= ceiling
    }
}
