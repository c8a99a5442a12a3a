//! Rendering of [`ProgressState`] into a bar frame.

use crate::progress::{clamp_progress, ProgressState, MAX_PROGRESS};

const FILL: char = '█';
const SHINE: char = '▓';
const ANSI_RED: &str = "\x1b[31m";
const ANSI_RESET: &str = "\x1b[0m";

/// One visual frame of the loading bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarFrame {
    /// Bar width as a percentage of the available width
    pub width_percent: f64,
    /// Glow around the bar, shown whenever it has any width
    pub glow: bool,
    /// Moving shine, shown while the bar is partially filled
    pub shine: bool,
}

/// Map a progress state to the frame to draw, or `None` when the bar is hidden.
#[must_use]
pub fn render(state: &ProgressState) -> Option<BarFrame> {
    if !state.is_loading {
        return None;
    }

    let width_percent = clamp_progress(state.progress);
    Some(BarFrame {
        width_percent,
        glow: width_percent > 0.0,
        shine: width_percent > 0.0 && width_percent < MAX_PROGRESS,
    })
}

impl BarFrame {
    /// Number of filled cells out of `columns`
    #[must_use]
    pub fn filled_cells(&self, columns: usize) -> usize {
        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let filled = (self.width_percent / MAX_PROGRESS * columns as f64).round() as usize;
        filled.min(columns)
    }

    /// Draw the frame as a single terminal line of `columns` cells.
    #[must_use]
    pub fn to_terminal_line(&self, columns: usize) -> String {
        let filled = self.filled_cells(columns);
        let mut bar = FILL.to_string().repeat(filled);
        if self.shine && filled > 0 {
            bar.pop();
            bar.push(SHINE);
        }
        let rest = " ".repeat(columns - filled);

        if self.glow {
            format!("{ANSI_RED}{bar}{ANSI_RESET}{rest}")
        } else {
            format!("{bar}{rest}")
        }
    }
}
