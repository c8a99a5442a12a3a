//! Forwards core events to the terminal.

use std::io::Write;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info};
use vistream_core::{
    render, CarouselEffect, LoadingBar, LoadingBarEvent, PlaybackState, PlaybackStatus,
};

const LOG_TARGET: &str = "vistream::bridge";

/// Width of the rendered loading bar in terminal cells
const BAR_COLUMNS: usize = 40;

/// Redraw the loading bar whenever its state changes
pub async fn render_loading_bar(loading_bar: Arc<LoadingBar>) {
    let mut rx = loading_bar.subscribe();

    loop {
        match rx.recv().await {
            Ok(event) => {
                if let LoadingBarEvent::Started {
                    trigger,
                    generation,
                } = event
                {
                    info!(target: LOG_TARGET, "Progress cycle {} started ({:?})", generation, trigger);
                }
                draw(&loading_bar).await;
            }
            Err(RecvError::Closed) => {
                info!(target: LOG_TARGET, "Loading bar channel closed");
                break;
            }
            Err(RecvError::Lagged(n)) => {
                info!(target: LOG_TARGET, "Missed {} loading bar events", n);
                draw(&loading_bar).await;
            }
        }
    }
}

async fn draw(loading_bar: &LoadingBar) {
    let state = loading_bar.state().await;
    let line = render(&state).map_or_else(
        || " ".repeat(BAR_COLUMNS),
        |frame| frame.to_terminal_line(BAR_COLUMNS),
    );

    let mut stdout = std::io::stdout().lock();
    let _ = write!(stdout, "\r[{line}] {:>5.1}%", state.progress);
    if !state.is_loading {
        let _ = writeln!(stdout);
    }
    let _ = stdout.flush();
}

/// Log playback status changes
pub async fn log_playback_events(mut rx: broadcast::Receiver<PlaybackState>) {
    loop {
        match rx.recv().await {
            Ok(state) => match &state.status {
                PlaybackStatus::Error(failure) => {
                    error!(target: LOG_TARGET, "Playback failed: {}", failure);
                    println!("{}  (type 'retry' to try again)", failure.user_message());
                }
                status => {
                    info!(
                        target: LOG_TARGET,
                        "Playback {:?} ({:.0}% loaded)", status, state.loading_progress
                    );
                }
            },
            Err(RecvError::Closed) => {
                info!(target: LOG_TARGET, "Playback channel closed");
                break;
            }
            Err(RecvError::Lagged(n)) => {
                info!(target: LOG_TARGET, "Missed {} playback events", n);
            }
        }
    }
}

/// Log carousel effects, naming the slide where one is involved
pub async fn log_carousel_effects(
    mut rx: broadcast::Receiver<CarouselEffect>,
    slide_titles: &'static [&'static str],
) {
    let title = |index: usize| slide_titles.get(index).copied().unwrap_or("?");

    loop {
        match rx.recv().await {
            Ok(effect) => match effect {
                CarouselEffect::SlideChanged(index) => {
                    info!(target: LOG_TARGET, "Featured: {}", title(index));
                }
                CarouselEffect::TrailerOpened(index) => {
                    info!(target: LOG_TARGET, "Playing trailer for {}", title(index));
                }
                CarouselEffect::ScrollTo(target) => {
                    info!(target: LOG_TARGET, "Scrolling to {:?}", target);
                }
                other => {
                    info!(target: LOG_TARGET, "Carousel: {:?}", other);
                }
            },
            Err(RecvError::Closed) => {
                info!(target: LOG_TARGET, "Carousel channel closed");
                break;
            }
            Err(RecvError::Lagged(n)) => {
                info!(target: LOG_TARGET, "Missed {} carousel events", n);
            }
        }
    }
}
