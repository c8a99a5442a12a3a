//! Featured-video carousel: slide rotation, scroll hijacking and the trailer
//! overlay.
//!
//! [`CarouselState::apply`] is a pure transition returning the effects of an
//! input. [`CarouselHandle`] runs it in a background task that owns the
//! auto-advance, scroll-lock and fade deadlines.

use crate::config::CarouselConfig;
use crate::error::{CoreError, Result};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Fraction of the carousel height above which wheel-down stops hijacking
const SCROLL_DOWN_ZONE: f64 = 0.8;
/// Half-width of the band around the carousel bottom where wheel-up applies
const SCROLL_UP_BAND: f64 = 0.1;

/// Keys the carousel reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    ArrowDown,
    PageDown,
    ArrowUp,
    PageUp,
    Home,
    Escape,
}

impl NavKey {
    /// Parse a DOM-style key name
    #[must_use]
    pub fn from_key_name(name: &str) -> Option<Self> {
        match name {
            "ArrowDown" => Some(Self::ArrowDown),
            "PageDown" => Some(Self::PageDown),
            "ArrowUp" => Some(Self::ArrowUp),
            "PageUp" => Some(Self::PageUp),
            "Home" => Some(Self::Home),
            "Escape" => Some(Self::Escape),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollTarget {
    /// The section below the carousel
    NextSection,
    /// Back to the top of the page
    Carousel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrailerState {
    #[default]
    Closed,
    Open { slide: usize },
    /// Fading out; still on screen
    Closing { slide: usize },
}

impl TrailerState {
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        !matches!(self, Self::Closed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CarouselInput {
    /// Wheel movement at the given page scroll position
    Wheel {
        delta_y: f64,
        scroll_y: f64,
        carousel_height: f64,
    },
    Key(NavKey),
    /// Indicator dot clicked
    SelectSlide(usize),
    AutoAdvance,
    OpenTrailer,
    CloseTrailer,
    ScrollUnlocked,
    FadeElapsed,
}

/// Observable consequences of an input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarouselEffect {
    SlideChanged(usize),
    /// Scroll the page; input stays locked until [`CarouselInput::ScrollUnlocked`]
    ScrollTo(ScrollTarget),
    ScrollUnlocked,
    TrailerOpened(usize),
    /// Fade-out started; [`CarouselInput::FadeElapsed`] completes it
    TrailerClosing,
    TrailerClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarouselState {
    pub slide_count: usize,
    pub current: usize,
    pub trailer: TrailerState,
    pub scroll_locked: bool,
}

impl CarouselState {
    #[must_use]
    pub const fn new(slide_count: usize) -> Self {
        Self {
            slide_count,
            current: 0,
            trailer: TrailerState::Closed,
            scroll_locked: false,
        }
    }

    /// Apply `input` and return what happened.
    ///
    /// `scroll_threshold` is the smallest wheel delta treated as a scroll.
    pub fn apply(&mut self, input: CarouselInput, scroll_threshold: f64) -> Vec<CarouselEffect> {
        match input {
            CarouselInput::AutoAdvance => self.select(next_index(self.current, self.slide_count)),
            CarouselInput::SelectSlide(index) => {
                if index >= self.slide_count {
                    return Vec::new();
                }
                self.select(index)
            }
            CarouselInput::Wheel {
                delta_y,
                scroll_y,
                carousel_height,
            } => {
                if self.scroll_locked {
                    return Vec::new();
                }
                match wheel_target(delta_y, scroll_y, carousel_height, scroll_threshold) {
                    Some(target) => self.scroll(target),
                    None => Vec::new(),
                }
            }
            CarouselInput::Key(NavKey::Escape) => self.close_trailer(),
            CarouselInput::Key(key) => {
                if self.trailer.is_visible() || self.scroll_locked {
                    return Vec::new();
                }
                let target = match key {
                    NavKey::ArrowDown | NavKey::PageDown => ScrollTarget::NextSection,
                    _ => ScrollTarget::Carousel,
                };
                self.scroll(target)
            }
            CarouselInput::OpenTrailer => {
                if self.slide_count == 0 || self.trailer.is_visible() {
                    return Vec::new();
                }
                self.trailer = TrailerState::Open {
                    slide: self.current,
                };
                vec![CarouselEffect::TrailerOpened(self.current)]
            }
            CarouselInput::CloseTrailer => self.close_trailer(),
            CarouselInput::ScrollUnlocked => {
                if !self.scroll_locked {
                    return Vec::new();
                }
                self.scroll_locked = false;
                vec![CarouselEffect::ScrollUnlocked]
            }
            CarouselInput::FadeElapsed => {
                if !matches!(self.trailer, TrailerState::Closing { .. }) {
                    return Vec::new();
                }
                self.trailer = TrailerState::Closed;
                vec![CarouselEffect::TrailerClosed]
            }
        }
    }

    fn select(&mut self, index: usize) -> Vec<CarouselEffect> {
        if index == self.current || self.slide_count == 0 {
            return Vec::new();
        }
        self.current = index;
        vec![CarouselEffect::SlideChanged(index)]
    }

    fn scroll(&mut self, target: ScrollTarget) -> Vec<CarouselEffect> {
        self.scroll_locked = true;
        vec![CarouselEffect::ScrollTo(target)]
    }

    fn close_trailer(&mut self) -> Vec<CarouselEffect> {
        let TrailerState::Open { slide } = self.trailer else {
            return Vec::new();
        };
        self.trailer = TrailerState::Closing { slide };
        vec![CarouselEffect::TrailerClosing]
    }
}

/// Index after `current`, wrapping to the first slide
#[must_use]
pub const fn next_index(current: usize, count: usize) -> usize {
    if count == 0 {
        0
    } else {
        (current + 1) % count
    }
}

fn wheel_target(
    delta_y: f64,
    scroll_y: f64,
    carousel_height: f64,
    threshold: f64,
) -> Option<ScrollTarget> {
    if delta_y > threshold {
        (scroll_y < carousel_height * SCROLL_DOWN_ZONE).then_some(ScrollTarget::NextSection)
    } else if delta_y < -threshold {
        let band = carousel_height * SCROLL_UP_BAND;
        (scroll_y > carousel_height - band && scroll_y <= carousel_height + band)
            .then_some(ScrollTarget::Carousel)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Deadlines {
    advance: Option<Instant>,
    unlock: Option<Instant>,
    fade: Option<Instant>,
}

struct CarouselDriver {
    config: CarouselConfig,
    state: CarouselState,
    shared: Arc<RwLock<CarouselState>>,
    input_rx: mpsc::Receiver<CarouselInput>,
    event_tx: broadcast::Sender<CarouselEffect>,
    cancel_token: CancellationToken,
    deadlines: Deadlines,
}

impl CarouselDriver {
    async fn run(mut self) {
        info!("Carousel started with {} slides", self.state.slide_count);
        self.restart_auto_advance();

        loop {
            let Deadlines {
                advance,
                unlock,
                fade,
            } = self.deadlines;

            let input = tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    info!("Carousel shutting down");
                    break;
                }
                input = self.input_rx.recv() => {
                    let Some(input) = input else { break };
                    input
                }
                () = sleep_until(unlock.unwrap_or_else(Instant::now)), if unlock.is_some() => {
                    self.deadlines.unlock = None;
                    CarouselInput::ScrollUnlocked
                }
                () = sleep_until(fade.unwrap_or_else(Instant::now)), if fade.is_some() => {
                    self.deadlines.fade = None;
                    CarouselInput::FadeElapsed
                }
                () = sleep_until(advance.unwrap_or_else(Instant::now)), if advance.is_some() => {
                    self.deadlines.advance = None;
                    CarouselInput::AutoAdvance
                }
            };

            self.handle(input).await;
        }
    }

    async fn handle(&mut self, input: CarouselInput) {
        let effects = self.state.apply(input, self.config.scroll_threshold);
        if effects.is_empty() {
            return;
        }

        for effect in &effects {
            match effect {
                CarouselEffect::SlideChanged(_) => self.restart_auto_advance(),
                CarouselEffect::ScrollTo(target) => {
                    debug!("Scrolling to {:?}", target);
                    self.deadlines.unlock = Some(Instant::now() + self.config.scroll_lock());
                }
                CarouselEffect::TrailerClosing => {
                    self.deadlines.fade = Some(Instant::now() + self.config.trailer_fade());
                }
                _ => {}
            }
        }

        *self.shared.write().await = self.state;
        for effect in effects {
            let _ = self.event_tx.send(effect);
        }
    }

    fn restart_auto_advance(&mut self) {
        self.deadlines.advance = (self.state.slide_count > 1)
            .then(|| Instant::now() + self.config.auto_advance());
    }
}

/// Handle to a running carousel
pub struct CarouselHandle {
    input_tx: mpsc::Sender<CarouselInput>,
    state: Arc<RwLock<CarouselState>>,
    event_tx: broadcast::Sender<CarouselEffect>,
    cancel_token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl CarouselHandle {
    /// Start a carousel over `slide_count` slides
    pub fn spawn(
        slide_count: usize,
        config: CarouselConfig,
        cancel_token: Option<CancellationToken>,
    ) -> Self {
        let (input_tx, input_rx) = mpsc::channel(32);
        let (event_tx, _) = broadcast::channel(32);
        let state = CarouselState::new(slide_count);
        let shared = Arc::new(RwLock::new(state));
        let cancel_token = cancel_token.map_or_else(CancellationToken::new, |t| t.child_token());

        let driver = CarouselDriver {
            config,
            state,
            shared: shared.clone(),
            input_rx,
            event_tx: event_tx.clone(),
            cancel_token: cancel_token.clone(),
            deadlines: Deadlines::default(),
        };
        let task = tokio::spawn(driver.run());

        Self {
            input_tx,
            state: shared,
            event_tx,
            cancel_token,
            task: Some(task),
        }
    }

    /// Feed an input to the carousel.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SessionClosed`] if the carousel has stopped.
    pub async fn send(&self, input: CarouselInput) -> Result<()> {
        self.input_tx
            .send(input)
            .await
            .map_err(|_| CoreError::SessionClosed)
    }

    pub async fn state(&self) -> CarouselState {
        *self.state.read().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CarouselEffect> {
        self.event_tx.subscribe()
    }

    /// Stop the carousel and wait for its task to exit.
    pub async fn close(mut self) {
        self.cancel_token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for CarouselHandle {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
