//! Shared loading-bar container.
//!
//! [`LoadingBar`] owns the single [`ProgressState`] of an application session
//! together with the timers that drive it. Route changes call
//! [`LoadingBar::activate`], which runs the simulated ramp; imperative flows use
//! [`LoadingBar::start_loading`], [`LoadingBar::update_progress`] and
//! [`LoadingBar::finish_loading`].
//!
//! Every new cycle cancels the timers of the previous one before scheduling its
//! own, and each timer re-checks that its cycle is still current when it
//! fires. Timer tasks only hold a weak reference, so they become no-ops once
//! the container is dropped or shut down.

use crate::config::LoadingBarConfig;
use crate::progress::{ProgressEvent, ProgressState};
use crate::time::DurationExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// What started a progress cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingTrigger {
    /// Route change, runs the simulated ramp
    Route,
    /// Imperative `start_loading` call
    Manual,
}

/// Events emitted whenever the progress state changes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadingBarEvent {
    /// A new cycle began; progress is back at 0
    Started {
        trigger: LoadingTrigger,
        generation: u64,
    },
    /// Progress moved without completing
    Progressed { progress: f64 },
    /// Progress reached 100
    Completed,
    /// The settle delay elapsed and the bar is hidden again
    Settled,
}

/// Timers belonging to one simulated cycle
struct Cycle {
    generation: u64,
    token: CancellationToken,
    tick: JoinHandle<()>,
    completion: JoinHandle<()>,
}

impl Cycle {
    fn cancel(self) {
        self.token.cancel();
        self.tick.abort();
        self.completion.abort();
    }

    fn pending(&self) -> usize {
        [&self.tick, &self.completion]
            .into_iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }
}

struct LoadingBarInner {
    state: ProgressState,
    /// Bumped by every start; settle timers carry the generation they belong to
    generation: u64,
    cycle: Option<Cycle>,
    settle_timers: Vec<JoinHandle<()>>,
    rng: StdRng,
}

impl LoadingBarInner {
    fn cancel_timers(&mut self) {
        if let Some(cycle) = self.cycle.take() {
            debug!(generation = cycle.generation, "Cancelling superseded progress cycle");
            cycle.cancel();
        }
        for handle in self.settle_timers.drain(..) {
            handle.abort();
        }
    }

    fn is_current_cycle(&self, generation: u64) -> bool {
        self.cycle
            .as_ref()
            .is_some_and(|cycle| cycle.generation == generation)
    }

    fn completion_delay(&mut self, config: &LoadingBarConfig) -> Duration {
        let (min, max) = (config.complete_min_ms, config.complete_max_ms);
        let millis = if max > min {
            self.rng.random_range(min..max)
        } else {
            min
        };
        Duration::from_millis(millis)
    }

    fn tick_increment(&mut self, config: &LoadingBarConfig) -> f64 {
        if config.max_increment > 0.0 {
            self.rng.random_range(0.0..config.max_increment)
        } else {
            0.0
        }
    }
}

/// The application-wide loading bar
pub struct LoadingBar {
    config: LoadingBarConfig,
    inner: Mutex<LoadingBarInner>,
    event_tx: broadcast::Sender<LoadingBarEvent>,
    cancel_token: CancellationToken,
}

impl LoadingBar {
    /// Create a new loading bar
    ///
    /// # Arguments
    /// * `config` - Ramp timing
    /// * `cancel_token` - Optional parent token; cancelling it tears down all timers
    #[must_use]
    pub fn new(config: LoadingBarConfig, cancel_token: Option<CancellationToken>) -> Arc<Self> {
        Self::with_rng(config, cancel_token, StdRng::from_os_rng())
    }

    /// Create a loading bar with an explicit random source
    #[must_use]
    pub fn with_rng(
        config: LoadingBarConfig,
        cancel_token: Option<CancellationToken>,
        rng: StdRng,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(64);

        Arc::new(Self {
            config,
            inner: Mutex::new(LoadingBarInner {
                state: ProgressState::default(),
                generation: 0,
                cycle: None,
                settle_timers: Vec::new(),
                rng,
            }),
            event_tx,
            cancel_token: cancel_token.map_or_else(CancellationToken::new, |t| t.child_token()),
        })
    }

    /// Subscribe to loading-bar events
    pub fn subscribe(&self) -> broadcast::Receiver<LoadingBarEvent> {
        self.event_tx.subscribe()
    }

    /// Get the current progress state
    pub async fn state(&self) -> ProgressState {
        self.inner.lock().await.state
    }

    #[must_use]
    pub const fn config(&self) -> &LoadingBarConfig {
        &self.config
    }

    /// Number of timers that may still fire
    pub async fn pending_timers(&self) -> usize {
        let inner = self.inner.lock().await;
        let cycle = inner.cycle.as_ref().map_or(0, Cycle::pending);
        let settle = inner
            .settle_timers
            .iter()
            .filter(|handle| !handle.is_finished())
            .count();
        cycle + settle
    }

    /// Whether the bar has been torn down
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Cancel all outstanding timers. The state is left as is.
    pub fn shutdown(&self) {
        info!("Loading bar shutting down");
        self.cancel_token.cancel();
    }

    /// Start a simulated progress cycle, replacing any cycle in flight.
    ///
    /// Returns the generation of the new cycle.
    pub async fn activate(self: &Arc<Self>) -> u64 {
        let mut inner = self.inner.lock().await;
        inner.cancel_timers();

        inner.generation += 1;
        let generation = inner.generation;
        inner.state = inner.state.apply(ProgressEvent::Start);
        let _ = self.event_tx.send(LoadingBarEvent::Started {
            trigger: LoadingTrigger::Route,
            generation,
        });

        if self.is_shut_down() {
            debug!(generation, "Loading bar is shut down, not scheduling timers");
            return generation;
        }

        let completion_delay = inner.completion_delay(&self.config);
        debug!(
            generation,
            completion_ms = completion_delay.as_millis_u64(),
            "Starting progress cycle"
        );

        let token = self.cancel_token.child_token();
        let tick = tokio::spawn(run_ticks(
            Arc::downgrade(self),
            generation,
            token.clone(),
            self.config.tick_interval(),
        ));
        let completion = tokio::spawn(run_completion(
            Arc::downgrade(self),
            generation,
            token.clone(),
            completion_delay,
            self.config.settle_delay(),
        ));

        inner.cycle = Some(Cycle {
            generation,
            token,
            tick,
            completion,
        });

        generation
    }

    /// Show the bar at 0 without scheduling any timers.
    ///
    /// Stops a simulated cycle in flight and invalidates pending settle timers
    /// from earlier [`LoadingBar::finish_loading`] calls.
    pub async fn start_loading(&self) {
        let mut inner = self.inner.lock().await;
        inner.cancel_timers();

        inner.generation += 1;
        let generation = inner.generation;
        inner.state = inner.state.apply(ProgressEvent::Start);
        let _ = self.event_tx.send(LoadingBarEvent::Started {
            trigger: LoadingTrigger::Manual,
            generation,
        });
    }

    /// Set progress to `value` clamped into `0..=100`.
    pub async fn update_progress(&self, value: f64) {
        let mut inner = self.inner.lock().await;
        let next = inner.state.apply(ProgressEvent::Set(value));
        if next != inner.state {
            inner.state = next;
            let _ = self.event_tx.send(LoadingBarEvent::Progressed {
                progress: next.progress,
            });
        }
    }

    /// Jump to 100 now and hide the bar after the settle delay.
    ///
    /// Every call schedules its own settle timer; a later start invalidates it.
    pub async fn finish_loading(self: &Arc<Self>) {
        let mut inner = self.inner.lock().await;
        inner.state = inner.state.apply(ProgressEvent::ForceComplete);
        let _ = self.event_tx.send(LoadingBarEvent::Completed);

        inner.settle_timers.retain(|handle| !handle.is_finished());
        if self.is_shut_down() {
            return;
        }

        let generation = inner.generation;
        let bar = Arc::downgrade(self);
        let token = self.cancel_token.clone();
        let settle = self.config.settle_delay();
        inner.settle_timers.push(tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => return,
                () = sleep(settle) => {}
            }
            if let Some(bar) = bar.upgrade() {
                bar.settle_manual(generation).await;
            }
        }));
    }

    /// Apply one simulator tick. Returns whether ticking should continue.
    async fn tick(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock().await;
        let ceiling = self.config.soft_ceiling;
        if !inner.is_current_cycle(generation) || inner.state.tick_exhausted(ceiling) {
            return false;
        }

        let increment = inner.tick_increment(&self.config);
        inner.state = inner.state.apply(ProgressEvent::Tick { increment, ceiling });
        let _ = self.event_tx.send(LoadingBarEvent::Progressed {
            progress: inner.state.progress,
        });

        !inner.state.tick_exhausted(ceiling)
    }

    /// Completion timer fired. Returns whether the cycle is still current.
    async fn force_complete(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(cycle) = inner.cycle.as_ref().filter(|c| c.generation == generation) else {
            return false;
        };
        cycle.tick.abort();

        inner.state = inner.state.apply(ProgressEvent::ForceComplete);
        let _ = self.event_tx.send(LoadingBarEvent::Completed);
        true
    }

    /// Settle delay of a simulated cycle elapsed
    async fn settle_cycle(&self, generation: u64) {
        let mut inner = self.inner.lock().await;
        if !inner.is_current_cycle(generation) {
            return;
        }
        // Called from the completion task itself, so the handles are just dropped
        inner.cycle = None;
        self.settle(&mut inner);
    }

    /// Settle delay of a `finish_loading` call elapsed
    async fn settle_manual(&self, generation: u64) {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            return;
        }
        if let Some(cycle) = inner.cycle.take() {
            cycle.cancel();
        }
        self.settle(&mut inner);
    }

    fn settle(&self, inner: &mut LoadingBarInner) {
        let next = inner.state.apply(ProgressEvent::SettleElapsed);
        if next != inner.state {
            inner.state = next;
            let _ = self.event_tx.send(LoadingBarEvent::Settled);
        }
    }
}

impl Drop for LoadingBar {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn run_ticks(
    bar: Weak<LoadingBar>,
    generation: u64,
    token: CancellationToken,
    period: Duration,
) {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = interval.tick() => {
                let Some(bar) = bar.upgrade() else { break };
                if !bar.tick(generation).await {
                    break;
                }
            }
        }
    }
}

async fn run_completion(
    bar: Weak<LoadingBar>,
    generation: u64,
    token: CancellationToken,
    delay: Duration,
    settle: Duration,
) {
    tokio::select! {
        () = token.cancelled() => return,
        () = sleep(delay) => {}
    }
    let Some(strong) = bar.upgrade() else { return };
    if !strong.force_complete(generation).await {
        return;
    }
    drop(strong);

    tokio::select! {
        () = token.cancelled() => return,
        () = sleep(settle) => {}
    }
    if let Some(bar) = bar.upgrade() {
        bar.settle_cycle(generation).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    fn test_bar() -> Arc<LoadingBar> {
        LoadingBar::with_rng(LoadingBarConfig::default(), None, StdRng::seed_from_u64(7))
    }

    fn drain(rx: &mut broadcast::Receiver<LoadingBarEvent>) -> Vec<LoadingBarEvent> {
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return events,
                Err(TryRecvError::Lagged(_)) => {}
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_loading_resets_state() {
        let bar = test_bar();
        bar.update_progress(70.0).await;
        bar.start_loading().await;

        let state = bar.state().await;
        assert!(state.is_loading);
        assert!(state.progress.abs() < f64::EPSILON);
        assert_eq!(bar.pending_timers().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_progress_clamps_last_write() {
        let bar = test_bar();
        bar.start_loading().await;

        bar.update_progress(150.0).await;
        assert!((bar.state().await.progress - 100.0).abs() < f64::EPSILON);

        bar.update_progress(-3.0).await;
        assert!(bar.state().await.progress.abs() < f64::EPSILON);

        bar.update_progress(41.0).await;
        assert!((bar.state().await.progress - 41.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_finish_converges_to_hidden() {
        let bar = test_bar();
        bar.start_loading().await;

        bar.finish_loading().await;
        let state = bar.state().await;
        assert!(state.is_loading);
        assert!((state.progress - 100.0).abs() < f64::EPSILON);

        sleep(Duration::from_millis(50)).await;
        bar.finish_loading().await;
        sleep(Duration::from_millis(50)).await;
        bar.finish_loading().await;

        sleep(Duration::from_millis(250)).await;
        assert_eq!(bar.state().await, ProgressState::default());
        assert_eq!(bar.pending_timers().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_invalidates_pending_settle() {
        let bar = test_bar();
        bar.start_loading().await;
        bar.finish_loading().await;

        sleep(Duration::from_millis(100)).await;
        bar.start_loading().await;
        sleep(Duration::from_millis(500)).await;

        let state = bar.state().await;
        assert!(state.is_loading);
        assert!(state.progress.abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_route_cycle_timing() {
        let bar = test_bar();
        let mut rx = bar.subscribe();

        let started_at = Instant::now();
        bar.activate().await;
        let state = bar.state().await;
        assert!(state.is_loading);
        assert!(state.progress.abs() < f64::EPSILON);

        let mut completed_at = None;
        let mut last_progress = 0.0;
        loop {
            match rx.recv().await.unwrap() {
                LoadingBarEvent::Started { trigger, .. } => {
                    assert_eq!(trigger, LoadingTrigger::Route);
                }
                LoadingBarEvent::Progressed { progress } => {
                    assert!(completed_at.is_none());
                    assert!(progress <= 90.0);
                    assert!(progress >= last_progress);
                    last_progress = progress;
                }
                LoadingBarEvent::Completed => {
                    assert!((bar.state().await.progress - 100.0).abs() < f64::EPSILON);
                    completed_at = Some(Instant::now());
                }
                LoadingBarEvent::Settled => break,
            }
        }

        let completed_at = completed_at.unwrap();
        let to_complete = completed_at - started_at;
        assert!(to_complete >= Duration::from_millis(300));
        assert!(to_complete < Duration::from_millis(500));
        assert_eq!(Instant::now() - completed_at, Duration::from_millis(200));
        assert_eq!(bar.state().await, ProgressState::default());
        assert_eq!(bar.pending_timers().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_activations_keep_one_cycle() {
        let bar = test_bar();
        let mut rx = bar.subscribe();

        let first = bar.activate().await;
        sleep(Duration::from_millis(150)).await;
        let second = bar.activate().await;
        assert!(second > first);
        assert_eq!(bar.pending_timers().await, 2);

        sleep(Duration::from_secs(1)).await;
        let events = drain(&mut rx);

        let completions = events
            .iter()
            .filter(|e| matches!(e, LoadingBarEvent::Completed))
            .count();
        let settles = events
            .iter()
            .filter(|e| matches!(e, LoadingBarEvent::Settled))
            .count();
        assert_eq!(completions, 1);
        assert_eq!(settles, 1);
        assert_eq!(bar.state().await, ProgressState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_start_stops_simulated_cycle() {
        let bar = test_bar();
        bar.activate().await;
        sleep(Duration::from_millis(120)).await;

        bar.start_loading().await;
        assert_eq!(bar.pending_timers().await, 0);

        sleep(Duration::from_secs(1)).await;
        let state = bar.state().await;
        assert!(state.is_loading);
        assert!(state.progress.abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_bar_timers_are_noops() {
        let bar = test_bar();
        let mut rx = bar.subscribe();
        bar.activate().await;
        drop(bar);

        sleep(Duration::from_secs(1)).await;
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], LoadingBarEvent::Started { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_timers() {
        let parent = CancellationToken::new();
        let bar = LoadingBar::with_rng(
            LoadingBarConfig::default(),
            Some(parent.clone()),
            StdRng::seed_from_u64(3),
        );
        bar.activate().await;

        parent.cancel();
        assert!(bar.is_shut_down());
        sleep(Duration::from_secs(1)).await;

        let state = bar.state().await;
        assert!(state.is_loading);
        assert!(state.progress < 100.0);
        assert_eq!(bar.pending_timers().await, 0);
    }
}
