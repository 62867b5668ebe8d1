//! Dispatcher - the single poll loop
//!
//! Drives sample → normalize → edge-diff → deliver on a fixed period and fans
//! each tick's batch out to the enabled consumers.
//!
//! # State Machine
//!
//! ```text
//! Ready ──start──► Polling ──cancel──► Stopped ──shutdown──► (session closed)
//! ```
//!
//! The worker owns the [`DeviceSession`] for its whole life, so the device is
//! only closed after the last tick has finished.

use crate::config::Settings;
use crate::consumers::ConsumerRegistry;
use crate::controller::device_session::DeviceSession;
use crate::controller::edge_engine::EdgeEngine;
use crate::controller::normalizer::Normalizer;
use crate::controller::sampler::Sample;
use crate::controller::signals::{SignalId, TransitionEvent};
use chrono::Local;
use statum::{machine, state};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

/// Poll periods of the dispatcher loop
///
/// # Performance Impact
///
/// - `poll_interval`: runs for the whole game session, so it trades shortcut
///   latency against background CPU; 16ms keeps the chord responsive at
///   roughly 60 reads per second
/// - `visible_poll_interval`: only active while the overlay is navigated,
///   where repeat timing is visible to the user
///
/// While no controller is open the loop keeps ticking at `poll_interval`
/// purely to drain device notices; no frames are read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatcherSettings {
    /// Background period (shortcut detection only)
    pub poll_interval: Duration,

    /// Period while a fast-polling consumer is enabled
    pub visible_poll_interval: Duration,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(16),
            visible_poll_interval: Duration::from_millis(8),
        }
    }
}

/// Counters over the worker's lifetime
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Ticks that read a frame
    pub ticks: u64,
    /// Ticks without an open controller (notice draining only)
    pub dormant_ticks: u64,
    pub events: u64,
    /// Batches handed to consumers, one per enabled consumer per tick
    pub deliveries: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerCommand {
    /// Try to open a controller again after removal
    Reopen,

    /// Swap deadzone, repeat/debounce timing and poll periods in place
    UpdateSettings(Settings),
}

#[state]
#[derive(Debug, Clone)]
pub enum PollState {
    Ready,
    Polling,
    Stopped,
}

#[machine]
#[derive(Debug)]
pub struct PollWorker<S: PollState> {
    session: DeviceSession,
    normalizer: Normalizer,
    engine: EdgeEngine,
    registry: Arc<ConsumerRegistry>,
    settings: DispatcherSettings,

    // Reused every tick
    batch: Vec<TransitionEvent>,

    stats: TickStats,
}

impl<S: PollState> PollWorker<S> {
    pub fn session(&self) -> &DeviceSession {
        &self.session
    }

    pub fn stats(&self) -> &TickStats {
        &self.stats
    }

    pub fn engine(&self) -> &EdgeEngine {
        &self.engine
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }
}

impl PollWorker<Ready> {
    pub fn create(
        session: DeviceSession,
        settings: &Settings,
        registry: Arc<ConsumerRegistry>,
    ) -> Self {
        let dispatcher_settings = settings.dispatcher_settings();
        info!(
            "Creating poll worker (deadzone {}, repeat {}ms, debounce {}ms, periods {:?}/{:?})",
            settings.deadzone,
            settings.repeat_delay_ms,
            settings.debounce_ms,
            dispatcher_settings.poll_interval,
            dispatcher_settings.visible_poll_interval
        );

        Self::new(
            session,
            Normalizer::new(settings.deadzone),
            EdgeEngine::new(settings.edge_settings()),
            registry,
            dispatcher_settings,
            Vec::with_capacity(SignalId::COUNT),
            TickStats::default(),
        )
    }

    pub fn start(self) -> PollWorker<Polling> {
        info!(
            "Poll worker starting ({} consumers, device: {})",
            self.registry.len(),
            self.session.device_name().unwrap_or("none")
        );
        self.transition()
    }
}

impl PollWorker<Polling> {
    /// One pipeline pass: sample → normalize → edge-diff → deliver
    ///
    /// Runs synchronously; every enabled consumer has returned before this
    /// does. Without an open controller the pass only drains device notices
    /// and counts a dormant tick.
    ///
    /// # Arguments
    ///
    /// * `now` - Timestamp for the produced events and the repeat timers
    ///
    /// # Returns
    ///
    /// Number of events the edge engine produced this tick, regardless of
    /// how many consumers were enabled to receive them.
    pub fn tick(&mut self, now: Instant) -> usize {
        let frame = match self.session.sample() {
            Sample::Frame(frame) => frame,
            Sample::Dormant => {
                self.stats.dormant_ticks += 1;
                return 0;
            }
        };

        let state = self.normalizer.normalize(&frame);
        self.batch.clear();
        self.engine.update_into(&state, now, &mut self.batch);
        self.stats.ticks += 1;

        if self.batch.is_empty() {
            return 0;
        }

        for event in &self.batch {
            debug!("{} {:?}", event.signal, event.kind);
        }

        let delivered = self.registry.deliver(&self.batch);
        self.stats.events += self.batch.len() as u64;
        self.stats.deliveries += delivered as u64;
        self.batch.len()
    }

    /// Period for the next tick given the session and enabled consumers
    pub fn desired_period(&self) -> Duration {
        if self.session.is_open() && self.registry.wants_fast_polling() {
            self.settings.visible_poll_interval
        } else {
            self.settings.poll_interval
        }
    }

    pub fn handle_command(&mut self, command: WorkerCommand) {
        match command {
            WorkerCommand::Reopen => {
                if self.session.is_open() {
                    debug!("Reopen requested but a controller is already open");
                    return;
                }
                info!("Reopening controller");
                match self.session.open() {
                    Ok(device) => info!("Controller input resumed on {}", device.name),
                    Err(e) => warn!("Reopen failed: {}", e),
                }
            }
            WorkerCommand::UpdateSettings(settings) => {
                info!("Applying input settings: {:?}", settings);
                self.normalizer = Normalizer::new(settings.deadzone);
                self.engine.update_settings(settings.edge_settings());
                self.settings = settings.dispatcher_settings();
            }
        }
    }

    /// Ticks until `cancel` fires; an in-flight tick always completes first
    pub async fn run_until_cancelled(
        mut self,
        cancel: CancellationToken,
        mut commands: mpsc::UnboundedReceiver<WorkerCommand>,
    ) -> PollWorker<Stopped> {
        let mut period = self.desired_period();
        info!("Entering poll loop with {:?} period", period);
        let mut interval_timer = tokio::time::interval(period);
        interval_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Stats for performance monitoring
        let mut last_stats_time = Local::now();
        let mut last_stats = self.stats.clone();
        let stats_interval = chrono::Duration::seconds(30);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Poll loop cancelled");
                    break;
                }

                Some(command) = commands.recv() => {
                    self.handle_command(command);
                    interval_timer.reset();
                }

                _ = interval_timer.tick() => {
                    let was_open = self.session.is_open();
                    self.tick(Instant::now());

                    if was_open && !self.session.is_open() {
                        warn!("Controller lost, only draining device notices until reopened");
                    }
                }
            }

            let desired = self.desired_period();
            if desired != period {
                info!("Updating poll period to {:?}", desired);
                period = desired;
                interval_timer = interval_from_now(period);
            }

            let now = Local::now();
            if now - last_stats_time > stats_interval {
                let elapsed_seconds = (now - last_stats_time).num_seconds().max(1);
                let ticks = self.stats.ticks - last_stats.ticks;
                let events = self.stats.events - last_stats.events;
                info!(
                    "Poll stats: {} ticks, {} events, {} deliveries in {} seconds ({:.1} ticks/sec)",
                    ticks,
                    events,
                    self.stats.deliveries - last_stats.deliveries,
                    elapsed_seconds,
                    ticks as f64 / elapsed_seconds as f64
                );
                last_stats = self.stats.clone();
                last_stats_time = now;
            }
        }

        info!("Transitioning poll worker to Stopped");
        self.transition()
    }
}

impl PollWorker<Stopped> {
    /// Flushes held signals and closes the device
    pub fn shutdown(mut self) -> TickStats {
        let releases = self.engine.release_all(Instant::now());
        if !releases.is_empty() {
            debug!("Flushing {} held signals on shutdown", releases.len());
            self.registry.deliver(&releases);
        }

        self.session.close();
        info!("Poll worker stopped: {:?}", self.stats);
        self.stats.clone()
    }
}

fn interval_from_now(period: Duration) -> Interval {
    let mut interval_timer = tokio::time::interval_at(Instant::now() + period, period);
    interval_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval_timer
}

/// Owner side of a running poll worker
///
/// Dropping the handle cancels the loop; [`DispatcherHandle::shutdown`] also
/// waits for the device to be closed.
pub struct DispatcherHandle {
    cancel: DropGuard,
    commands: mpsc::UnboundedSender<WorkerCommand>,
    task: JoinHandle<TickStats>,
}

impl DispatcherHandle {
    pub fn spawn(worker: PollWorker<Ready>) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let (commands, command_rx) = mpsc::unbounded_channel();

        info!("Spawning poll worker task");
        let task = tokio::spawn(async move {
            let polling = worker.start();
            let stopped = polling.run_until_cancelled(token, command_rx).await;
            stopped.shutdown()
        });

        Self {
            cancel: cancel.drop_guard(),
            commands,
            task,
        }
    }

    /// Asks the worker to open a controller again (e.g. after removal)
    pub fn request_reopen(&self) -> bool {
        self.send(WorkerCommand::Reopen)
    }

    /// Hands already validated settings to the running worker
    pub fn update_settings(&self, settings: Settings) -> bool {
        self.send(WorkerCommand::UpdateSettings(settings))
    }

    fn send(&self, command: WorkerCommand) -> bool {
        match self.commands.send(command) {
            Ok(()) => true,
            Err(e) => {
                warn!("Poll worker is gone, {:?} ignored", e.0);
                false
            }
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops ticking, waits for the in-flight tick, then closes the device
    pub async fn shutdown(self) -> Option<TickStats> {
        let Self { cancel, task, .. } = self;
        drop(cancel);

        match task.await {
            Ok(stats) => Some(stats),
            Err(e) => {
                error!("Poll worker task failed: {}", e);
                None
            }
        }
    }
}
