//! Edge/repeat engine
//!
//! Diffs the canonical state of each tick against the previously accepted
//! state and turns the difference into [`TransitionEvent`]s.
//!
//! ```text
//!             is=true                   held > repeat_delay
//!   Idle ───────────────► Held ────────────────────────────► Repeating
//!    ▲                     │                                    │  ▲
//!    │      is=false       │                                    └──┘
//!    └─────────────────────┴────────────────────────────────────┘
//! ```
//!
//! Directions additionally need to stay released for the debounce window
//! before a new press is accepted.

use crate::controller::signals::{
    CanonicalState, SignalId, TransitionEvent, TransitionKind,
};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

pub const DEFAULT_REPEAT_DELAY: Duration = Duration::from_millis(250);
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Timing of the edge/repeat engine
///
/// # Performance Impact
///
/// - `repeat_delay`: first repeat fires on the first tick after the delay,
///   later repeats every delay after that; the tick period adds up to one
///   period of jitter
/// - `debounce`: too low lets a drifting stick re-trigger a direction, too
///   high swallows quick double taps
///
/// # Examples
///
/// ```rust
/// use padnav::controller::{EdgeEngine, EdgeSettings};
/// use std::time::Duration;
///
/// let engine = EdgeEngine::new(EdgeSettings {
///     repeat_delay: Duration::from_millis(200),
///     ..EdgeSettings::default()
/// });
/// assert_eq!(engine.settings().debounce, Duration::from_millis(100));
/// ```
#[derive(Clone, Debug)]
pub struct EdgeSettings {
    /// Hold time before the first `Repeated`, and between repeats
    pub repeat_delay: Duration,

    /// Minimum release time before a direction may be pressed again
    ///
    /// Applies to Up/Down/Left/Right only; buttons are never debounced.
    pub debounce: Duration,
}

impl Default for EdgeSettings {
    fn default() -> Self {
        Self {
            repeat_delay: DEFAULT_REPEAT_DELAY,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Observable per-signal phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalPhase {
    Idle,
    Pressed,
    Held,
    Repeating,
}

#[derive(Debug, Clone, Copy)]
struct SignalTimer {
    pressed_at: Instant,
    last_fire: Instant,
    fired_repeat: bool,
}

impl SignalTimer {
    fn start(now: Instant) -> Self {
        Self {
            pressed_at: now,
            last_fire: now,
            fired_repeat: false,
        }
    }
}

/// Per-signal press/hold/release tracker
///
/// Owns the previous accepted [`CanonicalState`] and one timer per signal.
/// Lives inside the poll worker and is only touched from its task.
#[derive(Debug)]
pub struct EdgeEngine {
    settings: EdgeSettings,

    // Accepted state of the previous tick (debounced presses never get here)
    previous: CanonicalState,

    timers: [Option<SignalTimer>; SignalId::COUNT],
    released_at: [Option<Instant>; SignalId::COUNT],

    last_tick: Option<Instant>,
}

impl Default for EdgeEngine {
    fn default() -> Self {
        Self::new(EdgeSettings::default())
    }
}

impl EdgeEngine {
    pub fn new(settings: EdgeSettings) -> Self {
        debug!("Creating edge engine with settings: {:?}", settings);
        Self {
            settings,
            previous: CanonicalState::default(),
            timers: [None; SignalId::COUNT],
            released_at: [None; SignalId::COUNT],
            last_tick: None,
        }
    }

    pub fn settings(&self) -> &EdgeSettings {
        &self.settings
    }

    /// New timing applies from the next update; running holds keep their
    /// press time
    pub fn update_settings(&mut self, settings: EdgeSettings) {
        self.settings = settings;
    }

    /// Accepted state after the last update
    pub fn state(&self) -> &CanonicalState {
        &self.previous
    }

    pub fn update(&mut self, current: &CanonicalState, now: Instant) -> Vec<TransitionEvent> {
        let mut events = Vec::new();
        self.update_into(current, now, &mut events);
        events
    }

    /// Appends this tick's events to `out` in signal order
    pub fn update_into(
        &mut self,
        current: &CanonicalState,
        now: Instant,
        out: &mut Vec<TransitionEvent>,
    ) {
        for signal in SignalId::ALL {
            let was = self.previous[signal];
            let is = current[signal];

            match (was, is) {
                (false, true) => {
                    if self.is_debounced(signal, now) {
                        trace!("{} press suppressed by debounce window", signal);
                        continue;
                    }
                    self.timers[signal.index()] = Some(SignalTimer::start(now));
                    self.released_at[signal.index()] = None;
                    self.previous.set(signal, true);
                    out.push(event(signal, TransitionKind::Pressed, now));
                }
                (true, true) => {
                    let repeat_delay = self.settings.repeat_delay;
                    if let Some(timer) = self.timers[signal.index()].as_mut() {
                        if now.saturating_duration_since(timer.last_fire) > repeat_delay {
                            timer.last_fire = now;
                            timer.fired_repeat = true;
                            out.push(event(signal, TransitionKind::Repeated, now));
                        }
                    }
                }
                (true, false) => {
                    self.release(signal, now, out);
                }
                (false, false) => {}
            }
        }

        self.last_tick = Some(now);
    }

    /// Releases every held signal, as if an all-false frame arrived
    pub fn release_all(&mut self, now: Instant) -> Vec<TransitionEvent> {
        let mut events = Vec::new();
        for signal in SignalId::ALL {
            if self.previous[signal] {
                self.release(signal, now, &mut events);
            }
        }
        events
    }

    pub fn phase(&self, signal: SignalId) -> SignalPhase {
        if !self.previous[signal] {
            return SignalPhase::Idle;
        }
        match self.timers[signal.index()] {
            Some(timer) if timer.fired_repeat => SignalPhase::Repeating,
            Some(timer) if Some(timer.pressed_at) == self.last_tick => SignalPhase::Pressed,
            _ => SignalPhase::Held,
        }
    }

    /// Time since the signal was pressed, if it is held
    pub fn held_for(&self, signal: SignalId, now: Instant) -> Option<Duration> {
        self.timers[signal.index()].map(|timer| now.saturating_duration_since(timer.pressed_at))
    }

    fn release(&mut self, signal: SignalId, now: Instant, out: &mut Vec<TransitionEvent>) {
        self.timers[signal.index()] = None;
        self.previous.set(signal, false);
        if signal.is_directional() {
            self.released_at[signal.index()] = Some(now);
        }
        out.push(event(signal, TransitionKind::Released, now));
    }

    fn is_debounced(&self, signal: SignalId, now: Instant) -> bool {
        if !signal.is_directional() {
            return false;
        }
        match self.released_at[signal.index()] {
            Some(released) => now.saturating_duration_since(released) < self.settings.debounce,
            None => false,
        }
    }
}

fn event(signal: SignalId, kind: TransitionKind, timestamp: Instant) -> TransitionEvent {
    TransitionEvent {
        signal,
        kind,
        timestamp,
    }
}
