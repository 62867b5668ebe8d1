//! Event consumers layered on the single poll loop
//!
//! Every consumer is registered once at startup and toggled afterwards. The
//! dispatcher hands each tick's event batch to the enabled registrations in
//! registration order.
//!
//! Each registration remembers which presses it was actually shown. A
//! consumer enabled in the middle of a hold never sees `Repeated` or
//! `Released` for that hold, so every signal it observes starts with
//! `Pressed`.
//!
//! ```text
//!                       ┌─► [enabled?] NavigationConsumer ──► UiCommand
//! Dispatcher ─[batch]───┤
//!                       └─► [enabled?] GlobalShortcutConsumer ──► UiCommand
//! ```

pub mod navigation;
pub mod shortcut;

pub use navigation::NavigationConsumer;
pub use shortcut::{GlobalShortcutConsumer, ShortcutCombo};

use crate::controller::signals::{CanonicalState, TransitionEvent, TransitionKind};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Receives transition batches on the dispatcher task
///
/// Implementations must not block; anything touching the UI is handed off as
/// a command.
pub trait Consumer: Send + 'static {
    fn name(&self) -> &str;

    /// Called once per tick with every event that tick produced
    fn consume(&mut self, events: &[TransitionEvent]);

    /// Asks the dispatcher for the short poll period while enabled
    fn wants_fast_polling(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerId(usize);

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "consumer#{}", self.0)
    }
}

struct Registration {
    name: String,
    enabled: AtomicBool,
    fast_polling: bool,
    slot: Mutex<Slot>,
}

struct Slot {
    consumer: Box<dyn Consumer>,

    // Signals whose Pressed reached this consumer and are not released yet
    shown: CanonicalState,
}

impl Slot {
    /// Updates the shown mask, false when the event must be withheld
    fn admit(&mut self, event: &TransitionEvent) -> bool {
        match event.kind {
            TransitionKind::Pressed => {
                self.shown.set(event.signal, true);
                true
            }
            TransitionKind::Repeated => self.shown.get(event.signal),
            TransitionKind::Released => {
                let shown = self.shown.get(event.signal);
                self.shown.set(event.signal, false);
                shown
            }
        }
    }

    fn forget(&mut self) {
        self.shown = CanonicalState::default();
    }
}

/// Ordered consumer list with thread-safe enable flags
#[derive(Default)]
pub struct ConsumerRegistry {
    registrations: Vec<Registration>,
}

impl fmt::Debug for ConsumerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for registration in &self.registrations {
            list.entry(&(
                &registration.name,
                registration.enabled.load(Ordering::SeqCst),
            ));
        }
        list.finish()
    }
}

impl ConsumerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a consumer at the end of the delivery order
    ///
    /// Registration happens once, before the registry is shared with the
    /// dispatcher; afterwards consumers are only toggled through
    /// [`ConsumerRegistry::enable`] and [`ConsumerRegistry::disable`].
    ///
    /// # Arguments
    ///
    /// * `consumer` - Receiver of the tick batches
    /// * `enabled` - Initial state; the global shortcut starts enabled, the
    ///   navigation consumer starts disabled until the overlay is shown
    ///
    /// # Returns
    ///
    /// The [`ConsumerId`] used to toggle this registration later.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use padnav::consumers::{ConsumerRegistry, NavigationConsumer};
    /// use padnav::overlay::ui_channel;
    ///
    /// let (ui_tx, _ui_rx) = ui_channel();
    /// let mut registry = ConsumerRegistry::new();
    /// let navigation = registry.register(Box::new(NavigationConsumer::new(ui_tx)), false);
    ///
    /// assert!(!registry.is_enabled(navigation));
    /// registry.enable(navigation);
    /// assert!(registry.wants_fast_polling());
    /// ```
    pub fn register(&mut self, consumer: Box<dyn Consumer>, enabled: bool) -> ConsumerId {
        let id = ConsumerId(self.registrations.len());
        let name = consumer.name().to_string();
        info!("Registering {} as {} (enabled: {})", name, id, enabled);
        self.registrations.push(Registration {
            name,
            enabled: AtomicBool::new(enabled),
            fast_polling: consumer.wants_fast_polling(),
            slot: Mutex::new(Slot {
                consumer,
                shown: CanonicalState::default(),
            }),
        });
        id
    }

    pub fn enable(&self, id: ConsumerId) {
        self.set_enabled(id, true);
    }

    pub fn disable(&self, id: ConsumerId) {
        self.set_enabled(id, false);
    }

    /// Toggles delivery; disabling also forgets the presses shown so far
    pub fn set_enabled(&self, id: ConsumerId, enabled: bool) {
        match self.registrations.get(id.0) {
            Some(registration) => {
                let previous = registration.enabled.swap(enabled, Ordering::SeqCst);
                if !enabled {
                    registration
                        .slot
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .forget();
                }
                if previous != enabled {
                    info!(
                        "{} {}",
                        if enabled { "Enabled" } else { "Disabled" },
                        registration.name
                    );
                }
            }
            None => warn!("Toggle for unknown {}", id),
        }
    }

    pub fn is_enabled(&self, id: ConsumerId) -> bool {
        self.registrations
            .get(id.0)
            .is_some_and(|registration| registration.enabled.load(Ordering::SeqCst))
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// True while any enabled consumer wants the short poll period
    pub fn wants_fast_polling(&self) -> bool {
        self.registrations
            .iter()
            .any(|r| r.fast_polling && r.enabled.load(Ordering::SeqCst))
    }

    /// Hands the batch to every enabled consumer, returns how many got it
    ///
    /// Events continuing a hold the consumer never saw pressed are withheld
    /// from that consumer only; a batch that ends up empty is not delivered.
    pub fn deliver(&self, events: &[TransitionEvent]) -> usize {
        if events.is_empty() {
            return 0;
        }

        let mut delivered = 0;
        for registration in &self.registrations {
            if !registration.enabled.load(Ordering::SeqCst) {
                continue;
            }
            let mut slot = registration
                .slot
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            // Copy only once something has to be withheld
            let mut filtered: Option<Vec<TransitionEvent>> = None;
            for (idx, event) in events.iter().enumerate() {
                let admitted = slot.admit(event);
                match (&mut filtered, admitted) {
                    (Some(kept), true) => kept.push(*event),
                    (None, false) => filtered = Some(events[..idx].to_vec()),
                    _ => {}
                }
            }
            let batch = filtered.as_deref().unwrap_or(events);
            if batch.is_empty() {
                debug!("Nothing for {} this tick", registration.name);
                continue;
            }

            debug!("Delivering {} events to {}", batch.len(), registration.name);
            slot.consumer.consume(batch);
            delivered += 1;
        }
        delivered
    }
}
