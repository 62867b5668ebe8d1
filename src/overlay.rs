//! UI thread side of the input core
//!
//! Consumers run on the dispatcher task and never touch UI objects. They send
//! [`UiCommand`]s over an unbounded FIFO channel; the [`UiBridge`] owned by the
//! UI thread applies them to an [`OverlayView`] and keeps the navigation
//! consumer enabled exactly while the overlay is visible.

use crate::consumers::{ConsumerId, ConsumerRegistry};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiCommand {
    MoveFocus(Direction),
    ActivateFocused,
    HideOverlay,
    ToggleOverlay,
}

/// Operations the overlay window exposes to the input core
pub trait OverlayView {
    fn move_focus(&mut self, direction: Direction);

    fn activate_focused(&mut self);

    fn set_visible(&mut self, visible: bool);

    fn is_visible(&self) -> bool;
}

pub fn ui_channel() -> (UiSender, mpsc::UnboundedReceiver<UiCommand>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        UiSender {
            tx,
            closed_logged: Arc::new(AtomicBool::new(false)),
        },
        rx,
    )
}

/// Sending half handed to consumers
#[derive(Debug, Clone)]
pub struct UiSender {
    tx: mpsc::UnboundedSender<UiCommand>,
    closed_logged: Arc<AtomicBool>,
}

impl UiSender {
    /// Queues a command; only fails once the UI side is gone
    pub fn send(&self, command: UiCommand) -> bool {
        match self.tx.send(command) {
            Ok(()) => true,
            Err(e) => {
                if !self.closed_logged.swap(true, Ordering::Relaxed) {
                    warn!("UI thread is gone, dropping commands ({:?})", e.0);
                }
                false
            }
        }
    }
}

/// Shared "a tracked game is running" flag, set by process discovery
#[derive(Debug, Clone, Default)]
pub struct GameSession {
    running: Arc<AtomicBool>,
}

impl GameSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_running(&self, running: bool) {
        let previous = self.running.swap(running, Ordering::SeqCst);
        if previous != running {
            info!("Game session {}", if running { "started" } else { "ended" });
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Applies queued commands on the UI thread
pub struct UiBridge {
    receiver: mpsc::UnboundedReceiver<UiCommand>,
    registry: Arc<ConsumerRegistry>,
    navigation: ConsumerId,
}

impl UiBridge {
    pub fn new(
        receiver: mpsc::UnboundedReceiver<UiCommand>,
        registry: Arc<ConsumerRegistry>,
        navigation: ConsumerId,
    ) -> Self {
        Self {
            receiver,
            registry,
            navigation,
        }
    }

    /// Drains everything queued so far without blocking (frame loops)
    pub fn pump(&mut self, view: &mut dyn OverlayView) -> usize {
        let mut applied = 0;
        while let Ok(command) = self.receiver.try_recv() {
            self.apply(command, view);
            applied += 1;
        }
        applied
    }

    pub async fn recv(&mut self) -> Option<UiCommand> {
        self.receiver.recv().await
    }

    pub fn apply(&self, command: UiCommand, view: &mut dyn OverlayView) {
        debug!("Applying UI command {:?}", command);
        match command {
            UiCommand::MoveFocus(direction) => {
                if view.is_visible() {
                    view.move_focus(direction);
                }
            }
            UiCommand::ActivateFocused => {
                if view.is_visible() {
                    view.activate_focused();
                }
            }
            UiCommand::HideOverlay => self.set_visible(view, false),
            UiCommand::ToggleOverlay => {
                let visible = view.is_visible();
                self.set_visible(view, !visible);
            }
        }
    }

    /// Shows or hides the overlay and toggles navigation with it
    pub fn set_visible(&self, view: &mut dyn OverlayView, visible: bool) {
        if view.is_visible() != visible {
            info!("{} overlay", if visible { "Showing" } else { "Hiding" });
            view.set_visible(visible);
        }
        self.registry.set_enabled(self.navigation, visible);
    }
}
