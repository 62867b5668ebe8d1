//! In-overlay navigation, enabled while the overlay is visible

use crate::consumers::Consumer;
use crate::controller::signals::{SignalId, TransitionEvent, TransitionKind};
use crate::overlay::{Direction, UiCommand, UiSender};
use tracing::debug;

pub struct NavigationConsumer {
    ui: UiSender,
}

impl NavigationConsumer {
    pub fn new(ui: UiSender) -> Self {
        Self { ui }
    }

    fn map(event: &TransitionEvent) -> Option<UiCommand> {
        let steps = matches!(event.kind, TransitionKind::Pressed | TransitionKind::Repeated);
        match event.signal {
            SignalId::Up if steps => Some(UiCommand::MoveFocus(Direction::Up)),
            SignalId::Down if steps => Some(UiCommand::MoveFocus(Direction::Down)),
            SignalId::Left if steps => Some(UiCommand::MoveFocus(Direction::Left)),
            SignalId::Right if steps => Some(UiCommand::MoveFocus(Direction::Right)),
            SignalId::A if event.kind == TransitionKind::Pressed => {
                Some(UiCommand::ActivateFocused)
            }
            SignalId::B if event.kind == TransitionKind::Pressed => Some(UiCommand::HideOverlay),
            _ => None,
        }
    }
}

impl Consumer for NavigationConsumer {
    fn name(&self) -> &str {
        "navigation"
    }

    fn consume(&mut self, events: &[TransitionEvent]) {
        for event in events {
            if let Some(command) = Self::map(event) {
                debug!("{} {:?} -> {:?}", event.signal, event.kind, command);
                self.ui.send(command);
            }
        }
    }

    fn wants_fast_polling(&self) -> bool {
        true
    }
}
