//! Global show/hide shortcut, active even while the overlay is hidden

use crate::consumers::Consumer;
use crate::controller::signals::{SignalId, TransitionEvent, TransitionKind};
use crate::overlay::{GameSession, UiCommand, UiSender};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Button combination that toggles the overlay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortcutCombo {
    /// Start and Back held together
    #[default]
    StartBack,
    /// Guide pressed
    Guide,
}

impl fmt::Display for ShortcutCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShortcutCombo::StartBack => write!(f, "Start+Back"),
            ShortcutCombo::Guide => write!(f, "Guide"),
        }
    }
}

pub struct GlobalShortcutConsumer {
    combo: ShortcutCombo,
    game: GameSession,
    ui: UiSender,

    start_held: bool,
    back_held: bool,
    // Chord already fired for the current hold
    latched: bool,
}

impl GlobalShortcutConsumer {
    pub fn new(combo: ShortcutCombo, game: GameSession, ui: UiSender) -> Self {
        info!("Global shortcut: {}", combo);
        Self {
            combo,
            game,
            ui,
            start_held: false,
            back_held: false,
            latched: false,
        }
    }

    fn track(&mut self, event: &TransitionEvent) -> bool {
        let held = match event.kind {
            TransitionKind::Pressed | TransitionKind::Repeated => true,
            TransitionKind::Released => false,
        };

        match (self.combo, event.signal) {
            (ShortcutCombo::Guide, SignalId::Guide) => event.kind == TransitionKind::Pressed,
            (ShortcutCombo::StartBack, SignalId::Start | SignalId::Back) => {
                if event.signal == SignalId::Start {
                    self.start_held = held;
                } else {
                    self.back_held = held;
                }

                let chord = self.start_held && self.back_held;
                if !chord {
                    self.latched = false;
                    return false;
                }
                if self.latched {
                    return false;
                }
                self.latched = true;
                true
            }
            _ => false,
        }
    }

    fn trigger(&self) {
        if self.game.is_running() {
            info!("{} shortcut, toggling overlay", self.combo);
            self.ui.send(UiCommand::ToggleOverlay);
        } else {
            debug!("{} shortcut ignored, no game session running", self.combo);
        }
    }
}

impl Consumer for GlobalShortcutConsumer {
    fn name(&self) -> &str {
        "global-shortcut"
    }

    fn consume(&mut self, events: &[TransitionEvent]) {
        for event in events {
            if self.track(event) {
                self.trigger();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::ui_channel;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::Instant;

    fn ev(signal: SignalId, kind: TransitionKind) -> TransitionEvent {
        TransitionEvent {
            signal,
            kind,
            timestamp: Instant::now(),
        }
    }

    fn count(rx: &mut UnboundedReceiver<UiCommand>) -> usize {
        let mut n = 0;
        while let Ok(command) = rx.try_recv() {
            assert_eq!(command, UiCommand::ToggleOverlay);
            n += 1;
        }
        n
    }

    fn consumer(combo: ShortcutCombo) -> (GlobalShortcutConsumer, UnboundedReceiver<UiCommand>) {
        let game = GameSession::new();
        game.set_running(true);
        let (tx, rx) = ui_channel();
        (GlobalShortcutConsumer::new(combo, game, tx), rx)
    }

    #[test]
    fn start_back_fires_once_per_chord() {
        let (mut shortcut, mut rx) = consumer(ShortcutCombo::StartBack);

        shortcut.consume(&[ev(SignalId::Start, TransitionKind::Pressed)]);
        assert_eq!(count(&mut rx), 0);

        shortcut.consume(&[ev(SignalId::Back, TransitionKind::Pressed)]);
        assert_eq!(count(&mut rx), 1);

        // holding on does not retrigger
        shortcut.consume(&[
            ev(SignalId::Start, TransitionKind::Repeated),
            ev(SignalId::Back, TransitionKind::Repeated),
        ]);
        assert_eq!(count(&mut rx), 0);

        // release one, press again
        shortcut.consume(&[ev(SignalId::Back, TransitionKind::Released)]);
        shortcut.consume(&[ev(SignalId::Back, TransitionKind::Pressed)]);
        assert_eq!(count(&mut rx), 1);
    }

    #[test]
    fn chord_in_same_tick() {
        let (mut shortcut, mut rx) = consumer(ShortcutCombo::StartBack);
        shortcut.consume(&[
            ev(SignalId::Start, TransitionKind::Pressed),
            ev(SignalId::Back, TransitionKind::Pressed),
        ]);
        assert_eq!(count(&mut rx), 1);
    }

    #[test]
    fn guide_combo_ignores_start_back() {
        let (mut shortcut, mut rx) = consumer(ShortcutCombo::Guide);
        shortcut.consume(&[
            ev(SignalId::Start, TransitionKind::Pressed),
            ev(SignalId::Back, TransitionKind::Pressed),
        ]);
        assert_eq!(count(&mut rx), 0);

        shortcut.consume(&[ev(SignalId::Guide, TransitionKind::Pressed)]);
        shortcut.consume(&[ev(SignalId::Guide, TransitionKind::Repeated)]);
        assert_eq!(count(&mut rx), 1);
    }

    #[test]
    fn no_toggle_without_game_session() {
        let game = GameSession::new();
        let (tx, mut rx) = ui_channel();
        let mut shortcut = GlobalShortcutConsumer::new(ShortcutCombo::Guide, game.clone(), tx);

        shortcut.consume(&[ev(SignalId::Guide, TransitionKind::Pressed)]);
        assert_eq!(count(&mut rx), 0);

        game.set_running(true);
        shortcut.consume(&[ev(SignalId::Guide, TransitionKind::Pressed)]);
        assert_eq!(count(&mut rx), 1);
    }
}
