//! Raw frame → canonical signals
//!
//! Directions are the OR of the d-pad bit and the thresholded left stick
//! axis; buttons map 1:1 to their raw bits.

use crate::controller::signals::{CanonicalState, RawButtons, RawFrame, SignalId};

/// Default stick deadzone (~30% of full scale)
pub const DEFAULT_DEADZONE: u16 = 10_000;

#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    deadzone: i32,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_DEADZONE)
    }
}

impl Normalizer {
    pub fn new(deadzone: u16) -> Self {
        Self {
            deadzone: i32::from(deadzone),
        }
    }

    pub fn deadzone(&self) -> u16 {
        self.deadzone as u16
    }

    pub fn normalize(&self, frame: &RawFrame) -> CanonicalState {
        let buttons = frame.buttons;
        let (x_neg, x_pos) = self.threshold(frame.left_x);
        let (y_neg, y_pos) = self.threshold(frame.left_y);

        let mut state = CanonicalState::default();
        state.set(SignalId::Up, buttons.contains(RawButtons::DPAD_UP) || y_neg);
        state.set(SignalId::Down, buttons.contains(RawButtons::DPAD_DOWN) || y_pos);
        state.set(SignalId::Left, buttons.contains(RawButtons::DPAD_LEFT) || x_neg);
        state.set(SignalId::Right, buttons.contains(RawButtons::DPAD_RIGHT) || x_pos);
        state.set(SignalId::A, buttons.contains(RawButtons::A));
        state.set(SignalId::B, buttons.contains(RawButtons::B));
        state.set(SignalId::Start, buttons.contains(RawButtons::START));
        state.set(SignalId::Back, buttons.contains(RawButtons::BACK));
        state.set(SignalId::Guide, buttons.contains(RawButtons::GUIDE));
        state
    }

    /// (negative-active, positive-active); the boundary itself is inactive
    fn threshold(&self, value: i16) -> (bool, bool) {
        let value = i32::from(value);
        (value < -self.deadzone, value > self.deadzone)
    }
}
