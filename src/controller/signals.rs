//! Shared vocabulary of the input pipeline
//!
//! Raw device readings ([`RawFrame`]), the canonical per-signal view
//! ([`CanonicalState`]) and the edge events handed to consumers
//! ([`TransitionEvent`]).

use std::fmt;
use std::ops::Index;
use tokio::time::Instant;

/// Logical signals the overlay understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalId {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    Start,
    Back,
    Guide,
}

impl SignalId {
    pub const COUNT: usize = 9;

    /// All signals in processing order
    pub const ALL: [SignalId; SignalId::COUNT] = [
        SignalId::Up,
        SignalId::Down,
        SignalId::Left,
        SignalId::Right,
        SignalId::A,
        SignalId::B,
        SignalId::Start,
        SignalId::Back,
        SignalId::Guide,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Directions get the extra release debounce, buttons don't
    pub fn is_directional(self) -> bool {
        matches!(
            self,
            SignalId::Up | SignalId::Down | SignalId::Left | SignalId::Right
        )
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignalId::Up => "Up",
            SignalId::Down => "Down",
            SignalId::Left => "Left",
            SignalId::Right => "Right",
            SignalId::A => "A",
            SignalId::B => "B",
            SignalId::Start => "Start",
            SignalId::Back => "Back",
            SignalId::Guide => "Guide",
        };
        write!(f, "{}", name)
    }
}

/// Digital button bits of one raw sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawButtons(u16);

impl RawButtons {
    pub const DPAD_UP: RawButtons = RawButtons(1 << 0);
    pub const DPAD_DOWN: RawButtons = RawButtons(1 << 1);
    pub const DPAD_LEFT: RawButtons = RawButtons(1 << 2);
    pub const DPAD_RIGHT: RawButtons = RawButtons(1 << 3);
    pub const A: RawButtons = RawButtons(1 << 4);
    pub const B: RawButtons = RawButtons(1 << 5);
    pub const START: RawButtons = RawButtons(1 << 6);
    pub const BACK: RawButtons = RawButtons(1 << 7);
    pub const GUIDE: RawButtons = RawButtons(1 << 8);

    pub const fn empty() -> Self {
        RawButtons(0)
    }

    pub fn contains(self, other: RawButtons) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn insert(&mut self, other: RawButtons) {
        self.0 |= other.0;
    }

    pub fn with(mut self, other: RawButtons) -> Self {
        self.insert(other);
        self
    }
}

/// One synchronous read of the controller
///
/// Axis values span the full `i16` range. `left_y` is screen oriented:
/// negative values point up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawFrame {
    pub buttons: RawButtons,
    pub left_x: i16,
    pub left_y: i16,
}

impl RawFrame {
    /// Nothing pressed, stick centred
    pub const fn neutral() -> Self {
        Self {
            buttons: RawButtons::empty(),
            left_x: 0,
            left_y: 0,
        }
    }

    pub fn with_buttons(buttons: RawButtons) -> Self {
        Self {
            buttons,
            ..Self::neutral()
        }
    }

    pub fn with_stick(left_x: i16, left_y: i16) -> Self {
        Self {
            buttons: RawButtons::empty(),
            left_x,
            left_y,
        }
    }
}

/// Active flag for every [`SignalId`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CanonicalState([bool; SignalId::COUNT]);

impl CanonicalState {
    pub fn get(&self, signal: SignalId) -> bool {
        self.0[signal.index()]
    }

    pub fn set(&mut self, signal: SignalId, active: bool) {
        self.0[signal.index()] = active;
    }

    pub fn any_active(&self) -> bool {
        self.0.iter().any(|active| *active)
    }

    pub fn active(&self) -> impl Iterator<Item = SignalId> + '_ {
        SignalId::ALL.into_iter().filter(|signal| self.get(*signal))
    }
}

impl Index<SignalId> for CanonicalState {
    type Output = bool;

    fn index(&self, signal: SignalId) -> &bool {
        &self.0[signal.index()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Pressed,
    Released,
    Repeated,
}

/// Edge event produced by the engine and fanned out to consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionEvent {
    pub signal: SignalId,
    pub kind: TransitionKind,
    pub timestamp: Instant,
}

impl TransitionEvent {
    pub fn is(&self, signal: SignalId, kind: TransitionKind) -> bool {
        self.signal == signal && self.kind == kind
    }
}
