//! gilrs backed controller access

use crate::controller::device_session::{
    ControllerBackend, DeviceId, DeviceInfo, DeviceNotice, SampleError, SessionError,
};
use crate::controller::signals::{RawButtons, RawFrame};
use gilrs::{Axis, Button, EventType, Gamepad, GamepadId, Gilrs, MappingSource};
use tracing::{debug, error, info};

pub struct GilrsBackend {
    gilrs: Gilrs,

    // gilrs ids are opaque; remember the acquired one
    active: Option<GamepadId>,
}

impl GilrsBackend {
    pub fn new() -> Result<Self, SessionError> {
        info!("Initializing gilrs controller interface");
        match Gilrs::new() {
            Ok(gilrs) => {
                info!("Successfully initialized gilrs");
                Ok(Self {
                    gilrs,
                    active: None,
                })
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                Err(SessionError::BackendUnavailable(e.to_string()))
            }
        }
    }

    fn gamepad_id(&self, id: DeviceId) -> Option<GamepadId> {
        if let Some(active) = self.active {
            if usize::from(active) == id.0 {
                return Some(active);
            }
        }
        self.gilrs
            .gamepads()
            .map(|(gamepad_id, _)| gamepad_id)
            .find(|gamepad_id| usize::from(*gamepad_id) == id.0)
    }
}

impl ControllerBackend for GilrsBackend {
    fn name(&self) -> &'static str {
        "gilrs"
    }

    fn enumerate(&self) -> Vec<DeviceInfo> {
        self.gilrs
            .gamepads()
            .map(|(id, gamepad)| DeviceInfo {
                id: DeviceId(usize::from(id)),
                name: gamepad.name().to_string(),
                supported: is_supported(&gamepad),
            })
            .collect()
    }

    fn acquire(&mut self, id: DeviceId) -> Result<(), String> {
        let gamepad_id = self
            .gamepad_id(id)
            .ok_or_else(|| format!("gamepad {} is not attached", id))?;
        let gamepad = self
            .gilrs
            .connected_gamepad(gamepad_id)
            .ok_or_else(|| format!("gamepad {} is not connected", id))?;
        debug!(
            "Acquiring {} (UUID: {:?}, mapping: {:?})",
            gamepad.name(),
            gamepad.uuid(),
            gamepad.mapping_source()
        );
        self.active = Some(gamepad_id);
        Ok(())
    }

    fn poll_notice(&mut self) -> Option<DeviceNotice> {
        // Each event also updates the cached gamepad state read below
        let event = self.gilrs.next_event()?;
        let id = DeviceId(usize::from(event.id));
        Some(match event.event {
            EventType::Connected => DeviceNotice::Connected(id),
            EventType::Disconnected => DeviceNotice::Disconnected(id),
            other => DeviceNotice::Other(format!("{:?} on {}", other, id)),
        })
    }

    fn read(&mut self, id: DeviceId) -> Result<RawFrame, SampleError> {
        let gamepad_id = match self.active {
            Some(active) if usize::from(active) == id.0 => active,
            _ => {
                return Err(SampleError::ReadFailure(format!(
                    "gamepad {} was never acquired",
                    id
                )))
            }
        };
        let gamepad = self
            .gilrs
            .connected_gamepad(gamepad_id)
            .ok_or(SampleError::DeviceRemoved)?;

        let mut buttons = RawButtons::empty();
        for (button, bit) in BUTTON_BITS {
            if gamepad.is_pressed(button) {
                buttons.insert(bit);
            }
        }

        Ok(RawFrame {
            buttons,
            left_x: axis_to_i16(gamepad.value(Axis::LeftStickX)),
            // gilrs reports up as positive
            left_y: axis_to_i16(-gamepad.value(Axis::LeftStickY)),
        })
    }

    fn release(&mut self, id: DeviceId) {
        if matches!(self.active, Some(active) if usize::from(active) == id.0) {
            debug!("Releasing gamepad {}", id);
            self.active = None;
        }
    }
}

const BUTTON_BITS: [(Button, RawButtons); 9] = [
    (Button::DPadUp, RawButtons::DPAD_UP),
    (Button::DPadDown, RawButtons::DPAD_DOWN),
    (Button::DPadLeft, RawButtons::DPAD_LEFT),
    (Button::DPadRight, RawButtons::DPAD_RIGHT),
    (Button::South, RawButtons::A),
    (Button::East, RawButtons::B),
    (Button::Start, RawButtons::START),
    (Button::Select, RawButtons::BACK),
    (Button::Mode, RawButtons::GUIDE),
];

fn is_supported(gamepad: &Gamepad<'_>) -> bool {
    gamepad.is_connected() && gamepad.mapping_source() != MappingSource::None
}

fn axis_to_i16(value: f32) -> i16 {
    (value.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16
}
