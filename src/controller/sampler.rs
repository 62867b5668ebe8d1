//! Frame sampler
//!
//! One synchronous read per tick. Pending device notices are drained first so
//! the backend queue never builds up; read problems degrade to a neutral
//! frame so held signals get released.

use crate::controller::device_session::{DeviceNotice, DeviceSession, SampleError};
use crate::controller::signals::RawFrame;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sample {
    Frame(RawFrame),
    /// No device open, nothing to process this tick
    Dormant,
}

impl DeviceSession {
    pub fn sample(&mut self) -> Sample {
        let Some(active) = self.handle.as_ref().map(|handle| handle.id) else {
            // Keep the platform queue drained even without a device
            while let Some(notice) = self.backend.poll_notice() {
                match notice {
                    DeviceNotice::Connected(id) => {
                        info!("Controller {} connected, waiting for reopen", id)
                    }
                    other => debug!("Ignoring device notice while dormant: {:?}", other),
                }
            }
            return Sample::Dormant;
        };

        let mut removed = false;
        while let Some(notice) = self.backend.poll_notice() {
            match notice {
                DeviceNotice::Disconnected(id) if id == active => {
                    warn!("Controller {} disconnected", id);
                    removed = true;
                }
                DeviceNotice::Disconnected(id) => {
                    info!("Other controller {} disconnected", id);
                }
                DeviceNotice::Connected(id) if id == active => {
                    debug!("Controller {} reported connected", id);
                }
                DeviceNotice::Connected(id) => {
                    info!("Controller {} connected, staying on {}", id, active);
                }
                DeviceNotice::Other(detail) => {
                    debug!("Device notice: {}", detail);
                }
            }
        }

        if removed {
            self.handle_removal();
            return Sample::Frame(RawFrame::neutral());
        }

        match self.backend.read(active) {
            Ok(frame) => Sample::Frame(frame),
            Err(SampleError::ReadFailure(e)) => {
                warn!("Controller read failed, treating as released: {}", e);
                Sample::Frame(RawFrame::neutral())
            }
            Err(SampleError::DeviceRemoved) => {
                warn!("Controller {} vanished during read", active);
                self.handle_removal();
                Sample::Frame(RawFrame::neutral())
            }
        }
    }

    fn handle_removal(&mut self) {
        warn!("Closing device session, reopen required to resume input");
        self.close();
    }
}
