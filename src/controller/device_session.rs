//! Device session - lifetime of the one opened controller
//!
//! Enumerates devices through a [`ControllerBackend`], acquires the first
//! supported game controller and guarantees it is released exactly once.
//! Sampling lives in [`crate::controller::sampler`].

use crate::controller::signals::RawFrame;
use std::fmt;
use tracing::{debug, info, warn};

/// Backend-local device identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub usize);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Enumeration result, freely cloneable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub name: String,
    /// Recognised as a game controller the normalizer can map
    pub supported: bool,
}

/// Advisory connect/disconnect notices drained on every sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceNotice {
    Connected(DeviceId),
    Disconnected(DeviceId),
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No compatible game controller found")]
    NoCompatibleDevice,

    #[error("Input backend unavailable: {0}")]
    BackendUnavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("Failed to read controller: {0}")]
    ReadFailure(String),

    #[error("Controller was removed")]
    DeviceRemoved,
}

/// Platform input library seam
///
/// Implementations must keep `read` allocation free; it runs up to ~125
/// times per second.
pub trait ControllerBackend: Send + 'static {
    fn name(&self) -> &'static str;

    fn enumerate(&self) -> Vec<DeviceInfo>;

    fn acquire(&mut self, id: DeviceId) -> Result<(), String>;

    /// Next pending notice, `None` once the queue is empty
    fn poll_notice(&mut self) -> Option<DeviceNotice>;

    fn read(&mut self, id: DeviceId) -> Result<RawFrame, SampleError>;

    fn release(&mut self, id: DeviceId);
}

/// The opened controller. Never cloned; dropped only through the session.
#[derive(Debug)]
pub(crate) struct DeviceHandle {
    pub(crate) id: DeviceId,
    pub(crate) name: String,
}

pub struct DeviceSession {
    pub(crate) backend: Box<dyn ControllerBackend>,
    pub(crate) handle: Option<DeviceHandle>,
}

impl fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSession")
            .field("backend", &self.backend.name())
            .field("handle", &self.handle)
            .finish()
    }
}

impl DeviceSession {
    pub fn new(backend: Box<dyn ControllerBackend>) -> Self {
        debug!("Creating device session on backend {}", backend.name());
        Self {
            backend,
            handle: None,
        }
    }

    /// Opens the first supported controller
    ///
    /// Returns the already open device if there is one. Pending notices are
    /// drained first: backends such as gilrs only update their device table
    /// while their event queue is processed.
    ///
    /// # Errors
    ///
    /// * [`SessionError::NoCompatibleDevice`] - nothing attached, nothing
    ///   recognised as a game controller, or the acquire failed
    pub fn open(&mut self) -> Result<DeviceInfo, SessionError> {
        if let Some(handle) = &self.handle {
            debug!("Device {} already open", handle.id);
            return Ok(DeviceInfo {
                id: handle.id,
                name: handle.name.clone(),
                supported: true,
            });
        }

        while let Some(notice) = self.backend.poll_notice() {
            debug!("Device notice before open: {:?}", notice);
        }

        let devices = self.backend.enumerate();
        if devices.is_empty() {
            warn!("No input devices attached");
            return Err(SessionError::NoCompatibleDevice);
        }

        info!("Found {} input devices:", devices.len());
        for (idx, device) in devices.iter().enumerate() {
            info!(
                "  [{}] ID: {}, Name: {}, Supported: {}",
                idx, device.id, device.name, device.supported
            );
        }

        let Some(device) = devices.into_iter().find(|device| device.supported) else {
            warn!("None of the attached devices is a supported game controller");
            return Err(SessionError::NoCompatibleDevice);
        };

        if let Err(e) = self.backend.acquire(device.id) {
            warn!("Failed to open controller {} ({}): {}", device.name, device.id, e);
            return Err(SessionError::NoCompatibleDevice);
        }

        info!("Selected controller: {} ({})", device.name, device.id);
        self.handle = Some(DeviceHandle {
            id: device.id,
            name: device.name.clone(),
        });
        Ok(device)
    }

    /// Releases the handle; safe to call any number of times
    pub fn close(&mut self) {
        match self.handle.take() {
            Some(handle) => {
                info!("Closing controller {} ({})", handle.name, handle.id);
                self.backend.release(handle.id);
            }
            None => debug!("Device session already closed"),
        }
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn device_name(&self) -> Option<&str> {
        self.handle.as_ref().map(|handle| handle.name.as_str())
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.close();
    }
}
