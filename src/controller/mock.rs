//! Scripted controller backend
//!
//! Stands in for real hardware in tests and headless runs. The
//! [`MockController`] side stays with the caller to script frames, failures
//! and disconnects while the session owns the backend half.

use crate::controller::device_session::{
    ControllerBackend, DeviceId, DeviceInfo, DeviceNotice, SampleError,
};
use crate::controller::signals::RawFrame;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Default)]
struct MockState {
    devices: Vec<DeviceInfo>,
    frame: RawFrame,
    acquired: Option<DeviceId>,
    removed: bool,
    // What enumeration reports; lags `removed` while the table is deferred
    table_removed: bool,
    deferred_table: bool,
    fail_acquire: bool,
    failing_reads: u32,
    notices: VecDeque<DeviceNotice>,
    reads: u64,
    acquires: u32,
    releases: u32,
}

/// Script handle for a mock controller
#[derive(Debug, Clone, Default)]
pub struct MockController {
    state: Arc<Mutex<MockState>>,
}

impl MockController {
    pub fn new() -> Self {
        Self::default()
    }

    /// One supported gamepad attached
    pub fn with_gamepad(name: &str) -> Self {
        let mock = Self::new();
        mock.add_device(name, true);
        mock
    }

    pub fn add_device(&self, name: &str, supported: bool) -> DeviceId {
        let mut state = self.lock();
        let id = DeviceId(state.devices.len());
        state.devices.push(DeviceInfo {
            id,
            name: name.to_string(),
            supported,
        });
        id
    }

    pub fn backend(&self) -> Box<dyn ControllerBackend> {
        Box::new(MockBackend {
            state: Arc::clone(&self.state),
        })
    }

    pub fn set_frame(&self, frame: RawFrame) {
        self.lock().frame = frame;
    }

    pub fn fail_acquire(&self, fail: bool) {
        self.lock().fail_acquire = fail;
    }

    pub fn fail_next_reads(&self, count: u32) {
        self.lock().failing_reads = count;
    }

    /// Device list only follows plug/unplug once the notice is polled
    ///
    /// Mirrors gilrs, whose gamepad table is updated inside `next_event`.
    pub fn defer_device_table(&self, defer: bool) {
        self.lock().deferred_table = defer;
    }

    pub fn push_notice(&self, notice: DeviceNotice) {
        self.lock().notices.push_back(notice);
    }

    /// Unplugs the acquired device
    pub fn disconnect(&self) {
        let mut state = self.lock();
        state.removed = true;
        if !state.deferred_table {
            state.table_removed = true;
        }
        if let Some(id) = state.acquired {
            state.notices.push_back(DeviceNotice::Disconnected(id));
        }
    }

    /// Plugs the device back in (a reopen is still needed)
    pub fn reconnect(&self) {
        let mut state = self.lock();
        state.removed = false;
        if !state.deferred_table {
            state.table_removed = false;
        }
        if let Some(device) = state.devices.iter().find(|d| d.supported) {
            let id = device.id;
            state.notices.push_back(DeviceNotice::Connected(id));
        }
    }

    pub fn acquired(&self) -> Option<DeviceId> {
        self.lock().acquired
    }

    pub fn read_count(&self) -> u64 {
        self.lock().reads
    }

    pub fn acquire_count(&self) -> u32 {
        self.lock().acquires
    }

    pub fn release_count(&self) -> u32 {
        self.lock().releases
    }

    pub fn pending_notices(&self) -> usize {
        self.lock().notices.len()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ControllerBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn enumerate(&self) -> Vec<DeviceInfo> {
        let state = self.lock();
        if state.table_removed {
            return Vec::new();
        }
        state.devices.clone()
    }

    fn acquire(&mut self, id: DeviceId) -> Result<(), String> {
        let mut state = self.lock();
        if state.fail_acquire {
            return Err("scripted acquire failure".to_string());
        }
        debug!("Mock backend acquired {}", id);
        state.acquired = Some(id);
        state.acquires += 1;
        Ok(())
    }

    fn poll_notice(&mut self) -> Option<DeviceNotice> {
        let mut state = self.lock();
        let notice = state.notices.pop_front()?;
        match notice {
            DeviceNotice::Connected(_) => state.table_removed = false,
            DeviceNotice::Disconnected(_) => state.table_removed = true,
            DeviceNotice::Other(_) => {}
        }
        Some(notice)
    }

    fn read(&mut self, id: DeviceId) -> Result<RawFrame, SampleError> {
        let mut state = self.lock();
        state.reads += 1;
        if state.removed || state.acquired != Some(id) {
            return Err(SampleError::DeviceRemoved);
        }
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(SampleError::ReadFailure("scripted read failure".to_string()));
        }
        Ok(state.frame)
    }

    fn release(&mut self, id: DeviceId) {
        let mut state = self.lock();
        debug!("Mock backend released {}", id);
        if state.acquired == Some(id) {
            state.acquired = None;
        }
        state.releases += 1;
    }
}
