//! Controller Handle - lifecycle facade for the input core
//!
//! Opens the device session, builds the poll worker from [`Settings`] and
//! spawns it. Startup never fails because no pad is attached: the core simply
//! stays dormant until [`ControllerHandle::request_reopen`] finds one.
//!
//! Teardown order is fixed: cancel the loop, wait for the in-flight tick,
//! then close the device.

use crate::config::Settings;
use crate::consumers::ConsumerRegistry;
use crate::controller::device_session::{ControllerBackend, DeviceInfo, DeviceSession, SessionError};
use crate::controller::dispatcher::{DispatcherHandle, PollWorker, TickStats};
use crate::controller::gilrs_backend::GilrsBackend;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Device session error: {0}")]
    Session(#[from] SessionError),

    #[error("Invalid input settings: {0}")]
    InvalidSettings(String),
}

/// Owns the running poll worker
pub struct ControllerHandle {
    device: Option<DeviceInfo>,
    dispatcher: Option<DispatcherHandle>,
}

impl ControllerHandle {
    /// Spawns the poll worker on `backend`
    ///
    /// A missing or unsupported controller only logs a warning; the worker
    /// starts dormant, produces no events and waits for
    /// [`ControllerHandle::request_reopen`].
    ///
    /// # Startup
    ///
    /// 1. **Validation**: rejects settings the pipeline cannot run with
    /// 2. **Session**: enumerates devices and acquires the first supported one
    /// 3. **Worker**: builds normalizer, edge engine and poll periods from
    ///    `settings` and spawns the loop on the current tokio runtime
    ///
    /// # Errors
    ///
    /// * [`ControllerError::InvalidSettings`] - `settings.validate()` failed
    /// * [`ControllerError::Session`] - the backend failed in a way other
    ///   than "no compatible controller"
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use padnav::config::Settings;
    /// use padnav::consumers::ConsumerRegistry;
    /// use padnav::controller::mock::MockController;
    /// use padnav::controller::ControllerHandle;
    /// use std::sync::Arc;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let mock = MockController::with_gamepad("Pad");
    /// let registry = Arc::new(ConsumerRegistry::new());
    ///
    /// let handle = ControllerHandle::spawn(&Settings::default(), registry, mock.backend())?;
    /// assert!(handle.device().is_some());
    ///
    /// handle.shutdown().await;
    /// # Ok(())
    /// # }
    /// ```
    pub fn spawn(
        settings: &Settings,
        registry: Arc<ConsumerRegistry>,
        backend: Box<dyn ControllerBackend>,
    ) -> Result<Self, ControllerError> {
        settings
            .validate()
            .map_err(|e| ControllerError::InvalidSettings(e.to_string()))?;

        let mut session = DeviceSession::new(backend);
        info!(
            "Initializing controller input on {} backend with settings: {:?}",
            session.backend_name(),
            settings
        );

        let device = match session.open() {
            Ok(device) => Some(device),
            Err(SessionError::NoCompatibleDevice) => {
                warn!("No compatible controller found, input stays dormant");
                None
            }
            Err(e) => return Err(e.into()),
        };

        let worker = PollWorker::create(session, settings, registry);
        let dispatcher = DispatcherHandle::spawn(worker);
        info!("Controller input initialized");

        Ok(Self {
            device,
            dispatcher: Some(dispatcher),
        })
    }

    /// Spawns on the platform gamepad backend
    pub fn spawn_gilrs(
        settings: &Settings,
        registry: Arc<ConsumerRegistry>,
    ) -> Result<Self, ControllerError> {
        let backend = GilrsBackend::new()?;
        Self::spawn(settings, registry, Box::new(backend))
    }

    /// Handle without any poll loop, used when no backend is available
    pub fn dormant() -> Self {
        warn!("Controller input disabled, running without a gamepad backend");
        Self {
            device: None,
            dispatcher: None,
        }
    }

    /// Controller opened at startup, if any
    pub fn device(&self) -> Option<&DeviceInfo> {
        self.device.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.dispatcher
            .as_ref()
            .is_some_and(DispatcherHandle::is_running)
    }

    /// Asks the worker to look for a controller again
    pub fn request_reopen(&self) -> bool {
        match &self.dispatcher {
            Some(dispatcher) => dispatcher.request_reopen(),
            None => {
                warn!("Reopen requested without a gamepad backend");
                false
            }
        }
    }

    /// Applies new settings to the running worker from its next tick on
    ///
    /// The shortcut combination is owned by its consumer and is not part of
    /// the reload.
    pub fn update_settings(&self, settings: &Settings) -> Result<(), ControllerError> {
        settings
            .validate()
            .map_err(|e| ControllerError::InvalidSettings(e.to_string()))?;
        match &self.dispatcher {
            Some(dispatcher) => {
                dispatcher.update_settings(settings.clone());
                Ok(())
            }
            None => {
                debug!("No poll worker, settings update ignored");
                Ok(())
            }
        }
    }

    pub async fn shutdown(mut self) -> Option<TickStats> {
        let dispatcher = self.dispatcher.take()?;
        info!("Shutting down controller input");
        let stats = dispatcher.shutdown().await;
        if stats.is_none() {
            error!("Controller input did not stop cleanly");
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumers::tests::Recorder;
    use crate::controller::mock::MockController;
    use crate::controller::signals::{RawButtons, RawFrame};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn missing_controller_starts_dormant() {
        let mock = MockController::new();
        let handle = ControllerHandle::spawn(
            &Settings::default(),
            Arc::new(ConsumerRegistry::new()),
            mock.backend(),
        )
        .expect("dormant start is not an error");

        assert!(handle.device().is_none());
        assert!(handle.is_running());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(mock.read_count(), 0);

        handle.shutdown().await.expect("stats");
        assert_eq!(mock.release_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reopen_picks_up_late_controller() {
        let mock = MockController::new();
        let (recorder, seen) = Recorder::new("recorder");
        let mut registry = ConsumerRegistry::new();
        registry.register(Box::new(recorder), true);

        let handle =
            ControllerHandle::spawn(&Settings::default(), Arc::new(registry), mock.backend())
                .expect("spawn");

        mock.add_device("Late Pad", true);
        mock.set_frame(RawFrame::with_buttons(RawButtons::A));
        assert!(handle.request_reopen());
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(mock.acquire_count(), 1);
        assert!(!seen.lock().unwrap().is_empty());

        handle.shutdown().await.expect("stats");
        assert_eq!(mock.release_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn settings_reload_reaches_running_worker() {
        let mock = MockController::with_gamepad("Pad");
        let (recorder, seen) = Recorder::new("recorder");
        let mut registry = ConsumerRegistry::new();
        registry.register(Box::new(recorder), true);
        let handle =
            ControllerHandle::spawn(&Settings::default(), Arc::new(registry), mock.backend())
                .expect("spawn");

        let invalid = Settings {
            poll_interval_ms: 0,
            ..Settings::default()
        };
        assert!(matches!(
            handle.update_settings(&invalid),
            Err(ControllerError::InvalidSettings(_))
        ));

        let wide = Settings {
            deadzone: 20_000,
            ..Settings::default()
        };
        handle.update_settings(&wide).expect("valid settings");
        tokio::time::sleep(Duration::from_millis(20)).await;

        mock.set_frame(RawFrame::with_stick(0, -15_000));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(seen.lock().unwrap().is_empty());

        handle.shutdown().await.expect("stats");
    }

    #[tokio::test]
    async fn invalid_settings_are_rejected() {
        let settings = Settings {
            repeat_delay_ms: 0,
            ..Settings::default()
        };
        let result = ControllerHandle::spawn(
            &settings,
            Arc::new(ConsumerRegistry::new()),
            MockController::with_gamepad("Pad").backend(),
        );
        assert!(matches!(result, Err(ControllerError::InvalidSettings(_))));
    }

    #[tokio::test]
    async fn dormant_handle_has_no_loop() {
        let handle = ControllerHandle::dormant();
        assert!(!handle.is_running());
        assert!(!handle.request_reopen());
        assert!(handle.shutdown().await.is_none());
    }
}
