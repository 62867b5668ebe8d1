//! Controller subsystem for gamepad input handling
//!
//! Implements a single-loop processing pipeline:
//!
//! 1. [`device_session`] - Controller discovery and handle ownership
//! 2. [`sampler`] - One raw frame per tick
//! 3. [`normalizer`] - Raw frame to canonical signals
//! 4. [`edge_engine`] - Pressed/Released/Repeated detection with hold-repeat
//! 5. [`dispatcher`] - Poll loop and fan-out to consumers
//! 6. [`controller_handle`] - Unified API and lifecycle management
//!
//! # Architecture
//!
//! ```text
//! Gamepad ──► Sampler ──► Normalizer ──► EdgeEngine ──► ConsumerRegistry
//!            (RawFrame)  (CanonicalState) (TransitionEvent batch)
//! ```
//!
//! Everything runs on one tokio task at 16ms, or 8ms while the overlay is
//! being navigated.

pub mod controller_handle;
pub mod device_session;
pub mod dispatcher;
pub mod edge_engine;
pub mod gilrs_backend;
pub mod mock;
pub mod normalizer;
pub mod sampler;
pub mod signals;

pub use controller_handle::{ControllerError, ControllerHandle};
pub use device_session::{ControllerBackend, DeviceId, DeviceInfo, DeviceSession, SessionError};
pub use dispatcher::{DispatcherSettings, TickStats};
pub use edge_engine::{EdgeEngine, EdgeSettings};
pub use normalizer::Normalizer;
pub use signals::{RawButtons, RawFrame, SignalId, TransitionEvent, TransitionKind};
