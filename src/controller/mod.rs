//! Controller subsystem for the MegaInd board
//!
//! Implements the input and output paths on top of [`crate::bus`]:
//!
//! 1. [`sampler`] - periodic input polling and decoding
//! 2. [`button_state`] - shared button map and snapshots
//! 3. [`snapshot_queue`] - best-effort delivery of snapshots to subscribers
//! 4. [`actuators`] - lamp and fan outputs, per-lamp flashing tasks
//! 5. [`controller_handle`] - unified API and lifecycle management
//!
//! # Architecture
//!
//! ```text
//! Board ──► Sampler ──► ButtonState ──► SnapshotQueue ──► Consumer
//!   ▲                                                        │
//!   └────────────── ActuatorController ◄─────────────────────┘
//! ```
//!
//! The sampler runs every 50ms by default.

pub mod actuators;
pub mod button_state;
pub mod controller_handle;
pub mod error;
pub mod sampler;
pub mod snapshot_queue;

pub use actuators::{ActuatorController, PwmScaling};
pub use button_state::{ButtonSnapshot, ButtonState, LogicalButton};
pub use controller_handle::{ControllerHandle, LifecycleState};
pub use error::{ControllerError, LifecycleError, ValidationError};
pub use sampler::{AnalogThresholdWindow, SamplerSettings};
