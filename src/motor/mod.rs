// Motor control module
//
// Provides:
// - The motor state container (mode, run state, setpoints, gains)
// - The two-stage outbound frame encoder (telemetry payload + fake-UDP envelope)
// - CAN-side packing and the bus driver trait

pub mod can;
pub mod frame;
pub mod state;

pub use can::{CanDriver, CanMessage, CanTransmitter, LogCanDriver, OverflowPolicy};
pub use frame::{FrameEncoder, FrameError, FrameFormat};
pub use state::{ControlMode, Motor, RunState};
