// BLDC motor node runtime
//
// Accepts single-character operator commands over a serial (or terminal)
// link, maintains the motor's control mode and setpoint, and publishes the
// motor state on a CAN bus at a fixed rate.

pub mod command;
pub mod config;
pub mod link;
pub mod motor;
pub mod runtime;

pub use config::NodeConfig;
pub use runtime::ControlLoop;
