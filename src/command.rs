// Operator command interpreter
//
// One byte per `apply` call. The command alphabet:
//   '0'-'9'  setpoint for the active control mode
//   'q'/'w'/'e'/'r'  run state: coast / CW / CCW / brake
//   'd'/'s'  switch to PWM / speed mode (brakes and zeroes the setpoint)
//   'g'      gain entry (speed mode only)
//   anything else  fail-safe brake
//
// Gain entry is the one sub-mode: it brakes the motor, the caller publishes
// that state, then `read_gains` blocks on two numeric reads from the link.

use tracing::warn;

use crate::config::NodeConfig;
use crate::link::{NoticeSink, OperatorLink};
use crate::motor::{ControlMode, Motor, RunState};

/// What the caller must do after a byte is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing further; state is up to date
    Handled,
    /// 'g' accepted: the motor is braked. Publish the braked state first,
    /// then call `read_gains` — it blocks until both values are read or
    /// defaulted.
    GainEntry,
}

pub struct CommandInterpreter {
    max_rps: f32,
    default_kp: f32,
    default_ki: f32,
}

impl CommandInterpreter {
    pub fn new(cfg: &NodeConfig) -> Self {
        Self {
            max_rps: cfg.max_rps,
            default_kp: cfg.default_kp,
            default_ki: cfg.default_ki,
        }
    }

    /// Apply one command byte to the motor state.
    pub fn apply<N: NoticeSink>(&self, motor: &mut Motor, byte: u8, notices: &mut N) -> Outcome {
        if byte.is_ascii_digit() {
            self.apply_digit(motor, byte - b'0', notices);
            return Outcome::Handled;
        }

        match byte {
            b'q' => {
                motor.set_run_state(RunState::Coast);
                notices.notice("state : Coast");
            }
            b'w' => {
                motor.set_run_state(RunState::Cw);
                notices.notice("state : CW");
            }
            b'e' => {
                motor.set_run_state(RunState::Ccw);
                notices.notice("state : CCW");
            }
            b'r' => {
                motor.set_run_state(RunState::Brake);
                notices.notice("state : Brake");
            }
            b'd' => {
                // Mode switch forces a safe stop and a zero setpoint
                motor.set_control_mode(ControlMode::Pwm);
                motor.set_run_state(RunState::Brake);
                motor.set_duty_cycle(0.0);
                notices.notice("PWM Mode");
            }
            b's' => {
                motor.set_control_mode(ControlMode::Speed);
                motor.set_run_state(RunState::Brake);
                motor.set_speed(0.0);
                notices.notice("Speed Control Mode");
            }
            b'g' => {
                if motor.control_mode() == ControlMode::Pwm {
                    notices.notice("PWM Mode (No gain settings required)");
                    return Outcome::Handled;
                }
                // Never tune gains while the motor could be moving
                motor.set_run_state(RunState::Brake);
                notices.notice("Gain Change Mode");
                return Outcome::GainEntry;
            }
            other => {
                // Unrecognized input always forces a stop
                motor.set_run_state(RunState::Brake);
                warn!("unrecognized command byte 0x{:02X}", other);
                notices.notice("***Input Error: Change state to Brake.***");
            }
        }
        Outcome::Handled
    }

    fn apply_digit<N: NoticeSink>(&self, motor: &mut Motor, digit: u8, notices: &mut N) {
        match motor.control_mode() {
            ControlMode::Pwm => {
                motor.set_duty_cycle(f32::from(digit) * 0.10);
                notices.notice(&format!("duty : 0.{}0", digit));
            }
            ControlMode::Speed => {
                // Linear map of '0'..'9' onto [0, max_rps]
                let rps = f32::from(digit) / (9.0 / self.max_rps);
                motor.set_speed(rps);
                notices.notice(&format!("rps  : {:.2}", rps));
            }
        }
    }

    /// Gain entry body: block on two numeric reads, substituting the
    /// configured default for any field that fails to read or parse, then
    /// apply both via the combined setter (kd is derived as ki / 4).
    pub fn read_gains<L: OperatorLink, N: NoticeSink>(
        &self,
        motor: &mut Motor,
        link: &mut L,
        notices: &mut N,
    ) {
        notices.notice("Kp : ");
        let kp = match link.read_number() {
            Ok(v) => v,
            Err(e) => {
                warn!("kp entry failed: {}", e);
                notices.notice("scan error [kp = default_kp]");
                self.default_kp
            }
        };

        notices.notice("Ki : ");
        let ki = match link.read_number() {
            Ok(v) => v,
            Err(e) => {
                warn!("ki entry failed: {}", e);
                notices.notice("scan error [ki = default_ki]");
                self.default_ki
            }
        };

        motor.set_gains(kp, ki);
        notices.notice("Speed Control Mode");
    }
}
