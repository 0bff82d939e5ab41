// Outbound frame encoding: motor state -> telemetry payload -> fake-UDP frame
//
// Two stages. The inner encoder packs the motor state into a compact payload
// whose shape depends on the configured format. The outer stage wraps that
// payload in a one-byte length/marker envelope ("fake UDP"), a software
// framing layer used because the bus below has no datagram boundary concept.
//
// Both stages are capacity-checked: they report exactly how many bytes they
// wrote and fail with an explicit error instead of clipping.

use serde::Deserialize;

use super::state::{Motor, RunState};

/// Largest payload the one-byte envelope header can describe (6-bit length)
pub const MAX_PAYLOAD_LEN: usize = 63;

/// Marker in the top two bits of the envelope header
const ENVELOPE_MARKER: u8 = 0b0100_0000;

/// Fixed-point scale factors for the wire representation
const DUTY_SCALE: f32 = 10_000.0; // duty [-1.0, 1.0] -> i16
const SPEED_SCALE: f32 = 100.0; // rps -> centi-rps i16
const GAIN_SCALE: f32 = 1_000.0; // gain -> milli-units u16

/// Telemetry payload selection, fixed at configuration time.
///
/// `Pwm` carries run state and duty cycle only; `Speed` additionally carries
/// the speed setpoint and the three PID gains. This replaces what used to be
/// separate firmware builds per format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameFormat {
    Pwm,
    Speed,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("encode needs {needed} bytes but only {capacity} available")]
    PayloadOverflow { needed: usize, capacity: usize },

    #[error("payload of {len} bytes exceeds the 63-byte envelope limit")]
    PayloadTooLong { len: usize },

    #[error("framed payload of {framed} bytes exceeds the {max}-byte bus body")]
    FrameTooLarge { framed: usize, max: usize },
}

/// Inner payload encoder.
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    format: FrameFormat,
}

impl FrameEncoder {
    pub fn new(format: FrameFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    /// Encode the motor state into `out`, returning the byte count written.
    pub fn encode(&self, motor: &Motor, out: &mut [u8]) -> Result<usize, FrameError> {
        match self.format {
            FrameFormat::Pwm => encode_pwm(motor, out),
            FrameFormat::Speed => encode_speed(motor, out),
        }
    }
}

/// Status byte layout: bits 7-6 format tag, bits 5-4 run state, rest zero
fn status_byte(format: FrameFormat, run_state: RunState) -> u8 {
    let tag: u8 = match format {
        FrameFormat::Pwm => 0b00,
        FrameFormat::Speed => 0b01,
    };
    let state: u8 = match run_state {
        RunState::Coast => 0b00,
        RunState::Cw => 0b01,
        RunState::Ccw => 0b10,
        RunState::Brake => 0b11,
    };
    (tag << 6) | (state << 4)
}

fn check_capacity(needed: usize, out: &[u8]) -> Result<(), FrameError> {
    if needed > out.len() {
        return Err(FrameError::PayloadOverflow {
            needed,
            capacity: out.len(),
        });
    }
    Ok(())
}

fn scale_i16(value: f32, scale: f32) -> i16 {
    (value * scale)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

fn scale_u16(value: f32, scale: f32) -> u16 {
    (value * scale).round().clamp(0.0, u16::MAX as f32) as u16
}

/// PWM payload: status byte + duty as scaled i16 (little-endian), 3 bytes
fn encode_pwm(motor: &Motor, out: &mut [u8]) -> Result<usize, FrameError> {
    const LEN: usize = 3;
    check_capacity(LEN, out)?;

    out[0] = status_byte(FrameFormat::Pwm, motor.run_state());
    out[1..3].copy_from_slice(&scale_i16(motor.duty_cycle(), DUTY_SCALE).to_le_bytes());
    Ok(LEN)
}

/// Speed payload: status byte + speed (centi-rps i16) + kp/ki/kd
/// (milli-unit u16 each), all little-endian, 9 bytes
fn encode_speed(motor: &Motor, out: &mut [u8]) -> Result<usize, FrameError> {
    const LEN: usize = 9;
    check_capacity(LEN, out)?;

    let (kp, ki, kd) = motor.gains();
    out[0] = status_byte(FrameFormat::Speed, motor.run_state());
    out[1..3].copy_from_slice(&scale_i16(motor.speed_rps(), SPEED_SCALE).to_le_bytes());
    out[3..5].copy_from_slice(&scale_u16(kp, GAIN_SCALE).to_le_bytes());
    out[5..7].copy_from_slice(&scale_u16(ki, GAIN_SCALE).to_le_bytes());
    out[7..9].copy_from_slice(&scale_u16(kd, GAIN_SCALE).to_le_bytes());
    Ok(LEN)
}

/// Wrap a payload in the fake-UDP envelope: one header byte carrying a
/// marker and the 6-bit payload length, then the payload verbatim.
///
/// Never truncates: a payload that cannot be described or does not fit in
/// `out` is an error.
pub fn fake_udp_encode(payload: &[u8], out: &mut [u8]) -> Result<usize, FrameError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLong { len: payload.len() });
    }
    let framed = payload.len() + 1;
    check_capacity(framed, out)?;

    out[0] = ENVELOPE_MARKER | payload.len() as u8;
    out[1..framed].copy_from_slice(payload);
    Ok(framed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::state::Motor;

    #[test]
    fn pwm_payload_layout() {
        let mut motor = Motor::new();
        motor.set_run_state(RunState::Cw);
        motor.set_duty_cycle(0.5);

        let mut buf = [0u8; 16];
        let n = FrameEncoder::new(FrameFormat::Pwm)
            .encode(&motor, &mut buf)
            .unwrap();
        assert_eq!(n, 3);
        // tag 0b00, run state Cw = 0b01 in bits 5-4
        assert_eq!(buf[0], 0b0001_0000);
        assert_eq!(i16::from_le_bytes([buf[1], buf[2]]), 5_000);
    }

    #[test]
    fn speed_payload_layout() {
        let mut motor = Motor::new();
        motor.set_run_state(RunState::Ccw);
        motor.set_speed(1.5);
        motor.set_gains(0.30, 0.80);

        let mut buf = [0u8; 16];
        let n = FrameEncoder::new(FrameFormat::Speed)
            .encode(&motor, &mut buf)
            .unwrap();
        assert_eq!(n, 9);
        assert_eq!(buf[0], 0b0110_0000); // tag 0b01, Ccw
        assert_eq!(i16::from_le_bytes([buf[1], buf[2]]), 150);
        assert_eq!(u16::from_le_bytes([buf[3], buf[4]]), 300); // kp
        assert_eq!(u16::from_le_bytes([buf[5], buf[6]]), 800); // ki
        assert_eq!(u16::from_le_bytes([buf[7], buf[8]]), 200); // kd = ki/4
    }

    #[test]
    fn encode_is_deterministic() {
        let motor = Motor::new(); // Pwm, Brake, duty 0
        let encoder = FrameEncoder::new(FrameFormat::Pwm);

        let mut a = [0u8; 8];
        let mut b = [0u8; 8];
        let na = encoder.encode(&motor, &mut a).unwrap();
        let nb = encoder.encode(&motor, &mut b).unwrap();
        assert_eq!(a[..na], b[..nb]);
    }

    #[test]
    fn encode_rejects_short_buffer() {
        let motor = Motor::new();
        let mut buf = [0u8; 2];
        let err = FrameEncoder::new(FrameFormat::Pwm)
            .encode(&motor, &mut buf)
            .unwrap_err();
        assert_eq!(
            err,
            FrameError::PayloadOverflow {
                needed: 3,
                capacity: 2
            }
        );
    }

    #[test]
    fn envelope_prefixes_marker_and_length() {
        let payload = [0xAA, 0xBB, 0xCC];
        let mut out = [0u8; 8];
        let n = fake_udp_encode(&payload, &mut out).unwrap();
        assert_eq!(n, 4);
        assert_eq!(out[0], 0b0100_0000 | 3);
        assert_eq!(&out[1..4], &payload);
    }

    #[test]
    fn envelope_never_truncates() {
        let payload = [0u8; 10];
        let mut out = [0u8; 8];
        let err = fake_udp_encode(&payload, &mut out).unwrap_err();
        assert_eq!(
            err,
            FrameError::PayloadOverflow {
                needed: 11,
                capacity: 8
            }
        );

        let long = [0u8; 64];
        let mut big = [0u8; 128];
        let err = fake_udp_encode(&long, &mut big).unwrap_err();
        assert_eq!(err, FrameError::PayloadTooLong { len: 64 });
    }
}
