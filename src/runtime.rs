// Fixed-period control loop
//
// Each tick: drain every readable operator byte through the interpreter,
// then publish the motor state on the bus exactly once, then sleep until
// the next tick boundary. A publish happens every tick whether or not a
// command arrived. Everything inside a tick is synchronous, including the
// blocking numeric reads of gain entry, which stall the loop by design.

use tokio::time::interval;
use tracing::{info, warn};

use crate::command::{CommandInterpreter, Outcome};
use crate::config::NodeConfig;
use crate::link::{NoticeSink, OperatorLink};
use crate::motor::can::{CanDriver, CanError, CanTransmitter};
use crate::motor::frame::{fake_udp_encode, FrameEncoder, FrameError, MAX_PAYLOAD_LEN};
use crate::motor::Motor;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Can(#[from] CanError),
}

pub struct ControlLoop<L, C, N> {
    cfg: NodeConfig,
    motor: Motor,
    interpreter: CommandInterpreter,
    encoder: FrameEncoder,
    tx: CanTransmitter,
    link: L,
    bus: C,
    notices: N,
    warned_truncation: bool,
}

impl<L: OperatorLink, C: CanDriver, N: NoticeSink> ControlLoop<L, C, N> {
    pub fn new(cfg: NodeConfig, link: L, bus: C, notices: N) -> Self {
        let mut motor = Motor::new();
        motor.set_gains(cfg.default_kp, cfg.default_ki);

        let interpreter = CommandInterpreter::new(&cfg);
        let encoder = FrameEncoder::new(cfg.frame_format);
        let tx = CanTransmitter::new(cfg.group, cfg.axis, cfg.site_select, cfg.overflow_policy);

        Self {
            cfg,
            motor,
            interpreter,
            encoder,
            tx,
            link,
            bus,
            notices,
            warned_truncation: false,
        }
    }

    pub fn motor(&self) -> &Motor {
        &self.motor
    }

    pub fn bus(&self) -> &C {
        &self.bus
    }

    pub fn notices(&self) -> &N {
        &self.notices
    }

    /// One loop iteration, minus the sleep.
    pub fn tick(&mut self) {
        self.drain_input();
        if let Err(e) = self.publish() {
            // No retry within the tick; the next tick publishes again
            warn!("publish skipped: {}", e);
        }
    }

    fn drain_input(&mut self) {
        while self.link.readable() {
            let byte = match self.link.read_byte() {
                Ok(b) => b,
                Err(e) => {
                    warn!("operator link read failed: {}", e);
                    break;
                }
            };

            match self.interpreter.apply(&mut self.motor, byte, &mut self.notices) {
                Outcome::Handled => {}
                Outcome::GainEntry => {
                    // Publish the braked state before blocking on the two
                    // numeric reads.
                    if let Err(e) = self.publish() {
                        warn!("pre-tune publish skipped: {}", e);
                    }
                    self.interpreter
                        .read_gains(&mut self.motor, &mut self.link, &mut self.notices);
                }
            }
        }
    }

    /// Encode the current motor state and hand it to the bus driver.
    fn publish(&mut self) -> Result<(), PublishError> {
        let mut payload = [0u8; MAX_PAYLOAD_LEN];
        let payload_len = self.encoder.encode(&self.motor, &mut payload)?;

        let mut framed = [0u8; MAX_PAYLOAD_LEN + 1];
        let framed_len = fake_udp_encode(&payload[..payload_len], &mut framed)?;

        let packed = self.tx.pack(&framed[..framed_len])?;
        if packed.dropped > 0 && !self.warned_truncation {
            warn!(
                "framed payload is {} bytes; legacy wire format carries 8, dropping {}",
                framed_len, packed.dropped
            );
            self.warned_truncation = true;
        }

        self.bus.write(&packed.message)?;
        Ok(())
    }

    /// Run forever at the configured tick rate. Publishes the startup state
    /// once before the first tick.
    pub async fn run(mut self) {
        info!(
            "Control loop started: {}ms tick, frame format {:?}, can id 0x{:03X}",
            self.cfg.tick_ms,
            self.encoder.format(),
            self.tx.arbitration_id()
        );

        if let Err(e) = self.publish() {
            warn!("startup publish skipped: {}", e);
        }

        let mut tick = interval(self.cfg.tick_period());
        loop {
            tick.tick().await;
            self.tick();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkError;
    use crate::motor::can::{CanMessage, OverflowPolicy};
    use crate::motor::frame::FrameFormat;
    use crate::motor::{ControlMode, RunState};

    /// Link with a queue of pending bytes; `push` simulates operator input
    /// arriving between ticks.
    #[derive(Default)]
    struct QueueLink {
        pending: std::collections::VecDeque<u8>,
    }

    impl QueueLink {
        fn push(&mut self, script: &str) {
            self.pending.extend(script.as_bytes());
        }
    }

    impl OperatorLink for QueueLink {
        fn readable(&mut self) -> bool {
            !self.pending.is_empty()
        }

        fn read_byte(&mut self) -> Result<u8, LinkError> {
            self.pending.pop_front().ok_or(LinkError::Closed)
        }
    }

    /// Driver that records every message and can be made to fail.
    #[derive(Default)]
    struct RecordingBus {
        messages: Vec<CanMessage>,
        fail: bool,
    }

    impl CanDriver for RecordingBus {
        fn write(&mut self, msg: &CanMessage) -> Result<(), CanError> {
            if self.fail {
                return Err(CanError::WriteRejected);
            }
            self.messages.push(*msg);
            Ok(())
        }
    }

    #[derive(Default)]
    struct SilentNotices;

    impl NoticeSink for SilentNotices {
        fn notice(&mut self, _text: &str) {}
    }

    fn make_loop(cfg: NodeConfig) -> ControlLoop<QueueLink, RecordingBus, SilentNotices> {
        ControlLoop::new(cfg, QueueLink::default(), RecordingBus::default(), SilentNotices)
    }

    #[test]
    fn publishes_every_tick_without_input() {
        let mut cl = make_loop(NodeConfig::default());
        cl.tick();
        cl.tick();
        cl.tick();
        assert_eq!(cl.bus().messages.len(), 3);
        // Identical state encodes byte-identically
        assert_eq!(cl.bus().messages[0], cl.bus().messages[1]);
    }

    #[test]
    fn startup_pwm_frame_is_reproducible() {
        let mut cl = make_loop(NodeConfig::default());
        cl.tick();

        let msg = &cl.bus().messages[0];
        assert_eq!(msg.id, 0x240); // group 1, axis 0, site 0
        assert_eq!(msg.len, 1);
        // Envelope header (marker | payload len 3), then the PWM payload:
        // status byte (Pwm tag, Brake) and zero duty.
        assert_eq!(msg.data, [0b0100_0011, 0b0011_0000, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn drains_all_pending_bytes_before_publishing() {
        let mut cl = make_loop(NodeConfig::default());
        cl.link.push("d5w");
        cl.tick();

        assert_eq!(cl.motor().control_mode(), ControlMode::Pwm);
        assert_eq!(cl.motor().run_state(), RunState::Cw);
        assert!((cl.motor().duty_cycle() - 0.5).abs() < 1e-6);
        // One publish for the tick, reflecting the final drained state
        assert_eq!(cl.bus().messages.len(), 1);
        let duty = i16::from_le_bytes([cl.bus().messages[0].data[2], cl.bus().messages[0].data[3]]);
        assert_eq!(duty, 5_000);
    }

    #[test]
    fn gain_entry_publishes_braked_state_then_reads() {
        let cfg = NodeConfig {
            frame_format: FrameFormat::Speed,
            ..NodeConfig::default()
        };
        let mut cl = make_loop(cfg);
        // Switch to speed mode, spin, then tune: kp=0.5 ki=1.2
        cl.link.push("swg0.5 1.2\n");
        cl.tick();

        let (kp, ki, kd) = cl.motor().gains();
        assert!((kp - 0.5).abs() < 1e-6);
        assert!((ki - 1.2).abs() < 1e-6);
        assert!((kd - 0.3).abs() < 1e-6);
        assert_eq!(cl.motor().run_state(), RunState::Brake);
        // Pre-tune publish plus the tick's own publish
        assert_eq!(cl.bus().messages.len(), 2);
    }

    #[test]
    fn speed_frames_truncate_under_legacy_policy() {
        let cfg = NodeConfig {
            frame_format: FrameFormat::Speed,
            overflow_policy: OverflowPolicy::LegacyTruncate,
            ..NodeConfig::default()
        };
        let mut cl = make_loop(cfg);
        cl.tick();

        // 9-byte payload + 1 envelope byte: two declared chunks, 8-byte body
        let msg = &cl.bus().messages[0];
        assert_eq!(msg.len, 2);
        assert_eq!(msg.data[0], 0b0100_0000 | 9);
    }

    #[test]
    fn speed_frames_are_skipped_under_reject_policy() {
        let cfg = NodeConfig {
            frame_format: FrameFormat::Speed,
            overflow_policy: OverflowPolicy::Reject,
            ..NodeConfig::default()
        };
        let mut cl = make_loop(cfg);
        cl.tick();
        cl.tick();
        assert!(cl.bus().messages.is_empty());
    }

    #[test]
    fn bus_failure_does_not_stall_the_loop() {
        let mut cl = make_loop(NodeConfig::default());
        cl.bus.fail = true;
        cl.link.push("w");
        cl.tick();

        // Command still applied; transmit failure only skipped the publish
        assert_eq!(cl.motor().run_state(), RunState::Cw);
        assert!(cl.bus().messages.is_empty());

        // Next tick is the implicit retry
        cl.bus.fail = false;
        cl.tick();
        assert_eq!(cl.bus().messages.len(), 1);
    }
}
