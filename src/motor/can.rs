// CAN-side packing: arbitration id derivation and the fixed 8-byte message
//
// The bus message body is always 8 bytes. The declared length field counts
// 8-byte chunks of the full framed payload, so a frame longer than 8 bytes
// declares more chunks than the body can carry. The legacy firmware shipped
// exactly that mismatch; `OverflowPolicy` makes the choice explicit instead
// of silent (see DESIGN.md).

use serde::Deserialize;
use tracing::debug;

use super::frame::FrameError;

/// Fixed CAN body size in bytes
pub const CAN_BODY_LEN: usize = 8;

/// What the transmitter does with a framed payload longer than the 8-byte
/// bus body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Copy the first 8 bytes and declare the chunk count of the full
    /// frame. Bit-compatible with the legacy firmware; the dropped byte
    /// count is reported so the caller can flag it.
    LegacyTruncate,
    /// Refuse to build the message; the caller skips the transmit.
    Reject,
}

/// Arbitration id for a motor telemetry frame.
///
/// Fixed addressing formula shared with the bus listeners: a 0x200 base,
/// then group, site-select and axis packed into the low bits. Pure function
/// of its inputs.
pub fn motor_frame_id(group: u32, axis: u32, site_select: u32) -> u32 {
    0x200 | ((group & 0xF) << 6) | ((site_select & 0xF) << 2) | (axis & 0x3)
}

/// One outbound bus message: arbitration id, declared length in 8-byte
/// chunks, fixed-size body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanMessage {
    pub id: u32,
    pub len: u8,
    pub data: [u8; CAN_BODY_LEN],
}

/// A packed message plus how many framed bytes did not fit in the body
/// (non-zero only under `LegacyTruncate`).
#[derive(Debug, Clone, Copy)]
pub struct PackedFrame {
    pub message: CanMessage,
    pub dropped: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum CanError {
    #[error("bus driver rejected the write")]
    WriteRejected,

    #[error("bus io error: {0}")]
    Io(#[from] std::io::Error),
}

/// External bus driver. The transmitter hands it a finished message and
/// returns its success/failure signal unchanged; retries are the next
/// tick's job.
pub trait CanDriver {
    fn write(&mut self, msg: &CanMessage) -> Result<(), CanError>;
}

/// Stand-in driver for running the node without a transceiver attached:
/// logs each outbound message and reports success.
#[derive(Debug, Default)]
pub struct LogCanDriver;

impl CanDriver for LogCanDriver {
    fn write(&mut self, msg: &CanMessage) -> Result<(), CanError> {
        debug!(
            "can tx id=0x{:03X} len={} data={:02X?}",
            msg.id, msg.len, msg.data
        );
        Ok(())
    }
}

/// Builds bus messages for one motor's telemetry stream.
#[derive(Debug, Clone, Copy)]
pub struct CanTransmitter {
    id: u32,
    policy: OverflowPolicy,
}

impl CanTransmitter {
    pub fn new(group: u32, axis: u32, site_select: u32, policy: OverflowPolicy) -> Self {
        Self {
            id: motor_frame_id(group, axis, site_select),
            policy,
        }
    }

    pub fn arbitration_id(&self) -> u32 {
        self.id
    }

    /// Pack a framed payload into a bus message.
    ///
    /// The declared length is `ceil(framed / 8)` chunks regardless of
    /// policy; the policy only decides whether an oversize frame becomes a
    /// truncated message or an error.
    pub fn pack(&self, framed: &[u8]) -> Result<PackedFrame, FrameError> {
        if framed.len() > CAN_BODY_LEN && self.policy == OverflowPolicy::Reject {
            return Err(FrameError::FrameTooLarge {
                framed: framed.len(),
                max: CAN_BODY_LEN,
            });
        }

        let copied = framed.len().min(CAN_BODY_LEN);
        let mut data = [0u8; CAN_BODY_LEN];
        data[..copied].copy_from_slice(&framed[..copied]);

        Ok(PackedFrame {
            message: CanMessage {
                id: self.id,
                len: framed.len().div_ceil(CAN_BODY_LEN) as u8,
                data,
            },
            dropped: framed.len() - copied,
        })
    }
}
