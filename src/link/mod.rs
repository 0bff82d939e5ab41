// Operator link abstractions
//
// The control loop only needs check-then-read semantics for single command
// bytes, plus a blocking numeric read used by gain entry. Production
// implementations cover a serial port and the local terminal; tests script
// their own.

mod console;
mod serial;

pub use console::ConsoleLink;
pub use serial::SerialLink;

use tracing::info;

/// Longest numeric token `read_number` will accumulate before giving up
const MAX_NUMBER_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operator link closed")]
    Closed,

    #[error("not a number: {0:?}")]
    Malformed(String),
}

/// Byte-oriented operator command link.
pub trait OperatorLink {
    /// Non-blocking: is at least one byte ready to read?
    fn readable(&mut self) -> bool;

    /// Blocking read of one byte.
    fn read_byte(&mut self) -> Result<u8, LinkError>;

    /// Blocking read of one whitespace-delimited numeric token.
    ///
    /// Skips leading whitespace, then accumulates until the next whitespace
    /// byte. Only gain entry uses this, and it substitutes a default on any
    /// error, so a malformed token is reported rather than retried.
    fn read_number(&mut self) -> Result<f32, LinkError> {
        let mut token = String::new();
        loop {
            let c = self.read_byte()? as char;
            if c.is_ascii_whitespace() {
                if token.is_empty() {
                    continue;
                }
                break;
            }
            token.push(c);
            if token.len() >= MAX_NUMBER_LEN {
                break;
            }
        }
        token
            .parse()
            .map_err(|_| LinkError::Malformed(token))
    }
}

impl<T: OperatorLink + ?Sized> OperatorLink for Box<T> {
    fn readable(&mut self) -> bool {
        (**self).readable()
    }

    fn read_byte(&mut self) -> Result<u8, LinkError> {
        (**self).read_byte()
    }

    fn read_number(&mut self) -> Result<f32, LinkError> {
        (**self).read_number()
    }
}

/// Fire-and-forget operator feedback channel. Never consulted for control
/// decisions.
pub trait NoticeSink {
    fn notice(&mut self, text: &str);
}

/// Production sink: forwards operator notices to the log stream.
#[derive(Debug, Default)]
pub struct TracingNotices;

impl NoticeSink for TracingNotices {
    fn notice(&mut self, text: &str) {
        info!("{}", text);
    }
}
