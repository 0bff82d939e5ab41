// Serial operator link
//
// Wraps a serialport handle with the check-then-read semantics the control
// loop needs. Reads use a short port timeout internally but present a
// blocking interface: `read_byte` retries through timeouts until a byte
// arrives.

use std::io::Read;
use std::time::Duration;

use serialport::SerialPort;
use tracing::info;

use super::{LinkError, OperatorLink};

/// Internal port timeout; `read_byte` loops through these
const READ_TIMEOUT_MS: u64 = 100;

pub struct SerialLink {
    port: Box<dyn SerialPort>,
}

impl SerialLink {
    pub fn open(port_name: &str, baud: u32) -> Result<Self, LinkError> {
        info!("Opening operator link on {} at {} baud", port_name, baud);
        let port = serialport::new(port_name, baud)
            .timeout(Duration::from_millis(READ_TIMEOUT_MS))
            .open()?;
        Ok(Self { port })
    }
}

impl OperatorLink for SerialLink {
    fn readable(&mut self) -> bool {
        self.port.bytes_to_read().map(|n| n > 0).unwrap_or(false)
    }

    fn read_byte(&mut self) -> Result<u8, LinkError> {
        let mut buf = [0u8; 1];
        loop {
            match self.port.read(&mut buf) {
                Ok(0) => return Err(LinkError::Closed),
                Ok(_) => return Ok(buf[0]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
