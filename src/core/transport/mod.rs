//! Transport layer for the modem byte stream
//!
//! Supports:
//! - Serial ports (RS-232, USB-Serial adapters) through `serialport`
//! - The in-process virtual modem used for simulation and tests
//!
//! Every transport is blocking. A read waits at most one port-level
//! interval and reports "nothing arrived" as `Ok(0)`, never as an error.

mod serial;

pub use serial::{list_ports, SerialConfig, SerialFlowControl, SerialParity, SerialTransport};

use thiserror::Error;

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport was closed or never opened
    #[error("Not connected")]
    NotConnected,

    /// The peer hung up
    #[error("Disconnected")]
    Disconnected,
}

/// Ordered byte-stream endpoint the command engine talks through.
pub trait Transport: Send {
    /// Write all of `data`, flushing it to the wire.
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Read whatever is available into `buf`, waiting at most one
    /// port-level interval. Returns `Ok(0)` when that interval elapses
    /// without data.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Discard bytes received but not yet read.
    fn clear_input(&mut self) -> Result<(), TransportError>;

    /// Discard bytes written but not yet transmitted.
    fn clear_output(&mut self) -> Result<(), TransportError>;

    /// Release the underlying device. Calling it again is a no-op.
    fn close(&mut self) -> Result<(), TransportError>;

    /// Human-readable description of the endpoint
    fn connection_info(&self) -> String;
}

/// Render bytes for log output, escaping control characters.
pub(crate) fn escape(data: &[u8]) -> String {
    data.escape_ascii().to_string()
}
