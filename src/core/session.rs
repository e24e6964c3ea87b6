//! Command session: one request/response exchange
//!
//! A session clears stale input, resynchronizes the modem's line parser with a
//! bare carriage return, writes the command and then reads until the response
//! is classified or the exchange deadline passes.
//!
//! Two bounds govern the read loop. Each read waits at most one port-level
//! interval and may return nothing; after every read the wall-clock deadline
//! for the whole exchange is checked. Receiving bytes never extends it.

use super::accumulator::{Classification, ResponseAccumulator};
use super::error::LinkError;
use super::transport::{escape, Transport, TransportError};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Line terminator appended to every command
pub const LINE_TERMINATOR: &[u8] = b"\r";

/// How the bring-up handshake treats the echo-disable step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandshakePolicy {
    /// Write `ATE0` and assume it was accepted
    Prime,
    /// Prime, then run `ATE0` as a full exchange and require `OK`
    #[default]
    Verify,
}

/// Timing and handshake settings for a link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Pause after opening the device before the first write
    pub open_settle_ms: u64,
    /// Pause after the resync line and after each handshake write
    pub write_settle_ms: u64,
    /// Deadline for a whole exchange
    pub exchange_timeout_ms: u64,
    /// Size of each read from the transport
    pub read_chunk: usize,
    /// Handshake policy
    pub handshake: HandshakePolicy,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            open_settle_ms: 200,
            write_settle_ms: 50,
            exchange_timeout_ms: 2000,
            read_chunk: 128,
            handshake: HandshakePolicy::Verify,
        }
    }
}

impl LinkConfig {
    /// Settle delay after opening
    pub fn open_settle(&self) -> Duration {
        Duration::from_millis(self.open_settle_ms)
    }

    /// Settle delay between writes
    pub fn write_settle(&self) -> Duration {
        Duration::from_millis(self.write_settle_ms)
    }

    /// Exchange deadline
    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_millis(self.exchange_timeout_ms)
    }

    /// Set the exchange deadline
    #[must_use]
    pub fn with_exchange_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set both settle delays
    #[must_use]
    pub fn with_settle(mut self, open: Duration, write: Duration) -> Self {
        self.open_settle_ms = u64::try_from(open.as_millis()).unwrap_or(u64::MAX);
        self.write_settle_ms = u64::try_from(write.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the handshake policy
    #[must_use]
    pub fn with_handshake(mut self, policy: HandshakePolicy) -> Self {
        self.handshake = policy;
        self
    }
}

/// Outcome of an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Response ended with `OK`
    Success,
    /// Modem reported `ERROR` or `+CME ERROR:`
    DeviceError,
    /// Deadline passed without a terminator
    Timeout,
    /// Write or read failed at the byte-stream level
    TransportError,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::DeviceError => write!(f, "device error"),
            Self::Timeout => write!(f, "timeout"),
            Self::TransportError => write!(f, "transport error"),
        }
    }
}

/// A finished exchange. The response is kept whatever the status.
#[derive(Debug)]
pub struct Exchange {
    /// Command as given by the caller
    pub command: String,
    /// All bytes received since the command was written
    pub response: Bytes,
    /// Outcome
    pub status: Status,
    /// Time from the command write to the end of the exchange
    pub elapsed: Duration,
    /// Transport failure, when `status` is `TransportError`
    pub fault: Option<TransportError>,
}

impl Exchange {
    /// An exchange that failed before anything was read
    pub(crate) fn failed(command: &str, fault: TransportError) -> Self {
        Self {
            command: command.to_string(),
            response: Bytes::new(),
            status: Status::TransportError,
            elapsed: Duration::ZERO,
            fault: Some(fault),
        }
    }

    /// Response as text, with invalid UTF-8 replaced
    pub fn response_text(&self) -> String {
        String::from_utf8_lossy(&self.response).into_owned()
    }

    /// Whether the modem answered `OK`
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Code following `+CME ERROR:`, when present
    pub fn cme_error_code(&self) -> Option<String> {
        super::accumulator::cme_error_code(&self.response)
    }

    /// Turn a non-successful exchange into a typed error
    pub fn into_result(self) -> Result<Self, LinkError> {
        match self.status {
            Status::Success => Ok(self),
            Status::DeviceError => Err(LinkError::Device {
                cme_code: self.cme_error_code(),
                response: self.response_text(),
                command: self.command,
            }),
            Status::Timeout => Err(LinkError::Timeout {
                response: self.response_text(),
                command: self.command,
                elapsed: self.elapsed,
            }),
            Status::TransportError => Err(LinkError::Transport {
                command: self.command,
                source: self.fault.unwrap_or(TransportError::NotConnected),
            }),
        }
    }
}

/// Run one exchange. The caller must hold exclusive access to `transport`.
///
/// An empty command is sent as a bare line.
pub fn execute(transport: &mut dyn Transport, command: &str, config: &LinkConfig) -> Exchange {
    if let Err(e) = transport.clear_input() {
        return Exchange::failed(command, e);
    }
    if let Err(e) = transport.write_all(LINE_TERMINATOR) {
        return Exchange::failed(command, e);
    }
    std::thread::sleep(config.write_settle());

    let mut line = Vec::with_capacity(command.len() + LINE_TERMINATOR.len());
    line.extend_from_slice(command.as_bytes());
    line.extend_from_slice(LINE_TERMINATOR);
    if let Err(e) = transport.write_all(&line) {
        warn!(command, error = %e, "command write failed");
        return Exchange::failed(command, e);
    }
    debug!(command, bytes = line.len(), "command sent");

    let started = Instant::now();
    let deadline = started + config.exchange_timeout();
    let mut acc = ResponseAccumulator::new();
    let mut buf = vec![0u8; config.read_chunk.max(1)];

    let (status, fault) = loop {
        match transport.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => match acc.push(&buf[..n]) {
                Classification::Success => break (Status::Success, None),
                Classification::DeviceError => break (Status::DeviceError, None),
                Classification::Incomplete => {}
            },
            Err(e) => break (Status::TransportError, Some(e)),
        }
        if Instant::now() >= deadline {
            break (Status::Timeout, None);
        }
    };

    let elapsed = started.elapsed();
    let response = acc.into_bytes();
    match status {
        Status::Success => debug!(command, ?elapsed, response = %escape(&response), "exchange complete"),
        Status::DeviceError => warn!(command, response = %escape(&response), "device reported error"),
        Status::Timeout => warn!(command, ?elapsed, response = %escape(&response), "exchange timed out"),
        Status::TransportError => warn!(command, error = ?fault, "transport failed mid-exchange"),
    }

    Exchange {
        command: command.to_string(),
        response,
        status,
        elapsed,
        fault,
    }
}
