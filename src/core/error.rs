//! Errors surfaced by the modem link

use super::session::Status;
use super::transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Failure of a link operation.
///
/// None of these are retried by the library; retry policy belongs to the caller.
#[derive(Error, Debug)]
pub enum LinkError {
    /// The modem answered `ERROR` or reported `+CME ERROR:`
    #[error("device rejected {command:?}{}: {response:?}", cme_suffix(.cme_code))]
    Device {
        /// Command that was sent
        command: String,
        /// Everything the modem sent back
        response: String,
        /// Code following `+CME ERROR:`, when present
        cme_code: Option<String>,
    },

    /// No terminator arrived before the exchange deadline
    #[error("timeout after {elapsed:?} waiting for reply to {command:?}, got {response:?}")]
    Timeout {
        /// Command that was sent
        command: String,
        /// Time spent waiting
        elapsed: Duration,
        /// Partial response
        response: String,
    },

    /// Byte-stream failure while writing or reading
    #[error("transport failure during {command:?}: {source}")]
    Transport {
        /// Command that was sent
        command: String,
        /// Underlying transport error
        #[source]
        source: TransportError,
    },

    /// Liveness check failed; the link should be treated as dead
    #[error("modem not responding ({status}): {response:?}")]
    LinkDown {
        /// Status of the failed ping
        status: Status,
        /// Whatever the ping received
        response: String,
    },

    /// Bring-up handshake did not leave the modem in a known state
    #[error("handshake failed: {0}")]
    Handshake(#[source] Box<LinkError>),

    /// Opening the transport failed
    #[error(transparent)]
    Open(#[from] TransportError),
}

fn cme_suffix(code: &Option<String>) -> String {
    code.as_ref()
        .map(|c| format!(" (CME ERROR {c})"))
        .unwrap_or_default()
}

impl LinkError {
    /// Whether this error means the link itself is unusable
    pub fn is_link_failure(&self) -> bool {
        matches!(
            self,
            Self::LinkDown { .. } | Self::Handshake(_) | Self::Open(_) | Self::Transport { .. }
        )
    }
}
