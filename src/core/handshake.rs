//! Bring-up handshake
//!
//! Runs once on a freshly opened transport to put the modem into a known
//! state (echo disabled) before any command traffic.

use super::error::LinkError;
use super::session::{execute, HandshakePolicy, LinkConfig, LINE_TERMINATOR};
use super::transport::{Transport, TransportError};
use std::thread;
use tracing::{debug, info};

/// Echo-disable command
pub const ECHO_OFF: &str = "ATE0";

/// Write the priming sequence without reading anything back.
fn prime(transport: &mut dyn Transport, config: &LinkConfig) -> Result<(), TransportError> {
    transport.clear_input()?;
    transport.clear_output()?;
    thread::sleep(config.open_settle());

    transport.write_all(b"\r\n")?;
    thread::sleep(config.write_settle());

    let mut line = ECHO_OFF.as_bytes().to_vec();
    line.extend_from_slice(LINE_TERMINATOR);
    transport.write_all(&line)?;
    thread::sleep(config.write_settle());
    Ok(())
}

/// Run the handshake according to `config.handshake`.
pub fn bring_up(transport: &mut dyn Transport, config: &LinkConfig) -> Result<(), LinkError> {
    debug!(policy = ?config.handshake, "starting bring-up handshake");
    prime(transport, config).map_err(|source| {
        LinkError::Handshake(Box::new(LinkError::Transport {
            command: ECHO_OFF.to_string(),
            source,
        }))
    })?;

    if config.handshake == HandshakePolicy::Verify {
        execute(transport, ECHO_OFF, config)
            .into_result()
            .map_err(|e| LinkError::Handshake(Box::new(e)))?;
    }

    info!(endpoint = %transport.connection_info(), "modem ready");
    Ok(())
}
