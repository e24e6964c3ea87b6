//! Core module containing the AT command engine
//!
//! This module provides:
//! - Transport layer for the modem byte stream (serial, virtual modem)
//! - Response accumulation and terminator classification
//! - Command sessions (one request/response exchange)
//! - The link handle that serializes exchanges on one transport
//! - The bring-up handshake run when a link is created
//! - A background liveness monitor

pub mod accumulator;
pub mod error;
pub mod handshake;
pub mod link;
pub mod liveness;
pub mod session;
pub mod simulator;
pub mod transport;
