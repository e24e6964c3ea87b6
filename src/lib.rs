//! # Cellular Core Library
//!
//! AT command engine for GSM/cellular modems on a serial link:
//! - Serial transport (115200 7E1 by default) and an in-process virtual modem
//! - Response accumulation with `OK` / `ERROR` / `+CME ERROR:` detection
//! - One-exchange command sessions bounded by a wall-clock deadline
//! - A link handle that serializes exchanges and runs the bring-up handshake
//! - A background liveness monitor
//!
//! ## Example
//!
//! ```rust,no_run
//! use cellular_core::{LinkConfig, LinkHandle, SerialConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let serial = SerialConfig::new("/dev/ttyUSB0", 115200);
//!     let link = LinkHandle::open(serial, LinkConfig::default())?;
//!
//!     link.ping()?;
//!     let exchange = link.send_command("AT+CCLK?").into_result()?;
//!     println!("{}", exchange.response_text());
//!
//!     link.close()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes, OutputFormat};
pub use crate::config::{AppConfig, ConfigError};
pub use crate::core::accumulator::{classify, Classification, ResponseAccumulator};
pub use crate::core::error::LinkError;
pub use crate::core::link::{LinkHandle, LinkStats};
pub use crate::core::liveness::{LivenessConfig, LivenessMonitor};
pub use crate::core::session::{execute, Exchange, HandshakePolicy, LinkConfig, Status};
pub use crate::core::simulator::{Reply, VirtualModem};
pub use crate::core::transport::{
    SerialConfig, SerialFlowControl, SerialParity, SerialTransport, Transport, TransportError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
