//! CLI Exit Codes
//!
//! Standard exit codes for CLI operations and automation.

use crate::core::error::LinkError;
use crate::core::transport::TransportError;
use std::process::ExitCode;

/// Exit code constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes;

impl ExitCodes {
    /// Success
    pub const SUCCESS: u8 = 0;

    /// General error
    pub const ERROR: u8 = 1;

    /// Invalid arguments
    pub const INVALID_ARGS: u8 = 2;

    /// Connection failed
    pub const CONNECTION_FAILED: u8 = 3;

    /// No reply before the exchange deadline
    pub const TIMEOUT: u8 = 4;

    /// Permission denied
    pub const PERMISSION_DENIED: u8 = 7;

    /// Configuration error
    pub const CONFIG_ERROR: u8 = 8;

    /// Modem answered ERROR or +CME ERROR
    pub const DEVICE_ERROR: u8 = 9;

    /// User cancelled
    pub const CANCELLED: u8 = 11;

    /// Port not found
    pub const PORT_NOT_FOUND: u8 = 14;

    /// Handshake or liveness check failed
    pub const LINK_DOWN: u8 = 18;

    /// Internal error
    pub const INTERNAL_ERROR: u8 = 127;
}

/// CLI operation result
#[derive(Debug)]
pub enum CliResult {
    /// Success
    Success,

    /// Error with code and message
    Error(u8, String),
}

impl CliResult {
    /// Plain success
    pub fn success() -> Self {
        Self::Success
    }

    /// Error with an explicit code
    pub fn error(code: u8, msg: impl Into<String>) -> Self {
        Self::Error(code, msg.into())
    }

    /// Configuration could not be loaded
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::CONFIG_ERROR, msg.into())
    }

    /// Stopped by Ctrl+C
    pub fn cancelled() -> Self {
        Self::Error(ExitCodes::CANCELLED, "interrupted".into())
    }

    /// Get exit code
    pub fn code(&self) -> u8 {
        match self {
            Self::Success => ExitCodes::SUCCESS,
            Self::Error(code, _) => *code,
        }
    }

    /// Get message
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Error(_, msg) => Some(msg),
            Self::Success => None,
        }
    }

    /// Convert to ExitCode
    pub fn to_exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Is success?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<&TransportError> for CliResult {
    fn from(err: &TransportError) -> Self {
        let code = match err {
            TransportError::PortNotFound(_) => ExitCodes::PORT_NOT_FOUND,
            TransportError::PermissionDenied(_) => ExitCodes::PERMISSION_DENIED,
            TransportError::ConnectionFailed(_) => ExitCodes::CONNECTION_FAILED,
            TransportError::NotConnected | TransportError::Disconnected => ExitCodes::LINK_DOWN,
            TransportError::Io(_) => ExitCodes::ERROR,
        };
        Self::Error(code, err.to_string())
    }
}

impl From<&LinkError> for CliResult {
    fn from(err: &LinkError) -> Self {
        let code = match err {
            LinkError::Device { .. } => ExitCodes::DEVICE_ERROR,
            LinkError::Timeout { .. } => ExitCodes::TIMEOUT,
            LinkError::Open(source) | LinkError::Transport { source, .. } => {
                return Self::Error(Self::from(source).code(), err.to_string());
            }
            LinkError::LinkDown { .. } | LinkError::Handshake(_) => ExitCodes::LINK_DOWN,
        };
        Self::Error(code, err.to_string())
    }
}

/// Exit code description
pub fn exit_code_description(code: u8) -> &'static str {
    match code {
        0 => "Success",
        1 => "General error",
        2 => "Invalid arguments",
        3 => "Connection failed",
        4 => "Response timeout",
        7 => "Permission denied",
        8 => "Configuration error",
        9 => "Device error",
        11 => "Operation cancelled",
        14 => "Port not found",
        18 => "Link down",
        127 => "Internal error",
        _ => "Unknown error",
    }
}

/// Print exit code table
pub fn print_exit_codes() {
    println!("Exit Codes:");
    for code in [0, 1, 2, 3, 4, 7, 8, 9, 11, 14, 18, 127] {
        println!("  {:>3}  {}", code, exit_code_description(code));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::Status;

    #[test]
    fn test_cli_result() {
        let success = CliResult::success();
        assert!(success.is_success());
        assert_eq!(success.code(), 0);

        let error = CliResult::error(3, "Connection failed");
        assert!(!error.is_success());
        assert_eq!(error.code(), 3);
        assert_eq!(error.message(), Some("Connection failed"));
    }

    #[test]
    fn test_link_errors_map_to_distinct_codes() {
        let device = LinkError::Device {
            command: "AT+X".into(),
            response: "\r\n+CME ERROR: 10\r\n".into(),
            cme_code: Some("10".into()),
        };
        let down = LinkError::LinkDown {
            status: Status::Timeout,
            response: String::new(),
        };
        assert_eq!(CliResult::from(&device).code(), ExitCodes::DEVICE_ERROR);
        assert_eq!(CliResult::from(&down).code(), ExitCodes::LINK_DOWN);
    }

    #[test]
    fn test_open_error_uses_transport_code() {
        let err = LinkError::Open(TransportError::PortNotFound("/dev/ttyUSB9".into()));
        let result = CliResult::from(&err);
        assert_eq!(result.code(), ExitCodes::PORT_NOT_FOUND);
        assert_eq!(result.message(), Some("Port not found: /dev/ttyUSB9"));
    }

    #[test]
    fn test_cancelled_is_not_success() {
        let result = CliResult::cancelled();
        assert!(!result.is_success());
        assert_eq!(result.code(), ExitCodes::CANCELLED);
        assert_eq!(exit_code_description(result.code()), "Operation cancelled");
    }
}
