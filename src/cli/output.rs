//! Output formatting for exchange results

use crate::core::session::Exchange;
use clap::ValueEnum;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Response text as received
    #[default]
    Text,
    /// Text with control characters escaped
    Escaped,
    /// Hex dump
    Hex,
    /// One JSON object per exchange
    Json,
}

/// Format one exchange for stdout
pub fn format_exchange(exchange: &Exchange, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => exchange.response_text(),
        OutputFormat::Escaped => escaped_format(&exchange.response),
        OutputFormat::Hex => hex_format(&exchange.response),
        OutputFormat::Json => serde_json::json!({
            "command": exchange.command,
            "status": exchange.status,
            "response": exchange.response_text(),
            "hex": hex::encode(&exchange.response),
            "elapsed_ms": u64::try_from(exchange.elapsed.as_millis()).unwrap_or(u64::MAX),
            "cme_error": exchange.cme_error_code(),
            "fault": exchange.fault.as_ref().map(ToString::to_string),
        })
        .to_string(),
    }
}

fn hex_format(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn escaped_format(data: &[u8]) -> String {
    data.iter()
        .map(|&b| match b {
            0x09 => "\\t".to_string(),
            0x0a => "\\n".to_string(),
            0x0d => "\\r".to_string(),
            0x20..=0x7e => (b as char).to_string(),
            _ => format!("\\x{:02x}", b),
        })
        .collect()
}
