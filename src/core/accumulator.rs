//! Response accumulation and terminator classification
//!
//! Bytes arrive from the modem in arbitrary chunks. After every append the
//! whole buffer is classified again, so the outcome depends only on the
//! concatenated bytes and never on where the chunk boundaries fell.

use bytes::{Bytes, BytesMut};

/// Final line of a successful response
pub const OK_TERMINATOR: &[u8] = b"\r\nOK\r\n";

/// Final line of a generic failure
pub const ERROR_TERMINATOR: &[u8] = b"\r\nERROR\r\n";

/// Mobile equipment error report, detected anywhere in the buffer
pub const CME_ERROR_MARKER: &[u8] = b"+CME ERROR:";

/// Classification of an accumulated response buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// No terminal pattern yet, keep reading
    Incomplete,
    /// Ended with `OK`
    Success,
    /// `+CME ERROR:` seen or ended with `ERROR`
    DeviceError,
}

/// Classify a buffer.
///
/// `+CME ERROR:` wins over any terminator, then `ERROR`, then `OK`.
pub fn classify(buf: &[u8]) -> Classification {
    if contains(buf, CME_ERROR_MARKER) {
        Classification::DeviceError
    } else if buf.ends_with(ERROR_TERMINATOR) {
        Classification::DeviceError
    } else if buf.ends_with(OK_TERMINATOR) {
        Classification::Success
    } else {
        Classification::Incomplete
    }
}

/// Extract the code reported after `+CME ERROR:`, trimmed, up to the end of its line.
pub fn cme_error_code(buf: &[u8]) -> Option<String> {
    let start = find(buf, CME_ERROR_MARKER)? + CME_ERROR_MARKER.len();
    let rest = &buf[start..];
    let end = rest
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(rest.len());
    let code = String::from_utf8_lossy(&rest[..end]).trim().to_string();
    (!code.is_empty()).then_some(code)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle).is_some()
}

/// Growing response buffer
#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    buf: BytesMut,
}

impl ResponseAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes and reclassify
    pub fn push(&mut self, data: &[u8]) -> Classification {
        self.buf.extend_from_slice(data);
        classify(&self.buf)
    }

    /// Classification of everything received so far
    pub fn classification(&self) -> Classification {
        classify(&self.buf)
    }

    /// Accumulated bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Number of accumulated bytes
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been received
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Code reported after `+CME ERROR:`, if any
    pub fn cme_error_code(&self) -> Option<String> {
        cme_error_code(&self.buf)
    }

    /// Consume the accumulator, returning the response bytes
    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}
