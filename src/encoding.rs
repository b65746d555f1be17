//! Percent-encoding for free text on the IPC wire.
//!
//! Workspace names, window titles and app ids can contain anything, so every
//! free-text field in a text-protocol response goes through
//! [`percent_encode`].  The unreserved alphabet is `[A-Za-z0-9-_.~]`; every
//! other byte becomes `%XX` with upper-case hex digits.
//!
//! Decoding is strict: a `%` that is not followed by two hex digits fails the
//! whole value, so a command carrying a bad escape has no effect at all.

use std::fmt::Write;

/// Errors produced by [`percent_decode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PercentDecodeError {
    /// A `%` at byte `offset` is followed by fewer than two characters.
    #[error("truncated escape at byte {offset}")]
    Truncated { offset: usize },
    /// A `%` at byte `offset` is followed by something other than two hex digits.
    #[error("invalid escape at byte {offset}")]
    InvalidHex { offset: usize },
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~')
}

fn hex_nibble(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(10 + b - b'a'),
        b'A'..=b'F' => Some(10 + b - b'A'),
        _ => None,
    }
}

/// Encode arbitrary bytes so that the result contains only unreserved
/// characters and `%XX` escapes.
pub fn percent_encode(input: &[u8]) -> String {
    let mut out = String::with_capacity(input.len());
    for &b in input {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            // Writing into a String cannot fail.
            let _ = write!(out, "%{:02X}", b);
        }
    }
    out
}

/// Decode a percent-encoded value back into raw bytes.
///
/// Bytes other than `%` are copied through unchanged, so already-plain text
/// decodes to itself.
pub fn percent_decode(input: &str) -> Result<Vec<u8>, PercentDecodeError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        if i + 2 >= bytes.len() {
            return Err(PercentDecodeError::Truncated { offset: i });
        }
        let hi = hex_nibble(bytes[i + 1]);
        let lo = hex_nibble(bytes[i + 2]);
        match (hi, lo) {
            (Some(hi), Some(lo)) => out.push((hi << 4) | lo),
            _ => return Err(PercentDecodeError::InvalidHex { offset: i }),
        }
        i += 3;
    }
    Ok(out)
}
