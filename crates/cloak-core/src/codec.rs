//! Shared text encodings: base64url and lowercase hex.
//!
//! Encoding always produces the canonical form (padded base64url, lowercase
//! hex). Decoding accepts missing base64url padding and mixed-case hex, but
//! rejects everything outside the respective alphabets.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;

/// Canonical base64url with trailing `=` padding.
pub fn b64_encode(data: &[u8]) -> String {
    URL_SAFE.encode(data)
}

/// Decode base64url, tolerating absent padding.
pub fn b64_decode(text: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(text.trim_end_matches('=')).ok()
}

pub fn hex_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for byte in data {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

pub fn hex_decode(text: &str) -> Option<Vec<u8>> {
    // byte-index slicing below is only safe on ASCII input
    if !text.is_ascii() || !text.len().is_multiple_of(2) {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&text[i..i + 2], 16).ok())
        .collect()
}
