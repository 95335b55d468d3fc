//! Encrypted message envelopes.
//!
//! Envelope grammar (authoritative, exactly five period-delimited fields):
//! ```text
//! v1.aesgcm256.{8-hex fingerprint}.{base64url 12-byte nonce}.{base64url ciphertext||tag}
//! ```
//!
//! Parsing is strict and happens before any cryptographic work, so the AEAD
//! never runs on malformed input. The fingerprint field is lookup routing
//! only; it carries no authority over which key decrypts.

use std::str::FromStr;

use crate::error::{CloakError, CloakResult};
use crate::key::{CloakKey, Fingerprint, ALGORITHM_TAG};
use crate::{aead, codec, NONCE_SIZE, TAG_SIZE};

/// Version tag of the only supported envelope revision.
pub const MESSAGE_VERSION_TAG: &str = "v1";

/// A fully validated envelope, ready for the cipher.
struct Envelope {
    nonce: [u8; NONCE_SIZE],
    sealed: Vec<u8>,
}

impl Envelope {
    fn parse(message: &str) -> CloakResult<Self> {
        let parts = split_fields(message)?;
        let nonce_bytes =
            codec::b64_decode(parts[3]).ok_or(CloakError::MalformedField("nonce"))?;
        let nonce: [u8; NONCE_SIZE] = nonce_bytes
            .try_into()
            .map_err(|_| CloakError::MalformedField("nonce"))?;
        let sealed =
            codec::b64_decode(parts[4]).ok_or(CloakError::MalformedField("payload"))?;
        if sealed.len() < TAG_SIZE {
            return Err(CloakError::MalformedField("payload"));
        }
        Ok(Self { nonce, sealed })
    }
}

/// Validate the five-field shape and the version/cipher tags, returning the
/// raw fields. Shared by full parsing and header-only inspection.
fn split_fields(message: &str) -> CloakResult<[&str; 5]> {
    let parts: Vec<&str> = message.split('.').collect();
    let parts: [&str; 5] = parts
        .try_into()
        .map_err(|_| CloakError::UnknownMessageFormat)?;
    if parts[0] != MESSAGE_VERSION_TAG {
        return Err(CloakError::UnknownMessageFormat);
    }
    if parts[1] != ALGORITHM_TAG {
        return Err(CloakError::UnsupportedCipher);
    }
    // charset/length check only; the value is routing data, not parsed here
    Fingerprint::from_str(parts[2])?;
    Ok(parts)
}

/// Encrypt a string under `key`, producing an opaque envelope.
///
/// A fresh 12-byte nonce is drawn from the CSPRNG on every call, so the same
/// plaintext never produces the same envelope twice. The empty string is a
/// valid plaintext.
pub fn encrypt_string(plaintext: &str, key: &CloakKey) -> CloakResult<String> {
    let nonce: [u8; NONCE_SIZE] = aead::random_bytes()?;
    let sealed = aead::seal(key.raw_bytes(), &nonce, plaintext.as_bytes())?;
    Ok(format!(
        "{MESSAGE_VERSION_TAG}.{ALGORITHM_TAG}.{}.{}.{}",
        key.fingerprint(),
        codec::b64_encode(&nonce),
        codec::b64_encode(&sealed)
    ))
}

/// Decrypt an envelope under `key`.
///
/// Grammar violations surface as format errors without invoking the cipher;
/// every authentication failure (wrong key, tampered nonce, ciphertext, or
/// tag) surfaces as the single opaque [`CloakError::Integrity`].
pub fn decrypt_string(message: &str, key: &CloakKey) -> CloakResult<String> {
    let envelope = Envelope::parse(message)?;
    let plaintext = aead::open(key.raw_bytes(), &envelope.nonce, &envelope.sealed)?;
    String::from_utf8(plaintext).map_err(|_| CloakError::InvalidUtf8)
}

/// Read the key fingerprint out of an envelope without any cryptographic
/// work. Used for keychain lookup before decryption is attempted.
pub fn message_key_fingerprint(message: &str) -> CloakResult<Fingerprint> {
    let parts = split_fields(message)?;
    Fingerprint::from_str(parts[2])
}
