//! Key text format and fingerprinting.
//!
//! Canonical key text: `k1.aesgcm256.{base64url 32-byte secret, padded}`.
//! The fingerprint is the first 4 bytes of SHA-256 over that canonical text,
//! so any two texts that decode to the same secret share a fingerprint even
//! when one arrives without padding.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::error::{CloakError, CloakResult};
use crate::{aead, codec, FINGERPRINT_SIZE, KEY_SIZE};

/// Version tag of the only supported key format revision.
pub const KEY_VERSION_TAG: &str = "k1";

/// Algorithm tag of the only supported cipher (AES-GCM, 256-bit key).
pub const ALGORITHM_TAG: &str = "aesgcm256";

/// A short, non-secret key identifier: 4 bytes, shown as 8 hex characters.
///
/// Fingerprints route a ciphertext to the key that produced it. They are
/// birthday-bounded over a 2^32 space, fine for a keychain, not to be
/// assumed collision-free across a large fleet.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; FINGERPRINT_SIZE]);

impl Fingerprint {
    /// First [`FINGERPRINT_SIZE`] bytes of SHA-256 over the canonical key
    /// text.
    pub(crate) fn of_key_text(text: &str) -> Self {
        let digest = Sha256::digest(text.as_bytes());
        let mut bytes = [0u8; FINGERPRINT_SIZE];
        bytes.copy_from_slice(&digest[..FINGERPRINT_SIZE]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_SIZE] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&codec::hex_encode(&self.0))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

impl FromStr for Fingerprint {
    type Err = CloakError;

    fn from_str(s: &str) -> CloakResult<Self> {
        if s.len() != FINGERPRINT_SIZE * 2 {
            return Err(CloakError::MalformedField("fingerprint"));
        }
        let decoded =
            codec::hex_decode(s).ok_or(CloakError::MalformedField("fingerprint"))?;
        let mut bytes = [0u8; FINGERPRINT_SIZE];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }
}

/// A parsed symmetric key: 32 secret bytes plus their fingerprint.
///
/// This is the only in-memory key shape; text becomes a `CloakKey` through
/// [`CloakKey::parse`] at every API boundary. Secret bytes are zeroized on
/// drop and redacted from `Debug` output.
#[derive(Clone)]
pub struct CloakKey {
    raw: [u8; KEY_SIZE],
    fingerprint: Fingerprint,
}

impl CloakKey {
    /// Generate a fresh key from the OS CSPRNG.
    ///
    /// Propagates a [`CloakError::Provider`] failure if the entropy source
    /// is unavailable; never truncates or pads.
    pub fn generate() -> CloakResult<Self> {
        Ok(Self::from_raw(aead::random_bytes()?))
    }

    /// Build a key from raw secret bytes, computing its fingerprint.
    pub fn from_raw(raw: [u8; KEY_SIZE]) -> Self {
        let fingerprint = Fingerprint::of_key_text(&render_key_text(&raw));
        Self { raw, fingerprint }
    }

    /// Parse the `k1.aesgcm256.{secret}` grammar.
    ///
    /// Errors: [`CloakError::UnknownKeyFormat`] when the version tag or the
    /// three-part shape is wrong, [`CloakError::UnsupportedKeyType`] when
    /// the version matches but the algorithm tag does not, and a malformed
    /// field error when the secret is not 32 bytes of valid base64url.
    pub fn parse(text: &str) -> CloakResult<Self> {
        let parts: Vec<&str> = text.split('.').collect();
        if parts.len() != 3 || parts[0] != KEY_VERSION_TAG {
            return Err(CloakError::UnknownKeyFormat);
        }
        if parts[1] != ALGORITHM_TAG {
            return Err(CloakError::UnsupportedKeyType);
        }
        let mut decoded =
            codec::b64_decode(parts[2]).ok_or(CloakError::MalformedField("secret"))?;
        if decoded.len() != KEY_SIZE {
            decoded.zeroize();
            return Err(CloakError::MalformedField("secret"));
        }
        let mut raw = [0u8; KEY_SIZE];
        raw.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self::from_raw(raw))
    }

    /// Canonical text form, always with base64url padding.
    pub fn to_text(&self) -> String {
        render_key_text(&self.raw)
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn raw_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.raw
    }
}

impl Drop for CloakKey {
    fn drop(&mut self) {
        self.raw.zeroize();
    }
}

impl fmt::Debug for CloakKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloakKey")
            .field("raw", &"[REDACTED]")
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

/// Fingerprint of a serialized key, without keeping the parsed key around.
pub fn key_fingerprint(text: &str) -> CloakResult<Fingerprint> {
    Ok(CloakKey::parse(text)?.fingerprint())
}

fn render_key_text(raw: &[u8; KEY_SIZE]) -> String {
    format!("{KEY_VERSION_TAG}.{ALGORITHM_TAG}.{}", codec::b64_encode(raw))
}
