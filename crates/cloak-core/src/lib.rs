//! cloak-core: compact, versioned, text-safe encodings for symmetric keys
//! and AES-256-GCM encrypted messages, plus a keychain that stores many keys
//! encrypted under one master key.
//!
//! Wire formats (all period-delimited, base64url where noted):
//! ```text
//! Key:      k1.aesgcm256.{base64url 32-byte secret, padded}
//! Message:  v1.aesgcm256.{8-hex fingerprint}.{base64url 12-byte nonce}.{base64url ciphertext||tag}
//! Keychain: a Message whose plaintext is a JSON array of
//!           {"key": <key text>, "createdAt": <epoch ms>, "label"?: <string>}
//! ```
//!
//! The fingerprint is the first 4 bytes of SHA-256 over the canonical key
//! text. It routes a ciphertext to the key that can decrypt it without
//! revealing anything about the key itself, and is always recomputed from
//! key bytes on import — never trusted from serialized metadata.

pub mod aead;
pub mod codec;
pub mod error;
pub mod key;
pub mod keychain;
pub mod message;

pub use error::{CloakError, CloakResult};
pub use key::{key_fingerprint, CloakKey, Fingerprint};
pub use keychain::{Keychain, KeychainEntry};
pub use message::{decrypt_string, encrypt_string, message_key_fingerprint};

/// Size of a key's secret material in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of a key fingerprint in bytes (8 hex characters)
pub const FINGERPRINT_SIZE: usize = 4;
