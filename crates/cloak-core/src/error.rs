use thiserror::Error;

use crate::key::Fingerprint;

pub type CloakResult<T> = Result<T, CloakError>;

/// Every failure the core can report.
///
/// Authentication failures are a single opaque [`CloakError::Integrity`]
/// variant: a wrong key, a tampered nonce, and a tampered ciphertext or tag
/// are indistinguishable on purpose, so errors cannot be used as a
/// decryption oracle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CloakError {
    /// The key text does not match the `k1.` grammar.
    #[error("unknown key format")]
    UnknownKeyFormat,

    /// The key version is known but the algorithm tag is not `aesgcm256`.
    #[error("unsupported key type")]
    UnsupportedKeyType,

    /// The message text does not match the `v1.` grammar.
    #[error("unknown message format")]
    UnknownMessageFormat,

    /// The message version is known but the cipher tag is not `aesgcm256`.
    #[error("unsupported cipher")]
    UnsupportedCipher,

    /// A field failed charset or length validation during parsing.
    #[error("malformed {0} field")]
    MalformedField(&'static str),

    /// A decrypted keychain payload is not a valid entry list.
    #[error("malformed keychain: {0}")]
    MalformedKeychain(String),

    /// An authenticated payload did not decode as UTF-8 text.
    #[error("decrypted payload is not valid UTF-8")]
    InvalidUtf8,

    /// Authentication failed: wrong key or corrupted data.
    #[error("decryption failed: invalid key or corrupted data")]
    Integrity,

    /// The keychain has no entry for the requested fingerprint.
    #[error("key {0} is not available in the keychain")]
    KeyNotAvailable(Fingerprint),

    /// The platform CSPRNG or cipher failed for environmental reasons.
    #[error("provider error: {0}")]
    Provider(String),
}

impl CloakError {
    /// True for errors raised by parsing, before any cryptographic work.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownKeyFormat
                | Self::UnsupportedKeyType
                | Self::UnknownMessageFormat
                | Self::UnsupportedCipher
                | Self::MalformedField(_)
        )
    }
}
