//! Platform providers: AES-256-GCM seal/open and the OS CSPRNG.
//!
//! Sealed shape is always `ciphertext || 16-byte tag`, which is both the
//! aes-gcm crate's native output and the canonical on-wire shape. Nothing
//! above this module touches a cipher or an RNG directly.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{CloakError, CloakResult};
use crate::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// Encrypt `plaintext` under `key`/`nonce`.
///
/// Returns `ciphertext || tag`. The nonce must be fresh for every call under
/// the same key; callers draw it from [`random_bytes`].
pub fn seal(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
) -> CloakResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.into());
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| CloakError::Provider("AES-GCM seal failed".into()))
}

/// Decrypt `sealed` (`ciphertext || tag`) under `key`/`nonce`.
///
/// Every authentication failure surfaces as the same opaque
/// [`CloakError::Integrity`], whatever actually went wrong.
pub fn open(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    sealed: &[u8],
) -> CloakResult<Vec<u8>> {
    if sealed.len() < TAG_SIZE {
        return Err(CloakError::Integrity);
    }
    let cipher = Aes256Gcm::new(key.into());
    cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| CloakError::Integrity)
}

/// Draw `N` bytes from the OS CSPRNG, failing loudly if the entropy source
/// is unavailable. There is no fallback RNG.
pub fn random_bytes<const N: usize>() -> CloakResult<[u8; N]> {
    let mut bytes = [0u8; N];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CloakError::Provider(format!("OS entropy source unavailable: {e}")))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; KEY_SIZE] = [0x42; KEY_SIZE];
    const NONCE: [u8; NONCE_SIZE] = [0x07; NONCE_SIZE];

    #[test]
    fn seal_open_roundtrip() {
        let sealed = seal(&KEY, &NONCE, b"attack at dawn").unwrap();
        assert_eq!(sealed.len(), b"attack at dawn".len() + TAG_SIZE);
        assert_eq!(open(&KEY, &NONCE, &sealed).unwrap(), b"attack at dawn");
    }

    #[test]
    fn seal_empty_plaintext() {
        let sealed = seal(&KEY, &NONCE, b"").unwrap();
        assert_eq!(sealed.len(), TAG_SIZE, "empty plaintext seals to tag only");
        assert_eq!(open(&KEY, &NONCE, &sealed).unwrap(), b"");
    }

    #[test]
    fn open_wrong_key_fails() {
        let sealed = seal(&KEY, &NONCE, b"secret").unwrap();
        let other = [0x43u8; KEY_SIZE];
        assert_eq!(open(&other, &NONCE, &sealed), Err(CloakError::Integrity));
    }

    #[test]
    fn open_tampered_tag_fails() {
        let mut sealed = seal(&KEY, &NONCE, b"secret").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xFF;
        assert_eq!(open(&KEY, &NONCE, &sealed), Err(CloakError::Integrity));
    }

    #[test]
    fn open_truncated_input_fails() {
        assert_eq!(open(&KEY, &NONCE, &[0u8; 5]), Err(CloakError::Integrity));
    }

    #[test]
    fn random_bytes_are_fresh() {
        let a: [u8; 32] = random_bytes().unwrap();
        let b: [u8; 32] = random_bytes().unwrap();
        assert_ne!(a, b, "consecutive draws must differ");
    }
}
