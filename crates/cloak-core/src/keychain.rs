//! Keychain: keys indexed by fingerprint, storable as one encrypted envelope.
//!
//! The keychain is a pure value: every mutating operation returns a new
//! keychain, so callers that need concurrent access can treat it as
//! copy-on-write and serialize writes externally.
//!
//! Encrypted-at-rest shape: a JSON array of
//! `{"key": <key text>, "createdAt": <epoch ms>, "label"?: <string>}`
//! run through [`encrypt_string`] under a master key. The serialized form
//! carries no fingerprint; fingerprints are recomputed from key bytes on
//! import so a corrupted or forged index cannot misdirect which key answers
//! for which message.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{CloakError, CloakResult};
use crate::key::{CloakKey, Fingerprint};
use crate::message::{decrypt_string, encrypt_string, message_key_fingerprint};

/// One keychain slot: a key plus bookkeeping metadata.
#[derive(Debug, Clone)]
pub struct KeychainEntry {
    pub key: CloakKey,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_at: u64,
    pub label: Option<String>,
}

/// On-wire entry shape. Field names match the v1 export format.
#[derive(Serialize, Deserialize)]
struct WireEntry {
    key: String,
    #[serde(rename = "createdAt")]
    created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
}

/// An in-memory collection of keys, indexed by fingerprint.
#[derive(Debug, Clone, Default)]
pub struct Keychain {
    entries: HashMap<Fingerprint, KeychainEntry>,
}

impl Keychain {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a keychain from a list of keys, stamped with the current time.
    ///
    /// Keys with equal fingerprints collapse to one entry, last write wins;
    /// from the data model's perspective both are the same key.
    pub fn new(keys: impl IntoIterator<Item = CloakKey>) -> Self {
        let created_at = now_ms();
        let mut entries = HashMap::new();
        for key in keys {
            entries.insert(
                key.fingerprint(),
                KeychainEntry {
                    key,
                    created_at,
                    label: None,
                },
            );
        }
        Self { entries }
    }

    /// A new keychain with `key` added (or replaced, on fingerprint match).
    pub fn with_key(&self, key: CloakKey, label: Option<String>) -> Self {
        let mut next = self.clone();
        next.entries.insert(
            key.fingerprint(),
            KeychainEntry {
                key,
                created_at: now_ms(),
                label,
            },
        );
        next
    }

    /// A new keychain with the entry for `fingerprint` removed.
    pub fn revoke(&self, fingerprint: Fingerprint) -> CloakResult<Self> {
        let mut next = self.clone();
        next.entries
            .remove(&fingerprint)
            .ok_or(CloakError::KeyNotAvailable(fingerprint))?;
        Ok(next)
    }

    /// Resolve the key that encrypted `message`, without decrypting anything.
    ///
    /// Safe to call with any keychain; a miss is
    /// [`CloakError::KeyNotAvailable`], never an authentication attempt.
    pub fn find_key_for_message(&self, message: &str) -> CloakResult<&CloakKey> {
        let fingerprint = message_key_fingerprint(message)?;
        self.entries
            .get(&fingerprint)
            .map(|entry| &entry.key)
            .ok_or(CloakError::KeyNotAvailable(fingerprint))
    }

    pub fn get(&self, fingerprint: Fingerprint) -> Option<&KeychainEntry> {
        self.entries.get(&fingerprint)
    }

    pub fn contains(&self, fingerprint: Fingerprint) -> bool {
        self.entries.contains_key(&fingerprint)
    }

    /// How long the entry for `fingerprint` has existed at `now_epoch_ms`.
    /// Saturates at zero if the clock has regressed past the creation time.
    pub fn age(&self, fingerprint: Fingerprint, now_epoch_ms: u64) -> CloakResult<Duration> {
        let entry = self
            .entries
            .get(&fingerprint)
            .ok_or(CloakError::KeyNotAvailable(fingerprint))?;
        Ok(Duration::from_millis(
            now_epoch_ms.saturating_sub(entry.created_at),
        ))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in fingerprint order.
    pub fn entries(&self) -> Vec<(Fingerprint, &KeychainEntry)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(fp, entry)| (*fp, entry))
            .collect();
        entries.sort_by_key(|(fp, _)| *fp);
        entries
    }

    /// Serialize and encrypt the keychain under `master_key`.
    ///
    /// The result is itself a valid message envelope. Entries are emitted in
    /// fingerprint order, so exports are deterministic up to the nonce.
    pub fn export(&self, master_key: &CloakKey) -> CloakResult<String> {
        let wire: Vec<WireEntry> = self
            .entries()
            .into_iter()
            .map(|(_, entry)| WireEntry {
                key: entry.key.to_text(),
                created_at: entry.created_at,
                label: entry.label.clone(),
            })
            .collect();
        let json = serde_json::to_string(&wire)
            .map_err(|e| CloakError::MalformedKeychain(e.to_string()))?;
        tracing::debug!(entries = wire.len(), "exporting keychain");
        encrypt_string(&json, master_key)
    }

    /// Decrypt and rebuild a keychain exported by [`Keychain::export`].
    ///
    /// Each entry's fingerprint is re-derived from its key bytes; any
    /// fingerprint recorded in the serialized form is ignored. A wrong
    /// master key fails as [`CloakError::Integrity`], never as a garbled
    /// but "successful" keychain.
    pub fn import(blob: &str, master_key: &CloakKey) -> CloakResult<Self> {
        let json = decrypt_string(blob, master_key)?;
        let wire: Vec<WireEntry> = serde_json::from_str(&json)
            .map_err(|e| CloakError::MalformedKeychain(e.to_string()))?;
        let mut entries = HashMap::with_capacity(wire.len());
        for item in wire {
            let key = CloakKey::parse(&item.key)?;
            entries.insert(
                key.fingerprint(),
                KeychainEntry {
                    key,
                    created_at: item.created_at,
                    label: item.label,
                },
            );
        }
        tracing::debug!(entries = entries.len(), "imported keychain");
        Ok(Self { entries })
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::encrypt_string;

    fn key() -> CloakKey {
        CloakKey::generate().unwrap()
    }

    #[test]
    fn duplicate_keys_collapse_to_one_entry() {
        let a = key();
        let chain = Keychain::new([a.clone(), a.clone()]);
        assert_eq!(chain.len(), 1);
        assert!(chain.contains(a.fingerprint()));
    }

    #[test]
    fn find_key_for_message_resolves_by_fingerprint() {
        let a = key();
        let b = key();
        let chain = Keychain::new([a.clone(), b.clone()]);

        let message = encrypt_string("routed", &a).unwrap();
        let found = chain.find_key_for_message(&message).unwrap();
        assert_eq!(found.fingerprint(), a.fingerprint());
    }

    #[test]
    fn find_key_for_message_misses_cleanly() {
        let stranger = key();
        let chain = Keychain::new([key()]);
        let message = encrypt_string("no entry for this", &stranger).unwrap();
        assert_eq!(
            chain.find_key_for_message(&message).unwrap_err(),
            CloakError::KeyNotAvailable(stranger.fingerprint())
        );
    }

    #[test]
    fn revoke_returns_a_new_keychain() {
        let a = key();
        let chain = Keychain::new([a.clone()]);
        let revoked = chain.revoke(a.fingerprint()).unwrap();
        assert!(revoked.is_empty());
        assert_eq!(chain.len(), 1, "original keychain must be untouched");
        assert_eq!(
            revoked.revoke(a.fingerprint()).unwrap_err(),
            CloakError::KeyNotAvailable(a.fingerprint())
        );
    }

    #[test]
    fn age_counts_from_creation() {
        let a = key();
        let chain = Keychain::new([a.clone()]);
        let created = chain.get(a.fingerprint()).unwrap().created_at;

        let age = chain.age(a.fingerprint(), created + 5_000).unwrap();
        assert_eq!(age, Duration::from_millis(5_000));

        // clock regression saturates instead of going negative
        let age = chain.age(a.fingerprint(), created.saturating_sub(1)).unwrap();
        assert_eq!(age, Duration::ZERO);

        let absent = key().fingerprint();
        assert_eq!(
            chain.age(absent, created).unwrap_err(),
            CloakError::KeyNotAvailable(absent)
        );
    }

    #[test]
    fn export_import_roundtrip() {
        let a = key();
        let b = key();
        let master = key();
        let chain = Keychain::new([a.clone()]).with_key(b.clone(), Some("rotated".into()));

        let blob = chain.export(&master).unwrap();
        let restored = Keychain::import(&blob, &master).unwrap();

        assert_eq!(restored.len(), 2);
        let entry = restored.get(b.fingerprint()).unwrap();
        assert_eq!(entry.label.as_deref(), Some("rotated"));
        assert_eq!(entry.key.raw_bytes(), b.raw_bytes());

        // a resolved key decrypts exactly like the original
        let message = encrypt_string("still readable", &a).unwrap();
        let found = restored.find_key_for_message(&message).unwrap();
        assert_eq!(
            decrypt_string(&message, found).unwrap(),
            "still readable"
        );
    }

    #[test]
    fn export_is_a_valid_envelope() {
        let master = key();
        let blob = Keychain::new([key()]).export(&master).unwrap();
        assert!(crate::message::message_key_fingerprint(&blob).is_ok());
    }

    #[test]
    fn import_with_wrong_master_key_fails_integrity() {
        let master = key();
        let blob = Keychain::new([key()]).export(&master).unwrap();
        assert_eq!(
            Keychain::import(&blob, &key()).unwrap_err(),
            CloakError::Integrity,
            "must not produce a garbled but successful keychain"
        );
    }

    #[test]
    fn forged_fingerprint_field_is_ignored() {
        let a = key();
        let master = key();
        // Hand-craft an export whose entry claims a bogus fingerprint.
        let json = format!(
            r#"[{{"key":"{}","createdAt":1000,"fingerprint":"deadbeef"}}]"#,
            a.to_text()
        );
        let blob = encrypt_string(&json, &master).unwrap();

        let chain = Keychain::import(&blob, &master).unwrap();
        assert!(!chain.contains("deadbeef".parse().unwrap()));
        assert!(chain.contains(a.fingerprint()), "lookup must use the recomputed fingerprint");
    }

    #[test]
    fn import_rejects_non_keychain_payload() {
        let master = key();
        let blob = encrypt_string("not a keychain", &master).unwrap();
        assert!(matches!(
            Keychain::import(&blob, &master),
            Err(CloakError::MalformedKeychain(_))
        ));
    }

    #[test]
    fn exported_entries_are_fingerprint_ordered() {
        let master = key();
        let chain = Keychain::new([key(), key(), key()]);
        let blob = chain.export(&master).unwrap();

        let json = decrypt_string(&blob, &master).unwrap();
        let wire: Vec<WireEntry> = serde_json::from_str(&json).unwrap();
        let fingerprints: Vec<Fingerprint> = wire
            .iter()
            .map(|w| CloakKey::parse(&w.key).unwrap().fingerprint())
            .collect();
        let mut sorted = fingerprints.clone();
        sorted.sort();
        assert_eq!(fingerprints, sorted);
    }
}
