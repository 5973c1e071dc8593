//! Per-session encryption key slot.
//!
//! A [`SessionKey`] starts uninitialized. After a successful login the client
//! calls [`SessionKey::initialize`] once with the password the user just typed;
//! only the derived key is kept. Every envelope operation before that fails
//! with [`EnvelopeError::KeyUninitialized`].

use std::sync::OnceLock;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::document::{ProgressDocument, StoredProgress};
use crate::envelope::{self, EnvelopeError, ProgressKey};

/// Key material for one logged-in session. Safe to share across threads.
#[derive(Debug, Default)]
pub struct SessionKey {
    key: OnceLock<ProgressKey>,
}

impl SessionKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.key.get().is_some()
    }

    /// Derive the session key from `password`. Allowed exactly once.
    pub fn initialize(&self, password: &str) -> Result<(), EnvelopeError> {
        if self.is_initialized() {
            return Err(EnvelopeError::KeyAlreadyInitialized);
        }
        self.install(envelope::derive_key(password))
    }

    /// Install an already-derived key. Allowed exactly once.
    pub fn install(&self, key: ProgressKey) -> Result<(), EnvelopeError> {
        self.key
            .set(key)
            .map_err(|_| EnvelopeError::KeyAlreadyInitialized)
    }

    fn key(&self) -> Result<&ProgressKey, EnvelopeError> {
        self.key.get().ok_or(EnvelopeError::KeyUninitialized)
    }

    pub fn encrypt<T: Serialize + ?Sized>(&self, document: &T) -> Result<String, EnvelopeError> {
        envelope::encrypt(document, self.key()?)
    }

    pub fn decrypt<T: DeserializeOwned>(&self, envelope: &str) -> Result<T, EnvelopeError> {
        envelope::decrypt(envelope, self.key()?)
    }

    /// Wrap a document into the `{ encrypted }` stored form.
    pub fn seal(&self, document: &ProgressDocument) -> Result<StoredProgress, EnvelopeError> {
        Ok(StoredProgress::Encrypted {
            encrypted: self.encrypt(document)?,
        })
    }

    /// Recover the document from either stored form.
    ///
    /// Plaintext documents pass through without touching the key, so data
    /// saved before encryption was enabled still loads.
    pub fn open(&self, stored: StoredProgress) -> Result<ProgressDocument, EnvelopeError> {
        match stored {
            StoredProgress::Plain(document) => Ok(document),
            StoredProgress::Encrypted { encrypted } => self.decrypt(&encrypted),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use serde_json::{json, Value};

    use super::*;
    use crate::document::Theme;
    use crate::envelope::test_key;

    fn ready() -> SessionKey {
        let slot = SessionKey::new();
        slot.install(test_key()).unwrap();
        slot
    }

    #[test]
    fn uninitialized_slot_refuses_to_encrypt_or_decrypt() {
        let slot = SessionKey::new();
        assert!(!slot.is_initialized());
        assert_eq!(slot.encrypt(&json!({})), Err(EnvelopeError::KeyUninitialized));
        assert_eq!(
            slot.decrypt::<Value>("AAAA"),
            Err(EnvelopeError::KeyUninitialized)
        );
        assert_matches!(
            slot.seal(&ProgressDocument::empty()),
            Err(EnvelopeError::KeyUninitialized)
        );
    }

    #[test]
    fn second_initialization_is_rejected() {
        let slot = ready();
        assert_eq!(
            slot.install(test_key()),
            Err(EnvelopeError::KeyAlreadyInitialized)
        );
        assert_eq!(
            slot.initialize("anything"),
            Err(EnvelopeError::KeyAlreadyInitialized)
        );
    }

    #[test]
    fn initialize_derives_the_standard_key() {
        let slot = SessionKey::new();
        slot.initialize("hunter2-but-longer").unwrap();
        assert!(slot.is_initialized());

        let envelope = slot.encrypt(&json!({ "a": 1 })).unwrap();
        let other = envelope::derive_key("hunter2-but-longer");
        let restored: Value = envelope::decrypt(&envelope, &other).unwrap();
        assert_eq!(restored, json!({ "a": 1 }));
    }

    #[test]
    fn seal_then_open_restores_the_document() {
        let slot = ready();
        let mut document = ProgressDocument::empty();
        document.settings.theme = Theme::Dark;

        let sealed = slot.seal(&document).unwrap();
        assert!(sealed.is_encrypted());
        assert_eq!(slot.open(sealed).unwrap(), document);
    }

    #[test]
    fn open_passes_plaintext_through_without_a_key() {
        let slot = SessionKey::new();
        let document = ProgressDocument::empty();
        assert_eq!(
            slot.open(StoredProgress::Plain(document.clone())).unwrap(),
            document
        );
    }

    #[test]
    fn concurrent_use_from_many_threads() {
        let slot = Arc::new(ready());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let slot = Arc::clone(&slot);
                std::thread::spawn(move || {
                    let doc = json!({ "thread": i });
                    let envelope = slot.encrypt(&doc).unwrap();
                    let restored: Value = slot.decrypt(&envelope).unwrap();
                    (envelope, restored, doc)
                })
            })
            .collect();

        let mut envelopes = Vec::new();
        for handle in handles {
            let (envelope, restored, doc) = handle.join().unwrap();
            assert_eq!(restored, doc);
            envelopes.push(envelope);
        }
        envelopes.sort();
        envelopes.dedup();
        assert_eq!(envelopes.len(), 8);
    }
}
