//! Password-derived AES-256-GCM encryption of progress documents.
//!
//! Wire format of an envelope (Base64, standard alphabet, padded):
//!
//! ```text
//! +-----------------+------------------------------+
//! | nonce (12 B)    | ciphertext || GCM tag (16 B) |
//! +-----------------+------------------------------+
//! ```
//!
//! The key comes from PBKDF2-HMAC-SHA256 over the user's password with a
//! fixed salt shared by every account. Changing the salt or iteration count
//! changes the key and makes existing envelopes unreadable.

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Sha256;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// PBKDF2 iteration count.
pub const KDF_ITERATIONS: u32 = 100_000;

/// Static salt shared by all users.
pub const KDF_SALT: &[u8] = b"studyplan-progress-envelope-v1";

/// Name of the key derivation function, as published to clients.
pub const KDF_ALGORITHM: &str = "pbkdf2-sha256";

/// Derived key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures of the envelope transforms and the session key slot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    /// The envelope is not decodable: bad Base64, truncated, or the
    /// authenticated plaintext is not the expected JSON.
    #[error("Malformed envelope: {0}")]
    Malformed(String),

    /// The tag did not verify: wrong key or tampered data.
    #[error("Envelope authentication failed")]
    Authentication,

    /// The document could not be serialized before encryption.
    #[error("Failed to serialize document: {0}")]
    Serialization(String),

    /// The cipher rejected the encryption request.
    #[error("Encryption failed")]
    Encryption,

    /// Encrypt/decrypt attempted before a key was derived for the session.
    #[error("Encryption key is not initialized")]
    KeyUninitialized,

    /// The session key was already derived once.
    #[error("Encryption key is already initialized")]
    KeyAlreadyInitialized,
}

impl EnvelopeError {
    /// Whether this is a decryption-side failure (as opposed to a misuse).
    pub fn is_decryption_failure(&self) -> bool {
        matches!(self, Self::Malformed(_) | Self::Authentication)
    }
}

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

/// A 256-bit symmetric key for progress envelopes.
///
/// Held in memory only; `Debug` does not print the key material.
#[derive(Clone, PartialEq, Eq)]
pub struct ProgressKey([u8; KEY_LEN]);

impl ProgressKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(&self.0.into())
    }
}

impl fmt::Debug for ProgressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProgressKey(..)")
    }
}

/// Derive the envelope key from a password with the standard parameters.
pub fn derive_key(password: &str) -> ProgressKey {
    derive_key_with(password, KDF_SALT, KDF_ITERATIONS)
}

/// Derive a key with explicit salt and iteration count.
pub fn derive_key_with(password: &str, salt: &[u8], iterations: u32) -> ProgressKey {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    ProgressKey(key)
}

/// Key derivation parameters clients need to derive the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KdfParams {
    pub algorithm: &'static str,
    pub iterations: u32,
    /// Base64-encoded salt.
    pub salt: String,
    pub key_length: usize,
}

impl KdfParams {
    pub fn current() -> Self {
        Self {
            algorithm: KDF_ALGORITHM,
            iterations: KDF_ITERATIONS,
            salt: B64.encode(KDF_SALT),
            key_length: KEY_LEN,
        }
    }
}

// ---------------------------------------------------------------------------
// Encrypt / decrypt
// ---------------------------------------------------------------------------

/// Encrypt a document into a Base64 envelope.
///
/// Every call draws a fresh random nonce, so encrypting the same document
/// twice yields different envelopes.
pub fn encrypt<T: Serialize + ?Sized>(
    document: &T,
    key: &ProgressKey,
) -> Result<String, EnvelopeError> {
    let plaintext =
        serde_json::to_vec(document).map_err(|e| EnvelopeError::Serialization(e.to_string()))?;

    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill(&mut nonce);

    let sealed = key
        .cipher()
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
        .map_err(|_| EnvelopeError::Encryption)?;

    let mut envelope = Vec::with_capacity(NONCE_LEN + sealed.len());
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&sealed);
    Ok(B64.encode(envelope))
}

/// Decrypt a Base64 envelope back into a document.
///
/// Fails closed: nothing is returned unless the tag verifies and the
/// plaintext parses.
pub fn decrypt<T: DeserializeOwned>(envelope: &str, key: &ProgressKey) -> Result<T, EnvelopeError> {
    let bytes = decode_envelope(envelope)?;
    let (nonce, sealed) = bytes.split_at(NONCE_LEN);

    let plaintext = key
        .cipher()
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| EnvelopeError::Authentication)?;

    serde_json::from_slice(&plaintext)
        .map_err(|e| EnvelopeError::Malformed(format!("invalid document JSON: {e}")))
}

/// Structural check of an envelope without a key: Base64 and minimum length.
pub fn check_envelope_format(envelope: &str) -> Result<(), EnvelopeError> {
    decode_envelope(envelope).map(|_| ())
}

fn decode_envelope(envelope: &str) -> Result<Vec<u8>, EnvelopeError> {
    let bytes = B64
        .decode(envelope.trim())
        .map_err(|e| EnvelopeError::Malformed(format!("invalid Base64: {e}")))?;
    if bytes.len() < NONCE_LEN + TAG_LEN {
        return Err(EnvelopeError::Malformed(format!(
            "envelope is {} bytes, expected at least {}",
            bytes.len(),
            NONCE_LEN + TAG_LEN
        )));
    }
    Ok(bytes)
}

/// Cheap key for unit tests; the real iteration count is slow in debug builds.
#[cfg(test)]
pub(crate) fn test_key() -> ProgressKey {
    derive_key_with("test-password", KDF_SALT, 1_000)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
