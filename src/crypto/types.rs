//! Symmetric key material used throughout the metadata crypto layer.

use crate::error::CoreError;
use base64::Engine;
use rand::RngCore;

const KEY_LEN: usize = 32;

/// A 256-bit symmetric key, opaque outside this crate except for the
/// base64 transport encoding the wire protocol expects.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EncryptionKey").field(&"<redacted>").finish()
    }
}

impl EncryptionKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.0)
    }

    pub fn from_base64(s: &str) -> Result<Self, CoreError> {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(|e| CoreError::Internal(anyhow::anyhow!("invalid key encoding: {e}")))?;
        let bytes: [u8; KEY_LEN] = decoded
            .try_into()
            .map_err(|_| CoreError::Internal(anyhow::anyhow!("key must be {KEY_LEN} bytes")))?;
        Ok(Self(bytes))
    }

    /// Derive a deterministic key from arbitrary key material such as a
    /// recipient's public-key string. A production deployment would replace
    /// this whole module with real asymmetric crypto; this keeps the
    /// (data, public_key) -> ciphertext contract testable in the meantime.
    pub fn derive_from_material(material: &[u8]) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(material);
        let digest = hasher.finalize();
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }
}

/// Ordered sequence of symmetric keys; the last element is the current
/// encryption key, any element may be tried for decryption.
#[derive(Clone, Debug)]
pub struct MasterKeyList(Vec<EncryptionKey>);

impl MasterKeyList {
    pub fn new(keys: Vec<EncryptionKey>) -> Self {
        Self(keys)
    }

    /// The most recently added key, used to encrypt new metadata. Panics if
    /// the list is empty: per the data model, master keys are never empty
    /// in a valid session and callers should have already checked for a
    /// missing session before reaching here.
    pub fn current(&self) -> &EncryptionKey {
        self.0.last().expect("master key list must not be empty")
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Trial-decrypt `blob` with every key, newest first, returning the
    /// first success.
    pub fn try_decrypt_with_any<T>(
        &self,
        mut attempt: impl FnMut(&EncryptionKey) -> Option<T>,
    ) -> Option<T> {
        self.0.iter().rev().find_map(|key| attempt(key))
    }
}
