//! Encrypt/decrypt operations over `Metadata` and `hash_fn`/`buffer_to_hash`.
//!
//! These are the crate's only concrete crypto: AES-256-GCM via `aws-lc-rs`,
//! the same AEAD primitive the chunk-transfer path already uses for upload
//! encryption. Real asymmetric crypto is out of scope here, so
//! `encrypt_metadata_public_key` derives a symmetric
//! key from the recipient's public-key string
//! (`EncryptionKey::derive_from_material`) rather than performing genuine
//! public-key encryption — a production embedder swaps this module out, not
//! the call sites that use it.

use aws_lc_rs::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};

use super::types::{EncryptionKey, MasterKeyList};
use crate::error::CoreError;
use crate::model::Metadata;

fn cipher_for(key: &EncryptionKey) -> LessSafeKey {
    let unbound = UnboundKey::new(&AES_256_GCM, key.as_bytes())
        .expect("AES-256-GCM key must be exactly 32 bytes");
    LessSafeKey::new(unbound)
}

/// Encrypt arbitrary bytes under `key`, returning `base64(nonce || ciphertext||tag)`.
fn encrypt_blob(plaintext: &[u8], key: &EncryptionKey) -> String {
    let cipher = cipher_for(key);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = plaintext.to_vec();
    cipher
        .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .expect("AES-256-GCM seal cannot fail for valid key material");

    let mut framed = nonce_bytes.to_vec();
    framed.extend_from_slice(&in_out);
    base64::engine::general_purpose::STANDARD.encode(framed)
}

fn decrypt_blob(blob: &str, key: &EncryptionKey) -> Option<Vec<u8>> {
    let raw = base64::engine::general_purpose::STANDARD
        .decode(blob)
        .ok()?;
    if raw.len() < NONCE_LEN {
        return None;
    }
    let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).ok()?;

    let cipher = cipher_for(key);
    let mut in_out = ciphertext.to_vec();
    let plaintext = cipher
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .ok()?;
    Some(plaintext.to_vec())
}

/// Encrypt a metadata record under the current master key.
pub fn encrypt_metadata(metadata: &Metadata, key: &EncryptionKey) -> String {
    let plaintext = serde_json::to_vec(metadata).expect("Metadata always serializes");
    encrypt_blob(&plaintext, key)
}

/// Encrypt a metadata record under a recipient's public key (see module
/// docs: this is a derived symmetric key, not real asymmetric crypto).
pub fn encrypt_metadata_public_key(metadata: &Metadata, public_key: &str) -> String {
    let key = EncryptionKey::derive_from_material(public_key.as_bytes());
    encrypt_metadata(metadata, &key)
}

/// Trial-decrypt a file metadata blob against every master key, newest
/// first. Returns `None` if no key recovers valid metadata, or if it
/// recovers a folder record (a file blob never contains one).
pub fn decrypt_file_metadata(blob: &str, master_keys: &MasterKeyList) -> Option<Metadata> {
    master_keys.try_decrypt_with_any(|key| {
        let plaintext = decrypt_blob(blob, key)?;
        let metadata: Metadata = serde_json::from_slice(&plaintext).ok()?;
        matches!(metadata, Metadata::File { .. }).then_some(metadata)
    })
}

/// Trial-decrypt a folder metadata blob, returning just its name.
pub fn decrypt_folder_name(blob: &str, master_keys: &MasterKeyList) -> Option<String> {
    master_keys.try_decrypt_with_any(|key| {
        let plaintext = decrypt_blob(blob, key)?;
        let metadata: Metadata = serde_json::from_slice(&plaintext).ok()?;
        match metadata {
            Metadata::Folder { name } => Some(name),
            Metadata::File { .. } => None,
        }
    })
}

/// Trial-decrypt a public link's `linkKey` field, yielding the symmetric
/// key per-link metadata is encrypted under.
pub fn decrypt_folder_link_key(blob: &str, master_keys: &MasterKeyList) -> Option<EncryptionKey> {
    master_keys.try_decrypt_with_any(|key| {
        let plaintext = decrypt_blob(blob, key)?;
        let bytes: [u8; 32] = plaintext.try_into().ok()?;
        Some(EncryptionKey::from_bytes(bytes))
    })
}

/// Deterministic 64-hex-char hash of a lowercase string, used for the
/// `nameHashed` field on create/rename requests.
pub fn hash_fn(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

/// SHA-512 hex digest of arbitrary bytes, used for the `Checksum` header and
/// for per-chunk upload hashes.
pub fn buffer_to_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha512::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Serialize `value` to canonical JSON bytes and return both the bytes and
/// their SHA-512 checksum. The same bytes must be what's written to the
/// wire — recomputing the hash from a second serialization risks producing
/// a checksum that doesn't match.
pub fn canonical_json_with_checksum<T: serde::Serialize>(
    value: &T,
) -> Result<(Vec<u8>, String), CoreError> {
    let bytes = serde_json::to_vec(value)?;
    let checksum = buffer_to_hash(&bytes);
    Ok((bytes, checksum))
}

/// Encrypt a freshly-generated folder-link symmetric key under the current
/// master key, in the same blob shape link keys arrive in from the server.
pub fn encrypt_folder_link_key(key: &EncryptionKey, master_key: &EncryptionKey) -> String {
    encrypt_blob(key.as_bytes(), master_key)
}
