//! Core data model: items, metadata, share grants, and public links.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discriminates files from folders on the wire (`"file" | "folder"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Folder,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::File => "file",
            ItemKind::Folder => "folder",
        }
    }
}

/// Plaintext metadata record for a file or folder. Encrypted as a whole
/// before it ever crosses the wire (see `crypto::metadata`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Metadata {
    File {
        name: String,
        size: u64,
        mime: String,
        key: String,
        #[serde(rename = "lastModified")]
        last_modified: i64,
    },
    Folder {
        name: String,
    },
}

impl Metadata {
    pub fn name(&self) -> &str {
        match self {
            Metadata::File { name, .. } => name,
            Metadata::Folder { name } => name,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Metadata::File { .. } => ItemKind::File,
            Metadata::Folder { .. } => ItemKind::Folder,
        }
    }
}

/// A file or folder tracked by the remote storage service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub uuid: Uuid,
    pub parent: Uuid,
    pub metadata: Metadata,
}

impl Item {
    pub fn kind(&self) -> ItemKind {
        self.metadata.kind()
    }
}

/// A grantee of a share on a folder subtree or item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShareGrant {
    #[serde(rename = "id")]
    pub recipient_id: String,
    #[serde(rename = "email")]
    pub recipient_email: String,
    #[serde(rename = "publicKey")]
    pub recipient_public_key: String,
}

/// A public link on a folder or item. `link_key` is still encrypted under
/// the master key list as received from the server; callers must decrypt it
/// before using it to encrypt per-link metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublicLink {
    #[serde(rename = "linkUUID")]
    pub link_uuid: Uuid,
    #[serde(rename = "linkKey")]
    pub link_key: String,
}

/// Fixed-size ciphertext blob addressed by region/bucket/uuid/index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub region: String,
    pub bucket: String,
    pub uuid: Uuid,
    pub index: u64,
}

/// Server-assigned key returned once an upload attempt finishes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadKey(pub String);
