pub mod metadata;
pub mod types;

pub use metadata::{
    buffer_to_hash, canonical_json_with_checksum, decrypt_file_metadata, decrypt_folder_link_key,
    decrypt_folder_name, encrypt_folder_link_key, encrypt_metadata, encrypt_metadata_public_key,
    hash_fn,
};
pub use types::{EncryptionKey, MasterKeyList};
