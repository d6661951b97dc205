//! Directory/file mutations: create (serialized through a process-wide
//! semaphore for name-uniqueness), rename, move, trash.

use std::sync::Arc;

use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::crypto::{encrypt_metadata, hash_fn, EncryptionKey};
use crate::error::{CoreError, CoreResult};
use crate::model::{ItemKind, Metadata};
use crate::propagator::MetadataPropagator;
use crate::transport::sender::HttpMethod;
use crate::transport::Transport;
use crate::wire::{endpoints, ApiResponse};

#[derive(serde::Deserialize, Default)]
struct CreateFolderData {
    #[serde(rename = "existsUUID")]
    exists_uuid: Option<Uuid>,
}

pub struct DirOps {
    transport: Arc<Transport>,
    propagator: Arc<MetadataPropagator>,
    create_folder_gate: Arc<Semaphore>,
}

impl DirOps {
    pub fn new(
        transport: Arc<Transport>,
        propagator: Arc<MetadataPropagator>,
        create_folder_gate: Arc<Semaphore>,
    ) -> Self {
        Self {
            transport,
            propagator,
            create_folder_gate,
        }
    }

    /// `true` when the mutation actually happened server-side and
    /// propagation should run; `false` when the server reported the item
    /// already absent (idempotent trash/move/rename).
    async fn mutate_or_idempotent(&self, response: CoreResult<ApiResponse>) -> CoreResult<bool> {
        let response = response?;
        if response.status {
            return Ok(true);
        }
        if response.is_idempotent_not_found() {
            return Ok(false);
        }
        Err(CoreError::ServerError {
            message: response.message.unwrap_or_default(),
            code: response.code,
        })
    }

    /// Create a folder, serialized through a 1-permit gate so two
    /// concurrent producers never both win a create for the same
    /// `(parent, lowercase(name))` pair.
    pub async fn create_folder(
        &self,
        name: &str,
        parent: Uuid,
        master_key: &EncryptionKey,
    ) -> CoreResult<Uuid> {
        let _permit = self
            .create_folder_gate
            .acquire()
            .await
            .map_err(|_| CoreError::Internal(anyhow::anyhow!("create-folder gate closed")))?;

        let uuid = Uuid::new_v4();
        let name_hashed = hash_fn(name);
        let metadata = Metadata::Folder {
            name: name.to_string(),
        };
        let encrypted = encrypt_metadata(&metadata, master_key);

        let response = self
            .transport
            .request(
                HttpMethod::Post,
                endpoints::DIR_CREATE,
                serde_json::json!({
                    "uuid": uuid,
                    "name": encrypted,
                    "nameHashed": name_hashed,
                    "parent": parent,
                }),
                None,
            )
            .await?;

        if !response.status {
            if let Some(Ok(data)) = response.data_as::<CreateFolderData>() {
                if let Some(existing) = data.exists_uuid {
                    return Ok(existing);
                }
            }
            return Err(CoreError::ServerError {
                message: response.message.unwrap_or_default(),
                code: response.code,
            });
        }

        drop(_permit);
        self.propagator
            .on_parent_mutation(ItemKind::Folder, parent, uuid, metadata)
            .await;

        Ok(uuid)
    }

    pub async fn rename_file(
        &self,
        uuid: Uuid,
        new_metadata: Metadata,
        master_key: &EncryptionKey,
    ) -> CoreResult<()> {
        let encrypted = encrypt_metadata(&new_metadata, master_key);
        let name_hashed = hash_fn(new_metadata.name());
        let response = self
            .transport
            .request(
                HttpMethod::Post,
                endpoints::FILE_RENAME,
                serde_json::json!({ "uuid": uuid, "metadata": encrypted, "nameHashed": name_hashed }),
                None,
            )
            .await;
        if self.mutate_or_idempotent(response).await? {
            self.propagator.on_item_rename(uuid, new_metadata).await;
        }
        Ok(())
    }

    pub async fn rename_folder(
        &self,
        uuid: Uuid,
        new_name: &str,
        master_key: &EncryptionKey,
    ) -> CoreResult<()> {
        let new_metadata = Metadata::Folder {
            name: new_name.to_string(),
        };
        let encrypted = encrypt_metadata(&new_metadata, master_key);
        let name_hashed = hash_fn(new_name);
        let response = self
            .transport
            .request(
                HttpMethod::Post,
                endpoints::DIR_RENAME,
                serde_json::json!({ "uuid": uuid, "name": encrypted, "nameHashed": name_hashed }),
                None,
            )
            .await;
        if self.mutate_or_idempotent(response).await? {
            self.propagator.on_item_rename(uuid, new_metadata).await;
        }
        Ok(())
    }

    pub async fn move_file(&self, uuid: Uuid, new_parent: Uuid, metadata: Metadata) -> CoreResult<()> {
        let response = self
            .transport
            .request(
                HttpMethod::Post,
                endpoints::FILE_MOVE,
                serde_json::json!({ "uuid": uuid, "parent": new_parent }),
                None,
            )
            .await;
        if self.mutate_or_idempotent(response).await? {
            self.propagator
                .on_parent_mutation(ItemKind::File, new_parent, uuid, metadata)
                .await;
        }
        Ok(())
    }

    pub async fn move_folder(&self, uuid: Uuid, new_parent: Uuid, metadata: Metadata) -> CoreResult<()> {
        let response = self
            .transport
            .request(
                HttpMethod::Post,
                endpoints::DIR_MOVE,
                serde_json::json!({ "uuid": uuid, "parent": new_parent }),
                None,
            )
            .await;
        if self.mutate_or_idempotent(response).await? {
            self.propagator
                .on_parent_mutation(ItemKind::Folder, new_parent, uuid, metadata)
                .await;
        }
        Ok(())
    }

    /// Trash is idempotent on an already-absent item and never triggers
    /// propagation: the item is leaving every share and link, not entering
    /// one, and server-side removal already notifies those views.
    pub async fn trash_file(&self, uuid: Uuid) -> CoreResult<()> {
        let response = self
            .transport
            .request(
                HttpMethod::Post,
                endpoints::FILE_TRASH,
                serde_json::json!({ "uuid": uuid }),
                None,
            )
            .await;
        self.mutate_or_idempotent(response).await?;
        Ok(())
    }

    pub async fn trash_folder(&self, uuid: Uuid) -> CoreResult<()> {
        let response = self
            .transport
            .request(
                HttpMethod::Post,
                endpoints::DIR_TRASH,
                serde_json::json!({ "uuid": uuid }),
                None,
            )
            .await;
        self.mutate_or_idempotent(response).await?;
        Ok(())
    }
}
