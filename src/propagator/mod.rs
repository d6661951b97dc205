//! Fans metadata changes out to a mutated item's share grantees and public
//! links after create/move/rename so shared viewers stay consistent with
//! the authoritative server state.
//!
//! Failures here are logged and swallowed: the primary operation has
//! already succeeded server-side by the time a propagator method is called,
//! and callers must not observe propagation errors through their own
//! return channel.

pub mod link;
pub mod share;

use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use crate::config_store::ConfigStore;
use crate::crypto::{decrypt_file_metadata, decrypt_folder_name, MasterKeyList};
use crate::html::strip_html_tags;
use crate::model::{ItemKind, Metadata};
use crate::transport::Transport;
use crate::wire::endpoints;

/// One item destined for a share or link dispatch: its identity plus the
/// parent string to send on the wire (usually a real UUID, occasionally the
/// server's `"none"` sentinel — see [`MetadataPropagator::enumerate_descendants`]).
#[derive(Clone, Debug)]
pub struct ShareTarget {
    pub uuid: Uuid,
    pub parent: String,
    pub metadata: Metadata,
}

#[derive(Deserialize)]
struct DirDownloadFolder {
    uuid: Uuid,
    parent: Uuid,
    name: String,
}

#[derive(Deserialize)]
struct DirDownloadFile {
    uuid: Uuid,
    parent: Uuid,
    metadata: String,
}

#[derive(Deserialize, Default)]
struct DirDownloadData {
    #[serde(default)]
    folders: Vec<DirDownloadFolder>,
    #[serde(default)]
    files: Vec<DirDownloadFile>,
}

pub struct MetadataPropagator {
    pub(crate) transport: Arc<Transport>,
    pub(crate) config_store: Arc<dyn ConfigStore>,
}

impl MetadataPropagator {
    pub fn new(transport: Arc<Transport>, config_store: Arc<dyn ConfigStore>) -> Self {
        Self {
            transport,
            config_store,
        }
    }

    pub(crate) async fn master_keys(&self) -> MasterKeyList {
        MasterKeyList::new(self.config_store.master_keys().await.unwrap_or_default())
    }

    /// Build the items-to-share list for a mutated folder: the folder
    /// itself (real parent) followed by every descendant recovered from
    /// `/v3/dir/download`, preserving each descendant's real parent —
    /// except the first descendant folder encountered, whose parent is
    /// rewritten to the `"none"` sentinel purely because it happens to land
    /// at index 0 of the folders list. That index dependence looks like a
    /// bug rather than a rule; it is preserved verbatim here rather than
    /// silently fixed (see DESIGN.md).
    pub(crate) async fn enumerate_descendants(
        &self,
        folder_uuid: Uuid,
        folder_parent: Uuid,
        folder_metadata: Metadata,
    ) -> Vec<ShareTarget> {
        let mut targets = vec![ShareTarget {
            uuid: folder_uuid,
            parent: folder_parent.to_string(),
            metadata: folder_metadata,
        }];

        let response = match self
            .transport
            .request(
                crate::transport::sender::HttpMethod::Post,
                endpoints::DIR_DOWNLOAD,
                serde_json::json!({ "uuid": folder_uuid }),
                None,
            )
            .await
        {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(%error, %folder_uuid, "dir/download failed during propagation");
                return targets;
            }
        };

        let data = match response.data_as::<DirDownloadData>() {
            Some(Ok(data)) => data,
            Some(Err(error)) => {
                tracing::warn!(%error, %folder_uuid, "dir/download payload did not decode");
                return targets;
            }
            None => DirDownloadData::default(),
        };

        let master_keys = self.master_keys().await;

        for (index, folder) in data.folders.into_iter().enumerate() {
            let Some(name) = decrypt_folder_name(&folder.name, &master_keys) else {
                continue;
            };
            let parent = if index == 0 {
                "none".to_string()
            } else {
                folder.parent.to_string()
            };
            targets.push(ShareTarget {
                uuid: folder.uuid,
                parent,
                metadata: Metadata::Folder {
                    name: strip_html_tags(&name),
                },
            });
        }

        for file in data.files {
            let Some(metadata) = decrypt_file_metadata(&file.metadata, &master_keys) else {
                continue;
            };
            let metadata = match metadata {
                Metadata::File {
                    name,
                    size,
                    mime,
                    key,
                    last_modified,
                } => Metadata::File {
                    name: strip_html_tags(&name),
                    size,
                    mime: strip_html_tags(&mime),
                    key,
                    last_modified,
                },
                folder @ Metadata::Folder { .. } => folder,
            };
            targets.push(ShareTarget {
                uuid: file.uuid,
                parent: file.parent.to_string(),
                metadata,
            });
        }

        targets
    }

    /// Called after create/move: a new item has entered `parent_uuid`.
    pub async fn on_parent_mutation(
        &self,
        kind: ItemKind,
        parent_uuid: Uuid,
        item_uuid: Uuid,
        item_metadata: Metadata,
    ) {
        let (share_result, link_result) = tokio::join!(
            self.share_fan_out_parent_mutation(kind, parent_uuid, item_uuid, item_metadata.clone()),
            self.link_fan_out_parent_mutation(kind, parent_uuid, item_uuid, item_metadata),
        );
        if let Err(error) = share_result {
            tracing::warn!(%error, %item_uuid, "share fan-out failed");
        }
        if let Err(error) = link_result {
            tracing::warn!(%error, %item_uuid, "link fan-out failed");
        }
    }

    /// Called after rename: `item_uuid`'s metadata changed identity in
    /// place.
    pub async fn on_item_rename(&self, item_uuid: Uuid, new_metadata: Metadata) {
        let (share_result, link_result) = tokio::join!(
            self.share_fan_out_rename(item_uuid, new_metadata.clone()),
            self.link_fan_out_rename(item_uuid, new_metadata),
        );
        if let Err(error) = share_result {
            tracing::warn!(%error, %item_uuid, "share rename fan-out failed");
        }
        if let Err(error) = link_result {
            tracing::warn!(%error, %item_uuid, "link rename fan-out failed");
        }
    }
}
