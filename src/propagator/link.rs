//! Public-link fan-out: `dir/linked` + `dir/link/add` for parent mutations,
//! `item/linked` + `item/linked/rename` for renames.

use futures::stream::{self, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::crypto::{decrypt_folder_link_key, encrypt_metadata, EncryptionKey};
use crate::error::CoreResult;
use crate::model::{ItemKind, Metadata, PublicLink};
use crate::transport::sender::HttpMethod;
use crate::wire::endpoints;

use super::MetadataPropagator;

const FAN_OUT_CONCURRENCY: usize = 8;

#[derive(Deserialize, Default)]
struct LinkedStatus {
    #[serde(default)]
    linking: bool,
    #[serde(default)]
    links: Vec<PublicLink>,
}

/// A public link with its symmetric key already recovered.
struct ResolvedLink {
    link_uuid: Uuid,
    key: EncryptionKey,
}

impl MetadataPropagator {
    async fn resolve_links(&self, links: Vec<PublicLink>) -> Vec<ResolvedLink> {
        let master_keys = self.master_keys().await;
        links
            .into_iter()
            .filter_map(|link| {
                let key = decrypt_folder_link_key(&link.link_key, &master_keys)?;
                Some(ResolvedLink {
                    link_uuid: link.link_uuid,
                    key,
                })
            })
            .collect()
    }

    pub(crate) async fn link_fan_out_parent_mutation(
        &self,
        kind: ItemKind,
        parent_uuid: Uuid,
        item_uuid: Uuid,
        item_metadata: Metadata,
    ) -> CoreResult<()> {
        let response = self
            .transport
            .request(
                HttpMethod::Post,
                endpoints::DIR_LINKED,
                serde_json::json!({ "uuid": parent_uuid }),
                None,
            )
            .await?;

        let status = response.data_as::<LinkedStatus>().transpose()?.unwrap_or_default();
        if !status.linking {
            return Ok(());
        }

        let links = self.resolve_links(status.links).await;

        let targets = match kind {
            ItemKind::File => vec![super::ShareTarget {
                uuid: item_uuid,
                parent: parent_uuid.to_string(),
                metadata: item_metadata,
            }],
            ItemKind::Folder => {
                self.enumerate_descendants(item_uuid, parent_uuid, item_metadata)
                    .await
            }
        };

        let pairs: Vec<(&super::ShareTarget, &ResolvedLink)> = targets
            .iter()
            .flat_map(|target| links.iter().map(move |link| (target, link)))
            .collect();

        stream::iter(pairs)
            .for_each_concurrent(FAN_OUT_CONCURRENCY, |(target, link)| async move {
                let encrypted = encrypt_metadata(&target.metadata, &link.key);
                let result = self
                    .transport
                    .request(
                        HttpMethod::Post,
                        endpoints::DIR_LINK_ADD,
                        serde_json::json!({
                            "uuid": target.uuid,
                            "parent": target.parent,
                            "linkUUID": link.link_uuid,
                            "type": target.metadata.kind().as_str(),
                            "metadata": encrypted,
                            "key": link.key.to_base64(),
                            "expiration": "never",
                        }),
                        None,
                    )
                    .await;
                if let Err(error) = result {
                    tracing::warn!(%error, uuid = %target.uuid, link_uuid = %link.link_uuid, "dir/link/add dispatch failed, counted as done");
                }
            })
            .await;

        Ok(())
    }

    pub(crate) async fn link_fan_out_rename(
        &self,
        item_uuid: Uuid,
        new_metadata: Metadata,
    ) -> CoreResult<()> {
        let response = self
            .transport
            .request(
                HttpMethod::Post,
                endpoints::ITEM_LINKED,
                serde_json::json!({ "uuid": item_uuid }),
                None,
            )
            .await?;

        let status = response.data_as::<LinkedStatus>().transpose()?.unwrap_or_default();
        if !status.linking {
            return Ok(());
        }

        let links = self.resolve_links(status.links).await;

        stream::iter(links)
            .for_each_concurrent(FAN_OUT_CONCURRENCY, |link| {
                let new_metadata = new_metadata.clone();
                async move {
                    let encrypted = encrypt_metadata(&new_metadata, &link.key);
                    let result = self
                        .transport
                        .request(
                            HttpMethod::Post,
                            endpoints::ITEM_LINKED_RENAME,
                            serde_json::json!({
                                "uuid": item_uuid,
                                "linkUUID": link.link_uuid,
                                "metadata": encrypted,
                            }),
                            None,
                        )
                        .await;
                    if let Err(error) = result {
                        tracing::warn!(%error, %item_uuid, link_uuid = %link.link_uuid, "item/linked/rename dispatch failed, counted as done");
                    }
                }
            })
            .await;

        Ok(())
    }
}
