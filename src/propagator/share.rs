//! Share-grantee fan-out: `dir/shared` + `item/share` for parent mutations,
//! `item/shared` + `item/shared/rename` for renames.

use futures::stream::{self, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::crypto::encrypt_metadata_public_key;
use crate::error::CoreResult;
use crate::model::{ItemKind, Metadata, ShareGrant};
use crate::transport::sender::HttpMethod;
use crate::wire::endpoints;

use super::MetadataPropagator;

const FAN_OUT_CONCURRENCY: usize = 8;

#[derive(Deserialize, Default)]
struct SharedStatus {
    #[serde(default)]
    sharing: bool,
    #[serde(default)]
    users: Vec<ShareGrant>,
}

impl MetadataPropagator {
    pub(crate) async fn share_fan_out_parent_mutation(
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
                endpoints::DIR_SHARED,
                serde_json::json!({ "uuid": parent_uuid }),
                None,
            )
            .await?;

        let status = response.data_as::<SharedStatus>().transpose()?.unwrap_or_default();
        if !status.sharing {
            return Ok(());
        }

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

        let pairs: Vec<(&super::ShareTarget, &ShareGrant)> = targets
            .iter()
            .flat_map(|target| status.users.iter().map(move |user| (target, user)))
            .collect();

        stream::iter(pairs)
            .for_each_concurrent(FAN_OUT_CONCURRENCY, |(target, user)| async move {
                let encrypted = encrypt_metadata_public_key(&target.metadata, &user.recipient_public_key);
                let result = self
                    .transport
                    .request(
                        HttpMethod::Post,
                        endpoints::ITEM_SHARE,
                        serde_json::json!({
                            "uuid": target.uuid,
                            "parent": target.parent,
                            "email": user.recipient_email,
                            "type": target.metadata.kind().as_str(),
                            "metadata": encrypted,
                        }),
                        None,
                    )
                    .await;
                if let Err(error) = result {
                    tracing::warn!(%error, uuid = %target.uuid, email = %user.recipient_email, "item/share dispatch failed, counted as done");
                }
            })
            .await;

        Ok(())
    }

    pub(crate) async fn share_fan_out_rename(
        &self,
        item_uuid: Uuid,
        new_metadata: Metadata,
    ) -> CoreResult<()> {
        let response = self
            .transport
            .request(
                HttpMethod::Post,
                endpoints::ITEM_SHARED,
                serde_json::json!({ "uuid": item_uuid }),
                None,
            )
            .await?;

        let status = response.data_as::<SharedStatus>().transpose()?.unwrap_or_default();
        if !status.sharing {
            return Ok(());
        }

        stream::iter(status.users)
            .for_each_concurrent(FAN_OUT_CONCURRENCY, |user| {
                let new_metadata = new_metadata.clone();
                async move {
                    let encrypted = encrypt_metadata_public_key(&new_metadata, &user.recipient_public_key);
                    let result = self
                        .transport
                        .request(
                            HttpMethod::Post,
                            endpoints::ITEM_SHARED_RENAME,
                            serde_json::json!({
                                "uuid": item_uuid,
                                "receiverId": user.recipient_id,
                                "metadata": encrypted,
                            }),
                            None,
                        )
                        .await;
                    if let Err(error) = result {
                        tracing::warn!(%error, %item_uuid, recipient = %user.recipient_id, "item/shared/rename dispatch failed, counted as done");
                    }
                }
            })
            .await;

        Ok(())
    }
}
