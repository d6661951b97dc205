//! Public link enable/disable.

use std::sync::Arc;

use rand::Rng;
use uuid::Uuid;

use crate::crypto::hash_fn;
use crate::error::{CoreError, CoreResult};
use crate::model::ItemKind;
use crate::transport::sender::HttpMethod;
use crate::transport::Transport;
use crate::wire::endpoints;

const SALT_LEN: usize = 32;
const PLACEHOLDER_PASSWORD: &str = "empty";

fn random_salt() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..SALT_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

pub struct LinkOps {
    transport: Arc<Transport>,
}

impl LinkOps {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    /// Generates a fresh link UUID and enables public sharing on a file.
    /// Folder links are not implemented (matches the current contract).
    pub async fn enable_item_public_link(&self, uuid: Uuid, kind: ItemKind) -> CoreResult<Uuid> {
        if kind == ItemKind::Folder {
            return Err(CoreError::NotImplemented {
                what: "enabling a public link on a folder",
            });
        }

        let link_uuid = Uuid::new_v4();
        let response = self
            .transport
            .request(
                HttpMethod::Post,
                endpoints::FILE_LINK_EDIT,
                serde_json::json!({
                    "uuid": uuid,
                    "linkUUID": link_uuid,
                    "type": "enable",
                    "password": PLACEHOLDER_PASSWORD,
                    "passwordHashed": hash_fn(PLACEHOLDER_PASSWORD),
                    "salt": random_salt(),
                }),
                None,
            )
            .await?;

        if !response.status {
            return Err(CoreError::ServerError {
                message: response.message.unwrap_or_default(),
                code: response.code,
            });
        }

        Ok(link_uuid)
    }

    /// Disables a file's existing link, or removes a folder's link
    /// entirely (folders have no per-link UUID to target).
    pub async fn disable_item_public_link(
        &self,
        uuid: Uuid,
        kind: ItemKind,
        link_uuid: Option<Uuid>,
    ) -> CoreResult<()> {
        let response = match kind {
            ItemKind::File => {
                let link_uuid = link_uuid.ok_or_else(|| {
                    CoreError::Internal(anyhow::anyhow!(
                        "disabling a file's public link requires its existing linkUUID"
                    ))
                })?;
                self.transport
                    .request(
                        HttpMethod::Post,
                        endpoints::FILE_LINK_EDIT,
                        serde_json::json!({
                            "uuid": uuid,
                            "linkUUID": link_uuid,
                            "type": "disable",
                        }),
                        None,
                    )
                    .await?
            }
            ItemKind::Folder => {
                self.transport
                    .request(
                        HttpMethod::Post,
                        endpoints::DIR_LINK_REMOVE,
                        serde_json::json!({ "uuid": uuid }),
                        None,
                    )
                    .await?
            }
        };

        if !response.status {
            return Err(CoreError::ServerError {
                message: response.message.unwrap_or_default(),
                code: response.code,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_salt_is_32_alphanumeric_characters() {
        let salt = random_salt();
        assert_eq!(salt.len(), SALT_LEN);
        assert!(salt.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
