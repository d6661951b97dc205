//! `uploadChunk` / `markUploadAsDone`.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::crypto::{buffer_to_hash, canonical_json_with_checksum};
use crate::error::{CoreError, CoreResult};
use crate::pause::TransferSource;
use crate::throttle::ThrottleHandle;
use crate::wire::{endpoints, ApiResponse};

use super::events::{TransferEvent, TransferEventKind};
use super::TransferEngine;

const WINDOW_BYTES: usize = 64 * 1024;

fn build_query_string(params: &Map<String, Value>) -> String {
    params
        .iter()
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{k}={}", urlencoding::encode(&value))
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn progress_uuid(params: &Map<String, Value>) -> Uuid {
    params
        .get("uuid")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::nil)
}

impl TransferEngine {
    /// Pipe `data` through the upload throttle group in fixed windows,
    /// emitting a progress delta per window. Windowing a pre-loaded buffer
    /// rather than a true byte stream keeps both progress and throttling
    /// deterministic to test; production callers never hold chunks larger
    /// than the configured chunk size in memory anyway.
    async fn throttled_send(
        &self,
        data: &[u8],
        handle: &ThrottleHandle,
        uuid: Uuid,
        source: &TransferSource,
        kind: TransferEventKind,
    ) {
        for window in data.chunks(WINDOW_BYTES) {
            handle.throttle(window.len() as u64).await;
            self.events.emit(TransferEvent {
                kind,
                uuid,
                bytes: window.len() as u64,
                from: source.clone(),
            });
        }
    }

    /// Upload one chunk, blocking on the pause gate and retrying transient
    /// non-200 responses up to `maxRetryUpload` times.
    pub async fn upload_chunk(
        &self,
        mut query_params: Map<String, Value>,
        data: Vec<u8>,
        source: TransferSource,
    ) -> CoreResult<ApiResponse> {
        let networking = self.config_store.networking_settings().await;
        let max_storage_reached = self.config_store.is_max_storage_reached().await;
        let api_key = self.config_store.api_key().await;
        let chunk_hash = {
            let data = data.clone();
            tokio::task::spawn_blocking(move || buffer_to_hash(&data))
                .await
                .map_err(|e| CoreError::Internal(anyhow::anyhow!("hash worker panicked: {e}")))?
        };

        if max_storage_reached {
            return Err(CoreError::MaxStorageReached(
                "storage quota already exhausted".to_string(),
            ));
        }

        self.pause_gate.wait(&source).await;

        query_params.insert("hash".to_string(), Value::String(chunk_hash));
        let (_, checksum) = canonical_json_with_checksum(&Value::Object(query_params.clone()))?;

        let upload_rate_bytes_per_sec = networking
            .upload_kbps
            .map(|kbps| kbps as u64 * 1024)
            .unwrap_or(crate::common::config::UNLIMITED_RATE_BYTES_PER_SEC);
        self.upload_throttle
            .set_limit_bytes_per_sec(upload_rate_bytes_per_sec);

        let api_key = api_key.ok_or(CoreError::SessionInvalidated)?;
        let query_string = build_query_string(&query_params);
        let uuid = progress_uuid(&query_params);
        let retry = &self.transport.config().retry;
        let max_attempts = retry.max_retry_upload;
        let retry_timeout = retry.retry_upload_timeout;

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let host = self.transport.pick_upload_host()?;
            let url = format!("{host}{}?{query_string}", endpoints::UPLOAD);
            let headers = vec![
                (
                    "Content-Type".to_string(),
                    "application/octet-stream".to_string(),
                ),
                (
                    "User-Agent".to_string(),
                    self.transport.config().identity.user_agent(),
                ),
                ("Authorization".to_string(), format!("Bearer {api_key}")),
                ("Checksum".to_string(), checksum.clone()),
            ];

            let handle = ThrottleHandle::new(self.upload_throttle.clone());
            self.throttled_send(
                &data,
                &handle,
                uuid,
                &source,
                if matches!(source, TransferSource::Sync { .. }) {
                    TransferEventKind::UploadProgress
                } else {
                    TransferEventKind::UploadProgressSeparate
                },
            )
            .await;

            match self.transport.upload_attempt(&url, headers, data.clone()).await {
                Err(send_error) => {
                    return Err(CoreError::Transport {
                        operation: "upload",
                        source: send_error,
                    });
                }
                Ok(raw) => {
                    if !raw.is_ok() {
                        if attempt >= max_attempts {
                            return Err(CoreError::MaxRetries {
                                method: "POST".to_string(),
                                endpoint: endpoints::UPLOAD.to_string(),
                                detail: format!("non-200 status after {attempt} attempts"),
                            });
                        }
                        tracing::warn!(attempt, status = raw.status, "upload attempt failed, retrying");
                        tokio::time::sleep(retry_timeout).await;
                        continue;
                    }

                    let parsed: ApiResponse = serde_json::from_slice(&raw.body)?;
                    if !parsed.status {
                        let message = parsed.message.clone().unwrap_or_default();
                        if message.to_lowercase().contains("storage") {
                            self.config_store.set_paused(true).await;
                            self.config_store.set_max_storage_reached(true).await;
                        }
                        return Err(CoreError::ServerError {
                            message,
                            code: parsed.code.clone(),
                        });
                    }

                    return Ok(parsed);
                }
            }
        }
    }

    /// Thin pass-through to `/v3/upload/done`.
    pub async fn mark_upload_as_done(&self, record: Value) -> CoreResult<ApiResponse> {
        self.transport
            .request(
                crate::transport::sender::HttpMethod::Post,
                endpoints::UPLOAD_DONE,
                record,
                None,
            )
            .await
    }
}
