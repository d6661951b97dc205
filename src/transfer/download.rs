//! `downloadChunk`.

use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::pause::TransferSource;
use crate::throttle::ThrottleHandle;

use super::events::{TransferEvent, TransferEventKind};
use super::TransferEngine;

const WINDOW_BYTES: usize = 64 * 1024;

impl TransferEngine {
    /// Download one chunk, retrying any failure (non-200, connection error,
    /// or timeout) up to `maxRetryDownload` times — unlike upload, a
    /// transport-level failure here is still transient and retried, since a
    /// download has no side effect on the server to make idempotent.
    pub async fn download_chunk(
        &self,
        region: &str,
        bucket: &str,
        uuid: Uuid,
        index: u64,
        source: TransferSource,
    ) -> CoreResult<Vec<u8>> {
        let networking = self.config_store.networking_settings().await;
        self.pause_gate.wait(&source).await;

        let download_rate_bytes_per_sec = networking
            .download_kbps
            .map(|kbps| kbps as u64 * 1024)
            .unwrap_or(crate::common::config::UNLIMITED_RATE_BYTES_PER_SEC);
        self.download_throttle
            .set_limit_bytes_per_sec(download_rate_bytes_per_sec);

        let retry = &self.transport.config().retry;
        let max_attempts = retry.max_retry_download;
        let retry_timeout = retry.retry_download_timeout;
        let path = format!("/{region}/{bucket}/{uuid}/{index}");

        let kind = if matches!(source, TransferSource::Sync { .. }) {
            TransferEventKind::DownloadProgress
        } else {
            TransferEventKind::DownloadProgressSeparate
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let host = self.transport.pick_download_host()?;
            let url = format!("{host}{path}");
            let headers = vec![(
                "User-Agent".to_string(),
                self.transport.config().identity.user_agent(),
            )];

            let outcome = self.transport.download_attempt(&url, headers).await;
            let failed = match &outcome {
                Err(_) => true,
                Ok(raw) => !raw.is_ok(),
            };

            if failed {
                if attempt >= max_attempts {
                    return Err(CoreError::MaxRetries {
                        method: "GET".to_string(),
                        endpoint: path,
                        detail: format!("download failed after {attempt} attempts"),
                    });
                }
                tracing::warn!(attempt, %path, "download attempt failed, retrying");
                tokio::time::sleep(retry_timeout).await;
                continue;
            }

            let raw = outcome.expect("checked above");
            let handle = ThrottleHandle::new(self.download_throttle.clone());
            let mut accumulated = Vec::with_capacity(raw.body.len());
            for window in raw.body.chunks(WINDOW_BYTES) {
                handle.throttle(window.len() as u64).await;
                self.events.emit(TransferEvent {
                    kind,
                    uuid,
                    bytes: window.len() as u64,
                    from: source.clone(),
                });
                accumulated.extend_from_slice(window);
            }

            return Ok(accumulated);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use crate::common::config::CoreConfig;
    use crate::config_store::{ConfigStore, InMemoryConfigStore};
    use crate::pause::{NoSyncCollaborator, PauseGate};
    use crate::throttle::ThrottleGroup;
    use crate::transport::sender::{HttpSender, RawRequest, RawResponse, SendError};
    use crate::transport::{AlwaysOnline, NoopLogout, Transport};

    use super::super::events::EventBus;
    use super::*;

    struct ScriptedSender {
        responses: std::sync::Mutex<Vec<Result<RawResponse, ()>>>,
        calls: AtomicU32,
    }

    impl ScriptedSender {
        fn new(responses: Vec<Result<RawResponse, ()>>) -> Self {
            Self {
                responses: std::sync::Mutex::new(responses),
                calls: AtomicU32::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl HttpSender for ScriptedSender {
        async fn send(&self, _request: RawRequest) -> Result<RawResponse, SendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                panic!("ScriptedSender ran out of scripted responses");
            }
            match responses.remove(0) {
                Ok(resp) => Ok(resp),
                Err(()) => Err(SendError::Connection("boom".to_string())),
            }
        }
    }

    fn fast_config() -> CoreConfig {
        let mut config = CoreConfig::default();
        config.retry.retry_download_timeout = std::time::Duration::from_millis(1);
        config.gateways.download_hosts = vec!["https://down.example".to_string()];
        config
    }

    fn engine_with(sender: Arc<ScriptedSender>, config: CoreConfig) -> TransferEngine {
        engine_with_store(sender, config, Arc::new(InMemoryConfigStore::new()))
    }

    fn engine_with_store(
        sender: Arc<ScriptedSender>,
        config: CoreConfig,
        config_store: Arc<InMemoryConfigStore>,
    ) -> TransferEngine {
        let transport = Arc::new(Transport::new(
            config,
            sender,
            config_store.clone(),
            Arc::new(AlwaysOnline),
            Arc::new(NoopLogout),
        ));
        TransferEngine::new(
            transport,
            ThrottleGroup::unlimited(),
            ThrottleGroup::unlimited(),
            Arc::new(PauseGate::new(config_store.clone(), Arc::new(NoSyncCollaborator))),
            config_store,
            EventBus::new(),
        )
    }

    #[tokio::test]
    async fn retries_a_connection_failure_then_succeeds() {
        let sender = Arc::new(ScriptedSender::new(vec![
            Err(()),
            Ok(RawResponse {
                status: 200,
                body: b"chunk-bytes".to_vec(),
            }),
        ]));
        let engine = engine_with(sender.clone(), fast_config());

        let bytes = engine
            .download_chunk("eu-1", "bucket", Uuid::new_v4(), 0, TransferSource::Download)
            .await
            .unwrap();

        assert_eq!(bytes, b"chunk-bytes");
        assert_eq!(sender.call_count(), 2);
    }

    #[tokio::test]
    async fn retries_a_non_200_status_then_succeeds() {
        let sender = Arc::new(ScriptedSender::new(vec![
            Ok(RawResponse {
                status: 503,
                body: b"".to_vec(),
            }),
            Ok(RawResponse {
                status: 200,
                body: b"payload".to_vec(),
            }),
        ]));
        let engine = engine_with(sender.clone(), fast_config());

        let bytes = engine
            .download_chunk("eu-1", "bucket", Uuid::new_v4(), 0, TransferSource::Download)
            .await
            .unwrap();

        assert_eq!(bytes, b"payload");
        assert_eq!(sender.call_count(), 2);
    }

    #[tokio::test]
    async fn exhausting_retries_surfaces_max_retries() {
        let mut config = fast_config();
        config.retry.max_retry_download = 2;
        let sender = Arc::new(ScriptedSender::new(vec![Err(()), Err(())]));
        let engine = engine_with(sender.clone(), config);

        let err = engine
            .download_chunk("eu-1", "bucket", Uuid::new_v4(), 0, TransferSource::Download)
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::MaxRetries { .. }));
        assert_eq!(sender.call_count(), 2);
    }

    #[tokio::test]
    async fn emits_a_progress_event_per_window() {
        let sender = Arc::new(ScriptedSender::new(vec![Ok(RawResponse {
            status: 200,
            body: vec![0u8; WINDOW_BYTES * 2 + 1],
        })]));
        let engine = engine_with(sender, fast_config());
        let mut events = engine.events().subscribe();
        let uuid = Uuid::new_v4();

        engine
            .download_chunk("eu-1", "bucket", uuid, 0, TransferSource::Download)
            .await
            .unwrap();

        let mut total = 0u64;
        let mut windows = 0;
        while let Ok(event) = events.try_recv() {
            assert_eq!(event.uuid, uuid);
            assert_eq!(event.kind, TransferEventKind::DownloadProgress);
            total += event.bytes;
            windows += 1;
        }
        assert_eq!(total, (WINDOW_BYTES * 2 + 1) as u64);
        assert_eq!(windows, 3);
    }

    #[tokio::test]
    async fn no_request_is_sent_while_download_is_paused_and_resumes_once_cleared() {
        let sender = Arc::new(ScriptedSender::new(vec![Ok(RawResponse {
            status: 200,
            body: b"chunk-bytes".to_vec(),
        })]));
        let config_store = Arc::new(InMemoryConfigStore::new());
        config_store.set_download_paused(true).await;
        let engine = Arc::new(engine_with_store(sender.clone(), fast_config(), config_store.clone()));

        let spawned = Arc::clone(&engine);
        let handle = tokio::spawn(async move {
            spawned
                .download_chunk("eu-1", "bucket", Uuid::new_v4(), 0, TransferSource::Download)
                .await
        });

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert_eq!(
            sender.call_count(),
            0,
            "no request should be sent while the download-paused flag is set"
        );

        config_store.set_download_paused(false).await;
        let result = tokio::time::timeout(std::time::Duration::from_secs(3), handle)
            .await
            .expect("download should resume once the pause flag clears")
            .unwrap();

        assert_eq!(result.unwrap(), b"chunk-bytes");
        assert_eq!(sender.call_count(), 1);
    }
}
