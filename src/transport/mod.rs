//! Reliable RPC client: deterministic payload checksums, bounded retry,
//! online/offline awareness, and session-invalidation detection.

pub mod reqwest_sender;
pub mod sender;

use std::sync::Arc;

use rand::seq::SliceRandom;
use serde::Serialize;
use serde_json::Value;

use crate::common::config::CoreConfig;
use crate::config_store::ConfigStore;
use crate::crypto::canonical_json_with_checksum;
use crate::error::{CoreError, CoreResult};
use crate::wire::ApiResponse;
use sender::{HttpMethod, HttpSender, Pool, RawRequest, RawResponse};

/// External collaborator: is the process currently offline? The API retry
/// loop waits rather than counting attempts while this is true.
#[async_trait::async_trait]
pub trait NetworkStatus: Send + Sync {
    async fn is_offline(&self) -> bool;
}

/// Always reports online; the right default when no real network monitor
/// is wired in.
pub struct AlwaysOnline;

#[async_trait::async_trait]
impl NetworkStatus for AlwaysOnline {
    async fn is_offline(&self) -> bool {
        false
    }
}

/// External collaborator invoked once when the server rejects the bearer
/// token.
#[async_trait::async_trait]
pub trait LogoutCallback: Send + Sync {
    async fn on_session_invalidated(&self);
}

/// No-op logout, useful where the embedder hasn't wired a real one yet.
pub struct NoopLogout;

#[async_trait::async_trait]
impl LogoutCallback for NoopLogout {
    async fn on_session_invalidated(&self) {}
}

/// The reliable RPC client. Owns no per-request state; everything it needs
/// (credential, retry bounds, gateway lists) is read fresh from its
/// collaborators on every call.
pub struct Transport {
    config: CoreConfig,
    sender: Arc<dyn HttpSender>,
    config_store: Arc<dyn ConfigStore>,
    network: Arc<dyn NetworkStatus>,
    logout: Arc<dyn LogoutCallback>,
}

impl Transport {
    pub fn new(
        config: CoreConfig,
        sender: Arc<dyn HttpSender>,
        config_store: Arc<dyn ConfigStore>,
        network: Arc<dyn NetworkStatus>,
        logout: Arc<dyn LogoutCallback>,
    ) -> Self {
        Self {
            config,
            sender,
            config_store,
            network,
            logout,
        }
    }

    fn pick_host(&self, pool: Pool) -> CoreResult<String> {
        let hosts = match pool {
            Pool::Api => &self.config.gateways.api_hosts,
            Pool::Upload => &self.config.gateways.upload_hosts,
            Pool::Download => &self.config.gateways.download_hosts,
        };
        hosts
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| CoreError::Internal(anyhow::anyhow!("no gateway hosts configured")))
    }

    fn build_headers(&self, api_key: &str, checksum: &str) -> Vec<(String, String)> {
        vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("User-Agent".to_string(), self.config.identity.user_agent()),
            ("Authorization".to_string(), format!("Bearer {api_key}")),
            ("Checksum".to_string(), checksum.to_string()),
        ]
    }

    /// Bounded-retry JSON API call with checksum header and
    /// session-invalidation detection.
    pub async fn request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        data: Value,
        api_key_override: Option<&str>,
    ) -> CoreResult<ApiResponse> {
        let mut attempts: u32 = 0;

        loop {
            if self.network.is_offline().await {
                tokio::time::sleep(self.config.retry.retry_api_request_timeout).await;
                continue;
            }

            if attempts >= self.config.retry.max_retry_api_request {
                return Err(CoreError::MaxRetries {
                    method: method.to_string(),
                    endpoint: endpoint.to_string(),
                    detail: data.to_string(),
                });
            }
            attempts += 1;

            let api_key = match api_key_override {
                Some(key) => key.to_string(),
                None => match self.config_store.api_key().await {
                    Some(key) => key,
                    None => {
                        self.logout.on_session_invalidated().await;
                        return Err(CoreError::SessionInvalidated);
                    }
                },
            };

            let (body, checksum) = canonical_json_with_checksum(&data)?;
            let host = self.pick_host(Pool::Api)?;
            let url = format!("{host}{endpoint}");
            let headers = self.build_headers(&api_key, &checksum);

            let raw = self
                .sender
                .send(RawRequest {
                    pool: Pool::Api,
                    method,
                    url,
                    headers,
                    body,
                })
                .await;

            let raw = match raw {
                Ok(raw) => raw,
                Err(_) => {
                    tokio::time::sleep(self.config.retry.retry_api_request_timeout).await;
                    continue;
                }
            };

            if !raw.is_ok() {
                tokio::time::sleep(self.config.retry.retry_api_request_timeout).await;
                continue;
            }

            let parsed: ApiResponse = serde_json::from_slice(&raw.body)?;

            if parsed.is_internal_error() {
                tokio::time::sleep(self.config.retry.retry_api_request_timeout).await;
                continue;
            }

            if parsed.is_session_invalidated() {
                self.logout.on_session_invalidated().await;
                return Err(CoreError::SessionInvalidated);
            }

            return Ok(parsed);
        }
    }

    /// Convenience wrapper for callers with a typed request body.
    pub async fn request_json<T: Serialize>(
        &self,
        method: HttpMethod,
        endpoint: &str,
        data: &T,
        api_key_override: Option<&str>,
    ) -> CoreResult<ApiResponse> {
        let value = serde_json::to_value(data)?;
        self.request(method, endpoint, value, api_key_override).await
    }

    /// One unretried attempt against the upload pool. The transfer engine
    /// owns `maxRetryUpload`/backoff and the connection-error-vs-status
    /// distinction around this.
    pub async fn upload_attempt(
        &self,
        url: &str,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    ) -> Result<RawResponse, sender::SendError> {
        self.sender
            .send(RawRequest {
                pool: Pool::Upload,
                method: HttpMethod::Post,
                url: url.to_string(),
                headers,
                body,
            })
            .await
    }

    /// One unretried attempt against the download pool.
    pub async fn download_attempt(
        &self,
        url: &str,
        headers: Vec<(String, String)>,
    ) -> Result<RawResponse, sender::SendError> {
        self.sender
            .send(RawRequest {
                pool: Pool::Download,
                method: HttpMethod::Get,
                url: url.to_string(),
                headers,
                body: Vec::new(),
            })
            .await
    }

    pub fn pick_upload_host(&self) -> CoreResult<String> {
        self.pick_host(Pool::Upload)
    }

    pub fn pick_download_host(&self) -> CoreResult<String> {
        self.pick_host(Pool::Download)
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn config_store(&self) -> &Arc<dyn ConfigStore> {
        &self.config_store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_store::{ConfigStore, InMemoryConfigStore};
    use crate::transport::sender::SendError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct ScriptedSender {
        responses: Mutex<Vec<Result<RawResponse, ()>>>,
        calls: AtomicU32,
    }

    impl ScriptedSender {
        fn new(responses: Vec<Result<RawResponse, ()>>) -> Self {
            Self {
                responses: Mutex::new(responses),
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

    struct NoopNetwork;
    #[async_trait::async_trait]
    impl NetworkStatus for NoopNetwork {
        async fn is_offline(&self) -> bool {
            false
        }
    }

    struct CountingLogout(AtomicU32);
    #[async_trait::async_trait]
    impl LogoutCallback for CountingLogout {
        async fn on_session_invalidated(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fast_config() -> CoreConfig {
        let mut config = CoreConfig::default();
        config.retry.retry_api_request_timeout = std::time::Duration::from_millis(1);
        config.gateways.api_hosts = vec!["https://api.example".to_string()];
        config
    }

    fn ok_response(body: &str) -> RawResponse {
        RawResponse {
            status: 200,
            body: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let sender = Arc::new(ScriptedSender::new(vec![
            Ok(RawResponse {
                status: 503,
                body: b"".to_vec(),
            }),
            Ok(RawResponse {
                status: 503,
                body: b"".to_vec(),
            }),
            Ok(ok_response(r#"{"status":true,"data":{"x":1}}"#)),
        ]));
        let config_store = Arc::new(InMemoryConfigStore::new());
        config_store.set_api_key(Some("key".into())).await;

        let transport = Transport::new(
            fast_config(),
            sender.clone(),
            config_store,
            Arc::new(NoopNetwork),
            Arc::new(NoopLogout),
        );

        let resp = transport
            .request(HttpMethod::Post, "/v3/x", serde_json::json!({}), None)
            .await
            .unwrap();

        assert!(resp.status);
        assert_eq!(sender.call_count(), 3);
    }

    #[tokio::test]
    async fn exceeding_max_retries_fails_with_descriptive_error() {
        let responses: Vec<_> = (0..5)
            .map(|_| {
                Ok(RawResponse {
                    status: 503,
                    body: b"".to_vec(),
                })
            })
            .collect();
        let sender = Arc::new(ScriptedSender::new(responses));
        let config_store = Arc::new(InMemoryConfigStore::new());
        config_store.set_api_key(Some("key".into())).await;

        let mut config = fast_config();
        config.retry.max_retry_api_request = 3;

        let transport = Transport::new(
            config,
            sender,
            config_store,
            Arc::new(NoopNetwork),
            Arc::new(NoopLogout),
        );

        let err = transport
            .request(
                HttpMethod::Post,
                "/v3/thing",
                serde_json::json!({"a": 1}),
                None,
            )
            .await
            .unwrap_err();

        match err {
            CoreError::MaxRetries { endpoint, .. } => assert_eq!(endpoint, "/v3/thing"),
            other => panic!("expected MaxRetries, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn session_invalidation_triggers_logout_and_fails() {
        let sender = Arc::new(ScriptedSender::new(vec![Ok(ok_response(
            r#"{"status":false,"message":"Invalid API key"}"#,
        ))]));
        let config_store = Arc::new(InMemoryConfigStore::new());
        config_store.set_api_key(Some("key".into())).await;
        let logout = Arc::new(CountingLogout(AtomicU32::new(0)));

        let transport = Transport::new(
            fast_config(),
            sender,
            config_store,
            Arc::new(NoopNetwork),
            logout.clone(),
        );

        let err = transport
            .request(HttpMethod::Post, "/v3/anything", serde_json::json!({}), None)
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::SessionInvalidated));
        assert_eq!(logout.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn internal_error_code_is_retried_not_surfaced() {
        let sender = Arc::new(ScriptedSender::new(vec![
            Ok(ok_response(r#"{"status":false,"code":"internal_error"}"#)),
            Ok(ok_response(r#"{"status":true,"data":{}}"#)),
        ]));
        let config_store = Arc::new(InMemoryConfigStore::new());
        config_store.set_api_key(Some("key".into())).await;

        let transport = Transport::new(
            fast_config(),
            sender.clone(),
            config_store,
            Arc::new(NoopNetwork),
            Arc::new(NoopLogout),
        );

        let resp = transport
            .request(HttpMethod::Post, "/v3/x", serde_json::json!({}), None)
            .await
            .unwrap();
        assert!(resp.status);
        assert_eq!(sender.call_count(), 2);
    }

    #[tokio::test]
    async fn missing_api_key_invalidates_session_immediately() {
        let sender = Arc::new(ScriptedSender::new(vec![]));
        let config_store = Arc::new(InMemoryConfigStore::new());
        let logout = Arc::new(CountingLogout(AtomicU32::new(0)));

        let transport = Transport::new(
            fast_config(),
            sender,
            config_store,
            Arc::new(NoopNetwork),
            logout.clone(),
        );

        let err = transport
            .request(HttpMethod::Post, "/v3/x", serde_json::json!({}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::SessionInvalidated));
        assert_eq!(logout.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn checksum_matches_sha512_of_exact_body_bytes() {
        use crate::crypto::buffer_to_hash;

        struct CapturingSender {
            captured: Mutex<Option<RawRequest>>,
        }

        #[async_trait::async_trait]
        impl HttpSender for CapturingSender {
            async fn send(&self, request: RawRequest) -> Result<RawResponse, SendError> {
                *self.captured.lock().unwrap() = Some(request);
                Ok(RawResponse {
                    status: 200,
                    body: br#"{"status":true}"#.to_vec(),
                })
            }
        }

        let sender = Arc::new(CapturingSender {
            captured: Mutex::new(None),
        });
        let config_store = Arc::new(InMemoryConfigStore::new());
        config_store.set_api_key(Some("key".into())).await;

        let transport = Transport::new(
            fast_config(),
            sender.clone(),
            config_store,
            Arc::new(NoopNetwork),
            Arc::new(NoopLogout),
        );

        transport
            .request(
                HttpMethod::Post,
                "/v3/x",
                serde_json::json!({"email": "a@b"}),
                None,
            )
            .await
            .unwrap();

        let captured = sender.captured.lock().unwrap().take().unwrap();
        let checksum_header = captured
            .headers
            .iter()
            .find(|(name, _)| name == "Checksum")
            .map(|(_, value)| value.clone())
            .unwrap();
        assert_eq!(checksum_header, buffer_to_hash(&captured.body));
    }
}
