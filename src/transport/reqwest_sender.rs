//! Production `HttpSender`: three `reqwest::Client` pools, each bounded by
//! a semaphore so concurrency stays within the configured per-pool limit,
//! held in one long-lived `Arc`-wrapped struct alongside every other shared
//! resource `ReqwestSender` owns.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Semaphore;

use super::sender::{HttpMethod, HttpSender, Pool, RawRequest, RawResponse, SendError};
use crate::common::config::{GatewayConfig, TimeoutConfig};

struct PoolHandle {
    client: reqwest::Client,
    permits: Semaphore,
}

/// Real `HttpSender` backed by `reqwest`, one client + semaphore per pool.
pub struct ReqwestSender {
    pools: HashMap<Pool, PoolHandle>,
}

impl ReqwestSender {
    pub fn new(gateways: &GatewayConfig, timeouts: &TimeoutConfig) -> Result<Self, reqwest::Error> {
        let mut pools = HashMap::new();

        pools.insert(
            Pool::Api,
            PoolHandle {
                client: reqwest::Client::builder()
                    .timeout(timeouts.api_request)
                    .build()?,
                permits: Semaphore::new(gateways.api_pool_concurrency),
            },
        );
        pools.insert(
            Pool::Upload,
            PoolHandle {
                client: reqwest::Client::builder()
                    .timeout(timeouts.upload_socket)
                    .build()?,
                permits: Semaphore::new(gateways.upload_pool_concurrency),
            },
        );
        pools.insert(
            Pool::Download,
            PoolHandle {
                client: reqwest::Client::builder()
                    .timeout(timeouts.download_socket)
                    .build()?,
                permits: Semaphore::new(gateways.download_pool_concurrency),
            },
        );

        Ok(Self { pools })
    }

    fn classify_error(err: &reqwest::Error) -> SendError {
        if err.is_timeout() {
            SendError::Timeout
        } else {
            SendError::Connection(err.to_string())
        }
    }
}

#[async_trait::async_trait]
impl HttpSender for ReqwestSender {
    async fn send(&self, request: RawRequest) -> Result<RawResponse, SendError> {
        let handle = self
            .pools
            .get(&request.pool)
            .expect("every Pool variant has a registered client");

        let _permit = handle.permits.acquire().await.map_err(|_| {
            SendError::Connection("connection pool semaphore closed".to_string())
        })?;

        let mut builder = match request.method {
            HttpMethod::Get => handle.client.get(&request.url),
            HttpMethod::Post => handle.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(|e| Self::classify_error(&e))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| Self::classify_error(&e))?
            .to_vec();

        Ok(RawResponse { status, body })
    }
}

/// Helper for production call sites building request timeouts that aren't
/// bound to a pool's whole-client timeout (e.g. a one-off startup probe).
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, tokio::time::error::Elapsed>
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(duration, future).await
}
