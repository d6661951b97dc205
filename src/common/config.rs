//! Static configuration for transport, retry, and transfer behaviour.
//!
//! Generalizes a `{local, tunnel}`-style pair of named presets
//! (`{chunk_size, concurrency}`) into the fuller set of knobs the protocol
//! calls out by name (`maxRetryAPIRequest`, `retryUploadTimeout`, gateway
//! host lists, pool sizes, ...).

use std::time::Duration;

/// User-Agent components: `<product>/<version>-<build>-<platform>`.
#[derive(Clone, Debug)]
pub struct ClientIdentity {
    pub product: String,
    pub version: String,
    pub build: String,
    pub platform: String,
}

impl ClientIdentity {
    pub fn user_agent(&self) -> String {
        format!(
            "{}/{}-{}-{}",
            self.product, self.version, self.build, self.platform
        )
    }
}

/// Gateway host lists and connection-pool bounds for the three pools.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub api_hosts: Vec<String>,
    pub upload_hosts: Vec<String>,
    pub download_hosts: Vec<String>,
    pub api_pool_concurrency: usize,
    pub upload_pool_concurrency: usize,
    pub download_pool_concurrency: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_hosts: vec!["https://gateway.filen.io".to_string()],
            upload_hosts: vec!["https://ingest.filen.io".to_string()],
            download_hosts: vec!["https://down.filen.io".to_string()],
            api_pool_concurrency: 32,
            upload_pool_concurrency: 16,
            download_pool_concurrency: 16,
        }
    }
}

/// Retry bounds and backoff intervals, one triplet per direction.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retry_api_request: u32,
    pub retry_api_request_timeout: Duration,
    pub max_retry_upload: u32,
    pub retry_upload_timeout: Duration,
    pub max_retry_download: u32,
    pub retry_download_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retry_api_request: 32,
            retry_api_request_timeout: Duration::from_secs(1),
            max_retry_upload: 3,
            retry_upload_timeout: Duration::from_secs(1),
            max_retry_download: 8,
            retry_download_timeout: Duration::from_secs(1),
        }
    }
}

/// Request-level and socket-level timeouts named in the concurrency model.
#[derive(Clone, Debug)]
pub struct TimeoutConfig {
    pub api_request: Duration,
    pub upload_socket: Duration,
    pub download_socket: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            api_request: Duration::from_secs(500),
            upload_socket: Duration::from_secs(3600),
            download_socket: Duration::from_secs(86_400),
        }
    }
}

/// Chunking behaviour for the transfer engine.
#[derive(Clone, Copy, Debug)]
pub struct TransferSettings {
    pub chunk_size: u64,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            // Matches the wire protocol's fixed chunk size.
            chunk_size: 1024 * 1024,
        }
    }
}

/// Non-sync transfers (e.g. a one-off public download) are not throttled by
/// the user's networking settings; this is the "effectively unlimited"
/// default from the throttle design.
pub const UNLIMITED_RATE_BYTES_PER_SEC: u64 = 122 * 1024 * 1024;

/// Aggregate static configuration the rest of the crate is built from.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    pub identity: ClientIdentity,
    pub gateways: GatewayConfig,
    pub retry: RetryConfig,
    pub timeouts: TimeoutConfig,
    pub transfer: TransferSettings,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            identity: ClientIdentity {
                product: "storage-core".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                build: "dev".to_string(),
                platform: std::env::consts::OS.to_string(),
            },
            gateways: GatewayConfig::default(),
            retry: RetryConfig::default(),
            timeouts: TimeoutConfig::default(),
            transfer: TransferSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_matches_expected_shape() {
        let identity = ClientIdentity {
            product: "acme".into(),
            version: "1.2.3".into(),
            build: "7".into(),
            platform: "linux".into(),
        };
        assert_eq!(identity.user_agent(), "acme/1.2.3-7-linux");
    }
}
