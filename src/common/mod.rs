pub mod config;

pub use config::{
    ClientIdentity, CoreConfig, GatewayConfig, RetryConfig, TimeoutConfig, TransferSettings,
    UNLIMITED_RATE_BYTES_PER_SEC,
};
