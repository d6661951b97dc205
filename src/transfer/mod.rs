//! Chunked upload/download on top of `Transport` + `ThrottleGroup` +
//! `PauseGate`. Mirrors `send::handlers::process_chunk`'s read-then-transform
//! shape, generalized to read-encrypt-throttle-send /
//! receive-throttle-accumulate.

pub mod download;
pub mod events;
pub mod upload;

use std::sync::Arc;

use crate::config_store::ConfigStore;
use crate::pause::PauseGate;
use crate::throttle::ThrottleGroup;
use crate::transport::Transport;
use events::EventBus;

/// Owns the collaborators every upload/download attempt needs. One instance
/// per process, held by `CoreContext`.
pub struct TransferEngine {
    pub(crate) transport: Arc<Transport>,
    pub(crate) upload_throttle: Arc<ThrottleGroup>,
    pub(crate) download_throttle: Arc<ThrottleGroup>,
    pub(crate) pause_gate: Arc<PauseGate>,
    pub(crate) config_store: Arc<dyn ConfigStore>,
    pub(crate) events: EventBus,
}

impl TransferEngine {
    pub fn new(
        transport: Arc<Transport>,
        upload_throttle: Arc<ThrottleGroup>,
        download_throttle: Arc<ThrottleGroup>,
        pause_gate: Arc<PauseGate>,
        config_store: Arc<dyn ConfigStore>,
        events: EventBus,
    ) -> Self {
        Self {
            transport,
            upload_throttle,
            download_throttle,
            pause_gate,
            config_store,
            events,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }
}
