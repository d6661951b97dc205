//! Cooperative pause: transfers poll rather than subscribe, so flag writers
//! (the embedding UI, a sync-policy change) never need to know who is
//! waiting.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::config_store::ConfigStore;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Which kind of transfer is asking to proceed, and which pause flags apply
/// to it.
#[derive(Clone, Debug)]
pub enum TransferSource {
    Sync { location: Option<Uuid> },
    Download,
    Upload,
    Other,
}

/// External hook: does the local sync engine consider `location` paused?
/// Distinct from `ConfigStore::is_location_paused`, which is the core's own
/// flag store — a sync engine may have additional reasons to withhold a
/// location that the core doesn't track.
#[async_trait::async_trait]
pub trait SyncCollaborator: Send + Sync {
    async fn is_sync_location_paused(&self, location: Uuid) -> bool;
}

/// Never pauses on the sync engine's behalf; the right default when no
/// sync engine is wired in.
pub struct NoSyncCollaborator;

#[async_trait::async_trait]
impl SyncCollaborator for NoSyncCollaborator {
    async fn is_sync_location_paused(&self, _location: Uuid) -> bool {
        false
    }
}

pub struct PauseGate {
    config_store: Arc<dyn ConfigStore>,
    sync: Arc<dyn SyncCollaborator>,
}

impl PauseGate {
    pub fn new(config_store: Arc<dyn ConfigStore>, sync: Arc<dyn SyncCollaborator>) -> Self {
        Self { config_store, sync }
    }

    async fn is_paused(&self, source: &TransferSource) -> bool {
        match source {
            TransferSource::Sync { location } => {
                if self.config_store.is_paused().await {
                    return true;
                }
                match location {
                    Some(location) => {
                        self.config_store.is_location_paused(*location).await
                            || self.sync.is_sync_location_paused(*location).await
                    }
                    None => false,
                }
            }
            TransferSource::Download => self.config_store.is_download_paused().await,
            TransferSource::Upload => self.config_store.is_upload_paused().await,
            TransferSource::Other => self.config_store.is_paused().await,
        }
    }

    /// Blocks until no applicable pause flag is set.
    pub async fn wait(&self, source: &TransferSource) {
        while self.is_paused(source).await {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_store::{ConfigStore, InMemoryConfigStore};

    #[tokio::test]
    async fn upload_source_only_respects_upload_flag() {
        let store = Arc::new(InMemoryConfigStore::new());
        store.set_paused(true).await;
        let gate = PauseGate::new(store, Arc::new(NoSyncCollaborator));
        assert!(!gate.is_paused(&TransferSource::Upload).await);
    }

    #[tokio::test]
    async fn upload_paused_flag_blocks_upload_source() {
        let store = Arc::new(InMemoryConfigStore::new());
        store.set_upload_paused(true).await;
        let gate = PauseGate::new(store, Arc::new(NoSyncCollaborator));
        assert!(gate.is_paused(&TransferSource::Upload).await);
    }

    #[tokio::test]
    async fn sync_source_with_location_checks_both_global_and_location_flags() {
        let store = Arc::new(InMemoryConfigStore::new());
        let location = Uuid::new_v4();
        let gate = PauseGate::new(store.clone(), Arc::new(NoSyncCollaborator));

        assert!(!gate.is_paused(&TransferSource::Sync { location: Some(location) }).await);

        store.set_location_paused(location, true).await;
        assert!(gate.is_paused(&TransferSource::Sync { location: Some(location) }).await);
    }

    #[tokio::test]
    async fn sync_source_without_location_only_checks_global_flag() {
        let store = Arc::new(InMemoryConfigStore::new());
        let location = Uuid::new_v4();
        store.set_location_paused(location, true).await;
        let gate = PauseGate::new(store, Arc::new(NoSyncCollaborator));
        assert!(!gate.is_paused(&TransferSource::Sync { location: None }).await);
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_unpaused() {
        let store = Arc::new(InMemoryConfigStore::new());
        let gate = PauseGate::new(store, Arc::new(NoSyncCollaborator));
        let start = std::time::Instant::now();
        gate.wait(&TransferSource::Other).await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    struct AlwaysPausedSync;
    #[async_trait::async_trait]
    impl SyncCollaborator for AlwaysPausedSync {
        async fn is_sync_location_paused(&self, _location: Uuid) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn sync_collaborator_hook_is_consulted_for_located_sync_transfers() {
        let store = Arc::new(InMemoryConfigStore::new());
        let gate = PauseGate::new(store, Arc::new(AlwaysPausedSync));
        let location = Uuid::new_v4();
        assert!(gate.is_paused(&TransferSource::Sync { location: Some(location) }).await);
    }
}
