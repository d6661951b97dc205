//! Abstract configuration store.
//!
//! The embedding application owns credential/master-key/pause-flag
//! persistence; this crate only needs a concurrent get/set view onto it.
//! `InMemoryConfigStore` is the reference implementation used by tests and
//! by any caller happy with process-lifetime-only storage.

use dashmap::DashMap;
use uuid::Uuid;

use crate::crypto::types::EncryptionKey;

/// Upload/download bandwidth ceilings as configured by the user, in Kbps.
/// `None` means unlimited.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NetworkingSettings {
    pub upload_kbps: Option<u32>,
    pub download_kbps: Option<u32>,
}

/// Key-value facts the transport/transfer/propagator layers read and write.
///
/// A trait rather than a concrete struct so the embedding application's
/// real settings backend can implement it directly instead of mirroring
/// state into a second store.
#[async_trait::async_trait]
pub trait ConfigStore: Send + Sync {
    async fn api_key(&self) -> Option<String>;
    async fn set_api_key(&self, key: Option<String>);

    /// Ordered, never-empty-in-a-valid-session master key list. `None` means
    /// no session is established yet.
    async fn master_keys(&self) -> Option<Vec<EncryptionKey>>;
    async fn set_master_keys(&self, keys: Vec<EncryptionKey>);

    async fn is_paused(&self) -> bool;
    async fn set_paused(&self, paused: bool);

    async fn is_upload_paused(&self) -> bool;
    async fn set_upload_paused(&self, paused: bool);

    async fn is_download_paused(&self) -> bool;
    async fn set_download_paused(&self, paused: bool);

    async fn is_location_paused(&self, location: Uuid) -> bool;
    async fn set_location_paused(&self, location: Uuid, paused: bool);

    async fn is_max_storage_reached(&self) -> bool;
    async fn set_max_storage_reached(&self, reached: bool);

    async fn networking_settings(&self) -> NetworkingSettings;
    async fn set_networking_settings(&self, settings: NetworkingSettings);
}

/// Process-lifetime `ConfigStore` backed by a concurrent map, in the spirit
/// of `SessionStore`'s `Arc<Mutex<HashMap>>` but using `DashMap` so reads
/// don't serialize behind a single lock.
pub struct InMemoryConfigStore {
    api_key: DashMap<(), String>,
    master_keys: DashMap<(), Vec<EncryptionKey>>,
    paused: DashMap<(), bool>,
    upload_paused: DashMap<(), bool>,
    download_paused: DashMap<(), bool>,
    location_paused: DashMap<Uuid, bool>,
    max_storage_reached: DashMap<(), bool>,
    networking: DashMap<(), NetworkingSettings>,
}

impl Default for InMemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self {
            api_key: DashMap::new(),
            master_keys: DashMap::new(),
            paused: DashMap::new(),
            upload_paused: DashMap::new(),
            download_paused: DashMap::new(),
            location_paused: DashMap::new(),
            max_storage_reached: DashMap::new(),
            networking: DashMap::new(),
        }
    }
}

#[async_trait::async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn api_key(&self) -> Option<String> {
        self.api_key.get(&()).map(|v| v.clone())
    }

    async fn set_api_key(&self, key: Option<String>) {
        match key {
            Some(k) => {
                self.api_key.insert((), k);
            }
            None => {
                self.api_key.remove(&());
            }
        }
    }

    async fn master_keys(&self) -> Option<Vec<EncryptionKey>> {
        self.master_keys.get(&()).map(|v| v.clone())
    }

    async fn set_master_keys(&self, keys: Vec<EncryptionKey>) {
        self.master_keys.insert((), keys);
    }

    async fn is_paused(&self) -> bool {
        self.paused.get(&()).map(|v| *v).unwrap_or(false)
    }

    async fn set_paused(&self, paused: bool) {
        self.paused.insert((), paused);
    }

    async fn is_upload_paused(&self) -> bool {
        self.upload_paused.get(&()).map(|v| *v).unwrap_or(false)
    }

    async fn set_upload_paused(&self, paused: bool) {
        self.upload_paused.insert((), paused);
    }

    async fn is_download_paused(&self) -> bool {
        self.download_paused.get(&()).map(|v| *v).unwrap_or(false)
    }

    async fn set_download_paused(&self, paused: bool) {
        self.download_paused.insert((), paused);
    }

    async fn is_location_paused(&self, location: Uuid) -> bool {
        self.location_paused
            .get(&location)
            .map(|v| *v)
            .unwrap_or(false)
    }

    async fn set_location_paused(&self, location: Uuid, paused: bool) {
        self.location_paused.insert(location, paused);
    }

    async fn is_max_storage_reached(&self) -> bool {
        self.max_storage_reached
            .get(&())
            .map(|v| *v)
            .unwrap_or(false)
    }

    async fn set_max_storage_reached(&self, reached: bool) {
        self.max_storage_reached.insert((), reached);
    }

    async fn networking_settings(&self) -> NetworkingSettings {
        self.networking.get(&()).map(|v| *v).unwrap_or_default()
    }

    async fn set_networking_settings(&self, settings: NetworkingSettings) {
        self.networking.insert((), settings);
    }
}
