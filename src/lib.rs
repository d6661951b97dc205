//! Client-side remote storage protocol core: transport, throttled transfer
//! engine, directory mutations, public links, and metadata propagation for
//! an end-to-end-encrypted sync client.

pub mod common;
pub mod config_store;
pub mod crypto;
pub mod dir;
pub mod error;
pub mod html;
pub mod links;
pub mod model;
pub mod pause;
pub mod propagator;
pub mod throttle;
pub mod transfer;
pub mod transport;
pub mod wire;

use std::ops::Deref;
use std::sync::Arc;

use tokio::sync::Semaphore;

use common::config::CoreConfig;
use config_store::ConfigStore;
use dir::DirOps;
use links::LinkOps;
use pause::{NoSyncCollaborator, PauseGate, SyncCollaborator};
use propagator::MetadataPropagator;
use throttle::ThrottleGroup;
use transfer::events::EventBus;
use transfer::TransferEngine;
use transport::reqwest_sender::ReqwestSender;
use transport::sender::HttpSender;
use transport::{AlwaysOnline, LogoutCallback, NetworkStatus, NoopLogout, Transport};

struct Inner {
    transport: Arc<Transport>,
    transfer: TransferEngine,
    dir: DirOps,
    links: LinkOps,
    propagator: Arc<MetadataPropagator>,
    config_store: Arc<dyn ConfigStore>,
}

/// Process-wide handle to every collaborator the core needs. Cheap to
/// clone — an `Arc` newtype: constructed once, then cloned into every task
/// that needs it rather than passed by reference.
#[derive(Clone)]
pub struct CoreContext(Arc<Inner>);

impl Deref for CoreContext {
    type Target = Inner;

    fn deref(&self) -> &Inner {
        &self.0
    }
}

impl CoreContext {
    pub fn builder(config: CoreConfig, config_store: Arc<dyn ConfigStore>) -> CoreContextBuilder {
        CoreContextBuilder::new(config, config_store)
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.0.transport
    }

    pub fn transfer(&self) -> &TransferEngine {
        &self.0.transfer
    }

    pub fn dir(&self) -> &DirOps {
        &self.0.dir
    }

    pub fn links(&self) -> &LinkOps {
        &self.0.links
    }

    pub fn propagator(&self) -> &Arc<MetadataPropagator> {
        &self.0.propagator
    }

    pub fn config_store(&self) -> &Arc<dyn ConfigStore> {
        &self.0.config_store
    }
}

/// Builds a `CoreContext`, defaulting every external collaborator to its
/// harmless production default (`ReqwestSender`, always-online, no-op
/// logout, no sync collaborator) and letting callers — chiefly tests —
/// override any of them.
pub struct CoreContextBuilder {
    config: CoreConfig,
    config_store: Arc<dyn ConfigStore>,
    sender: Option<Arc<dyn HttpSender>>,
    network: Arc<dyn NetworkStatus>,
    logout: Arc<dyn LogoutCallback>,
    sync: Arc<dyn SyncCollaborator>,
}

impl CoreContextBuilder {
    fn new(config: CoreConfig, config_store: Arc<dyn ConfigStore>) -> Self {
        Self {
            config,
            config_store,
            sender: None,
            network: Arc::new(AlwaysOnline),
            logout: Arc::new(NoopLogout),
            sync: Arc::new(NoSyncCollaborator),
        }
    }

    pub fn sender(mut self, sender: Arc<dyn HttpSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn network(mut self, network: Arc<dyn NetworkStatus>) -> Self {
        self.network = network;
        self
    }

    pub fn logout(mut self, logout: Arc<dyn LogoutCallback>) -> Self {
        self.logout = logout;
        self
    }

    pub fn sync_collaborator(mut self, sync: Arc<dyn SyncCollaborator>) -> Self {
        self.sync = sync;
        self
    }

    pub fn build(self) -> Result<CoreContext, reqwest::Error> {
        let sender = match self.sender {
            Some(sender) => sender,
            None => Arc::new(ReqwestSender::new(&self.config.gateways, &self.config.timeouts)?),
        };

        let transport = Arc::new(Transport::new(
            self.config.clone(),
            sender,
            self.config_store.clone(),
            self.network,
            self.logout,
        ));

        let upload_throttle = ThrottleGroup::unlimited();
        let download_throttle = ThrottleGroup::unlimited();
        let pause_gate = Arc::new(PauseGate::new(self.config_store.clone(), self.sync));
        let events = EventBus::new();

        let transfer = TransferEngine::new(
            transport.clone(),
            upload_throttle,
            download_throttle,
            pause_gate,
            self.config_store.clone(),
            events,
        );

        let propagator = Arc::new(MetadataPropagator::new(
            transport.clone(),
            self.config_store.clone(),
        ));
        let create_folder_gate = Arc::new(Semaphore::new(1));
        let dir = DirOps::new(transport.clone(), propagator.clone(), create_folder_gate);
        let links = LinkOps::new(transport.clone());

        Ok(CoreContext(Arc::new(Inner {
            transport,
            transfer,
            dir,
            links,
            propagator,
            config_store: self.config_store,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_store::{ConfigStore, InMemoryConfigStore};
    use transport::sender::{RawRequest, RawResponse, SendError};

    struct AlwaysOkSender;

    #[async_trait::async_trait]
    impl HttpSender for AlwaysOkSender {
        async fn send(&self, _request: RawRequest) -> Result<RawResponse, SendError> {
            Ok(RawResponse {
                status: 200,
                body: br#"{"status":true,"data":{}}"#.to_vec(),
            })
        }
    }

    #[tokio::test]
    async fn builder_wires_a_context_with_a_mock_sender() {
        let config_store = Arc::new(InMemoryConfigStore::new());
        config_store.set_api_key(Some("key".into())).await;

        let context = CoreContext::builder(CoreConfig::default(), config_store)
            .sender(Arc::new(AlwaysOkSender))
            .build()
            .expect("build should not touch the network");

        let response = context
            .transport()
            .request(
                transport::sender::HttpMethod::Post,
                "/v3/user/info",
                serde_json::json!({}),
                None,
            )
            .await
            .unwrap();
        assert!(response.status);

        let clone = context.clone();
        assert!(Arc::ptr_eq(context.transport(), clone.transport()));
    }
}
