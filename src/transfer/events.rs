//! Progress event bus. One `broadcast` channel per process: every attached
//! listener sees every delta, unlike `watch`'s single-slot replace-only
//! semantics, which is why `broadcast` is used here instead of the
//! `watch::Sender` the throttle group uses elsewhere in this crate for
//! single current-value state.

use uuid::Uuid;

/// Which direction/audience a progress delta belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferEventKind {
    UploadProgress,
    UploadProgressSeparate,
    DownloadProgress,
    DownloadProgressSeparate,
}

#[derive(Clone, Debug)]
pub struct TransferEvent {
    pub kind: TransferEventKind,
    pub uuid: Uuid,
    pub bytes: u64,
    pub from: crate::pause::TransferSource,
}

/// Thin wrapper over `broadcast::Sender` so call sites don't need to know
/// the channel capacity or handle a full send queue specially (dropped
/// receivers are the only failure mode, which is fine to ignore — nobody is
/// listening).
#[derive(Clone)]
pub struct EventBus {
    sender: tokio::sync::broadcast::Sender<TransferEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _receiver) = tokio::sync::broadcast::channel(1024);
        Self { sender }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<TransferEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: TransferEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pause::TransferSource;

    #[tokio::test]
    async fn subscriber_receives_emitted_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let uuid = Uuid::new_v4();
        bus.emit(TransferEvent {
            kind: TransferEventKind::UploadProgress,
            uuid,
            bytes: 128,
            from: TransferSource::Upload,
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.uuid, uuid);
        assert_eq!(event.bytes, 128);
    }

    #[tokio::test]
    async fn emitting_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.emit(TransferEvent {
            kind: TransferEventKind::DownloadProgress,
            uuid: Uuid::new_v4(),
            bytes: 1,
            from: TransferSource::Download,
        });
    }
}
