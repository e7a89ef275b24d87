use std::sync::Arc;

use async_trait::async_trait;
use tokio::{sync::watch, task::JoinHandle};
use tokio_stream::{wrappers::WatchStream, StreamExt};
use tracing::debug;

/// Process-wide invalidation counter.
///
/// Every confirmed write bumps it; every mounted read controller re-runs its
/// read when it observes a new value. It carries no information about which
/// resource changed, so all mounted reads refresh.
#[derive(Clone)]
pub struct VersionBus {
    tx: Arc<watch::Sender<u64>>,
}

impl VersionBus {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    pub fn bump(&self) {
        self.tx.send_modify(|version| *version += 1);
        debug!(version = self.current(), "version: bumped");
    }

    pub fn current(&self) -> u64 {
        *self.tx.borrow()
    }

    /// Receiver that has already seen the current value.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }

    /// Values published after this call.
    pub fn changes(&self) -> WatchStream<u64> {
        WatchStream::from_changes(self.subscribe())
    }
}

impl Default for VersionBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
pub(crate) trait Refetch: Send + Sync + 'static {
    async fn refetch_for_version(&self, version: u64);
}

/// Runs `target`'s read once per observed version change until aborted.
///
/// Subscribes before spawning so a bump racing the spawn is not lost.
pub(crate) fn spawn_refetch_on_bump(bus: &VersionBus, target: Arc<dyn Refetch>) -> JoinHandle<()> {
    let mut changes = bus.changes();
    tokio::spawn(async move {
        while let Some(version) = changes.next().await {
            target.refetch_for_version(version).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bump_strictly_increases() {
        let bus = VersionBus::new();
        assert_eq!(bus.current(), 0);
        bus.bump();
        bus.bump();
        assert_eq!(bus.current(), 2);
    }

    #[test]
    fn clones_share_one_counter() {
        let bus = VersionBus::new();
        let other = bus.clone();
        other.bump();
        assert_eq!(bus.current(), 1);
    }

    #[tokio::test]
    async fn changes_skip_the_value_current_at_subscription() {
        let bus = VersionBus::new();
        bus.bump();
        let mut changes = bus.changes();
        bus.bump();
        assert_eq!(changes.next().await, Some(2));
    }
}
