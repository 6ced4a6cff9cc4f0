//! In-memory roster store.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::dao::{
    models::RosterEntity,
    roster_store::RosterStore,
    storage::{StorageError, StorageResult},
};

/// In-process store used when no database is configured, and by tests.
#[derive(Clone, Default)]
pub struct MemoryRosterStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    roster: RwLock<Option<RosterEntity>>,
    offline: AtomicBool,
    saves: AtomicUsize,
}

#[derive(Debug, thiserror::Error)]
#[error("memory store is offline")]
struct Offline;

impl MemoryRosterStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `roster`, as if a previous run had saved it.
    pub fn with_roster(roster: RosterEntity) -> Self {
        let store = Self::default();
        if let Ok(mut slot) = store.inner.roster.try_write() {
            *slot = Some(roster);
        }
        store
    }

    /// Simulate an outage: every operation fails until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.inner.saves.load(Ordering::SeqCst)
    }

    /// Copy of the stored roster.
    pub async fn stored(&self) -> Option<RosterEntity> {
        self.inner.roster.read().await.clone()
    }
}

impl MemoryInner {
    fn ensure_online(&self, operation: &str) -> StorageResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(operation.to_owned(), Offline));
        }
        Ok(())
    }
}

impl RosterStore for MemoryRosterStore {
    fn save_snapshot(&self, roster: RosterEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.ensure_online("save roster")?;
            *inner.roster.write().await = Some(roster);
            inner.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn load_snapshot(&self) -> BoxFuture<'static, StorageResult<Option<RosterEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.ensure_online("load roster")?;
            Ok(inner.roster.read().await.clone())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.ensure_online("health check") })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.ensure_online("reconnect") })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::AskedEntity;

    #[tokio::test]
    async fn saves_replace_previous_content() {
        let store = MemoryRosterStore::new();
        assert_eq!(store.load_snapshot().await.unwrap(), None);

        let first = RosterEntity {
            asked: vec![AskedEntity { user_id: 1 }],
            ..RosterEntity::default()
        };
        store.save_snapshot(first).await.unwrap();
        store.save_snapshot(RosterEntity::default()).await.unwrap();

        assert_eq!(
            store.load_snapshot().await.unwrap(),
            Some(RosterEntity::default())
        );
        assert_eq!(store.save_count(), 2);
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let store = MemoryRosterStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.health_check().await,
            Err(StorageError::Unavailable { .. })
        ));
        assert!(store.save_snapshot(RosterEntity::default()).await.is_err());

        store.set_offline(false);
        assert!(store.try_reconnect().await.is_ok());
    }
}
