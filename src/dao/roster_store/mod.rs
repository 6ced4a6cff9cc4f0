pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;

use crate::dao::{models::RosterEntity, storage::StorageResult};

pub use memory::MemoryRosterStore;

/// Abstraction over the persistence layer for the roster.
///
/// A save replaces everything previously stored; a load returns `None` when nothing was saved.
pub trait RosterStore: Send + Sync {
    fn save_snapshot(&self, roster: RosterEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn load_snapshot(&self) -> BoxFuture<'static, StorageResult<Option<RosterEntity>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
