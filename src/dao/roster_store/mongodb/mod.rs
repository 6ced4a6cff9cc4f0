//! MongoDB backend: one collection per roster concern, each rewritten on every save.

mod config;
mod connection;
mod error;
mod models;
mod store;

pub use config::MongoConfig;
pub use error::{MongoDaoError, MongoResult};
pub use store::MongoRosterStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::Decode { .. } => StorageError::Corrupt(err.to_string()),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
