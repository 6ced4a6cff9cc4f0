use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Client, Collection, Database, bson::doc};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        ASKED_COLLECTION, BANNED_COLLECTION, INVITED_COLLECTION, MongoAskedDocument,
        MongoBannedDocument, MongoInvitedDocument, MongoPlayingDocument, PLAYING_COLLECTION,
    },
};
use crate::dao::{
    models::{AskedEntity, BannedEntity, InvitedEntity, PlayingEntity, RosterEntity},
    roster_store::RosterStore,
    storage::StorageResult,
};

/// Roster store backed by MongoDB.
#[derive(Clone)]
pub struct MongoRosterStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    // Kept alive alongside the database handle it produced.
    _client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.database().await;
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard._client = client;
        guard.database = database;
        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.state.read().await;
        guard.database.clone()
    }
}

impl MongoRosterStore {
    /// Establish a connection to MongoDB.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState {
                _client: client,
                database,
            }),
            config,
        });

        Ok(Self { inner })
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.inner.database().await.collection::<T>(name)
    }

    /// Drop every document of `name` and insert `documents` in order.
    async fn replace_all<T>(&self, name: &'static str, documents: Vec<T>) -> MongoResult<()>
    where
        T: Serialize + Send + Sync,
    {
        let collection = self.collection::<T>(name).await;
        let replace = |source| MongoDaoError::Replace {
            collection: name,
            source,
        };

        collection.delete_many(doc! {}).await.map_err(replace)?;
        if !documents.is_empty() {
            collection.insert_many(documents).await.map_err(replace)?;
        }
        Ok(())
    }

    async fn load_all<T>(&self, name: &'static str) -> MongoResult<Vec<T>>
    where
        T: DeserializeOwned + Send + Sync,
    {
        let collection = self.collection::<T>(name).await;
        let load = |source| MongoDaoError::Load {
            collection: name,
            source,
        };

        collection
            .find(doc! {})
            .sort(doc! { "_id": 1 })
            .await
            .map_err(load)?
            .try_collect()
            .await
            .map_err(load)
    }

    /// Replace every collection with `roster`.
    ///
    /// The list goes last so that an interrupted save keeps the previous list; loading
    /// reconciles the side collections against it.
    async fn save(&self, roster: RosterEntity) -> MongoResult<()> {
        let RosterEntity {
            playing,
            invited,
            asked,
            banned,
        } = roster;
        let counts = (playing.len(), invited.len(), asked.len(), banned.len());

        self.replace_all(
            ASKED_COLLECTION,
            asked.into_iter().map(MongoAskedDocument::from).collect(),
        )
        .await?;
        self.replace_all(
            INVITED_COLLECTION,
            invited
                .into_iter()
                .map(MongoInvitedDocument::from)
                .collect(),
        )
        .await?;
        self.replace_all(
            BANNED_COLLECTION,
            banned.into_iter().map(MongoBannedDocument::from).collect(),
        )
        .await?;
        self.replace_all(
            PLAYING_COLLECTION,
            playing
                .into_iter()
                .map(MongoPlayingDocument::from)
                .collect(),
        )
        .await?;

        debug!(
            playing = counts.0,
            invited = counts.1,
            asked = counts.2,
            banned = counts.3,
            "roster written to MongoDB"
        );
        Ok(())
    }

    async fn load(&self) -> MongoResult<Option<RosterEntity>> {
        let playing = self
            .load_all::<MongoPlayingDocument>(PLAYING_COLLECTION)
            .await?
            .into_iter()
            .map(PlayingEntity::try_from)
            .collect::<MongoResult<Vec<_>>>()?;
        let invited = self
            .load_all::<MongoInvitedDocument>(INVITED_COLLECTION)
            .await?
            .into_iter()
            .map(InvitedEntity::try_from)
            .collect::<MongoResult<Vec<_>>>()?;
        let asked: Vec<AskedEntity> = self
            .load_all::<MongoAskedDocument>(ASKED_COLLECTION)
            .await?
            .into_iter()
            .map(AskedEntity::from)
            .collect();
        let banned = self
            .load_all::<MongoBannedDocument>(BANNED_COLLECTION)
            .await?
            .into_iter()
            .map(BannedEntity::try_from)
            .collect::<MongoResult<Vec<_>>>()?;

        if playing.is_empty() && invited.is_empty() && asked.is_empty() && banned.is_empty() {
            return Ok(None);
        }

        Ok(Some(RosterEntity {
            playing,
            invited,
            asked,
            banned,
        }))
    }
}

impl RosterStore for MongoRosterStore {
    fn save_snapshot(&self, roster: RosterEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save(roster).await.map_err(Into::into) })
    }

    fn load_snapshot(&self) -> BoxFuture<'static, StorageResult<Option<RosterEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.load().await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
