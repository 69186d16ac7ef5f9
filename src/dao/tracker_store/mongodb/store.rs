use std::{collections::HashSet, sync::Arc};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::{Bson, Document, doc},
    error::ErrorKind,
    options::IndexOptions,
};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        ADDRESS_COLLECTION, BANNED_ADDRESS_COLLECTION, BANNED_SERIAL_COLLECTION, GAME_COLLECTION,
        MongoAddressDocument, MongoBannedAddressDocument, MongoBannedSerialDocument,
        MongoGameDocument, MongoNameDocument, MongoRejectedDocument, NAME_COLLECTION,
        REJECTED_COLLECTION,
    },
};
use crate::dao::{
    models::{
        AddressEntity, AddressUpsert, AppId, GameEntity, NameEntity, RejectedEntity,
        StorageUsage, TimestampMs,
    },
    storage::{StorageError, StorageResult},
    tracker_store::TrackerStore,
};

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Clone)]
pub struct MongoTrackerStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

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
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoTrackerStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let indexes: [(&'static str, &'static str, Document, bool); 8] = [
            (ADDRESS_COLLECTION, "ip", doc! {"ip": 1}, true),
            (ADDRESS_COLLECTION, "lastSeen", doc! {"lastSeen": 1}, false),
            (ADDRESS_COLLECTION, "serial", doc! {"serial": 1}, false),
            (BANNED_ADDRESS_COLLECTION, "ip", doc! {"ip": 1}, true),
            (BANNED_SERIAL_COLLECTION, "serial", doc! {"serial": 1}, true),
            (GAME_COLLECTION, "appId", doc! {"appId": 1}, true),
            (REJECTED_COLLECTION, "appId", doc! {"appId": 1}, true),
            (NAME_COLLECTION, "appId", doc! {"appId": 1}, true),
        ];

        let database = self.database().await;
        for (collection, index, keys, unique) in indexes {
            let model = mongodb::IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .name(Some(format!("{collection}_{index}_idx")))
                        .unique(Some(unique))
                        .build(),
                )
                .build();

            database
                .collection::<Document>(collection)
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<T>(name)
    }

    async fn find_addresses(&self, filter: Document) -> MongoResult<Vec<AddressEntity>> {
        let collection = self
            .collection::<MongoAddressDocument>(ADDRESS_COLLECTION)
            .await;
        let documents: Vec<MongoAddressDocument> = collection
            .find(filter)
            .await
            .map_err(|source| read_error(ADDRESS_COLLECTION, source))?
            .try_collect()
            .await
            .map_err(|source| read_error(ADDRESS_COLLECTION, source))?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn count_active(&self, since: TimestampMs) -> MongoResult<u64> {
        let collection = self.collection::<Document>(ADDRESS_COLLECTION).await;
        collection
            .count_documents(doc! { "lastSeen": { "$gt": since } })
            .await
            .map_err(|source| read_error(ADDRESS_COLLECTION, source))
    }

    async fn upsert_address(&self, upsert: AddressUpsert) -> MongoResult<()> {
        let AddressUpsert {
            ip,
            seen_at,
            username,
            serial,
        } = upsert;

        let mut set = doc! { "lastSeen": seen_at };
        if let Some(serial) = serial {
            set.insert("serial", serial);
        }
        let mut update = doc! {
            "$setOnInsert": { "firstSeen": seen_at, "ip": ip.as_str() },
            "$set": set,
        };
        if let Some(username) = username {
            update.insert("$addToSet", doc! { "usernames": username });
        }

        let collection = self.collection::<Document>(ADDRESS_COLLECTION).await;
        collection
            .update_one(doc! { "ip": ip.as_str() }, update)
            .upsert(true)
            .await
            .map_err(|source| write_error(ADDRESS_COLLECTION, &ip, source))?;
        Ok(())
    }

    async fn delete_by(
        &self,
        collection_name: &'static str,
        field: &str,
        values: Vec<String>,
    ) -> MongoResult<()> {
        if values.is_empty() {
            return Ok(());
        }
        let key = values.join(",");
        let mut filter = Document::new();
        filter.insert(field, doc! { "$in": values });
        let collection = self.collection::<Document>(collection_name).await;
        collection
            .delete_many(filter)
            .await
            .map_err(|source| write_error(collection_name, &key, source))?;
        Ok(())
    }

    async fn find_address(&self, ip: String) -> MongoResult<Option<AddressEntity>> {
        let collection = self
            .collection::<MongoAddressDocument>(ADDRESS_COLLECTION)
            .await;
        let document = collection
            .find_one(doc! { "ip": ip })
            .await
            .map_err(|source| read_error(ADDRESS_COLLECTION, source))?;
        Ok(document.map(Into::into))
    }

    /// Single unordered insert; addresses that are already banned hit the unique `ip` index
    /// and are skipped.
    async fn ban_addresses(&self, ips: Vec<String>) -> MongoResult<()> {
        let documents = banned_address_documents(ips);
        if documents.is_empty() {
            return Ok(());
        }
        let key = documents
            .iter()
            .map(|document| document.ip.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let collection = self
            .collection::<MongoBannedAddressDocument>(BANNED_ADDRESS_COLLECTION)
            .await;
        match collection.insert_many(documents).ordered(false).await {
            Ok(_) => Ok(()),
            Err(source) if only_duplicate_keys(&source) => Ok(()),
            Err(source) => Err(write_error(BANNED_ADDRESS_COLLECTION, &key, source)),
        }
    }

    async fn list_banned_addresses(&self) -> MongoResult<Vec<String>> {
        let collection = self
            .collection::<MongoBannedAddressDocument>(BANNED_ADDRESS_COLLECTION)
            .await;
        let documents: Vec<MongoBannedAddressDocument> = collection
            .find(doc! {})
            .projection(doc! { "_id": 0, "ip": 1 })
            .await
            .map_err(|source| read_error(BANNED_ADDRESS_COLLECTION, source))?
            .try_collect()
            .await
            .map_err(|source| read_error(BANNED_ADDRESS_COLLECTION, source))?;
        Ok(documents.into_iter().map(|document| document.ip).collect())
    }

    async fn list_banned_serials(&self) -> MongoResult<Vec<String>> {
        let collection = self
            .collection::<MongoBannedSerialDocument>(BANNED_SERIAL_COLLECTION)
            .await;
        let documents: Vec<MongoBannedSerialDocument> = collection
            .find(doc! {})
            .projection(doc! { "_id": 0, "serial": 1 })
            .await
            .map_err(|source| read_error(BANNED_SERIAL_COLLECTION, source))?
            .try_collect()
            .await
            .map_err(|source| read_error(BANNED_SERIAL_COLLECTION, source))?;
        Ok(documents
            .into_iter()
            .map(|document| document.serial)
            .collect())
    }

    async fn ban_serial(&self, serial: String) -> MongoResult<()> {
        let collection = self
            .collection::<MongoBannedSerialDocument>(BANNED_SERIAL_COLLECTION)
            .await;
        collection
            .update_one(
                doc! { "serial": serial.as_str() },
                doc! { "$set": { "serial": serial.as_str() } },
            )
            .upsert(true)
            .await
            .map_err(|source| write_error(BANNED_SERIAL_COLLECTION, &serial, source))?;
        Ok(())
    }

    async fn list_all<T>(&self, collection_name: &'static str) -> MongoResult<Vec<T>>
    where
        T: serde::de::DeserializeOwned + Unpin + Send + Sync,
    {
        let collection = self.collection::<T>(collection_name).await;
        collection
            .find(doc! {})
            .await
            .map_err(|source| read_error(collection_name, source))?
            .try_collect()
            .await
            .map_err(|source| read_error(collection_name, source))
    }

    async fn find_by_app_id<T>(
        &self,
        collection_name: &'static str,
        app_id: &AppId,
    ) -> MongoResult<Option<T>>
    where
        T: serde::de::DeserializeOwned + Send + Sync,
    {
        let collection = self.collection::<T>(collection_name).await;
        collection
            .find_one(doc! { "appId": app_id.as_str() })
            .await
            .map_err(|source| read_error(collection_name, source))
    }

    async fn replace_by_app_id<T>(
        &self,
        collection_name: &'static str,
        app_id: &AppId,
        document: &T,
    ) -> MongoResult<()>
    where
        T: serde::Serialize + Send + Sync,
    {
        let collection = self.collection::<T>(collection_name).await;
        collection
            .replace_one(doc! { "appId": app_id.as_str() }, document)
            .upsert(true)
            .await
            .map_err(|source| write_error(collection_name, app_id.as_str(), source))?;
        Ok(())
    }

    async fn set_name(&self, app_id: AppId, name: String) -> MongoResult<()> {
        let document = MongoNameDocument {
            app_id: app_id.to_string(),
            name,
        };
        self.replace_by_app_id(NAME_COLLECTION, &app_id, &document)
            .await
    }

    async fn storage_usage(&self) -> MongoResult<Option<StorageUsage>> {
        let database = self.database().await;
        let stats = database
            .run_command(doc! { "dbStats": 1 })
            .await
            .map_err(|source| MongoDaoError::Stats { source })?;

        match (stat_bytes(&stats, "dataSize"), stat_bytes(&stats, "storageSize")) {
            (Some(used), Some(max)) => Ok(Some(StorageUsage { used, max })),
            _ => Ok(None),
        }
    }
}

fn read_error(collection: &'static str, source: mongodb::error::Error) -> MongoDaoError {
    MongoDaoError::Read { collection, source }
}

fn write_error(collection: &'static str, key: &str, source: mongodb::error::Error) -> MongoDaoError {
    MongoDaoError::Write {
        collection,
        key: key.to_owned(),
        source,
    }
}

fn banned_address_documents(ips: Vec<String>) -> Vec<MongoBannedAddressDocument> {
    let mut seen = HashSet::new();
    ips.into_iter()
        .map(|ip| ip.trim().to_owned())
        .filter(|ip| !ip.is_empty() && seen.insert(ip.clone()))
        .map(|ip| MongoBannedAddressDocument { ip })
        .collect()
}

fn only_duplicate_keys(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::InsertMany(failure) => {
            failure.write_concern_error.is_none()
                && failure.write_errors.as_ref().is_some_and(|errors| {
                    errors.iter().all(|error| error.code == DUPLICATE_KEY_CODE)
                })
        }
        _ => false,
    }
}

/// `dbStats` reports sizes as int32, int64 or double depending on the server version.
fn stat_bytes(stats: &Document, key: &str) -> Option<u64> {
    match stats.get(key)? {
        Bson::Int32(value) => u64::try_from(*value).ok(),
        Bson::Int64(value) => u64::try_from(*value).ok(),
        Bson::Double(value) if *value >= 0.0 => Some(*value as u64),
        _ => None,
    }
}

fn convert_all<D, E>(documents: Vec<D>) -> StorageResult<Vec<E>>
where
    E: TryFrom<D, Error = StorageError>,
{
    documents.into_iter().map(E::try_from).collect()
}

impl TrackerStore for MongoTrackerStore {
    fn find_active_addresses(
        &self,
        since: TimestampMs,
    ) -> BoxFuture<'static, StorageResult<Vec<AddressEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_addresses(doc! { "lastSeen": { "$gt": since } })
                .await
                .map_err(Into::into)
        })
    }

    fn count_active_addresses(&self, since: TimestampMs) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.count_active(since).await.map_err(Into::into) })
    }

    fn list_addresses(&self) -> BoxFuture<'static, StorageResult<Vec<AddressEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_addresses(doc! {}).await.map_err(Into::into) })
    }

    fn upsert_address(&self, upsert: AddressUpsert) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.upsert_address(upsert).await.map_err(Into::into) })
    }

    fn delete_address(&self, ip: String) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete_by(ADDRESS_COLLECTION, "ip", vec![ip])
                .await
                .map_err(Into::into)
        })
    }

    fn find_address(&self, ip: String) -> BoxFuture<'static, StorageResult<Option<AddressEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_address(ip).await.map_err(Into::into) })
    }

    fn find_addresses_by_serial(
        &self,
        serial: String,
    ) -> BoxFuture<'static, StorageResult<Vec<AddressEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_addresses(doc! { "serial": serial })
                .await
                .map_err(Into::into)
        })
    }

    fn list_banned_addresses(&self) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let store = self.clone();
        Box::pin(async move { store.list_banned_addresses().await.map_err(Into::into) })
    }

    fn ban_address(&self, ip: String) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ban_addresses(vec![ip]).await.map_err(Into::into) })
    }

    fn unban_address(&self, ip: String) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete_by(BANNED_ADDRESS_COLLECTION, "ip", vec![ip])
                .await
                .map_err(Into::into)
        })
    }

    fn bulk_ban_addresses(&self, ips: Vec<String>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ban_addresses(ips).await.map_err(Into::into) })
    }

    fn bulk_unban_addresses(&self, ips: Vec<String>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete_by(BANNED_ADDRESS_COLLECTION, "ip", ips)
                .await
                .map_err(Into::into)
        })
    }

    fn list_banned_serials(&self) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let store = self.clone();
        Box::pin(async move { store.list_banned_serials().await.map_err(Into::into) })
    }

    fn ban_serial(&self, serial: String) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ban_serial(serial).await.map_err(Into::into) })
    }

    fn unban_serial(&self, serial: String) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete_by(BANNED_SERIAL_COLLECTION, "serial", vec![serial])
                .await
                .map_err(Into::into)
        })
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let documents = store
                .list_all::<MongoGameDocument>(GAME_COLLECTION)
                .await?;
            convert_all(documents)
        })
    }

    fn find_game(&self, app_id: AppId) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_by_app_id::<MongoGameDocument>(GAME_COLLECTION, &app_id)
                .await?
                .map(GameEntity::try_from)
                .transpose()
        })
    }

    fn upsert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let document = MongoGameDocument::from(&game);
            store
                .replace_by_app_id(GAME_COLLECTION, &game.app_id, &document)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_games(&self, app_id: AppId) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete_by(GAME_COLLECTION, "appId", vec![app_id.to_string()])
                .await
                .map_err(Into::into)
        })
    }

    fn list_rejected(&self) -> BoxFuture<'static, StorageResult<Vec<RejectedEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let documents = store
                .list_all::<MongoRejectedDocument>(REJECTED_COLLECTION)
                .await?;
            convert_all(documents)
        })
    }

    fn find_rejected(
        &self,
        app_id: AppId,
    ) -> BoxFuture<'static, StorageResult<Option<RejectedEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_by_app_id::<MongoRejectedDocument>(REJECTED_COLLECTION, &app_id)
                .await?
                .map(RejectedEntity::try_from)
                .transpose()
        })
    }

    fn upsert_rejected(&self, entry: RejectedEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let document = MongoRejectedDocument::from(&entry);
            store
                .replace_by_app_id(REJECTED_COLLECTION, &entry.app_id, &document)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_rejected(&self, app_id: AppId) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete_by(REJECTED_COLLECTION, "appId", vec![app_id.to_string()])
                .await
                .map_err(Into::into)
        })
    }

    fn list_names(&self) -> BoxFuture<'static, StorageResult<Vec<NameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let documents = store
                .list_all::<MongoNameDocument>(NAME_COLLECTION)
                .await?;
            convert_all(documents)
        })
    }

    fn get_name(&self, app_id: AppId) -> BoxFuture<'static, StorageResult<Option<String>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .find_by_app_id::<MongoNameDocument>(NAME_COLLECTION, &app_id)
                .await?;
            Ok(document.map(|document| document.name))
        })
    }

    fn set_name(&self, app_id: AppId, name: String) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.set_name(app_id, name).await.map_err(Into::into) })
    }

    fn delete_names(&self, app_id: AppId) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete_by(NAME_COLLECTION, "appId", vec![app_id.to_string()])
                .await
                .map_err(Into::into)
        })
    }

    fn storage_usage(&self) -> BoxFuture<'static, StorageResult<Option<StorageUsage>>> {
        let store = self.clone();
        Box::pin(async move { store.storage_usage().await.map_err(Into::into) })
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_ban_batch_drops_blank_and_repeated_addresses() {
        let documents = banned_address_documents(vec![
            "1.2.3.4".into(),
            " 5.6.7.8 ".into(),
            "1.2.3.4".into(),
            "  ".into(),
        ]);
        let ips: Vec<_> = documents.into_iter().map(|document| document.ip).collect();
        assert_eq!(ips, vec!["1.2.3.4", "5.6.7.8"]);
    }
}
