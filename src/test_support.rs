//! Store double whose every call fails as if the backend were unreachable.

use std::io;

use futures::future::BoxFuture;

use crate::dao::{
    models::{
        AddressEntity, AddressUpsert, AppId, GameEntity, NameEntity, RejectedEntity,
        StorageUsage, TimestampMs,
    },
    storage::{StorageError, StorageResult},
    tracker_store::TrackerStore,
};

pub struct UnavailableStore;

fn down<T: Send + 'static>() -> BoxFuture<'static, StorageResult<T>> {
    Box::pin(async {
        Err(StorageError::unavailable(
            "test store is offline".into(),
            io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
        ))
    })
}

impl TrackerStore for UnavailableStore {
    fn find_active_addresses(
        &self,
        _since: TimestampMs,
    ) -> BoxFuture<'static, StorageResult<Vec<AddressEntity>>> {
        down()
    }
    fn count_active_addresses(&self, _since: TimestampMs) -> BoxFuture<'static, StorageResult<u64>> {
        down()
    }
    fn list_addresses(&self) -> BoxFuture<'static, StorageResult<Vec<AddressEntity>>> {
        down()
    }
    fn upsert_address(&self, _upsert: AddressUpsert) -> BoxFuture<'static, StorageResult<()>> {
        down()
    }
    fn delete_address(&self, _ip: String) -> BoxFuture<'static, StorageResult<()>> {
        down()
    }
    fn find_address(&self, _ip: String) -> BoxFuture<'static, StorageResult<Option<AddressEntity>>> {
        down()
    }
    fn find_addresses_by_serial(
        &self,
        _serial: String,
    ) -> BoxFuture<'static, StorageResult<Vec<AddressEntity>>> {
        down()
    }
    fn list_banned_addresses(&self) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        down()
    }
    fn ban_address(&self, _ip: String) -> BoxFuture<'static, StorageResult<()>> {
        down()
    }
    fn unban_address(&self, _ip: String) -> BoxFuture<'static, StorageResult<()>> {
        down()
    }
    fn bulk_ban_addresses(&self, _ips: Vec<String>) -> BoxFuture<'static, StorageResult<()>> {
        down()
    }
    fn bulk_unban_addresses(&self, _ips: Vec<String>) -> BoxFuture<'static, StorageResult<()>> {
        down()
    }
    fn list_banned_serials(&self) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        down()
    }
    fn ban_serial(&self, _serial: String) -> BoxFuture<'static, StorageResult<()>> {
        down()
    }
    fn unban_serial(&self, _serial: String) -> BoxFuture<'static, StorageResult<()>> {
        down()
    }
    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        down()
    }
    fn find_game(&self, _app_id: AppId) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        down()
    }
    fn upsert_game(&self, _game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        down()
    }
    fn delete_games(&self, _app_id: AppId) -> BoxFuture<'static, StorageResult<()>> {
        down()
    }
    fn list_rejected(&self) -> BoxFuture<'static, StorageResult<Vec<RejectedEntity>>> {
        down()
    }
    fn find_rejected(
        &self,
        _app_id: AppId,
    ) -> BoxFuture<'static, StorageResult<Option<RejectedEntity>>> {
        down()
    }
    fn upsert_rejected(&self, _entry: RejectedEntity) -> BoxFuture<'static, StorageResult<()>> {
        down()
    }
    fn delete_rejected(&self, _app_id: AppId) -> BoxFuture<'static, StorageResult<()>> {
        down()
    }
    fn list_names(&self) -> BoxFuture<'static, StorageResult<Vec<NameEntity>>> {
        down()
    }
    fn get_name(&self, _app_id: AppId) -> BoxFuture<'static, StorageResult<Option<String>>> {
        down()
    }
    fn set_name(&self, _app_id: AppId, _name: String) -> BoxFuture<'static, StorageResult<()>> {
        down()
    }
    fn delete_names(&self, _app_id: AppId) -> BoxFuture<'static, StorageResult<()>> {
        down()
    }
    fn storage_usage(&self) -> BoxFuture<'static, StorageResult<Option<StorageUsage>>> {
        down()
    }
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        down()
    }
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        down()
    }
}
