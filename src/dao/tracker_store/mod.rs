pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;

use crate::dao::models::{
    AddressEntity, AddressUpsert, AppId, GameEntity, NameEntity, RejectedEntity, StorageUsage,
    TimestampMs,
};
use crate::dao::storage::StorageResult;

/// Abstraction over the document store holding presence, ban and catalog collections.
///
/// Every call is a potential suspension point; callers must not hold in-process locks
/// across them.
pub trait TrackerStore: Send + Sync {
    // Presence
    fn find_active_addresses(
        &self,
        since: TimestampMs,
    ) -> BoxFuture<'static, StorageResult<Vec<AddressEntity>>>;
    fn count_active_addresses(&self, since: TimestampMs) -> BoxFuture<'static, StorageResult<u64>>;
    fn list_addresses(&self) -> BoxFuture<'static, StorageResult<Vec<AddressEntity>>>;
    fn upsert_address(&self, upsert: AddressUpsert) -> BoxFuture<'static, StorageResult<()>>;
    fn delete_address(&self, ip: String) -> BoxFuture<'static, StorageResult<()>>;
    fn find_address(&self, ip: String) -> BoxFuture<'static, StorageResult<Option<AddressEntity>>>;
    fn find_addresses_by_serial(
        &self,
        serial: String,
    ) -> BoxFuture<'static, StorageResult<Vec<AddressEntity>>>;

    // Bans
    fn list_banned_addresses(&self) -> BoxFuture<'static, StorageResult<Vec<String>>>;
    fn ban_address(&self, ip: String) -> BoxFuture<'static, StorageResult<()>>;
    fn unban_address(&self, ip: String) -> BoxFuture<'static, StorageResult<()>>;
    fn bulk_ban_addresses(&self, ips: Vec<String>) -> BoxFuture<'static, StorageResult<()>>;
    fn bulk_unban_addresses(&self, ips: Vec<String>) -> BoxFuture<'static, StorageResult<()>>;
    fn list_banned_serials(&self) -> BoxFuture<'static, StorageResult<Vec<String>>>;
    fn ban_serial(&self, serial: String) -> BoxFuture<'static, StorageResult<()>>;
    fn unban_serial(&self, serial: String) -> BoxFuture<'static, StorageResult<()>>;

    // Catalog
    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>>;
    fn find_game(&self, app_id: AppId) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    fn upsert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn delete_games(&self, app_id: AppId) -> BoxFuture<'static, StorageResult<()>>;
    fn list_rejected(&self) -> BoxFuture<'static, StorageResult<Vec<RejectedEntity>>>;
    fn find_rejected(
        &self,
        app_id: AppId,
    ) -> BoxFuture<'static, StorageResult<Option<RejectedEntity>>>;
    fn upsert_rejected(&self, entry: RejectedEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn delete_rejected(&self, app_id: AppId) -> BoxFuture<'static, StorageResult<()>>;

    // Display names
    fn list_names(&self) -> BoxFuture<'static, StorageResult<Vec<NameEntity>>>;
    fn get_name(&self, app_id: AppId) -> BoxFuture<'static, StorageResult<Option<String>>>;
    fn set_name(&self, app_id: AppId, name: String) -> BoxFuture<'static, StorageResult<()>>;
    fn delete_names(&self, app_id: AppId) -> BoxFuture<'static, StorageResult<()>>;

    // Operations
    fn storage_usage(&self) -> BoxFuture<'static, StorageResult<Option<StorageUsage>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
