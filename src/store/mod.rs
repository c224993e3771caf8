//! Abstract record store consumed by the import engine.
//!
//! The engine only depends on the [`RecordStore`] trait; the admin backend
//! owns the actual storage. Two implementations ship with the crate: a
//! Postgres store for production and an in-memory store for tests and dry
//! runs.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::asset::{Asset, NewAsset};
use crate::models::contact_person::{ContactPerson, NewContactPerson};
use crate::models::provider::Provider;
use crate::models::real_estate::{NewRealEstate, RealEstate};
use crate::models::sync_history::{NewSyncHistoryEntry, SyncHistoryEntry};

/// Equality predicate over dynamic record fields.
pub type FieldPredicate = [(String, String)];

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// CRUD and query-by-predicate operations over the persisted catalog.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_provider(&self, id: i64) -> Result<Option<Provider>, StoreError>;

    async fn find_provider_by_number(&self, number: &str)
        -> Result<Option<Provider>, StoreError>;

    async fn count_contact_persons(
        &self,
        provider_id: i64,
        predicate: &FieldPredicate,
    ) -> Result<i64, StoreError>;

    async fn find_contact_person(
        &self,
        provider_id: i64,
        predicate: &FieldPredicate,
    ) -> Result<Option<ContactPerson>, StoreError>;

    async fn find_contact_person_by_id(&self, id: i64)
        -> Result<Option<ContactPerson>, StoreError>;

    async fn create_contact_person(
        &self,
        person: NewContactPerson,
    ) -> Result<ContactPerson, StoreError>;

    async fn update_contact_person(&self, person: &ContactPerson) -> Result<(), StoreError>;

    async fn count_real_estates(&self, field: &str, value: &str) -> Result<i64, StoreError>;

    async fn find_real_estate(
        &self,
        field: &str,
        value: &str,
    ) -> Result<Option<RealEstate>, StoreError>;

    async fn create_real_estate(&self, estate: NewRealEstate) -> Result<RealEstate, StoreError>;

    async fn update_real_estate(&self, estate: &RealEstate) -> Result<(), StoreError>;

    async fn delete_real_estate(&self, id: i64) -> Result<(), StoreError>;

    async fn find_asset_by_path(&self, path: &str) -> Result<Option<Asset>, StoreError>;

    async fn register_asset(&self, asset: NewAsset) -> Result<Asset, StoreError>;

    async fn update_asset(&self, asset: &Asset) -> Result<(), StoreError>;

    async fn delete_asset(&self, uuid: Uuid) -> Result<(), StoreError>;

    /// Delete every asset whose logical path starts with the given prefix.
    async fn delete_assets_below(&self, path_prefix: &str) -> Result<u64, StoreError>;

    async fn append_history(
        &self,
        entry: NewSyncHistoryEntry,
    ) -> Result<SyncHistoryEntry, StoreError>;

    /// History entries whose source is one of the given files.
    async fn find_history_for_sources(
        &self,
        sources: &[String],
    ) -> Result<Vec<SyncHistoryEntry>, StoreError>;

    async fn update_last_sync(
        &self,
        interface_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}
