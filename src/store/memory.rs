//! In-memory record store for tests and dry runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::models::asset::{Asset, NewAsset};
use crate::models::contact_person::{ContactPerson, NewContactPerson};
use crate::models::provider::Provider;
use crate::models::real_estate::{NewRealEstate, RealEstate};
use crate::models::sync_history::{NewSyncHistoryEntry, SyncHistoryEntry};

use super::{FieldPredicate, RecordStore, StoreError};

#[derive(Debug, Default)]
struct Inner {
    providers: Vec<Provider>,
    contact_persons: Vec<ContactPerson>,
    real_estates: Vec<RealEstate>,
    assets: Vec<Asset>,
    history: Vec<SyncHistoryEntry>,
    last_sync: BTreeMap<i64, DateTime<Utc>>,
    next_contact_id: i64,
    next_estate_id: i64,
    next_history_id: i64,
}

/// Thread-safe in-memory implementation of [`RecordStore`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a provider row.
    pub fn add_provider(&self, id: i64, number: &str, name: &str) {
        self.inner.write().providers.push(Provider {
            id,
            anbieternr: number.to_string(),
            name: name.to_string(),
        });
    }

    /// Seed a contact person row, returning its id.
    pub fn add_contact_person(
        &self,
        provider_id: i64,
        fields: crate::models::record::Fields,
    ) -> i64 {
        let mut inner = self.inner.write();
        inner.next_contact_id += 1;
        let id = inner.next_contact_id;
        inner.contact_persons.push(ContactPerson {
            id,
            provider_id,
            published: true,
            fields,
        });
        id
    }

    // Snapshot accessors for assertions.

    pub fn real_estates(&self) -> Vec<RealEstate> {
        self.inner.read().real_estates.clone()
    }

    pub fn contact_persons(&self) -> Vec<ContactPerson> {
        self.inner.read().contact_persons.clone()
    }

    pub fn assets(&self) -> Vec<Asset> {
        self.inner.read().assets.clone()
    }

    pub fn history(&self) -> Vec<SyncHistoryEntry> {
        self.inner.read().history.clone()
    }

    pub fn last_sync(&self, interface_id: i64) -> Option<DateTime<Utc>> {
        self.inner.read().last_sync.get(&interface_id).copied()
    }
}

fn matches_predicate(fields: &crate::models::record::Fields, predicate: &FieldPredicate) -> bool {
    predicate
        .iter()
        .all(|(key, value)| fields.get(key).is_some_and(|v| v == value))
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn find_provider(&self, id: i64) -> Result<Option<Provider>, StoreError> {
        Ok(self
            .inner
            .read()
            .providers
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn find_provider_by_number(
        &self,
        number: &str,
    ) -> Result<Option<Provider>, StoreError> {
        Ok(self
            .inner
            .read()
            .providers
            .iter()
            .find(|p| p.anbieternr == number)
            .cloned())
    }

    async fn count_contact_persons(
        &self,
        provider_id: i64,
        predicate: &FieldPredicate,
    ) -> Result<i64, StoreError> {
        Ok(self
            .inner
            .read()
            .contact_persons
            .iter()
            .filter(|c| c.provider_id == provider_id && matches_predicate(&c.fields, predicate))
            .count() as i64)
    }

    async fn find_contact_person(
        &self,
        provider_id: i64,
        predicate: &FieldPredicate,
    ) -> Result<Option<ContactPerson>, StoreError> {
        Ok(self
            .inner
            .read()
            .contact_persons
            .iter()
            .find(|c| c.provider_id == provider_id && matches_predicate(&c.fields, predicate))
            .cloned())
    }

    async fn find_contact_person_by_id(
        &self,
        id: i64,
    ) -> Result<Option<ContactPerson>, StoreError> {
        Ok(self
            .inner
            .read()
            .contact_persons
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn create_contact_person(
        &self,
        person: NewContactPerson,
    ) -> Result<ContactPerson, StoreError> {
        let mut inner = self.inner.write();
        inner.next_contact_id += 1;
        let created = ContactPerson {
            id: inner.next_contact_id,
            provider_id: person.provider_id,
            published: person.published,
            fields: person.fields,
        };
        inner.contact_persons.push(created.clone());
        Ok(created)
    }

    async fn update_contact_person(&self, person: &ContactPerson) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let existing = inner
            .contact_persons
            .iter_mut()
            .find(|c| c.id == person.id)
            .ok_or_else(|| StoreError::NotFound(format!("contact person {}", person.id)))?;
        *existing = person.clone();
        Ok(())
    }

    async fn count_real_estates(&self, field: &str, value: &str) -> Result<i64, StoreError> {
        Ok(self
            .inner
            .read()
            .real_estates
            .iter()
            .filter(|e| e.fields.get(field).is_some_and(|v| v == value))
            .count() as i64)
    }

    async fn find_real_estate(
        &self,
        field: &str,
        value: &str,
    ) -> Result<Option<RealEstate>, StoreError> {
        Ok(self
            .inner
            .read()
            .real_estates
            .iter()
            .find(|e| e.fields.get(field).is_some_and(|v| v == value))
            .cloned())
    }

    async fn create_real_estate(&self, estate: NewRealEstate) -> Result<RealEstate, StoreError> {
        let mut inner = self.inner.write();
        inner.next_estate_id += 1;
        let created = RealEstate {
            id: inner.next_estate_id,
            provider_id: estate.provider_id,
            contact_person_id: estate.contact_person_id,
            published: estate.published,
            referenz: estate.referenz,
            date_added: estate.date_added,
            modified_at: estate.modified_at,
            fields: estate.fields,
        };
        inner.real_estates.push(created.clone());
        Ok(created)
    }

    async fn update_real_estate(&self, estate: &RealEstate) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let existing = inner
            .real_estates
            .iter_mut()
            .find(|e| e.id == estate.id)
            .ok_or_else(|| StoreError::NotFound(format!("real estate {}", estate.id)))?;
        *existing = estate.clone();
        Ok(())
    }

    async fn delete_real_estate(&self, id: i64) -> Result<(), StoreError> {
        self.inner.write().real_estates.retain(|e| e.id != id);
        Ok(())
    }

    async fn find_asset_by_path(&self, path: &str) -> Result<Option<Asset>, StoreError> {
        Ok(self
            .inner
            .read()
            .assets
            .iter()
            .find(|a| a.path == path)
            .cloned())
    }

    async fn register_asset(&self, asset: NewAsset) -> Result<Asset, StoreError> {
        let created = Asset {
            uuid: Uuid::new_v4(),
            path: asset.path,
            hash: asset.hash,
            title: asset.title,
            alt: asset.alt,
        };
        self.inner.write().assets.push(created.clone());
        Ok(created)
    }

    async fn update_asset(&self, asset: &Asset) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let existing = inner
            .assets
            .iter_mut()
            .find(|a| a.uuid == asset.uuid)
            .ok_or_else(|| StoreError::NotFound(format!("asset {}", asset.uuid)))?;
        *existing = asset.clone();
        Ok(())
    }

    async fn delete_asset(&self, uuid: Uuid) -> Result<(), StoreError> {
        self.inner.write().assets.retain(|a| a.uuid != uuid);
        Ok(())
    }

    async fn delete_assets_below(&self, path_prefix: &str) -> Result<u64, StoreError> {
        let mut inner = self.inner.write();
        let before = inner.assets.len();
        inner.assets.retain(|a| !a.path.starts_with(path_prefix));
        Ok((before - inner.assets.len()) as u64)
    }

    async fn append_history(
        &self,
        entry: NewSyncHistoryEntry,
    ) -> Result<SyncHistoryEntry, StoreError> {
        let mut inner = self.inner.write();
        inner.next_history_id += 1;
        let created = SyncHistoryEntry {
            id: inner.next_history_id,
            interface_id: entry.interface_id,
            tstamp: Utc::now(),
            source: entry.source,
            username: entry.username,
            text: entry.text,
            status: entry.status,
        };
        inner.history.push(created.clone());
        Ok(created)
    }

    async fn find_history_for_sources(
        &self,
        sources: &[String],
    ) -> Result<Vec<SyncHistoryEntry>, StoreError> {
        Ok(self
            .inner
            .read()
            .history
            .iter()
            .filter(|h| sources.contains(&h.source))
            .cloned()
            .collect())
    }

    async fn update_last_sync(
        &self,
        interface_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.inner.write().last_sync.insert(interface_id, at);
        Ok(())
    }
}
