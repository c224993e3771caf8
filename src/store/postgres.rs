//! PostgreSQL implementation of the record store.
//!
//! Dynamic record fields live in JSONB columns; predicates use containment
//! (`@>`) so the GIN index on `fields` applies.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::asset::{Asset, NewAsset};
use crate::models::contact_person::{ContactPerson, NewContactPerson};
use crate::models::provider::Provider;
use crate::models::real_estate::{NewRealEstate, RealEstate};
use crate::models::record::Fields;
use crate::models::sync_history::{NewSyncHistoryEntry, SyncHistoryEntry, SyncStatus};

use super::{FieldPredicate, RecordStore, StoreError};

/// Postgres-backed [`RecordStore`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply pending migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(sqlx::Error::Migrate(Box::new(e))))
    }
}

fn predicate_json(predicate: &FieldPredicate) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = predicate
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();
    serde_json::Value::Object(map)
}

fn single_field_json(field: &str, value: &str) -> serde_json::Value {
    serde_json::json!({ field: value })
}

fn fields_from_value(value: serde_json::Value) -> Fields {
    serde_json::from_value(value).unwrap_or_default()
}

fn fields_to_value(fields: &Fields) -> serde_json::Value {
    serde_json::to_value(fields).unwrap_or_default()
}

type ContactRow = (i64, i64, bool, serde_json::Value);
type EstateRow = (
    i64,
    i64,
    Option<i64>,
    bool,
    bool,
    DateTime<Utc>,
    DateTime<Utc>,
    serde_json::Value,
);

fn contact_from_row(row: ContactRow) -> ContactPerson {
    ContactPerson {
        id: row.0,
        provider_id: row.1,
        published: row.2,
        fields: fields_from_value(row.3),
    }
}

fn estate_from_row(row: EstateRow) -> RealEstate {
    RealEstate {
        id: row.0,
        provider_id: row.1,
        contact_person_id: row.2,
        published: row.3,
        referenz: row.4,
        date_added: row.5,
        modified_at: row.6,
        fields: fields_from_value(row.7),
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn find_provider(&self, id: i64) -> Result<Option<Provider>, StoreError> {
        let provider = sqlx::query_as::<_, Provider>(
            "SELECT id, anbieternr, name FROM providers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(provider)
    }

    async fn find_provider_by_number(
        &self,
        number: &str,
    ) -> Result<Option<Provider>, StoreError> {
        let provider = sqlx::query_as::<_, Provider>(
            "SELECT id, anbieternr, name FROM providers WHERE anbieternr = $1",
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(provider)
    }

    async fn count_contact_persons(
        &self,
        provider_id: i64,
        predicate: &FieldPredicate,
    ) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM contact_persons WHERE provider_id = $1 AND fields @> $2",
        )
        .bind(provider_id)
        .bind(predicate_json(predicate))
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn find_contact_person(
        &self,
        provider_id: i64,
        predicate: &FieldPredicate,
    ) -> Result<Option<ContactPerson>, StoreError> {
        let row = sqlx::query_as::<_, ContactRow>(
            r#"
            SELECT id, provider_id, published, fields
            FROM contact_persons
            WHERE provider_id = $1 AND fields @> $2
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(provider_id)
        .bind(predicate_json(predicate))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(contact_from_row))
    }

    async fn find_contact_person_by_id(
        &self,
        id: i64,
    ) -> Result<Option<ContactPerson>, StoreError> {
        let row = sqlx::query_as::<_, ContactRow>(
            "SELECT id, provider_id, published, fields FROM contact_persons WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(contact_from_row))
    }

    async fn create_contact_person(
        &self,
        person: NewContactPerson,
    ) -> Result<ContactPerson, StoreError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO contact_persons (provider_id, published, fields)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(person.provider_id)
        .bind(person.published)
        .bind(fields_to_value(&person.fields))
        .fetch_one(&self.pool)
        .await?;

        Ok(ContactPerson {
            id,
            provider_id: person.provider_id,
            published: person.published,
            fields: person.fields,
        })
    }

    async fn update_contact_person(&self, person: &ContactPerson) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE contact_persons SET provider_id = $1, published = $2, fields = $3 WHERE id = $4",
        )
        .bind(person.provider_id)
        .bind(person.published)
        .bind(fields_to_value(&person.fields))
        .bind(person.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_real_estates(&self, field: &str, value: &str) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM real_estates WHERE fields @> $1",
        )
        .bind(single_field_json(field, value))
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn find_real_estate(
        &self,
        field: &str,
        value: &str,
    ) -> Result<Option<RealEstate>, StoreError> {
        let row = sqlx::query_as::<_, EstateRow>(
            r#"
            SELECT id, provider_id, contact_person_id, published, referenz,
                   date_added, modified_at, fields
            FROM real_estates
            WHERE fields @> $1
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(single_field_json(field, value))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(estate_from_row))
    }

    async fn create_real_estate(&self, estate: NewRealEstate) -> Result<RealEstate, StoreError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO real_estates
                (provider_id, contact_person_id, published, referenz,
                 date_added, modified_at, fields)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(estate.provider_id)
        .bind(estate.contact_person_id)
        .bind(estate.published)
        .bind(estate.referenz)
        .bind(estate.date_added)
        .bind(estate.modified_at)
        .bind(fields_to_value(&estate.fields))
        .fetch_one(&self.pool)
        .await?;

        Ok(RealEstate {
            id,
            provider_id: estate.provider_id,
            contact_person_id: estate.contact_person_id,
            published: estate.published,
            referenz: estate.referenz,
            date_added: estate.date_added,
            modified_at: estate.modified_at,
            fields: estate.fields,
        })
    }

    async fn update_real_estate(&self, estate: &RealEstate) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE real_estates
            SET provider_id = $1, contact_person_id = $2, published = $3,
                referenz = $4, modified_at = $5, fields = $6
            WHERE id = $7
            "#,
        )
        .bind(estate.provider_id)
        .bind(estate.contact_person_id)
        .bind(estate.published)
        .bind(estate.referenz)
        .bind(estate.modified_at)
        .bind(fields_to_value(&estate.fields))
        .bind(estate.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_real_estate(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM real_estates WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_asset_by_path(&self, path: &str) -> Result<Option<Asset>, StoreError> {
        let row = sqlx::query_as::<_, (Uuid, String, String, Option<String>, Option<String>)>(
            "SELECT uuid, path, hash, title, alt FROM assets WHERE path = $1",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(uuid, path, hash, title, alt)| Asset {
            uuid,
            path,
            hash,
            title,
            alt,
        }))
    }

    async fn register_asset(&self, asset: NewAsset) -> Result<Asset, StoreError> {
        let uuid = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO assets (uuid, path, hash, title, alt)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (path) DO UPDATE
            SET hash = EXCLUDED.hash, title = EXCLUDED.title, alt = EXCLUDED.alt
            "#,
        )
        .bind(uuid)
        .bind(&asset.path)
        .bind(&asset.hash)
        .bind(&asset.title)
        .bind(&asset.alt)
        .execute(&self.pool)
        .await?;

        // The upsert may have kept an earlier uuid; read it back.
        let stored = self
            .find_asset_by_path(&asset.path)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("asset {}", asset.path)))?;
        Ok(stored)
    }

    async fn update_asset(&self, asset: &Asset) -> Result<(), StoreError> {
        sqlx::query("UPDATE assets SET path = $1, hash = $2, title = $3, alt = $4 WHERE uuid = $5")
            .bind(&asset.path)
            .bind(&asset.hash)
            .bind(&asset.title)
            .bind(&asset.alt)
            .bind(asset.uuid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_asset(&self, uuid: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM assets WHERE uuid = $1")
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_assets_below(&self, path_prefix: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM assets WHERE path LIKE $1 || '%'")
            .bind(path_prefix)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn append_history(
        &self,
        entry: NewSyncHistoryEntry,
    ) -> Result<SyncHistoryEntry, StoreError> {
        let (id, tstamp) = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
            r#"
            INSERT INTO sync_history (interface_id, tstamp, source, username, text, status)
            VALUES ($1, NOW(), $2, $3, $4, $5)
            RETURNING id, tstamp
            "#,
        )
        .bind(entry.interface_id)
        .bind(&entry.source)
        .bind(&entry.username)
        .bind(&entry.text)
        .bind(entry.status.code())
        .fetch_one(&self.pool)
        .await?;

        Ok(SyncHistoryEntry {
            id,
            interface_id: entry.interface_id,
            tstamp,
            source: entry.source,
            username: entry.username,
            text: entry.text,
            status: entry.status,
        })
    }

    async fn find_history_for_sources(
        &self,
        sources: &[String],
    ) -> Result<Vec<SyncHistoryEntry>, StoreError> {
        let rows = sqlx::query_as::<
            _,
            (i64, i64, DateTime<Utc>, String, String, String, i16),
        >(
            r#"
            SELECT id, interface_id, tstamp, source, username, text, status
            FROM sync_history
            WHERE source = ANY($1)
            ORDER BY tstamp
            "#,
        )
        .bind(sources)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, interface_id, tstamp, source, username, text, status)| SyncHistoryEntry {
                    id,
                    interface_id,
                    tstamp,
                    source,
                    username,
                    text,
                    status: SyncStatus::from_code(status),
                },
            )
            .collect())
    }

    async fn update_last_sync(
        &self,
        interface_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO interfaces (id, last_sync)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET last_sync = EXCLUDED.last_sync
            "#,
        )
        .bind(interface_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
