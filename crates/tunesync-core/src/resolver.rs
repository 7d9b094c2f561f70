//! Upsert resolver
//!
//! Create-if-absent, else reuse, keyed by a table's natural key:
//!
//! | matches | outcome                               |
//! |---------|---------------------------------------|
//! | 0       | build fields, create, `created: true` |
//! | 1       | reuse the match, `created: false`     |
//! | > 1     | `Error::DatabaseMalformed`, no write  |
//!
//! Duplicates are never repaired or silently picked from; they point at a
//! data-integrity bug upstream and are surfaced to the caller.

use crate::error::{Error, Result};
use crate::model::{Entity, Fields, RecordId};
use crate::schema::Table;
use crate::traits::RecordStore;
use tracing::debug;

/// Outcome of a successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Id of the created or reused record
    pub id: RecordId,
    /// Whether this call created the record
    pub created: bool,
}

/// Resolve a natural key to a record id, creating the record if absent
///
/// `build` runs only when a record has to be created.
///
/// # Errors
///
/// - `Error::InvalidInput` if the table has no natural key or `key` is empty
/// - `Error::DatabaseMalformed` if more than one record matches
/// - Any store error from the lookup or the create
pub async fn resolve<F>(store: &dyn RecordStore, table: Table, key: &str, build: F) -> Result<Resolution>
where
    F: FnOnce() -> Fields,
{
    let attribute = table
        .natural_key()
        .ok_or_else(|| Error::invalid_input(format!("{table} has no natural key")))?;

    if key.is_empty() {
        return Err(Error::invalid_input(format!("empty {table}.{attribute}")));
    }

    let mut existing = store.get_by_attribute(table, attribute, key, &[]).await?;

    match existing.len() {
        0 => {
            let id = store.create(table, build()).await?;
            debug!(%table, key, %id, "created record");
            Ok(Resolution { id, created: true })
        }
        1 => {
            let record = existing.remove(0);
            debug!(%table, key, id = %record.id, "reusing existing record");
            Ok(Resolution {
                id: record.id,
                created: false,
            })
        }
        _ => Err(Error::malformed(table, key)),
    }
}

/// Resolve a typed entity by its natural key
pub async fn resolve_entity<E: Entity>(store: &dyn RecordStore, entity: &E) -> Result<Resolution> {
    resolve(store, E::TABLE, entity.natural_key(), || entity.to_fields()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Song;
    use crate::store::MemoryRecordStore;
    use serde_json::json;

    fn song(id: &str) -> Song {
        Song {
            spotify_id: id.into(),
            name: "Name".into(),
            artist: "Artist".into(),
            album: "Album".into(),
            uri: format!("spotify:track:{id}"),
        }
    }

    #[tokio::test]
    async fn second_resolve_reuses_first_record() {
        let store = MemoryRecordStore::new();

        let first = resolve_entity(&store, &song("s1")).await.unwrap();
        let second = resolve_entity(&store, &song("s1")).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.id, second.id);
        assert_eq!(store.len(Table::Song).await, 1);
    }

    #[tokio::test]
    async fn builder_not_called_when_record_exists() {
        let store = MemoryRecordStore::new();
        let fields = json!({"username": "alice"}).as_object().unwrap().clone();
        store.create(Table::User, fields).await.unwrap();

        let resolution = resolve(&store, Table::User, "alice", || {
            panic!("builder must not run for an existing record")
        })
        .await
        .unwrap();
        assert!(!resolution.created);
    }

    #[tokio::test]
    async fn duplicates_are_fatal() {
        let store = MemoryRecordStore::new();
        for _ in 0..2 {
            store
                .create(Table::Song, song("dup").to_fields())
                .await
                .unwrap();
        }

        let err = resolve_entity(&store, &song("dup")).await.unwrap_err();
        assert!(err.is_malformed());
        assert_eq!(store.len(Table::Song).await, 2);
    }

    #[tokio::test]
    async fn tables_without_natural_key_are_rejected() {
        let store = MemoryRecordStore::new();
        let err = resolve(&store, Table::Playlist, "x", Fields::new).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
