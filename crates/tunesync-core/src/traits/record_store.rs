// # Record Store Trait
//
// Defines the interface the core needs from a relational record store.
//
// ## Implementations
//
// - Airtable: `tunesync-store-airtable` crate
// - In-memory and JSON file: `tunesync_core::store`
//
// ## Usage
//
// ```rust,ignore
// use tunesync_core::{RecordStore, Table};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* RecordStore implementation */;
//
//     let songs = store.get_by_attribute(Table::Song, "spotifyId", "4uLU6hMC", &[]).await?;
//     println!("{} match(es)", songs.len());
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::model::{Fields, Record, RecordId};
use crate::schema::Table;

/// Sort direction for `get_all` / `get_by_attribute`
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Sort {
    /// Semantic field name
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Trait for record store implementations
///
/// Field maps passed in and out use semantic field names (see
/// [`crate::schema`]); translating them to store column names is the
/// implementation's job.
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks. The
/// library sync resolves songs as an unordered concurrent batch against a
/// single store.
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls or local I/O for its own backend
/// - ✅ Translate between semantic field names and store columns
/// - ✅ Split bulk calls into backend-sized batches
///
/// ## Forbidden Capabilities
/// - ❌ Retry failed calls (a failed call is terminal for the invocation)
/// - ❌ Decide create-vs-reuse (owned by the upsert resolver)
/// - ❌ Merge link fields (owned by the relationship merger)
/// - ❌ Cache records beyond a single call
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create a record and return its new id
    async fn create(&self, table: Table, fields: Fields) -> Result<RecordId, crate::Error>;

    /// Apply a partial update to a record and return its id
    ///
    /// Fields not present in `updates` are left untouched.
    async fn update(
        &self,
        table: Table,
        id: &RecordId,
        updates: Fields,
    ) -> Result<RecordId, crate::Error>;

    /// All records whose `attribute` equals `value`
    ///
    /// # Parameters
    ///
    /// - `attribute`: Semantic field name
    /// - `value`: Exact value to match
    /// - `sort`: Result order; empty keeps the store's natural order
    async fn get_by_attribute(
        &self,
        table: Table,
        attribute: &str,
        value: &str,
        sort: &[Sort],
    ) -> Result<Vec<Record>, crate::Error>;

    /// All records of a table, optionally filtered and sorted
    ///
    /// `filter` is a backend-specific formula; stores without a formula
    /// language reject a non-empty filter with `Error::InvalidInput`.
    async fn get_all(
        &self,
        table: Table,
        filter: Option<&str>,
        sort: &[Sort],
    ) -> Result<Vec<Record>, crate::Error>;

    /// Create many records, returning ids in input order
    async fn create_many(
        &self,
        table: Table,
        records: Vec<Fields>,
    ) -> Result<Vec<RecordId>, crate::Error> {
        let mut ids = Vec::with_capacity(records.len());
        for fields in records {
            ids.push(self.create(table, fields).await?);
        }
        Ok(ids)
    }

    /// Update many records, returning ids in input order
    async fn update_many(
        &self,
        table: Table,
        updates: Vec<(RecordId, Fields)>,
    ) -> Result<Vec<RecordId>, crate::Error> {
        let mut ids = Vec::with_capacity(updates.len());
        for (id, fields) in updates {
            ids.push(self.update(table, &id, fields).await?);
        }
        Ok(ids)
    }

    /// Get the store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}

/// Helper trait for constructing record stores from configuration
///
/// Async because some stores load their contents on open.
#[async_trait]
pub trait RecordStoreFactory: Send + Sync {
    /// Create a RecordStore instance from configuration
    async fn create(
        &self,
        config: &crate::config::StoreConfig,
    ) -> Result<Box<dyn RecordStore>, crate::Error>;
}
