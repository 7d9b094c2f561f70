// # Memory Record Store
//
// In-memory implementation of RecordStore.
//
// ## Purpose
//
// A store that doesn't persist across restarts. Used by tests and as a
// scratch target for dry runs of the mirror.
//
// ## Semantics
//
// - Ids are `rec` followed by a zero-padded counter, unique per store
// - `update` merges the given fields into the record (PATCH semantics)
// - `get_all` keeps insertion order unless sort keys are given
// - Filter formulas are not supported

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::StoreConfig;
use crate::model::{Fields, Record, RecordId};
use crate::schema::Table;
use crate::traits::{RecordStore, RecordStoreFactory, Sort, SortDirection};

/// Table contents shared by the memory and file stores
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Tables {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    records: BTreeMap<Table, Vec<Record>>,
}

impl Tables {
    pub(crate) fn create(&mut self, table: Table, fields: Fields) -> RecordId {
        self.next_id += 1;
        let id = RecordId::new(format!("rec{:014}", self.next_id));
        self.records
            .entry(table)
            .or_default()
            .push(Record::new(id.clone(), fields));
        id
    }

    pub(crate) fn update(
        &mut self,
        table: Table,
        id: &RecordId,
        updates: Fields,
    ) -> Result<RecordId, Error> {
        let record = self
            .records
            .get_mut(&table)
            .and_then(|records| records.iter_mut().find(|r| &r.id == id))
            .ok_or_else(|| Error::not_found(format!("{table} record {id}")))?;
        record.fields.extend(updates);
        Ok(record.id.clone())
    }

    pub(crate) fn find(&self, table: Table, attribute: &str, value: &str, sort: &[Sort]) -> Vec<Record> {
        let mut found: Vec<Record> = self
            .records
            .get(&table)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.fields.get(attribute).is_some_and(|v| value_matches(v, value)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if !sort.is_empty() {
            found.sort_by(|a, b| compare_records(a, b, sort));
        }
        found
    }

    pub(crate) fn all(&self, table: Table, sort: &[Sort]) -> Vec<Record> {
        let mut records = self.records.get(&table).cloned().unwrap_or_default();
        if !sort.is_empty() {
            records.sort_by(|a, b| compare_records(a, b, sort));
        }
        records
    }

    pub(crate) fn len(&self, table: Table) -> usize {
        self.records.get(&table).map_or(0, Vec::len)
    }
}

/// Exact-match comparison of a stored value against a query string
fn value_matches(stored: &Value, wanted: &str) -> bool {
    match stored {
        Value::String(s) => s == wanted,
        Value::Number(n) => n.to_string() == wanted,
        Value::Bool(b) => b.to_string() == wanted,
        _ => false,
    }
}

fn compare_records(a: &Record, b: &Record, sort: &[Sort]) -> Ordering {
    for key in sort {
        let ordering = compare_values(a.fields.get(&key.field), b.fields.get(&key.field));
        let ordering = match key.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Missing values sort last; mixed types compare by their JSON text
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a.filter(|v| !v.is_null()), b.filter(|v| !v.is_null())) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

pub(crate) fn reject_filter(filter: Option<&str>, store: &str) -> Result<(), Error> {
    match filter {
        Some(formula) if !formula.trim().is_empty() => Err(Error::invalid_input(format!(
            "{store} store does not support filter formulas"
        ))),
        _ => Ok(()),
    }
}

/// In-memory record store
///
/// Clones share the same tables.
///
/// # Example
///
/// ```rust,no_run
/// use tunesync_core::store::MemoryRecordStore;
/// use tunesync_core::{RecordStore, Table};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryRecordStore::new();
///
///     let mut fields = tunesync_core::Fields::new();
///     fields.insert("username".into(), "alice".into());
///     let id = store.create(Table::User, fields).await?;
///
///     let users = store.get_by_attribute(Table::User, "username", "alice", &[]).await?;
///     assert_eq!(users[0].id, id);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<RwLock<Tables>>,
}

impl MemoryRecordStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a table
    pub async fn len(&self, table: Table) -> usize {
        self.inner.read().await.len(table)
    }

    /// Whether a table has no records
    pub async fn is_empty(&self, table: Table) -> bool {
        self.len(table).await == 0
    }

    /// Fetch a record by id
    pub async fn get(&self, table: Table, id: &RecordId) -> Option<Record> {
        let tables = self.inner.read().await;
        tables
            .records
            .get(&table)
            .and_then(|records| records.iter().find(|r| &r.id == id).cloned())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(&self, table: Table, fields: Fields) -> Result<RecordId, Error> {
        Ok(self.inner.write().await.create(table, fields))
    }

    async fn update(
        &self,
        table: Table,
        id: &RecordId,
        updates: Fields,
    ) -> Result<RecordId, Error> {
        self.inner.write().await.update(table, id, updates)
    }

    async fn get_by_attribute(
        &self,
        table: Table,
        attribute: &str,
        value: &str,
        sort: &[Sort],
    ) -> Result<Vec<Record>, Error> {
        Ok(self.inner.read().await.find(table, attribute, value, sort))
    }

    async fn get_all(
        &self,
        table: Table,
        filter: Option<&str>,
        sort: &[Sort],
    ) -> Result<Vec<Record>, Error> {
        reject_filter(filter, "memory")?;
        Ok(self.inner.read().await.all(table, sort))
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for creating memory record stores
pub struct MemoryRecordStoreFactory;

#[async_trait]
impl RecordStoreFactory for MemoryRecordStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Box<dyn RecordStore>, Error> {
        match config {
            StoreConfig::Memory => Ok(Box::new(MemoryRecordStore::new())),
            other => Err(Error::config(format!(
                "Memory store factory cannot build a '{}' store",
                other.type_name()
            ))),
        }
    }
}
