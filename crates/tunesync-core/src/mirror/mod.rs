//! Dev→Prod mirror
//!
//! One-directional reconciliation of Product and Store records from a DEV
//! record store into a PROD record store.
//!
//! ## Passes
//!
//! 1. **Create missing**: DEV records whose natural key has no PROD match
//!    are projected onto the field whitelist and bulk-created in PROD.
//! 2. **Update all**: PROD is refetched, and every DEV record with a PROD
//!    match is projected and bulk-written onto the matched PROD id. No
//!    diffing; every match is written on every run.
//!
//! Record ids never cross environments. The natural key is the only
//! identity shared between DEV and PROD, and projected field maps never
//! contain ids, formulas or links. A computed natural key (Product
//! `fullName`) is matched on but never written; PROD derives it itself.

use crate::config::MirrorConfig;
use crate::error::{Error, Result};
use crate::model::{Fields, Record, RecordId};
use crate::response::Response;
use crate::schema::Table;
use crate::traits::RecordStore;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One mirrored table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorTable {
    pub table: Table,
    key: &'static str,
    /// Whether the key is a plain column PROD accepts writes to
    copy_key: bool,
    fields: Vec<String>,
}

impl MirrorTable {
    /// Describe a table and the plain fields copied besides its natural key
    ///
    /// # Errors
    ///
    /// `Error::Config` if the table has no natural key or a field is not a
    /// plain column.
    pub fn new(table: Table, fields: Vec<String>) -> Result<Self> {
        let key = table
            .natural_key()
            .ok_or_else(|| Error::config(format!("{table} has no natural key and cannot be mirrored")))?;
        for field in &fields {
            match table.column(field) {
                Some(column) if column.kind.is_plain() => {}
                Some(column) => {
                    return Err(Error::config(format!(
                        "{table}.{field} is a {:?} column and cannot be mirrored",
                        column.kind
                    )));
                }
                None => return Err(Error::config(format!("Unknown {table} field: {field}"))),
            }
        }
        let copy_key = table.column(key).is_some_and(|column| column.kind.is_plain());
        Ok(Self {
            table,
            key,
            copy_key,
            fields,
        })
    }

    /// Natural key field
    pub fn key(&self) -> &'static str {
        self.key
    }

    /// Project a DEV record onto the whitelist, plus the key when writable
    fn project(&self, record: &Record) -> Fields {
        self.copy_key
            .then_some(self.key)
            .into_iter()
            .chain(self.fields.iter().map(String::as_str))
            .filter_map(|field| {
                record
                    .fields
                    .get(field)
                    .filter(|v| !v.is_null())
                    .map(|v| (field.to_string(), v.clone()))
            })
            .collect()
    }

    /// Index records by natural key
    ///
    /// Records without a key are skipped. A key seen twice is fatal.
    fn index<'r>(&self, records: &'r [Record], env: &str) -> Result<HashMap<&'r str, &'r Record>> {
        let mut index = HashMap::with_capacity(records.len());
        for record in records {
            let key = match record.text(self.key) {
                Some(key) if !key.is_empty() => key,
                _ => {
                    warn!(table = %self.table, env, id = %record.id, "skipping record without {}", self.key);
                    continue;
                }
            };
            if index.insert(key, record).is_some() {
                return Err(Error::malformed(self.table, key));
            }
        }
        Ok(index)
    }
}

/// Outcome for one table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableReport {
    pub table: String,
    /// PROD ids created by the create pass
    pub created_ids: Vec<RecordId>,
    /// PROD ids written by the update pass
    pub updated_ids: Vec<RecordId>,
    /// Natural keys of the updated records, same order as `updated_ids`
    pub updated_names: Vec<String>,
}

/// Outcome of a full mirror run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorReport {
    /// PROD ids created across all tables
    pub new_ids: Vec<RecordId>,
    pub updated_product_ids: Vec<RecordId>,
    pub updated_store_ids: Vec<RecordId>,
    pub tables: Vec<TableReport>,
}

impl MirrorReport {
    fn push(&mut self, table: Table, report: TableReport) {
        self.new_ids.extend(report.created_ids.iter().cloned());
        match table {
            Table::Product => self.updated_product_ids.extend(report.updated_ids.iter().cloned()),
            Table::Store => self.updated_store_ids.extend(report.updated_ids.iter().cloned()),
            _ => {}
        }
        self.tables.push(report);
    }

    /// Report for one table, if it was mirrored
    pub fn table(&self, table: Table) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == table.name())
    }
}

/// Dev→Prod mirror
pub struct DevProdMirror {
    dev: Arc<dyn RecordStore>,
    prod: Arc<dyn RecordStore>,
    tables: Vec<MirrorTable>,
}

impl DevProdMirror {
    /// Mirror Product then Store with the whitelists from `config`
    pub fn new(
        dev: Arc<dyn RecordStore>,
        prod: Arc<dyn RecordStore>,
        config: &MirrorConfig,
    ) -> Result<Self> {
        let tables = vec![
            MirrorTable::new(Table::Product, config.product_fields.clone())?,
            MirrorTable::new(Table::Store, config.store_fields.clone())?,
        ];
        Ok(Self::with_tables(dev, prod, tables))
    }

    /// Mirror an explicit list of tables, in order
    pub fn with_tables(
        dev: Arc<dyn RecordStore>,
        prod: Arc<dyn RecordStore>,
        tables: Vec<MirrorTable>,
    ) -> Self {
        Self { dev, prod, tables }
    }

    /// Run both passes over every table
    pub async fn mirror_dev_to_prod(&self) -> Response<MirrorReport> {
        self.run().await.into()
    }

    /// Run both passes over every table, stopping at the first error
    pub async fn run(&self) -> Result<MirrorReport> {
        let mut report = MirrorReport::default();
        for table in &self.tables {
            let table_report = self.mirror_table(table).await?;
            info!(
                table = %table.table,
                created = table_report.created_ids.len(),
                updated = table_report.updated_ids.len(),
                "mirrored table"
            );
            report.push(table.table, table_report);
        }
        Ok(report)
    }

    async fn mirror_table(&self, table: &MirrorTable) -> Result<TableReport> {
        let dev_records = self.dev.get_all(table.table, None, &[]).await?;
        let dev = table.index(&dev_records, "dev")?;

        let created_ids = self.create_missing(table, &dev_records, &dev).await?;
        let (updated_ids, updated_names) = self.update_matched(table, &dev_records, &dev).await?;

        Ok(TableReport {
            table: table.table.name().to_string(),
            created_ids,
            updated_ids,
            updated_names,
        })
    }

    async fn create_missing(
        &self,
        table: &MirrorTable,
        dev_records: &[Record],
        dev: &HashMap<&str, &Record>,
    ) -> Result<Vec<RecordId>> {
        let prod_records = self.prod.get_all(table.table, None, &[]).await?;
        let prod = table.index(&prod_records, "prod")?;

        // walk DEV in fetch order so creates are deterministic
        let missing: Vec<Fields> = dev_records
            .iter()
            .filter(|record| {
                record
                    .text(table.key)
                    .is_some_and(|key| dev.contains_key(key) && !prod.contains_key(key))
            })
            .map(|record| table.project(record))
            .collect();

        if missing.is_empty() {
            debug!(table = %table.table, "nothing missing in prod");
            return Ok(Vec::new());
        }
        self.prod.create_many(table.table, missing).await
    }

    async fn update_matched(
        &self,
        table: &MirrorTable,
        dev_records: &[Record],
        dev: &HashMap<&str, &Record>,
    ) -> Result<(Vec<RecordId>, Vec<String>)> {
        let prod_records = self.prod.get_all(table.table, None, &[]).await?;
        let prod = table.index(&prod_records, "prod")?;

        let mut names = Vec::new();
        let mut updates = Vec::new();
        for record in dev_records {
            let Some(key) = record.text(table.key).filter(|key| dev.contains_key(key)) else {
                continue;
            };
            let Some(target) = prod.get(key) else {
                warn!(table = %table.table, key, "no prod match after create pass");
                continue;
            };
            names.push(key.to_string());
            updates.push((target.id.clone(), table.project(record)));
        }

        if updates.is_empty() {
            return Ok((Vec::new(), names));
        }
        let ids = self.prod.update_many(table.table, updates).await?;
        Ok((ids, names))
    }
}
