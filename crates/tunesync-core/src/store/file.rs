// # File Record Store
//
// JSON-snapshot implementation of RecordStore with crash recovery.
//
// ## Purpose
//
// A persistent local store for running the CLI without an Airtable base,
// and for keeping a snapshot of a mirror target.
//
// ## Crash Recovery
//
// - Every mutation rewrites the snapshot: temp file, then rename
// - The previous snapshot is kept as `.backup`
// - A snapshot that fails to parse is replaced by its backup on open
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "next_id": 2,
//   "records": {
//     "User": [
//       { "id": "rec00000000000001", "fields": { "username": "alice" } }
//     ]
//   }
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, error, info, trace, warn};

use super::memory::{Tables, reject_filter};
use crate::Error;
use crate::config::StoreConfig;
use crate::model::{Fields, Record, RecordId};
use crate::schema::Table;
use crate::traits::{RecordStore, RecordStoreFactory, Sort};

/// Snapshot format version
const SNAPSHOT_VERSION: &str = "1.0";

/// Serializable snapshot
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: String,
    #[serde(flatten)]
    tables: Tables,
}

/// File-backed record store
///
/// # Example
///
/// ```rust,no_run
/// use tunesync_core::store::FileRecordStore;
/// use tunesync_core::{RecordStore, Table};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileRecordStore::open("/var/lib/tunesync/records.json").await?;
///     let songs = store.get_all(Table::Song, None, &[]).await?;
///     println!("{} songs", songs.len());
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileRecordStore {
    path: PathBuf,
    tables: Arc<RwLock<Tables>>,
}

impl FileRecordStore {
    /// Open a snapshot, creating parent directories if needed
    ///
    /// A missing file starts an empty store. A corrupted file is recovered
    /// from its backup; if that fails too, the store starts empty.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create store directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let tables = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            tables: Arc::new(RwLock::new(tables)),
        })
    }

    async fn load_with_recovery(path: &Path) -> Result<Tables, Error> {
        match Self::load(path).await {
            Ok(tables) => Ok(tables),
            Err(Error::Json(e)) => {
                warn!(
                    "Record snapshot {} is corrupted: {}. Attempting recovery from backup.",
                    path.display(),
                    e
                );

                let backup = Self::backup_path(path);
                if !backup.exists() {
                    warn!("No backup snapshot found. Starting with an empty store.");
                    return Ok(Tables::default());
                }

                match Self::load(&backup).await {
                    Ok(tables) => {
                        info!("Recovered record snapshot from backup");
                        if let Err(restore_err) = fs::copy(&backup, path).await {
                            error!("Failed to restore snapshot from backup: {}", restore_err);
                        }
                        Ok(tables)
                    }
                    Err(backup_err) => {
                        error!(
                            "Backup snapshot also unreadable: {}. Starting with an empty store.",
                            backup_err
                        );
                        Ok(Tables::default())
                    }
                }
            }
            Err(other) => Err(other),
        }
    }

    async fn load(path: &Path) -> Result<Tables, Error> {
        if !path.exists() {
            debug!("Record snapshot does not exist yet: {}", path.display());
            return Ok(Tables::default());
        }

        let content = fs::read_to_string(path).await?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;

        if snapshot.version != SNAPSHOT_VERSION {
            warn!(
                "Record snapshot version mismatch: expected {}, got {}. Loading anyway.",
                SNAPSHOT_VERSION, snapshot.version
            );
        }

        Ok(snapshot.tables)
    }

    /// Write `tables` to disk atomically
    async fn persist(&self, tables: &Tables) -> Result<(), Error> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION.to_string(),
            tables: tables.clone(),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;

        let temp = self.temp_path();
        {
            let mut file = fs::File::create(&temp).await?;
            file.write_all(json.as_bytes()).await?;
            file.flush().await?;
        }

        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await {
                warn!("Failed to back up record snapshot: {}", e);
            }
        }

        fs::rename(&temp, &self.path).await?;
        trace!("Record snapshot written: {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn create(&self, table: Table, fields: Fields) -> Result<RecordId, Error> {
        let mut tables = self.tables.write().await;
        let id = tables.create(table, fields);
        self.persist(&tables).await?;
        Ok(id)
    }

    async fn update(
        &self,
        table: Table,
        id: &RecordId,
        updates: Fields,
    ) -> Result<RecordId, Error> {
        let mut tables = self.tables.write().await;
        let id = tables.update(table, id, updates)?;
        self.persist(&tables).await?;
        Ok(id)
    }

    async fn get_by_attribute(
        &self,
        table: Table,
        attribute: &str,
        value: &str,
        sort: &[Sort],
    ) -> Result<Vec<Record>, Error> {
        Ok(self.tables.read().await.find(table, attribute, value, sort))
    }

    async fn get_all(
        &self,
        table: Table,
        filter: Option<&str>,
        sort: &[Sort],
    ) -> Result<Vec<Record>, Error> {
        reject_filter(filter, "file")?;
        Ok(self.tables.read().await.all(table, sort))
    }

    async fn create_many(
        &self,
        table: Table,
        records: Vec<Fields>,
    ) -> Result<Vec<RecordId>, Error> {
        let mut tables = self.tables.write().await;
        let ids = records
            .into_iter()
            .map(|fields| tables.create(table, fields))
            .collect();
        self.persist(&tables).await?;
        Ok(ids)
    }

    fn store_name(&self) -> &'static str {
        "file"
    }
}

/// Factory for creating file record stores
pub struct FileRecordStoreFactory;

#[async_trait]
impl RecordStoreFactory for FileRecordStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Box<dyn RecordStore>, Error> {
        match config {
            StoreConfig::File { path } => Ok(Box::new(FileRecordStore::open(path).await?)),
            other => Err(Error::config(format!(
                "File store factory cannot build a '{}' store",
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn user(name: &str) -> Fields {
        json!({ "username": name }).as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.json");

        let store = FileRecordStore::open(&path).await.unwrap();
        let id = store.create(Table::User, user("alice")).await.unwrap();
        assert!(path.exists());

        let reopened = FileRecordStore::open(&path).await.unwrap();
        let users = reopened
            .get_by_attribute(Table::User, "username", "alice", &[])
            .await
            .unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, id);

        let next = reopened.create(Table::User, user("bob")).await.unwrap();
        assert_ne!(next, id);
    }

    #[tokio::test]
    async fn corrupted_snapshot_recovers_previous_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.json");

        let store = FileRecordStore::open(&path).await.unwrap();
        store.create(Table::User, user("alice")).await.unwrap();
        // second write leaves the first snapshot as backup
        store.create(Table::User, user("bob")).await.unwrap();
        assert!(FileRecordStore::backup_path(&path).exists());

        fs::write(&path, b"corrupted json data").await.unwrap();

        let recovered = FileRecordStore::open(&path).await.unwrap();
        let users = recovered.get_all(Table::User, None, &[]).await.unwrap();
        let names: Vec<&str> = users.iter().filter_map(|r| r.text("username")).collect();
        assert_eq!(names, vec!["alice"]);
    }

    #[tokio::test]
    async fn create_many_writes_once_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("records.json");

        let store = FileRecordStore::open(&path).await.unwrap();
        let ids = store
            .create_many(Table::User, vec![user("a"), user("b"), user("c")])
            .await
            .unwrap();
        assert_eq!(ids.len(), 3);

        let all = FileRecordStore::open(&path)
            .await
            .unwrap()
            .get_all(Table::User, None, &[])
            .await
            .unwrap();
        let stored: Vec<RecordId> = all.into_iter().map(|r| r.id).collect();
        assert_eq!(stored, ids);
    }
}
