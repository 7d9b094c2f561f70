//! Test doubles and common utilities for contract tests
//!
//! - [`CountingStore`]: memory store wrapper that counts calls, records
//!   create payloads, can be told to fail specific writes and can emulate
//!   formula columns
//! - [`ScriptedLibrary`]: streaming library serving a fixed account, a
//!   saved-track list and playlists, recording every write

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tunesync_core::error::{Error, Result};
use tunesync_core::traits::{
    LibraryPlaylist, LibraryTrack, LibraryUser, Pagination, PlaylistOptions, Sort,
};
use tunesync_core::{Fields, MemoryRecordStore, Record, RecordId, RecordStore, StreamingLibrary, Table};

/// Build a field map from a JSON object literal
pub fn fields(value: Value) -> Fields {
    value.as_object().cloned().unwrap_or_default()
}

/// Midnight UTC on the given day
pub fn day(year: i32, month: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, d, 0, 0, 0).unwrap()
}

/// A catalog track saved at `saved_at`
pub fn track(id: &str, saved_at: Option<DateTime<Utc>>) -> LibraryTrack {
    LibraryTrack {
        name: format!("Track {id}"),
        artists: vec!["Second Artist".into(), "First Artist".into()],
        album: "Album".into(),
        external_id: Some(id.into()),
        uri: format!("spotify:track:{id}"),
        saved_at,
    }
}

/// Computes a formula column from a record's stored fields
pub type Formula = fn(&Fields) -> Option<Value>;

/// A call-counting record store over [`MemoryRecordStore`]
#[derive(Clone, Default)]
pub struct CountingStore {
    pub inner: MemoryRecordStore,
    creates: Arc<AtomicUsize>,
    updates: Arc<AtomicUsize>,
    lookups: Arc<AtomicUsize>,
    /// (field, value) pairs whose create fails
    failing: Arc<Mutex<Vec<(String, String)>>>,
    /// Tables whose updates fail
    failing_updates: Arc<Mutex<Vec<Table>>>,
    /// Field maps as handed to `create`, in call order
    payloads: Arc<Mutex<Vec<(Table, Fields)>>>,
    formulas: Arc<Mutex<Vec<(Table, &'static str, Formula)>>>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any create whose fields carry `field == value`
    pub fn fail_create_when(&self, field: &str, value: &str) {
        self.failing
            .lock()
            .unwrap()
            .push((field.to_string(), value.to_string()));
    }

    /// Fail every update against `table`
    pub fn fail_updates_on(&self, table: Table) {
        self.failing_updates.lock().unwrap().push(table);
    }

    /// Recompute `field` after every write to `table`, like a store formula
    pub fn with_formula(self, table: Table, field: &'static str, formula: Formula) -> Self {
        self.formulas.lock().unwrap().push((table, field, formula));
        self
    }

    /// Field maps passed to `create` for `table`, before formulas ran
    pub fn create_payloads(&self, table: Table) -> Vec<Fields> {
        self.payloads
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| *t == table)
            .map(|(_, fields)| fields.clone())
            .collect()
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Snapshot of a table, in insertion order
    pub async fn records(&self, table: Table) -> Vec<Record> {
        self.inner.get_all(table, None, &[]).await.unwrap()
    }

    fn should_fail(&self, fields: &Fields) -> bool {
        self.failing
            .lock()
            .unwrap()
            .iter()
            .any(|(field, value)| fields.get(field).and_then(Value::as_str) == Some(value))
    }

    async fn recompute(&self, table: Table, id: &RecordId) -> Result<()> {
        let formulas: Vec<(&'static str, Formula)> = self
            .formulas
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _, _)| *t == table)
            .map(|(_, field, formula)| (*field, *formula))
            .collect();
        if formulas.is_empty() {
            return Ok(());
        }
        let Some(record) = self.inner.get(table, id).await else {
            return Ok(());
        };
        let computed: Fields = formulas
            .into_iter()
            .filter_map(|(field, formula)| formula(&record.fields).map(|v| (field.to_string(), v)))
            .collect();
        self.inner.update(table, id, computed).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn create(&self, table: Table, fields: Fields) -> Result<RecordId> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push((table, fields.clone()));
        if self.should_fail(&fields) {
            return Err(Error::upstream("counting", format!("injected {table} create failure")));
        }
        let id = self.inner.create(table, fields).await?;
        self.recompute(table, &id).await?;
        Ok(id)
    }

    async fn update(&self, table: Table, id: &RecordId, updates: Fields) -> Result<RecordId> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.failing_updates.lock().unwrap().contains(&table) {
            return Err(Error::upstream("counting", format!("injected {table} update failure")));
        }
        let id = self.inner.update(table, id, updates).await?;
        self.recompute(table, &id).await?;
        Ok(id)
    }

    async fn get_by_attribute(
        &self,
        table: Table,
        attribute: &str,
        value: &str,
        sort: &[Sort],
    ) -> Result<Vec<Record>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.get_by_attribute(table, attribute, value, sort).await
    }

    async fn get_all(&self, table: Table, filter: Option<&str>, sort: &[Sort]) -> Result<Vec<Record>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.get_all(table, filter, sort).await
    }

    fn store_name(&self) -> &'static str {
        "counting"
    }
}

/// Playlist created through [`ScriptedLibrary`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPlaylist {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub options: PlaylistOptions,
    pub uris: Vec<String>,
}

/// A streaming library with fixed contents
#[derive(Clone)]
pub struct ScriptedLibrary {
    user: LibraryUser,
    /// Saved tracks, newest first
    saved: Vec<LibraryTrack>,
    playlists: HashMap<String, LibraryPlaylist>,
    pages_served: Arc<AtomicUsize>,
    created: Arc<Mutex<Vec<CreatedPlaylist>>>,
}

impl ScriptedLibrary {
    pub fn new(username: &str) -> Self {
        Self {
            user: LibraryUser {
                external_id: username.into(),
                display_name: Some(format!("{username} display")),
                email: Some(format!("{username}@example.org")),
            },
            saved: Vec::new(),
            playlists: HashMap::new(),
            pages_served: Arc::new(AtomicUsize::new(0)),
            created: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Saved tracks, newest first
    pub fn with_saved(mut self, tracks: Vec<LibraryTrack>) -> Self {
        self.saved = tracks;
        self
    }

    pub fn with_playlist(mut self, id: &str, name: &str, tracks: Vec<LibraryTrack>) -> Self {
        self.playlists.insert(
            id.into(),
            LibraryPlaylist {
                name: name.into(),
                external_id: id.into(),
                tracks,
            },
        );
        self
    }

    pub fn pages_served(&self) -> usize {
        self.pages_served.load(Ordering::SeqCst)
    }

    /// Playlists created so far
    pub fn created(&self) -> Vec<CreatedPlaylist> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl StreamingLibrary for ScriptedLibrary {
    async fn current_user(&self) -> Result<LibraryUser> {
        Ok(self.user.clone())
    }

    async fn saved_tracks(&self, page: Pagination) -> Result<Vec<LibraryTrack>> {
        self.pages_served.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .saved
            .iter()
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect())
    }

    async fn playlist(&self, external_id: &str) -> Result<LibraryPlaylist> {
        self.playlists
            .get(external_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("playlist {external_id}")))
    }

    async fn create_playlist(&self, owner: &str, name: &str, options: &PlaylistOptions) -> Result<String> {
        let mut created = self.created.lock().unwrap();
        let id = format!("pl{}", created.len() + 1);
        created.push(CreatedPlaylist {
            id: id.clone(),
            owner: owner.into(),
            name: name.into(),
            options: options.clone(),
            uris: Vec::new(),
        });
        Ok(id)
    }

    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let mut created = self.created.lock().unwrap();
        let playlist = created
            .iter_mut()
            .find(|p| p.id == playlist_id)
            .ok_or_else(|| Error::not_found(format!("playlist {playlist_id}")))?;
        playlist.uris.extend(uris.iter().cloned());
        Ok(())
    }

    fn library_name(&self) -> &'static str {
        "scripted"
    }
}
