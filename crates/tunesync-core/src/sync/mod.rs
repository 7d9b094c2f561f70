//! Library sync orchestrator
//!
//! Imports tracks from the streaming library into the record store, files
//! them under a playlist, and links songs and playlist to the owning user.
//!
//! ## State Machine
//!
//! ```text
//! Unauthorized ─► Validated ─► SongsResolved ─► PlaylistCreated ─► LinksMerged ─► Persisted
//!       │              │              │                 │                │
//!       └──────────────┴──────────────┴─────────────────┴────────────────┴─► Failed(reason)
//! ```
//!
//! 1. Session identity must match the requested username
//! 2. Every song resolves through the upsert resolver, concurrently; one
//!    failure fails the step before any playlist exists
//! 3. Playlist created (streaming service and/or record store)
//! 4. Song and playlist ids merged into the user's link fields
//! 5. One update writes both link fields back
//!
//! There is no rollback. A failure after step 3 leaves the playlist behind;
//! its ids are logged when that happens.

pub mod window;

pub use window::DateWindow;

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::merge::merge_links;
use crate::model::{Fields, LinkSet, NewPlaylist, NewUser, Record, RecordId, Song};
use crate::resolver::resolve_entity;
use crate::response::Response;
use crate::schema::Table;
use crate::session::Session;
use crate::traits::{LibraryTrack, Pagination, PlaylistOptions, RecordStore, StreamingLibrary};
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Link field holding a user's songs
const USER_SONGS: &str = "songIds";
/// Link field holding a user's playlists
const USER_PLAYLISTS: &str = "playlistIds";

/// State of one sync invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Unauthorized,
    Validated,
    SongsResolved { songs: usize },
    PlaylistCreated { playlist_id: RecordId },
    LinksMerged,
    Persisted,
    Failed { reason: String },
}

impl SyncState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncState::Persisted | SyncState::Failed { .. })
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Unauthorized => f.write_str("unauthorized"),
            SyncState::Validated => f.write_str("validated"),
            SyncState::SongsResolved { songs } => write!(f, "songs resolved ({songs})"),
            SyncState::PlaylistCreated { playlist_id } => {
                write!(f, "playlist created ({playlist_id})")
            }
            SyncState::LinksMerged => f.write_str("links merged"),
            SyncState::Persisted => f.write_str("persisted"),
            SyncState::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Which workflow a sync event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOperation {
    /// Saved tracks in a date window → new playlist
    SyncLibrary,
    /// Existing streaming playlist → playlist record
    ImportPlaylist,
}

/// State transition emitted by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEvent {
    pub operation: SyncOperation,
    pub username: String,
    pub state: SyncState,
}

/// Result data of `ensure_user_exists`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSync {
    pub username: String,
    pub airtable_id: RecordId,
    pub created: bool,
}

/// Result data of a playlist-producing sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSync {
    pub username: String,
    /// Playlist record id
    pub playlist_id: RecordId,
    /// Playlist id in the streaming service
    pub external_playlist_id: String,
    /// Song record ids, in track order
    pub song_ids: Vec<RecordId>,
}

/// Bookkeeping for one invocation
struct SyncRun<'a> {
    sync: &'a LibrarySync,
    operation: SyncOperation,
    username: String,
    state: SyncState,
    external_playlist: Option<String>,
    playlist_record: Option<RecordId>,
}

impl<'a> SyncRun<'a> {
    fn new(sync: &'a LibrarySync, operation: SyncOperation, username: &str) -> Self {
        Self {
            sync,
            operation,
            username: username.to_string(),
            state: SyncState::Unauthorized,
            external_playlist: None,
            playlist_record: None,
        }
    }

    fn advance(&mut self, state: SyncState) {
        info!(username = %self.username, operation = ?self.operation, "sync: {} -> {}", self.state, state);
        self.state = state.clone();
        self.sync.emit_event(SyncEvent {
            operation: self.operation,
            username: self.username.clone(),
            state,
        });
    }

    fn fail(&mut self, err: &Error) {
        error!(username = %self.username, operation = ?self.operation, "sync failed in state {}: {}", self.state, err);
        if self.external_playlist.is_some() || self.playlist_record.is_some() {
            warn!(
                username = %self.username,
                external_playlist = ?self.external_playlist,
                playlist_record = ?self.playlist_record,
                "playlist left orphaned by failed sync"
            );
        }
        self.advance(SyncState::Failed {
            reason: err.to_string(),
        });
    }

    /// Fold the outcome into a response, moving to `Failed` on error
    fn conclude<T>(mut self, result: Result<T>) -> Response<T> {
        if let Err(err) = &result {
            self.fail(err);
        }
        result.into()
    }
}

/// Library sync orchestrator
///
/// Stateless between invocations; the caller's [`Session`] is the only
/// identity an invocation sees. Safe to share across tasks.
pub struct LibrarySync {
    store: Arc<dyn RecordStore>,
    library: Arc<dyn StreamingLibrary>,
    config: SyncConfig,
    event_tx: mpsc::Sender<SyncEvent>,
}

impl LibrarySync {
    /// Create a new orchestrator
    ///
    /// # Returns
    ///
    /// A tuple of (orchestrator, event_receiver) where event_receiver yields
    /// every state transition
    pub fn new(
        store: Arc<dyn RecordStore>,
        library: Arc<dyn StreamingLibrary>,
        config: SyncConfig,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let sync = Self {
            store,
            library,
            config,
            event_tx: tx,
        };

        Ok((sync, rx))
    }

    /// Create the user record for the signed-in account if it is missing
    pub async fn ensure_user_exists(&self, session: &Session, username: &str) -> Response<UserSync> {
        self.try_ensure_user_exists(session, username).await.into()
    }

    /// Import saved tracks from `[start, end)` into a new playlist
    ///
    /// Dates are `YYYY.MM.DD` strings.
    pub async fn sync_library_to_playlist(
        &self,
        session: &Session,
        username: &str,
        start: &str,
        end: &str,
    ) -> Response<PlaylistSync> {
        let mut run = SyncRun::new(self, SyncOperation::SyncLibrary, username);
        let result = match DateWindow::parse(start, end) {
            Ok(window) => self.run_library_sync(&mut run, session, &window).await,
            Err(err) => Err(err),
        };
        run.conclude(result)
    }

    /// Import saved tracks from a parsed window into a new playlist
    pub async fn sync_window(
        &self,
        session: &Session,
        username: &str,
        window: &DateWindow,
    ) -> Response<PlaylistSync> {
        let mut run = SyncRun::new(self, SyncOperation::SyncLibrary, username);
        let result = self.run_library_sync(&mut run, session, window).await;
        run.conclude(result)
    }

    /// Record an existing streaming playlist and link it to the user
    pub async fn import_existing_playlist(
        &self,
        session: &Session,
        username: &str,
        playlist_id: &str,
    ) -> Response<PlaylistSync> {
        let mut run = SyncRun::new(self, SyncOperation::ImportPlaylist, username);
        let result = self.run_playlist_import(&mut run, session, playlist_id).await;
        run.conclude(result)
    }

    async fn try_ensure_user_exists(&self, session: &Session, username: &str) -> Result<UserSync> {
        session.authorize(username)?;

        let me = self.library.current_user().await?;
        if me.external_id != username {
            return Err(Error::forbidden(me.external_id, username));
        }

        let resolution = resolve_entity(self.store.as_ref(), &NewUser::from(&me)).await?;
        if resolution.created {
            info!(username, id = %resolution.id, "created user record");
        }

        Ok(UserSync {
            username: username.to_string(),
            airtable_id: resolution.id,
            created: resolution.created,
        })
    }

    async fn run_library_sync(
        &self,
        run: &mut SyncRun<'_>,
        session: &Session,
        window: &DateWindow,
    ) -> Result<PlaylistSync> {
        session.authorize(&run.username)?;
        run.advance(SyncState::Validated);

        let tracks = self.saved_tracks_in(window).await?;
        let songs = distinct_songs(&tracks);
        if songs.is_empty() {
            return Err(Error::invalid_input(format!(
                "no saved tracks between {} and {}",
                window.start_label(),
                window.end_label()
            )));
        }
        let song_ids = self.resolve_songs(&songs).await?;
        run.advance(SyncState::SongsResolved {
            songs: song_ids.len(),
        });

        let user = self.find_user(&run.username).await?;

        let options = PlaylistOptions {
            public: self.config.playlist_public,
            description: format!(
                "songs saved between {} and {}.",
                window.start_label(),
                window.end_label()
            ),
        };
        let external_id = self
            .library
            .create_playlist(&run.username, window.end_label(), &options)
            .await?;
        run.external_playlist = Some(external_id.clone());

        let uris: Vec<String> = songs.iter().map(|s| s.uri.clone()).collect();
        self.library.add_tracks(&external_id, &uris).await?;

        self.finish(run, user, window.end_label(), external_id, song_ids)
            .await
    }

    async fn run_playlist_import(
        &self,
        run: &mut SyncRun<'_>,
        session: &Session,
        playlist_id: &str,
    ) -> Result<PlaylistSync> {
        session.authorize(&run.username)?;
        run.advance(SyncState::Validated);

        let playlist = self.library.playlist(playlist_id).await?;
        let songs = distinct_songs(&playlist.tracks);
        let song_ids = self.resolve_songs(&songs).await?;
        run.advance(SyncState::SongsResolved {
            songs: song_ids.len(),
        });

        let user = self.find_user(&run.username).await?;
        self.finish(run, user, &playlist.name, playlist.external_id, song_ids)
            .await
    }

    /// Steps shared by both workflows once songs are resolved
    async fn finish(
        &self,
        run: &mut SyncRun<'_>,
        user: Record,
        name: &str,
        external_id: String,
        song_ids: Vec<RecordId>,
    ) -> Result<PlaylistSync> {
        let new_songs: LinkSet = song_ids.iter().cloned().collect();

        let playlist = NewPlaylist {
            name: name.to_string(),
            spotify_id: external_id.clone(),
            song_ids: new_songs.clone(),
            user_id: user.id.clone(),
        };
        let playlist_id = self.store.create(Table::Playlist, playlist.to_fields()).await?;
        run.playlist_record = Some(playlist_id.clone());
        run.advance(SyncState::PlaylistCreated {
            playlist_id: playlist_id.clone(),
        });

        let songs = merge_links(&user, &new_songs, USER_SONGS);
        let new_playlist: LinkSet = std::iter::once(playlist_id.clone()).collect();
        let playlists = merge_links(&user, &new_playlist, USER_PLAYLISTS);
        run.advance(SyncState::LinksMerged);

        let mut updates = Fields::new();
        updates.insert(USER_SONGS.into(), songs.to_value());
        updates.insert(USER_PLAYLISTS.into(), playlists.to_value());
        self.store.update(Table::User, &user.id, updates).await?;
        run.advance(SyncState::Persisted);

        Ok(PlaylistSync {
            username: run.username.clone(),
            playlist_id,
            external_playlist_id: external_id,
            song_ids,
        })
    }

    /// Walk saved-track pages, newest first, keeping tracks inside `window`
    async fn saved_tracks_in(&self, window: &DateWindow) -> Result<Vec<LibraryTrack>> {
        let mut page = Pagination::first(self.config.page_size);
        let mut kept = Vec::new();

        for _ in 0..self.config.max_pages {
            let tracks = self.library.saved_tracks(page).await?;
            let fetched = tracks.len();
            let mut passed_window = false;

            for track in tracks {
                match track.saved_at {
                    Some(at) if window.contains(at) => kept.push(track),
                    Some(at) if window.is_before(at) => passed_window = true,
                    _ => {}
                }
            }

            if fetched < page.limit || passed_window {
                break;
            }
            page = page.next();
        }

        debug!(
            tracks = kept.len(),
            start = %window.start(),
            end = %window.end(),
            "saved tracks in window"
        );
        Ok(kept)
    }

    /// Resolve every song concurrently; all must succeed
    async fn resolve_songs(&self, songs: &[Song]) -> Result<Vec<RecordId>> {
        let store = self.store.as_ref();
        let results = join_all(songs.iter().map(|song| resolve_entity(store, song))).await;

        let total = results.len();
        let mut ids = Vec::with_capacity(total);
        let mut failed = 0;
        for (song, result) in songs.iter().zip(results) {
            match result {
                Ok(resolution) => ids.push(resolution.id),
                Err(err) => {
                    failed += 1;
                    error!(spotify_id = %song.spotify_id, "song resolution failed: {}", err);
                }
            }
        }

        if failed > 0 {
            return Err(Error::PartialSongFailure { failed, total });
        }
        Ok(ids)
    }

    /// The user's record; exactly one must exist
    async fn find_user(&self, username: &str) -> Result<Record> {
        let mut users = self
            .store
            .get_by_attribute(Table::User, "username", username, &[])
            .await?;
        match users.len() {
            0 => Err(Error::not_found(format!(
                "no user record for '{username}'; create the user first"
            ))),
            1 => Ok(users.remove(0)),
            _ => Err(Error::malformed(Table::User, username)),
        }
    }

    /// Emit a sync event
    fn emit_event(&self, event: SyncEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Sync event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Sync event receiver dropped");
            }
        }
    }
}

/// Project tracks to songs, keeping the first occurrence of each track id
///
/// Concurrent resolutions must target distinct natural keys, otherwise two
/// of them could both see zero matches and both create.
fn distinct_songs(tracks: &[LibraryTrack]) -> Vec<Song> {
    let mut seen = HashSet::new();
    tracks
        .iter()
        .filter_map(|track| {
            let song = Song::from_track(track);
            if song.is_none() {
                warn!(name = %track.name, "skipping track without id");
            }
            song
        })
        .filter(|song| seen.insert(song.spotify_id.clone()))
        .collect()
}
