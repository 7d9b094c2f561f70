// # Streaming Library Trait
//
// Defines the interface the core needs from a music-streaming service:
// read the signed-in account, its saved tracks and playlists, and create a
// playlist seeded with tracks.
//
// ## Implementations
//
// - Spotify Web API: `tunesync-library-spotify` crate
//
// Token exchange and refresh happen before a client is built; the core
// only ever sees an already-authorized client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The account the client is authorized for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryUser {
    /// Service account id; used as the record store username
    pub external_id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

/// A track as the streaming service reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryTrack {
    pub name: String,
    /// Contributing artist names in service order
    pub artists: Vec<String>,
    pub album: String,
    /// Track id; `None` for local files that have no catalog entry
    pub external_id: Option<String>,
    /// Playable reference (e.g. `spotify:track:...`)
    pub uri: String,
    /// When the track was saved to the library or added to the playlist
    pub saved_at: Option<DateTime<Utc>>,
}

/// A playlist read from the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryPlaylist {
    pub name: String,
    pub external_id: String,
    pub tracks: Vec<LibraryTrack>,
}

/// Offset pagination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: usize,
    pub offset: usize,
}

impl Pagination {
    /// First page of the given size
    pub fn first(limit: usize) -> Self {
        Self { limit, offset: 0 }
    }

    /// The page after this one
    pub fn next(self) -> Self {
        Self {
            limit: self.limit,
            offset: self.offset + self.limit,
        }
    }
}

/// Options for a playlist created by the core
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistOptions {
    pub public: bool,
    pub description: String,
}

/// Trait for streaming library clients
///
/// Implementations are single-shot per call: no retries, no caching, no
/// background tasks. A failure maps to `Error::UpstreamUnavailable`.
#[async_trait]
pub trait StreamingLibrary: Send + Sync {
    /// The account this client is authorized for
    async fn current_user(&self) -> Result<LibraryUser, crate::Error>;

    /// One page of the account's saved tracks, most recently saved first
    async fn saved_tracks(&self, page: Pagination) -> Result<Vec<LibraryTrack>, crate::Error>;

    /// A playlist and all of its tracks
    async fn playlist(&self, external_id: &str) -> Result<LibraryPlaylist, crate::Error>;

    /// Create an empty playlist owned by `owner`; returns its external id
    async fn create_playlist(
        &self,
        owner: &str,
        name: &str,
        options: &PlaylistOptions,
    ) -> Result<String, crate::Error>;

    /// Append tracks to a playlist
    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<(), crate::Error>;

    /// Get the library name (for logging/debugging)
    fn library_name(&self) -> &'static str;
}

/// Helper trait for constructing streaming library clients from configuration
pub trait StreamingLibraryFactory: Send + Sync {
    /// Create a StreamingLibrary instance from configuration
    fn create(
        &self,
        config: &crate::config::LibraryConfig,
    ) -> Result<Box<dyn StreamingLibrary>, crate::Error>;
}
