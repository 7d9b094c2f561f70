// # Spotify Streaming Library
//
// StreamingLibrary implementation over the Spotify Web API.
//
// ## Scope
//
// The client is handed an already-issued OAuth access token. Token exchange
// and refresh happen outside this crate; an expired token surfaces as
// `Error::Unauthenticated`.
//
// ## API Reference
//
// - Current user:     GET  `/v1/me`
// - Saved tracks:     GET  `/v1/me/tracks?limit=..&offset=..`
// - Playlist:         GET  `/v1/playlists/{id}` (tracks paged via `next`)
// - Create playlist:  POST `/v1/users/{owner}/playlists`
// - Add tracks:       POST `/v1/playlists/{id}/tracks` (at most 100 per request)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tunesync_core::config::LibraryConfig;
use tunesync_core::traits::{
    LibraryPlaylist, LibraryTrack, LibraryUser, Pagination, PlaylistOptions, StreamingLibrary,
    StreamingLibraryFactory,
};
use tunesync_core::{ClientRegistry, Error, Result};

/// Spotify Web API base URL
const SPOTIFY_API_BASE: &str = "https://api.spotify.com";

/// Default HTTP timeout for API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// URIs per add-tracks request
const MAX_TRACKS_PER_REQUEST: usize = 100;

/// Spotify Web API client
///
/// # Security
///
/// The Debug implementation does NOT expose the access token.
pub struct SpotifyLibrary {
    /// OAuth access token
    /// ⚠️ NEVER log this value
    access_token: String,

    /// API root, without trailing slash
    api_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl std::fmt::Debug for SpotifyLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyLibrary")
            .field("access_token", &"<REDACTED>")
            .field("api_url", &self.api_url)
            .finish()
    }
}

// Wire shapes, reduced to the fields used

#[derive(Debug, Deserialize)]
struct UserObject {
    id: String,
    display_name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Paging<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    next: Option<String>,
}

/// Saved-track and playlist-track items share this shape
#[derive(Debug, Deserialize)]
struct TrackItem {
    added_at: Option<DateTime<Utc>>,
    track: Option<TrackObject>,
}

#[derive(Debug, Deserialize)]
struct TrackObject {
    id: Option<String>,
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    artists: Vec<NamedObject>,
    album: Option<NamedObject>,
}

#[derive(Debug, Deserialize)]
struct NamedObject {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistObject {
    id: String,
    name: String,
    tracks: Paging<TrackItem>,
}

#[derive(Debug, Deserialize)]
struct CreatedObject {
    id: String,
}

/// Items whose track was removed from the catalog come back as `null`
fn track_from(item: TrackItem) -> Option<LibraryTrack> {
    let track = item.track?;
    Some(LibraryTrack {
        name: track.name,
        artists: track.artists.into_iter().map(|a| a.name).collect(),
        album: track.album.map(|a| a.name).unwrap_or_default(),
        external_id: track.id,
        uri: track.uri,
        saved_at: item.added_at,
    })
}

fn tracks_from(items: Vec<TrackItem>) -> Vec<LibraryTrack> {
    items.into_iter().filter_map(track_from).collect()
}

impl SpotifyLibrary {
    /// Create a new client for an access token
    ///
    /// # Parameters
    ///
    /// - `access_token`: OAuth access token for the signed-in account
    /// - `api_url`: API root override (defaults to the public API)
    pub fn new(access_token: impl Into<String>, api_url: Option<String>) -> Result<Self> {
        let access_token = access_token.into();
        if access_token.is_empty() {
            return Err(Error::config("Spotify access token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::upstream("spotify", format!("Failed to build HTTP client: {}", e)))?;

        let api_url = api_url
            .unwrap_or_else(|| SPOTIFY_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            access_token,
            api_url,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{}", self.api_url, path)
    }

    /// Send a request and decode the JSON body, mapping HTTP failures
    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder, what: &str) -> Result<T> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| Error::upstream("spotify", format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status.as_u16(), &error_text, what));
        }

        response
            .json()
            .await
            .map_err(|e| Error::upstream("spotify", format!("Failed to parse {} response: {}", what, e)))
    }
}

#[async_trait]
impl StreamingLibrary for SpotifyLibrary {
    async fn current_user(&self) -> Result<LibraryUser> {
        let me: UserObject = self.send(self.client.get(self.url("/me")), "current user").await?;
        tracing::debug!(user = %me.id, "resolved current user");
        Ok(LibraryUser {
            external_id: me.id,
            display_name: me.display_name,
            email: me.email,
        })
    }

    async fn saved_tracks(&self, page: Pagination) -> Result<Vec<LibraryTrack>> {
        let request = self
            .client
            .get(self.url("/me/tracks"))
            .query(&[("limit", page.limit), ("offset", page.offset)]);
        let paging: Paging<TrackItem> = self.send(request, "saved tracks").await?;

        tracing::debug!(
            offset = page.offset,
            count = paging.items.len(),
            "fetched saved tracks page"
        );
        Ok(tracks_from(paging.items))
    }

    async fn playlist(&self, external_id: &str) -> Result<LibraryPlaylist> {
        let url = self.url(&format!("/playlists/{}", external_id));
        let playlist: PlaylistObject = self.send(self.client.get(url), "playlist").await?;

        let mut tracks = tracks_from(playlist.tracks.items);
        let mut next = playlist.tracks.next;
        while let Some(url) = next {
            let page: Paging<TrackItem> = self.send(self.client.get(url), "playlist tracks").await?;
            tracks.extend(tracks_from(page.items));
            next = page.next;
        }

        tracing::debug!(playlist = %playlist.id, tracks = tracks.len(), "fetched playlist");
        Ok(LibraryPlaylist {
            name: playlist.name,
            external_id: playlist.id,
            tracks,
        })
    }

    async fn create_playlist(&self, owner: &str, name: &str, options: &PlaylistOptions) -> Result<String> {
        let payload = json!({
            "name": name,
            "public": options.public,
            "description": options.description,
        });
        let url = self.url(&format!("/users/{}/playlists", owner));
        let created: CreatedObject = self
            .send(self.client.post(url).json(&payload), "create playlist")
            .await?;

        tracing::info!(owner, name, playlist = %created.id, "created playlist");
        Ok(created.id)
    }

    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let url = self.url(&format!("/playlists/{}/tracks", playlist_id));
        for chunk in uris.chunks(MAX_TRACKS_PER_REQUEST) {
            let payload = json!({ "uris": chunk });
            let _: serde_json::Value = self
                .send(self.client.post(&url).json(&payload), "add tracks")
                .await?;
        }
        tracing::debug!(playlist = playlist_id, tracks = uris.len(), "added tracks");
        Ok(())
    }

    fn library_name(&self) -> &'static str {
        "spotify"
    }
}

/// Map an HTTP failure status to an error
fn status_error(status: u16, body: &str, what: &str) -> Error {
    match status {
        401 => Error::Unauthenticated,
        403 => Error::upstream(
            "spotify",
            format!("{} forbidden: token lacks the required scope. Status: {}", what, status),
        ),
        404 => Error::not_found(format!("Spotify {} not found", what)),
        429 => Error::upstream(
            "spotify",
            format!("Rate limit exceeded. Please retry later. Status: {}", status),
        ),
        500..=599 => Error::upstream(
            "spotify",
            format!("Spotify server error (transient): {} - {}", status, body),
        ),
        _ => Error::upstream("spotify", format!("{} failed: {} - {}", what, status, body)),
    }
}

/// Factory for creating Spotify clients
pub struct SpotifyLibraryFactory;

impl StreamingLibraryFactory for SpotifyLibraryFactory {
    fn create(&self, config: &LibraryConfig) -> Result<Box<dyn StreamingLibrary>> {
        match config {
            LibraryConfig::Spotify {
                access_token,
                api_url,
            } => Ok(Box::new(SpotifyLibrary::new(access_token.clone(), api_url.clone())?)),
            _ => Err(Error::config("Invalid config for Spotify library")),
        }
    }
}

/// Register the Spotify library with a registry
pub fn register(registry: &ClientRegistry) {
    registry.register_library("spotify", Box::new(SpotifyLibraryFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_factory_creation() {
        let factory = SpotifyLibraryFactory;
        let config = LibraryConfig::Spotify {
            access_token: "token".to_string(),
            api_url: None,
        };
        assert!(factory.create(&config).is_ok());

        let empty = LibraryConfig::Spotify {
            access_token: String::new(),
            api_url: None,
        };
        assert!(factory.create(&empty).is_err());
    }

    #[test]
    fn test_access_token_not_exposed_in_debug() {
        let library = SpotifyLibrary::new("BQD_secret_token", None).unwrap();
        let debug_str = format!("{:?}", library);
        assert!(!debug_str.contains("BQD_secret_token"));
        assert!(debug_str.contains("SpotifyLibrary"));
    }

    #[test]
    fn test_url_building() {
        let library = SpotifyLibrary::new("t", Some("http://localhost:9000/".into())).unwrap();
        assert_eq!(library.url("/me/tracks"), "http://localhost:9000/v1/me/tracks");
    }

    #[test]
    fn test_saved_tracks_page_parsing() {
        let body = serde_json::json!({
            "href": "https://api.spotify.com/v1/me/tracks?offset=0&limit=2",
            "items": [
                {
                    "added_at": "2020-01-05T12:30:00Z",
                    "track": {
                        "id": "4uLU6hMCjMI75M1A2tKUQC",
                        "name": "Never Gonna Give You Up",
                        "uri": "spotify:track:4uLU6hMCjMI75M1A2tKUQC",
                        "artists": [{"name": "Rick Astley"}],
                        "album": {"name": "Whenever You Need Somebody"}
                    }
                },
                {
                    "added_at": "2020-01-04T08:00:00Z",
                    "track": {
                        "id": null,
                        "name": "Local demo",
                        "uri": "spotify:local:::Local+demo:200",
                        "artists": [],
                        "album": null
                    }
                },
                { "added_at": "2020-01-03T08:00:00Z", "track": null }
            ],
            "limit": 2,
            "next": null,
            "offset": 0,
            "total": 3
        });

        let paging: Paging<TrackItem> = serde_json::from_value(body).unwrap();
        let tracks = tracks_from(paging.items);

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].external_id.as_deref(), Some("4uLU6hMCjMI75M1A2tKUQC"));
        assert_eq!(tracks[0].artists, vec!["Rick Astley"]);
        assert_eq!(tracks[0].album, "Whenever You Need Somebody");
        assert_eq!(
            tracks[0].saved_at,
            Some(Utc.with_ymd_and_hms(2020, 1, 5, 12, 30, 0).unwrap())
        );
        assert!(tracks[1].external_id.is_none());
        assert_eq!(tracks[1].album, "");
    }

    #[test]
    fn test_playlist_parsing_keeps_next_link() {
        let body = serde_json::json!({
            "id": "37i9dQZF1DXcBWIGoYBM5M",
            "name": "Today's Top Hits",
            "tracks": {
                "items": [],
                "next": "https://api.spotify.com/v1/playlists/37i9dQZF1DXcBWIGoYBM5M/tracks?offset=100&limit=100"
            }
        });
        let playlist: PlaylistObject = serde_json::from_value(body).unwrap();
        assert_eq!(playlist.name, "Today's Top Hits");
        assert!(playlist.tracks.next.is_some());
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(status_error(401, "", "current user"), Error::Unauthenticated));
        assert!(matches!(status_error(404, "", "playlist"), Error::NotFound(_)));
        assert!(matches!(status_error(429, "", "saved tracks"), Error::UpstreamUnavailable { .. }));
        assert!(status_error(502, "bad gateway", "playlist").to_string().contains("transient"));
    }

    #[tokio::test]
    async fn test_add_no_tracks_makes_no_request() {
        // unroutable API root: any real request would fail
        let library = SpotifyLibrary::new("t", Some("http://127.0.0.1:9".into())).unwrap();
        library.add_tracks("pl1", &[]).await.unwrap();
    }

    #[test]
    fn test_register() {
        let registry = ClientRegistry::new();
        register(&registry);
        assert!(registry.has_library("spotify"));
    }
}
