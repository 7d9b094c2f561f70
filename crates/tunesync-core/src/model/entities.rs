//! Typed entities and their field projections

use super::{Fields, LinkSet, RecordId};
use crate::schema::Table;
use crate::traits::{LibraryTrack, LibraryUser};
use serde_json::Value;

/// An entity that is deduplicated by natural key
pub trait Entity {
    /// Table the entity lives in
    const TABLE: Table;

    /// Value of the natural key
    fn natural_key(&self) -> &str;

    /// Fields written when the entity is created
    fn to_fields(&self) -> Fields;
}

/// Canonical artist string: contributing names sorted and comma-joined
///
/// Order-independent, so the same track credited in a different order
/// produces the same value.
pub fn canonical_artist<S: AsRef<str>>(names: &[S]) -> String {
    let mut names: Vec<&str> = names.iter().map(|n| n.as_ref()).collect();
    names.sort_unstable();
    names.join(",")
}

/// A song as stored in the record store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    pub spotify_id: String,
    pub name: String,
    pub artist: String,
    pub album: String,
    /// Playable reference, carried so a playlist can be seeded with it
    pub uri: String,
}

impl Song {
    /// Project a streaming track; tracks without an id (local files) yield `None`
    pub fn from_track(track: &LibraryTrack) -> Option<Self> {
        let spotify_id = track.external_id.as_deref().filter(|id| !id.is_empty())?;
        Some(Self {
            spotify_id: spotify_id.to_string(),
            name: track.name.clone(),
            artist: canonical_artist(&track.artists),
            album: track.album.clone(),
            uri: track.uri.clone(),
        })
    }
}

impl Entity for Song {
    const TABLE: Table = Table::Song;

    fn natural_key(&self) -> &str {
        &self.spotify_id
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("spotifyId".into(), Value::from(self.spotify_id.as_str()));
        fields.insert("name".into(), Value::from(self.name.as_str()));
        fields.insert("artist".into(), Value::from(self.artist.as_str()));
        fields.insert("album".into(), Value::from(self.album.as_str()));
        fields.insert("uri".into(), Value::from(self.uri.as_str()));
        fields
    }
}

/// A user created on first authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl From<&LibraryUser> for NewUser {
    fn from(user: &LibraryUser) -> Self {
        Self {
            username: user.external_id.clone(),
            name: user.display_name.clone(),
            email: user.email.clone(),
        }
    }
}

impl Entity for NewUser {
    const TABLE: Table = Table::User;

    fn natural_key(&self) -> &str {
        &self.username
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("username".into(), Value::from(self.username.as_str()));
        if let Some(name) = &self.name {
            fields.insert("name".into(), Value::from(name.as_str()));
        }
        if let Some(email) = &self.email {
            fields.insert("email".into(), Value::from(email.as_str()));
        }
        fields
    }
}

/// A playlist record to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlaylist {
    pub name: String,
    pub spotify_id: String,
    pub song_ids: LinkSet,
    /// Owning user; set once at creation
    pub user_id: RecordId,
}

impl NewPlaylist {
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".into(), Value::from(self.name.as_str()));
        fields.insert("spotifyId".into(), Value::from(self.spotify_id.as_str()));
        fields.insert("songIds".into(), self.song_ids.to_value());
        // single-record links are still written as a one-element list
        fields.insert(
            "userId".into(),
            Value::Array(vec![Value::from(self.user_id.as_str())]),
        );
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn track(id: Option<&str>, artists: &[&str]) -> LibraryTrack {
        LibraryTrack {
            name: "Song".into(),
            artists: artists.iter().map(|a| a.to_string()).collect(),
            album: "Album".into(),
            external_id: id.map(str::to_string),
            uri: format!("spotify:track:{}", id.unwrap_or("local")),
            saved_at: None,
        }
    }

    #[test]
    fn artist_is_order_independent() {
        assert_eq!(canonical_artist(&["Zedd", "Alessia Cara"]), "Alessia Cara,Zedd");
        assert_eq!(
            canonical_artist(&["Alessia Cara", "Zedd"]),
            canonical_artist(&["Zedd", "Alessia Cara"])
        );
        assert_eq!(canonical_artist::<&str>(&[]), "");
    }

    #[test]
    fn song_from_track_skips_local_files() {
        assert!(Song::from_track(&track(None, &["A"])).is_none());
        assert!(Song::from_track(&track(Some(""), &["A"])).is_none());

        let song = Song::from_track(&track(Some("abc"), &["B", "A"])).unwrap();
        assert_eq!(song.natural_key(), "abc");
        assert_eq!(song.artist, "A,B");
        assert_eq!(song.to_fields()["uri"], json!("spotify:track:abc"));
    }

    #[test]
    fn new_user_omits_missing_profile_fields() {
        let user = NewUser {
            username: "alice".into(),
            name: None,
            email: Some("a@example.org".into()),
        };
        let fields = user.to_fields();
        assert_eq!(fields["username"], json!("alice"));
        assert!(!fields.contains_key("name"));
        assert_eq!(fields["email"], json!("a@example.org"));
    }

    #[test]
    fn playlist_owner_is_single_link() {
        let playlist = NewPlaylist {
            name: "2020.01.31".into(),
            spotify_id: "pl1".into(),
            song_ids: ["recB", "recA"].into_iter().collect(),
            user_id: RecordId::new("recU"),
        };
        let fields = playlist.to_fields();
        assert_eq!(fields["userId"], json!(["recU"]));
        assert_eq!(fields["songIds"], json!(["recA", "recB"]));
    }
}
