//! Data model
//!
//! Records travel through the core as a store-assigned [`RecordId`] plus a
//! map of semantic field names to JSON values. Typed entities in
//! [`entities`] build those field maps; [`LinkSet`] is the normalized form of
//! every many-valued link field.

pub mod entities;
pub mod links;

pub use entities::{Entity, NewPlaylist, NewUser, Song, canonical_artist};
pub use links::LinkSet;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Field map of a record, keyed by semantic field name
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Store-assigned opaque record id
///
/// Ids are only meaningful inside the environment that issued them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wrap a store id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A record as returned by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Store-assigned id
    pub id: RecordId,
    /// Field values keyed by semantic name
    #[serde(default)]
    pub fields: Fields,
}

impl Record {
    /// Create a record from an id and its fields
    pub fn new(id: impl Into<RecordId>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Read a text field
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|v| v.as_str())
    }

    /// Whether the record carries any value for `field`
    pub fn has(&self, field: &str) -> bool {
        self.fields.get(field).is_some_and(|v| !v.is_null())
    }

    /// Read a link field, normalizing scalar and list shapes
    pub fn links(&self, field: &str) -> LinkSet {
        self.fields
            .get(field)
            .map(LinkSet::from_value)
            .unwrap_or_default()
    }
}
