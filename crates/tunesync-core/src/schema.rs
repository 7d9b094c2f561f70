//! Record store schema
//!
//! Maps the semantic field names used throughout the core to the column
//! names of the backing store, and records each column's type. The type is
//! what decides whether a field may cross environments during a mirror:
//! only plain columns (text, number, checkbox) are portable. Formula and
//! link columns are either computed by the store or hold environment-local
//! record ids.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tables known to tunesync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Table {
    User,
    Song,
    Playlist,
    Product,
    Store,
}

impl Table {
    /// All tables, in declaration order
    pub const ALL: [Table; 5] = [
        Table::User,
        Table::Song,
        Table::Playlist,
        Table::Product,
        Table::Store,
    ];

    /// Table name as used by the record store
    pub fn name(&self) -> &'static str {
        match self {
            Table::User => "User",
            Table::Song => "Song",
            Table::Playlist => "Playlist",
            Table::Product => "Product",
            Table::Store => "Store",
        }
    }

    /// Semantic name of the natural-key field, if the table has one
    ///
    /// Playlists are not deduplicated by the core and therefore have no
    /// natural key here.
    pub fn natural_key(&self) -> Option<&'static str> {
        match self {
            Table::User => Some("username"),
            Table::Song => Some("spotifyId"),
            Table::Playlist => None,
            Table::Product => Some("fullName"),
            Table::Store => Some("storeName"),
        }
    }

    /// Columns of this table
    pub fn columns(&self) -> &'static [Column] {
        match self {
            Table::User => USER_COLUMNS,
            Table::Song => SONG_COLUMNS,
            Table::Playlist => PLAYLIST_COLUMNS,
            Table::Product => PRODUCT_COLUMNS,
            Table::Store => STORE_COLUMNS,
        }
    }

    /// Look up a column by its semantic field name
    pub fn column(&self, field: &str) -> Option<&'static Column> {
        self.columns().iter().find(|c| c.field == field)
    }

    /// Look up a column by its store column name
    pub fn column_by_name(&self, name: &str) -> Option<&'static Column> {
        self.columns().iter().find(|c| c.name == name)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Column value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Number,
    Checkbox,
    /// Computed by the store, never written
    Formula,
    /// Link to exactly one record of another table
    ForeignKeyOne,
    /// Link to any number of records of another table
    ForeignKeyMany,
}

impl ColumnType {
    /// Plain columns hold values that mean the same thing in every environment
    pub fn is_plain(&self) -> bool {
        matches!(self, ColumnType::Text | ColumnType::Number | ColumnType::Checkbox)
    }

    /// Link columns hold record ids
    pub fn is_link(&self) -> bool {
        matches!(self, ColumnType::ForeignKeyOne | ColumnType::ForeignKeyMany)
    }
}

/// One column of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Semantic field name used by the core
    pub field: &'static str,
    /// Column name in the store
    pub name: &'static str,
    /// Column type
    pub kind: ColumnType,
}

const fn col(field: &'static str, name: &'static str, kind: ColumnType) -> Column {
    Column { field, name, kind }
}

use ColumnType::*;

static USER_COLUMNS: &[Column] = &[
    col("primaryKey", "Primary Key", Formula),
    col("username", "Username", Text),
    col("email", "Email", Text),
    col("id", "id", Formula),
    col("songIds", "Songs", ForeignKeyMany),
    col("playlistIds", "Playlist", ForeignKeyMany),
    col("name", "Name", Text),
];

static SONG_COLUMNS: &[Column] = &[
    col("primaryKey", "Primary Key", Formula),
    col("artist", "Artist", Text),
    col("userIds", "Users", ForeignKeyMany),
    col("playlistIds", "Playlists", ForeignKeyMany),
    col("id", "id", Formula),
    col("name", "Name", Text),
    col("spotifyId", "Spotify Id", Text),
    col("album", "Album", Text),
    col("uri", "Uri", Text),
];

static PLAYLIST_COLUMNS: &[Column] = &[
    col("primaryKey", "Primary Key", Formula),
    col("songIds", "Songs", ForeignKeyMany),
    col("created", "Created", Formula),
    col("userId", "User", ForeignKeyOne),
    col("id", "id", Formula),
    col("name", "Name", Text),
    col("spotifyId", "Spotify Id", Text),
];

static PRODUCT_COLUMNS: &[Column] = &[
    col("primaryKey", "Primary Key", Formula),
    col("fullName", "Full Name", Formula),
    col("name", "Name", Text),
    col("category", "Category", Text),
    col("detail", "Detail", Text),
    col("customerCost", "Customer Cost", Number),
    col("id", "id", Formula),
    col("storeIds", "Stores", ForeignKeyMany),
];

static STORE_COLUMNS: &[Column] = &[
    col("primaryKey", "Primary Key", Formula),
    col("storeName", "Store Name", Text),
    col("address", "Address", Text),
    col("ward", "Ward", Text),
    col("latitude", "Latitude", Number),
    col("longitude", "Longitude", Number),
    col("storeHours", "Store Hours", Text),
    col("snapOrEbtAccepted", "SNAP or EBT Accepted", Checkbox),
    col("wic", "WIC", Checkbox),
    col("id", "id", Formula),
    col("productIds", "Products", ForeignKeyMany),
    col("clerkIds", "Clerks", ForeignKeyMany),
    col("transactionIds", "Transactions", ForeignKeyMany),
];
