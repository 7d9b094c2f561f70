//! Configuration types for tunesync
//!
//! This module defines all configuration structures used throughout the crate.

use crate::schema::Table;
use serde::{Deserialize, Serialize};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunesyncConfig {
    /// Record store holding users, songs and playlists
    pub store: StoreConfig,

    /// Streaming library client
    pub library: LibraryConfig,

    /// Library sync settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Dev→Prod mirror settings (only needed for `mirror`)
    #[serde(default)]
    pub mirror: Option<MirrorConfig>,
}

impl TunesyncConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.store.validate()?;
        self.library.validate()?;
        self.sync.validate()?;
        if let Some(mirror) = &self.mirror {
            mirror.validate()?;
        }
        Ok(())
    }
}

/// Record store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Airtable base
    Airtable {
        /// Airtable API key or personal access token
        api_key: String,
        /// Base id (e.g. "appXXXXXXXXXXXXXX")
        base_id: String,
        /// API endpoint override (defaults to the public API)
        #[serde(default)]
        api_url: Option<String>,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// JSON file snapshot
    File {
        /// Path to the snapshot file
        path: String,
    },

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::Airtable {
                api_key, base_id, ..
            } => {
                if api_key.is_empty() {
                    return Err(crate::Error::config("Airtable API key cannot be empty"));
                }
                if base_id.is_empty() {
                    return Err(crate::Error::config("Airtable base id cannot be empty"));
                }
                Ok(())
            }
            StoreConfig::File { path } => {
                if path.is_empty() {
                    return Err(crate::Error::config("File store path cannot be empty"));
                }
                Ok(())
            }
            StoreConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom store factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom store config cannot be null"));
                }
                Ok(())
            }
            StoreConfig::Memory => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::Airtable { .. } => "airtable",
            StoreConfig::Memory => "memory",
            StoreConfig::File { .. } => "file",
            StoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Streaming library configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LibraryConfig {
    /// Spotify Web API
    Spotify {
        /// OAuth access token for the signed-in account
        access_token: String,
        /// API endpoint override (defaults to the public API)
        #[serde(default)]
        api_url: Option<String>,
    },

    /// Custom library
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl LibraryConfig {
    /// Validate the library configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            LibraryConfig::Spotify { access_token, .. } => {
                if access_token.is_empty() {
                    return Err(crate::Error::config("Spotify access token cannot be empty"));
                }
                Ok(())
            }
            LibraryConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom library factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom library config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the library type name
    pub fn type_name(&self) -> &str {
        match self {
            LibraryConfig::Spotify { .. } => "spotify",
            LibraryConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Library sync settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Saved tracks requested per page (the Spotify maximum is 50)
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Upper bound on saved-track pages walked per sync
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Capacity of the sync event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Whether synced playlists are created public
    #[serde(default)]
    pub playlist_public: bool,
}

impl SyncConfig {
    /// Validate the sync settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !(1..=50).contains(&self.page_size) {
            return Err(crate::Error::config(format!(
                "Sync page size must be between 1 and 50, got {}",
                self.page_size
            )));
        }
        if self.max_pages == 0 {
            return Err(crate::Error::config("Sync max pages must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Sync event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            event_channel_capacity: default_event_channel_capacity(),
            playlist_public: false,
        }
    }
}

fn default_page_size() -> usize {
    50
}

fn default_max_pages() -> usize {
    20
}

fn default_event_channel_capacity() -> usize {
    64
}

/// Dev→Prod mirror settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Source environment
    pub dev: StoreConfig,

    /// Target environment
    pub prod: StoreConfig,

    /// Product fields copied besides the natural key
    #[serde(default = "default_product_fields")]
    pub product_fields: Vec<String>,

    /// Store fields copied besides the natural key
    #[serde(default = "default_store_fields")]
    pub store_fields: Vec<String>,
}

impl MirrorConfig {
    /// Mirror between two stores with the default field whitelists
    pub fn new(dev: StoreConfig, prod: StoreConfig) -> Self {
        Self {
            dev,
            prod,
            product_fields: default_product_fields(),
            store_fields: default_store_fields(),
        }
    }

    /// Validate the mirror settings
    ///
    /// Whitelisted fields must be plain columns of their table: ids,
    /// formulas and links never cross environments.
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.dev.validate()?;
        self.prod.validate()?;
        validate_whitelist(Table::Product, &self.product_fields)?;
        validate_whitelist(Table::Store, &self.store_fields)?;
        Ok(())
    }
}

fn validate_whitelist(table: Table, fields: &[String]) -> Result<(), crate::Error> {
    for field in fields {
        let column = table.column(field).ok_or_else(|| {
            crate::Error::config(format!("Unknown {table} field in mirror whitelist: {field}"))
        })?;
        if !column.kind.is_plain() {
            return Err(crate::Error::config(format!(
                "{table}.{field} is a {:?} column and cannot be mirrored",
                column.kind
            )));
        }
    }
    Ok(())
}

fn default_product_fields() -> Vec<String> {
    ["category", "name", "detail", "customerCost"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_store_fields() -> Vec<String> {
    [
        "address",
        "ward",
        "latitude",
        "longitude",
        "storeHours",
        "snapOrEbtAccepted",
        "wic",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
