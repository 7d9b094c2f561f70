//! Plugin-based client registry
//!
//! Record stores and streaming libraries are registered by type name at
//! runtime and built from configuration, so the binary never hardcodes
//! which backends exist.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tunesync_core::registry::ClientRegistry;
//! use tunesync_core::config::StoreConfig;
//!
//! let registry = ClientRegistry::with_builtin_stores();
//! tunesync_store_airtable::register(&registry);
//!
//! let config = StoreConfig::Airtable { ... };
//! let store = registry.create_store(&config).await?;
//! ```
//!
//! ## Registration
//!
//! Backend crates expose a `register` function:
//!
//! ```rust,ignore
//! // In tunesync-library-spotify
//! pub fn register(registry: &ClientRegistry) {
//!     registry.register_library("spotify", Box::new(SpotifyLibraryFactory));
//! }
//! ```

use crate::config::{LibraryConfig, StoreConfig};
use crate::error::{Error, Result};
use crate::store::{FileRecordStoreFactory, MemoryRecordStoreFactory};
use crate::traits::{RecordStore, RecordStoreFactory, StreamingLibrary, StreamingLibraryFactory};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Registry of record store and streaming library factories
///
/// ## Thread Safety
///
/// Interior mutability with RwLock: concurrent reads, exclusive writes.
#[derive(Default)]
pub struct ClientRegistry {
    /// Registered record store factories
    stores: RwLock<HashMap<String, Arc<dyn RecordStoreFactory>>>,

    /// Registered streaming library factories
    libraries: RwLock<HashMap<String, Box<dyn StreamingLibraryFactory>>>,
}

impl ClientRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `memory` and `file` stores already registered
    pub fn with_builtin_stores() -> Self {
        let registry = Self::new();
        registry.register_store("memory", Box::new(MemoryRecordStoreFactory));
        registry.register_store("file", Box::new(FileRecordStoreFactory));
        registry
    }

    /// Register a record store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name (e.g., "airtable", "file")
    /// - `factory`: Factory object for creating store instances
    pub fn register_store(&self, name: impl Into<String>, factory: Box<dyn RecordStoreFactory>) {
        let mut stores = self.stores.write().unwrap_or_else(PoisonError::into_inner);
        stores.insert(name.into(), Arc::from(factory));
    }

    /// Register a streaming library factory
    ///
    /// # Parameters
    ///
    /// - `name`: Library type name (e.g., "spotify")
    /// - `factory`: Factory object for creating library clients
    pub fn register_library(
        &self,
        name: impl Into<String>,
        factory: Box<dyn StreamingLibraryFactory>,
    ) {
        let mut libraries = self.libraries.write().unwrap_or_else(PoisonError::into_inner);
        libraries.insert(name.into(), factory);
    }

    /// Create a record store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn RecordStore>)`: Created store
    /// - `Err(Error)`: If the store type is not registered or creation fails
    pub async fn create_store(&self, config: &StoreConfig) -> Result<Box<dyn RecordStore>> {
        let store_type = config.type_name();

        // clone the factory out so the lock isn't held across the await
        let factory = {
            let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
            stores
                .get(store_type)
                .cloned()
                .ok_or_else(|| Error::config(format!("Unknown store type: {}", store_type)))?
        };

        factory.create(config).await
    }

    /// Create a streaming library client from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn StreamingLibrary>)`: Created client
    /// - `Err(Error)`: If the library type is not registered or creation fails
    pub fn create_library(&self, config: &LibraryConfig) -> Result<Box<dyn StreamingLibrary>> {
        let library_type = config.type_name();
        let libraries = self.libraries.read().unwrap_or_else(PoisonError::into_inner);

        let factory = libraries
            .get(library_type)
            .ok_or_else(|| Error::config(format!("Unknown library type: {}", library_type)))?;

        factory.create(config)
    }

    /// List all registered store types
    pub fn list_stores(&self) -> Vec<String> {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.keys().cloned().collect()
    }

    /// List all registered library types
    pub fn list_libraries(&self) -> Vec<String> {
        let libraries = self.libraries.read().unwrap_or_else(PoisonError::into_inner);
        libraries.keys().cloned().collect()
    }

    /// Check if a store type is registered
    pub fn has_store(&self, name: &str) -> bool {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.contains_key(name)
    }

    /// Check if a library type is registered
    pub fn has_library(&self, name: &str) -> bool {
        let libraries = self.libraries.read().unwrap_or_else(PoisonError::into_inner);
        libraries.contains_key(name)
    }
}
