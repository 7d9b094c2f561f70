// # tunesync-core
//
// Core library for syncing a streaming music library into a relational
// record store, and for mirroring records between two store environments.
//
// ## Architecture Overview
//
// - **RecordStore**: Trait for the create/update/query record store
// - **StreamingLibrary**: Trait for the streaming service account
// - **resolve**: Natural-key upsert (0 → create, 1 → reuse, >1 → malformed)
// - **merge_links**: Union of an owner's link field with new ids
// - **LibrarySync**: Saved tracks or playlists → song/playlist records linked to the user
// - **DevProdMirror**: DEV → PROD reconciliation by natural key
// - **ClientRegistry**: Plugin-based registry for stores and libraries
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic knows backends only through traits
// 2. **Idempotency**: Re-running any operation never duplicates records or drops links
// 3. **Plugin-Based**: Backends are registered dynamically, no hard-coded if-else
// 4. **Library-First**: The CLI is a thin wrapper over this crate
// 5. **Explicit Identity**: The authenticated user travels as a `Session` value

pub mod config;
pub mod error;
pub mod merge;
pub mod mirror;
pub mod model;
pub mod registry;
pub mod resolver;
pub mod response;
pub mod schema;
pub mod session;
pub mod store;
pub mod sync;
pub mod traits;

// Re-export core types for convenience
pub use config::{LibraryConfig, MirrorConfig, StoreConfig, SyncConfig, TunesyncConfig};
pub use error::{Error, Result};
pub use merge::merge_links;
pub use mirror::{DevProdMirror, MirrorReport, MirrorTable, TableReport};
pub use model::{Entity, Fields, LinkSet, NewPlaylist, NewUser, Record, RecordId, Song};
pub use registry::ClientRegistry;
pub use resolver::{Resolution, resolve, resolve_entity};
pub use response::Response;
pub use schema::{ColumnType, Table};
pub use session::Session;
pub use store::{FileRecordStore, MemoryRecordStore};
pub use sync::{
    DateWindow, LibrarySync, PlaylistSync, SyncEvent, SyncOperation, SyncState, UserSync,
};
pub use traits::{RecordStore, StreamingLibrary};
