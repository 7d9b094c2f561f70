//! Core traits for tunesync
//!
//! This module defines the external collaborators the core calls through.
//!
//! - [`RecordStore`]: Create, update and query records
//! - [`StreamingLibrary`]: Read and write the user's streaming library

pub mod record_store;
pub mod streaming_library;

pub use record_store::{RecordStore, RecordStoreFactory, Sort, SortDirection};
pub use streaming_library::{
    LibraryPlaylist, LibraryTrack, LibraryUser, Pagination, PlaylistOptions, StreamingLibrary,
    StreamingLibraryFactory,
};
