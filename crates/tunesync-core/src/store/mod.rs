// # Built-in Record Stores
//
// Implementations of the RecordStore trait that ship with the core. The
// Airtable store lives in its own crate.

pub mod file;
pub mod memory;

pub use file::{FileRecordStore, FileRecordStoreFactory};
pub use memory::{MemoryRecordStore, MemoryRecordStoreFactory};
