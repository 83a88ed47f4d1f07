//! Ordered task collection with write-through persistence.
//!
//! The store is the single shared mutable resource of the pipeline. Mutations are synchronous,
//! persisted immediately through a [`StateBackend`] and announced on a broadcast channel so
//! observers can re-render.

mod backend;
mod store;
mod transfer;

pub use backend::{JsonFileBackend, MemoryBackend, PersistedState, StateBackend};
pub use store::{StoreEvent, TaskStore};
pub use transfer::{export_file_name, parse_import};
