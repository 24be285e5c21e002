// src/session/mod.rs

pub mod snapshot;
pub mod store;

pub use snapshot::{FileSnapshotStore, MemorySnapshotStore, SessionSnapshot, SnapshotError, SnapshotStore};
pub use store::SessionStore;
