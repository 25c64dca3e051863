//! Durable history of productions.
//!
//! The history is append-only: a record is written exactly once, after the
//! orchestrator finalizes it. In-progress productions live in a separate
//! [`CheckpointStore`] so that readers of the history never observe a
//! partial record. Ideas waiting to be produced are kept in a
//! [`ContentQueue`].
//!
//! # Backends
//!
//! - [`JsonlHistoryStore`]: one JSON object per line, fsynced per append
//! - [`InMemoryHistoryStore`]: for tests and dry experiments

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod checkpoint;
mod jsonl;
mod memory;
mod policy;
mod queue;
mod store;

pub use checkpoint::{ArtifactSet, Checkpoint, CheckpointStore};
pub use jsonl::JsonlHistoryStore;
pub use memory::InMemoryHistoryStore;
pub use policy::{DuplicatePolicy, ThemeSimilarityPolicy};
pub use queue::ContentQueue;
pub use store::HistoryStore;
