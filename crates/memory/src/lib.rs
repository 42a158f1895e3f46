//! Memory core: fixed-capacity ring-buffer store of embedding/output records.
//!
//! - L2-normalized embeddings (cosine similarity becomes a plain dot product)
//! - Oldest-first ring overwrite once the store is full
//! - Deterministic iteration in insertion order across wraparound

pub mod math;
pub mod store;

pub use store::{CapacityNote, MemoryRecord, MemoryStore, StoreError};
