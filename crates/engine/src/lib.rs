//! Mnemo engine — the hashed reasoning ledger.
//!
//! A [`Core`] owns named [`Model`]s. Each model pairs a gradient-trained
//! linear projection with a ring-buffer memory of past exchanges; inference
//! blends the linear baseline with the outputs of the most similar
//! memories. Every training-affecting operation (train, retrain, untrain,
//! erase) is appended to a hash-chained ledger, and models persist to a
//! single binary file that is integrity-checked on every load.

pub mod attention;
pub mod context;
pub mod core;
pub mod error;
pub mod model;
pub mod persist;

pub use self::core::{AuditReport, Core, DetectionReport};
pub use context::{Blob, Context};
pub use error::EngineError;
pub use model::{Model, ModelConfig, DEFAULT_MEMORY_CAPACITY, FORMAT_VERSION};
pub use persist::{load_model, model_digest, save_model, MAGIC};

// Re-exported so collaborators can consume the engine surface through one
// crate.
pub use mnemo_common::Hash;
pub use mnemo_ledger::{AuditEntry, TrainOp};
pub use mnemo_memory::{CapacityNote, MemoryRecord, MemoryStore};
pub use mnemo_projection::{LinearProjection, TrainOptions};

/// Version banner for collaborator diagnostics.
pub fn version_string() -> &'static str {
    concat!("mnemo ", env!("CARGO_PKG_VERSION"))
}
