//! Model handle: one linear projection plus one memory store.

use crate::attention::{self, ATTENTION_TOP_K};
use crate::error::EngineError;
use mnemo_memory::math;
use mnemo_memory::{CapacityNote, MemoryStore};
use mnemo_projection::{LinearProjection, TrainOptions};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const FORMAT_VERSION: u32 = 1;
pub const DEFAULT_MEMORY_CAPACITY: usize = 256;

/// Construction-time knobs for a model. Memory embedding width always equals
/// `input_size`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub input_size: usize,
    pub output_size: usize,
    pub memory_capacity: usize,
    /// When set, every inference also becomes a new memory record.
    pub inject_on_infer: bool,
    /// Seed for small random weight initialization; `None` starts cold
    /// (all-zero weights).
    pub weight_seed: Option<u64>,
}

impl ModelConfig {
    pub fn new(input_size: usize, output_size: usize) -> Self {
        Self {
            input_size,
            output_size,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            inject_on_infer: true,
            weight_seed: None,
        }
    }
}

/// A named model. Exclusively owned by the [`crate::Core`] that created it;
/// not safe for concurrent mutation.
#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    version: u32,
    trained: bool,
    inject_on_infer: bool,
    weight_seed: Option<u64>,
    projection: LinearProjection,
    memory: MemoryStore,
}

impl Model {
    pub fn new(name: impl Into<String>, config: ModelConfig) -> Result<Self, EngineError> {
        let name = name.into();
        if name.is_empty() {
            return Err(EngineError::InvalidArgument("model name must be non-empty"));
        }
        if config.input_size == 0 || config.output_size == 0 {
            return Err(EngineError::InvalidArgument("model sizes must be non-zero"));
        }
        let projection = match config.weight_seed {
            Some(seed) => LinearProjection::seeded(config.input_size, config.output_size, seed)?,
            None => LinearProjection::zeros(config.input_size, config.output_size)?,
        };
        let memory = MemoryStore::new(config.input_size, config.memory_capacity)?;
        Ok(Self {
            name,
            version: FORMAT_VERSION,
            trained: false,
            inject_on_infer: config.inject_on_infer,
            weight_seed: config.weight_seed,
            projection,
            memory,
        })
    }

    pub(crate) fn from_parts(
        name: String,
        version: u32,
        trained: bool,
        projection: LinearProjection,
        memory: MemoryStore,
    ) -> Self {
        Self {
            name,
            version,
            trained,
            inject_on_infer: true,
            weight_seed: None,
            projection,
            memory,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn input_size(&self) -> usize {
        self.projection.input_size()
    }

    pub fn output_size(&self) -> usize {
        self.projection.output_size()
    }

    pub fn trained(&self) -> bool {
        self.trained
    }

    pub fn inject_on_infer(&self) -> bool {
        self.inject_on_infer
    }

    pub fn set_inject_on_infer(&mut self, inject: bool) {
        self.inject_on_infer = inject;
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn projection(&self) -> &LinearProjection {
        &self.projection
    }

    /// Record an experience directly. Both vectors carry the memory width
    /// (= `input_size`).
    pub fn add_memory(
        &mut self,
        embedding: &[f32],
        output: &[f32],
        id: Option<&str>,
        timestamp: i64,
    ) -> Result<Option<CapacityNote>, EngineError> {
        Ok(self.memory.add(embedding, output, id, timestamp)?)
    }

    /// Pure baseline `W * x`, no memory involvement.
    pub fn predict(&self, input: &[f32]) -> Result<Vec<f32>, EngineError> {
        Ok(self.projection.predict(input)?)
    }

    /// Attention inference: blend the linear baseline with the outputs of
    /// the most similar remembered records.
    ///
    /// The caller's buffer is never mutated; a normalized local copy drives
    /// scoring, prediction, and (when `inject_on_infer`) the new memory
    /// record written as a side effect.
    pub fn infer(&mut self, input: &[f32], timestamp: i64) -> Result<Vec<f32>, EngineError> {
        if input.len() != self.input_size() {
            return Err(EngineError::DimensionMismatch {
                expected: self.input_size(),
                got: input.len(),
            });
        }

        let mut query = input.to_vec();
        math::l2_normalize(&mut query);

        let linear_out = self.projection.predict(&query)?;
        let out = if self.memory.is_empty() {
            linear_out
        } else {
            let selected = attention::top_k(&self.memory, &query, ATTENTION_TOP_K)?;
            attention::blend(&linear_out, &selected)
        };

        if self.inject_on_infer {
            let stored = fit_width(&out, self.memory.dim());
            if let Some(note) = self.memory.add(&query, &stored, None, timestamp)? {
                debug!(
                    model = %self.name,
                    slot = note.slot,
                    "inference record displaced an older memory"
                );
            }
        }

        Ok(out)
    }

    /// Gradient pass over the projection, then re-normalize every stored
    /// embedding (the post-training unit-norm invariant).
    ///
    /// Training inputs are normalized the same way `infer` normalizes its
    /// query, so the two stages see the same scale.
    pub(crate) fn train_weights(
        &mut self,
        inputs: &[Vec<f32>],
        targets: &[Vec<f32>],
        opts: &TrainOptions,
    ) -> Result<(), EngineError> {
        let normalized: Vec<Vec<f32>> = inputs
            .iter()
            .map(|x| {
                let mut x = x.clone();
                math::l2_normalize(&mut x);
                x
            })
            .collect();
        self.projection.train(&normalized, targets, opts)?;
        self.memory.normalize_all();
        self.trained = true;
        Ok(())
    }

    /// Back to the cold state: the configured seeded init, or zeros.
    pub(crate) fn reset_weights(&mut self) -> Result<(), EngineError> {
        self.projection = match self.weight_seed {
            Some(seed) => {
                LinearProjection::seeded(self.input_size(), self.output_size(), seed)?
            }
            None => LinearProjection::zeros(self.input_size(), self.output_size())?,
        };
        self.trained = false;
        Ok(())
    }
}

/// Adapt an output vector to the memory width: truncate or zero-pad.
fn fit_width(v: &[f32], width: usize) -> Vec<f32> {
    let mut out = v.to_vec();
    out.resize(width, 0.0);
    out
}
