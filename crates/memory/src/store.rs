//! Ring-buffer memory store.
//!
//! A `MemoryStore` holds at most `capacity` records. Once full, a new insert
//! overwrites the oldest record (index = `total_inserted mod capacity`); the
//! overwrite is reported back as a [`CapacityNote`] so callers can audit the
//! loss of history. Records are never individually deleted.

use crate::math::{self, MathError};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Error type for memory store operations.
#[derive(Debug)]
pub enum StoreError {
    InvalidArgument(&'static str),
    DimensionMismatch { expected: usize, got: usize },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::InvalidArgument(what) => write!(f, "invalid argument: {}", what),
            StoreError::DimensionMismatch { expected, got } => {
                write!(f, "dimension mismatch: expected {}, got {}", expected, got)
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl From<MathError> for StoreError {
    fn from(e: MathError) -> Self {
        match e {
            MathError::NonFinite => StoreError::InvalidArgument("non-finite vector"),
            MathError::DimensionMismatch { expected, got } => {
                StoreError::DimensionMismatch { expected, got }
            }
        }
    }
}

/// One remembered exchange: what was seen and what was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub embedding: Vec<f32>,
    pub output: Vec<f32>,
    pub id: Option<String>,
    pub timestamp: i64,
}

/// Returned when an insert overwrote an existing record. Informational,
/// never fatal.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityNote {
    pub slot: usize,
    pub evicted_id: Option<String>,
    pub evicted_timestamp: i64,
}

/// Fixed-capacity ring buffer of [`MemoryRecord`]s bound to one model.
///
/// Invariant: `len() == min(total_inserted, capacity)` at all times.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    dim: usize,
    capacity: usize,
    records: Vec<MemoryRecord>,
    total_inserted: u64,
}

impl MemoryStore {
    /// Create an empty store for embeddings of width `dim` holding at most
    /// `capacity` records.
    pub fn new(dim: usize, capacity: usize) -> Result<Self, StoreError> {
        if dim == 0 {
            return Err(StoreError::InvalidArgument("dim must be non-zero"));
        }
        if capacity == 0 {
            return Err(StoreError::InvalidArgument("capacity must be non-zero"));
        }
        Ok(Self {
            dim,
            capacity,
            records: Vec::new(),
            total_inserted: 0,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Monotonically increasing count of every insert ever made.
    pub fn total_inserted(&self) -> u64 {
        self.total_inserted
    }

    /// Insert a record. Always succeeds once the widths check out; returns a
    /// [`CapacityNote`] when the ring overwrote an older record.
    pub fn add(
        &mut self,
        embedding: &[f32],
        output: &[f32],
        id: Option<&str>,
        timestamp: i64,
    ) -> Result<Option<CapacityNote>, StoreError> {
        if embedding.len() != self.dim {
            return Err(StoreError::DimensionMismatch {
                expected: self.dim,
                got: embedding.len(),
            });
        }
        if output.len() != self.dim {
            return Err(StoreError::DimensionMismatch {
                expected: self.dim,
                got: output.len(),
            });
        }

        let slot = (self.total_inserted % self.capacity as u64) as usize;
        let record = MemoryRecord {
            embedding: embedding.to_vec(),
            output: output.to_vec(),
            id: id.map(|s| s.to_string()),
            timestamp,
        };

        let note = if self.records.len() < self.capacity {
            self.records.push(record);
            None
        } else {
            let old = std::mem::replace(&mut self.records[slot], record);
            debug!(slot, evicted_id = ?old.id, "memory ring overwrote oldest record");
            Some(CapacityNote {
                slot,
                evicted_id: old.id,
                evicted_timestamp: old.timestamp,
            })
        };

        self.total_inserted += 1;
        Ok(note)
    }

    /// Look up a record by id. Duplicates are permitted; the most recently
    /// inserted match wins.
    pub fn get_by_id(&self, id: &str) -> Option<&MemoryRecord> {
        self.iter().filter(|r| r.id.as_deref() == Some(id)).last()
    }

    /// Rescale every embedding to unit L2 norm in place. Idempotent;
    /// zero-magnitude embeddings are left as the zero vector.
    pub fn normalize_all(&mut self) {
        for record in &mut self.records {
            math::l2_normalize(&mut record.embedding);
        }
    }

    /// Iterate records oldest-first, following insertion order across ring
    /// wraparound. Restartable: each call yields a fresh iterator.
    pub fn iter(&self) -> impl Iterator<Item = &MemoryRecord> {
        let start = if self.records.len() < self.capacity {
            0
        } else {
            (self.total_inserted % self.capacity as u64) as usize
        };
        self.records[start..].iter().chain(self.records[..start].iter())
    }
}
