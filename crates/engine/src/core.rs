//! Core handle: creates and exclusively owns models, and wires every
//! training-affecting operation into the hash-chained ledger.

use crate::error::EngineError;
use crate::model::{Model, ModelConfig};
use crate::persist;
use mnemo_common::Hash;
use mnemo_ledger::{AuditEntry, LedgerWriter, TrainOp};
use mnemo_memory::math;
use mnemo_projection::TrainOptions;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A chain's entries plus its verification status — the forensic view of one
/// model's training history.
#[derive(Debug, serde::Serialize)]
pub struct AuditReport {
    pub core_id: String,
    pub model_id: String,
    pub head_hash: Hash,
    pub chain_ok: bool,
    pub entries: Vec<AuditEntry>,
}

/// Integrity sweep over a model: chain validity plus numeric sanity of its
/// weights and memory.
#[derive(Debug, serde::Serialize)]
pub struct DetectionReport {
    pub chain_ok: bool,
    pub weights_finite: bool,
    pub embeddings_finite: bool,
    pub zero_embeddings: usize,
    pub memory_len: usize,
}

impl DetectionReport {
    pub fn clean(&self) -> bool {
        self.chain_ok && self.weights_finite && self.embeddings_finite
    }
}

pub struct Core {
    core_id: String,
    ledger_root: PathBuf,
    models: BTreeMap<String, Model>,
    ledgers: BTreeMap<String, LedgerWriter>,
}

impl Core {
    pub fn new(core_id: impl Into<String>, ledger_root: impl Into<PathBuf>) -> Self {
        Self {
            core_id: core_id.into(),
            ledger_root: ledger_root.into(),
            models: BTreeMap::new(),
            ledgers: BTreeMap::new(),
        }
    }

    pub fn core_id(&self) -> &str {
        &self.core_id
    }

    pub fn model_names(&self) -> Vec<&str> {
        self.models.keys().map(|s| s.as_str()).collect()
    }

    pub fn model(&self, name: &str) -> Option<&Model> {
        self.models.get(name)
    }

    pub fn model_mut(&mut self, name: &str) -> Option<&mut Model> {
        self.models.get_mut(name)
    }

    /// Create and take ownership of a new model; its ledger chain is opened
    /// (and verified) alongside.
    pub fn create_model(&mut self, name: &str, config: ModelConfig) -> Result<(), EngineError> {
        if self.models.contains_key(name) {
            return Err(EngineError::DuplicateModel(name.to_string()));
        }
        let model = Model::new(name, config)?;
        let ledger = LedgerWriter::open(&self.ledger_root, &self.core_id, name)?;
        self.models.insert(name.to_string(), model);
        self.ledgers.insert(name.to_string(), ledger);
        info!(core = %self.core_id, model = name, "model created");
        Ok(())
    }

    /// Drop a model, releasing its weights and memory. The ledger file stays
    /// on disk — training history outlives the handle.
    pub fn destroy_model(&mut self, name: &str) -> bool {
        self.ledgers.remove(name);
        self.models.remove(name).is_some()
    }

    /// Deep-copy a model under a new name. Not a training-affecting
    /// operation, so nothing is appended to any chain.
    pub fn clone_model(&mut self, src: &str, dst: &str) -> Result<(), EngineError> {
        if self.models.contains_key(dst) {
            return Err(EngineError::DuplicateModel(dst.to_string()));
        }
        let copy = self
            .models
            .get(src)
            .ok_or_else(|| EngineError::UnknownModel(src.to_string()))?
            .clone();
        let ledger = LedgerWriter::open(&self.ledger_root, &self.core_id, dst)?;
        self.models.insert(dst.to_string(), copy);
        self.ledgers.insert(dst.to_string(), ledger);
        Ok(())
    }

    fn model_and_ledger(
        &mut self,
        name: &str,
    ) -> Result<(&mut Model, &mut LedgerWriter), EngineError> {
        if !self.models.contains_key(name) {
            return Err(EngineError::UnknownModel(name.to_string()));
        }
        let model = self.models.get_mut(name).unwrap();
        let ledger = self.ledgers.get_mut(name).unwrap();
        Ok((model, ledger))
    }

    /// Gradient-train a model on a dataset and append a `Train` link.
    /// Returns the new chain head.
    pub fn train(
        &mut self,
        name: &str,
        dataset_id: &str,
        inputs: &[Vec<f32>],
        targets: &[Vec<f32>],
        opts: &TrainOptions,
        timestamp: i64,
    ) -> Result<Hash, EngineError> {
        let (model, ledger) = self.model_and_ledger(name)?;
        model.train_weights(inputs, targets, opts)?;
        let head = ledger.append(TrainOp::Train, dataset_id, timestamp)?;
        debug!(model = name, dataset_id, head = %head, "train recorded");
        Ok(head)
    }

    /// Reset to the cold state, then train from scratch; appends `Retrain`.
    pub fn retrain(
        &mut self,
        name: &str,
        dataset_id: &str,
        inputs: &[Vec<f32>],
        targets: &[Vec<f32>],
        opts: &TrainOptions,
        timestamp: i64,
    ) -> Result<Hash, EngineError> {
        let (model, ledger) = self.model_and_ledger(name)?;
        model.reset_weights()?;
        model.train_weights(inputs, targets, opts)?;
        Ok(ledger.append(TrainOp::Retrain, dataset_id, timestamp)?)
    }

    /// Forget the gradient state: weights return to the cold init and the
    /// model is marked untrained; appends `Untrain`.
    pub fn untrain(
        &mut self,
        name: &str,
        dataset_id: &str,
        timestamp: i64,
    ) -> Result<Hash, EngineError> {
        let (model, ledger) = self.model_and_ledger(name)?;
        model.reset_weights()?;
        Ok(ledger.append(TrainOp::Untrain, dataset_id, timestamp)?)
    }

    /// Append an `Erase` tombstone for `dataset_id` to every owned model's
    /// chain. History is never rewritten — the tombstone *is* the erasure.
    pub fn erase(&mut self, dataset_id: &str, timestamp: i64) -> Result<Vec<Hash>, EngineError> {
        let mut heads = Vec::with_capacity(self.ledgers.len());
        for ledger in self.ledgers.values_mut() {
            heads.push(ledger.append(TrainOp::Erase, dataset_id, timestamp)?);
        }
        Ok(heads)
    }

    /// Attention inference through the named model.
    pub fn infer(
        &mut self,
        name: &str,
        input: &[f32],
        timestamp: i64,
    ) -> Result<Vec<f32>, EngineError> {
        self.models
            .get_mut(name)
            .ok_or_else(|| EngineError::UnknownModel(name.to_string()))?
            .infer(input, timestamp)
    }

    /// Record an experience in the named model's memory.
    pub fn add_memory(
        &mut self,
        name: &str,
        embedding: &[f32],
        output: &[f32],
        id: Option<&str>,
        timestamp: i64,
    ) -> Result<Option<mnemo_memory::CapacityNote>, EngineError> {
        self.models
            .get_mut(name)
            .ok_or_else(|| EngineError::UnknownModel(name.to_string()))?
            .add_memory(embedding, output, id, timestamp)
    }

    pub fn save_model(&self, name: &str, path: &Path) -> Result<(), EngineError> {
        let model = self
            .models
            .get(name)
            .ok_or_else(|| EngineError::UnknownModel(name.to_string()))?;
        persist::save_model(model, path)
    }

    /// Load a model file and take ownership of the result. The model keeps
    /// the name it was saved under.
    pub fn load_model(&mut self, path: &Path) -> Result<String, EngineError> {
        let model = persist::load_model(path)?;
        let name = model.name().to_string();
        if self.models.contains_key(&name) {
            return Err(EngineError::DuplicateModel(name));
        }
        let ledger = LedgerWriter::open(&self.ledger_root, &self.core_id, &name)?;
        self.models.insert(name.clone(), model);
        self.ledgers.insert(name.clone(), ledger);
        Ok(name)
    }

    /// Replay and re-derive the named model's chain.
    pub fn verify_chain(&self, name: &str) -> Result<bool, EngineError> {
        if !self.models.contains_key(name) {
            return Err(EngineError::UnknownModel(name.to_string()));
        }
        Ok(mnemo_ledger::verify_chain(
            &self.ledger_root,
            &self.core_id,
            name,
        )?)
    }

    /// Forensic view of a model's training history.
    pub fn audit_report(&self, name: &str) -> Result<AuditReport, EngineError> {
        if !self.models.contains_key(name) {
            return Err(EngineError::UnknownModel(name.to_string()));
        }
        let chain_ok = mnemo_ledger::verify_chain(&self.ledger_root, &self.core_id, name)?;
        let (entries, head_hash) = if chain_ok {
            (
                mnemo_ledger::read_entries(&self.ledger_root, &self.core_id, name)?,
                mnemo_ledger::head_hash(&self.ledger_root, &self.core_id, name)?,
            )
        } else {
            (Vec::new(), mnemo_ledger::genesis_hash())
        };
        Ok(AuditReport {
            core_id: self.core_id.clone(),
            model_id: name.to_string(),
            head_hash,
            chain_ok,
            entries,
        })
    }

    /// Integrity sweep: ledger chain validity plus non-finite screening of
    /// weights and stored embeddings.
    pub fn auto_detect(&self, name: &str) -> Result<DetectionReport, EngineError> {
        let model = self
            .models
            .get(name)
            .ok_or_else(|| EngineError::UnknownModel(name.to_string()))?;
        let chain_ok = mnemo_ledger::verify_chain(&self.ledger_root, &self.core_id, name)?;
        let weights_finite = math::validate_finite(model.projection().weights()).is_ok();
        let mut embeddings_finite = true;
        let mut zero_embeddings = 0usize;
        for record in model.memory().iter() {
            if math::validate_finite(&record.embedding).is_err() {
                embeddings_finite = false;
            }
            if record.embedding.iter().all(|&x| x == 0.0) {
                zero_embeddings += 1;
            }
        }
        Ok(DetectionReport {
            chain_ok,
            weights_finite,
            embeddings_finite,
            zero_embeddings,
            memory_len: model.memory().len(),
        })
    }
}
