use mnemo_common::{sha256, Hash};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

const GENESIS_PREIMAGE: &str = "mnemo.ledger.genesis.v1";
const LEDGER_NAMESPACE: Uuid = Uuid::from_u128(0x3c1f9d2e_7a40_4b8b_9f66_d21c05e8a174);

/// Fixed record framing, little-endian:
/// op u8 | dataset_id_len u32 | dataset_id | timestamp i64 | prev_hash 32 | entry_hash 32
const FIXED_RECORD_BYTES: usize = 1 + 4 + 8 + 32 + 32;
const MAX_DATASET_ID_BYTES: usize = u32::MAX as usize;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("dataset id too long: {0} bytes")]
    DatasetIdTooLong(usize),
    #[error("unknown op byte {op} at offset {offset}")]
    UnknownOp { op: u8, offset: usize },
    #[error("hash chain broken at entry {index}: expected {expected}, got {got}")]
    ChainBroken {
        index: usize,
        expected: String,
        got: String,
    },
    #[error("truncated record at offset {offset}")]
    Truncated { offset: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainOp {
    Train,
    Retrain,
    Untrain,
    Erase,
}

impl TrainOp {
    pub fn as_byte(self) -> u8 {
        match self {
            TrainOp::Train => 1,
            TrainOp::Retrain => 2,
            TrainOp::Untrain => 3,
            TrainOp::Erase => 4,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(TrainOp::Train),
            2 => Some(TrainOp::Retrain),
            3 => Some(TrainOp::Untrain),
            4 => Some(TrainOp::Erase),
            _ => None,
        }
    }
}

/// One link of a training chain. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub op: TrainOp,
    pub dataset_id: String,
    pub timestamp: i64,
    pub prev_hash: Hash,
    pub entry_hash: Hash,
}

/// Sentinel head for a chain with no entries yet.
pub fn genesis_hash() -> Hash {
    sha256(GENESIS_PREIMAGE.as_bytes())
}

/// `entry_hash = SHA256(prev_hash || op_byte || dataset_id_bytes)`.
/// The timestamp is stored but deliberately outside the chain formula.
pub fn entry_hash(prev: &Hash, op: TrainOp, dataset_id: &str) -> Hash {
    let mut preimage = Vec::with_capacity(32 + 1 + dataset_id.len());
    preimage.extend_from_slice(&prev.bytes);
    preimage.push(op.as_byte());
    preimage.extend_from_slice(dataset_id.as_bytes());
    sha256(&preimage)
}

/// Ledger file for a `(core_id, model_id)` pair. The file name is a v5 UUID
/// over the pair so arbitrary ids stay path-safe and stable across runs.
pub fn ledger_path(root: &Path, core_id: &str, model_id: &str) -> PathBuf {
    let scope = format!("{}/{}", core_id, model_id);
    let name = Uuid::new_v5(&LEDGER_NAMESPACE, scope.as_bytes());
    root.join(format!("{}.ledger", name))
}

fn encode_record(entry: &AuditEntry) -> Vec<u8> {
    let id = entry.dataset_id.as_bytes();
    let mut buf = Vec::with_capacity(FIXED_RECORD_BYTES + id.len());
    buf.push(entry.op.as_byte());
    buf.extend_from_slice(&(id.len() as u32).to_le_bytes());
    buf.extend_from_slice(id);
    buf.extend_from_slice(&entry.timestamp.to_le_bytes());
    buf.extend_from_slice(&entry.prev_hash.bytes);
    buf.extend_from_slice(&entry.entry_hash.bytes);
    buf
}

/// Replay a ledger file, re-deriving every link. A missing file is an empty,
/// valid chain.
fn replay(path: &Path) -> Result<(Vec<AuditEntry>, Hash), LedgerError> {
    let mut head = genesis_hash();
    let mut entries = Vec::new();

    if !path.exists() {
        return Ok((entries, head));
    }

    let bytes = std::fs::read(path)?;
    let mut offset = 0usize;

    while offset < bytes.len() {
        let record_start = offset;
        if bytes.len() - offset < 1 + 4 {
            return Err(LedgerError::Truncated { offset: record_start });
        }
        let op_byte = bytes[offset];
        let op = TrainOp::from_byte(op_byte).ok_or(LedgerError::UnknownOp {
            op: op_byte,
            offset: record_start,
        })?;
        offset += 1;

        let id_len = u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap()) as usize;
        offset += 4;

        if bytes.len() - offset < id_len + 8 + 32 + 32 {
            return Err(LedgerError::Truncated { offset: record_start });
        }
        let dataset_id = String::from_utf8_lossy(&bytes[offset..offset + id_len]).into_owned();
        offset += id_len;

        let timestamp = i64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap());
        offset += 8;

        let prev_hash = Hash::from_bytes(bytes[offset..offset + 32].try_into().unwrap());
        offset += 32;
        let stored_hash = Hash::from_bytes(bytes[offset..offset + 32].try_into().unwrap());
        offset += 32;

        if prev_hash != head {
            return Err(LedgerError::ChainBroken {
                index: entries.len(),
                expected: head.to_hex(),
                got: prev_hash.to_hex(),
            });
        }
        let computed = entry_hash(&prev_hash, op, &dataset_id);
        if computed != stored_hash {
            return Err(LedgerError::ChainBroken {
                index: entries.len(),
                expected: computed.to_hex(),
                got: stored_hash.to_hex(),
            });
        }

        head = stored_hash.clone();
        entries.push(AuditEntry {
            op,
            dataset_id,
            timestamp,
            prev_hash,
            entry_hash: stored_hash,
        });
    }

    Ok((entries, head))
}

/// Append handle for one `(core_id, model_id)` chain. Opening verifies the
/// existing chain and caches its head; appends advance the cached head.
pub struct LedgerWriter {
    path: PathBuf,
    file: File,
    head: Hash,
}

impl LedgerWriter {
    pub fn open(root: &Path, core_id: &str, model_id: &str) -> Result<Self, LedgerError> {
        std::fs::create_dir_all(root)?;
        let path = ledger_path(root, core_id, model_id);
        let (_, head) = replay(&path)?;
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file, head })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current audit fingerprint: the genesis sentinel for an empty chain.
    pub fn head_hash(&self) -> &Hash {
        &self.head
    }

    /// Append one operation record and advance the chain head.
    ///
    /// `erase` history is never rewritten; an Erase record is a tombstone
    /// like any other link.
    pub fn append(
        &mut self,
        op: TrainOp,
        dataset_id: &str,
        timestamp: i64,
    ) -> Result<Hash, LedgerError> {
        if dataset_id.len() > MAX_DATASET_ID_BYTES {
            return Err(LedgerError::DatasetIdTooLong(dataset_id.len()));
        }
        let new_hash = entry_hash(&self.head, op, dataset_id);
        let entry = AuditEntry {
            op,
            dataset_id: dataset_id.to_string(),
            timestamp,
            prev_hash: self.head.clone(),
            entry_hash: new_hash.clone(),
        };
        self.file.write_all(&encode_record(&entry))?;
        self.file.flush()?;
        self.head = new_hash.clone();
        debug!(op = ?op, dataset_id, head = %self.head, "ledger append");
        Ok(new_hash)
    }
}

/// Replay the chain for a pair, recomputing every entry hash. `false` on the
/// first mismatch, unknown op, or truncated trailing record; I/O failures
/// surface as errors.
pub fn verify_chain(root: &Path, core_id: &str, model_id: &str) -> Result<bool, LedgerError> {
    match replay(&ledger_path(root, core_id, model_id)) {
        Ok(_) => Ok(true),
        Err(LedgerError::ChainBroken { .. })
        | Err(LedgerError::Truncated { .. })
        | Err(LedgerError::UnknownOp { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

/// All entries of a pair's chain, oldest first. Fails on a broken chain.
pub fn read_entries(
    root: &Path,
    core_id: &str,
    model_id: &str,
) -> Result<Vec<AuditEntry>, LedgerError> {
    replay(&ledger_path(root, core_id, model_id)).map(|(entries, _)| entries)
}

/// Chain head for a pair without holding a writer open.
pub fn head_hash(root: &Path, core_id: &str, model_id: &str) -> Result<Hash, LedgerError> {
    replay(&ledger_path(root, core_id, model_id)).map(|(_, head)| head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_is_fixed() {
        assert_eq!(genesis_hash(), genesis_hash());
        assert_eq!(genesis_hash(), sha256(b"mnemo.ledger.genesis.v1"));
    }

    #[test]
    fn op_bytes_round_trip() {
        for op in [TrainOp::Train, TrainOp::Retrain, TrainOp::Untrain, TrainOp::Erase] {
            assert_eq!(TrainOp::from_byte(op.as_byte()), Some(op));
        }
        assert_eq!(TrainOp::from_byte(0), None);
        assert_eq!(TrainOp::from_byte(5), None);
    }

    #[test]
    fn entry_hash_matches_formula() {
        let prev = genesis_hash();
        let mut preimage = prev.bytes.to_vec();
        preimage.push(1);
        preimage.extend_from_slice(b"set-a");
        assert_eq!(entry_hash(&prev, TrainOp::Train, "set-a"), sha256(&preimage));
    }

    #[test]
    fn ledger_path_is_stable_and_scoped() {
        let root = Path::new("/var/lib/mnemo");
        let a = ledger_path(root, "core", "model");
        assert_eq!(a, ledger_path(root, "core", "model"));
        assert_ne!(a, ledger_path(root, "core", "other"));
        assert_ne!(a, ledger_path(root, "other", "model"));
        // Hostile ids must not escape the root.
        let hostile = ledger_path(root, "../../etc", "x/../y");
        assert_eq!(hostile.parent(), Some(root));
    }
}
