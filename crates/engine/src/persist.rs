//! Model persistence: a single binary file with a trailing integrity digest.
//!
//! Layout (all integers and floats little-endian):
//!
//! ```text
//! magic u32 | version u32 | input_size u64 | output_size u64
//! name 128 bytes (UTF-8, NUL-padded)
//! memory_capacity u64 | memory_len u64
//! memory_len x { embedding E f32 | output E f32 | timestamp i64 | id 64 bytes }
//! (input_size * output_size) x f32
//! integrity 32 bytes = SHA256 over everything above
//! ```
//!
//! Loads fail closed: a file that does not verify yields no model at all.

use crate::error::EngineError;
use crate::model::{Model, FORMAT_VERSION};
use mnemo_common::{sha256, Hash};
use mnemo_memory::{MemoryRecord, MemoryStore};
use mnemo_projection::LinearProjection;
use std::path::Path;
use tracing::{info, warn};

pub const MAGIC: u32 = 0x4F4D_4E4D; // "MNMO" in little-endian byte order
const NAME_FIELD_BYTES: usize = 128;
const ID_FIELD_BYTES: usize = 64;

fn put_padded(buf: &mut Vec<u8>, s: &str, width: usize, what: &'static str) -> Result<(), EngineError> {
    let bytes = s.as_bytes();
    if bytes.len() > width {
        return Err(EngineError::InvalidArgument(what));
    }
    buf.extend_from_slice(bytes);
    buf.resize(buf.len() + (width - bytes.len()), 0);
    Ok(())
}

fn encode_body(model: &Model) -> Result<Vec<u8>, EngineError> {
    let memory = model.memory();
    let weights = model.projection().weights();

    let mut buf = Vec::new();
    buf.extend_from_slice(&MAGIC.to_le_bytes());
    buf.extend_from_slice(&model.version().to_le_bytes());
    buf.extend_from_slice(&(model.input_size() as u64).to_le_bytes());
    buf.extend_from_slice(&(model.output_size() as u64).to_le_bytes());
    put_padded(&mut buf, model.name(), NAME_FIELD_BYTES, "model name exceeds 128 bytes")?;
    buf.extend_from_slice(&(memory.capacity() as u64).to_le_bytes());
    buf.extend_from_slice(&(memory.len() as u64).to_le_bytes());

    for record in memory.iter() {
        buf.extend_from_slice(&mnemo_common::f32s_to_bytes(&record.embedding));
        buf.extend_from_slice(&mnemo_common::f32s_to_bytes(&record.output));
        buf.extend_from_slice(&record.timestamp.to_le_bytes());
        put_padded(
            &mut buf,
            record.id.as_deref().unwrap_or(""),
            ID_FIELD_BYTES,
            "memory record id exceeds 64 bytes",
        )?;
    }

    buf.extend_from_slice(&mnemo_common::f32s_to_bytes(weights));
    Ok(buf)
}

/// The digest a saved file would carry: a content fingerprint of the model.
pub fn model_digest(model: &Model) -> Result<Hash, EngineError> {
    Ok(sha256(&encode_body(model)?))
}

/// Serialize `model` to `path`, appending the integrity digest.
pub fn save_model(model: &Model, path: &Path) -> Result<(), EngineError> {
    let mut buf = encode_body(model)?;
    let digest = sha256(&buf);
    buf.extend_from_slice(&digest.bytes);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &buf)?;
    info!(path = %path.display(), bytes = buf.len(), model = model.name(), "model saved");
    Ok(())
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], EngineError> {
        if self.buf.len() - self.pos < n {
            return Err(EngineError::Truncated(what));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, EngineError> {
        Ok(u32::from_le_bytes(self.take(4, what)?.try_into().unwrap()))
    }

    fn u64_size(&mut self, what: &'static str) -> Result<usize, EngineError> {
        let v = u64::from_le_bytes(self.take(8, what)?.try_into().unwrap());
        usize::try_from(v).map_err(|_| EngineError::BadFormat("size field overflows usize"))
    }

    fn i64(&mut self, what: &'static str) -> Result<i64, EngineError> {
        Ok(i64::from_le_bytes(self.take(8, what)?.try_into().unwrap()))
    }

    fn f32s(&mut self, count: usize, what: &'static str) -> Result<Vec<f32>, EngineError> {
        let n = count
            .checked_mul(4)
            .ok_or(EngineError::BadFormat("vector length overflows usize"))?;
        let bytes = self.take(n, what)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
            .collect())
    }

    fn padded_str(&mut self, width: usize, what: &'static str) -> Result<String, EngineError> {
        let raw = self.take(width, what)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(width);
        std::str::from_utf8(&raw[..end])
            .map(|s| s.to_string())
            .map_err(|_| EngineError::BadFormat("string field is not UTF-8"))
    }
}

/// Read a model file, verifying format and integrity.
///
/// Fail-closed contract: any magic/version mismatch is `BadFormat`, any
/// short read is `Truncated`, and a digest mismatch is `IntegrityViolation`;
/// in every case no model object is produced.
pub fn load_model(path: &Path) -> Result<Model, EngineError> {
    let bytes = std::fs::read(path)?;
    let mut r = Reader {
        buf: &bytes,
        pos: 0,
    };

    let magic = r.u32("magic")?;
    if magic != MAGIC {
        return Err(EngineError::BadFormat("bad magic number"));
    }
    let version = r.u32("version")?;
    if version != FORMAT_VERSION {
        return Err(EngineError::BadFormat("unsupported format version"));
    }

    let input_size = r.u64_size("input_size")?;
    let output_size = r.u64_size("output_size")?;
    if input_size == 0 || output_size == 0 {
        return Err(EngineError::BadFormat("zero model size"));
    }
    let name = r.padded_str(NAME_FIELD_BYTES, "name")?;
    if name.is_empty() {
        return Err(EngineError::BadFormat("empty model name"));
    }

    let memory_capacity = r.u64_size("memory_capacity")?;
    let memory_len = r.u64_size("memory_len")?;
    if memory_capacity == 0 {
        return Err(EngineError::BadFormat("zero memory capacity"));
    }
    if memory_len > memory_capacity {
        return Err(EngineError::BadFormat("memory_len exceeds capacity"));
    }

    let mut records = Vec::new();
    for _ in 0..memory_len {
        let embedding = r.f32s(input_size, "memory record embedding")?;
        let output = r.f32s(input_size, "memory record output")?;
        let timestamp = r.i64("memory record timestamp")?;
        let id = r.padded_str(ID_FIELD_BYTES, "memory record id")?;
        records.push(MemoryRecord {
            embedding,
            output,
            id: if id.is_empty() { None } else { Some(id) },
            timestamp,
        });
    }

    let weight_count = input_size
        .checked_mul(output_size)
        .ok_or(EngineError::BadFormat("weight count overflows usize"))?;
    let weights = r.f32s(weight_count, "weights")?;

    let body_end = r.pos;
    let stored = r.take(32, "integrity trailer")?;
    if r.pos != bytes.len() {
        return Err(EngineError::BadFormat("trailing bytes after integrity hash"));
    }

    let computed = sha256(&bytes[..body_end]);
    if computed.bytes.as_slice() != stored {
        warn!(path = %path.display(), "model file failed integrity verification");
        return Err(EngineError::IntegrityViolation);
    }

    // Digest verified; only now materialize the model.
    let projection = LinearProjection::new(input_size, output_size, weights)?;
    let mut memory = MemoryStore::new(input_size, memory_capacity)?;
    for record in &records {
        memory.add(
            &record.embedding,
            &record.output,
            record.id.as_deref(),
            record.timestamp,
        )?;
    }

    let trained = projection.weights().iter().any(|w| *w != 0.0);
    let model = Model::from_parts(name, version, trained, projection, memory);
    info!(path = %path.display(), model = model.name(), "model loaded");
    Ok(model)
}
