use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

pub const HASH_ALGORITHM: &str = "sha256";

/// A fixed SHA-256 digest. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hash {
    pub algorithm: String,
    pub bytes: [u8; 32],
}

impl Hash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self {
            algorithm: HASH_ALGORITHM.to_string(),
            bytes,
        }
    }

    /// Render as "sha256:<hex>".
    pub fn to_hex(&self) -> String {
        format!("{}:{}", self.algorithm, hex::encode(self.bytes))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, hex::encode(self.bytes))
    }
}

pub fn sha256(bytes: &[u8]) -> Hash {
    let mut h = Sha256::new();
    h.update(bytes);
    Hash::from_bytes(h.finalize().into())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    sha256(bytes).to_hex()
}

/// Canonical byte form of an f32 slice: concatenated little-endian words.
pub fn f32s_to_bytes(v: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(v.len() * 4);
    for &x in v {
        bytes.extend_from_slice(&x.to_le_bytes());
    }
    bytes
}
