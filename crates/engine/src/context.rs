//! Caller-owned, ephemeral context. Never persisted — only its digest over
//! the concatenated blob bytes ever outlives the call that built it.

use mnemo_common::{sha256, Hash};

#[derive(Debug, Clone)]
pub struct Blob {
    pub media_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Context {
    session_id: String,
    timestamp: i64,
    blobs: Vec<Blob>,
}

impl Context {
    pub fn new(session_id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp,
            blobs: Vec::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn add_blob(&mut self, media_type: impl Into<String>, data: Vec<u8>) {
        self.blobs.push(Blob {
            media_type: media_type.into(),
            data,
        });
    }

    pub fn blobs(&self) -> &[Blob] {
        &self.blobs
    }

    /// SHA-256 over the blob data bytes, concatenated in insertion order.
    pub fn hash(&self) -> Hash {
        let total: usize = self.blobs.iter().map(|b| b.data.len()).sum();
        let mut bytes = Vec::with_capacity(total);
        for blob in &self.blobs {
            bytes.extend_from_slice(&blob.data);
        }
        sha256(&bytes)
    }
}
