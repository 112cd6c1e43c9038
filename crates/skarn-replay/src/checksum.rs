//! SHA-256 folding over marshaled simulation output.

use sha2::{Digest, Sha256};

/// Incremental SHA-256 over concatenated marshaled bytes.
#[derive(Default)]
pub struct DigestBuilder {
    hasher: Sha256,
}

impl DigestBuilder {
    /// A fresh builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in a byte chunk.
    pub fn fold(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Finish into a lowercase-hex digest.
    pub fn finish_hex(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}

/// One-shot digest of a byte chunk, lowercase hex.
pub fn digest_hex(bytes: &[u8]) -> String {
    let mut builder = DigestBuilder::new();
    builder.fold(bytes);
    builder.finish_hex()
}
