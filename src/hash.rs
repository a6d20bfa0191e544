use sha2::{Digest as _, Sha256};

/// Size in bytes of every digest produced by this module.
pub const DIGEST_SIZE: usize = 32;

/// A finalized SHA-256 digest.
pub type Digest = [u8; DIGEST_SIZE];

/// Represents a block as 128 bits (16 bytes)
pub type Block = [u8; 16];

/// Incremental SHA-256 accumulator.
///
/// Absorbing is order-sensitive but independent of how the input is chunked:
/// `absorb(b"ab"); absorb(b"cd")` finalizes to the same digest as
/// `absorb(b"abcd")`. Finalization consumes the accumulator, so absorbing
/// after finalize does not type-check.
#[derive(Clone, Default)]
pub struct DigestAccumulator {
    hasher: Sha256,
}

impl DigestAccumulator {
    /// Creates a fresh accumulator
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    /// Adds data to the hash input
    pub fn absorb(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Computes the final digest, consuming the accumulator
    pub fn finalize(self) -> Digest {
        self.hasher.finalize().into()
    }

    /// Computes a SHA-256 hash in one step
    pub fn hash_once(data: &[u8]) -> Digest {
        let mut hash = Self::new();
        hash.absorb(data);
        hash.finalize()
    }

    /// Computes a 128-bit block (first 16 bytes of the SHA-256 digest)
    pub fn hash_for_block(data: &[u8]) -> Block {
        let digest = Self::hash_once(data);
        let mut block = [0u8; 16];
        block.copy_from_slice(&digest[..16]);
        block
    }

    /// Key derivation: `H(point || id)` truncated to one block.
    pub fn kdf(point: &[u8], id: u64) -> Block {
        let mut hash = Self::new();
        hash.absorb(point);
        hash.absorb(&id.to_le_bytes());
        let digest = hash.finalize();
        let mut block = [0u8; 16];
        block.copy_from_slice(&digest[..16]);
        block
    }
}

/// Renders bytes as lowercase hex.
pub fn to_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    out
}
