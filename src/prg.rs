use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;
use rand::Rng;

use crate::hash::Block;

/// AES-128 in counter mode.
///
/// Two instances built from the same seed and id produce the same stream,
/// which is what lets both parties expand base-OT keys identically.
pub struct PRG {
    counter: u64,
    aes: Aes128,
}

impl PRG {
    /// Create a new PRG instance with an optional seed and ID.
    pub fn new(seed: Option<&Block>, id: u64) -> Self {
        let mut key = match seed {
            Some(s) => *s,
            None => PRG::generate_random_key(),
        };
        PRG::apply_id_to_key(&mut key, id);

        PRG {
            counter: 0,
            aes: Aes128::new(GenericArray::from_slice(&key)),
        }
    }

    /// Generate a random 16-byte key using a secure random generator.
    fn generate_random_key() -> Block {
        let mut key = [0u8; 16];
        rand::thread_rng().fill(&mut key);
        key
    }

    /// Apply the ID to the key for reseeding purposes.
    fn apply_id_to_key(key: &mut Block, id: u64) {
        for (k, b) in key.iter_mut().zip(id.to_le_bytes()) {
            *k ^= b;
        }
    }

    /// Reseed the PRG with a new seed and ID.
    pub fn reseed(&mut self, seed: &Block, id: u64) {
        *self = PRG::new(Some(seed), id);
    }

    /// Generate `blocks.len()` random 16-byte blocks in-place.
    pub fn random_block(&mut self, blocks: &mut [Block]) {
        let mut aes_blocks: Vec<_> = (0..blocks.len() as u64)
            .map(|i| {
                let mut input = [0u8; 16];
                input[8..].copy_from_slice(&(self.counter + i).to_le_bytes());
                GenericArray::clone_from_slice(&input)
            })
            .collect();
        self.aes.encrypt_blocks(&mut aes_blocks);
        for (block, encrypted) in blocks.iter_mut().zip(aes_blocks.iter()) {
            block.copy_from_slice(encrypted);
        }
        self.counter += blocks.len() as u64;
    }

    /// Same stream as [`PRG::random_block`], read as little-endian words.
    pub fn random_words(&mut self, words: &mut [u128]) {
        let mut blocks = vec![[0u8; 16]; words.len()];
        self.random_block(&mut blocks);
        for (word, block) in words.iter_mut().zip(blocks) {
            *word = u128::from_le_bytes(block);
        }
    }
}
