//! The Fortuna AES-CTR block generator: a 32-byte key and a 128-bit
//! little-endian counter, where counter `0` means "never seeded".

use aes::Aes256;
use cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::Error;

pub const KEY_LEN: usize = 32;
pub const BLOCK_LEN: usize = 16;

/// Maximum bytes servable by a single `generate_data` call (2^20).
pub const MAX_REQUEST_LEN: usize = 1 << 20;

pub struct Generator {
    key: [u8; KEY_LEN],
    counter: u128,
}

impl Generator {
    pub const fn new() -> Self {
        Generator {
            key: [0u8; KEY_LEN],
            counter: 0,
        }
    }

    /// `false` until the first successful reseed; never reverts to `false`
    /// afterwards.
    pub fn is_seeded(&self) -> bool {
        self.counter != 0
    }

    fn increment_counter(&mut self) {
        self.counter = self.counter.wrapping_add(1);
    }

    /// Mix `seed` into the key: `key <- SHA256(key || seed)`, then
    /// increment the counter, transitioning Unseeded -> Seeded on the
    /// first call.
    pub fn reseed(&mut self, seed: &[u8]) {
        let mut hasher = Sha256::new();
        hasher.update(self.key);
        hasher.update(seed);
        let digest = hasher.finalize();

        self.key.copy_from_slice(&digest);
        self.increment_counter();
    }

    /// AES-encrypt the counter into successive blocks, incrementing the
    /// counter after each one. `out` is filled in whole `BLOCK_LEN` chunks;
    /// `out.len()` must be a multiple of `BLOCK_LEN`.
    fn generate_blocks(&mut self, out: &mut [u8]) {
        debug_assert_eq!(out.len() % BLOCK_LEN, 0);

        let cipher = Aes256::new(GenericArray::from_slice(&self.key));

        for block in out.chunks_mut(BLOCK_LEN) {
            let mut buf = GenericArray::clone_from_slice(&self.counter.to_le_bytes());
            cipher.encrypt_block(&mut buf);
            block.copy_from_slice(&buf);
            self.increment_counter();
        }
    }

    /// Fill `out` with `out.len()` bytes of keystream, then immediately
    /// rekey by generating two further blocks and overwriting the key with
    /// them (forward-secrecy rekeying). A no-op for an empty `out`.
    pub fn generate_data(&mut self, out: &mut [u8]) -> Result<(), Error> {
        if out.len() > MAX_REQUEST_LEN {
            return Err(Error::TooLarge);
        }

        if !self.is_seeded() {
            return Err(Error::Unseeded);
        }

        if out.is_empty() {
            return Ok(());
        }

        let full_blocks_len = (out.len() / BLOCK_LEN) * BLOCK_LEN;
        self.generate_blocks(&mut out[..full_blocks_len]);

        let remainder = out.len() - full_blocks_len;
        if remainder > 0 {
            let mut tail = [0u8; BLOCK_LEN];
            self.generate_blocks(&mut tail);
            out[full_blocks_len..].copy_from_slice(&tail[..remainder]);
            tail.zeroize();
        }

        let mut new_key = [0u8; KEY_LEN];
        self.generate_blocks(&mut new_key);
        self.key.copy_from_slice(&new_key);
        new_key.zeroize();

        Ok(())
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Generator {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unseeded_generator_refuses_reads() {
        let mut gen = Generator::new();
        let mut out = [0u8; 16];
        assert_eq!(gen.generate_data(&mut out), Err(Error::Unseeded));
    }

    #[test]
    fn reseed_transitions_to_seeded_and_never_reverts() {
        let mut gen = Generator::new();
        assert!(!gen.is_seeded());

        gen.reseed(b"some entropy");
        assert!(gen.is_seeded());

        let mut out = [0u8; 16];
        gen.generate_data(&mut out).unwrap();
        assert!(gen.is_seeded());
    }

    #[test]
    fn property_8_forward_secrecy() {
        let mut gen = Generator::new();
        gen.reseed(b"seed");

        let mut first = [0u8; 32];
        gen.generate_data(&mut first).unwrap();

        let mut second = [0u8; 32];
        gen.generate_data(&mut second).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn max_request_len_matches_spec() {
        assert_eq!(MAX_REQUEST_LEN, 1 << 20);
    }

    #[test]
    fn empty_request_is_a_no_op() {
        let mut gen = Generator::new();
        gen.reseed(b"seed");

        let before = gen.counter;
        gen.generate_data(&mut []).unwrap();
        assert_eq!(gen.counter, before);
    }
}
