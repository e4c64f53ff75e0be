//! A single Fortuna entropy pool: an incremental SHA-256 context plus a
//! running byte count used to gate reseeding.

use sha2::{Digest, Sha256};

pub struct Pool {
    ctx: Sha256,
    len: u32,
}

impl Pool {
    pub fn new() -> Self {
        Pool {
            ctx: Sha256::new(),
            len: 0,
        }
    }

    /// Total bytes of entropy accumulated since the last reseed that drew
    /// from this pool.
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Mix in `data` from `source_id`, per §4.5: the SHA-256 context is
    /// updated with a two-byte `(source_id, len)` header followed by the
    /// data itself.
    pub fn add_entropy(&mut self, source_id: u8, data: &[u8]) {
        self.ctx.update([source_id, data.len() as u8]);
        self.ctx.update(data);
        self.len += data.len() as u32;
    }

    /// Finalize the running digest, reset the context and byte count, and
    /// return the 32-byte digest for mixing into the generator's key.
    pub fn finalize_and_reset(&mut self) -> [u8; 32] {
        let finished = core::mem::replace(&mut self.ctx, Sha256::new());
        let digest = finished.finalize();
        self.len = 0;

        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        out
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}
