//! Reassembly buffer: fixed pools of "heads" (one per in-flight datagram)
//! and "holes" (one per fragment payload), with an offset-sorted chain of
//! holes per head expressed as indices rather than pointers (§9).
//!
//! This corrects three behaviors present in the original C reassembly
//! buffer that the specification calls out as bugs rather than features
//! to preserve:
//!
//! 1. a duplicate-offset insert now returns the existing head without
//!    consuming a hole or decrementing `remaining_fragments`, instead of
//!    silently double-counting;
//! 2. [`Rbuf::free`] walks the entire hole chain before clearing any of
//!    it, instead of clearing `next` before following it (which in the
//!    original stopped the walk after the first hole);
//! 3. [`Rbuf::copy_out`] bounds each copy by the destination length *and*
//!    the remaining datagram length *and* the fragment size, instead of
//!    only the latter two.

use crate::header::{Header, DATA_SIZE};
use crate::Error;

#[derive(Debug, Clone, Copy)]
struct Hole {
    used: bool,
    offset: u8,
    len: u8,
    data: [u8; DATA_SIZE],
    next: Option<u8>,
}

impl Hole {
    const fn new() -> Self {
        Hole {
            used: false,
            offset: 0,
            len: 0,
            data: [0u8; DATA_SIZE],
            next: None,
        }
    }
}

/// Reassembly record for one in-flight inbound datagram.
#[derive(Debug, Clone, Copy)]
pub struct Head {
    used: bool,
    hdr: Header,
    timestamp_ms: u32,
    /// Fragments still needed before the datagram is complete.
    pub remaining_fragments: u8,
    first: Option<u8>,
}

impl Head {
    const fn new() -> Self {
        Head {
            used: false,
            hdr: Header {
                from: crate::addr::Addr(0),
                to: crate::addr::Addr(0),
                id: 0,
                length: 0,
                offset: 0,
                next: 0,
            },
            timestamp_ms: 0,
            remaining_fragments: 0,
            first: None,
        }
    }

    /// The header this head was allocated for.
    pub fn header(&self) -> &Header {
        &self.hdr
    }

    /// True once every fragment has arrived.
    pub fn is_complete(&self) -> bool {
        self.remaining_fragments == 0
    }
}

/// Fixed-capacity reassembly buffer: `H` heads, `L` holes, no heap.
pub struct Rbuf<const H: usize, const L: usize> {
    heads: [Head; H],
    holes: [Hole; L],
}

impl<const H: usize, const L: usize> Rbuf<H, L> {
    /// Create an empty buffer with every head and hole unused.
    pub fn new() -> Self {
        Rbuf {
            heads: [Head::new(); H],
            holes: [Hole::new(); L],
        }
    }

    /// Borrow a head by index, as returned by [`Rbuf::add`].
    pub fn head(&self, idx: usize) -> &Head {
        &self.heads[idx]
    }

    /// Insert one fragment's payload for `hdr`, locating or allocating its
    /// head, then splicing a hole into the offset-sorted chain.
    ///
    /// Returns the head's index. A duplicate offset for an already-present
    /// hole is accepted without effect: the head is returned unchanged.
    pub fn add(&mut self, hdr: &Header, data: &[u8], now_ms: u32) -> Result<usize, Error> {
        let mut found: Option<usize> = None;
        let mut free_head: Option<usize> = None;

        for (i, head) in self.heads.iter().enumerate() {
            if head.used {
                if head.hdr.from == hdr.from
                    && head.hdr.to == hdr.to
                    && head.hdr.length == hdr.length
                    && head.hdr.id == hdr.id
                {
                    found = Some(i);
                    break;
                }
            } else if free_head.is_none() {
                free_head = Some(i);
            }
        }

        let head_idx = match found {
            Some(i) => {
                log::trace!("rbuf: found existing head for id {}", hdr.id);
                i
            }
            None => {
                let i = free_head.ok_or_else(|| {
                    log::warn!("rbuf: no heads free");
                    Error::PoolExhausted
                })?;

                self.heads[i] = Head {
                    used: true,
                    hdr: *hdr,
                    timestamp_ms: now_ms,
                    remaining_fragments: hdr.fragments(),
                    first: None,
                };

                log::debug!(
                    "rbuf: allocated head for {} fragments",
                    self.heads[i].remaining_fragments
                );

                i
            }
        };

        // Reject a duplicate offset before touching the hole pool.
        {
            let mut cursor = self.heads[head_idx].first;
            while let Some(hole_idx) = cursor {
                if self.holes[hole_idx as usize].offset == hdr.offset {
                    log::trace!("rbuf: redundant insert at offset {} ignored", hdr.offset);
                    return Ok(head_idx);
                }
                cursor = self.holes[hole_idx as usize].next;
            }
        }

        let free_hole = self.holes.iter().position(|h| !h.used);
        let hole_idx = match free_hole {
            Some(i) => i,
            None => {
                log::warn!("rbuf: no holes free");
                return Err(Error::PoolExhausted);
            }
        };

        let len = data.len().min(DATA_SIZE);
        let mut slot = [0u8; DATA_SIZE];
        slot[..len].copy_from_slice(&data[..len]);

        self.holes[hole_idx] = Hole {
            used: true,
            offset: hdr.offset,
            len: len as u8,
            data: slot,
            next: None,
        };

        // Splice into the offset-sorted chain.
        let head = &mut self.heads[head_idx];
        match head.first {
            None => {
                head.first = Some(hole_idx as u8);
            }
            Some(first) => {
                let mut prev: Option<u8> = None;
                let mut cursor = Some(first);

                while let Some(c) = cursor {
                    if self.holes[c as usize].offset > hdr.offset {
                        break;
                    }
                    prev = Some(c);
                    cursor = self.holes[c as usize].next;
                }

                self.holes[hole_idx].next = cursor;

                match prev {
                    None => head.first = Some(hole_idx as u8),
                    Some(p) => self.holes[p as usize].next = Some(hole_idx as u8),
                }
            }
        }

        head.remaining_fragments -= 1;
        log::trace!("rbuf: {} fragments left", head.remaining_fragments);

        Ok(head_idx)
    }

    /// Free every head whose lifetime has expired: `timestamp_ms + lifetime_ms < now_ms`.
    pub fn gc(&mut self, now_ms: u32, lifetime_ms: u32) {
        for i in 0..H {
            if self.heads[i].used && self.heads[i].timestamp_ms + lifetime_ms < now_ms {
                log::debug!("rbuf: head with id {} expired", self.heads[i].hdr.id);
                self.free(i);
            }
        }
    }

    /// Release a head and every hole in its chain.
    pub fn free(&mut self, head_idx: usize) {
        let mut cursor = self.heads[head_idx].first;

        while let Some(hole_idx) = cursor {
            let next = self.holes[hole_idx as usize].next;
            self.holes[hole_idx as usize].used = false;
            self.holes[hole_idx as usize].next = None;
            cursor = next;
        }

        self.heads[head_idx].used = false;
        self.heads[head_idx].first = None;
    }

    /// Copy a complete datagram's payload out of the chain, in order.
    ///
    /// Fails if the head is still incomplete. Each hole contributes
    /// `min(DATA_SIZE, dest.len() - copied, hdr.length - copied)` bytes.
    pub fn copy_out(&self, head_idx: usize, dest: &mut [u8]) -> Result<usize, Error> {
        let head = &self.heads[head_idx];

        if !head.is_complete() {
            log::warn!("rbuf: missing {} fragments", head.remaining_fragments);
            return Err(Error::PoolExhausted);
        }

        let total = head.hdr.length as usize;
        let mut copied = 0usize;
        let mut cursor = head.first;

        while let Some(hole_idx) = cursor {
            if copied >= dest.len() || copied >= total {
                break;
            }

            let hole = &self.holes[hole_idx as usize];
            let n = DATA_SIZE.min(dest.len() - copied).min(total - copied);

            dest[copied..copied + n].copy_from_slice(&hole.data[..n]);
            copied += n;

            cursor = hole.next;
        }

        Ok(copied)
    }
}

impl<const H: usize, const L: usize> Default for Rbuf<H, L> {
    fn default() -> Self {
        Self::new()
    }
}
