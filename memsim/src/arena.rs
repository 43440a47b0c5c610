//! The partitioned memory itself.
//!
//! An [`Arena`] owns an address-ordered vector of [`MemoryBlock`]s that
//! covers `[0, total)` without gaps or overlaps. Placement policies only
//! *look* at it. All mutation (splitting, freeing, coalescing) happens
//! through the methods below, each of which restores the ordering
//! invariant before returning.
use crate::helpe::*;

/// Partitions `[0, total)` into `block_size`-sized free blocks. If
/// `total` is not a multiple of `block_size`, a final block takes the
/// remainder. Ids are `0..n` in address order.
///
/// A zero `block_size` is treated as "one block spanning everything".
pub fn initialize(total: ByteSteps, block_size: ByteSteps) -> Vec<MemoryBlock> {
    let step = if block_size == 0 { total.max(1) } else { block_size };
    let mut res = Vec::with_capacity(total.div_ceil(step));
    let mut start = 0;
    while start < total {
        let size = step.min(total - start);
        res.push(MemoryBlock::new_free(res.len() as u32, start, size));
        start += size;
    }

    res
}

/// Sorts `blocks` by start address and merges every run of abutting free
/// blocks into one. Ids are re-packed to `0..k` afterwards, so coalescing
/// an already coalesced arena is a no-op.
pub fn coalesce(mut blocks: Vec<MemoryBlock>) -> Vec<MemoryBlock> {
    blocks.sort_unstable_by_key(|b| b.start_address);
    let mut res: Vec<MemoryBlock> = Vec::with_capacity(blocks.len());
    for b in blocks {
        match res.last_mut() {
            Some(prev) if prev.is_free() && b.is_free() && prev.abuts(&b) => {
                prev.end_address = b.end_address;
                prev.size = prev.end_address - prev.start_address;
            },
            _   => { res.push(b); }
        }
    }
    for (id, b) in res.iter_mut().enumerate() {
        b.id = id as u32;
    }

    res
}

#[derive(Debug, Clone)]
pub struct Arena {
    blocks:     Vec<MemoryBlock>,
    total:      ByteSteps,
    // Arena-local id counter. Never handed out twice between
    // two coalescing passes.
    next_id:    u32,
}

impl Arena {
    pub fn new(total: ByteSteps, block_size: ByteSteps) -> Self {
        let blocks = initialize(total, block_size);
        let next_id = blocks.len() as u32;

        Self { blocks, total, next_id }
    }

    /// Adopts an existing partitioning, e.g. one replayed from a recorded
    /// step. Fails if the blocks don't partition `[0, total)`.
    pub fn from_blocks(mut blocks: Vec<MemoryBlock>, total: ByteSteps) -> Result<Self, InvariantError> {
        blocks.sort_unstable_by_key(|b| b.start_address);
        crate::analyze::check_blocks(&blocks, total)?;
        let next_id = blocks.iter()
            .map(|b| b.id + 1)
            .max()
            .unwrap_or(0);

        Ok(Self { blocks, total, next_id })
    }

    #[inline(always)]
    pub fn blocks(&self) -> &[MemoryBlock] {
        &self.blocks
    }

    #[inline(always)]
    pub fn total(&self) -> ByteSteps {
        self.total
    }

    /// A private deep copy, safe to keep around while the arena moves on.
    #[inline(always)]
    pub fn snapshot(&self) -> Vec<MemoryBlock> {
        self.blocks.clone()
    }

    /// Hands the free block at `idx` to `pid`, shrinking it to exactly
    /// `requested` bytes. Leftover space becomes a new free block right
    /// after it.
    ///
    /// Returns copies of the (now allocated) block and of the remainder,
    /// if any.
    pub fn split(
        &mut self,
        idx:        usize,
        pid:        &str,
        requested:  ByteSteps,
    ) -> (MemoryBlock, Option<MemoryBlock>) {
        let target = &mut self.blocks[idx];
        debug_assert!(target.fits(requested), "Bad split requested!");
        debug_assert!(requested > 0, "Zero-sized split requested!");
        let spare = target.size - requested;
        target.assign(pid, requested);
        let updated = target.clone();
        let remainder = if spare > 0 {
            let rest = MemoryBlock::new_free(self.next_id, updated.end_address, spare);
            self.next_id += 1;
            self.blocks.insert(idx + 1, rest.clone());
            Some(rest)
        } else { None };

        (updated, remainder)
    }

    /// Marks every block owned by `pid` as free. Returns how many
    /// bytes were reclaimed. Neighbouring free blocks are *not*
    /// merged: that's [`Arena::coalesce`]'s job.
    pub fn free(&mut self, pid: &str) -> ByteSteps {
        self.blocks.iter_mut()
            .filter(|b| b.is_owned_by(pid))
            .fold(0, |sum, b| {
                b.release();
                sum + b.size
            })
    }

    pub fn coalesce(&mut self) {
        self.blocks = coalesce(std::mem::take(&mut self.blocks));
        self.next_id = self.blocks.len() as u32;
    }

    pub fn free_bytes(&self) -> ByteSteps {
        self.blocks.iter()
            .filter(|b| b.is_free())
            .map(|b| b.size)
            .sum()
    }

    pub fn allocated_bytes(&self) -> ByteSteps {
        self.total - self.free_bytes()
    }

    pub fn largest_free(&self) -> ByteSteps {
        self.blocks.iter()
            .filter(|b| b.is_free())
            .map(|b| b.size)
            .max()
            .unwrap_or(0)
    }
}
