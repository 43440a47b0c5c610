use crate::helpe::*;

// All fitting functions expect `blocks` to be address-ordered, which is
// what an `Arena` hands out. They return an index into `blocks`.

/// Lowest-addressed free block with room for `size` bytes.
pub fn first_fit(blocks: &[MemoryBlock], size: ByteSteps) -> Option<usize> {
    blocks.iter()
        .position(|b| b.fits(size))
}

/// Smallest free block with room for `size` bytes. Among equally
/// small ones, the lowest-addressed wins.
pub fn best_fit(blocks: &[MemoryBlock], size: ByteSteps) -> Option<usize> {
    blocks.iter()
        .enumerate()
        .filter(|(_, b)| b.fits(size))
        .min_by(|(_, a), (_, b)| {
            a.size.cmp(&b.size)
                .then(a.start_address.cmp(&b.start_address))
        })
        .map(|(idx, _)| idx)
}

/// Largest free block with room for `size` bytes. Among equally
/// large ones, the lowest-addressed wins.
pub fn worst_fit(blocks: &[MemoryBlock], size: ByteSteps) -> Option<usize> {
    blocks.iter()
        .enumerate()
        .filter(|(_, b)| b.fits(size))
        .min_by(|(_, a), (_, b)| {
            b.size.cmp(&a.size)
                .then(a.start_address.cmp(&b.start_address))
        })
        .map(|(idx, _)| idx)
}

/// First fit over one circular pass that starts at the first block at or
/// past address `cursor` (or at the bottom of memory if there is no
/// cursor yet, or nothing lies past it).
///
/// The cursor is an address rather than an index: coalescing below it
/// shifts indices around but leaves it pointing at the same spot.
pub fn next_fit(blocks: &[MemoryBlock], size: ByteSteps, cursor: Option<ByteSteps>) -> Option<usize> {
    let n = blocks.len();
    if n == 0 { return None; }
    let first = cursor
        .and_then(|c| blocks.iter().position(|b| b.start_address >= c))
        .unwrap_or(0);

    (0..n)
        .map(|i| (first + i) % n)
        .find(|&idx| blocks[idx].fits(size))
}

/// The outcome of a placement query: where to put the process (if
/// anywhere), and the policy state to carry on with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub index:  Option<usize>,
    /// Where the next Next-Fit scan resumes: right past the last placement.
    pub cursor: Option<ByteSteps>,
}

/// A placement policy instance. Only Next-Fit actually has state (its
/// cursor), which lives here and nowhere else. Build a fresh one for
/// every run.
#[derive(Debug, Clone)]
pub struct Placer {
    policy: FitPolicy,
    cursor: Option<ByteSteps>,
}

impl Placer {
    pub fn new(policy: FitPolicy) -> Self {
        Self { policy, cursor: None }
    }

    #[inline(always)]
    pub fn policy(&self) -> FitPolicy {
        self.policy
    }

    #[inline(always)]
    pub fn cursor(&self) -> Option<ByteSteps> {
        self.cursor
    }

    /// Pure: neither `blocks` nor `self` is touched.
    pub fn decide(&self, blocks: &[MemoryBlock], size: ByteSteps) -> Decision {
        let index = match self.policy {
            FitPolicy::First    => first_fit(blocks, size),
            FitPolicy::Best     => best_fit(blocks, size),
            FitPolicy::Worst    => worst_fit(blocks, size),
            FitPolicy::Next     => next_fit(blocks, size, self.cursor),
        };
        let cursor = match (self.policy, index) {
            (FitPolicy::Next, Some(idx))    => Some(blocks[idx].start_address + size),
            _                               => self.cursor,
        };

        Decision { index, cursor }
    }

    /// Adopts the state carried by `d`.
    pub fn commit(&mut self, d: Decision) -> Option<usize> {
        self.cursor = d.cursor;
        d.index
    }

    /// [`Placer::decide`] followed by [`Placer::commit`].
    pub fn place(&mut self, blocks: &[MemoryBlock], size: ByteSteps) -> Option<usize> {
        let d = self.decide(blocks, size);
        self.commit(d)
    }
}
