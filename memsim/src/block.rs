use crate::helpe::*;

impl MemoryBlock {
    /// Creates a free block covering `[start, start + size)`.
    pub fn new_free(id: u32, start: ByteSteps, size: ByteSteps) -> Self {
        Self {
            id,
            size,
            allocated:      false,
            process_id:     None,
            start_address:  start,
            end_address:    start + size,
        }
    }

    #[inline(always)]
    pub fn is_free(&self) -> bool {
        !self.allocated
    }

    /// Returns `true` if the block is free and at least `size` bytes long.
    #[inline(always)]
    pub fn fits(&self, size: ByteSteps) -> bool {
        self.is_free() && self.size >= size
    }

    #[inline(always)]
    pub fn is_owned_by(&self, pid: &str) -> bool {
        self.process_id.as_deref() == Some(pid)
    }

    /// Returns `true` if `other` starts exactly where `self` ends.
    #[inline(always)]
    pub fn abuts(&self, other: &Self) -> bool {
        self.end_address == other.start_address
    }

    /// Half-open address range `[start, end)`.
    #[inline(always)]
    pub fn extent(&self) -> (ByteSteps, ByteSteps) {
        (self.start_address, self.end_address)
    }

    pub(crate) fn assign(&mut self, pid: &str, size: ByteSteps) {
        self.allocated = true;
        self.process_id = Some(pid.to_owned());
        self.size = size;
        self.end_address = self.start_address + size;
    }

    pub(crate) fn release(&mut self) {
        self.allocated = false;
        self.process_id = None;
    }
}

impl fmt::Display for MemoryBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.process_id {
            Some(ref pid)   => write!(f, "[{}, {}) {}", self.start_address, self.end_address, pid),
            None            => write!(f, "[{}, {}) free", self.start_address, self.end_address),
        }
    }
}
