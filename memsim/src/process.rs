use crate::helpe::*;

impl Process {
    pub fn new(id: String, spec: &ProcSpec) -> Self {
        Self {
            id,
            size:           spec.size,
            arrival_time:   spec.arrival_time,
            burst_time:     spec.burst_time,
            allocated:      false,
            start_address:  None,
            end_address:    None,
            admitted_at:    None,
            released_at:    None,
        }
    }

    /// Returns `true` if the process may be considered for placement at `t`.
    #[inline(always)]
    pub fn has_arrived(&self, t: ByteSteps) -> bool {
        self.arrival_time <= t
    }

    /// The tick from which a running process is due for release.
    #[inline(always)]
    pub fn deadline(&self) -> ByteSteps {
        self.arrival_time + self.burst_time
    }

    #[inline(always)]
    pub fn is_running(&self) -> bool {
        self.allocated
    }

    /// Running, admitted strictly before `t` and past its deadline.
    #[inline(always)]
    pub fn is_due_at(&self, t: ByteSteps) -> bool {
        self.is_running()
            && self.admitted_at.is_some_and(|a| a < t)
            && self.deadline() <= t
    }

    /// Ticks spent waiting for memory, if it ever got some.
    pub fn wait_time(&self) -> Option<ByteSteps> {
        self.admitted_at.map(|a| a - self.arrival_time)
    }

    pub(crate) fn admit(&mut self, t: ByteSteps, (start, end): (ByteSteps, ByteSteps)) {
        debug_assert!(!self.allocated && self.admitted_at.is_none(), "Process placed twice!");
        self.allocated = true;
        self.start_address = Some(start);
        self.end_address = Some(end);
        self.admitted_at = Some(t);
    }

    pub(crate) fn release(&mut self, t: ByteSteps) {
        self.allocated = false;
        self.start_address = None;
        self.end_address = None;
        self.released_at = Some(t);
    }
}
