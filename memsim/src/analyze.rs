use crate::helpe::*;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantError {
    #[error("block {id}: end {end} != start {start} + size {size}")]
    BadExtent {
        id:     u32,
        start:  ByteSteps,
        size:   ByteSteps,
        end:    ByteSteps,
    },
    #[error("block {id} starts at {found}, expected {expected} (gap or overlap)")]
    Discontiguous {
        id:         u32,
        expected:   ByteSteps,
        found:      ByteSteps,
    },
    #[error("blocks cover {covered} bytes out of {total}")]
    Conservation {
        covered:    ByteSteps,
        total:      ByteSteps,
    },
    #[error("block id {id} appears more than once")]
    DuplicateId {
        id:     u32,
    },
    #[error("{owner} owns {count} blocks")]
    DoubleAllocation {
        owner:  String,
        count:  usize,
    },
    #[error("block {id} is flagged {allocated} but has owner {owner:?}")]
    OwnerMismatch {
        id:         u32,
        allocated:  bool,
        owner:      Option<String>,
    },
    #[error("free blocks at {left} and {right} were not merged")]
    Uncoalesced {
        left:   ByteSteps,
        right:  ByteSteps,
    },
    #[error("{id} is recorded at {start:?}..{end:?} but the arena disagrees")]
    Misplaced {
        id:     String,
        start:  Option<ByteSteps>,
        end:    Option<ByteSteps>,
    },
    #[error("step {index} goes back in time ({time} < {previous})")]
    TimeReversal {
        index:      usize,
        time:       ByteSteps,
        previous:   ByteSteps,
    },
}

/// Checks that `blocks`, taken in the given order, partition `[0, total)`
/// and that every address range has at most one owner.
pub fn check_blocks(blocks: &[MemoryBlock], total: ByteSteps) -> Result<(), InvariantError> {
    let mut expected = 0;
    let mut ids: HashSet<u32> = HashSet::with_capacity(blocks.len());
    let mut owners: HashMap<&str, usize> = HashMap::new();
    for b in blocks {
        if b.start_address + b.size != b.end_address {
            return Err(InvariantError::BadExtent {
                id:     b.id,
                start:  b.start_address,
                size:   b.size,
                end:    b.end_address,
            });
        }
        if b.start_address != expected {
            return Err(InvariantError::Discontiguous {
                id:         b.id,
                expected,
                found:      b.start_address,
            });
        }
        if !ids.insert(b.id) {
            return Err(InvariantError::DuplicateId { id: b.id });
        }
        match (b.allocated, b.process_id.as_deref()) {
            (true, Some(owner)) => { *owners.entry(owner).or_default() += 1; },
            (false, None)       => {},
            _                   => {
                return Err(InvariantError::OwnerMismatch {
                    id:         b.id,
                    allocated:  b.allocated,
                    owner:      b.process_id.clone(),
                });
            }
        }
        expected = b.end_address;
    }
    if expected != total {
        return Err(InvariantError::Conservation { covered: expected, total });
    }
    if let Some((owner, count)) = owners.into_iter().find(|(_, c)| *c > 1) {
        return Err(InvariantError::DoubleAllocation { owner: owner.to_owned(), count });
    }

    Ok(())
}

/// Checks that no two abutting blocks are both free.
pub fn check_coalesced(blocks: &[MemoryBlock]) -> Result<(), InvariantError> {
    match blocks.iter()
        .tuple_windows()
        .find(|(a, b)| a.is_free() && b.is_free() && a.abuts(b)) {
        Some((a, b))    => Err(InvariantError::Uncoalesced {
            left:   a.start_address,
            right:  b.start_address,
        }),
        None            => Ok(()),
    }
}

/// Full consistency check of a single step: the arena partitions memory,
/// every running process sits exactly where it claims to, and nobody
/// waiting holds memory.
///
/// Deallocation steps are recorded after coalescing, so for those the
/// arena must also be fully coalesced.
pub fn check_step(step: &SimulationStep, total: ByteSteps) -> Result<(), InvariantError> {
    check_blocks(&step.memory_state, total)?;
    if let StepEvent::Deallocated { .. } = step.event {
        check_coalesced(&step.memory_state)?;
    }
    for p in &step.completed_processes {
        let owned: Vec<&MemoryBlock> = step.memory_state
            .iter()
            .filter(|b| b.is_owned_by(&p.id))
            .collect();
        let consistent = match (p.allocated, p.start_address, p.end_address) {
            (true, Some(s), Some(e))    => owned.len() == 1 && owned[0].extent() == (s, e),
            (false, None, None)         => owned.is_empty(),
            _                           => false,
        };
        if !consistent {
            return Err(InvariantError::Misplaced {
                id:     p.id.clone(),
                start:  p.start_address,
                end:    p.end_address,
            });
        }
    }
    if let Some(p) = step.waiting_processes
        .iter()
        .find(|p| p.allocated || step.memory_state.iter().any(|b| b.is_owned_by(&p.id))) {
        return Err(InvariantError::Misplaced {
            id:     p.id.clone(),
            start:  p.start_address,
            end:    p.end_address,
        });
    }

    Ok(())
}

/// [`check_step`] over a whole run, plus non-decreasing time.
pub fn check_steps(steps: &[SimulationStep], total: ByteSteps) -> Result<(), InvariantError> {
    let mut previous = 0;
    for (index, s) in steps.iter().enumerate() {
        if s.time < previous {
            return Err(InvariantError::TimeReversal { index, time: s.time, previous });
        }
        check_step(s, total)?;
        previous = s.time;
    }

    Ok(())
}

/// Percentage of `total` currently handed out.
pub fn utilization(blocks: &[MemoryBlock], total: ByteSteps) -> f64 {
    if total == 0 { return 0.0; }
    let used: ByteSteps = blocks.iter()
        .filter(|b| b.allocated)
        .map(|b| b.size)
        .sum();

    used as f64 * 100.0 / total as f64
}

/// External fragmentation as a percentage of `total`: free memory that
/// lies outside the largest free block, and thus can't serve a request
/// as big as the free total suggests.
pub fn external_fragmentation(blocks: &[MemoryBlock], total: ByteSteps) -> f64 {
    if total == 0 { return 0.0; }
    let (free, largest) = blocks.iter()
        .filter(|b| b.is_free())
        .fold((0, 0), |(sum, max), b| (sum + b.size, max.max(b.size)));

    (free - largest) as f64 * 100.0 / total as f64
}

/// Per-run figures of merit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub policy:             FitPolicy,
    pub steps:              usize,
    /// Mean ticks between arrival and placement, over placed processes.
    pub average_wait_time:  f64,
    /// Mean over all steps.
    pub memory_utilization: f64,
    pub peak_utilization:   f64,
    /// Worst external fragmentation seen at any step.
    pub fragmentation:      f64,
    pub makespan:           ByteSteps,
    pub placed:             usize,
    pub stalled:            Vec<String>,
}

impl RunSummary {
    pub fn new(policy: FitPolicy, steps: &[SimulationStep], total: ByteSteps) -> Self {
        let utils: Vec<f64> = steps.iter()
            .map(|s| utilization(&s.memory_state, total))
            .collect();
        let waits: Vec<ByteSteps> = steps.last()
            .map(|s| s.completed_processes
                .iter()
                .filter_map(|p| p.wait_time())
                .collect())
            .unwrap_or_default();
        let stalled = match steps.last().map(|s| &s.event) {
            Some(StepEvent::Stalled { processes })  => processes.clone(),
            _                                       => vec![],
        };

        Self {
            policy,
            steps:              steps.len(),
            average_wait_time:  mean(waits.iter().map(|w| *w as f64)),
            memory_utilization: mean(utils.iter().copied()),
            peak_utilization:   utils.iter().copied().fold(0.0, f64::max),
            fragmentation:      steps.iter()
                .map(|s| external_fragmentation(&s.memory_state, total))
                .fold(0.0, f64::max),
            makespan:           steps.last().map(|s| s.time).unwrap_or(0),
            placed:             waits.len(),
            stalled,
        }
    }
}

fn mean<I: Iterator<Item = f64>>(it: I) -> f64 {
    let (sum, n) = it.fold((0.0, 0usize), |(sum, n), x| (sum + x, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}
