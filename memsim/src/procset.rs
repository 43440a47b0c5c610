use crate::helpe::*;

/// Turns caller-supplied specs into fresh, waiting [`Process`]es.
/// A successful return is guaranteed to be compliant with all of
/// `memsim`'s assumptions:
/// - no process has zero size
/// - no process has zero burst time
///
/// Ids are `P1, P2, ...` in supplied order, which is also the order
/// in which same-tick placement attempts are made.
///
/// This function is the gatekeeper to the rest of the library. Processes
/// larger than the whole memory are *not* rejected here: they are valid
/// input that the engine reports as unschedulable.
pub fn init(specs: &[ProcSpec]) -> Result<Vec<Process>, SimError> {
    for (idx, s) in specs.iter().enumerate() {
        let message = if s.size == 0 {
            "with 0 size found!"
        } else if s.burst_time == 0 {
            "with 0 burst time found!"
        } else {
            continue;
        };

        return Err(SimError::InvalidConfiguration {
            message: format!("Process {} {}", proc_id(idx), message),
            culprit: Some(*s),
        });
    }

    Ok(specs.iter()
        .enumerate()
        .map(|(idx, s)| Process::new(proc_id(idx), s))
        .collect())
}

#[inline(always)]
pub fn proc_id(idx: usize) -> String {
    format!("P{}", idx + 1)
}
