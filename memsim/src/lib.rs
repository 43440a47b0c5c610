//! Welcome to `memsim`!
//!
//! A discrete-time simulator of contiguous memory allocation. Given a total
//! memory size, an initial block granularity and a list of processes, it
//! replays First-Fit, Best-Fit, Worst-Fit or Next-Fit placement tick by tick
//! and records every state change as a [`SimulationStep`].

mod block;
mod process;

pub mod algo;
pub mod arena;
pub mod procset;
pub mod analyze;
pub mod helpe;

pub use crate::helpe::*;

/// A contiguous piece of the simulated memory.
///
/// Blocks partition `[0, total)`: they are kept sorted by
/// [`start_address`](MemoryBlock::start_address), they never overlap, and
/// `end_address == start_address + size` at all times. A block is either
/// free or owned by exactly one process.
///
/// Ids are only unique *within one arena at one point in time*. Splitting
/// hands out fresh ids, coalescing re-packs them to `0..k`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryBlock {
    pub id:             u32,
    pub size:           ByteSteps,
    pub allocated:      bool,
    pub process_id:     Option<String>,
    pub start_address:  ByteSteps,
    pub end_address:    ByteSteps,
}

/// A simulated process asking for `size` contiguous bytes.
///
/// Lifecycle, which never goes backwards:
///
/// 1. *waiting*: created, not yet placed.
/// 2. *running*: placed at some tick `>= arrival_time`. The addresses are
///     set only while in this state.
/// 3. *completed*: freed at the first tick `t` with
///     `arrival_time + burst_time <= t` that comes *after* the admission tick.
///
/// > ***ATTENTION:*** the release deadline is counted from the *arrival*,
/// > not from the admission. A process that had to wait for memory runs for
/// > fewer ticks than its burst, but always for at least one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    pub id:             String,
    pub size:           ByteSteps,
    pub arrival_time:   ByteSteps,
    pub burst_time:     ByteSteps,
    pub allocated:      bool,
    pub start_address:  Option<ByteSteps>,
    pub end_address:    Option<ByteSteps>,
    // Bookkeeping for the run metrics.
    pub admitted_at:    Option<ByteSteps>,
    pub released_at:    Option<ByteSteps>,
}

/// An immutable snapshot of the simulation, taken right after
/// something happened.
///
/// Every step owns private copies of the arena and the process lists.
/// Nothing in a recorded step is shared with the live engine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationStep {
    pub time:                   ByteSteps,
    pub memory_state:           Vec<MemoryBlock>,
    pub waiting_processes:      Vec<Process>,
    /// Every process that has been placed at least once: the running
    /// ones as well as the ones already freed.
    pub completed_processes:    Vec<Process>,
    pub action:                 String,
    pub event:                  StepEvent,
}
