pub use std::{
    fmt,
    io::{BufRead, BufReader},
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    time::Instant,
};
pub use thiserror::Error;
pub use itertools::Itertools;
pub use indexmap::IndexMap;
pub use clap::{Parser, ValueEnum};
pub use serde::{Serialize, Deserialize};
pub(crate) use tracing::{debug, info, warn};

pub use crate::{MemoryBlock, Process, SimulationStep,
    arena::Arena,
    algo::{run_memory_simulation, Simulator, placement::{Decision, Placer}},
    analyze::{InvariantError, RunSummary},
};

/// The unit for both addresses/sizes and logical time. Same as in the
/// allocation literature: a process lives in a rectangle of bytes × ticks,
/// so one unsigned type serves both axes.
pub type ByteSteps = usize;

/// What the caller hands over for each process. Ids are assigned
/// by the gatekeeper (see [`crate::procset::init`]).
///
/// Arrival times can't be negative by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcSpec {
    pub size:           ByteSteps,
    pub arrival_time:   ByteSteps,
    pub burst_time:     ByteSteps,
}

impl ProcSpec {
    pub fn new(size: ByteSteps, arrival_time: ByteSteps, burst_time: ByteSteps) -> Self {
        Self { size, arrival_time, burst_time }
    }
}

/// The four classic placement strategies.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FitPolicy {
    /// Lowest-addressed free block that fits
    First,
    /// Smallest free block that fits
    Best,
    /// Largest free block that fits
    Worst,
    /// First fit, resuming right after the last placement
    Next,
}

impl FitPolicy {
    pub const ALL: [FitPolicy; 4] = [
        FitPolicy::First,
        FitPolicy::Best,
        FitPolicy::Worst,
        FitPolicy::Next,
    ];

    /// Name used in step descriptions.
    pub fn name(&self) -> &'static str {
        match self {
            FitPolicy::First    => "First Fit",
            FitPolicy::Best     => "Best Fit",
            FitPolicy::Worst    => "Worst Fit",
            FitPolicy::Next     => "Next Fit",
        }
    }

    /// Short machine-friendly name, used for file names.
    pub fn slug(&self) -> &'static str {
        match self {
            FitPolicy::First    => "first_fit",
            FitPolicy::Best     => "best_fit",
            FitPolicy::Worst    => "worst_fit",
            FitPolicy::Next     => "next_fit",
        }
    }
}

impl fmt::Display for FitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything a run needs besides the processes themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimConfig {
    pub total_memory:   ByteSteps,
    /// Granularity of the initial partitioning. The last block takes
    /// the remainder if `total_memory` is not a multiple of it.
    pub block_size:     ByteSteps,
    pub policy:         FitPolicy,
    /// Also record a step every time the clock advances.
    pub tick_steps:     bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            total_memory:   1024,
            block_size:     64,
            policy:         FitPolicy::First,
            tick_steps:     false,
        }
    }
}

impl SimConfig {
    pub fn new(total_memory: ByteSteps, block_size: ByteSteps, policy: FitPolicy) -> Self {
        Self {
            total_memory,
            block_size,
            policy,
            ..Default::default()
        }
    }

    pub fn with_tick_steps(mut self, on: bool) -> Self {
        self.tick_steps = on;
        self
    }

    pub fn validate(&self) -> Result<(), SimError> {
        let message = if self.total_memory == 0 {
            "Total memory size must be positive!"
        } else if self.block_size == 0 {
            "Block size must be positive!"
        } else if self.block_size > self.total_memory {
            "Block size exceeds total memory size!"
        } else {
            return Ok(());
        };

        Err(SimError::InvalidConfiguration {
            message: String::from(message),
            culprit: None,
        })
    }
}

/// What a [`SimulationStep`] records, in typed form. The step's `action`
/// string is the human-readable rendering of this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StepEvent {
    Initial,
    Allocated {
        process:    String,
        address:    ByteSteps,
        policy:     FitPolicy,
    },
    Deallocated {
        process:    String,
    },
    Tick,
    Stalled {
        processes:  Vec<String>,
    },
}

#[derive(Error, Debug)]
pub enum SimError {
    /// Rejected before the simulation starts.
    #[error("Invalid configuration: {message}{}", .culprit.as_ref().map(|c| format!("\n{c:?}")).unwrap_or_default())]
    InvalidConfiguration {
        message:    String,
        culprit:    Option<ProcSpec>,
    },
    /// The run reached a state from which no waiting process can ever be
    /// placed. `steps` holds the history up to and including the
    /// "stalled" step.
    #[error("Process(es) {} can never be placed (stalled at t = {time})", .ids.join(", "))]
    UnschedulableProcess {
        time:       ByteSteps,
        ids:        Vec<String>,
        steps:      Vec<SimulationStep>,
    },
}

#[derive(Error, Debug)]
pub enum WorkloadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("line {line}: {message}")]
    Parse {
        line:       usize,
        message:    String,
    },
    #[error(transparent)]
    Sim(#[from] SimError),
}

/// Defines the interface for reading workloads.
///
/// The user can implement their own types as needed: anything that
/// yields [`ProcSpec`]s can feed the simulator.
pub trait ProcGen<T> {
    fn new(path: PathBuf) -> Self;
    fn read_procs(&self) -> Result<Vec<ProcSpec>, WorkloadError>;
    /// Uses some available data to spawn one [`ProcSpec`].
    fn gen_single(&self, d: T) -> ProcSpec;
}

//---START EXTERNAL INTERFACES

/// A CSV with a header line and `id,size,arrival,burst` rows.
/// The id column is ignored: ids are assigned in row order.
pub struct WorkloadCSVParser {
    pub path: PathBuf,
}

impl WorkloadCSVParser {
    pub fn parse<R: BufRead>(&self, reader: R) -> Result<Vec<ProcSpec>, WorkloadError> {
        let mut res = vec![];
        let mut data_buf: [ByteSteps; 3] = [0; 3];
        // First line is the header!
        for (n, line) in reader.lines().enumerate().skip(1) {
            let line = line?;
            if line.trim().is_empty() { continue; }
            let fields: Vec<&str> = line.split(',')
                // First column is the id!
                .skip(1)
                .take(3)
                .collect();
            if fields.len() < 3 {
                return Err(WorkloadError::Parse {
                    line:       n + 1,
                    message:    format!("expected 4 columns, found {}", fields.len() + 1),
                });
            }
            for (idx, x) in fields.into_iter().enumerate() {
                data_buf[idx] = x.trim()
                    .parse::<ByteSteps>()
                    .map_err(|e| WorkloadError::Parse {
                        line:       n + 1,
                        message:    format!("bad number {x:?}: {e}"),
                    })?;
            }
            res.push(self.gen_single(&data_buf));
        }

        Ok(res)
    }
}

impl ProcGen<&[ByteSteps; 3]> for WorkloadCSVParser {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_procs(&self) -> Result<Vec<ProcSpec>, WorkloadError> {
        let fd = std::fs::File::open(&self.path)?;
        self.parse(BufReader::new(fd))
    }

    fn gen_single(&self, d: &[ByteSteps; 3]) -> ProcSpec {
        ProcSpec::new(d[0], d[1], d[2])
    }
}

//---END EXTERNAL INTERFACES

/// Reads a workload and runs it through the gatekeeper.
pub fn read_from_path<T, B>(file_path: PathBuf) -> Result<Vec<ProcSpec>, WorkloadError>
where T: ProcGen<B> {
    let parser = T::new(file_path);
    let specs = parser.read_procs()?;
    crate::procset::init(&specs)?;

    Ok(specs)
}

/// Upper bounds (inclusive) for [`random_workload`].
#[derive(Debug, Clone, Copy)]
pub struct WorkloadLimits {
    pub max_size:       ByteSteps,
    pub max_arrival:    ByteSteps,
    pub max_burst:      ByteSteps,
}

/// Draws `n` valid processes.
pub fn random_workload<R>(n: usize, limits: &WorkloadLimits, rng: &mut R) -> Vec<ProcSpec>
where R: rand::Rng + ?Sized {
    (0..n)
        .map(|_| ProcSpec {
            size:           rng.gen_range(1..=limits.max_size.max(1)),
            arrival_time:   rng.gen_range(0..=limits.max_arrival),
            burst_time:     rng.gen_range(1..=limits.max_burst.max(1)),
        })
        .collect()
}

/// Installs a stderr subscriber. `RUST_LOG` overrides the default `info`.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    // A second call (e.g. from tests) must not panic.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .compact()
        )
        .try_init();
}
