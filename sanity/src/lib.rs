//! Runs every placement policy over the same workload, checks each
//! recorded step for consistency and turns the histories into
//! comparable numbers, JSON dumps and SVG memory maps.
pub use std::path::{Path, PathBuf};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::hash::BuildHasherDefault;

use ahash::AHasher;
use indexmap::IndexMap;
use memsim::*;
use memsim::analyze::check_steps;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum SanityError {
    #[error(transparent)]
    Sim(#[from] SimError),
    #[error("{policy}: {source}")]
    Invariant {
        policy: FitPolicy,
        source: InvariantError,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("plotting failed: {0}")]
    Plot(String),
}

/// The verified outcome of one policy on one workload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRun {
    pub policy:     FitPolicy,
    pub summary:    RunSummary,
    pub steps:      Vec<SimulationStep>,
}

impl PolicyRun {
    pub fn stalled(&self) -> bool {
        !self.summary.stalled.is_empty()
    }
}

/// Runs `config` over `specs` and checks every step. A stalled run is
/// still a valid run: its partial history gets checked all the same.
pub fn run_policy(config: SimConfig, specs: &[ProcSpec]) -> Result<PolicyRun, SanityError> {
    let policy = config.policy;
    let steps = match Simulator::new(config)?.run(specs) {
        Ok(steps)   => steps,
        Err(SimError::UnschedulableProcess { ids, steps, .. }) => {
            warn!(%policy, stalled = %ids.join(", "), "Run stalled");
            steps
        },
        Err(e)      => { return Err(e.into()); }
    };
    check_steps(&steps, config.total_memory)
        .map_err(|source| SanityError::Invariant { policy, source })?;
    let summary = RunSummary::new(policy, &steps, config.total_memory);
    info!(%policy, steps = steps.len(), makespan = summary.makespan, "Run verified");

    Ok(PolicyRun { policy, summary, steps })
}

/// All four policies in parallel, reported in [`FitPolicy::ALL`] order.
pub fn run_all(
    total_memory:   ByteSteps,
    block_size:     ByteSteps,
    specs:          &[ProcSpec],
    tick_steps:     bool,
) -> Result<Vec<PolicyRun>, SanityError> {
    FitPolicy::ALL
        .par_iter()
        .map(|&policy| {
            let config = SimConfig::new(total_memory, block_size, policy)
                .with_tick_steps(tick_steps);
            run_policy(config, specs)
        })
        .collect()
}

/// Policies from most to least preferable: runs that placed everybody
/// first, then lower average wait, then lower peak fragmentation.
pub fn ranking(runs: &[PolicyRun]) -> Vec<FitPolicy> {
    let mut order: Vec<&PolicyRun> = runs.iter().collect();
    order.sort_by(|a, b| {
        a.stalled().cmp(&b.stalled())
            .then(a.summary.average_wait_time.total_cmp(&b.summary.average_wait_time))
            .then(a.summary.fragmentation.total_cmp(&b.summary.fragmentation))
    });

    order.into_iter().map(|r| r.policy).collect()
}

/// Plain-text side-by-side comparison of `runs`.
pub fn comparison(runs: &[PolicyRun]) -> String {
    let mut res = format!(
        "{:<10} {:>6} {:>9} {:>9} {:>9} {:>9} {:>9}  stalled\n",
        "policy", "steps", "makespan", "avg wait", "avg util", "peak", "frag"
    );
    for r in runs {
        let s = &r.summary;
        res.push_str(&format!(
            "{:<10} {:>6} {:>9} {:>9.2} {:>8.2}% {:>8.2}% {:>8.2}%  {}\n",
            s.policy.name(),
            s.steps,
            s.makespan,
            s.average_wait_time,
            s.memory_utilization,
            s.peak_utilization,
            s.fragmentation,
            if s.stalled.is_empty() { String::from("-") } else { s.stalled.join(",") },
        ));
    }

    res
}

/// Writes `<dir>/<policy>.json` holding the summary and every step.
pub fn export_json(run: &PolicyRun, dir: &Path) -> Result<PathBuf, SanityError> {
    let path = dir.join(format!("{}.json", run.policy.slug()));
    let mut out = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(&mut out, run)?;
    out.flush()?;

    Ok(path)
}

/// Where and when a process lived: a rectangle in address × time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifetime {
    pub start_address:  ByteSteps,
    pub end_address:    ByteSteps,
    pub from:           ByteSteps,
    pub to:             ByteSteps,
}

pub type Lifetimes = IndexMap<String, Lifetime, BuildHasherDefault<AHasher>>;

/// Rebuilds each placed process' rectangle out of a step history.
/// Processes never freed (stalled runs) extend to the last step.
pub fn lifetimes(steps: &[SimulationStep]) -> Lifetimes {
    let horizon = steps.last().map(|s| s.time).unwrap_or(0);
    let mut res = Lifetimes::default();
    for s in steps {
        match &s.event {
            StepEvent::Allocated { process, .. } => {
                if let Some(b) = s.memory_state.iter().find(|b| b.is_owned_by(process)) {
                    res.insert(process.clone(), Lifetime {
                        start_address:  b.start_address,
                        end_address:    b.end_address,
                        from:           s.time,
                        to:             horizon,
                    });
                }
            },
            StepEvent::Deallocated { process } => {
                if let Some(l) = res.get_mut(process) {
                    l.to = s.time;
                }
            },
            _   => {}
        }
    }

    res
}

pub mod plot {
    use plotters::prelude::*;
    use super::*;

    /// Draws one filled rectangle per process: time on x, addresses on y.
    pub fn plot_run(run: &PolicyRun, total_memory: ByteSteps, dir: &Path) -> Result<PathBuf, SanityError> {
        let img = dir.join(format!("{}.svg", run.policy.slug()));
        let lts = lifetimes(&run.steps);
        let horizon = run.summary.makespan.max(1);

        {
            let backend = SVGBackend::new(&img, (1280, 720)).into_drawing_area();
            backend.fill(&WHITE).map_err(plot_err)?;
            let backend = backend.margin(10u32, 10u32, 10u32, 10u32);
            let mut chart = ChartBuilder::on(&backend)
                .build_cartesian_2d(0..horizon + 1, 0..total_memory)
                .map_err(plot_err)?;
            chart.draw_series(create_series(&lts)).map_err(plot_err)?;
            backend.present().map_err(plot_err)?;
        }

        Ok(img)
    }

    fn plot_err<E: std::fmt::Display>(e: E) -> SanityError {
        SanityError::Plot(e.to_string())
    }

    fn create_series(lts: &Lifetimes) -> Vec<Rectangle<(usize, usize)>> {
        lts.values()
            .enumerate()
            .flat_map(|(idx, l)| {
                // A process freed on its admission tick would be invisible.
                let right_x = l.to.max(l.from + 1);
                [
                    Rectangle::new(
                        [(l.from, l.end_address), (right_x, l.start_address)],
                        Palette99::pick(idx).mix(0.6).filled(),
                    ),
                    Rectangle::new(
                        [(l.from, l.end_address), (right_x, l.start_address)],
                        ShapeStyle {
                            color: BLACK.into(),
                            filled: false,
                            stroke_width: 1,
                        },
                    ),
                ]
            })
            .collect()
    }
}
