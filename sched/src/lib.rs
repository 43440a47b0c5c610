//! CPU scheduling disciplines.
//!
//! A [`Task`] needs the CPU for `burst_time` ticks from `arrival_time` on.
//! [`schedule`] runs a whole task set under one [`Discipline`] and returns
//! per-task timings along with their averages.

pub use std::{
    io::{BufRead, BufReader},
    path::PathBuf,
};
pub use itertools::Itertools;
pub use clap::{Parser, ValueEnum};
pub use serde::{Serialize, Deserialize};
pub use thiserror::Error;
pub use memsim::ByteSteps;
use tracing::debug;

mod disciplines;

pub use crate::disciplines::{fcfs, sjf, priority, srtn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id:             String,
    pub arrival_time:   ByteSteps,
    pub burst_time:     ByteSteps,
    /// Lower is more urgent. Only [`Discipline::Priority`] looks at it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority:       Option<u32>,
}

impl Task {
    pub fn new(id: &str, arrival_time: ByteSteps, burst_time: ByteSteps) -> Self {
        Self {
            id:             id.to_owned(),
            arrival_time,
            burst_time,
            priority:       None,
        }
    }

    pub fn with_priority(mut self, p: u32) -> Self {
        self.priority = Some(p);
        self
    }
}

/// A [`Task`] together with the timings it got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    #[serde(flatten)]
    pub task:               Task,
    /// First tick on the CPU.
    pub start_time:         ByteSteps,
    pub completion_time:    ByteSteps,
    pub turnaround_time:    ByteSteps,
    pub waiting_time:       ByteSteps,
}

impl TaskResult {
    pub(crate) fn new(task: &Task, start_time: ByteSteps, completion_time: ByteSteps) -> Self {
        let turnaround_time = completion_time - task.arrival_time;

        Self {
            task:               task.clone(),
            start_time,
            completion_time,
            turnaround_time,
            waiting_time:       turnaround_time - task.burst_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub discipline:             Discipline,
    pub results:                Vec<TaskResult>,
    pub avg_waiting_time:       f64,
    pub avg_turnaround_time:    f64,
    /// Busy ticks over the span from the first arrival to the last
    /// completion, as a percentage.
    pub cpu_utilization:        f64,
}

impl Schedule {
    fn new(discipline: Discipline, results: Vec<TaskResult>) -> Self {
        let n = results.len().max(1) as f64;
        let (wait, tat, busy) = results.iter()
            .fold((0, 0, 0), |(w, t, b), r| {
                (w + r.waiting_time, t + r.turnaround_time, b + r.task.burst_time)
            });
        let first_arrival = results.iter()
            .map(|r| r.task.arrival_time)
            .min()
            .unwrap_or(0);
        let last_completion = results.iter()
            .map(|r| r.completion_time)
            .max()
            .unwrap_or(0);
        let span = last_completion.saturating_sub(first_arrival);

        Self {
            discipline,
            results,
            avg_waiting_time:       wait as f64 / n,
            avg_turnaround_time:    tat as f64 / n,
            cpu_utilization:        if span == 0 { 100.0 } else { busy as f64 * 100.0 / span as f64 },
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Discipline {
    /// First come, first served
    Fcfs,
    /// Shortest job first (non-preemptive)
    Sjf,
    /// Lowest priority value first (non-preemptive)
    Priority,
    /// Shortest remaining time next (preemptive)
    Srtn,
}

impl Discipline {
    pub const ALL: [Discipline; 4] = [
        Discipline::Fcfs,
        Discipline::Sjf,
        Discipline::Priority,
        Discipline::Srtn,
    ];
}

impl std::fmt::Display for Discipline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Discipline::Fcfs        => "FCFS",
            Discipline::Sjf         => "SJF",
            Discipline::Priority    => "Priority",
            Discipline::Srtn        => "SRTN",
        })
    }
}

#[derive(Error, Debug)]
pub enum SchedError {
    #[error("No tasks to schedule!")]
    Empty,
    #[error("Task {id}: {message}")]
    InvalidTask {
        id:         String,
        message:    String,
    },
    #[error("Task {id} has no priority")]
    MissingPriority {
        id:         String,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("line {line}: {message}")]
    Parse {
        line:       usize,
        message:    String,
    },
}

/// Gatekeeper: every discipline assumes a non-empty set of tasks
/// with positive bursts.
pub fn validate(tasks: &[Task]) -> Result<(), SchedError> {
    if tasks.is_empty() {
        return Err(SchedError::Empty);
    }
    if let Some(t) = tasks.iter().find(|t| t.burst_time == 0) {
        return Err(SchedError::InvalidTask {
            id:         t.id.clone(),
            message:    String::from("burst time must be positive"),
        });
    }
    if let Some(id) = tasks.iter().map(|t| &t.id).duplicates().next() {
        return Err(SchedError::InvalidTask {
            id:         id.clone(),
            message:    String::from("id used more than once"),
        });
    }

    Ok(())
}

pub fn schedule(tasks: &[Task], discipline: Discipline) -> Result<Schedule, SchedError> {
    validate(tasks)?;
    let results = match discipline {
        Discipline::Fcfs        => fcfs(tasks),
        Discipline::Sjf         => sjf(tasks),
        Discipline::Priority    => priority(tasks)?,
        Discipline::Srtn        => srtn(tasks),
    };
    debug!(%discipline, tasks = tasks.len(), "Scheduled");

    Ok(Schedule::new(discipline, results))
}

/// A CSV with a header line and `id,arrival,burst[,priority]` rows.
pub struct TaskCSVParser {
    pub path: PathBuf,
}

impl TaskCSVParser {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn read_tasks(&self) -> Result<Vec<Task>, SchedError> {
        let fd = std::fs::File::open(&self.path)?;
        self.parse(BufReader::new(fd))
    }

    pub fn parse<R: BufRead>(&self, reader: R) -> Result<Vec<Task>, SchedError> {
        let mut res = vec![];
        // First line is the header!
        for (n, line) in reader.lines().enumerate().skip(1) {
            let line = line?;
            if line.trim().is_empty() { continue; }
            let fields: Vec<&str> = line.split(',')
                .map(str::trim)
                .collect();
            let bad = |message: String| SchedError::Parse { line: n + 1, message };
            let num = |x: &str| x.parse::<ByteSteps>()
                .map_err(|e| bad(format!("bad number {x:?}: {e}")));
            let task = match fields[..] {
                [id, arrival, burst]            => Task::new(id, num(arrival)?, num(burst)?),
                [id, arrival, burst, prio]      => {
                    let t = Task::new(id, num(arrival)?, num(burst)?);
                    match prio {
                        ""  => t,
                        p   => t.with_priority(p.parse::<u32>()
                            .map_err(|e| bad(format!("bad priority {p:?}: {e}")))?),
                    }
                },
                _   => {
                    return Err(bad(format!("expected 3 or 4 columns, found {}", fields.len())));
                }
            };
            res.push(task);
        }

        Ok(res)
    }
}
