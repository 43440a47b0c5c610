use crate::helpe::*;
use crate::algo::placement::Placer;

pub mod placement;

/// Runs one complete simulation and returns its steps, the first one
/// being the untouched initial state.
///
/// Fails with [`SimError::InvalidConfiguration`] on bad input, and with
/// [`SimError::UnschedulableProcess`] if some process can never be placed.
pub fn run_memory_simulation(
    total_memory:   ByteSteps,
    block_size:     ByteSteps,
    processes:      &[ProcSpec],
    policy:         FitPolicy,
) -> Result<Vec<SimulationStep>, SimError> {
    Simulator::new(SimConfig::new(total_memory, block_size, policy))?.run(processes)
}

/// A validated [`SimConfig`], ready to run any number of workloads.
/// Runs share nothing: each one gets its own arena and its own policy
/// state.
#[derive(Debug, Clone, Copy)]
pub struct Simulator {
    config: SimConfig,
}

impl Simulator {
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;

        Ok(Self { config })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn run(&self, processes: &[ProcSpec]) -> Result<Vec<SimulationStep>, SimError> {
        let processes = crate::procset::init(processes)?;
        Engine::new(&self.config, processes).run()
    }
}

/// Live state of one run. Owned exclusively by the run loop.
struct Engine {
    time:       ByteSteps,
    arena:      Arena,
    placer:     Placer,
    // Both maps preserve supplied order. A process moves from
    // `waiting` to `tracked` when placed and never moves back.
    waiting:    IndexMap<String, Process>,
    tracked:    IndexMap<String, Process>,
    steps:      Vec<SimulationStep>,
    tick_steps: bool,
}

impl Engine {
    fn new(config: &SimConfig, processes: Vec<Process>) -> Self {
        Self {
            time:       0,
            arena:      Arena::new(config.total_memory, config.block_size),
            placer:     Placer::new(config.policy),
            waiting:    processes.into_iter()
                .map(|p| (p.id.clone(), p))
                .collect(),
            tracked:    IndexMap::new(),
            steps:      vec![],
            tick_steps: config.tick_steps,
        }
    }

    fn run(mut self) -> Result<Vec<SimulationStep>, SimError> {
        let started = Instant::now();
        info!(
            policy = %self.placer.policy(),
            total = self.arena.total(),
            blocks = self.arena.blocks().len(),
            processes = self.waiting.len(),
            "Simulation started"
        );
        self.record(StepEvent::Initial, String::from("Initial memory state"));

        while self.has_work() {
            let placed = self.admit();
            let freed = self.release();
            if !placed && !freed && self.is_stuck() {
                return Err(self.stall());
            }
            self.time += 1;
            if self.tick_steps {
                if self.has_work() {
                    let action = format!("Time increment to {}", self.time);
                    self.record(StepEvent::Tick, action);
                }
            } else {
                self.skip_idle();
            }
        }

        info!(
            steps = self.steps.len(),
            makespan = self.time,
            elapsed_us = started.elapsed().as_micros() as u64,
            "Simulation finished"
        );

        Ok(self.steps)
    }

    #[inline(always)]
    fn has_work(&self) -> bool {
        !self.waiting.is_empty() || self.tracked.values().any(|p| p.is_running())
    }

    // Nothing is running, so nothing will ever be freed again, and nobody
    // is still on their way. Whatever failed to fit now never will.
    fn is_stuck(&self) -> bool {
        !self.tracked.values().any(|p| p.is_running())
            && self.waiting.values().all(|p| p.has_arrived(self.time))
    }

    // With nothing running, no tick before the next arrival can change
    // anything, and no step gets recorded for it.
    fn skip_idle(&mut self) {
        if self.tracked.values().any(|p| p.is_running()) { return; }
        let next = self.waiting.values()
            .map(|p| p.arrival_time)
            .filter(|&a| a >= self.time)
            .min();
        if let Some(next) = next {
            if next > self.time {
                debug!(from = self.time, to = next, "Skipping idle ticks");
                self.time = next;
            }
        }
    }

    /// Tries to place every arrived process, in supplied order.
    fn admit(&mut self) -> bool {
        let arrived: Vec<String> = self.waiting.values()
            .filter(|p| p.has_arrived(self.time))
            .map(|p| p.id.clone())
            .collect();
        let mut placed_any = false;
        for pid in arrived {
            let Some(size) = self.waiting.get(&pid).map(|p| p.size) else { continue; };
            let Some(idx) = self.placer.place(self.arena.blocks(), size) else {
                debug!(time = self.time, process = %pid, size, "No fitting block");
                continue;
            };
            let (block, remainder) = self.arena.split(idx, &pid, size);
            let Some(mut p) = self.waiting.shift_remove(&pid) else { continue; };
            p.admit(self.time, block.extent());
            debug!(
                time = self.time,
                process = %pid,
                start = block.start_address,
                end = block.end_address,
                remainder = remainder.map(|r| r.size).unwrap_or(0),
                "Placed"
            );
            self.tracked.insert(pid.clone(), p);
            let policy = self.placer.policy();
            let action = format!(
                "Allocated process {} at address {} ({})",
                pid, block.start_address, policy
            );
            self.record(
                StepEvent::Allocated {
                    process:    pid,
                    address:    block.start_address,
                    policy,
                },
                action,
            );
            placed_any = true;
        }

        placed_any
    }

    /// Frees every running process past its deadline. Processes placed
    /// during this very tick are left alone.
    fn release(&mut self) -> bool {
        let due: Vec<String> = self.tracked.values()
            .filter(|p| p.is_due_at(self.time))
            .map(|p| p.id.clone())
            .collect();
        for pid in &due {
            let reclaimed = self.arena.free(pid);
            if let Some(p) = self.tracked.get_mut(pid) {
                p.release(self.time);
            }
            self.arena.coalesce();
            debug!(
                time = self.time,
                process = %pid,
                reclaimed,
                free_blocks = self.arena.blocks().iter().filter(|b| b.is_free()).count(),
                "Freed"
            );
            self.record(
                StepEvent::Deallocated { process: pid.clone() },
                format!("Deallocated process {}", pid),
            );
        }

        !due.is_empty()
    }

    fn stall(mut self) -> SimError {
        let ids: Vec<String> = self.waiting.keys().cloned().collect();
        warn!(
            time = self.time,
            processes = %ids.iter().join(", "),
            largest_free = self.arena.largest_free(),
            "Simulation stalled"
        );
        let action = format!(
            "Stalled: process(es) {} can never be placed",
            ids.iter().join(", ")
        );
        self.record(StepEvent::Stalled { processes: ids.clone() }, action);

        SimError::UnschedulableProcess {
            time:   self.time,
            ids,
            steps:  self.steps,
        }
    }

    fn record(&mut self, event: StepEvent, action: String) {
        self.steps.push(SimulationStep {
            time:                   self.time,
            memory_state:           self.arena.snapshot(),
            waiting_processes:      self.waiting.values().cloned().collect(),
            completed_processes:    self.tracked.values().cloned().collect(),
            action,
            event,
        });
    }
}
