use memsim::*;
use proptest::prelude::*;

fn workload() -> impl Strategy<Value = Vec<ProcSpec>> {
    prop::collection::vec(
        (1..=120usize, 0..=12usize, 1..=8usize)
            .prop_map(|(size, arrival, burst)| ProcSpec::new(size, arrival, burst)),
        1..14,
    )
}

fn arena_shape() -> impl Strategy<Value = (ByteSteps, ByteSteps)> {
    (32..=256usize).prop_flat_map(|total| (Just(total), 1..=total))
}

fn any_policy() -> impl Strategy<Value = FitPolicy> {
    prop::sample::select(FitPolicy::ALL.to_vec())
}

fn steps_of(res: Result<Vec<SimulationStep>, SimError>) -> Result<(Vec<SimulationStep>, bool), TestCaseError> {
    match res {
        Ok(steps)                                           => Ok((steps, false)),
        Err(SimError::UnschedulableProcess { steps, .. })   => Ok((steps, true)),
        Err(e)                                              => Err(TestCaseError::fail(e.to_string())),
    }
}

fn size_of(step: &SimulationStep, pid: &str) -> Option<ByteSteps> {
    step.completed_processes
        .iter()
        .find(|p| p.id == pid)
        .map(|p| p.size)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn every_step_is_consistent(
        (total, block) in arena_shape(),
        specs in workload(),
        policy in any_policy(),
    ) {
        let (steps, stalled) = steps_of(run_memory_simulation(total, block, &specs, policy))?;
        prop_assert!(analyze::check_steps(&steps, total).is_ok(), "{:?}", analyze::check_steps(&steps, total));
        prop_assert_eq!(&steps[0].action, "Initial memory state");
        prop_assert_eq!(steps[0].waiting_processes.len(), specs.len());

        let last = &steps[steps.len() - 1];
        if stalled {
            prop_assert!(matches!(last.event, StepEvent::Stalled { .. }), "last step is {:?}", last.event);
            prop_assert!(!last.waiting_processes.is_empty());
        } else {
            // Everybody got in and out, and the last free merged everything.
            prop_assert!(last.waiting_processes.is_empty());
            prop_assert_eq!(last.completed_processes.len(), specs.len());
            prop_assert!(last.completed_processes.iter().all(|p| p.released_at.is_some()));
            prop_assert_eq!(last.memory_state.len(), 1);
            prop_assert!(last.memory_state[0].is_free());
        }
    }

    #[test]
    fn processes_respect_their_timing(
        (total, block) in arena_shape(),
        specs in workload(),
        policy in any_policy(),
    ) {
        let (steps, _) = steps_of(run_memory_simulation(total, block, &specs, policy))?;
        let last = &steps[steps.len() - 1];
        for p in &last.completed_processes {
            let (Some(admitted), released) = (p.admitted_at, p.released_at) else {
                return Err(TestCaseError::fail(format!("{} placed without admission tick", p.id)));
            };
            prop_assert!(admitted >= p.arrival_time);
            if let Some(r) = released {
                prop_assert!(r > admitted);
                prop_assert!(r >= p.deadline());
            }
        }
    }

    #[test]
    fn chosen_block_matches_policy(
        (total, block) in arena_shape(),
        specs in workload(),
        policy in any_policy(),
    ) {
        let (steps, _) = steps_of(run_memory_simulation(total, block, &specs, policy))?;
        // Where Next-Fit resumes: right past the last placement.
        let mut cursor: Option<ByteSteps> = None;
        for (prev, cur) in steps.iter().tuple_windows() {
            let StepEvent::Allocated { process, address, .. } = &cur.event else { continue; };
            let Some(size) = size_of(cur, process) else {
                return Err(TestCaseError::fail(format!("{process} missing after placement")));
            };
            let fitting: Vec<&MemoryBlock> = prev.memory_state
                .iter()
                .filter(|b| b.fits(size))
                .collect();
            let Some(chosen) = fitting.iter().find(|b| b.start_address == *address) else {
                return Err(TestCaseError::fail(format!("{process} placed in a block that didn't fit")));
            };
            match policy {
                FitPolicy::First => prop_assert!(fitting.iter().all(|b| b.start_address >= chosen.start_address)),
                FitPolicy::Best  => prop_assert!(fitting.iter().all(|b| b.size >= chosen.size)),
                FitPolicy::Worst => prop_assert!(fitting.iter().all(|b| b.size <= chosen.size)),
                FitPolicy::Next  => {
                    let resumed = cursor
                        .and_then(|c| fitting.iter().find(|b| b.start_address >= c))
                        .or(fitting.first());
                    prop_assert_eq!(resumed.map(|b| b.start_address), Some(chosen.start_address));
                },
            }
            cursor = Some(*address + size);
        }
    }

    #[test]
    fn runs_are_deterministic(
        (total, block) in arena_shape(),
        specs in workload(),
        policy in any_policy(),
    ) {
        let (a, _) = steps_of(run_memory_simulation(total, block, &specs, policy))?;
        let (b, _) = steps_of(run_memory_simulation(total, block, &specs, policy))?;
        prop_assert_eq!(a, b);
    }

    #[test]
    fn coalescing_twice_changes_nothing(
        (total, block) in arena_shape(),
        specs in workload(),
        policy in any_policy(),
    ) {
        let (steps, _) = steps_of(run_memory_simulation(total, block, &specs, policy))?;
        for s in &steps {
            let once = arena::coalesce(s.memory_state.clone());
            prop_assert!(analyze::check_coalesced(&once).is_ok());
            prop_assert!(analyze::check_blocks(&once, total).is_ok());
            prop_assert_eq!(arena::coalesce(once.clone()), once);
        }
    }
}
