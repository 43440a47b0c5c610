use memsim::*;
use pretty_assertions::assert_eq;

fn get_crate_root() -> Result<PathBuf, std::env::VarError> {
    Ok(PathBuf::from(std::env::var("CARGO_MANIFEST_DIR")?))
}

fn read_workload(p: &str) -> Result<Vec<ProcSpec>, Box<dyn std::error::Error>> {
    let mut csv_path = get_crate_root()?;
    csv_path.push(p);
    let specs = read_from_path::<WorkloadCSVParser, &[ByteSteps; 3]>(csv_path)?;
    assert!(!specs.is_empty());

    Ok(specs)
}

fn block(id: u32, start: ByteSteps, end: ByteSteps, owner: Option<&str>) -> MemoryBlock {
    MemoryBlock {
        id,
        size:           end - start,
        allocated:      owner.is_some(),
        process_id:     owner.map(String::from),
        start_address:  start,
        end_address:    end,
    }
}

fn ids(ps: &[Process]) -> Vec<&str> {
    ps.iter().map(|p| p.id.as_str()).collect()
}

fn allocation_address(steps: &[SimulationStep], pid: &str) -> Option<ByteSteps> {
    steps.iter().find_map(|s| match &s.event {
        StepEvent::Allocated { process, address, .. } if process == pid => Some(*address),
        _ => None,
    })
}

#[test]
fn two_processes_first_fit() {
    let specs = read_workload("tests/data/two_procs.csv").unwrap();
    let steps = run_memory_simulation(100, 100, &specs, FitPolicy::First).unwrap();

    let actions: Vec<&str> = steps.iter().map(|s| s.action.as_str()).collect();
    assert_eq!(actions, vec![
        "Initial memory state",
        "Allocated process P1 at address 0 (First Fit)",
        "Allocated process P2 at address 40 (First Fit)",
        "Deallocated process P2",
        "Deallocated process P1",
    ]);
    let times: Vec<ByteSteps> = steps.iter().map(|s| s.time).collect();
    assert_eq!(times, vec![0, 0, 0, 3, 5]);

    assert_eq!(steps[0].memory_state, vec![block(0, 0, 100, None)]);
    assert_eq!(ids(&steps[0].waiting_processes), vec!["P1", "P2"]);
    assert!(steps[0].completed_processes.is_empty());

    assert_eq!(steps[2].memory_state, vec![
        block(0, 0, 40, Some("P1")),
        block(1, 40, 70, Some("P2")),
        block(2, 70, 100, None),
    ]);
    assert!(steps[2].waiting_processes.is_empty());

    // P2's hole merges with the tail.
    assert_eq!(steps[3].memory_state, vec![
        block(0, 0, 40, Some("P1")),
        block(1, 40, 100, None),
    ]);
    assert_eq!(steps[4].memory_state, vec![block(0, 0, 100, None)]);

    let last = &steps[4].completed_processes;
    assert_eq!(ids(last), vec!["P1", "P2"]);
    assert!(last.iter().all(|p| !p.allocated && p.start_address.is_none()));
    assert_eq!(last[0].released_at, Some(5));
    assert_eq!(last[1].released_at, Some(3));
}

#[test]
fn events_mirror_actions() {
    let specs = read_workload("tests/data/two_procs.csv").unwrap();
    let steps = run_memory_simulation(100, 100, &specs, FitPolicy::Best).unwrap();
    assert_eq!(steps[0].event, StepEvent::Initial);
    assert_eq!(steps[1].event, StepEvent::Allocated {
        process:    String::from("P1"),
        address:    0,
        policy:     FitPolicy::Best,
    });
    assert_eq!(steps[3].event, StepEvent::Deallocated { process: String::from("P2") });
}

#[test]
fn policies_diverge_on_a_fragmented_arena() {
    let specs = read_workload("tests/data/divergence.csv").unwrap();
    let expected = [
        (FitPolicy::First,  0),
        (FitPolicy::Best,   90),
        (FitPolicy::Worst,  0),
        (FitPolicy::Next,   90),
    ];
    for (policy, addr) in expected {
        let steps = run_memory_simulation(100, 50, &specs, policy).unwrap();
        assert_eq!(allocation_address(&steps, "P2"), Some(50), "{policy}");
        assert_eq!(allocation_address(&steps, "P3"), Some(addr), "{policy}");
        analyze::check_steps(&steps, 100).unwrap();
    }
}

#[test]
fn next_fit_resumes_past_last_placement_after_coalescing() {
    let specs = vec![
        ProcSpec::new(10, 0, 1),
        ProcSpec::new(10, 0, 1),
        ProcSpec::new(10, 0, 10),
        ProcSpec::new(15, 2, 1),
    ];
    let steps = run_memory_simulation(100, 100, &specs, FitPolicy::Next).unwrap();
    // P1 and P2 merge into [0, 20) at t=1, P3 still ends at 30.
    assert_eq!(allocation_address(&steps, "P3"), Some(20));
    assert_eq!(allocation_address(&steps, "P4"), Some(30));
    let p4 = steps.iter()
        .find(|s| matches!(&s.event, StepEvent::Allocated { process, .. } if process == "P4"))
        .unwrap();
    assert_eq!(p4.time, 2);
    assert_eq!(p4.action, "Allocated process P4 at address 30 (Next Fit)");
    analyze::check_steps(&steps, 100).unwrap();
}

#[test]
fn late_admission_still_runs_one_tick() {
    let specs = vec![ProcSpec::new(60, 0, 4), ProcSpec::new(60, 1, 2)];
    let steps = run_memory_simulation(100, 100, &specs, FitPolicy::First).unwrap();
    let actions: Vec<(ByteSteps, &str)> = steps.iter()
        .map(|s| (s.time, s.action.as_str()))
        .collect();
    assert_eq!(actions, vec![
        (0, "Initial memory state"),
        (0, "Allocated process P1 at address 0 (First Fit)"),
        (4, "Deallocated process P1"),
        (5, "Allocated process P2 at address 0 (First Fit)"),
        (6, "Deallocated process P2"),
    ]);
    let p2 = &steps[4].completed_processes[1];
    assert_eq!(p2.admitted_at, Some(5));
    assert_eq!(p2.wait_time(), Some(4));
}

#[test]
fn idle_gaps_are_skipped() {
    let specs = vec![ProcSpec::new(10, 7, 1)];
    let steps = run_memory_simulation(64, 16, &specs, FitPolicy::Worst).unwrap();
    assert_eq!(steps.len(), 3);
    assert_eq!(steps[1].time, 7);
    assert_eq!(steps[2].time, 8);
}

#[test]
fn far_arrivals_are_reached_in_one_jump() {
    let arrival = 1_000_000_000_000;
    let specs = vec![ProcSpec::new(10, arrival, 1)];
    let steps = run_memory_simulation(64, 64, &specs, FitPolicy::First).unwrap();
    let times: Vec<ByteSteps> = steps.iter().map(|s| s.time).collect();
    assert_eq!(times, vec![0, arrival, arrival + 1]);
}

#[test]
fn idle_gap_between_runs_is_skipped() {
    let specs = vec![ProcSpec::new(10, 0, 2), ProcSpec::new(10, 50_000_000_000, 1)];
    let steps = run_memory_simulation(64, 64, &specs, FitPolicy::Best).unwrap();
    let actions: Vec<(ByteSteps, &str)> = steps.iter()
        .map(|s| (s.time, s.action.as_str()))
        .collect();
    assert_eq!(actions, vec![
        (0, "Initial memory state"),
        (0, "Allocated process P1 at address 0 (Best Fit)"),
        (2, "Deallocated process P1"),
        (50_000_000_000, "Allocated process P2 at address 0 (Best Fit)"),
        (50_000_000_001, "Deallocated process P2"),
    ]);
}

#[test]
fn tick_steps_are_recorded_on_demand() {
    let specs = vec![ProcSpec::new(10, 0, 2)];
    let config = SimConfig::new(64, 64, FitPolicy::First).with_tick_steps(true);
    let steps = Simulator::new(config).unwrap().run(&specs).unwrap();
    let actions: Vec<&str> = steps.iter().map(|s| s.action.as_str()).collect();
    assert_eq!(actions, vec![
        "Initial memory state",
        "Allocated process P1 at address 0 (First Fit)",
        "Time increment to 1",
        "Time increment to 2",
        "Deallocated process P1",
    ]);
    assert!(matches!(steps[2].event, StepEvent::Tick));
}

#[test]
fn oversized_process_stalls() {
    let specs = vec![ProcSpec::new(150, 0, 1)];
    match run_memory_simulation(100, 100, &specs, FitPolicy::First) {
        Err(SimError::UnschedulableProcess { time, ids, steps }) => {
            assert_eq!(time, 0);
            assert_eq!(ids, vec![String::from("P1")]);
            assert_eq!(steps.len(), 2);
            assert_eq!(steps[1].action, "Stalled: process(es) P1 can never be placed");
            assert_eq!(steps[1].event, StepEvent::Stalled { processes: ids });
        },
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn oversized_process_stalls_after_the_rest_finishes() {
    let specs = vec![ProcSpec::new(40, 0, 3), ProcSpec::new(150, 0, 1)];
    match run_memory_simulation(100, 100, &specs, FitPolicy::Next) {
        Err(SimError::UnschedulableProcess { time, ids, steps }) => {
            assert_eq!(time, 4);
            assert_eq!(ids, vec![String::from("P2")]);
            let times: Vec<ByteSteps> = steps.iter().map(|s| s.time).collect();
            assert_eq!(times, vec![0, 0, 3, 4]);
        },
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn blocks_never_merge_before_a_free() {
    // Nothing is ever freed while P1 waits, and 16-byte blocks can't hold it.
    let specs = vec![ProcSpec::new(20, 0, 1)];
    assert!(matches!(
        run_memory_simulation(64, 16, &specs, FitPolicy::Best),
        Err(SimError::UnschedulableProcess { time: 0, .. })
    ));
}

#[test]
fn bad_configurations_are_rejected() {
    let specs = vec![ProcSpec::new(10, 0, 1)];
    for (total, block) in [(0, 1), (10, 0), (10, 11)] {
        match run_memory_simulation(total, block, &specs, FitPolicy::First) {
            Err(SimError::InvalidConfiguration { culprit: None, .. }) => {},
            other => panic!("({total}, {block}) gave {other:?}"),
        }
    }
}

#[test]
fn bad_processes_are_rejected() {
    let zero_burst = ProcSpec::new(10, 0, 0);
    match run_memory_simulation(100, 10, &[ProcSpec::new(10, 0, 1), zero_burst], FitPolicy::First) {
        Err(SimError::InvalidConfiguration { message, culprit }) => {
            assert_eq!(culprit, Some(zero_burst));
            assert!(message.contains("P2"));
        },
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(
        read_workload("tests/data/zero_size.csv").map_err(|e| e.to_string()),
        Err(msg) if msg.contains("0 size")
    ));
}

#[test]
fn empty_workload_yields_initial_step_only() {
    let steps = run_memory_simulation(100, 30, &[], FitPolicy::First).unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].memory_state.len(), 4);
}

#[test]
fn steps_do_not_alias() {
    let specs = read_workload("tests/data/divergence.csv").unwrap();
    let simulator = Simulator::new(SimConfig::new(100, 50, FitPolicy::Worst)).unwrap();
    let first = simulator.run(&specs).unwrap();
    let second = simulator.run(&specs).unwrap();
    // Independent runs, identical histories.
    assert_eq!(first, second);
    // The initial snapshot survived every later mutation.
    assert_eq!(first[0].memory_state, vec![
        block(0, 0, 50, None),
        block(1, 50, 100, None),
    ]);
}

#[test]
fn summary_figures() {
    let specs = read_workload("tests/data/two_procs.csv").unwrap();
    let steps = run_memory_simulation(100, 100, &specs, FitPolicy::First).unwrap();
    let s = RunSummary::new(FitPolicy::First, &steps, 100);
    assert_eq!(s.steps, 5);
    assert_eq!(s.makespan, 5);
    assert_eq!(s.placed, 2);
    assert_eq!(s.average_wait_time, 0.0);
    assert_eq!(s.peak_utilization, 70.0);
    // 0, 40, 70, 40, 0
    assert_eq!(s.memory_utilization, 30.0);
    assert_eq!(s.fragmentation, 0.0);
    assert!(s.stalled.is_empty());
}

#[test]
fn steps_serialize_in_camel_case() {
    let specs = read_workload("tests/data/two_procs.csv").unwrap();
    let steps = run_memory_simulation(100, 100, &specs, FitPolicy::First).unwrap();
    let json = serde_json::to_value(&steps[1]).unwrap();
    assert_eq!(json["memoryState"][0]["processId"], "P1");
    assert_eq!(json["memoryState"][0]["startAddress"], 0);
    assert_eq!(json["completedProcesses"][0]["arrivalTime"], 0);
    assert_eq!(json["event"]["kind"], "allocated");
    let back: SimulationStep = serde_json::from_value(json).unwrap();
    assert_eq!(back, steps[1]);
}
