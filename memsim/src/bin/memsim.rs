use memsim::*;
use anyhow::Context;

/// Replays a workload of processes over a partitioned memory
/// under one placement policy.
#[derive(Parser, Debug)]
struct Arg {
    /// Path to a workload CSV (header, then `id,size,arrival,burst` rows)
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf))]
    input:          PathBuf,

    /// Total memory size
    #[arg(short, long, default_value_t = 1024)]
    total:          ByteSteps,

    /// Size of the initial blocks
    #[arg(short, long, default_value_t = 64)]
    block:          ByteSteps,

    /// Placement policy
    #[arg(value_enum, default_value_t = FitPolicy::First)]
    policy:         FitPolicy,

    /// Also record a step at every clock increment
    #[arg(long)]
    ticks:          bool,

    /// Print the steps as JSON instead of a table
    #[arg(long)]
    json:           bool,
}

fn print_steps(steps: &[SimulationStep]) {
    println!("{:>6}  {:<60}  {:>7}  {:>7}  memory", "time", "action", "waiting", "placed");
    for s in steps {
        println!(
            "{:>6}  {:<60}  {:>7}  {:>7}  {}",
            s.time,
            s.action,
            s.waiting_processes.len(),
            s.completed_processes.len(),
            s.memory_state.iter().join(" "),
        );
    }
}

fn report(steps: &[SimulationStep], cli: &Arg) -> anyhow::Result<()> {
    let summary = RunSummary::new(cli.policy, steps, cli.total);
    if cli.json {
        let out = serde_json::json!({
            "steps":    steps,
            "summary":  summary,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_steps(steps);
        println!();
        println!("policy:             {}", summary.policy);
        println!("steps:              {}", summary.steps);
        println!("makespan:           {}", summary.makespan);
        println!("avg wait time:      {:.2}", summary.average_wait_time);
        println!("avg utilization:    {:.2}%", summary.memory_utilization);
        println!("peak utilization:   {:.2}%", summary.peak_utilization);
        println!("max fragmentation:  {:.2}%", summary.fragmentation);
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Arg::parse();
    let specs = read_from_path::<WorkloadCSVParser, &[ByteSteps; 3]>(cli.input.clone())
        .with_context(|| format!("reading {}", cli.input.display()))?;
    let config = SimConfig::new(cli.total, cli.block, cli.policy)
        .with_tick_steps(cli.ticks);

    match Simulator::new(config)?.run(&specs) {
        Ok(steps)   => report(&steps, &cli),
        Err(SimError::UnschedulableProcess { time, ids, steps }) => {
            report(&steps, &cli)?;
            anyhow::bail!("stalled at t = {time}: {} can never be placed", ids.join(", "))
        },
        Err(e)      => Err(e.into()),
    }
}
