use sched::*;
use anyhow::Context;

/// Runs a task set under one CPU scheduling discipline.
#[derive(Parser, Debug)]
struct Arg {
    /// Path to a task CSV (header, then `id,arrival,burst[,priority]` rows)
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf))]
    input:          PathBuf,

    /// Scheduling discipline
    #[arg(value_enum, default_value_t = Discipline::Fcfs)]
    discipline:     Discipline,

    /// Print the schedule as JSON instead of a table
    #[arg(long)]
    json:           bool,
}

fn main() -> anyhow::Result<()> {
    memsim::init_tracing();
    let cli = Arg::parse();
    let tasks = TaskCSVParser::new(cli.input.clone())
        .read_tasks()
        .with_context(|| format!("reading {}", cli.input.display()))?;
    let s = schedule(&tasks, cli.discipline)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&s)?);
        return Ok(());
    }
    println!(
        "{:<8} {:>8} {:>6} {:>6} {:>10} {:>11} {:>8}",
        "id", "arrival", "burst", "start", "completion", "turnaround", "waiting"
    );
    for r in &s.results {
        println!(
            "{:<8} {:>8} {:>6} {:>6} {:>10} {:>11} {:>8}",
            r.task.id,
            r.task.arrival_time,
            r.task.burst_time,
            r.start_time,
            r.completion_time,
            r.turnaround_time,
            r.waiting_time,
        );
    }
    println!();
    println!("{} average waiting time:     {:.2}", s.discipline, s.avg_waiting_time);
    println!("{} average turnaround time:  {:.2}", s.discipline, s.avg_turnaround_time);
    println!("{} CPU utilization:          {:.2}%", s.discipline, s.cpu_utilization);

    Ok(())
}
