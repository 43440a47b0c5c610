use sanity::*;
use memsim::*;
use anyhow::Context;
use rand::{rngs::StdRng, SeedableRng};

/// Runs all placement policies over one workload, verifies every
/// recorded step and compares the outcomes.
#[derive(Parser, Debug)]
struct Arg {
    /// Path to a workload CSV (header, then `id,size,arrival,burst` rows)
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf), conflicts_with = "random")]
    input:          Option<PathBuf>,

    /// Draw this many random processes instead of reading a file
    #[arg(short, long)]
    random:         Option<usize>,

    /// Seed for `--random`
    #[arg(long, default_value_t = 42)]
    seed:           u64,

    /// Total memory size
    #[arg(short, long, default_value_t = 1024)]
    total:          ByteSteps,

    /// Size of the initial blocks
    #[arg(short, long, default_value_t = 64)]
    block:          ByteSteps,

    /// Directory for the per-policy JSON and SVG files
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf))]
    out:            PathBuf,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Arg::parse();
    let specs = match (&cli.input, cli.random) {
        (Some(p), _)        => read_from_path::<WorkloadCSVParser, &[ByteSteps; 3]>(p.clone())
            .with_context(|| format!("reading {}", p.display()))?,
        (None, Some(n))     => {
            let limits = WorkloadLimits {
                max_size:       (cli.total / 4).max(1),
                max_arrival:    n,
                max_burst:      10,
            };
            random_workload(n, &limits, &mut StdRng::seed_from_u64(cli.seed))
        },
        (None, None)        => anyhow::bail!("either --input or --random is needed"),
    };
    std::fs::create_dir_all(&cli.out)
        .with_context(|| format!("creating {}", cli.out.display()))?;

    let runs = run_all(cli.total, cli.block, &specs, false)?;
    print!("{}", comparison(&runs));
    println!("ranking: {}", ranking(&runs).iter().map(|p| p.name()).join(" > "));
    for r in &runs {
        let json = export_json(r, &cli.out)?;
        let svg = plot::plot_run(r, cli.total, &cli.out)?;
        println!("{}: {} {}", r.policy.slug(), json.display(), svg.display());
    }

    Ok(())
}
