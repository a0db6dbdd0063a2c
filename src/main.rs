use clap::Parser;
use std::path::PathBuf;
use std::sync::Once;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mycocomp::config::SimulationConfig;
use mycocomp::growth::GrowthPolicy;
use mycocomp::params::load_parameters;
use mycocomp::report::{describe, write_outputs};
use mycocomp::simulation::Simulation;
use mycocomp::solver::SolverKind;

static INIT: Once = Once::new();

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (YAML or JSON). If not specified, searches for mycocomp.yaml, mycocomp.yml, or mycocomp.json in current directory.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Variables folder: one file per strain plus an `environments` sub-folder
    #[arg(long)]
    vars: Option<PathBuf>,

    /// Simulation end time
    #[arg(long)]
    t_max: Option<f64>,

    /// Number of output time points between 0 and t-max
    #[arg(long)]
    steps: Option<usize>,

    #[arg(long, value_enum)]
    policy: Option<GrowthPolicy>,

    #[arg(long, value_enum)]
    solver: Option<SolverKind>,

    /// Directory for CSV/JSON/PNG output
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip PNG charts
    #[arg(long)]
    no_plot: bool,

    /// Skip printing parameter descriptions
    #[arg(short, long)]
    quiet: bool,
}

/// Log filter comes from `MYCOCOMP_LOG`, e.g. `MYCOCOMP_LOG=mycocomp=debug`
fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("MYCOCOMP_LOG")
            .unwrap_or_else(|_| EnvFilter::new("mycocomp=info"));

        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .init();
    });
}

/// Load configuration from file or use default, then apply command line overrides
fn load_config(args: &Args) -> Result<SimulationConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => SimulationConfig::from_file(path)
            .map_err(|e| format!("Failed to load config from {}: {}", path.display(), e))?,
        None => SimulationConfig::from_default_paths()?,
    };

    if let Some(vars) = &args.vars {
        config.vars_dir = vars.clone();
    }
    if let Some(t_max) = args.t_max {
        config.t_max = t_max;
    }
    if let Some(steps) = args.steps {
        config.t_steps = steps;
    }
    if let Some(policy) = args.policy {
        config.policy = policy;
    }
    if let Some(solver) = args.solver {
        config.solver = solver;
    }
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }
    if args.no_plot {
        config.plot = false;
    }

    config.validate()?;
    Ok(config)
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args)?;
    let params = load_parameters(&config.vars_dir)?;

    // Every model is built (and validated) before any integration starts
    let sim = Simulation::with_config(&params, &config)?;
    if !args.quiet {
        describe(&params, &sim.models);
    }

    let runs = sim.run_all()?;
    let written = write_outputs(&runs, &config)?;
    for path in &written {
        println!("wrote {}", path.display());
    }
    info!(environments = runs.len(), "done");
    Ok(())
}

fn main() {
    init_tracing();
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
