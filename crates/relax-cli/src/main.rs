//! relax - relax a square grid to convergence and print the result.
//!
//! # Examples
//!
//! ```bash
//! # 100x100 random grid, precision 0.5, one worker
//! relax
//!
//! # 500x500, 8 workers, tighter precision, per-iteration output
//! relax -d 500 -t 8 -p 0.01 -v
//!
//! # Fixed initial values from a file, distributed backend
//! relax -d 5 --seed-file grid.txt --backend distributed -t 3
//! ```
//!
//! Exit status: 0 on convergence, 1 on any error, 2 when `--max-iterations`
//! stops an unconverged run.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Parser, ValueEnum};
use relax::types::parse_seed_values;
use relax::prelude::*;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod output;

use output::{format_grid, summary};

/// Parallel Jacobi relaxation of a square grid
#[derive(Parser, Debug)]
#[command(name = "relax")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Print the grid after every iteration and log worker layout
    #[arg(short, long)]
    verbose: bool,

    /// Grid side length, boundary included (at least 3)
    #[arg(short, long, default_value_t = 100)]
    dimension: usize,

    /// Convergence threshold
    #[arg(short, long, default_value_t = 0.5, allow_negative_numbers = true)]
    precision: f64,

    /// Worker threads (or distributed participants)
    #[arg(short, long, default_value_t = 1)]
    threads: usize,

    /// Load initial values (whitespace or comma separated) from a file
    #[arg(long, conflicts_with_all = ["seed", "fixed_boundary"])]
    seed_file: Option<PathBuf>,

    /// RNG seed for the random fill (default: derived from the clock)
    #[arg(long)]
    seed: Option<u64>,

    /// Hold the boundary at 1 and start the interior at 0
    #[arg(long, conflicts_with = "seed")]
    fixed_boundary: bool,

    /// Execution backend
    #[arg(long, value_enum, default_value_t = BackendArg::Shared)]
    backend: BackendArg,

    /// Work split for the shared-memory backend
    #[arg(long, value_enum, default_value_t = GranularityArg::Cells)]
    granularity: GranularityArg,

    /// Stop after this many iterations even if not converged
    #[arg(long)]
    max_iterations: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    Shared,
    Distributed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum GranularityArg {
    Cells,
    Rows,
}

impl Cli {
    fn config(&self) -> EngineConfig {
        EngineConfig {
            rows: self.dimension,
            cols: self.dimension,
            precision: self.precision,
            workers: self.threads,
            backend: match self.backend {
                BackendArg::Shared => Backend::SharedMemory,
                BackendArg::Distributed => Backend::Distributed,
            },
            granularity: match self.granularity {
                GranularityArg::Cells => Granularity::Cells,
                GranularityArg::Rows => Granularity::Rows,
            },
            max_iterations: self.max_iterations,
        }
    }

    fn seed(&self) -> Result<Seed, RelaxError> {
        if let Some(path) = &self.seed_file {
            return read_seed_file(path);
        }
        if self.fixed_boundary {
            return Ok(Seed::FixedBoundary {
                boundary: 1.0,
                interior: 0.0,
            });
        }
        let seed = self.seed.unwrap_or_else(clock_seed);
        debug!(seed, "random fill");
        Ok(Seed::Random { seed })
    }
}

fn read_seed_file(path: &Path) -> Result<Seed, RelaxError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(Seed::Values(parse_seed_values(&text)?))
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

/// Run to completion. Returns the report; nothing is printed on error.
fn execute(cli: &Cli) -> Result<RelaxReport, RelaxError> {
    let config = cli.config();
    let engine = Engine::new(config.clone())?;
    let grid = cli.seed()?.build(config.rows, config.cols)?;
    if cli.verbose {
        engine.run_observed(grid, |view| {
            if !view.last {
                print!("{}", format_grid(view.values, view.cols));
            }
        })
    } else {
        engine.run(grid)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match execute(&cli) {
        Ok(report) => {
            println!("{}", summary(report.iterations));
            print!("{}", format_grid(report.grid.current(), report.grid.cols()));
            if report.converged {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
