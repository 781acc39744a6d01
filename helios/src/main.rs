//! `helios`: driver binary for the Monte Carlo neutron transport engine.
//!
//! Reads a JSON array of input objects, builds the geometry/material catalogue, runs the k-eff
//! power-iteration driver, and writes a text report. Exit codes: 0 clean completion, 1 input
//! parse error, 2 setup error, 3 runtime error.

mod input;
mod output;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use helios_core::driver::{ConcurrencyPolicy, KeffDriver, PointIsotropicSource};
use thiserror::Error as ThisError;

#[derive(Parser, Debug)]
#[command(name = "helios", about = "Monte Carlo neutron transport engine")]
struct Cli {
    /// Path to a JSON file holding an array of input objects.
    input: PathBuf,

    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    batches: Option<u32>,
    #[arg(long)]
    inactive: Option<u32>,
    #[arg(long)]
    particles: Option<u64>,
    #[arg(long)]
    threads: Option<usize>,
    #[arg(long)]
    output: Option<PathBuf>,
}

const EXIT_CLEAN: u8 = 0;
const EXIT_PARSE_ERROR: u8 = 1;
const EXIT_SETUP_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::new().filter_or("LOG_LEVEL", "info")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::from(EXIT_CLEAN),
        Err(Failure::Parse(err)) => {
            log::error!("failed to parse input: {err}");
            ExitCode::from(EXIT_PARSE_ERROR)
        }
        Err(Failure::Setup(err)) => {
            log::error!("failed to set up run: {err}");
            ExitCode::from(EXIT_SETUP_ERROR)
        }
        Err(Failure::Runtime(err)) => {
            log::error!("run aborted: {err}");
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}

#[derive(Debug, ThisError)]
enum Failure {
    #[error("{0}")]
    Parse(String),
    #[error(transparent)]
    Setup(#[from] helios_core::SetupError),
    #[error(transparent)]
    Runtime(#[from] helios_core::error::RuntimeError),
}

impl From<io::Error> for Failure {
    fn from(err: io::Error) -> Self {
        Failure::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for Failure {
    fn from(err: serde_json::Error) -> Self {
        Failure::Parse(err.to_string())
    }
}

fn run(cli: Cli) -> Result<(), Failure> {
    // `NUCLEAR_DATA_PATH` is read here so downstream tooling (an ACE reader, a cross-section
    // cache) has a stable place to look; the macro-xs input kind this binary actually parses
    // doesn't need it.
    if let Ok(path) = std::env::var("NUCLEAR_DATA_PATH") {
        log::debug!("NUCLEAR_DATA_PATH set to {path}");
    }

    let text = std::fs::read_to_string(&cli.input)?;
    let objects: Vec<input::InputObject> = serde_json::from_str(&text)?;

    let input::BuiltInput {
        geometry,
        medium,
        mut settings,
        sources,
    } = input::build(objects)?;

    if let Some(seed) = cli.seed {
        settings.seed = seed;
    }
    if let Some(batches) = cli.batches {
        settings.criticality.batches = batches;
    }
    if let Some(inactive) = cli.inactive {
        settings.criticality.inactive = inactive;
    }
    if let Some(particles) = cli.particles {
        settings.criticality.particles = particles;
    }
    if let Some(threads) = cli.threads {
        settings.threads = Some(threads);
    }

    if let Some(threads) = settings.threads {
        if settings.multithread != ConcurrencyPolicy::Single {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()
                .map_err(helios_core::error::RuntimeError::from)?;
        }
    }

    let source = sources.into_iter().next().unwrap_or(PointIsotropicSource {
        position: [0.0, 0.0, 0.0],
        energy: 2.0e6,
    });

    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout()),
    };

    output::write_header(&mut out, settings.seed, &geometry, &medium)?;

    let mut driver = KeffDriver::new(&geometry, &medium, &settings);
    let summary = {
        let mut on_batch = |batch_idx: u32, keff: f64, elapsed: std::time::Duration| {
            if batch_idx >= settings.criticality.inactive {
                let record = output::BatchRecord {
                    batch_index: batch_idx,
                    keff,
                    elapsed,
                };
                let _ = output::write_batch(&mut out, &record);
            }
        };
        driver.run(&source, Some(&mut on_batch))?
    };

    output::write_summary(&mut out, &summary)?;
    if driver.lost_particles() > 0 {
        log::warn!("{} particles were lost during this run", driver.lost_particles());
    }

    Ok(())
}
