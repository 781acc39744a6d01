//! Persisted text output: a header, one line per active batch, and the final running mean ± σ
//! for every canonical tally.

use std::io::{self, Write};
use std::time::Duration;

use helios_core::driver::RunSummary;
use helios_core::geometry::Geometry;
use helios_core::material::Medium;

pub struct BatchRecord {
    pub batch_index: u32,
    pub keff: f64,
    pub elapsed: Duration,
}

/// Writes the run header: seed, geometry summary, material summary.
pub fn write_header(
    mut out: impl Write,
    seed: u64,
    geometry: &Geometry,
    medium: &Medium,
) -> io::Result<()> {
    writeln!(out, "helios run")?;
    writeln!(out, "seed: {seed}")?;
    writeln!(
        out,
        "geometry: {} surfaces, {} cells, {} universes, {} lattices",
        geometry.surfaces.len(),
        geometry.cells.len(),
        geometry.universes.len(),
        geometry.lattices.len(),
    )?;
    writeln!(
        out,
        "materials: {} materials, {} isotopes",
        medium.materials.len(),
        medium.isotopes.len(),
    )?;
    writeln!(out)?;
    Ok(())
}

/// Writes one active batch's running k-eff estimate and elapsed time.
pub fn write_batch(mut out: impl Write, record: &BatchRecord) -> io::Result<()> {
    writeln!(
        out,
        "batch {:>5}  k-eff = {:.6}  ({:.3}s)",
        record.batch_index,
        record.keff,
        record.elapsed.as_secs_f64(),
    )
}

/// Writes the final summary: running mean ± σ for every canonical tally.
pub fn write_summary(mut out: impl Write, summary: &RunSummary) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "batches run: {}", summary.batches_run)?;
    writeln!(
        out,
        "k-eff       = {:.6} +/- {:.6}",
        summary.keff_mean, summary.keff_std
    )?;
    writeln!(out, "leakage     = {:.6}", summary.leakage_mean)?;
    writeln!(out, "absorption  = {:.6}", summary.absorption_mean)?;
    Ok(())
}
