//! Error taxonomy for the engine.
//!
//! Setup-time errors (definition errors, data errors) are explicit [`Result`] values that bubble up
//! to the driver binary. Runtime transport errors never propagate through a return channel on the
//! history hot path; they are recorded in a [`LostParticleCounter`] instead.

use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error as ThisError;

/// Errors raised while building the geometry catalogue (surfaces, cells, universes, lattices).
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum GeometryError {
    #[error("duplicate surface id {0}")]
    DuplicateSurfaceId(i64),
    #[error("duplicate cell id {0}")]
    DuplicateCellId(i64),
    #[error("duplicate universe id {0}")]
    DuplicateUniverseId(i64),
    #[error("unknown surface reference {0} in cell expression")]
    UnknownSurface(i64),
    #[error("unknown universe reference {0}")]
    UnknownUniverse(i64),
    #[error("unknown lattice reference {0}")]
    UnknownLattice(i64),
    #[error("unsupported surface type: {0}")]
    UnsupportedSurfaceType(String),
    #[error("malformed boolean expression for cell {0}: {1}")]
    BadExpression(i64, String),
    #[error("cyclic universe graph detected starting at universe {0}")]
    CyclicUniverse(i64),
    #[error("lattice {0} universe array size does not match its dimension vector")]
    BadLatticeShape(i64),
}

/// Errors raised while building the material catalogue (media, isotopes, reaction tables).
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum MaterialError {
    #[error("cannot access material {0}: {1}")]
    Unknown(i64, String),
    #[error("duplicate material id {0}")]
    DuplicateMaterialId(i64),
    #[error("non-monotone energy grid for isotope {0}")]
    NonMonotoneEnergyGrid(String),
    #[error("negative cross section for isotope {0}, reaction {1}")]
    NegativeCrossSection(String, String),
    #[error("inconsistent group count: expected {expected}, got {got}")]
    InconsistentGroupCount { expected: usize, got: usize },
}

/// Errors raised while validating or applying the simulation [`Settings`](crate::driver::settings::Settings).
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum SetupError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Material(#[from] MaterialError),
    #[error("missing required setting: {0}")]
    MissingSetting(String),
    #[error("no source sampler configured")]
    MissingSource,
}

/// Errors that can occur once a simulation is running (thread pool setup, communication).
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum RuntimeError {
    #[error("too many lost particles in this run ({0}); aborting")]
    TooManyLostParticles(u64),
    #[error("thread pool initialization failed: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Bounded, lock-free diagnostic counter for runtime transport errors.
///
/// First occurrence of each kind logs a warning; after that the counter just accumulates. The
/// history that triggered the event is killed and the simulation continues — never fatal for a
/// single history, until [`LostParticleCounter::check_cap`] reports the per-run cap is exceeded,
/// at which point the whole run aborts.
#[derive(Debug, Default)]
pub struct LostParticleCounter {
    lost_neighbor: AtomicU64,
    nan_intersection: AtomicU64,
    non_positive_total_xs: AtomicU64,
}

impl LostParticleCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a neighbour-resolution failure after a surface crossing, returns the new total.
    pub fn record_lost_neighbor(&self) -> u64 {
        let prev = self.lost_neighbor.fetch_add(1, Ordering::Relaxed);
        if prev == 0 {
            log::warn!("lost particle: neighbour cell not found after crossing");
        }
        self.total()
    }

    /// Records a NaN produced during ray/surface intersection.
    pub fn record_nan_intersection(&self) -> u64 {
        let prev = self.nan_intersection.fetch_add(1, Ordering::Relaxed);
        if prev == 0 {
            log::warn!("lost particle: NaN in ray intersection");
        }
        self.total()
    }

    /// Records a non-positive total cross section encountered during transport.
    pub fn record_non_positive_total_xs(&self) -> u64 {
        let prev = self.non_positive_total_xs.fetch_add(1, Ordering::Relaxed);
        if prev == 0 {
            log::warn!("lost particle: total cross section <= 0");
        }
        self.total()
    }

    pub fn total(&self) -> u64 {
        self.lost_neighbor.load(Ordering::Relaxed)
            + self.nan_intersection.load(Ordering::Relaxed)
            + self.non_positive_total_xs.load(Ordering::Relaxed)
    }

    /// Returns an error once `total()` exceeds `cap`, signalling the run should abort.
    pub fn check_cap(&self, cap: u64) -> Result<(), RuntimeError> {
        let total = self.total();
        if total > cap {
            Err(RuntimeError::TooManyLostParticles(total))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates_across_kinds() {
        let counter = LostParticleCounter::new();
        counter.record_lost_neighbor();
        counter.record_nan_intersection();
        counter.record_non_positive_total_xs();
        assert_eq!(counter.total(), 3);
    }

    #[test]
    fn cap_trips_only_once_exceeded() {
        let counter = LostParticleCounter::new();
        for _ in 0..5 {
            counter.record_lost_neighbor();
        }
        assert!(counter.check_cap(5).is_ok());
        counter.record_lost_neighbor();
        assert!(counter.check_cap(5).is_err());
    }
}
