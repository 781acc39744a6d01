//! K-eff power-iteration driver: batch loop, fission-bank propagation, tally reduction. Grounded on
//! the reference implementation's `AnalogKeff` / `KeffSimulation::launch`: analog capture, with the
//! fission bank renormalized and split/combed back to a stable population once per batch rather
//! than weight-adjusted particle by particle during transport.

use std::time::{Duration, Instant};

use rayon::prelude::*;
use smallvec::SmallVec;

use super::settings::{ConcurrencyPolicy, Settings};
use super::source::SourceSampler;
use crate::error::{LostParticleCounter, RuntimeError};
use crate::geometry::{Geometry, Locator};
use crate::material::Medium;
use crate::particle::{BankedParticle, CellParticle, FissionBank, Particle};
use crate::rng::Stream;
use crate::tally::{Estimator, TallyContainer, TallySet, ESTIMATORS};
use crate::transport::run_history;
use crate::workspace::{LocalWorkspace, Workspace};

/// Per-rank slice of a global fission bank of size `bank_size`. Remainder particles are
/// distributed round-robin to the lowest-numbered ranks. Only `num_ranks == 1` is exercised by
/// [`KeffDriver`] (no MPI transport is implemented here), but the partitioning arithmetic is kept
/// as a free function so it is independently testable against its own rule.
pub fn partition(bank_size: u64, rank: u32, num_ranks: u32) -> (u64, u64) {
    let base = bank_size / num_ranks as u64;
    let remainder = bank_size % num_ranks as u64;
    let len = base + if (rank as u64) < remainder { 1 } else { 0 };
    let stride = (0..rank)
        .map(|r| base + if (r as u64) < remainder { 1 } else { 0 })
        .sum();
    (stride, len)
}

/// Running result of a completed k-eff run: mean ± σ for every canonical estimator.
pub struct RunSummary {
    pub keff_mean: f64,
    pub keff_std: f64,
    pub leakage_mean: f64,
    pub absorption_mean: f64,
    pub batches_run: u32,
}

pub struct KeffDriver<'a> {
    geometry: &'a Geometry,
    medium: &'a Medium,
    settings: &'a Settings,
    tallies: TallyContainer,
    lost: LostParticleCounter,
    workspace: Workspace,
}

impl<'a> KeffDriver<'a> {
    pub fn new(geometry: &'a Geometry, medium: &'a Medium, settings: &'a Settings) -> Self {
        Self {
            geometry,
            medium,
            settings,
            tallies: TallyContainer::new(),
            lost: LostParticleCounter::new(),
            workspace: Workspace::new(),
        }
    }

    pub fn lost_particles(&self) -> u64 {
        self.lost.total()
    }

    /// Runs the full batch loop (inactive then active), returning the final running statistics.
    /// `on_batch`, if given, is called after every batch with `(batch_index, k_estimate, elapsed)`
    /// so a driver binary can print progress.
    pub fn run(
        &mut self,
        source: &dyn SourceSampler,
        mut on_batch: Option<&mut dyn FnMut(u32, f64, Duration)>,
    ) -> Result<RunSummary, RuntimeError> {
        let base_rng = Stream::from_seed(self.settings.seed);
        let mut bank = self.sample_initial_bank(&base_rng, source);
        let mut k_estimate = 1.0;
        let mut batches_run = 0;

        for batch_idx in 0..self.settings.criticality.batches {
            let started = Instant::now();
            let active = batch_idx >= self.settings.criticality.inactive;
            let initial_weight: f64 = bank.iter().map(|e| e.particle.weight).sum();

            let (daughters, batch_totals) = self.run_batch(&bank, &base_rng);

            if active {
                // `batch_totals` holds raw weight sums over this batch's histories; normalise by
                // the batch's starting population so the running stats track per-particle rates
                // rather than totals that scale with the bank size.
                let population = batch_totals.value(Estimator::Population).max(1e-300);
                let mut normalized = TallySet::default();
                for estimator in ESTIMATORS {
                    normalized.acc(estimator, batch_totals.value(estimator) / population);
                }
                self.tallies.accumulate_batch(std::slice::from_ref(&normalized));
                batches_run += 1;
            }

            let collision_total = batch_totals.value(Estimator::KeffCollision);
            if initial_weight > 0.0 {
                k_estimate = collision_total / initial_weight;
            }

            if let Some(cb) = on_batch.as_deref_mut() {
                cb(batch_idx, k_estimate, started.elapsed());
            }

            bank = self.rebuild_bank(daughters, k_estimate);
            self.lost.check_cap(self.settings.max_lost_particles)?;
        }

        Ok(RunSummary {
            keff_mean: self.tallies.mean(Estimator::KeffCollision),
            keff_std: self.tallies.std_dev(Estimator::KeffCollision),
            leakage_mean: self.tallies.mean(Estimator::Leakage),
            absorption_mean: self.tallies.mean(Estimator::Absorption),
            batches_run,
        })
    }

    fn sample_initial_bank(&self, base_rng: &Stream, source: &dyn SourceSampler) -> FissionBank {
        let mut bank = FissionBank::new();
        for i in 0..self.settings.criticality.particles {
            let mut rng = base_rng.jumped(i * self.settings.max_source_samples);
            let particle = source.sample(&mut rng);
            let cell_hint = self
                .geometry
                .locate(particle.position)
                .map(|l| l.cell)
                .unwrap_or(0);
            bank.push(BankedParticle {
                cell_hint,
                particle,
            });
        }
        bank
    }

    /// Executes one batch's histories under the configured concurrency policy. Returns the
    /// daughters banked during the batch (not yet normalised) and the merged per-estimator totals
    /// across every worker.
    fn run_batch(&mut self, bank: &FissionBank, base_rng: &Stream) -> (FissionBank, TallySet) {
        let n = bank.len() as u64;
        let max_rng = self.settings.max_rng_per_history;

        match self.settings.multithread {
            ConcurrencyPolicy::Single => {
                let mut local_tally = self.tallies.acquire();
                let mut local_bank = FissionBank::new();
                let mut stack = SmallVec::new();
                let mut last_locator: Option<Locator> = None;
                for i in 0..n {
                    self.run_one(
                        bank,
                        i,
                        base_rng,
                        max_rng,
                        &mut local_tally,
                        &mut local_bank,
                        &mut stack,
                        &mut last_locator,
                    );
                }
                self.tallies.release(local_tally.clone());
                (local_bank, local_tally)
            }
            ConcurrencyPolicy::Tasks | ConcurrencyPolicy::Threadpool => {
                // Work-stealing fork-join: `Tasks` additionally hints at a static chunk size,
                // approximating a coarser task-parallel range split.
                let this: &Self = &*self;
                let indices: Vec<u64> = (0..n).collect();
                let par_iter = indices.into_par_iter();
                let run = move |&i: &u64| {
                    let cell = this.workspace.get_local();
                    let mut local = cell.borrow_mut();
                    if local.tallies.is_none() {
                        local.tallies = Some(this.tallies.acquire());
                    }
                    let LocalWorkspace {
                        eval_stack,
                        tallies,
                        output_bank,
                        last_locator,
                        ..
                    } = &mut *local;
                    let tally = tallies.as_mut().expect("just inserted");
                    this.run_one(bank, i, base_rng, max_rng, tally, output_bank, eval_stack, last_locator);
                };
                if this.settings.multithread == ConcurrencyPolicy::Tasks {
                    par_iter.with_min_len(64).for_each(run);
                } else {
                    par_iter.for_each(run);
                }

                let drained = self.workspace.take_all();
                let merged_tally = drained
                    .iter()
                    .map(|(t, _)| *t)
                    .fold(TallySet::default(), |acc, t| acc.join(&t));
                let merged_bank = FissionBank::concat(drained.into_iter().map(|(_, b)| b).collect());
                (merged_bank, merged_tally)
            }
        }
    }

    fn run_one(
        &self,
        bank: &FissionBank,
        i: u64,
        base_rng: &Stream,
        max_rng: u64,
        tally: &mut TallySet,
        output_bank: &mut FissionBank,
        eval_stack: &mut SmallVec<[bool; 16]>,
        last_locator: &mut Option<Locator>,
    ) {
        let entry = bank.get(i as usize);
        let mut rng = base_rng.jumped(i * max_rng);
        let locator = last_locator
            .as_ref()
            .and_then(|cached| self.geometry.locate_near(entry.particle.position, cached))
            .or_else(|| self.geometry.locate(entry.particle.position))
            .unwrap_or_else(|| {
                self.geometry
                    .locate([0.0, 0.0, 0.0])
                    .expect("root universe must contain the origin")
            });
        *last_locator = Some(locator.clone());
        let cp = CellParticle {
            particle: entry.particle,
            cell: locator.cell,
            locator,
        };
        run_history(
            self.geometry,
            self.medium,
            cp,
            &mut rng,
            &self.lost,
            tally,
            output_bank,
            eval_stack,
        );
    }

    /// Normalises banked daughters around the current k-eff estimate so the bank's total weight
    /// tracks k_eff instead of drifting with it batch over batch: `a = w / k̂`, split into
    /// `max(1, floor(a))` copies of weight `a / split`.
    fn rebuild_bank(&self, daughters: FissionBank, k_estimate: f64) -> FissionBank {
        let mut rebuilt = FissionBank::new();
        for entry in daughters.iter() {
            let a = entry.particle.weight / k_estimate.max(1e-12);
            let split = (a.floor() as u32).max(1);
            let w = a / split as f64;
            for _ in 0..split {
                rebuilt.push(BankedParticle {
                    cell_hint: entry.cell_hint,
                    particle: Particle::new(
                        entry.particle.position,
                        entry.particle.direction,
                        entry.particle.energy,
                        w,
                    ),
                });
            }
        }
        rebuilt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_distributes_remainder_round_robin() {
        // 10 particles, 3 ranks: lens 4,3,3; strides 0,4,7.
        assert_eq!(partition(10, 0, 3), (0, 4));
        assert_eq!(partition(10, 1, 3), (4, 3));
        assert_eq!(partition(10, 2, 3), (7, 3));
    }

    #[test]
    fn partition_single_rank_covers_whole_bank() {
        assert_eq!(partition(57, 0, 1), (0, 57));
    }
}
