//! Isotope reaction tables and the absorption/fission/scatter decomposition.

use smallvec::SmallVec;

use super::sampler::Sampler;
use crate::numeric_types::Real;
use crate::rng::Stream;

/// A single reaction channel. The set is closed at setup time per isotope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReactionKind {
    Elastic,
    Inelastic(u16),
    Fission,
    NXn(u8),
    Capture,
}

impl ReactionKind {
    fn is_inelastic_class(self) -> bool {
        matches!(self, ReactionKind::Inelastic(_) | ReactionKind::NXn(_))
    }
}

/// A daughter particle emitted by a fission event, not yet pushed to the thread-local bank.
#[derive(Clone, Copy, Debug)]
pub struct FissionDaughter {
    pub direction: [Real; 3],
    pub energy: Real,
    pub weight: Real,
}

/// Outcome of applying a sampled reaction to a particle.
pub enum ReactionOutcome {
    /// Particle survives with a new direction and energy (elastic or inelastic scatter).
    Scattered { direction: [Real; 3], energy: Real },
    /// Analog capture: the particle is killed.
    Absorbed,
    /// Fission: the incident particle is killed and `daughters` are banked.
    Fission { daughters: SmallVec<[FissionDaughter; 4]> },
}

/// A microscopic reaction table for one isotope, indexed on a shared energy grid.
pub struct Isotope {
    pub name: String,
    /// Atomic weight ratio (target mass / neutron mass), used in two-body scattering kinematics.
    pub awr: Real,
    /// Strictly increasing energy grid, shared by every reaction's cross-section row.
    energy_grid: Vec<Real>,
    reactions: Vec<ReactionKind>,
    /// Parallel to `reactions`: microscopic cross section σ_r(E) on `energy_grid`.
    xs: Vec<Vec<Real>>,
    /// ν̄(E) on `energy_grid`; empty if this isotope is not fissionable.
    nubar: Vec<Real>,
    /// Fission spectrum χ as a (energy support, cumulative) pair used as an inverse-CDF table.
    chi_energy: Vec<Real>,
    chi_cdf: Vec<Real>,
    /// Sampler over inelastic-class reactions only, one row per energy grid point (nearest-point,
    /// not interpolated: only the absorb/scatter split itself needs to vary continuously with
    /// energy, not the inelastic channel breakdown).
    inelastic_sampler: Option<Sampler<ReactionKind>>,
}

impl Isotope {
    pub fn new(
        name: String,
        awr: Real,
        energy_grid: Vec<Real>,
        reactions: Vec<ReactionKind>,
        xs: Vec<Vec<Real>>,
        nubar: Vec<Real>,
        chi_energy: Vec<Real>,
        chi_cdf: Vec<Real>,
    ) -> Self {
        debug_assert_eq!(reactions.len(), xs.len());
        for row in &xs {
            debug_assert_eq!(row.len(), energy_grid.len());
        }
        let inelastic_sampler = Self::build_inelastic_sampler(&energy_grid, &reactions, &xs);
        Self {
            name,
            awr,
            energy_grid,
            reactions,
            xs,
            nubar,
            chi_energy,
            chi_cdf,
            inelastic_sampler,
        }
    }

    fn build_inelastic_sampler(
        energy_grid: &[Real],
        reactions: &[ReactionKind],
        xs: &[Vec<Real>],
    ) -> Option<Sampler<ReactionKind>> {
        let channels: Vec<(ReactionKind, &[Real])> = reactions
            .iter()
            .zip(xs.iter())
            .filter(|(kind, _)| kind.is_inelastic_class())
            .map(|(kind, row)| (*kind, row.as_slice()))
            .collect();
        if channels.is_empty() {
            return None;
        }
        let outcomes: Vec<ReactionKind> = channels.iter().map(|(k, _)| *k).collect();
        let mut matrix = Vec::with_capacity(energy_grid.len() * (channels.len() - 1));
        for e in 0..energy_grid.len() {
            let total: Real = channels.iter().map(|(_, row)| row[e]).sum();
            let mut cumulative = 0.0;
            for (_, row) in channels.iter().take(channels.len() - 1) {
                cumulative += row[e];
                matrix.push(if total > 0.0 { cumulative / total } else { 1.0 });
            }
        }
        Some(Sampler::new(outcomes, matrix, energy_grid.len()))
    }

    /// Returns `(lower_index, alpha)` such that `energy` lies between grid points `lower_index`
    /// and `lower_index + 1`, interpolated by `alpha ∈ [0, 1]`. Clamps at the grid ends.
    fn bracket(&self, energy: Real) -> (usize, Real) {
        let grid = &self.energy_grid;
        if energy <= grid[0] {
            return (0, 0.0);
        }
        let last = grid.len() - 1;
        if energy >= grid[last] {
            return (last.saturating_sub(1), 1.0);
        }
        let idx = grid.partition_point(|&g| g <= energy).saturating_sub(1).min(last - 1);
        let span = grid[idx + 1] - grid[idx];
        let alpha = if span > 0.0 { (energy - grid[idx]) / span } else { 0.0 };
        (idx, alpha)
    }

    fn interpolate_row(&self, row: &[Real], energy: Real) -> Real {
        let (idx, alpha) = self.bracket(energy);
        row[idx] + alpha * (row[idx + 1] - row[idx])
    }

    /// Total microscopic cross section at `energy`, summed over every reaction channel.
    pub fn energy_grid(&self) -> &[Real] {
        &self.energy_grid
    }

    pub fn total_xs(&self, energy: Real) -> Real {
        self.xs.iter().map(|row| self.interpolate_row(row, energy)).sum()
    }

    fn class_xs(&self, energy: Real, mut matches: impl FnMut(ReactionKind) -> bool) -> Real {
        self.reactions
            .iter()
            .zip(self.xs.iter())
            .filter(|(kind, _)| matches(**kind))
            .map(|(_, row)| self.interpolate_row(row, energy))
            .sum()
    }

    /// Unconditional `P_absorb(E)`: fraction of interactions that are capture or fission.
    pub fn absorption_prob(&self, energy: Real) -> Real {
        let absorb = self.class_xs(energy, |k| matches!(k, ReactionKind::Capture | ReactionKind::Fission));
        let total = self.total_xs(energy);
        if total > 0.0 { absorb / total } else { 0.0 }
    }

    /// Unconditional `P_fission(E)`.
    pub fn fission_prob(&self, energy: Real) -> Real {
        let fission = self.class_xs(energy, |k| matches!(k, ReactionKind::Fission));
        let total = self.total_xs(energy);
        if total > 0.0 { fission / total } else { 0.0 }
    }

    /// Unconditional `P_elastic(E)`.
    pub fn elastic_prob(&self, energy: Real) -> Real {
        let elastic = self.class_xs(energy, |k| matches!(k, ReactionKind::Elastic));
        let total = self.total_xs(energy);
        if total > 0.0 { elastic / total } else { 0.0 }
    }

    /// Microscopic fission cross section σ_f(E).
    pub fn fission_xs(&self, energy: Real) -> Real {
        self.class_xs(energy, |k| matches!(k, ReactionKind::Fission))
    }

    pub fn is_fissionable(&self) -> bool {
        !self.nubar.is_empty()
    }

    /// Mean fission neutron yield ν̄(E); `0` if not fissionable.
    pub fn nubar(&self, energy: Real) -> Real {
        if self.nubar.is_empty() {
            return 0.0;
        }
        self.interpolate_row(&self.nubar, energy)
    }

    /// Samples the integer fission multiplicity `ν = floor(ν̄) + [u < frac(ν̄)]`.
    fn sample_multiplicity(&self, energy: Real, rng: &mut Stream) -> u32 {
        let nubar = self.nubar(energy);
        let floor = nubar.floor();
        let frac = nubar - floor;
        let bump = if rng.uniform() < frac { 1.0 } else { 0.0 };
        (floor + bump) as u32
    }

    /// Samples a fission emission energy from the χ spectrum inverse-CDF table.
    fn sample_fission_energy(&self, rng: &mut Stream) -> Real {
        if self.chi_cdf.is_empty() {
            return 2.0; // MeV-scale fallback if no spectrum is supplied.
        }
        let u = rng.uniform();
        let idx = self.chi_cdf.partition_point(|&c| c < u).min(self.chi_cdf.len() - 1);
        self.chi_energy[idx]
    }

    /// Two-body elastic scattering kinematics: isotropic in the centre-of-mass frame, rotated to
    /// the lab frame using this isotope's AWR. Below `energy_freegas_threshold` callers should
    /// instead use a free-gas thermal treatment (not modelled here; analog target-at-rest is used
    /// unconditionally).
    fn elastic_scatter(&self, energy: Real, dir: [Real; 3], rng: &mut Stream) -> (Real, [Real; 3]) {
        let mu_cm = 2.0 * rng.uniform() - 1.0;
        let a = self.awr;
        let denom = (a * a + 2.0 * a * mu_cm + 1.0).max(1e-300);
        let new_energy = energy * denom / ((a + 1.0) * (a + 1.0));
        let mu_lab = (1.0 + a * mu_cm) / denom.sqrt();
        (new_energy, rotate_about(dir, mu_lab, rng))
    }

    /// Inelastic scattering fallback: isotropic in the lab frame, energy reduced by a fixed
    /// fraction. A coarse stand-in for level-dependent secondary-energy laws.
    fn inelastic_scatter(&self, energy: Real, rng: &mut Stream) -> (Real, [Real; 3]) {
        let mu = 2.0 * rng.uniform() - 1.0;
        let new_energy = energy * 0.9;
        (new_energy, rotate_about([1.0, 0.0, 0.0], mu, rng))
    }

    /// Applies the absorption / fission / elastic / inelastic decision tree to one collision, given
    /// the incident `energy`, `direction` and particle `weight`. Fission daughters are emitted at
    /// the parent's unnormalized weight; the k-eff adjustment that keeps the fission bank's total
    /// weight stable is applied once, later, when the bank is rebuilt between batches.
    pub fn apply_reaction(
        &self,
        energy: Real,
        direction: [Real; 3],
        weight: Real,
        rng: &mut Stream,
    ) -> ReactionOutcome {
        let u = rng.uniform();
        let p_absorb = self.absorption_prob(energy);
        if u < p_absorb {
            let p_fission = self.fission_prob(energy);
            if self.is_fissionable() && u > p_absorb - p_fission {
                let nu = self.sample_multiplicity(energy, rng);
                let mut daughters = SmallVec::new();
                for _ in 0..nu {
                    let dir = isotropic_direction(rng);
                    let energy = self.sample_fission_energy(rng);
                    daughters.push(FissionDaughter {
                        direction: dir,
                        energy,
                        weight,
                    });
                }
                return ReactionOutcome::Fission { daughters };
            }
            return ReactionOutcome::Absorbed;
        }

        let p_elastic = self.elastic_prob(energy);
        if u - p_absorb < p_elastic {
            let (new_energy, new_dir) = self.elastic_scatter(energy, direction, rng);
            ReactionOutcome::Scattered {
                direction: new_dir,
                energy: new_energy,
            }
        } else if let Some(sampler) = &self.inelastic_sampler {
            let (idx, _) = self.bracket(energy);
            let _reaction = sampler.sample(idx, rng.uniform());
            let (new_energy, new_dir) = self.inelastic_scatter(energy, rng);
            ReactionOutcome::Scattered {
                direction: new_dir,
                energy: new_energy,
            }
        } else {
            let (new_energy, new_dir) = self.inelastic_scatter(energy, rng);
            ReactionOutcome::Scattered {
                direction: new_dir,
                energy: new_energy,
            }
        }
    }
}

/// Samples a direction uniform on the unit sphere.
pub fn isotropic_direction(rng: &mut Stream) -> [Real; 3] {
    let mu = 2.0 * rng.uniform() - 1.0;
    rotate_about([0.0, 0.0, 1.0], mu, rng)
}

/// Rotates `axis` by polar cosine `mu` and a uniform azimuthal angle, returning a unit vector.
///
/// Used both for plain isotropic sampling (axis = arbitrary pole) and for CoM-to-lab scattering
/// rotations (axis = incident direction, mu = lab cosine).
fn rotate_about(axis: [Real; 3], mu: Real, rng: &mut Stream) -> [Real; 3] {
    let sin_theta = (1.0 - mu * mu).max(0.0).sqrt();
    let phi = 2.0 * std::f64::consts::PI * rng.uniform();
    let (sin_phi, cos_phi) = phi.sin_cos();

    // Build an orthonormal basis (u, v, axis).
    let arbitrary = if axis[0].abs() < 0.9 { [1.0, 0.0, 0.0] } else { [0.0, 1.0, 0.0] };
    let u = normalize(cross(arbitrary, axis));
    let v = cross(axis, u);

    [
        sin_theta * cos_phi * u[0] + sin_theta * sin_phi * v[0] + mu * axis[0],
        sin_theta * cos_phi * u[1] + sin_theta * sin_phi * v[1] + mu * axis[1],
        sin_theta * cos_phi * u[2] + sin_theta * sin_phi * v[2] + mu * axis[2],
    ]
}

fn cross(a: [Real; 3], b: [Real; 3]) -> [Real; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalize(v: [Real; 3]) -> [Real; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len == 0.0 {
        [0.0, 0.0, 1.0]
    } else {
        [v[0] / len, v[1] / len, v[2] / len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u235_like() -> Isotope {
        let grid = vec![1e-5, 1.0, 2e7];
        Isotope::new(
            "U235".to_string(),
            233.0,
            grid.clone(),
            vec![
                ReactionKind::Elastic,
                ReactionKind::Capture,
                ReactionKind::Fission,
            ],
            vec![
                vec![5.0, 5.0, 5.0],
                vec![2.0, 1.0, 0.5],
                vec![3.0, 2.0, 1.5],
            ],
            vec![2.5, 2.5, 2.5],
            vec![0.0, 1.0, 5.0, 10.0],
            vec![0.0, 0.4, 0.9, 1.0],
        )
    }

    #[test]
    fn probabilities_sum_to_at_most_one() {
        let iso = u235_like();
        for &e in &[1e-5, 0.5, 1.0, 1e6] {
            let total = iso.absorption_prob(e) + iso.elastic_prob(e);
            assert!(total <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn nubar_interpolates_linearly() {
        let iso = u235_like();
        assert!((iso.nubar(1.0) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn fission_multiplicity_is_nonnegative_and_near_nubar_on_average() {
        let iso = u235_like();
        let mut rng = Stream::from_seed(1);
        let mut total = 0u64;
        let trials = 20_000;
        for _ in 0..trials {
            total += iso.sample_multiplicity(1.0, &mut rng) as u64;
        }
        let mean = total as f64 / trials as f64;
        assert!((mean - 2.5).abs() < 0.05, "mean = {mean}");
    }

    #[test]
    fn rotate_about_preserves_unit_length() {
        let mut rng = Stream::from_seed(3);
        for _ in 0..100 {
            let d = rotate_about([0.0, 0.0, 1.0], 0.3, &mut rng);
            let len = (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn apply_reaction_never_panics_across_energy_range() {
        let iso = u235_like();
        let mut rng = Stream::from_seed(11);
        for _ in 0..1000 {
            let e = rng.uniform() * 2e7;
            let _ = iso.apply_reaction(e.max(1e-5), [1.0, 0.0, 0.0], 1.0, &mut rng);
        }
    }
}
