//! Material catalogue: mixtures of isotopes exposing Σ_t, mean free path, and isotope selection.
//! Grounded on the reference implementation's `Medium` container: a user-id-keyed lookup over an
//! arena of internally indexed materials.

use fxhash::FxHashMap;

use super::isotope::Isotope;
use super::sampler::Sampler;
use crate::error::MaterialError;
use crate::numeric_types::{Index, Real};
use crate::rng::Stream;

/// One isotope reference inside a material's mixture, with its atom density (atom/b-cm).
#[derive(Clone, Copy, Debug)]
pub struct Composition {
    pub isotope: Index,
    pub atom_density: Real,
}

/// A mixture of isotopes at a given density, with a precomputed isotope-selection sampler.
///
/// Built assuming every referenced isotope shares one energy grid (a unionized grid is the
/// reference implementation's convention too); a multi-grid union is not implemented.
pub struct Material {
    pub user_id: i64,
    pub index: Index,
    pub density: Real,
    compositions: Vec<Composition>,
    shared_grid: Vec<Real>,
    isotope_sampler: Sampler<Index>,
}

impl Material {
    pub fn new(
        user_id: i64,
        index: Index,
        density: Real,
        compositions: Vec<Composition>,
        isotopes: &[Isotope],
    ) -> Self {
        let shared_grid = isotopes[compositions[0].isotope as usize]
            .energy_grid()
            .to_vec();
        let outcomes: Vec<Index> = compositions.iter().map(|c| c.isotope).collect();
        let stride = compositions.len().saturating_sub(1);
        let mut matrix = Vec::with_capacity(shared_grid.len() * stride);
        for &e in &shared_grid {
            let weights: Vec<Real> = compositions
                .iter()
                .map(|c| c.atom_density * isotopes[c.isotope as usize].total_xs(e))
                .collect();
            let total: Real = weights.iter().sum();
            let mut cumulative = 0.0;
            for w in weights.iter().take(stride) {
                cumulative += w;
                matrix.push(if total > 0.0 { cumulative / total } else { 1.0 });
            }
        }
        let isotope_sampler = Sampler::new(outcomes, matrix, shared_grid.len());
        Self {
            user_id,
            index,
            density,
            compositions,
            shared_grid,
            isotope_sampler,
        }
    }

    fn row_index(&self, energy: Real) -> usize {
        let grid = &self.shared_grid;
        if energy <= grid[0] {
            return 0;
        }
        let last = grid.len() - 1;
        if energy >= grid[last] {
            return last;
        }
        grid.partition_point(|&g| g <= energy).saturating_sub(1)
    }

    /// Total macroscopic cross section Σ_t(E) of the mixture.
    pub fn total_macroscopic_xs(&self, isotopes: &[Isotope], energy: Real) -> Real {
        self.compositions
            .iter()
            .map(|c| c.atom_density * isotopes[c.isotope as usize].total_xs(energy))
            .sum()
    }

    /// Macroscopic νΣ_f(E): contribution of every fissionable isotope in the mixture, weighted by
    /// its mean fission yield.
    pub fn nu_fission_xs(&self, isotopes: &[Isotope], energy: Real) -> Real {
        self.compositions
            .iter()
            .map(|c| {
                let iso = &isotopes[c.isotope as usize];
                c.atom_density * iso.nubar(energy) * iso.fission_xs(energy)
            })
            .sum()
    }

    pub fn is_fissile(&self, isotopes: &[Isotope]) -> bool {
        self.compositions
            .iter()
            .any(|c| isotopes[c.isotope as usize].is_fissionable())
    }

    /// Mean free path `1 / Σ_t(E)`.
    pub fn mean_free_path(&self, isotopes: &[Isotope], energy: Real) -> Real {
        let total = self.total_macroscopic_xs(isotopes, energy);
        if total > 0.0 {
            1.0 / total
        } else {
            Real::INFINITY
        }
    }

    /// Samples which isotope a collision occurs with, weighted by atomic-fraction × σ_t(E).
    pub fn sample_isotope(&self, energy: Real, rng: &mut Stream) -> Index {
        let row = self.row_index(energy);
        self.isotope_sampler.sample(row, rng.uniform())
    }
}

/// Owning catalogue of materials and isotopes, keyed by stable user id.
pub struct Medium {
    pub isotopes: Vec<Isotope>,
    pub materials: Vec<Material>,
    material_map: FxHashMap<i64, Index>,
}

impl Medium {
    pub fn new(isotopes: Vec<Isotope>, materials: Vec<Material>) -> Self {
        let material_map = materials.iter().map(|m| (m.user_id, m.index)).collect();
        Self {
            isotopes,
            materials,
            material_map,
        }
    }

    /// Resolves a user-facing material id to its internal arena index.
    pub fn lookup(&self, user_id: i64) -> Result<Index, MaterialError> {
        self.material_map
            .get(&user_id)
            .copied()
            .ok_or_else(|| MaterialError::Unknown(user_id, "no such material".to_string()))
    }

    pub fn material(&self, index: Index) -> &Material {
        &self.materials[index as usize]
    }

    pub fn isotope(&self, index: Index) -> &Isotope {
        &self.isotopes[index as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::isotope::ReactionKind;

    fn fuel_isotope() -> Isotope {
        Isotope::new(
            "fuel".to_string(),
            235.0,
            vec![1e-5, 1.0, 2e7],
            vec![ReactionKind::Elastic, ReactionKind::Capture, ReactionKind::Fission],
            vec![vec![1.0; 3], vec![0.5; 3], vec![0.2; 3]],
            vec![2.5; 3],
            vec![0.0, 1.0],
            vec![0.0, 1.0],
        )
    }

    fn moderator_isotope() -> Isotope {
        Isotope::new(
            "moderator".to_string(),
            1.0,
            vec![1e-5, 1.0, 2e7],
            vec![ReactionKind::Elastic],
            vec![vec![2.0; 3]],
            vec![],
            vec![],
            vec![],
        )
    }

    #[test]
    fn single_isotope_sampler_always_returns_it() {
        let isotopes = vec![fuel_isotope()];
        let material = Material::new(
            1,
            0,
            1.0,
            vec![Composition {
                isotope: 0,
                atom_density: 1.0,
            }],
            &isotopes,
        );
        let mut rng = Stream::from_seed(5);
        for _ in 0..20 {
            assert_eq!(material.sample_isotope(0.5, &mut rng), 0);
        }
    }

    #[test]
    fn macro_xs_sums_weighted_microscopic_xs() {
        let isotopes = vec![fuel_isotope(), moderator_isotope()];
        let material = Material::new(
            1,
            0,
            1.0,
            vec![
                Composition {
                    isotope: 0,
                    atom_density: 1.0,
                },
                Composition {
                    isotope: 1,
                    atom_density: 2.0,
                },
            ],
            &isotopes,
        );
        // fuel total xs = 1.0+0.5+0.2 = 1.7, moderator = 2.0
        let expected = 1.0 * 1.7 + 2.0 * 2.0;
        assert!((material.total_macroscopic_xs(&isotopes, 0.5) - expected).abs() < 1e-9);
    }

    #[test]
    fn unknown_material_lookup_errors() {
        let medium = Medium::new(vec![], vec![]);
        assert!(medium.lookup(42).is_err());
    }
}
