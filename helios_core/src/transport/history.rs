//! Single-particle random walk: the collision/surface race, reaction sampling and tallying for one
//! particle from birth to absorption, leak or fission.

use smallvec::SmallVec;

use crate::error::LostParticleCounter;
use crate::geometry::{surface::reflect, Boundary, Geometry};
use crate::material::{Medium, ReactionOutcome};
use crate::numeric_types::{Index, Real};
use crate::particle::{BankedParticle, CellParticle, FissionBank, Particle, ParticleState};
use crate::rng::Stream;
use crate::tally::{Estimator, TallySet};

/// Runs one particle to completion (dead, leaked, or banked-away via fission), accumulating into
/// `tallies` and `output_bank`.
pub fn run_history(
    geometry: &Geometry,
    medium: &Medium,
    mut cp: CellParticle,
    rng: &mut Stream,
    lost_counter: &LostParticleCounter,
    tallies: &mut TallySet,
    output_bank: &mut FissionBank,
    eval_stack: &mut SmallVec<[bool; 16]>,
) {
    tallies.acc(Estimator::Population, cp.particle.weight);

    loop {
        let cell = &geometry.cells[cp.cell as usize];
        if cell.dead {
            tallies.acc(Estimator::Leakage, cp.particle.weight);
            cp.particle.state = ParticleState::Leaked;
            return;
        }

        let material = match cell.fill {
            crate::geometry::Fill::Material(m) => Some(m),
            _ => None,
        };

        let Some(material_idx) = material else {
            if !void_step(geometry, &mut cp, lost_counter, eval_stack) {
                tallies.acc(Estimator::Leakage, cp.particle.weight);
                return;
            }
            continue;
        };
        let mat = medium.material(material_idx);
        let energy = cp.particle.energy;
        let weight = cp.particle.weight;

        let translation = cp.locator.innermost_translation();
        let boundary =
            geometry.distance_to_boundary(cp.cell, cp.particle.position, cp.particle.direction, translation);
        let total_xs = mat.total_macroscopic_xs(&medium.isotopes, energy);
        if total_xs <= 0.0 {
            lost_counter.record_non_positive_total_xs();
            tallies.acc(Estimator::Leakage, weight);
            return;
        }
        let u = rng.uniform();
        let d_coll = -u.ln() / total_xs;

        let d_surf = boundary.map(|(d, _, _)| d);
        let fissile = mat.is_fissile(&medium.isotopes);
        let nu_fission = if fissile {
            mat.nu_fission_xs(&medium.isotopes, energy)
        } else {
            0.0
        };

        match d_surf {
            Some(d_surf) if d_coll >= d_surf => {
                advance(&mut cp, d_surf);
                if fissile {
                    let contribution = weight * d_surf * nu_fission;
                    tallies.acc(Estimator::KeffTrackLength, contribution);
                }
                let (_, surf, new_sense) =
                    boundary.expect("d_surf came from this same boundary lookup");
                if !cross_surface(geometry, &mut cp, surf, new_sense, lost_counter, eval_stack) {
                    tallies.acc(Estimator::Leakage, cp.particle.weight);
                    return;
                }
            }
            _ => {
                advance(&mut cp, d_coll);
                if fissile {
                    let contribution = weight * d_coll * nu_fission;
                    tallies.acc(Estimator::KeffTrackLength, contribution);
                }
                let iso_idx = mat.sample_isotope(energy, rng);
                let isotope = medium.isotope(iso_idx);
                if fissile {
                    tallies.acc(Estimator::KeffCollision, weight * isotope.nubar(energy));
                }

                let outcome = isotope.apply_reaction(energy, cp.particle.direction, weight, rng);
                match outcome {
                    ReactionOutcome::Scattered { direction, energy } => {
                        cp.particle.direction = direction;
                        cp.particle.energy = energy;
                    }
                    ReactionOutcome::Absorbed => {
                        tallies.acc(Estimator::Absorption, weight);
                        tallies.acc(Estimator::KeffAbsorption, weight);
                        cp.particle.state = ParticleState::Dead;
                        return;
                    }
                    ReactionOutcome::Fission { daughters } => {
                        tallies.acc(Estimator::Absorption, weight);
                        tallies.acc(Estimator::KeffAbsorption, weight);
                        for daughter in daughters {
                            output_bank.push(BankedParticle {
                                cell_hint: cp.cell,
                                particle: Particle::new(
                                    cp.particle.position,
                                    daughter.direction,
                                    daughter.energy,
                                    daughter.weight,
                                ),
                            });
                        }
                        cp.particle.state = ParticleState::Dead;
                        return;
                    }
                }
            }
        }
    }
}

fn advance(cp: &mut CellParticle, distance: Real) {
    let d = cp.particle.direction;
    cp.particle.position = [
        cp.particle.position[0] + distance * d[0],
        cp.particle.position[1] + distance * d[1],
        cp.particle.position[2] + distance * d[2],
    ];
}

/// Advances a particle through one surface crossing while it sits in a void cell, without
/// consuming a collision-distance draw. Returns `false` if the particle leaked.
fn void_step(
    geometry: &Geometry,
    cp: &mut CellParticle,
    lost_counter: &LostParticleCounter,
    eval_stack: &mut SmallVec<[bool; 16]>,
) -> bool {
    let translation = cp.locator.innermost_translation();
    match geometry.distance_to_boundary(cp.cell, cp.particle.position, cp.particle.direction, translation) {
        Some((d, surf, new_sense)) => {
            advance(cp, d);
            cross_surface(geometry, cp, surf, new_sense, lost_counter, eval_stack)
        }
        None => {
            lost_counter.record_nan_intersection();
            false
        }
    }
}

/// Applies a surface's crossing semantics and, for `transmit`, resolves the neighbour cell
/// starting from the particle's last locator. Returns `false` on leak.
fn cross_surface(
    geometry: &Geometry,
    cp: &mut CellParticle,
    surf: Index,
    _new_sense: bool,
    lost_counter: &LostParticleCounter,
    _eval_stack: &mut SmallVec<[bool; 16]>,
) -> bool {
    match geometry.surfaces[surf as usize].boundary {
        Boundary::Vacuum => false,
        Boundary::Reflect => {
            let normal = geometry.surfaces[surf as usize].normal(cp.particle.position);
            cp.particle.direction = reflect(cp.particle.direction, normal);
            true
        }
        Boundary::Transmit => {
            match geometry.locate_near(cp.particle.position, &cp.locator) {
                Some(locator) => {
                    cp.cell = locator.cell;
                    cp.locator = locator;
                    true
                }
                None => {
                    lost_counter.record_lost_neighbor();
                    false
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LostParticleCounter;
    use crate::geometry::{Boundary as SurfaceBoundary, Cell, Fill, Geometry, Surface, SurfaceKind, Token, Universe};
    use crate::material::{Composition, Isotope, Material, Medium, ReactionKind};
    use crate::tally::TallySet;
    use smallvec::SmallVec;

    fn bare_sphere_geometry() -> Geometry {
        let surfaces = vec![Surface::new(
            1,
            0,
            SurfaceKind::Sphere {
                center: [0.0, 0.0, 0.0],
                radius: 1e6,
            },
            SurfaceBoundary::Vacuum,
        )];
        let inside: SmallVec<[Token; 16]> = SmallVec::from_slice(&[Token::Literal {
            surface: 0,
            sense: false,
        }]);
        let outside: SmallVec<[Token; 16]> = SmallVec::from_slice(&[Token::Literal {
            surface: 0,
            sense: true,
        }]);
        let cells = vec![
            Cell {
                user_id: 1,
                index: 0,
                expr: inside,
                literal_surfaces: SmallVec::from_slice(&[0]),
                fill: Fill::Material(0),
                universe: 0,
                translation: [0.0, 0.0, 0.0],
                dead: false,
            },
            Cell {
                user_id: 2,
                index: 1,
                expr: outside,
                literal_surfaces: SmallVec::from_slice(&[0]),
                fill: Fill::Void,
                universe: 0,
                translation: [0.0, 0.0, 0.0],
                dead: false,
            },
        ];
        let universes = vec![Universe {
            user_id: 0,
            index: 0,
            cells: SmallVec::from_slice(&[0, 1]),
        }];
        Geometry::new(surfaces, cells, universes, Vec::new(), 0)
    }

    fn absorber_medium() -> Medium {
        let isotope = Isotope::new(
            "absorber".to_string(),
            1.0,
            vec![1e-5, 2e7],
            vec![ReactionKind::Capture],
            vec![vec![0.5, 0.5]],
            vec![],
            vec![],
            vec![],
        );
        let material = Material::new(
            1,
            0,
            1.0,
            vec![Composition {
                isotope: 0,
                atom_density: 1.0,
            }],
            std::slice::from_ref(&isotope),
        );
        Medium::new(vec![isotope], vec![material])
    }

    #[test]
    fn history_in_bare_absorber_ends_with_absorption_or_leak() {
        let geometry = bare_sphere_geometry();
        let medium = absorber_medium();
        let mut rng = Stream::from_seed(10).jumped(1);
        let locator = geometry.locate([0.0, 0.0, 0.0]).unwrap();
        let cp = CellParticle {
            particle: Particle::new([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], 1.0, 1.0),
            cell: locator.cell,
            locator,
        };
        let lost = LostParticleCounter::new();
        let mut tallies = TallySet::default();
        let mut bank = FissionBank::new();
        let mut stack = SmallVec::new();
        run_history(
            &geometry, &medium, cp, &mut rng, &lost, &mut tallies, &mut bank, &mut stack,
        );
        assert!((tallies.value(Estimator::Population) - 1.0).abs() < 1e-12);
        let absorbed = tallies.value(Estimator::Absorption);
        let leaked = tallies.value(Estimator::Leakage);
        assert!((absorbed + leaked - 1.0).abs() < 1e-9 || absorbed > 0.0 || leaked > 0.0);
    }
}
