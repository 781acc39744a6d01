//! Minimal built-in source samplers. The full distribution catalogue (box/cylinder/custom/ACE-backed
//! sampling) is parser-fed external configuration and out of scope here; this is the one concrete
//! sampler needed to drive the k-eff driver and its tests.

use crate::numeric_types::Real;
use crate::particle::Particle;
use crate::rng::Stream;

/// Anything that can produce an initial particle given a random stream.
pub trait SourceSampler: Sync {
    fn sample(&self, rng: &mut Stream) -> Particle;
}

/// A point source emitting unit-weight particles isotropically at unit starting energy.
pub struct PointIsotropicSource {
    pub position: [Real; 3],
    pub energy: Real,
}

impl SourceSampler for PointIsotropicSource {
    fn sample(&self, rng: &mut Stream) -> Particle {
        let direction = crate::material::isotope::isotropic_direction(rng);
        Particle::new(self.position, direction, self.energy, 1.0)
    }
}
