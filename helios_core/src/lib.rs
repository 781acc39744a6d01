//! Monte Carlo neutron transport engine: CSG geometry, cross-section sampling, history transport
//! and the k-eff power-iteration driver.
//!
//! Module layout mirrors the component breakdown this crate is organised around: surface algebra
//! and the cell/universe/lattice tree ([`geometry`]), the reaction sampler and material catalogue
//! ([`material`]), the per-particle random walk ([`transport`]), and the batch/cycle driver
//! ([`driver`]). [`rng`] and [`tally`] are the substrate both [`transport`] and [`driver`] build on.

pub mod driver;
pub mod error;
pub mod geometry;
pub mod material;
pub mod numeric_types;
pub mod particle;
pub mod rng;
pub mod tally;
pub mod transport;
pub mod workspace;

pub use error::{GeometryError, MaterialError, RuntimeError, SetupError};
pub use numeric_types::{Index, Real};
pub use particle::{BankedParticle, CellParticle, FissionBank, Particle, ParticleState};
