//! Cross-section tables and the reaction sampler.

pub mod isotope;
pub mod medium;
pub mod sampler;

pub use isotope::{FissionDaughter, Isotope, ReactionKind, ReactionOutcome};
pub use medium::{Composition, Material, Medium};
pub use sampler::{FactorSampler, Sampler};
