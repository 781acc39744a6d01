//! Scalar and index type aliases used throughout the crate.

/// Floating point type used for all physical quantities (position, energy, cross sections, weights).
pub type Real = f64;

/// Index type used for internal catalogue references (surfaces, cells, universes, isotopes, materials).
///
/// Kept as a dedicated alias rather than bare `usize` so that catalogue indices read as a distinct
/// concept from array lengths at call sites.
pub type Index = u32;

/// Sentinel used where an index is conceptually optional but stored unboxed (e.g. "no fill").
pub const NONE_INDEX: Index = Index::MAX;
