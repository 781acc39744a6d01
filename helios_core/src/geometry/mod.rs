//! Constructive solid geometry: surfaces, cells, universes, lattices.

pub mod aabb;
pub mod catalogue;
pub mod cell;
pub mod lattice;
pub mod surface;
pub mod universe;

pub use aabb::AxisAlignedBoundingBox3d;
pub use catalogue::{Geometry, Locator};
pub use cell::{Cell, Fill, Token};
pub use lattice::{Lattice, LatticeKind};
pub use surface::{Boundary, Surface, SurfaceKind};
pub use universe::Universe;
