//! Geometry catalogue: the owning arena for surfaces, cells, universes and lattices, plus the
//! recursive point-in-cell locator and neighbour resolution.
//!
//! Everything here is built once at setup and shared immutably by every worker thread.

use smallvec::SmallVec;

use super::cell::{Cell, Fill};
use super::lattice::Lattice;
use super::surface::Surface;
use super::universe::Universe;
use crate::error::GeometryError;
use crate::numeric_types::{Index, Real, NONE_INDEX};

/// A path of (universe, accumulated-translation) frames from the root down to the universe that
/// directly owns the located cell, used both as the locate result and as a reusable "last found
/// cell" cache that a subsequent nearby locate can retry before falling back to a full search.
#[derive(Clone, Debug)]
pub struct Locator {
    pub cell: Index,
    frames: SmallVec<[(Index, [Real; 3]); 6]>,
}

impl Locator {
    /// Innermost universe this locate result resolved through.
    pub fn innermost_universe(&self) -> Index {
        self.frames.last().map(|(u, _)| *u).unwrap_or(0)
    }

    /// Accumulated translation from the root frame down to the innermost universe: the offset a
    /// global point must be shifted by before it can be tested against that universe's own
    /// surfaces: nested `fill universe`/lattice transformations compose additively.
    pub fn innermost_translation(&self) -> [Real; 3] {
        self.frames.last().map(|(_, t)| *t).unwrap_or([0.0, 0.0, 0.0])
    }
}

/// Owning arena for a complete geometry: surfaces, cells, universes, lattices.
pub struct Geometry {
    pub surfaces: Vec<Surface>,
    pub cells: Vec<Cell>,
    pub universes: Vec<Universe>,
    pub lattices: Vec<Lattice>,
    pub root_universe: Index,
}

impl Geometry {
    pub fn new(
        surfaces: Vec<Surface>,
        cells: Vec<Cell>,
        universes: Vec<Universe>,
        lattices: Vec<Lattice>,
        root_universe: Index,
    ) -> Self {
        Self {
            surfaces,
            cells,
            universes,
            lattices,
            root_universe,
        }
    }

    /// Validates that the universe → cell → universe graph is acyclic, so that locating a point
    /// always terminates instead of recursing forever through a fill cycle.
    pub fn validate_acyclic(&self) -> Result<(), GeometryError> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }
        let mut marks = vec![Mark::Unvisited; self.universes.len()];

        fn visit(
            geometry: &Geometry,
            universe: Index,
            marks: &mut [Mark],
        ) -> Result<(), GeometryError> {
            match marks[universe as usize] {
                Mark::Done => return Ok(()),
                Mark::InProgress => {
                    return Err(GeometryError::CyclicUniverse(
                        geometry.universes[universe as usize].user_id,
                    ))
                }
                Mark::Unvisited => {}
            }
            marks[universe as usize] = Mark::InProgress;
            for &cell_idx in &geometry.universes[universe as usize].cells {
                match geometry.cells[cell_idx as usize].fill {
                    Fill::Universe(child) => visit(geometry, child, marks)?,
                    Fill::Lattice(lat_idx) => {
                        for &child in &geometry.lattices[lat_idx as usize].universes {
                            if child != NONE_INDEX {
                                visit(geometry, child, marks)?;
                            }
                        }
                    }
                    Fill::Material(_) | Fill::Void => {}
                }
            }
            marks[universe as usize] = Mark::Done;
            Ok(())
        }

        for universe in 0..self.universes.len() as Index {
            visit(self, universe, &mut marks)?;
        }
        Ok(())
    }

    /// Recursive point-in-cell search starting from the root universe.
    pub fn locate(&self, point: [Real; 3]) -> Option<Locator> {
        let mut frames = SmallVec::new();
        self.locate_from(self.root_universe, point, point, &mut frames)
    }

    /// Retries a cached locator first (innermost universe outward, per the "step outward to the
    /// parent universe and repeat" neighbour-resolution rule), falling back to a full locate from
    /// the root on a complete miss.
    pub fn locate_near(&self, point: [Real; 3], cached: &Locator) -> Option<Locator> {
        for depth in (0..cached.frames.len()).rev() {
            let (universe, translation) = cached.frames[depth];
            let local_point = sub(point, translation);
            let mut frames: SmallVec<[(Index, [Real; 3]); 6]> =
                cached.frames[..depth].iter().copied().collect();
            if let Some(result) = self.locate_from(universe, local_point, point, &mut frames) {
                return Some(result);
            }
        }
        self.locate(point)
    }

    /// Descends from `universe` given `local_point` (the point already expressed in that
    /// universe's local frame); `global_point` is threaded through unchanged and only used to keep
    /// `frames` consistent. Recurses through `universe(u)` and `lattice(L)` fills.
    fn locate_from(
        &self,
        universe: Index,
        local_point: [Real; 3],
        global_point: [Real; 3],
        frames: &mut SmallVec<[(Index, [Real; 3]); 6]>,
    ) -> Option<Locator> {
        let translation_accum = sub(global_point, local_point);
        frames.push((universe, translation_accum));

        let mut stack = SmallVec::new();
        let cell_idx = self.universes[universe as usize].locate(
            local_point,
            &self.cells,
            &self.surfaces,
            &mut stack,
        )?;
        let cell = &self.cells[cell_idx as usize];

        match cell.fill {
            Fill::Material(_) | Fill::Void => Some(Locator {
                cell: cell_idx,
                frames: frames.clone(),
            }),
            Fill::Universe(child_universe) => {
                let child_local = cell.to_local(local_point);
                self.locate_from(child_universe, child_local, global_point, frames)
            }
            Fill::Lattice(lattice_idx) => {
                let cell_local = cell.to_local(local_point);
                let hit = self.lattices[lattice_idx as usize].locate(cell_local)?;
                self.locate_from(hit.universe, hit.local_point, global_point, frames)
            }
        }
    }

    /// Distance to the current cell's nearest boundary surface, plus which surface and the sense
    /// the particle acquires just beyond it.
    ///
    /// `point` and `dir` are in the root (global) frame; `translation` is the locator's
    /// [`Locator::innermost_translation`], since a cell's literal surfaces are defined in the frame
    /// of the universe that owns it, not the root frame.
    pub fn distance_to_boundary(
        &self,
        cell: Index,
        point: [Real; 3],
        dir: [Real; 3],
        translation: [Real; 3],
    ) -> Option<(Real, Index, bool)> {
        let local_point = sub(point, translation);
        self.cells[cell as usize].distance_to_boundary(local_point, dir, &self.surfaces)
    }
}

fn sub(a: [Real; 3], b: [Real; 3]) -> [Real; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::cell::Token;
    use crate::geometry::surface::{Boundary, SurfaceKind};

    /// Builds a single sphere of radius 5 inside an infinite void, both in the root universe:
    /// cell 0 = inside sphere (material), cell 1 = outside sphere (void, vacuum boundary assumed
    /// external to this test).
    fn sphere_geometry() -> Geometry {
        let surfaces = vec![Surface::new(
            1,
            0,
            SurfaceKind::Sphere {
                center: [0.0, 0.0, 0.0],
                radius: 5.0,
            },
            Boundary::Vacuum,
        )];
        let inside_expr: SmallVec<[Token; 16]> = SmallVec::from_slice(&[Token::Literal {
            surface: 0,
            sense: false,
        }]);
        let outside_expr: SmallVec<[Token; 16]> = SmallVec::from_slice(&[Token::Literal {
            surface: 0,
            sense: true,
        }]);
        let cells = vec![
            Cell {
                user_id: 1,
                index: 0,
                expr: inside_expr,
                literal_surfaces: SmallVec::from_slice(&[0]),
                fill: Fill::Material(0),
                universe: 0,
                translation: [0.0, 0.0, 0.0],
                dead: false,
            },
            Cell {
                user_id: 2,
                index: 1,
                expr: outside_expr,
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

    #[test]
    fn locate_inside_and_outside_sphere() {
        let geo = sphere_geometry();
        assert_eq!(geo.locate([0.0, 0.0, 0.0]).unwrap().cell, 0);
        assert_eq!(geo.locate([10.0, 0.0, 0.0]).unwrap().cell, 1);
    }

    #[test]
    fn locate_near_falls_back_to_root_on_cache_miss() {
        let geo = sphere_geometry();
        let inside = geo.locate([0.0, 0.0, 0.0]).unwrap();
        let relocated = geo.locate_near([10.0, 0.0, 0.0], &inside).unwrap();
        assert_eq!(relocated.cell, 1);
    }

    #[test]
    fn cyclic_universe_graph_is_rejected() {
        let surfaces = vec![Surface::new(
            1,
            0,
            SurfaceKind::PlaneX { x0: 0.0 },
            Boundary::Transmit,
        )];
        let expr: SmallVec<[Token; 16]> = SmallVec::from_slice(&[Token::Literal {
            surface: 0,
            sense: true,
        }]);
        // universe 0's only cell fills with universe 1; universe 1's only cell fills with universe 0.
        let cells = vec![
            Cell {
                user_id: 1,
                index: 0,
                expr: expr.clone(),
                literal_surfaces: SmallVec::from_slice(&[0]),
                fill: Fill::Universe(1),
                universe: 0,
                translation: [0.0, 0.0, 0.0],
                dead: false,
            },
            Cell {
                user_id: 2,
                index: 1,
                expr,
                literal_surfaces: SmallVec::from_slice(&[0]),
                fill: Fill::Universe(0),
                universe: 1,
                translation: [0.0, 0.0, 0.0],
                dead: false,
            },
        ];
        let universes = vec![
            Universe {
                user_id: 0,
                index: 0,
                cells: SmallVec::from_slice(&[0]),
            },
            Universe {
                user_id: 1,
                index: 1,
                cells: SmallVec::from_slice(&[1]),
            },
        ];
        let geo = Geometry::new(surfaces, cells, universes, Vec::new(), 0);
        assert!(matches!(
            geo.validate_acyclic(),
            Err(GeometryError::CyclicUniverse(_))
        ));
    }
}
