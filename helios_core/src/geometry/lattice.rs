//! Lattice: a periodic tiling of child universes indexed by integer coordinates.

use crate::numeric_types::{Index, Real};

/// Rectangular or hexagonal tiling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LatticeKind {
    Rect,
    Hex,
}

/// A special universe parameterized by a lattice type, pitch, dimension and a row-major array
/// mapping lattice indices to universe indices.
#[derive(Clone, Debug)]
pub struct Lattice {
    pub user_id: i64,
    pub index: Index,
    pub kind: LatticeKind,
    /// Number of lattice positions along each axis.
    pub dimension: [i32; 3],
    pub pitch: [Real; 3],
    /// Lower-corner origin the index computation is relative to.
    pub origin: [Real; 3],
    /// Row-major (`i + j*nx + k*nx*ny`) array of child universe indices.
    pub universes: Vec<Index>,
}

/// Result of a lattice lookup: which child universe to recurse into, plus the point translated
/// into that universe's local frame.
pub struct LatticeHit {
    pub universe: Index,
    pub local_point: [Real; 3],
}

impl Lattice {
    /// Looks up the lattice cell containing `point`, returning `None` if the point falls outside
    /// the lattice's dimension array (leaked, or should be caught by an enclosing surface first).
    pub fn locate(&self, point: [Real; 3]) -> Option<LatticeHit> {
        match self.kind {
            LatticeKind::Rect => self.locate_rect(point),
            LatticeKind::Hex => self.locate_hex(point),
        }
    }

    fn linear_index(&self, i: i32, j: i32, k: i32) -> Option<usize> {
        let (nx, ny, nz) = (self.dimension[0], self.dimension[1], self.dimension[2]);
        if i < 0 || j < 0 || k < 0 || i >= nx || j >= ny || k >= nz {
            return None;
        }
        Some((i + j * nx + k * nx * ny) as usize)
    }

    fn locate_rect(&self, point: [Real; 3]) -> Option<LatticeHit> {
        let rel = [
            point[0] - self.origin[0],
            point[1] - self.origin[1],
            point[2] - self.origin[2],
        ];
        let idx = [
            (rel[0] / self.pitch[0]).floor() as i32,
            (rel[1] / self.pitch[1]).floor() as i32,
            (rel[2] / self.pitch[2]).floor() as i32,
        ];
        let linear = self.linear_index(idx[0], idx[1], idx[2])?;
        let universe = self.universes[linear];
        let center = [
            self.origin[0] + (idx[0] as Real + 0.5) * self.pitch[0],
            self.origin[1] + (idx[1] as Real + 0.5) * self.pitch[1],
            self.origin[2] + (idx[2] as Real + 0.5) * self.pitch[2],
        ];
        let local_point = [
            point[0] - center[0],
            point[1] - center[1],
            point[2] - center[2],
        ];
        Some(LatticeHit {
            universe,
            local_point,
        })
    }

    /// Axial-coordinate hex lookup: the xy plane is tiled with pointy-top hexagons of pitch
    /// `pitch[0]`, z is tiled rectangularly with `pitch[2]` as in the rect case.
    fn locate_hex(&self, point: [Real; 3]) -> Option<LatticeHit> {
        let rel_x = point[0] - self.origin[0];
        let rel_y = point[1] - self.origin[1];
        let rel_z = point[2] - self.origin[2];
        let size = self.pitch[0] / 3f64.sqrt() * 2.0 / 3.0 * 3f64.sqrt();
        // size chosen so that `pitch[0]` is the flat-to-flat hex pitch; convert to axial coords.
        let q = (3f64.sqrt() / 3.0 * rel_x - rel_y / 3.0) / size;
        let r = (2.0 / 3.0 * rel_y) / size;
        let (q, r) = axial_round(q, r);

        let k = (rel_z / self.pitch[2]).floor() as i32;
        let nx = self.dimension[0];
        let ny = self.dimension[1];
        let i = q + nx / 2;
        let j = r + ny / 2;
        let linear = self.linear_index(i, j, k)?;
        let universe = self.universes[linear];

        let center_x = self.origin[0] + size * (3f64.sqrt() * q as Real + 3f64.sqrt() / 2.0 * r as Real);
        let center_y = self.origin[1] + size * (1.5 * r as Real);
        let center_z = self.origin[2] + k as Real * self.pitch[2];
        let local_point = [point[0] - center_x, point[1] - center_y, point[2] - center_z];
        Some(LatticeHit {
            universe,
            local_point,
        })
    }
}

/// Rounds fractional axial coordinates to the nearest integer hex, preserving the cube-coordinate
/// constraint `q + r + s == 0`.
fn axial_round(q: Real, r: Real) -> (i32, i32) {
    let s = -q - r;
    let mut rq = q.round();
    let mut rr = r.round();
    let rs = s.round();

    let q_diff = (rq - q).abs();
    let r_diff = (rr - r).abs();
    let s_diff = (rs - s).abs();

    if q_diff > r_diff && q_diff > s_diff {
        rq = -rr - rs;
    } else if r_diff > s_diff {
        rr = -rq - rs;
    }
    (rq as i32, rr as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_lattice() -> Lattice {
        Lattice {
            user_id: 1,
            index: 0,
            kind: LatticeKind::Rect,
            dimension: [3, 3, 1],
            pitch: [2.0, 2.0, 1.0],
            origin: [-3.0, -3.0, -0.5],
            universes: (0..9).collect(),
        }
    }

    #[test]
    fn rect_lookup_center_cell() {
        let lat = rect_lattice();
        let hit = lat.locate([0.0, 0.0, 0.0]).unwrap();
        assert_eq!(hit.universe, 4);
        assert!(hit.local_point[0].abs() < 1e-9);
        assert!(hit.local_point[1].abs() < 1e-9);
    }

    #[test]
    fn rect_lookup_corner_cell() {
        let lat = rect_lattice();
        let hit = lat.locate([-2.9, -2.9, 0.0]).unwrap();
        assert_eq!(hit.universe, 0);
    }

    #[test]
    fn rect_lookup_outside_dimension_is_none() {
        let lat = rect_lattice();
        assert!(lat.locate([100.0, 0.0, 0.0]).is_none());
    }

    #[test]
    fn axial_round_preserves_integer_input() {
        assert_eq!(axial_round(2.0, -1.0), (2, -1));
    }
}
