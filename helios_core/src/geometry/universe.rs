//! Universe: a collection of sibling cells partitioning a domain.

use smallvec::SmallVec;

use super::cell::Cell;
use super::surface::Surface;
use crate::numeric_types::{Index, Real};

/// A non-overlapping collection of sibling cells. The root universe covers all of ℝ³; any other
/// universe covers the interior of whatever cell fills it.
#[derive(Clone, Debug)]
pub struct Universe {
    pub user_id: i64,
    pub index: Index,
    /// Indices into the catalogue's cell arena, in definition order.
    pub cells: SmallVec<[Index; 8]>,
}

impl Universe {
    /// Finds the unique child cell containing `point`, or `None` if the point has leaked out of
    /// this universe's domain (only expected to happen at the root universe).
    pub fn locate(
        &self,
        point: [Real; 3],
        cells: &[Cell],
        surfaces: &[Surface],
        stack: &mut SmallVec<[bool; 16]>,
    ) -> Option<Index> {
        self.cells
            .iter()
            .copied()
            .find(|&idx| cells[idx as usize].contains(point, surfaces, stack))
    }
}
