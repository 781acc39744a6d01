//! Boolean cell expressions and cell-local geometry queries.
//!
//! Expressions are lowered once at setup time from the postfix Boolean string in the input object
//! model into a flat token vector (Design Note: "Boolean cell expressions"). Evaluating a token
//! vector against a point uses a fixed-capacity stack, so the hot path never allocates.

use smallvec::SmallVec;

use super::surface::Surface;
use crate::numeric_types::{Index, Real};

/// One token of a lowered postfix Boolean expression over signed surface literals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token {
    /// A half-space literal: "point is on the `sense` side of surface `surface`".
    Literal { surface: Index, sense: bool },
    And,
    Or,
    Not,
}

/// Evaluates a lowered postfix expression against `point`, using `stack` as scratch space.
///
/// `stack` is caller-provided so that a worker can reuse one buffer across many evaluations without
/// reallocating (see [`crate::workspace`]).
pub fn evaluate(
    expr: &[Token],
    surfaces: &[Surface],
    point: [Real; 3],
    stack: &mut SmallVec<[bool; 16]>,
) -> bool {
    stack.clear();
    for tok in expr {
        match *tok {
            Token::Literal { surface, sense } => {
                let on_positive_side = surfaces[surface as usize].sense_at(point);
                stack.push(on_positive_side == sense);
            }
            Token::And => {
                let b = stack.pop().expect("malformed expression: and");
                let a = stack.pop().expect("malformed expression: and");
                stack.push(a && b);
            }
            Token::Or => {
                let b = stack.pop().expect("malformed expression: or");
                let a = stack.pop().expect("malformed expression: or");
                stack.push(a || b);
            }
            Token::Not => {
                let a = stack.pop().expect("malformed expression: not");
                stack.push(!a);
            }
        }
    }
    stack.pop().unwrap_or(false)
}

/// What a cell resolves to once a point is known to be inside it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fill {
    Material(Index),
    Universe(Index),
    Lattice(Index),
    /// No material: void, transport continues without collisions until the next surface.
    Void,
}

/// A region of space defined by a Boolean combination of surface half-spaces.
#[derive(Clone, Debug)]
pub struct Cell {
    pub user_id: i64,
    pub index: Index,
    /// Lowered postfix expression, evaluated with [`evaluate`].
    pub expr: SmallVec<[Token; 16]>,
    /// Deduplicated surfaces referenced by `expr`, used by [`Cell::distance_to_boundary`] so the
    /// hot loop never rescans the full expression.
    pub literal_surfaces: SmallVec<[Index; 8]>,
    pub fill: Fill,
    /// Index of the universe this cell belongs to.
    pub universe: Index,
    /// Affine translation applied to a point before recursing into this cell's fill universe.
    pub translation: [Real; 3],
    /// Terminates any particle that enters this cell, regardless of fill.
    pub dead: bool,
}

impl Cell {
    pub fn contains(&self, point: [Real; 3], surfaces: &[Surface], stack: &mut SmallVec<[bool; 16]>) -> bool {
        evaluate(&self.expr, surfaces, point, stack)
    }

    /// Point translated into this cell's fill-universe local frame.
    pub fn to_local(&self, point: [Real; 3]) -> [Real; 3] {
        [
            point[0] - self.translation[0],
            point[1] - self.translation[1],
            point[2] - self.translation[2],
        ]
    }

    /// Distance to the nearest literal surface along `dir` from `point`, plus which surface was hit
    /// and the sense the particle will have just beyond it.
    ///
    /// Iterates over the cell's literal surfaces, intersects each, and keeps the minimum positive
    /// distance. Returns `None` if no literal surface is hit (should not happen for a well-formed
    /// bounded cell, but unbounded/void cells may legitimately have none within float range).
    pub fn distance_to_boundary(
        &self,
        point: [Real; 3],
        dir: [Real; 3],
        surfaces: &[Surface],
    ) -> Option<(Real, Index, bool)> {
        let mut best: Option<(Real, Index, bool)> = None;
        for &surf_idx in &self.literal_surfaces {
            let surface = &surfaces[surf_idx as usize];
            if let Some(t) = surface.intersect(point, dir) {
                if best.map_or(true, |(best_t, _, _)| t < best_t) {
                    let hit = [
                        point[0] + t * dir[0],
                        point[1] + t * dir[1],
                        point[2] + t * dir[2],
                    ];
                    let grad = surface.grad_f(hit);
                    let new_sense = dir[0] * grad[0] + dir[1] * grad[1] + dir[2] * grad[2] >= 0.0;
                    best = Some((t, surf_idx, new_sense));
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::surface::{Boundary, SurfaceKind};

    fn plane_x(x0: Real) -> Surface {
        Surface::new(1, 0, SurfaceKind::PlaneX { x0 }, Boundary::Transmit)
    }

    #[test]
    fn and_of_two_half_spaces_is_a_slab() {
        let surfaces = vec![plane_x(0.0), plane_x(1.0)];
        // cell: x >= 0 and x <= 1, i.e. (+surf0) and (-surf1)
        let expr: SmallVec<[Token; 16]> = SmallVec::from_slice(&[
            Token::Literal {
                surface: 0,
                sense: true,
            },
            Token::Literal {
                surface: 1,
                sense: false,
            },
            Token::And,
        ]);
        let mut stack = SmallVec::new();
        assert!(evaluate(&expr, &surfaces, [0.5, 0.0, 0.0], &mut stack));
        assert!(!evaluate(&expr, &surfaces, [-0.5, 0.0, 0.0], &mut stack));
        assert!(!evaluate(&expr, &surfaces, [1.5, 0.0, 0.0], &mut stack));
    }

    #[test]
    fn not_inverts_sense() {
        let surfaces = vec![plane_x(0.0)];
        let expr: SmallVec<[Token; 16]> = SmallVec::from_slice(&[
            Token::Literal {
                surface: 0,
                sense: true,
            },
            Token::Not,
        ]);
        let mut stack = SmallVec::new();
        assert!(evaluate(&expr, &surfaces, [-1.0, 0.0, 0.0], &mut stack));
        assert!(!evaluate(&expr, &surfaces, [1.0, 0.0, 0.0], &mut stack));
    }

    #[test]
    fn distance_to_boundary_picks_nearest_literal() {
        let surfaces = vec![plane_x(1.0), plane_x(5.0)];
        let cell = Cell {
            user_id: 1,
            index: 0,
            expr: SmallVec::new(),
            literal_surfaces: SmallVec::from_slice(&[0, 1]),
            fill: Fill::Void,
            universe: 0,
            translation: [0.0, 0.0, 0.0],
            dead: false,
        };
        let (t, surf, _) = cell
            .distance_to_boundary([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], &surfaces)
            .unwrap();
        assert!((t - 1.0).abs() < 1e-12);
        assert_eq!(surf, 0);
    }
}
