//! Implicit quadric/planar surface primitives and their ray-intersection algebra.
//!
//! Every surface kind exposes `f`, `grad_f` and `intersect`. The set of kinds is closed, so dispatch
//! is a single `match` rather than a vtable (Design Note 9).

use crate::numeric_types::{Index, Real};

/// Tolerance used to decide whether a point lies "on" a surface.
pub const SURFACE_EPS: Real = 1e-12;

/// What happens to a particle when it crosses this surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Boundary {
    Transmit,
    Reflect,
    Vacuum,
}

/// Closed set of supported surface kinds.
#[derive(Clone, Debug)]
pub enum SurfaceKind {
    PlaneX { x0: Real },
    PlaneY { y0: Real },
    PlaneZ { z0: Real },
    /// General plane `a*x + b*y + c*z - d = 0`.
    Plane { normal: [Real; 3], d: Real },
    Sphere { center: [Real; 3], radius: Real },
    CylX { y0: Real, z0: Real, radius: Real },
    CylY { x0: Real, z0: Real, radius: Real },
    CylZ { x0: Real, y0: Real, radius: Real },
    /// Two-sheet cone along the x axis: `(y-y0)^2 + (z-z0)^2 - tan2*(x-x0)^2 = 0`.
    ConeX { x0: Real, y0: Real, z0: Real, tan2: Real },
    ConeY { x0: Real, y0: Real, z0: Real, tan2: Real },
    ConeZ { x0: Real, y0: Real, z0: Real, tan2: Real },
    /// General quadric `a*x^2 + b*y^2 + c*z^2 + d*x*y + e*y*z + f*x*z + g*x + h*y + j*z + k = 0`.
    Quadric {
        a: Real,
        b: Real,
        c: Real,
        d: Real,
        e: Real,
        f: Real,
        g: Real,
        h: Real,
        j: Real,
        k: Real,
    },
}

/// A single oriented implicit surface with a stable user id and a boundary condition.
#[derive(Clone, Debug)]
pub struct Surface {
    pub user_id: i64,
    pub index: Index,
    pub kind: SurfaceKind,
    pub boundary: Boundary,
}

impl Surface {
    pub fn new(user_id: i64, index: Index, kind: SurfaceKind, boundary: Boundary) -> Self {
        Self {
            user_id,
            index,
            kind,
            boundary,
        }
    }

    /// Evaluates `f(point)`.
    pub fn f(&self, p: [Real; 3]) -> Real {
        match &self.kind {
            SurfaceKind::PlaneX { x0 } => p[0] - x0,
            SurfaceKind::PlaneY { y0 } => p[1] - y0,
            SurfaceKind::PlaneZ { z0 } => p[2] - z0,
            SurfaceKind::Plane { normal, d } => dot(*normal, p) - d,
            SurfaceKind::Sphere { center, radius } => {
                let v = sub(p, *center);
                dot(v, v) - radius * radius
            }
            SurfaceKind::CylX { y0, z0, radius } => {
                let dy = p[1] - y0;
                let dz = p[2] - z0;
                dy * dy + dz * dz - radius * radius
            }
            SurfaceKind::CylY { x0, z0, radius } => {
                let dx = p[0] - x0;
                let dz = p[2] - z0;
                dx * dx + dz * dz - radius * radius
            }
            SurfaceKind::CylZ { x0, y0, radius } => {
                let dx = p[0] - x0;
                let dy = p[1] - y0;
                dx * dx + dy * dy - radius * radius
            }
            SurfaceKind::ConeX { x0, y0, z0, tan2 } => {
                let dx = p[0] - x0;
                let dy = p[1] - y0;
                let dz = p[2] - z0;
                dy * dy + dz * dz - tan2 * dx * dx
            }
            SurfaceKind::ConeY { x0, y0, z0, tan2 } => {
                let dx = p[0] - x0;
                let dy = p[1] - y0;
                let dz = p[2] - z0;
                dx * dx + dz * dz - tan2 * dy * dy
            }
            SurfaceKind::ConeZ { x0, y0, z0, tan2 } => {
                let dx = p[0] - x0;
                let dy = p[1] - y0;
                let dz = p[2] - z0;
                dx * dx + dy * dy - tan2 * dz * dz
            }
            SurfaceKind::Quadric {
                a,
                b,
                c,
                d,
                e,
                f,
                g,
                h,
                j,
                k,
            } => {
                let (x, y, z) = (p[0], p[1], p[2]);
                a * x * x
                    + b * y * y
                    + c * z * z
                    + d * x * y
                    + e * y * z
                    + f * x * z
                    + g * x
                    + h * y
                    + j * z
                    + k
            }
        }
    }

    /// Gradient of `f` at `point`, used as the (unnormalized) outward normal and for the sense test.
    pub fn grad_f(&self, p: [Real; 3]) -> [Real; 3] {
        match &self.kind {
            SurfaceKind::PlaneX { .. } => [1.0, 0.0, 0.0],
            SurfaceKind::PlaneY { .. } => [0.0, 1.0, 0.0],
            SurfaceKind::PlaneZ { .. } => [0.0, 0.0, 1.0],
            SurfaceKind::Plane { normal, .. } => *normal,
            SurfaceKind::Sphere { center, .. } => scale(sub(p, *center), 2.0),
            SurfaceKind::CylX { y0, z0, .. } => [0.0, 2.0 * (p[1] - y0), 2.0 * (p[2] - z0)],
            SurfaceKind::CylY { x0, z0, .. } => [2.0 * (p[0] - x0), 0.0, 2.0 * (p[2] - z0)],
            SurfaceKind::CylZ { x0, y0, .. } => [2.0 * (p[0] - x0), 2.0 * (p[1] - y0), 0.0],
            SurfaceKind::ConeX { x0, y0, z0, tan2 } => [
                -2.0 * tan2 * (p[0] - x0),
                2.0 * (p[1] - y0),
                2.0 * (p[2] - z0),
            ],
            SurfaceKind::ConeY { x0, y0, z0, tan2 } => [
                2.0 * (p[0] - x0),
                -2.0 * tan2 * (p[1] - y0),
                2.0 * (p[2] - z0),
            ],
            SurfaceKind::ConeZ { x0, y0, z0, tan2 } => [
                2.0 * (p[0] - x0),
                2.0 * (p[1] - y0),
                -2.0 * tan2 * (p[2] - z0),
            ],
            SurfaceKind::Quadric {
                a,
                b,
                c,
                d,
                e,
                f,
                g,
                h,
                j,
                ..
            } => {
                let (x, y, z) = (p[0], p[1], p[2]);
                [
                    2.0 * a * x + d * y + f * z + g,
                    2.0 * b * y + d * x + e * z + h,
                    2.0 * c * z + e * y + f * x + j,
                ]
            }
        }
    }

    /// The unit outward normal at `point` (assumed to lie on the surface).
    pub fn normal(&self, p: [Real; 3]) -> [Real; 3] {
        normalize(self.grad_f(p))
    }

    /// Returns the smallest strictly positive root `t` of `f(point + t*dir) = 0`, along with the
    /// sense (sign of `f`, as a `bool`, `true` = positive) that will hold just beyond the hit point.
    ///
    /// Returns `None` if there is no root in `(0, infinity)`, or `Some(f64::NAN)` is never produced:
    /// a NaN discriminant or coefficient collapses to `None` plus a counter bump at the call site.
    pub fn intersect(&self, p: [Real; 3], dir: [Real; 3]) -> Option<Real> {
        match &self.kind {
            SurfaceKind::PlaneX { x0 } => intersect_plane(p[0], dir[0], *x0),
            SurfaceKind::PlaneY { y0 } => intersect_plane(p[1], dir[1], *y0),
            SurfaceKind::PlaneZ { z0 } => intersect_plane(p[2], dir[2], *z0),
            SurfaceKind::Plane { normal, d } => {
                let denom = dot(*normal, dir);
                if denom == 0.0 {
                    return None;
                }
                let t = (d - dot(*normal, p)) / denom;
                positive_root(t)
            }
            SurfaceKind::Sphere { center, radius } => {
                let oc = sub(p, *center);
                let a = dot(dir, dir);
                let b = 2.0 * dot(oc, dir);
                let c = dot(oc, oc) - radius * radius;
                smallest_positive_root(a, b, c)
            }
            SurfaceKind::CylX { y0, z0, radius } => {
                let oy = p[1] - y0;
                let oz = p[2] - z0;
                let a = dir[1] * dir[1] + dir[2] * dir[2];
                let b = 2.0 * (oy * dir[1] + oz * dir[2]);
                let c = oy * oy + oz * oz - radius * radius;
                smallest_positive_root(a, b, c)
            }
            SurfaceKind::CylY { x0, z0, radius } => {
                let ox = p[0] - x0;
                let oz = p[2] - z0;
                let a = dir[0] * dir[0] + dir[2] * dir[2];
                let b = 2.0 * (ox * dir[0] + oz * dir[2]);
                let c = ox * ox + oz * oz - radius * radius;
                smallest_positive_root(a, b, c)
            }
            SurfaceKind::CylZ { x0, y0, radius } => {
                let ox = p[0] - x0;
                let oy = p[1] - y0;
                let a = dir[0] * dir[0] + dir[1] * dir[1];
                let b = 2.0 * (ox * dir[0] + oy * dir[1]);
                let c = ox * ox + oy * oy - radius * radius;
                smallest_positive_root(a, b, c)
            }
            SurfaceKind::ConeX { x0, y0, z0, tan2 } => {
                let ox = p[0] - x0;
                let oy = p[1] - y0;
                let oz = p[2] - z0;
                let a = dir[1] * dir[1] + dir[2] * dir[2] - tan2 * dir[0] * dir[0];
                let b = 2.0 * (oy * dir[1] + oz * dir[2] - tan2 * ox * dir[0]);
                let c = oy * oy + oz * oz - tan2 * ox * ox;
                smallest_positive_root(a, b, c)
            }
            SurfaceKind::ConeY { x0, y0, z0, tan2 } => {
                let ox = p[0] - x0;
                let oy = p[1] - y0;
                let oz = p[2] - z0;
                let a = dir[0] * dir[0] + dir[2] * dir[2] - tan2 * dir[1] * dir[1];
                let b = 2.0 * (ox * dir[0] + oz * dir[2] - tan2 * oy * dir[1]);
                let c = ox * ox + oz * oz - tan2 * oy * oy;
                smallest_positive_root(a, b, c)
            }
            SurfaceKind::ConeZ { x0, y0, z0, tan2 } => {
                let ox = p[0] - x0;
                let oy = p[1] - y0;
                let oz = p[2] - z0;
                let a = dir[0] * dir[0] + dir[1] * dir[1] - tan2 * dir[2] * dir[2];
                let b = 2.0 * (ox * dir[0] + oy * dir[1] - tan2 * oz * dir[2]);
                let c = ox * ox + oy * oy - tan2 * oz * oz;
                smallest_positive_root(a, b, c)
            }
            SurfaceKind::Quadric {
                a,
                b,
                c,
                d,
                e,
                f,
                g,
                h,
                j,
                k,
            } => {
                let (x, y, z) = (p[0], p[1], p[2]);
                let (u, v, w) = (dir[0], dir[1], dir[2]);
                let qa = a * u * u + b * v * v + c * w * w + d * u * v + e * v * w + f * u * w;
                let qb = 2.0 * a * x * u
                    + 2.0 * b * y * v
                    + 2.0 * c * z * w
                    + d * (x * v + y * u)
                    + e * (y * w + z * v)
                    + f * (x * w + z * u)
                    + g * u
                    + h * v
                    + j * w;
                let qc = a * x * x
                    + b * y * y
                    + c * z * z
                    + d * x * y
                    + e * y * z
                    + f * x * z
                    + g * x
                    + h * y
                    + j * z
                    + k;
                smallest_positive_root(qa, qb, qc)
            }
        }
    }

    /// Sense of `point` with respect to this surface: `true` for the positive half-space.
    pub fn sense_at(&self, p: [Real; 3]) -> bool {
        self.f(p) >= 0.0
    }

    /// Whether `point` lies within [`SURFACE_EPS`] of this surface.
    pub fn on_surface(&self, p: [Real; 3]) -> bool {
        self.f(p).abs() < SURFACE_EPS
    }
}

fn intersect_plane(p_axis: Real, dir_axis: Real, offset: Real) -> Option<Real> {
    if dir_axis == 0.0 {
        return None;
    }
    let t = (offset - p_axis) / dir_axis;
    positive_root(t)
}

fn positive_root(t: Real) -> Option<Real> {
    if t.is_finite() && t > SURFACE_EPS {
        Some(t)
    } else {
        None
    }
}

/// Numerically stable smallest strictly-positive root of `a*t^2 + b*t + c = 0`.
///
/// Uses the Citardauq / stable quadratic formula (`q = -0.5*(b + sign(b)*sqrt(disc))`,
/// `t0 = q/a`, `t1 = c/q`) to avoid catastrophic cancellation for grazing rays, then falls back to
/// the linear case when `a` is (numerically) zero.
fn smallest_positive_root(a: Real, b: Real, c: Real) -> Option<Real> {
    if a.abs() < 1e-300 {
        if b == 0.0 {
            return None;
        }
        return positive_root(-c / b);
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 || disc.is_nan() {
        return None;
    }
    let sqrt_disc = disc.sqrt();
    let sign = if b >= 0.0 { 1.0 } else { -1.0 };
    let q = -0.5 * (b + sign * sqrt_disc);
    if q == 0.0 {
        return positive_root(0.0).filter(|_| false).or_else(|| {
            // Double root at t=0 only; no strictly-positive root from this branch.
            None
        });
    }
    let t0 = q / a;
    let t1 = c / q;
    let (lo, hi) = if t0 <= t1 { (t0, t1) } else { (t1, t0) };
    positive_root(lo).or_else(|| positive_root(hi))
}

fn dot(a: [Real; 3], b: [Real; 3]) -> Real {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn sub(a: [Real; 3], b: [Real; 3]) -> [Real; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn scale(a: [Real; 3], s: Real) -> [Real; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

fn normalize(v: [Real; 3]) -> [Real; 3] {
    let len = dot(v, v).sqrt();
    if len == 0.0 {
        v
    } else {
        scale(v, 1.0 / len)
    }
}

/// Reflects `dir` about the surface with outward normal `n` (unit length): `d - 2(d.n)n`.
pub fn reflect(dir: [Real; 3], normal: [Real; 3]) -> [Real; 3] {
    let proj = 2.0 * dot(dir, normal);
    sub(dir, scale(normal, proj))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere() -> Surface {
        Surface::new(
            1,
            0,
            SurfaceKind::Sphere {
                center: [0.0, 0.0, 0.0],
                radius: 5.0,
            },
            Boundary::Vacuum,
        )
    }

    #[test]
    fn ray_through_origin_hits_sphere_at_radius() {
        let s = sphere();
        let t = s.intersect([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]).unwrap();
        assert!((t - 5.0).abs() < 1e-9);
    }

    #[test]
    fn ray_starting_on_surface_returns_next_crossing_not_zero() {
        let s = sphere();
        let t = s.intersect([5.0, 0.0, 0.0], [1.0, 0.0, 0.0]).unwrap();
        assert!((t - 10.0).abs() < 1e-6, "t = {t}");
    }

    #[test]
    fn ray_moving_away_from_sphere_from_inside_hits_far_side() {
        let s = sphere();
        let t = s.intersect([1.0, 0.0, 0.0], [1.0, 0.0, 0.0]).unwrap();
        assert!((t - 4.0).abs() < 1e-9);
    }

    #[test]
    fn tangent_ray_returns_single_point_or_none() {
        let s = sphere();
        let result = s.intersect([-10.0, 5.0, 0.0], [1.0, 0.0, 0.0]);
        // A tangent ray may report the grazing point or miss entirely; both are acceptable.
        if let Some(t) = result {
            let hit = [-10.0 + t, 5.0, 0.0];
            assert!(s.f(hit).abs() < 1e-6);
        }
    }

    #[test]
    fn reflection_is_involutive() {
        let n = normalize([1.0, 1.0, 0.0]);
        let d = normalize([0.3, -0.7, 0.2]);
        let once = reflect(d, n);
        let twice = reflect(once, n);
        for axis in 0..3 {
            assert!((twice[axis] - d[axis]).abs() < 1e-12);
        }
    }

    #[test]
    fn axis_plane_matches_general_plane() {
        let px = Surface::new(1, 0, SurfaceKind::PlaneX { x0: 3.0 }, Boundary::Transmit);
        let general = Surface::new(
            2,
            1,
            SurfaceKind::Plane {
                normal: [1.0, 0.0, 0.0],
                d: 3.0,
            },
            Boundary::Transmit,
        );
        let p = [0.0, 1.0, 2.0];
        let d = [1.0, 0.3, -0.2];
        assert!((px.intersect(p, d).unwrap() - general.intersect(p, d).unwrap()).abs() < 1e-12);
    }
}
