//! Types, aliases and helper operations for doing math with `ultraviolet`.
//!
//! Rotations and transforms are stored as sines and cosines rather than rotors
//! because the solver evaluates them constantly and never interpolates them.
use std::f64::consts::PI;
pub use ultraviolet as uv;

pub type Vec2 = uv::DVec2;

/// An angle in either degrees or radians.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
pub enum Angle {
    Rad(f64),
    Deg(f64),
}
impl Angle {
    /// Get the angle as degrees.
    #[inline]
    pub fn deg(&self) -> f64 {
        match self {
            Angle::Rad(rad) => rad * 180.0 / PI,
            Angle::Deg(deg) => *deg,
        }
    }

    /// Get the angle as radians.
    #[inline]
    pub fn rad(&self) -> f64 {
        match self {
            Angle::Rad(rad) => *rad,
            Angle::Deg(deg) => deg * PI / 180.0,
        }
    }
}
impl From<f64> for Angle {
    /// Bare numbers are radians.
    #[inline]
    fn from(rad: f64) -> Self {
        Angle::Rad(rad)
    }
}
impl Default for Angle {
    fn default() -> Self {
        Angle::Rad(0.0)
    }
}
impl From<Angle> for Rot {
    #[inline]
    fn from(ang: Angle) -> Rot {
        Rot::from_angle(ang.rad())
    }
}
impl From<Rot> for Angle {
    #[inline]
    fn from(rot: Rot) -> Self {
        Angle::Rad(rot.angle())
    }
}

// Vec2 utils

/// Perpendicular rotated counterclockwise. Same as `cross_sv(1.0, v)`.
#[inline]
pub fn left_normal(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}
/// Perpendicular rotated clockwise. Same as `cross_vs(v, 1.0)`.
#[inline]
pub fn right_normal(v: Vec2) -> Vec2 {
    Vec2::new(v.y, -v.x)
}

/// 2D cross product of two vectors, which is a scalar.
#[inline]
pub fn cross(a: Vec2, b: Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Cross product of a vector and a scalar (treated as a z-axis vector).
#[inline]
pub fn cross_vs(v: Vec2, s: f64) -> Vec2 {
    Vec2::new(s * v.y, -s * v.x)
}

/// Cross product of a scalar (treated as a z-axis vector) and a vector.
#[inline]
pub fn cross_sv(s: f64, v: Vec2) -> Vec2 {
    Vec2::new(-s * v.y, s * v.x)
}

#[inline]
pub fn distance(a: Vec2, b: Vec2) -> f64 {
    (a - b).mag()
}

#[inline]
pub fn distance_sq(a: Vec2, b: Vec2) -> f64 {
    (a - b).mag_sq()
}

/// Normalize in place, returning the original length.
/// Vectors shorter than machine epsilon are left as they are and report zero.
#[inline]
pub fn normalize(v: &mut Vec2) -> f64 {
    let length = v.mag();
    if length < f64::EPSILON {
        return 0.0;
    }
    *v /= length;
    length
}

#[inline]
pub fn is_valid_vec(v: Vec2) -> bool {
    v.x.is_finite() && v.y.is_finite()
}

//
// Rotation
//

/// A rotation stored as its sine and cosine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rot {
    pub s: f64,
    pub c: f64,
}

impl Default for Rot {
    fn default() -> Self {
        Self::identity()
    }
}

impl Rot {
    #[inline]
    pub fn from_angle(angle: f64) -> Self {
        Rot {
            s: angle.sin(),
            c: angle.cos(),
        }
    }

    #[inline]
    pub const fn identity() -> Self {
        Rot { s: 0.0, c: 1.0 }
    }

    /// The angle in radians, in the range [-pi, pi].
    #[inline]
    pub fn angle(&self) -> f64 {
        self.s.atan2(self.c)
    }

    #[inline]
    pub fn x_axis(&self) -> Vec2 {
        Vec2::new(self.c, self.s)
    }

    #[inline]
    pub fn y_axis(&self) -> Vec2 {
        Vec2::new(-self.s, self.c)
    }

    /// Rotate a vector.
    #[inline]
    pub fn apply(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x - self.s * v.y, self.s * v.x + self.c * v.y)
    }

    /// Inverse rotate a vector.
    #[inline]
    pub fn apply_inv(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }

    /// Compose two rotations, `self * other`.
    #[inline]
    pub fn mul(&self, other: Rot) -> Rot {
        Rot {
            s: self.s * other.c + self.c * other.s,
            c: self.c * other.c - self.s * other.s,
        }
    }

    /// Relative rotation, `self^T * other`.
    #[inline]
    pub fn mul_inv(&self, other: Rot) -> Rot {
        Rot {
            s: self.c * other.s - self.s * other.c,
            c: self.c * other.c + self.s * other.s,
        }
    }
}

//
// Transform
//

/// A translation and a rotation, no scaling.
/// Describes the position and orientation of a rigid frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Transform {
    pub p: Vec2,
    pub q: Rot,
}

impl Transform {
    #[inline]
    pub fn new(p: Vec2, q: Rot) -> Self {
        Transform { p, q }
    }

    #[inline]
    pub fn from_angle(p: Vec2, angle: f64) -> Self {
        Transform {
            p,
            q: Rot::from_angle(angle),
        }
    }

    #[inline]
    pub fn identity() -> Self {
        Transform {
            p: Vec2::zero(),
            q: Rot::identity(),
        }
    }

    /// Transform a point from local to world space.
    #[inline]
    pub fn apply(&self, v: Vec2) -> Vec2 {
        self.q.apply(v) + self.p
    }

    /// Transform a point from world to local space.
    #[inline]
    pub fn apply_inv(&self, v: Vec2) -> Vec2 {
        self.q.apply_inv(v - self.p)
    }

    /// Compose two transforms, `self * other`.
    #[inline]
    pub fn mul(&self, other: &Transform) -> Transform {
        Transform {
            q: self.q.mul(other.q),
            p: self.q.apply(other.p) + self.p,
        }
    }

    /// `other` expressed in the frame of `self`.
    #[inline]
    pub fn mul_inv(&self, other: &Transform) -> Transform {
        Transform {
            q: self.q.mul_inv(other.q),
            p: self.q.apply_inv(other.p - self.p),
        }
    }
}

//
// Sweep
//

/// Describes the motion of a body's center of mass over a time step
/// for continuous collision detection.
///
/// `alpha0` is the fraction of the current step that has already elapsed
/// when `c0`/`a0` were recorded.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sweep {
    /// Center of mass in body-local coordinates.
    pub local_center: Vec2,
    pub c0: Vec2,
    pub c: Vec2,
    pub a0: f64,
    pub a: f64,
    pub alpha0: f64,
}

impl Sweep {
    /// Interpolated transform at `beta` ∈ [0, 1] of the remaining step.
    pub fn get_transform(&self, beta: f64) -> Transform {
        let c = (1.0 - beta) * self.c0 + beta * self.c;
        let a = (1.0 - beta) * self.a0 + beta * self.a;
        let q = Rot::from_angle(a);
        // shift from center of mass to body origin
        Transform {
            p: c - q.apply(self.local_center),
            q,
        }
    }

    /// Move the start of the sweep forward to time `alpha`.
    pub fn advance(&mut self, alpha: f64) {
        debug_assert!(self.alpha0 < 1.0);
        let beta = (alpha - self.alpha0) / (1.0 - self.alpha0);
        self.c0 += beta * (self.c - self.c0);
        self.a0 += beta * (self.a - self.a0);
        self.alpha0 = alpha;
    }

    /// Shift both angles by a multiple of 2pi so that `a0` lies in [0, 2pi).
    pub fn normalize(&mut self) {
        let two_pi = 2.0 * PI;
        let d = two_pi * (self.a0 / two_pi).floor();
        self.a0 -= d;
        self.a -= d;
    }
}

//
// Matrices
//

/// A 2x2 column-major matrix.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Mat22 {
    pub ex: Vec2,
    pub ey: Vec2,
}

impl Mat22 {
    #[inline]
    pub fn new(ex: Vec2, ey: Vec2) -> Self {
        Mat22 { ex, ey }
    }

    #[inline]
    pub fn zero() -> Self {
        Mat22 {
            ex: Vec2::zero(),
            ey: Vec2::zero(),
        }
    }

    #[inline]
    pub fn mul_vec(&self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.ex.x * v.x + self.ey.x * v.y,
            self.ex.y * v.x + self.ey.y * v.y,
        )
    }

    pub fn inverse(&self) -> Mat22 {
        let (a, b, c, d) = (self.ex.x, self.ey.x, self.ex.y, self.ey.y);
        let mut det = a * d - b * c;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Mat22 {
            ex: Vec2::new(det * d, -det * c),
            ey: Vec2::new(-det * b, det * a),
        }
    }

    /// Solve `A * x = b` without computing the inverse.
    /// A singular matrix yields zero.
    pub fn solve(&self, b: Vec2) -> Vec2 {
        let (a11, a12, a21, a22) = (self.ex.x, self.ey.x, self.ex.y, self.ey.y);
        let mut det = a11 * a22 - a12 * a21;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Vec2::new(
            det * (a22 * b.x - a12 * b.y),
            det * (a11 * b.y - a21 * b.x),
        )
    }
}

/// A 3D column vector, used only by the 3x3 solvers of the joints.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Vec3 { x, y, z }
    }

    #[inline]
    pub const fn zero() -> Self {
        Vec3::new(0.0, 0.0, 0.0)
    }

    #[inline]
    pub fn dot(&self, o: Vec3) -> f64 {
        self.x * o.x + self.y * o.y + self.z * o.z
    }

    #[inline]
    pub fn cross(&self, o: Vec3) -> Vec3 {
        Vec3::new(
            self.y * o.z - self.z * o.y,
            self.z * o.x - self.x * o.z,
            self.x * o.y - self.y * o.x,
        )
    }

    #[inline]
    pub fn xy(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

impl std::ops::Add for Vec3 {
    type Output = Vec3;
    fn add(self, o: Vec3) -> Vec3 {
        Vec3::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }
}
impl std::ops::Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, o: Vec3) -> Vec3 {
        Vec3::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }
}
impl std::ops::Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}
impl std::ops::AddAssign for Vec3 {
    fn add_assign(&mut self, o: Vec3) {
        *self = *self + o;
    }
}
impl std::ops::Mul<Vec3> for f64 {
    type Output = Vec3;
    fn mul(self, v: Vec3) -> Vec3 {
        Vec3::new(self * v.x, self * v.y, self * v.z)
    }
}

/// A 3x3 column-major matrix.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Mat33 {
    pub ex: Vec3,
    pub ey: Vec3,
    pub ez: Vec3,
}

impl Mat33 {
    #[inline]
    pub fn zero() -> Self {
        Mat33::default()
    }

    #[inline]
    pub fn mul_vec(&self, v: Vec3) -> Vec3 {
        v.x * self.ex + v.y * self.ey + v.z * self.ez
    }

    #[inline]
    pub fn mul_vec2(&self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.ex.x * v.x + self.ey.x * v.y,
            self.ex.y * v.x + self.ey.y * v.y,
        )
    }

    /// Solve `A * x = b`. A singular matrix yields zero.
    pub fn solve33(&self, b: Vec3) -> Vec3 {
        let mut det = self.ex.dot(self.ey.cross(self.ez));
        if det != 0.0 {
            det = 1.0 / det;
        }
        Vec3::new(
            det * b.dot(self.ey.cross(self.ez)),
            det * self.ex.dot(b.cross(self.ez)),
            det * self.ex.dot(self.ey.cross(b)),
        )
    }

    /// Solve the upper-left 2x2 block of `A * x = b`.
    pub fn solve22(&self, b: Vec2) -> Vec2 {
        let (a11, a12, a21, a22) = (self.ex.x, self.ey.x, self.ex.y, self.ey.y);
        let mut det = a11 * a22 - a12 * a21;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Vec2::new(
            det * (a22 * b.x - a12 * b.y),
            det * (a11 * b.y - a21 * b.x),
        )
    }

    /// Inverse of the upper-left 2x2 block, padded with zeros.
    pub fn get_inverse22(&self) -> Mat33 {
        let (a, b, c, d) = (self.ex.x, self.ey.x, self.ex.y, self.ey.y);
        let mut det = a * d - b * c;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Mat33 {
            ex: Vec3::new(det * d, -det * c, 0.0),
            ey: Vec3::new(-det * b, det * a, 0.0),
            ez: Vec3::zero(),
        }
    }

    /// Inverse of a symmetric matrix. A singular matrix yields zero.
    pub fn get_sym_inverse33(&self) -> Mat33 {
        let mut det = self.ex.dot(self.ey.cross(self.ez));
        if det != 0.0 {
            det = 1.0 / det;
        }

        let (a11, a12, a13) = (self.ex.x, self.ey.x, self.ez.x);
        let (a22, a23) = (self.ey.y, self.ez.y);
        let a33 = self.ez.z;

        let ex = Vec3::new(
            det * (a22 * a33 - a23 * a23),
            det * (a13 * a23 - a12 * a33),
            det * (a12 * a23 - a13 * a22),
        );
        let ey = Vec3::new(ex.y, det * (a11 * a33 - a13 * a13), det * (a13 * a12 - a11 * a23));
        let ez = Vec3::new(ex.z, ey.z, det * (a11 * a22 - a12 * a12));
        Mat33 { ex, ey, ez }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec2, b: Vec2) -> bool {
        (a - b).mag() < 1e-9
    }

    #[test]
    fn transform_roundtrip() {
        let xf = Transform::from_angle(Vec2::new(1.0, -2.0), 0.7);
        let p = Vec2::new(3.0, 4.0);
        assert!(approx(xf.apply_inv(xf.apply(p)), p));

        let other = Transform::from_angle(Vec2::new(-5.0, 0.5), -1.3);
        let rel = xf.mul_inv(&other);
        assert!(approx(xf.mul(&rel).apply(p), other.apply(p)));
    }

    #[test]
    fn rotation_angle() {
        let q = Rot::from_angle(2.5);
        assert!((q.angle() - 2.5).abs() < 1e-12);
        assert!((Angle::from(q).deg() - 2.5f64.to_degrees()).abs() < 1e-9);
        assert!(approx(q.apply_inv(q.apply(Vec2::unit_x())), Vec2::unit_x()));
    }

    #[test]
    fn degrees_and_radians_convert() {
        assert!((Angle::Deg(90.0).rad() - PI / 2.0).abs() < 1e-12);
        assert!((Angle::Rad(PI).deg() - 180.0).abs() < 1e-12);
        assert_eq!(Angle::from(0.25), Angle::Rad(0.25));
        let q: Rot = Angle::Deg(-45.0).into();
        assert!((q.angle() + PI / 4.0).abs() < 1e-12);
    }

    #[test]
    fn cross_helpers_agree_with_normals() {
        let v = Vec2::new(2.0, 3.0);
        assert!(approx(cross_sv(1.0, v), left_normal(v)));
        assert!(approx(cross_vs(v, 1.0), right_normal(v)));
        assert_eq!(cross(Vec2::unit_x(), Vec2::unit_y()), 1.0);
    }

    #[test]
    fn sweep_advance_and_interpolate() {
        let mut sweep = Sweep {
            local_center: Vec2::zero(),
            c0: Vec2::zero(),
            c: Vec2::new(10.0, 0.0),
            a0: 0.0,
            a: 1.0,
            alpha0: 0.0,
        };
        let mid = sweep.get_transform(0.5);
        assert!(approx(mid.p, Vec2::new(5.0, 0.0)));
        sweep.advance(0.5);
        assert!(approx(sweep.c0, Vec2::new(5.0, 0.0)));
        assert!((sweep.a0 - 0.5).abs() < 1e-12);
    }

    #[test]
    fn matrix_solvers() {
        let m = Mat22::new(Vec2::new(4.0, 1.0), Vec2::new(2.0, 3.0));
        let x = Vec2::new(0.5, -2.0);
        assert!(approx(m.solve(m.mul_vec(x)), x));
        assert!(approx(m.inverse().mul_vec(m.mul_vec(x)), x));

        let m3 = Mat33 {
            ex: Vec3::new(4.0, 1.0, 0.5),
            ey: Vec3::new(1.0, 3.0, 0.2),
            ez: Vec3::new(0.5, 0.2, 2.0),
        };
        let x3 = Vec3::new(1.0, -1.0, 2.0);
        let sol = m3.solve33(m3.mul_vec(x3));
        assert!((sol - x3).dot(sol - x3) < 1e-18);
        let inv = m3.get_sym_inverse33();
        let back = inv.mul_vec(m3.mul_vec(x3));
        assert!((back - x3).dot(back - x3) < 1e-18);
    }
}
