//! Pose vectors, pad triangles and the rotation convention shared by the
//! kinematics solver, the frame engine and the pose fit.
//!
//! Rotations compose as `R = Ry(rot_y) * Rx(rot_x) * Rz(rot_z)`: a point is
//! turned about Z first, then X, then Y.

use std::ops::{Add, Neg, Sub};

use nalgebra::{Matrix3, Vector3, Vector6};
use serde::{Deserialize, Serialize};

/// Elementary rotation axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Axis for index `0`, `1` or `2`.
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Axis::X),
            1 => Some(Axis::Y),
            2 => Some(Axis::Z),
            _ => None,
        }
    }
}

/// Right-handed elementary rotation by `angle` radians.
pub fn rotation_matrix(axis: Axis, angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    match axis {
        Axis::X => Matrix3::new(1.0, 0.0, 0.0, 0.0, c, -s, 0.0, s, c),
        Axis::Y => Matrix3::new(c, 0.0, s, 0.0, 1.0, 0.0, -s, 0.0, c),
        Axis::Z => Matrix3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0),
    }
}

/// Derivative of [`rotation_matrix`] with respect to `angle`.
pub fn rotation_derivative(axis: Axis, angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    match axis {
        Axis::X => Matrix3::new(0.0, 0.0, 0.0, 0.0, -s, -c, 0.0, c, -s),
        Axis::Y => Matrix3::new(-s, 0.0, c, 0.0, 0.0, 0.0, -c, 0.0, -s),
        Axis::Z => Matrix3::new(-s, -c, 0.0, c, -s, 0.0, 0.0, 0.0, 0.0),
    }
}

/// Rotation of a pose: `Ry(rot_y) * Rx(rot_x) * Rz(rot_z)`.
pub fn motion_rotation(rot_x: f64, rot_y: f64, rot_z: f64) -> Matrix3<f64> {
    rotation_matrix(Axis::Y, rot_y) * rotation_matrix(Axis::X, rot_x) * rotation_matrix(Axis::Z, rot_z)
}

/// Rigid-body pose or motion: translation in mm, rotations in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub rot_x: f64,
    pub rot_y: f64,
    pub rot_z: f64,
}

impl Pose {
    pub const fn new(x: f64, y: f64, z: f64, rot_x: f64, rot_y: f64, rot_z: f64) -> Self {
        Self {
            x,
            y,
            z,
            rot_x,
            rot_y,
            rot_z,
        }
    }

    pub const fn translation_only(x: f64, y: f64, z: f64) -> Self {
        Self::new(x, y, z, 0.0, 0.0, 0.0)
    }

    #[inline]
    pub fn translation(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    #[inline]
    pub fn rotation(&self) -> Matrix3<f64> {
        motion_rotation(self.rot_x, self.rot_y, self.rot_z)
    }

    pub fn to_array(&self) -> [f64; 6] {
        [self.x, self.y, self.z, self.rot_x, self.rot_y, self.rot_z]
    }

    pub fn from_array(v: [f64; 6]) -> Self {
        Self::new(v[0], v[1], v[2], v[3], v[4], v[5])
    }

    pub fn to_vector6(&self) -> Vector6<f64> {
        Vector6::from(self.to_array())
    }

    pub fn from_vector6(v: &Vector6<f64>) -> Self {
        Self::new(v[0], v[1], v[2], v[3], v[4], v[5])
    }

    /// Component `i` in `x, y, z, rot_x, rot_y, rot_z` order.
    pub fn get(&self, i: usize) -> Option<f64> {
        self.to_array().get(i).copied()
    }

    /// Overwrite component `i`; returns `false` if out of range.
    pub fn set(&mut self, i: usize, value: f64) -> bool {
        let mut v = self.to_array();
        match v.get_mut(i) {
            Some(slot) => {
                *slot = value;
                *self = Self::from_array(v);
                true
            }
            None => false,
        }
    }

    /// Largest absolute component.
    pub fn max_abs(&self) -> f64 {
        self.to_array().iter().fold(0.0_f64, |m, v| m.max(v.abs()))
    }
}

impl Add for Pose {
    type Output = Pose;

    fn add(self, rhs: Pose) -> Pose {
        Pose::from_vector6(&(self.to_vector6() + rhs.to_vector6()))
    }
}

impl Sub for Pose {
    type Output = Pose;

    fn sub(self, rhs: Pose) -> Pose {
        Pose::from_vector6(&(self.to_vector6() - rhs.to_vector6()))
    }
}

impl Neg for Pose {
    type Output = Pose;

    fn neg(self) -> Pose {
        Pose::from_vector6(&-self.to_vector6())
    }
}

/// Rotate `point` by the motion's rotation, then translate it.
pub fn apply_rigid_motion(point: &Vector3<f64>, motion: &Pose) -> Vector3<f64> {
    motion.rotation() * point + motion.translation()
}

/// The three actuator pads of one panel, stored as matrix columns.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[[f64; 3]; 3]", into = "[[f64; 3]; 3]")]
pub struct PadTriangle {
    pads: Matrix3<f64>,
}

impl PadTriangle {
    pub fn new(p0: Vector3<f64>, p1: Vector3<f64>, p2: Vector3<f64>) -> Self {
        Self {
            pads: Matrix3::from_columns(&[p0, p1, p2]),
        }
    }

    pub fn from_matrix(pads: Matrix3<f64>) -> Self {
        Self { pads }
    }

    #[inline]
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.pads
    }

    /// Pad `i`, `i` in `0..3`.
    #[inline]
    pub fn pad(&self, i: usize) -> Vector3<f64> {
        self.pads.column(i).into_owned()
    }

    pub fn pads(&self) -> [Vector3<f64>; 3] {
        [self.pad(0), self.pad(1), self.pad(2)]
    }

    pub fn centroid(&self) -> Vector3<f64> {
        (self.pad(0) + self.pad(1) + self.pad(2)) / 3.0
    }

    /// Apply `f` to every pad.
    pub fn map(&self, mut f: impl FnMut(&Vector3<f64>) -> Vector3<f64>) -> Self {
        let [p0, p1, p2] = self.pads();
        Self::new(f(&p0), f(&p1), f(&p2))
    }

    /// Orthonormal frame attached to the pads.
    ///
    /// X points from pad 1 to the centroid, Z is normal to the pad plane
    /// (right-handed over pads 1, 2, 0), `Y = Z x X`. Returns the frame axes
    /// as matrix columns, or `None` when the pads are collinear.
    pub fn frame(&self) -> Option<Matrix3<f64>> {
        let [p0, p1, p2] = self.pads();
        let x = (self.centroid() - p1).try_normalize(f64::EPSILON)?;
        let z = (p2 - p1).cross(&(p0 - p1)).try_normalize(f64::EPSILON)?;
        let y = z.cross(&x);
        Some(Matrix3::from_columns(&[x, y, z]))
    }
}

impl From<[[f64; 3]; 3]> for PadTriangle {
    fn from(v: [[f64; 3]; 3]) -> Self {
        Self::new(v[0].into(), v[1].into(), v[2].into())
    }
}

impl From<PadTriangle> for [[f64; 3]; 3] {
    fn from(t: PadTriangle) -> Self {
        let [p0, p1, p2] = t.pads();
        [p0.into(), p1.into(), p2.into()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn elementary_rotations_are_orthonormal() {
        for axis in [Axis::X, Axis::Y, Axis::Z] {
            let r = rotation_matrix(axis, 0.3);
            assert_relative_eq!(r * r.transpose(), Matrix3::identity(), epsilon = 1e-12);
            assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-12);
        }
        let z = rotation_matrix(Axis::Z, std::f64::consts::FRAC_PI_2);
        assert_relative_eq!(z * Vector3::x(), Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let h = 1e-6;
        for axis in [Axis::X, Axis::Y, Axis::Z] {
            let numeric = (rotation_matrix(axis, 0.2 + h) - rotation_matrix(axis, 0.2 - h)) / (2.0 * h);
            assert_relative_eq!(rotation_derivative(axis, 0.2), numeric, epsilon = 1e-8);
        }
    }

    #[test]
    fn rigid_motion_rotates_about_z_first() {
        let motion = Pose::new(1.0, 2.0, 3.0, std::f64::consts::FRAC_PI_2, 0.0, std::f64::consts::FRAC_PI_2);
        // Rz sends x to y, then Rx sends y to z.
        let moved = apply_rigid_motion(&Vector3::x(), &motion);
        assert_relative_eq!(moved, Vector3::new(1.0, 2.0, 4.0), epsilon = 1e-12);
    }

    #[test]
    fn pose_components_round_trip_through_indexing() {
        let mut pose = Pose::default();
        for i in 0..6 {
            assert!(pose.set(i, i as f64 + 0.5));
        }
        assert!(!pose.set(6, 1.0));
        assert_eq!(pose.get(3), Some(3.5));
        assert_eq!(pose.get(6), None);
        assert_eq!(pose - pose, Pose::default());
        assert_relative_eq!(pose.max_abs(), 5.5);
    }

    #[test]
    fn pad_frame_of_flat_triangle_is_identity() {
        let angle = |k: f64| k * std::f64::consts::TAU / 3.0 + std::f64::consts::FRAC_PI_3;
        let pad = |k: f64| Vector3::new(320.0 * angle(k).cos(), 320.0 * angle(k).sin(), 0.0);
        let tri = PadTriangle::new(pad(0.0), pad(1.0), pad(2.0));
        let frame = tri.frame().expect("frame");
        assert_relative_eq!(frame, Matrix3::identity(), epsilon = 1e-12);

        let collinear = PadTriangle::new(Vector3::zeros(), Vector3::x(), Vector3::x() * 2.0);
        assert!(collinear.frame().is_none());
    }
}
