//! Stewart-platform kinematics for one panel.
//!
//! Six actuators join a base triangle to the three pads glued to the back of
//! a panel. Actuators `2i` and `2i + 1` drive pad `i`. The solver maps
//! actuator lengths to the pose of the pad triangle (forward, iterative) and
//! pad positions back to actuator lengths (inverse, closed form).
//!
//! All coordinates are in the panel reference frame: base joints lie on a
//! circle at height `joint_thickness`, and the pad frame of the unmoved pad
//! triangle coincides with the panel frame axes.

use std::f64::consts::{FRAC_PI_3, TAU};

use log::{debug, trace};
use nalgebra::{Matrix3, Matrix6, Vector3, Vector6};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::pose::{rotation_derivative, rotation_matrix, Axis, PadTriangle, Pose};

/// Starting rotation about each axis for the forward solve; at exactly zero
/// rotation the first Jacobian can be singular.
const ROTATION_SEED: f64 = 0.1;

/// Panel families with distinct back-surface normals at the pads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelType {
    /// Primary, inner ring.
    P1,
    /// Primary, outer ring.
    P2,
    /// Secondary, inner ring.
    S1,
    /// Secondary, outer ring.
    S2,
    /// Flat optical test panel.
    #[default]
    Opt,
}

impl PanelType {
    /// Unit normals of the back surface at the three pads, in the pad frame,
    /// pointing away from the panel.
    pub fn pad_normals(self) -> [Vector3<f64>; 3] {
        let (a, b, c) = match self {
            PanelType::P1 => (
                [5.097668129476970e-03, 1.047654179548714e-02, -9.999321256223591e-01],
                [-1.139023920803046e-02, 0.0, -9.999351291212767e-01],
                [5.097668129476970e-03, -1.047654179548714e-02, -9.999321256223591e-01],
            ),
            PanelType::P2 => (
                [2.282953930408088e-03, 9.607558782302985e-03, -9.999512402790428e-01],
                [-8.576078760768602e-03, 0.0, -9.999632247603353e-01],
                [2.282953930408088e-03, -9.607558782302985e-03, -9.999512402790428e-01],
            ),
            PanelType::S1 => (
                [2.416787326798328e-02, 4.165752266588766e-02, -9.988396091000016e-01],
                [-4.825925442124093e-02, 0.0, -9.988348433863861e-01],
                [2.416787326798328e-02, -4.165752266588766e-02, -9.988396091000016e-01],
            ),
            PanelType::S2 => (
                [2.207153924068211e-02, 4.109652812313958e-02, -9.989113687068392e-01],
                [-4.637346218008032e-02, 0.0, -9.989241723000966e-01],
                [2.207153924068211e-02, -4.109652812313958e-02, -9.989113687068392e-01],
            ),
            PanelType::Opt => ([0.0, 0.0, -1.0], [0.0, 0.0, -1.0], [0.0, 0.0, -1.0]),
        };
        [a.into(), b.into(), c.into()]
    }
}

/// Mechanical dimensions of a panel's actuator platform, in mm.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StewartGeometry {
    pub base_radius: f64,
    pub payload_radius: f64,
    /// Bracket height; two brackets add to the actuator length to give the
    /// axis-to-axis distance.
    pub bracket_height: f64,
    /// Actuator axis to pad.
    pub joint_thickness: f64,
    pub pad_thickness: f64,
    pub panel_thickness: f64,
    /// Actuator length of the unmoved panel.
    pub nominal_length: f64,
    pub panel_type: PanelType,
}

impl Default for StewartGeometry {
    fn default() -> Self {
        Self {
            base_radius: 320.0,
            payload_radius: 320.0,
            bracket_height: 25.4 * 1.875,
            joint_thickness: 73.254,
            pad_thickness: 6.2,
            panel_thickness: 33.4,
            nominal_length: 427.919,
            panel_type: PanelType::Opt,
        }
    }
}

impl StewartGeometry {
    pub fn for_panel_type(panel_type: PanelType) -> Self {
        Self {
            panel_type,
            ..Self::default()
        }
    }

    /// Distance from a pad to its actuator axis along the pad normal.
    #[inline]
    pub fn axis_offset(&self) -> f64 {
        self.joint_thickness + self.pad_thickness + self.panel_thickness
    }

    #[inline]
    pub fn nominal_lengths(&self) -> [f64; 6] {
        [self.nominal_length; 6]
    }

    fn validate(&self) -> Result<(), KinematicsError> {
        let dims = [
            ("base_radius", self.base_radius),
            ("payload_radius", self.payload_radius),
            ("bracket_height", self.bracket_height),
            ("joint_thickness", self.joint_thickness),
            ("pad_thickness", self.pad_thickness),
            ("panel_thickness", self.panel_thickness),
            ("nominal_length", self.nominal_length),
        ];
        for (name, value) in dims {
            if !value.is_finite() || value < 0.0 {
                return Err(KinematicsError::InvalidGeometry { name, value });
            }
        }
        if self.base_radius == 0.0 || self.payload_radius == 0.0 {
            return Err(KinematicsError::InvalidGeometry {
                name: "radius",
                value: 0.0,
            });
        }
        Ok(())
    }
}

/// Newton–Raphson settings for the forward solve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    /// Stop once the summed absolute residual or step drops below this.
    pub tolerance: f64,
    /// Steps below this that stop shrinking are at floating-point resolution.
    pub floor_tolerance: f64,
    pub max_iterations: usize,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            tolerance: 1e-12,
            floor_tolerance: 1e-9,
            max_iterations: 100,
        }
    }
}

/// Errors returned by the kinematics solver.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum KinematicsError {
    #[error("forward kinematics did not converge after {iterations} iterations (residual {residual:.3e})")]
    DidNotConverge { iterations: usize, residual: f64 },
    #[error("singular kinematics jacobian at iteration {iteration}")]
    SingularJacobian { iteration: usize },
    #[error("actuator {index} has invalid length {value}")]
    InvalidLength { index: usize, value: f64 },
    #[error("pad triangle is degenerate")]
    DegeneratePads,
    #[error("invalid platform dimension {name} = {value}")]
    InvalidGeometry { name: &'static str, value: f64 },
}

/// Result of a forward solve.
#[derive(Clone, Debug, PartialEq)]
pub struct PlatformSolution {
    /// Pose of the pad triangle: centroid translation and rotation.
    pub pose: Pose,
    /// Pad positions in the panel frame.
    pub pads: PadTriangle,
    /// Upper actuator axis points.
    pub tips: [Vector3<f64>; 6],
    pub iterations: usize,
}

/// Kinematics of one actuator platform.
#[derive(Clone, Debug)]
pub struct StewartPlatform {
    geometry: StewartGeometry,
    params: SolverParams,
    base: [Vector3<f64>; 6],
    pads: [Vector3<f64>; 3],
    normals: [Vector3<f64>; 3],
    payload: [Vector3<f64>; 6],
}

impl StewartPlatform {
    pub fn new(geometry: StewartGeometry, params: SolverParams) -> Result<Self, KinematicsError> {
        geometry.validate()?;

        let mut base = [Vector3::zeros(); 6];
        for i in 0..3 {
            let angle = TAU * i as f64 / 3.0;
            let joint = Vector3::new(
                geometry.base_radius * angle.cos(),
                geometry.base_radius * angle.sin(),
                geometry.joint_thickness,
            );
            base[2 * i] = joint;
            base[(2 * i + 5) % 6] = joint;
        }

        let pads: [Vector3<f64>; 3] = std::array::from_fn(|i| {
            let angle = TAU * i as f64 / 3.0 + FRAC_PI_3;
            Vector3::new(
                geometry.payload_radius * angle.cos(),
                geometry.payload_radius * angle.sin(),
                0.0,
            )
        });
        let normals = geometry.panel_type.pad_normals();
        let offset = geometry.axis_offset();
        let payload = std::array::from_fn(|k| pads[k / 2] + normals[k / 2] * offset);

        Ok(Self {
            geometry,
            params,
            base,
            pads,
            normals,
            payload,
        })
    }

    #[inline]
    pub fn geometry(&self) -> &StewartGeometry {
        &self.geometry
    }

    #[inline]
    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    #[inline]
    pub fn base_joints(&self) -> &[Vector3<f64>; 6] {
        &self.base
    }

    /// Pads of the unmoved triangle, centered on the origin.
    pub fn reference_pads(&self) -> PadTriangle {
        PadTriangle::new(self.pads[0], self.pads[1], self.pads[2])
    }

    /// Forward solve at the nominal actuator length.
    pub fn nominal_solution(&self) -> Result<PlatformSolution, KinematicsError> {
        self.pose_from_actuator_lengths(&self.geometry.nominal_lengths())
    }

    /// Pads of a pad-triangle pose.
    pub fn pads_from_pose(&self, pose: &Pose) -> PadTriangle {
        let rot = pose.rotation();
        let t = pose.translation();
        self.reference_pads().map(|p| t + rot * p)
    }

    pub fn actuator_lengths_from_pose(&self, pose: &Pose) -> [f64; 6] {
        let rot = pose.rotation();
        let t = pose.translation();
        std::array::from_fn(|k| (t + rot * self.payload[k] - self.base[k]).norm() - 2.0 * self.geometry.bracket_height)
    }

    /// Closed-form inverse kinematics.
    pub fn actuator_lengths_from_pads(&self, pads: &PadTriangle) -> Result<[f64; 6], KinematicsError> {
        let frame = pads.frame().ok_or(KinematicsError::DegeneratePads)?;
        let offset = self.geometry.axis_offset();
        let axes: [Vector3<f64>; 3] =
            std::array::from_fn(|i| pads.pad(i) + frame * self.normals[i] * offset);
        Ok(std::array::from_fn(|k| {
            (axes[k / 2] - self.base[k]).norm() - 2.0 * self.geometry.bracket_height
        }))
    }

    /// Pose of a pad triangle, through the actuator lengths that produce it.
    pub fn pose_from_pads(&self, pads: &PadTriangle) -> Result<PlatformSolution, KinematicsError> {
        let lengths = self.actuator_lengths_from_pads(pads)?;
        self.pose_from_actuator_lengths(&lengths)
    }

    /// Forward kinematics by Newton–Raphson on
    /// `|tip_k(pose) - base_k|^2 = (length_k + 2 * bracket)^2`.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn pose_from_actuator_lengths(&self, lengths: &[f64; 6]) -> Result<PlatformSolution, KinematicsError> {
        let mut axis = [0.0; 6];
        for (k, &len) in lengths.iter().enumerate() {
            let total = len + 2.0 * self.geometry.bracket_height;
            if !total.is_finite() || total <= 0.0 {
                return Err(KinematicsError::InvalidLength { index: k, value: len });
            }
            axis[k] = total;
        }

        let mean_axis = axis.iter().sum::<f64>() / 6.0;
        let lift = self.geometry.joint_thickness + self.geometry.axis_offset() + mean_axis;
        let mut q = Vector6::new(0.0, 0.0, lift, ROTATION_SEED, ROTATION_SEED, ROTATION_SEED);

        let mut residual = f64::INFINITY;
        let mut prev_step = f64::INFINITY;
        for iteration in 1..=self.params.max_iterations {
            let (f, jac) = self.residual_system(&q, &axis);
            residual = f.iter().map(|v| v.abs()).sum();
            if residual < self.params.tolerance {
                return Ok(self.solution(&q, iteration - 1));
            }

            let step = jac
                .lu()
                .solve(&(-f))
                .ok_or(KinematicsError::SingularJacobian { iteration })?;
            q += step;

            let step_size: f64 = step.iter().map(|v| v.abs()).sum();
            trace!("newton iteration {iteration}: residual {residual:.3e}, step {step_size:.3e}");
            if !step_size.is_finite() {
                break;
            }
            if step_size < self.params.tolerance
                || (step_size < self.params.floor_tolerance && step_size >= prev_step)
            {
                return Ok(self.solution(&q, iteration));
            }
            prev_step = step_size;
        }

        debug!(
            "forward kinematics gave up after {} iterations, residual {:.3e}",
            self.params.max_iterations, residual
        );
        Err(KinematicsError::DidNotConverge {
            iterations: self.params.max_iterations,
            residual,
        })
    }

    fn residual_system(&self, q: &Vector6<f64>, axis: &[f64; 6]) -> (Vector6<f64>, Matrix6<f64>) {
        let t = Vector3::new(q[0], q[1], q[2]);
        let rx = rotation_matrix(Axis::X, q[3]);
        let ry = rotation_matrix(Axis::Y, q[4]);
        let rz = rotation_matrix(Axis::Z, q[5]);
        let rot = ry * rx * rz;
        let partials: [Matrix3<f64>; 3] = [
            ry * rotation_derivative(Axis::X, q[3]) * rz,
            rotation_derivative(Axis::Y, q[4]) * rx * rz,
            ry * rx * rotation_derivative(Axis::Z, q[5]),
        ];

        let mut f = Vector6::zeros();
        let mut jac = Matrix6::zeros();
        for k in 0..6 {
            let p = self.payload[k];
            let d = t + rot * p - self.base[k];
            f[k] = d.norm_squared() - axis[k] * axis[k];
            for c in 0..3 {
                jac[(k, c)] = 2.0 * d[c];
                jac[(k, 3 + c)] = 2.0 * d.dot(&(partials[c] * p));
            }
        }
        (f, jac)
    }

    fn solution(&self, q: &Vector6<f64>, iterations: usize) -> PlatformSolution {
        let pose = Pose::from_vector6(q);
        let rot = pose.rotation();
        let t = pose.translation();
        PlatformSolution {
            pose,
            pads: self.pads_from_pose(&pose),
            tips: std::array::from_fn(|k| t + rot * self.payload[k]),
            iterations,
        }
    }
}
