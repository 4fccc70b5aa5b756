//! Global rigid-body pose of the mirror.
//!
//! Every selected panel contributes three pads: where the actuators say the
//! pad is, and where the pad of a perfect mirror would be. The fit looks for
//! the one rigid motion of the perfect mirror that best explains the measured
//! pads, in the least-squares sense, with each of the six parameters kept
//! inside a box.

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use log::{debug, warn};
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn, Matrix3, Vector3};
use segmir_core::{
    apply_rigid_motion, rotation_derivative, rotation_matrix, Axis, FrameEngine, FrameError, PadTriangle, Pose,
};
use segmir_topology::PanelPosition;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::params::{Bound, FitParams};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("no panels to fit")]
    NoData,
    #[error("bound {index} must satisfy lower <= 0 <= upper and lower < upper")]
    InvalidBounds { index: usize },
    #[error("pose fit did not converge: {reason}")]
    DidNotConverge { reason: String },
}

/// Measured and ideal pads of one panel, both in the telescope frame.
#[derive(Clone, Debug, PartialEq)]
pub struct PanelSample {
    pub position: PanelPosition,
    pub actual: PadTriangle,
    pub ideal: PadTriangle,
}

impl PanelSample {
    /// Sample of the panel at `position` from its measured actuator lengths.
    pub fn from_lengths(
        engine: &FrameEngine,
        position: PanelPosition,
        lengths: &[f64; 6],
    ) -> Result<Self, FrameError> {
        let solution = engine.platform(position)?.pose_from_actuator_lengths(lengths)?;
        Ok(Self {
            position,
            actual: engine.pads_to_telescope_frame(position, &solution.pads)?,
            ideal: engine.ideal_pads_telescope_frame(position)?,
        })
    }
}

/// Fitted mirror pose.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseFit {
    pub pose: Pose,
    /// One-sigma parameter errors from the inverse normal matrix.
    pub uncertainty: Pose,
    /// Sum of squared pad residuals at the optimum, mm^2.
    pub cost: f64,
    pub evaluations: usize,
    pub panels: usize,
}

/// Sine mapping of an unbounded internal parameter onto `[lower, upper]`.
fn to_external(bound: &Bound, internal: f64) -> f64 {
    bound.lower + (bound.upper - bound.lower) / 2.0 * (internal.sin() + 1.0)
}

fn to_internal(bound: &Bound, external: f64) -> f64 {
    let ratio = 2.0 * (external - bound.lower) / (bound.upper - bound.lower) - 1.0;
    ratio.clamp(-1.0, 1.0).asin()
}

fn external_derivative(bound: &Bound, internal: f64) -> f64 {
    (bound.upper - bound.lower) / 2.0 * internal.cos()
}

fn residuals_at(samples: &[PanelSample], pose: &Pose) -> DVector<f64> {
    let mut r = DVector::zeros(samples.len() * 9);
    for (s, sample) in samples.iter().enumerate() {
        for pad in 0..3 {
            let moved = apply_rigid_motion(&sample.ideal.pad(pad), pose);
            let diff = sample.actual.pad(pad) - moved;
            r.fixed_rows_mut::<3>(s * 9 + pad * 3).copy_from(&diff);
        }
    }
    r
}

/// Jacobian of [`residuals_at`] with respect to the six pose parameters.
fn pose_jacobian(samples: &[PanelSample], pose: &Pose) -> DMatrix<f64> {
    let rx = rotation_matrix(Axis::X, pose.rot_x);
    let ry = rotation_matrix(Axis::Y, pose.rot_y);
    let rz = rotation_matrix(Axis::Z, pose.rot_z);
    let partials: [Matrix3<f64>; 3] = [
        ry * rotation_derivative(Axis::X, pose.rot_x) * rz,
        rotation_derivative(Axis::Y, pose.rot_y) * rx * rz,
        ry * rx * rotation_derivative(Axis::Z, pose.rot_z),
    ];

    let mut jac = DMatrix::zeros(samples.len() * 9, 6);
    for (s, sample) in samples.iter().enumerate() {
        for pad in 0..3 {
            let row = s * 9 + pad * 3;
            let ideal = sample.ideal.pad(pad);
            jac.fixed_view_mut::<3, 3>(row, 0).copy_from(&-Matrix3::identity());
            for (c, partial) in partials.iter().enumerate() {
                let d: Vector3<f64> = -(partial * ideal);
                jac.fixed_view_mut::<3, 1>(row, 3 + c).copy_from(&d);
            }
        }
    }
    jac
}

struct PoseFitProblem<'a> {
    samples: &'a [PanelSample],
    bounds: &'a [Bound; 6],
    params: DVector<f64>,
}

impl PoseFitProblem<'_> {
    fn pose(&self) -> Pose {
        Pose::from_array(std::array::from_fn(|i| to_external(&self.bounds[i], self.params[i])))
    }
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for PoseFitProblem<'_> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        Some(residuals_at(self.samples, &self.pose()))
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let mut jac = pose_jacobian(self.samples, &self.pose());
        for i in 0..6 {
            let scale = external_derivative(&self.bounds[i], self.params[i]);
            jac.column_mut(i).scale_mut(scale);
        }
        Some(jac)
    }
}

/// Fit the mirror pose to the given panels, starting from zero.
#[cfg_attr(feature = "tracing", instrument(level = "info", skip(samples, params), fields(panels = samples.len())))]
pub fn fit_mirror_pose(samples: &[PanelSample], params: &FitParams) -> Result<PoseFit, FitError> {
    if samples.is_empty() {
        return Err(FitError::NoData);
    }
    for (index, b) in params.bounds.iter().enumerate() {
        if !(b.lower < b.upper && b.lower <= 0.0 && b.upper >= 0.0) {
            return Err(FitError::InvalidBounds { index });
        }
    }

    let start = DVector::from_iterator(6, params.bounds.iter().map(|b| to_internal(b, 0.0)));
    let lm = LevenbergMarquardt::new()
        .with_ftol(params.ftol)
        .with_xtol(params.xtol)
        .with_gtol(params.gtol)
        .with_patience(params.patience.max(1));
    let problem = PoseFitProblem {
        samples,
        bounds: &params.bounds,
        params: start,
    };

    let (problem, report) = lm.minimize(problem);
    if !report.termination.was_successful() {
        return Err(FitError::DidNotConverge {
            reason: format!("{:?}", report.termination),
        });
    }

    let pose = problem.pose();
    let cost = residuals_at(samples, &pose).norm_squared();
    let jac = pose_jacobian(samples, &pose);
    let uncertainty = match (jac.transpose() * &jac).try_inverse() {
        Some(cov) => Pose::from_array(std::array::from_fn(|i| cov[(i, i)].max(0.0).sqrt())),
        None => {
            warn!("pose fit normal matrix is singular; uncertainties unavailable");
            Pose::from_array([f64::INFINITY; 6])
        }
    };
    debug!(
        "pose fit over {} panels: cost {:.3e} after {} evaluations",
        samples.len(),
        cost,
        report.number_of_evaluations
    );

    Ok(PoseFit {
        pose,
        uncertainty,
        cost,
        evaluations: report.number_of_evaluations,
        panels: samples.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use segmir_core::{FrameEngine, MirrorGeometry, SolverParams};

    fn samples(motion: &Pose) -> Vec<PanelSample> {
        let geometry = MirrorGeometry::primary().expect("geometry");
        let engine = FrameEngine::new(&geometry, &SolverParams::default()).expect("engine");
        let mut out = Vec::new();
        for ring in 1..=2 {
            for position in engine.topology().ring_positions(ring).expect("ring").into_iter().step_by(3) {
                let ideal = engine.ideal_pads_telescope_frame(position).expect("ideal");
                out.push(PanelSample {
                    position,
                    actual: ideal.map(|p| apply_rigid_motion(p, motion)),
                    ideal,
                });
            }
        }
        out
    }

    #[test]
    fn bounded_transform_round_trips() {
        let b = Bound::new(-10.0, 40.0);
        for x in [-10.0, -3.0, 0.0, 12.5, 40.0] {
            assert_abs_diff_eq!(to_external(&b, to_internal(&b, x)), x, epsilon = 1e-9);
        }
        assert_abs_diff_eq!(to_external(&b, 123.0).clamp(-10.0, 40.0), to_external(&b, 123.0));
    }

    #[test]
    fn perfect_mirror_fits_to_zero() {
        let fit = fit_mirror_pose(&samples(&Pose::default()), &FitParams::default()).expect("fit");
        assert!(fit.pose.max_abs() < 1e-9, "pose {:?}", fit.pose);
        assert!(fit.cost < 1e-12);
        assert!(fit.uncertainty.max_abs().is_finite());
    }

    #[test]
    fn recovers_a_known_motion() {
        let truth = Pose::new(1.2, -0.8, 5.0, 2e-4, -1e-4, 3e-4);
        let fit = fit_mirror_pose(&samples(&truth), &FitParams::default()).expect("fit");
        for (got, want) in fit.pose.to_array().iter().zip(truth.to_array()) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-6);
        }
        assert!(fit.cost < 1e-8);
        assert_eq!(fit.panels, samples(&truth).len());
    }

    #[test]
    fn jacobian_matches_finite_differences() {
        let data = samples(&Pose::new(0.5, 0.5, 0.5, 1e-3, 1e-3, 1e-3));
        let pose = Pose::new(0.1, -0.2, 0.3, 1e-3, -2e-3, 5e-4);
        let analytic = pose_jacobian(&data, &pose);
        let h = 1e-6;
        for j in 0..6 {
            let mut plus = pose;
            let mut minus = pose;
            plus.set(j, pose.get(j).unwrap_or_default() + h);
            minus.set(j, pose.get(j).unwrap_or_default() - h);
            let numeric = (residuals_at(&data, &plus) - residuals_at(&data, &minus)) / (2.0 * h);
            for i in 0..numeric.len() {
                assert_abs_diff_eq!(analytic[(i, j)], numeric[i], epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn empty_selection_is_rejected() {
        assert_eq!(fit_mirror_pose(&[], &FitParams::default()), Err(FitError::NoData));
    }

    #[test]
    fn bounds_must_contain_the_start() {
        let mut params = FitParams::default();
        params.bounds[2] = Bound::new(5.0, 40.0);
        assert_eq!(
            fit_mirror_pose(&samples(&Pose::default()), &params),
            Err(FitError::InvalidBounds { index: 2 })
        );
    }
}
