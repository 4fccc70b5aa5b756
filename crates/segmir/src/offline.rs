//! Kinematics and pose fitting over recorded actuator lengths.
//!
//! Measurements are plain JSON lists of `{ "position": 1121, "lengths": [..6] }`.

use std::fs;
use std::path::Path;

use segmir_control::{fit_mirror_pose, FitError, FitParams, PanelSample, PoseFit};
use segmir_core::{FrameEngine, FrameError, GeometryError, KinematicsError, PadTriangle, Pose};
use segmir_topology::{PanelPosition, TopologyError};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum OfflineError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Kinematics(#[from] KinematicsError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Fit(#[from] FitError),
}

/// Actuator lengths read from one panel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeasuredPanel {
    pub position: PanelPosition,
    /// Lengths of actuators 0..6, mm.
    pub lengths: [f64; 6],
}

/// Forward solution of one measured panel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PanelReport {
    pub position: PanelPosition,
    pub pose: Pose,
    pub pads_panel_frame: PadTriangle,
    pub pads_telescope_frame: PadTriangle,
    pub iterations: usize,
}

pub fn load_measurements(path: impl AsRef<Path>) -> Result<Vec<MeasuredPanel>, OfflineError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn write_measurements(path: impl AsRef<Path>, panels: &[MeasuredPanel]) -> Result<(), OfflineError> {
    fs::write(path, serde_json::to_string_pretty(panels)?)?;
    Ok(())
}

/// Nominal actuator lengths for every panel of every ring.
pub fn nominal_measurements(engine: &FrameEngine) -> Result<Vec<MeasuredPanel>, OfflineError> {
    let mut out = Vec::new();
    for ring in 1..=engine.topology().rings.len() as u32 {
        for position in engine.topology().ring_positions(ring)? {
            let lengths = engine.platform(position)?.geometry().nominal_lengths();
            out.push(MeasuredPanel { position, lengths });
        }
    }
    Ok(out)
}

/// Solve the pose and pad positions of one measured panel.
pub fn solve_panel(engine: &FrameEngine, panel: &MeasuredPanel) -> Result<PanelReport, OfflineError> {
    let solution = engine
        .platform(panel.position)?
        .pose_from_actuator_lengths(&panel.lengths)?;
    Ok(PanelReport {
        position: panel.position,
        pose: solution.pose,
        pads_telescope_frame: engine.pads_to_telescope_frame(panel.position, &solution.pads)?,
        pads_panel_frame: solution.pads,
        iterations: solution.iterations,
    })
}

/// Actuator lengths that put the panel at `position` into `pose`.
pub fn lengths_for_pose(
    engine: &FrameEngine,
    position: PanelPosition,
    pose: &Pose,
) -> Result<MeasuredPanel, OfflineError> {
    let platform = engine.platform(position)?;
    let lengths = platform.actuator_lengths_from_pads(&platform.pads_from_pose(pose))?;
    Ok(MeasuredPanel { position, lengths })
}

/// Fit the global mirror pose to a set of measured panels.
pub fn fit_measurements(
    engine: &FrameEngine,
    panels: &[MeasuredPanel],
    params: &FitParams,
) -> Result<PoseFit, OfflineError> {
    let samples = panels
        .iter()
        .map(|p| PanelSample::from_lengths(engine, p.position, &p.lengths))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(fit_mirror_pose(&samples, params)?)
}
