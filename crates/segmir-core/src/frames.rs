//! Panel ↔ telescope reference frames.
//!
//! Every ring shares one ideal panel frame, computed once for the panel
//! centred on the -X axis. A concrete panel's frame is the ideal one turned
//! about the telescope Z axis by that panel's azimuthal offset.

use std::f64::consts::{PI, TAU};

use log::debug;
use nalgebra::{Matrix3, Vector3};
use segmir_topology::{MirrorTopology, PanelPosition, TopologyError};
use serde::{Deserialize, Serialize};

use crate::geometry::{ideal_panel_basis, GeometryError, MirrorGeometry};
use crate::kinematics::{KinematicsError, SolverParams, StewartPlatform};
use crate::pose::{rotation_matrix, Axis, PadTriangle};

/// Frame of the ideal panel of one ring.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PanelFrame {
    /// Base-triangle point of the ideal panel, telescope frame.
    pub origin: Vector3<f64>,
    /// Panel frame axes as columns.
    pub basis: Matrix3<f64>,
    /// Azimuth spanned by one panel, radians.
    pub panel_width: f64,
    /// Azimuth of the first panel relative to the ideal panel.
    pub panel_offset: f64,
}

/// Errors returned by the frame engine.
#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Kinematics(#[from] KinematicsError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Per-ring frames, ideal pads and actuator platforms of one mirror.
#[derive(Clone, Debug)]
pub struct FrameEngine {
    topology: MirrorTopology,
    frames: Vec<PanelFrame>,
    ideal_pads: Vec<PadTriangle>,
    platforms: Vec<StewartPlatform>,
}

impl FrameEngine {
    pub fn new(geometry: &MirrorGeometry, solver: &SolverParams) -> Result<Self, FrameError> {
        geometry.validate()?;
        let topology = geometry.topology()?;

        let mut frames = Vec::with_capacity(geometry.rings.len());
        let mut platforms = Vec::with_capacity(geometry.rings.len());
        for (i, ring) in geometry.rings.iter().enumerate() {
            let platform = StewartPlatform::new(geometry.platform_for(ring), solver.clone())?;

            let centroid = ring.ideal_pads.centroid();
            let basis = ideal_panel_basis(&geometry.surface, &centroid, geometry.normal_direction)?;
            // Shift from the optical surface down to the base triangle.
            let center = platform.nominal_solution()?.pose.translation();
            let origin = centroid - basis * center;

            let panel_width = TAU / ring.panels as f64;
            debug!(
                "ring {}: {} panels, origin [{:.2}, {:.2}, {:.2}]",
                i + 1,
                ring.panels,
                origin.x,
                origin.y,
                origin.z
            );
            frames.push(PanelFrame {
                origin,
                basis,
                panel_width,
                panel_offset: PI - panel_width / 2.0,
            });
            platforms.push(platform);
        }

        Ok(Self {
            topology,
            frames,
            ideal_pads: geometry.rings.iter().map(|r| r.ideal_pads).collect(),
            platforms,
        })
    }

    #[inline]
    pub fn topology(&self) -> &MirrorTopology {
        &self.topology
    }

    /// Frame of the ideal panel on `ring` (1-based).
    pub fn frame(&self, ring: u32) -> Option<&PanelFrame> {
        self.frames.get((ring as usize).wrapping_sub(1))
    }

    fn ring_index(&self, pos: PanelPosition) -> Result<usize, TopologyError> {
        self.topology.residue(pos)?;
        Ok(pos.ring() as usize - 1)
    }

    /// Actuator platform for the panel at `pos`.
    pub fn platform(&self, pos: PanelPosition) -> Result<&StewartPlatform, FrameError> {
        Ok(&self.platforms[self.ring_index(pos)?])
    }

    /// Azimuth of the panel at `pos` relative to the ideal panel.
    ///
    /// Panel numbers grow clockwise, against positive rotation about Z.
    pub fn azimuthal_offset(&self, pos: PanelPosition) -> Result<f64, FrameError> {
        let residue = self.topology.residue(pos)?;
        let frame = &self.frames[pos.ring() as usize - 1];
        Ok(frame.panel_offset - residue as f64 * frame.panel_width)
    }

    /// Basis and origin of the panel at `pos` in the telescope frame.
    pub fn panel_axes(&self, pos: PanelPosition) -> Result<(Matrix3<f64>, Vector3<f64>), FrameError> {
        let frame = &self.frames[self.ring_index(pos)?];
        let turn = rotation_matrix(Axis::Z, self.azimuthal_offset(pos)?);
        Ok((turn * frame.basis, turn * frame.origin))
    }

    pub fn to_telescope_frame(&self, pos: PanelPosition, point: &Vector3<f64>) -> Result<Vector3<f64>, FrameError> {
        let (basis, origin) = self.panel_axes(pos)?;
        Ok(origin + basis * point)
    }

    pub fn to_panel_frame(&self, pos: PanelPosition, point: &Vector3<f64>) -> Result<Vector3<f64>, FrameError> {
        let (basis, origin) = self.panel_axes(pos)?;
        Ok(basis.transpose() * (point - origin))
    }

    pub fn pads_to_telescope_frame(&self, pos: PanelPosition, pads: &PadTriangle) -> Result<PadTriangle, FrameError> {
        let (basis, origin) = self.panel_axes(pos)?;
        Ok(pads.map(|p| origin + basis * p))
    }

    pub fn pads_to_panel_frame(&self, pos: PanelPosition, pads: &PadTriangle) -> Result<PadTriangle, FrameError> {
        let (basis, origin) = self.panel_axes(pos)?;
        let inv = basis.transpose();
        Ok(pads.map(|p| inv * (p - origin)))
    }

    /// Where the pads of the panel at `pos` sit on a perfect mirror.
    pub fn ideal_pads_telescope_frame(&self, pos: PanelPosition) -> Result<PadTriangle, FrameError> {
        let index = self.ring_index(pos)?;
        let turn = rotation_matrix(Axis::Z, self.azimuthal_offset(pos)?);
        Ok(self.ideal_pads[index].map(|p| turn * p))
    }
}
