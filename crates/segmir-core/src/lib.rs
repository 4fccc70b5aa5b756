//! Geometry and kinematics of a segmented telescope mirror.
//!
//! This crate is purely numeric: it converts actuator lengths to panel poses
//! and back, and moves pad coordinates between each panel's own reference
//! frame and the shared telescope frame. It knows nothing about devices.
//!
//! ```
//! use segmir_core::{FrameEngine, MirrorGeometry, SolverParams};
//! use segmir_topology::PanelPosition;
//!
//! let geometry = MirrorGeometry::primary()?;
//! let engine = FrameEngine::new(&geometry, &SolverParams::default())?;
//! let pos = PanelPosition::new(1121)?;
//! let platform = engine.platform(pos)?;
//! let nominal = platform.nominal_solution()?;
//! let pads = engine.pads_to_telescope_frame(pos, &nominal.pads)?;
//! println!("pad 0 of {pos} sits at {:?}", pads.pad(0));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod frames;
mod geometry;
mod influence;
mod kinematics;
mod logger;
mod pose;

pub use frames::{FrameEngine, FrameError, PanelFrame};
pub use geometry::{
    ideal_panel_basis, AsphericSurface, GeometryError, MirrorGeometry, MirrorKind, OpticalSurface,
    RingGeometry,
};
pub use influence::{influence_matrix, ROTATION_STEP, TRANSLATION_STEP};
pub use kinematics::{
    KinematicsError, PanelType, PlatformSolution, SolverParams, StewartGeometry, StewartPlatform,
};
pub use pose::{
    apply_rigid_motion, motion_rotation, rotation_derivative, rotation_matrix, Axis, PadTriangle,
    Pose,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_from_env, init_with_level, LOG_ENV};
