//! High-level facade crate for the `segmir-*` workspace.
//!
//! This crate provides:
//! - stable re-exports of the topology, core and control crates
//! - [`offline`] helpers that run the kinematics and the global pose fit on
//!   recorded actuator lengths, without any devices attached
//! - (feature `cli`) the `segmir` command-line tool built on those helpers
//!
//! ## Quickstart
//!
//! ```no_run
//! use segmir::offline::{fit_measurements, load_measurements};
//! use segmir::{FitParams, FrameEngine, MirrorGeometry, SolverParams};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let geometry = MirrorGeometry::primary()?;
//! let engine = FrameEngine::new(&geometry, &SolverParams::default())?;
//! let panels = load_measurements("lengths.json")?;
//! let fit = fit_measurements(&engine, &panels, &FitParams::default())?;
//! println!("mirror pose {:?} +- {:?}", fit.pose, fit.uncertainty);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `segmir::topology`: panel positions, edge addresses, ring neighbors and
//!   the alignment walk order.
//! - `segmir::core`: poses, Stewart-platform kinematics, mirror geometry and
//!   panel/telescope frame transforms.
//! - `segmir::control`: the device trait, the mirror composite, ring
//!   alignment and the global pose fit.
//! - `segmir::offline`: batch helpers over recorded actuator lengths.

pub use segmir_control as control;
pub use segmir_core as core;
pub use segmir_topology as topology;

pub use segmir_control::{
    AlignmentOutcome, ControlParams, Device, DeviceKind, FitParams, Mirror, MirrorController,
    MirrorError, PoseFit,
};
pub use segmir_core::{FrameEngine, MirrorGeometry, MirrorKind, Pose, SolverParams, StewartPlatform};
pub use segmir_topology::{Direction, EdgeAddress, PanelPosition};

pub mod offline;
