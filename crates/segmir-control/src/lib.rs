//! Control layer of a segmented mirror.
//!
//! A [`Mirror`] owns its panel and edge devices, keeps operator selections
//! over them, moves panels as one rigid body, aligns rings edge by edge and
//! fits the global pose of the whole surface. Hardware is reached only
//! through the [`Device`] trait.
//!
//! ```no_run
//! use segmir_control::{ControlParams, DeviceKind, Mirror};
//! use segmir_core::{MirrorGeometry, Pose};
//!
//! let geometry = MirrorGeometry::primary()?;
//! let mut mirror = Mirror::new(&geometry, ControlParams::default())?;
//! // attach panels and edges supplied by the hardware layer here
//! mirror.select_children(DeviceKind::Panel, "[1121, 1122, 1123]");
//! let report = mirror.move_selected_panels(&Pose::translation_only(0.0, 0.0, 0.5));
//! report.into_result()?;
//! let fit = mirror.fit_pose()?;
//! println!("mirror pose {:?}", fit.pose);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod align;
mod clock;
mod controller;
mod device;
mod error;
mod fit;
mod mirror;
mod params;
mod report;
mod selection;
mod tree;

pub use align::{AlignmentOutcome, AlignmentReport};
pub use clock::{Clock, SystemClock};
pub use controller::MirrorController;
pub use device::{
    edge as edge_offsets, mirror as mirror_offsets, panel as panel_offsets, pose_field, Device,
    DeviceError, DeviceKind, DeviceState, Identity, StateHandle, Value,
};
pub use error::{ErrorKind, MirrorError};
pub use fit::{fit_mirror_pose, FitError, PanelSample, PoseFit};
pub use mirror::{Mirror, MotionPlan};
pub use params::{AlignmentParams, Bound, ConfigError, ControlParams, FitParams};
pub use report::BatchReport;
pub use selection::{parse_identity, render_selection, resolve_selection, tokenize};
pub use tree::DeviceTree;
