//! Cross-panel influence of a motion.
//!
//! Moving one panel's reference frame by a small step drags any pads
//! expressed in that frame along. Re-expressing those pads in a neighbor's
//! own frame and solving its kinematics tells how a motion commanded for one
//! panel looks from the other. The resulting 6x6 matrix is what systematic
//! edge offsets are calibrated against.

use nalgebra::Matrix6;
use segmir_topology::PanelPosition;

use crate::frames::{FrameEngine, FrameError};
use crate::pose::{apply_rigid_motion, Pose};

/// Rotation step used per rotational column: 1 mm of arc at the pad radius.
pub const ROTATION_STEP: f64 = 1.0 / 320.0;
/// Translation step used per translational column, mm.
pub const TRANSLATION_STEP: f64 = 1.0;

/// Response of panel `target`'s pose (in its own frame) to unit motions of
/// panel `source`'s frame.
///
/// Column `j` is the change in `target`'s pose when `source` moves by
/// [`TRANSLATION_STEP`] along axis `j` (`j < 3`) or by [`ROTATION_STEP`] about
/// axis `j - 3`.
pub fn influence_matrix(
    engine: &FrameEngine,
    source: PanelPosition,
    target: PanelPosition,
) -> Result<Matrix6<f64>, FrameError> {
    let platform = engine.platform(target)?;
    let ideal = engine.ideal_pads_telescope_frame(target)?;
    let reference = platform
        .pose_from_pads(&engine.pads_to_panel_frame(target, &ideal)?)?
        .pose
        .to_vector6();

    let mut response = Matrix6::zeros();
    for j in 0..6 {
        let mut step = [0.0; 6];
        step[j] = if j < 3 { TRANSLATION_STEP } else { ROTATION_STEP };
        let motion = Pose::from_array(step);

        let in_source = engine.pads_to_panel_frame(source, &ideal)?;
        let moved = engine.pads_to_telescope_frame(source, &in_source.map(|p| apply_rigid_motion(p, &motion)))?;
        let in_target = engine.pads_to_panel_frame(target, &moved)?;
        let pose = platform.pose_from_pads(&in_target)?.pose.to_vector6();
        response.set_column(j, &(pose - reference));
    }
    Ok(response)
}
