//! The mirror: a composite of panels and edges.

use std::collections::BTreeSet;
use std::sync::Arc;

use log::{debug, info, warn};
use nalgebra::Matrix6;
use segmir_core::{apply_rigid_motion, influence_matrix, FrameEngine, MirrorGeometry, Pose};
use segmir_topology::{path_between, Direction, EdgeAddress, PanelPosition};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::align::{AlignmentContext, AlignmentReport};
use crate::clock::{Clock, SystemClock};
use crate::device::{
    edge, mirror, panel, pose_field, Device, DeviceError, DeviceKind, DeviceState, Identity,
    StateHandle, Value,
};
use crate::error::MirrorError;
use crate::fit::{fit_mirror_pose, PanelSample, PoseFit};
use crate::params::ControlParams;
use crate::report::BatchReport;
use crate::tree::DeviceTree;

/// Poses computed for every selected panel before anything moves.
#[derive(Debug, Default)]
pub struct MotionPlan {
    pub motion: Pose,
    /// Panels whose target pose has been staged on the device.
    pub staged: Vec<(PanelPosition, Pose)>,
    pub failures: Vec<(PanelPosition, MirrorError)>,
}

impl MotionPlan {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Controller of one segmented mirror.
pub struct Mirror {
    engine: FrameEngine,
    tree: DeviceTree,
    state: StateHandle,
    clock: Arc<dyn Clock>,
    params: ControlParams,
    fitted: Option<PoseFit>,
    input: Pose,
    sys_offsets: Pose,
}

impl std::fmt::Debug for Mirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mirror")
            .field("mirror", &self.mirror_digit())
            .field("state", &self.state.get())
            .field("tree", &self.tree)
            .field("fitted", &self.fitted)
            .finish()
    }
}

impl Mirror {
    pub fn new(geometry: &MirrorGeometry, params: ControlParams) -> Result<Self, MirrorError> {
        let engine = FrameEngine::new(geometry, &params.solver)?;
        info!(
            "mirror {} initialised with {} rings",
            geometry.mirror,
            geometry.rings.len()
        );
        Ok(Self {
            engine,
            tree: DeviceTree::new(),
            state: StateHandle::default(),
            clock: Arc::new(SystemClock),
            params,
            fitted: None,
            input: Pose::default(),
            sys_offsets: Pose::default(),
        })
    }

    /// Replace the clock used for settle and poll waits.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[inline]
    pub fn mirror_digit(&self) -> u32 {
        self.engine.topology().mirror
    }

    #[inline]
    pub fn engine(&self) -> &FrameEngine {
        &self.engine
    }

    #[inline]
    pub fn tree(&self) -> &DeviceTree {
        &self.tree
    }

    #[inline]
    pub fn params(&self) -> &ControlParams {
        &self.params
    }

    /// Handle on the mirror state usable from other threads.
    pub fn state_handle(&self) -> StateHandle {
        self.state.clone()
    }

    pub fn attach_child(&mut self, device: Box<dyn Device>) -> Result<usize, MirrorError> {
        let identity = device.identity();
        if let Identity::Panel(pos) = identity {
            self.engine.topology().residue(pos)?;
        }
        self.tree.attach(device)
    }

    /// Replace the selection of `kind`; returns how many children matched.
    pub fn select_children(&mut self, kind: DeviceKind, selector: &str) -> usize {
        let count = self.tree.select(kind, selector);
        debug!("selected {count} {kind:?} children from {selector:?}");
        if kind == DeviceKind::Panel {
            self.fitted = None;
        }
        count
    }

    pub fn select_all(&mut self) {
        self.tree.select_all();
        self.fitted = None;
    }

    pub fn selected_panels(&self) -> Vec<PanelPosition> {
        self.tree.selected_panels()
    }

    pub fn selected_edges(&self) -> BTreeSet<EdgeAddress> {
        self.tree.selected_edges()
    }

    fn stage_panel(&mut self, pos: PanelPosition, motion: &Pose) -> Result<Pose, MirrorError> {
        let lengths = self.tree.actuator_lengths(pos)?;
        let platform = self.engine.platform(pos)?;
        let current = platform.pose_from_actuator_lengths(&lengths)?;

        let moved = self
            .engine
            .pads_to_telescope_frame(pos, &current.pads)?
            .map(|p| apply_rigid_motion(p, motion));
        let target_pads = self.engine.pads_to_panel_frame(pos, &moved)?;
        let target_lengths = platform.actuator_lengths_from_pads(&target_pads)?;
        let target = platform.pose_from_actuator_lengths(&target_lengths)?.pose;

        let identity = Identity::Panel(pos);
        let device = self.tree.panel_mut(pos)?;
        for (i, value) in target.to_array().into_iter().enumerate() {
            device
                .set_data(panel::IN_COORDS + i as u32, Value::Float(value))
                .map_err(MirrorError::device(identity))?;
        }
        Ok(target)
    }

    /// First pass of a move: compute and stage a target pose on every
    /// selected panel. Nothing moves.
    pub fn plan_panel_motion(&mut self, motion: &Pose) -> MotionPlan {
        let mut plan = MotionPlan {
            motion: *motion,
            ..MotionPlan::default()
        };
        for pos in self.tree.selected_panels() {
            match self.stage_panel(pos, motion) {
                Ok(target) => plan.staged.push((pos, target)),
                Err(e) => {
                    warn!("cannot stage panel {pos}: {e}");
                    plan.failures.push((pos, e));
                }
            }
        }
        plan
    }

    /// Second pass of a move: command every staged panel to its target.
    ///
    /// Nothing is moved unless every panel of the plan was staged.
    pub fn execute_motion_plan(&mut self, plan: MotionPlan) -> BatchReport {
        let mut report = BatchReport::new();
        if !plan.is_complete() {
            for (pos, e) in plan.failures {
                report.push(Identity::Panel(pos), Err(e));
            }
            for (pos, _) in plan.staged {
                report.push(Identity::Panel(pos), Err(MirrorError::NotIssued(pos)));
            }
            return report;
        }

        for (pos, _) in plan.staged {
            let identity = Identity::Panel(pos);
            if !self.state.is_on() {
                report.push(identity, Err(MirrorError::NotIssued(pos)));
                continue;
            }
            let result = self.tree.panel_mut(pos).and_then(|device| {
                device
                    .operate(panel::MOVE_TO_COORDS, &[])
                    .map_err(MirrorError::device(identity))
            });
            report.push(identity, result);
        }
        self.fitted = None;
        report
    }

    /// Move every selected panel by a rigid motion of the telescope frame.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    pub fn move_selected_panels(&mut self, motion: &Pose) -> BatchReport {
        let plan = self.plan_panel_motion(motion);
        let report = self.execute_motion_plan(plan);
        info!(
            "moved {}/{} selected panels by {:?}",
            report.succeeded(),
            report.len(),
            motion
        );
        report
    }

    /// Move the selected panels so the fitted mirror pose becomes `target`.
    pub fn move_to_coords(&mut self, target: &Pose) -> Result<BatchReport, MirrorError> {
        let current = self.current_pose()?.pose;
        Ok(self.move_selected_panels(&(*target - current)))
    }

    fn each_selected(&mut self, kind: DeviceKind, command: u32) -> BatchReport {
        let mut report = BatchReport::new();
        for index in self.tree.selected(kind).clone() {
            let Some(identity) = self.tree.identity(index) else {
                continue;
            };
            report.push(identity, self.tree.operate(index, command, &[]));
        }
        report
    }

    pub fn read_all_selected_panel_positions(&mut self) -> BatchReport {
        self.fitted = None;
        self.each_selected(DeviceKind::Panel, panel::READ)
    }

    pub fn read_all_selected_edge_sensors(&mut self) -> BatchReport {
        self.each_selected(DeviceKind::Edge, edge::READ)
    }

    pub fn stop_all_selected_panels(&mut self) -> BatchReport {
        self.each_selected(DeviceKind::Panel, panel::STOP)
    }

    /// Fit the mirror pose to the selected panels.
    pub fn fit_pose(&mut self) -> Result<PoseFit, MirrorError> {
        let mut samples = Vec::new();
        for position in self.tree.selected_panels() {
            let lengths = self.tree.actuator_lengths(position)?;
            samples.push(PanelSample::from_lengths(&self.engine, position, &lengths)?);
        }
        let fit = fit_mirror_pose(&samples, &self.params.fit)?;
        info!("mirror pose {:?} +- {:?}", fit.pose, fit.uncertainty);
        self.fitted = Some(fit.clone());
        Ok(fit)
    }

    /// Last fitted pose, refitted when panels have moved since.
    pub fn current_pose(&mut self) -> Result<PoseFit, MirrorError> {
        match &self.fitted {
            Some(fit) => Ok(fit.clone()),
            None => self.fit_pose(),
        }
    }

    #[inline]
    pub fn is_fit_stale(&self) -> bool {
        self.fitted.is_none()
    }

    /// Align the selected edges, starting at `start` and walking along `dir`.
    pub fn align_from(&mut self, start: EdgeAddress, dir: Direction) -> Result<AlignmentReport, MirrorError> {
        let required = self.tree.selected_edges();
        self.align_edges(start, &required, dir)
    }

    /// Align exactly the edges from `start` to `end` along `dir`.
    pub fn align_between(
        &mut self,
        start: EdgeAddress,
        end: EdgeAddress,
        dir: Direction,
    ) -> Result<AlignmentReport, MirrorError> {
        let path = path_between(self.engine.topology(), start, end, dir)?;
        if let Some(missing) = path.iter().find(|e| !self.tree.contains_edge(e)) {
            return Err(MirrorError::NotFound(Identity::Edge(*missing)));
        }
        let required: BTreeSet<_> = path.into_iter().collect();
        self.align_edges(start, &required, dir)
    }

    fn align_edges(
        &mut self,
        start: EdgeAddress,
        required: &BTreeSet<EdgeAddress>,
        dir: Direction,
    ) -> Result<AlignmentReport, MirrorError> {
        let mut ctx = AlignmentContext {
            tree: &mut self.tree,
            topology: self.engine.topology(),
            state: &self.state,
            clock: self.clock.as_ref(),
            params: &self.params.alignment,
        };
        let report = ctx.align_from(start, required, dir);
        if report.as_ref().map_or(true, |r| r.move_commands > 0) {
            self.fitted = None;
        }
        report
    }

    /// Response of panel `target` to unit motions of panel `source`.
    pub fn influence(&self, source: PanelPosition, target: PanelPosition) -> Result<Matrix6<f64>, MirrorError> {
        Ok(influence_matrix(&self.engine, source, target)?)
    }

    /// Switch the mirror off and stop every selected panel.
    pub fn stop(&mut self) -> BatchReport {
        self.state.stop();
        self.stop_all_selected_panels()
    }

    fn pose_data(&mut self, offset: u32) -> Result<Option<Value>, MirrorError> {
        if let Some(i) = pose_field(mirror::CUR_COORDS, offset) {
            let pose = self.current_pose()?.pose;
            return Ok(pose.get(i).map(Value::Float));
        }
        if let Some(i) = pose_field(mirror::IN_COORDS, offset) {
            return Ok(self.input.get(i).map(Value::Float));
        }
        if let Some(i) = pose_field(mirror::SYS_OFFSETS, offset) {
            return Ok(self.sys_offsets.get(i).map(Value::Float));
        }
        Ok(None)
    }

    fn text_arg(args: &[Value], i: usize) -> Result<&str, MirrorError> {
        args.get(i)
            .and_then(Value::as_str)
            .ok_or_else(|| MirrorError::InvalidArgument(format!("argument {i} must be text")))
    }

    fn direction_arg(args: &[Value], i: usize) -> Result<Direction, MirrorError> {
        let raw = args
            .get(i)
            .and_then(Value::as_u32)
            .ok_or_else(|| MirrorError::InvalidArgument(format!("argument {i} must be a direction")))?;
        Ok(Direction::try_from(raw)?)
    }

    /// Run a mirror command with full error information.
    pub fn run(&mut self, offset: u32, args: &[Value]) -> Result<(), MirrorError> {
        match offset {
            mirror::READ_POSITION => {
                self.read_all_selected_panel_positions().into_result()?;
                self.fit_pose()?;
            }
            mirror::MOVE_TO_COORDS => {
                let target = self.input;
                self.move_to_coords(&target)?.into_result()?;
            }
            mirror::READ_ALIGNMENT => self.read_all_selected_edge_sensors().into_result()?,
            mirror::ALIGN => {
                let start: EdgeAddress = Self::text_arg(args, 0)?.parse()?;
                let dir = Self::direction_arg(args, 1)?;
                self.align_from(start, dir)?;
            }
            mirror::ALIGN_BETWEEN => {
                let start: EdgeAddress = Self::text_arg(args, 0)?.parse()?;
                let end: EdgeAddress = Self::text_arg(args, 1)?.parse()?;
                let dir = Self::direction_arg(args, 2)?;
                self.align_between(start, end, dir)?;
            }
            mirror::SELECT_ALL => self.select_all(),
            mirror::STOP => self.stop().into_result()?,
            _ => return Err(MirrorError::NotImplemented { offset }),
        }
        Ok(())
    }
}

impl Device for Mirror {
    fn identity(&self) -> Identity {
        Identity::Mirror(self.mirror_digit())
    }

    /// `Busy` while the mirror is on and any panel is busy.
    fn state(&mut self) -> Result<DeviceState, DeviceError> {
        let own = self.state.get();
        if own != DeviceState::On {
            return Ok(own);
        }
        for index in 0..self.tree.len() {
            let Some(device) = self.tree.device_mut(index) else {
                continue;
            };
            if device.identity().kind() == Some(DeviceKind::Panel)
                && matches!(device.state(), Ok(DeviceState::Busy))
            {
                return Ok(DeviceState::Busy);
            }
        }
        Ok(DeviceState::On)
    }

    fn set_state(&mut self, state: DeviceState) -> Result<(), DeviceError> {
        self.state.set(state);
        Ok(())
    }

    fn get_data(&mut self, offset: u32) -> Result<Value, DeviceError> {
        if let Some(value) = self.pose_data(offset)? {
            return Ok(value);
        }
        match offset {
            mirror::SELECTED_PANELS => Ok(Value::Text(self.tree.selection_string(DeviceKind::Panel))),
            mirror::SELECTED_EDGES => Ok(Value::Text(self.tree.selection_string(DeviceKind::Edge))),
            _ => Err(DeviceError::InvalidField { offset }),
        }
    }

    fn set_data(&mut self, offset: u32, value: Value) -> Result<(), DeviceError> {
        let number = || {
            value.as_f64().ok_or_else(|| DeviceError::InvalidArgument {
                reason: format!("field {offset} takes a number"),
            })
        };
        if let Some(i) = pose_field(mirror::IN_COORDS, offset) {
            self.input.set(i, number()?);
            return Ok(());
        }
        if let Some(i) = pose_field(mirror::SYS_OFFSETS, offset) {
            self.sys_offsets.set(i, number()?);
            return Ok(());
        }
        let kind = match offset {
            mirror::SELECTED_PANELS => DeviceKind::Panel,
            mirror::SELECTED_EDGES => DeviceKind::Edge,
            _ if pose_field(mirror::CUR_COORDS, offset).is_some() => {
                return Err(DeviceError::InvalidArgument {
                    reason: "current coordinates are read-only".to_string(),
                })
            }
            _ => return Err(DeviceError::InvalidField { offset }),
        };
        let selector = value.as_str().ok_or_else(|| DeviceError::InvalidArgument {
            reason: format!("field {offset} takes a selection string"),
        })?;
        self.select_children(kind, selector);
        Ok(())
    }

    fn operate(&mut self, offset: u32, args: &[Value]) -> Result<(), DeviceError> {
        Ok(self.run(offset, args)?)
    }
}
