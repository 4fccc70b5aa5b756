#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use segmir_control::{
    edge_offsets, panel_offsets, pose_field, Clock, ControlParams, Device, DeviceError, DeviceKind,
    DeviceState, Identity, Mirror, StateHandle, Value,
};
use segmir_core::{FrameEngine, MirrorGeometry, Pose, StewartPlatform};
use segmir_topology::{Direction, EdgeAddress, PanelPosition};

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    SetData(Identity, u32),
    Operate(Identity, u32, Vec<Value>),
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

pub fn calls(log: &CallLog) -> Vec<Call> {
    log.lock().expect("log").clone()
}

/// Panel whose actuators follow its commanded pose exactly.
pub struct SimPanel {
    position: PanelPosition,
    platform: StewartPlatform,
    pose: Pose,
    staged: Pose,
    busy_polls: usize,
    busy_left: Arc<AtomicUsize>,
    log: CallLog,
}

impl SimPanel {
    pub fn nominal(engine: &FrameEngine, position: PanelPosition, log: &CallLog) -> Self {
        let platform = engine.platform(position).expect("platform").clone();
        let pose = platform.nominal_solution().expect("nominal").pose;
        Self {
            position,
            platform,
            pose,
            staged: pose,
            busy_polls: 0,
            busy_left: Arc::default(),
            log: log.clone(),
        }
    }

    /// Report `Busy` for this many state polls after every move.
    pub fn with_busy_polls(mut self, polls: usize) -> Self {
        self.busy_polls = polls;
        self
    }

    /// Counter of remaining busy polls, shared with edges that move this panel.
    pub fn busy_handle(&self) -> Arc<AtomicUsize> {
        self.busy_left.clone()
    }
}

impl Device for SimPanel {
    fn identity(&self) -> Identity {
        Identity::Panel(self.position)
    }

    fn state(&mut self) -> Result<DeviceState, DeviceError> {
        let busy = self
            .busy_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        Ok(if busy { DeviceState::Busy } else { DeviceState::On })
    }

    fn set_state(&mut self, _state: DeviceState) -> Result<(), DeviceError> {
        Ok(())
    }

    fn get_data(&mut self, offset: u32) -> Result<Value, DeviceError> {
        if let Some(k) = pose_field(panel_offsets::ACTUATOR_LENGTHS, offset) {
            return Ok(Value::Float(self.platform.actuator_lengths_from_pose(&self.pose)[k]));
        }
        if let Some(i) = pose_field(panel_offsets::CUR_COORDS, offset) {
            return Ok(Value::Float(self.pose.to_array()[i]));
        }
        Err(DeviceError::InvalidField { offset })
    }

    fn set_data(&mut self, offset: u32, value: Value) -> Result<(), DeviceError> {
        self.log
            .lock()
            .expect("log")
            .push(Call::SetData(self.identity(), offset));
        let i = pose_field(panel_offsets::IN_COORDS, offset).ok_or(DeviceError::InvalidField { offset })?;
        let v = value.as_f64().ok_or(DeviceError::InvalidArgument {
            reason: "number expected".into(),
        })?;
        self.staged.set(i, v);
        Ok(())
    }

    fn operate(&mut self, offset: u32, args: &[Value]) -> Result<(), DeviceError> {
        self.log
            .lock()
            .expect("log")
            .push(Call::Operate(self.identity(), offset, args.to_vec()));
        match offset {
            panel_offsets::MOVE_TO_COORDS => {
                self.pose = self.staged;
                self.busy_left.store(self.busy_polls, Ordering::SeqCst);
                Ok(())
            }
            panel_offsets::READ | panel_offsets::STOP => Ok(()),
            _ => Err(DeviceError::NotImplemented { offset }),
        }
    }
}

/// Edge sensor that reads aligned after a fixed number of moves.
pub struct SimEdge {
    address: EdgeAddress,
    moves_needed: usize,
    moves: usize,
    moving_panel: Option<(Arc<AtomicUsize>, usize)>,
    log: CallLog,
}

impl SimEdge {
    pub fn new(address: EdgeAddress, moves_needed: usize, log: &CallLog) -> Self {
        Self {
            address,
            moves_needed,
            moves: 0,
            moving_panel: None,
            log: log.clone(),
        }
    }

    /// Keep the moving panel busy for `polls` state reads after each move.
    pub fn driving(mut self, busy: Arc<AtomicUsize>, polls: usize) -> Self {
        self.moving_panel = Some((busy, polls));
        self
    }
}

impl Device for SimEdge {
    fn identity(&self) -> Identity {
        Identity::Edge(self.address)
    }

    fn state(&mut self) -> Result<DeviceState, DeviceError> {
        Ok(DeviceState::On)
    }

    fn set_state(&mut self, _state: DeviceState) -> Result<(), DeviceError> {
        Ok(())
    }

    fn get_data(&mut self, offset: u32) -> Result<Value, DeviceError> {
        match offset {
            edge_offsets::ALIGNED => Ok(Value::Bool(self.moves >= self.moves_needed)),
            _ => Err(DeviceError::InvalidField { offset }),
        }
    }

    fn set_data(&mut self, offset: u32, _value: Value) -> Result<(), DeviceError> {
        Err(DeviceError::InvalidField { offset })
    }

    fn operate(&mut self, offset: u32, args: &[Value]) -> Result<(), DeviceError> {
        self.log
            .lock()
            .expect("log")
            .push(Call::Operate(self.identity(), offset, args.to_vec()));
        match offset {
            edge_offsets::ALIGN | edge_offsets::READ | edge_offsets::STOP => Ok(()),
            edge_offsets::MOVE => {
                self.moves += 1;
                if let Some((busy, polls)) = &self.moving_panel {
                    busy.store(*polls, Ordering::SeqCst);
                }
                Ok(())
            }
            _ => Err(DeviceError::NotImplemented { offset }),
        }
    }
}

/// Clock that records waits instead of sleeping.
#[derive(Default)]
pub struct FakeClock {
    sleeps: Mutex<Vec<Duration>>,
    stop_after: Mutex<Option<(usize, StateHandle)>>,
}

impl FakeClock {
    /// Switch `state` off once `sleeps` waits have been recorded.
    pub fn stop_after(&self, sleeps: usize, state: StateHandle) {
        *self.stop_after.lock().expect("hook") = Some((sleeps, state));
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().expect("sleeps").clone()
    }
}

impl Clock for FakeClock {
    fn sleep(&self, duration: Duration) {
        let count = {
            let mut sleeps = self.sleeps.lock().expect("sleeps");
            sleeps.push(duration);
            sleeps.len()
        };
        if let Some((limit, state)) = self.stop_after.lock().expect("hook").as_ref() {
            if count >= *limit {
                state.stop();
            }
        }
    }
}

pub fn pos(v: u32) -> PanelPosition {
    PanelPosition::new(v).expect("position")
}

pub fn edge(s: &str) -> EdgeAddress {
    s.parse().expect("edge")
}

pub struct Rig {
    pub mirror: Mirror,
    pub engine: FrameEngine,
    pub log: CallLog,
    pub clock: Arc<FakeClock>,
}

pub fn primary_rig(panels: &[u32], edges: &[(&str, usize)], busy_polls: usize) -> Rig {
    primary_rig_with(ControlParams::default(), panels, edges, busy_polls)
}

/// Primary mirror with nominal panels and edge sensors attached.
///
/// Edges drive the panel that moves when walking in increasing order; it
/// stays busy for `busy_polls` state reads after every move.
pub fn primary_rig_with(params: ControlParams, panels: &[u32], edges: &[(&str, usize)], busy_polls: usize) -> Rig {
    let geometry = MirrorGeometry::primary().expect("geometry");
    let engine = FrameEngine::new(&geometry, &params.solver).expect("engine");
    let clock = Arc::new(FakeClock::default());
    let mut mirror = Mirror::new(&geometry, params).expect("mirror").with_clock(clock.clone());
    let log = CallLog::default();
    let mut busy = HashMap::new();
    for &p in panels {
        let panel = SimPanel::nominal(&engine, pos(p), &log).with_busy_polls(busy_polls);
        busy.insert(pos(p), panel.busy_handle());
        mirror.attach_child(Box::new(panel)).expect("attach panel");
    }
    for &(e, moves) in edges {
        let address = edge(e);
        let mut sensor = SimEdge::new(address, moves, &log);
        let (moving, _) = engine
            .topology()
            .panels_from_edge(&address, Direction::Increasing)
            .expect("ring edge");
        if let Some(handle) = busy.get(&moving) {
            sensor = sensor.driving(handle.clone(), busy_polls);
        }
        mirror.attach_child(Box::new(sensor)).expect("attach edge");
    }
    Rig {
        mirror,
        engine,
        log,
        clock,
    }
}

/// Every panel of `ring` on the primary mirror.
pub fn ring_panels(engine: &FrameEngine, ring: u32) -> Vec<u32> {
    engine
        .topology()
        .ring_positions(ring)
        .expect("ring")
        .into_iter()
        .map(PanelPosition::value)
        .collect()
}

/// Edges between consecutive panels of `ring`, closing the loop.
pub fn ring_edges(engine: &FrameEngine, ring: u32) -> Vec<String> {
    let panels = engine.topology().ring_positions(ring).expect("ring");
    panels
        .iter()
        .zip(panels.iter().cycle().skip(1))
        .map(|(a, b)| EdgeAddress::new(*a, *b).expect("edge").to_string())
        .collect()
}

/// Edge `ALIGN` commands in the order they were issued.
pub fn align_order(log: &CallLog) -> Vec<String> {
    calls(log)
        .into_iter()
        .filter_map(|call| match call {
            Call::Operate(Identity::Edge(e), edge_offsets::ALIGN, _) => Some(e.to_string()),
            _ => None,
        })
        .collect()
}

pub fn select_panels(mirror: &mut Mirror, selector: &str) -> usize {
    mirror.select_children(DeviceKind::Panel, selector)
}
