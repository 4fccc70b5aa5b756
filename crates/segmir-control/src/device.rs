//! The uniform device surface shared by mirrors, panels and edges.
//!
//! Every controller exposes a state, numbered data fields and numbered
//! commands. Panels and edges are supplied by the hardware layer as trait
//! objects; the mirror implements the same trait on top of them.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use segmir_topology::{EdgeAddress, PanelPosition};
use serde::{Deserialize, Serialize};

/// Operational state of a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    On,
    Off,
    Busy,
    Error,
}

impl DeviceState {
    const fn to_raw(self) -> u8 {
        match self {
            DeviceState::On => 0,
            DeviceState::Off => 1,
            DeviceState::Busy => 2,
            DeviceState::Error => 3,
        }
    }

    const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => DeviceState::On,
            1 => DeviceState::Off,
            2 => DeviceState::Busy,
            _ => DeviceState::Error,
        }
    }
}

/// Shared state flag.
///
/// Cloned handles see the same state, so an operator can switch a mirror off
/// while one of its long operations is running on another thread.
#[derive(Clone, Debug)]
pub struct StateHandle(Arc<AtomicU8>);

impl StateHandle {
    pub fn new(state: DeviceState) -> Self {
        Self(Arc::new(AtomicU8::new(state.to_raw())))
    }

    #[inline]
    pub fn get(&self) -> DeviceState {
        DeviceState::from_raw(self.0.load(Ordering::SeqCst))
    }

    #[inline]
    pub fn set(&self, state: DeviceState) {
        self.0.store(state.to_raw(), Ordering::SeqCst);
    }

    #[inline]
    pub fn is_on(&self) -> bool {
        self.get() == DeviceState::On
    }

    /// Request cooperative cancellation of running operations.
    pub fn stop(&self) {
        self.set(DeviceState::Off);
    }
}

impl Default for StateHandle {
    fn default() -> Self {
        Self::new(DeviceState::On)
    }
}

/// Value carried by data fields and command arguments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    UInt(u32),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(v) => Some(v),
            Value::UInt(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Value::UInt(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// Failures reported by a device implementation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("offset {offset} is not a data field of this device")]
    InvalidField { offset: u32 },
    #[error("command {offset} is not implemented")]
    NotImplemented { offset: u32 },
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },
    #[error("{reason}")]
    Failure { reason: String },
}

/// Kind of child device held by a mirror.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Panel,
    Edge,
}

/// Topological identity of a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identity {
    Mirror(u32),
    Panel(PanelPosition),
    Edge(EdgeAddress),
}

impl Identity {
    pub fn kind(&self) -> Option<DeviceKind> {
        match self {
            Identity::Mirror(_) => None,
            Identity::Panel(_) => Some(DeviceKind::Panel),
            Identity::Edge(_) => Some(DeviceKind::Edge),
        }
    }

    /// Address as it appears in selection strings.
    pub fn address(&self) -> String {
        match self {
            Identity::Mirror(m) => m.to_string(),
            Identity::Panel(p) => p.to_string(),
            Identity::Edge(e) => e.to_string(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Mirror(m) => write!(f, "mirror {m}"),
            Identity::Panel(p) => write!(f, "panel {p}"),
            Identity::Edge(e) => write!(f, "edge {e}"),
        }
    }
}

/// A controllable device.
pub trait Device: Send {
    fn identity(&self) -> Identity;

    fn state(&mut self) -> Result<DeviceState, DeviceError>;

    fn set_state(&mut self, state: DeviceState) -> Result<(), DeviceError>;

    /// Read data field `offset`; unknown offsets fail with
    /// [`DeviceError::InvalidField`].
    fn get_data(&mut self, offset: u32) -> Result<Value, DeviceError>;

    fn set_data(&mut self, offset: u32, value: Value) -> Result<(), DeviceError>;

    /// Run command `offset`; unknown commands fail with
    /// [`DeviceError::NotImplemented`].
    fn operate(&mut self, offset: u32, args: &[Value]) -> Result<(), DeviceError>;
}

/// Index of `offset` inside the six-field pose block starting at `base`.
#[inline]
pub fn pose_field(base: u32, offset: u32) -> Option<usize> {
    offset
        .checked_sub(base)
        .filter(|i| *i < 6)
        .map(|i| i as usize)
}

/// Panel offsets.
pub mod panel {
    pub const MOVE_TO_ACTS: u32 = 2012;
    /// Move to the pose staged in [`IN_COORDS`].
    pub const MOVE_TO_COORDS: u32 = 2013;
    pub const READ: u32 = 2014;
    pub const STOP: u32 = 2020;
    /// First of six read-only pose fields.
    pub const CUR_COORDS: u32 = 2021;
    /// First of six staged target pose fields.
    pub const IN_COORDS: u32 = 2031;
    /// First of six measured actuator lengths, mm.
    pub const ACTUATOR_LENGTHS: u32 = 2041;
}

/// Edge offsets.
pub mod edge {
    /// Compute the motion aligning `[moving, fixed]`.
    pub const ALIGN: u32 = 1012;
    /// Execute the motion computed by the last [`ALIGN`].
    pub const MOVE: u32 = 1013;
    pub const READ: u32 = 1014;
    pub const STOP: u32 = 1020;
    /// `Bool`: whether the last [`ALIGN`] found the edge within tolerance.
    pub const ALIGNED: u32 = 1021;
}

/// Mirror offsets.
pub mod mirror {
    pub const READ_POSITION: u32 = 111;
    pub const MOVE_TO_COORDS: u32 = 112;
    pub const READ_ALIGNMENT: u32 = 113;
    /// Args: `[Text(start edge), UInt(direction)]`.
    pub const ALIGN: u32 = 114;
    /// Args: `[Text(start edge), Text(end edge), UInt(direction)]`.
    pub const ALIGN_BETWEEN: u32 = 118;
    pub const SELECT_ALL: u32 = 119;
    pub const STOP: u32 = 120;
    pub const CUR_COORDS: u32 = 121;
    pub const IN_COORDS: u32 = 131;
    pub const SYS_OFFSETS: u32 = 137;
    pub const SELECTED_PANELS: u32 = 151;
    pub const SELECTED_EDGES: u32 = 152;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pose_fields_cover_six_offsets() {
        assert_eq!(pose_field(panel::IN_COORDS, 2031), Some(0));
        assert_eq!(pose_field(panel::IN_COORDS, 2036), Some(5));
        assert_eq!(pose_field(panel::IN_COORDS, 2037), None);
        assert_eq!(pose_field(panel::IN_COORDS, 2030), None);
    }

    #[test]
    fn state_handles_share_state() {
        let a = StateHandle::default();
        let b = a.clone();
        assert!(b.is_on());
        a.stop();
        assert_eq!(b.get(), DeviceState::Off);
        b.set(DeviceState::Busy);
        assert_eq!(a.get(), DeviceState::Busy);
    }

    #[test]
    fn values_convert_by_type() {
        assert_eq!(Value::UInt(3).as_f64(), Some(3.0));
        assert_eq!(Value::Float(1.5).as_u32(), None);
        assert_eq!(Value::Text("1121".into()).as_str(), Some("1121"));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
    }
}
