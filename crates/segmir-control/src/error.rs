use segmir_core::{FrameError, GeometryError, KinematicsError};
use segmir_topology::{EdgeAddress, PanelPosition, TopologyError};

use crate::device::{DeviceError, Identity};
use crate::fit::FitError;
use crate::params::ConfigError;

/// Coarse classification of controller errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    NotImplemented,
    LookupFailure,
    DidNotConverge,
    DeviceFailure,
}

/// Errors returned by mirror operations.
#[derive(thiserror::Error, Debug)]
pub enum MirrorError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("operation {offset} is not implemented")]
    NotImplemented { offset: u32 },
    #[error("no child device for {0}")]
    NotFound(Identity),
    #[error("{device} failed: {source}")]
    Device {
        device: Identity,
        #[source]
        source: DeviceError,
    },
    #[error("edge {edge} still misaligned after {attempts} moves")]
    GaveUp { edge: EdgeAddress, attempts: u32 },
    #[error("panel {0} was not moved")]
    NotIssued(PanelPosition),
    #[error("mirror lock poisoned")]
    Poisoned,
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Kinematics(#[from] KinematicsError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Fit(#[from] FitError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl MirrorError {
    pub(crate) fn device(device: Identity) -> impl FnOnce(DeviceError) -> Self {
        move |source| MirrorError::Device { device, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MirrorError::InvalidArgument(_) | MirrorError::Geometry(_) | MirrorError::Config(_) => {
                ErrorKind::InvalidArgument
            }
            MirrorError::NotImplemented { .. } => ErrorKind::NotImplemented,
            MirrorError::NotFound(_) => ErrorKind::LookupFailure,
            MirrorError::Device { source, .. } => match source {
                DeviceError::InvalidField { .. } | DeviceError::InvalidArgument { .. } => {
                    ErrorKind::InvalidArgument
                }
                DeviceError::NotImplemented { .. } => ErrorKind::NotImplemented,
                DeviceError::Failure { .. } => ErrorKind::DeviceFailure,
            },
            MirrorError::GaveUp { .. } => ErrorKind::DidNotConverge,
            MirrorError::NotIssued(_) | MirrorError::Poisoned => ErrorKind::DeviceFailure,
            MirrorError::Topology(e) => topology_kind(e),
            MirrorError::Kinematics(e) => kinematics_kind(e),
            MirrorError::Frame(e) => match e {
                FrameError::Topology(e) => topology_kind(e),
                FrameError::Kinematics(e) => kinematics_kind(e),
                FrameError::Geometry(_) => ErrorKind::InvalidArgument,
            },
            MirrorError::Fit(e) => match e {
                FitError::NoData | FitError::InvalidBounds { .. } => ErrorKind::InvalidArgument,
                FitError::DidNotConverge { .. } => ErrorKind::DidNotConverge,
            },
        }
    }
}

fn topology_kind(e: &TopologyError) -> ErrorKind {
    match e {
        TopologyError::MalformedPosition { .. }
        | TopologyError::MalformedEdge { .. }
        | TopologyError::InvalidPosition { .. }
        | TopologyError::DegenerateEdge { .. }
        | TopologyError::InvalidDirection { .. }
        | TopologyError::InvalidLayout { .. }
        | TopologyError::UnreachableEdge { .. } => ErrorKind::InvalidArgument,
        _ => ErrorKind::LookupFailure,
    }
}

fn kinematics_kind(e: &KinematicsError) -> ErrorKind {
    match e {
        KinematicsError::DidNotConverge { .. } | KinematicsError::SingularJacobian { .. } => {
            ErrorKind::DidNotConverge
        }
        _ => ErrorKind::InvalidArgument,
    }
}

impl From<MirrorError> for DeviceError {
    fn from(e: MirrorError) -> Self {
        match e {
            MirrorError::NotImplemented { offset } => DeviceError::NotImplemented { offset },
            MirrorError::Device { source, .. } => source,
            e if e.kind() == ErrorKind::InvalidArgument => DeviceError::InvalidArgument {
                reason: e.to_string(),
            },
            e => DeviceError::Failure {
                reason: e.to_string(),
            },
        }
    }
}
