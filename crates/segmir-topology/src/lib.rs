//! Topology of a segmented mirror: panel addressing, ring adjacency, and the
//! order in which edges are visited during alignment.
//!
//! Nothing here talks to hardware; the crate is pure bookkeeping shared by the
//! frame engine and the alignment executor.
//!
//! ```
//! use segmir_topology::{Direction, EdgeAddress, MirrorTopology, RingLayout};
//!
//! let topo = MirrorTopology::new(1, vec![RingLayout::new(16)?, RingLayout::new(32)?])?;
//! let edge: EdgeAddress = "1121+1122".parse()?;
//! let (moving, fixed) = topo.panels_from_edge(&edge, Direction::Increasing)?;
//! assert_eq!(topo.neighbor(fixed, Direction::Increasing)?, moving);
//! # Ok::<(), segmir_topology::TopologyError>(())
//! ```

mod address;
mod ring;
mod walk;

pub use address::{Direction, EdgeAddress, PanelPosition};
pub use ring::{MirrorTopology, RingLayout};
pub use walk::{path_between, AlignmentWalk, WalkEnd};

/// Errors returned by addressing and adjacency queries.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("invalid panel position {value}")]
    InvalidPosition { value: u32 },
    #[error("cannot parse panel position from {text:?}")]
    MalformedPosition { text: String },
    #[error("cannot parse edge address from {text:?}")]
    MalformedEdge { text: String },
    #[error("edge joins panel {position} to itself")]
    DegenerateEdge { position: PanelPosition },
    #[error("direction must be 0 or 1, got {value}")]
    InvalidDirection { value: u32 },
    #[error("ring of {panels} panels starting at quadrant {first_quadrant} cannot be addressed")]
    InvalidLayout { panels: u32, first_quadrant: u32 },
    #[error("panel {position} does not belong to mirror {mirror}")]
    ForeignMirror { position: PanelPosition, mirror: u32 },
    #[error("panel {position} is on an unknown ring")]
    UnknownRing { position: PanelPosition },
    #[error("panel {position} lies outside its ring layout")]
    OutsideRing { position: PanelPosition },
    #[error("panels of edge {edge} are not ring neighbors")]
    NotAdjacent { edge: EdgeAddress },
    #[error("edge {end} cannot be reached from {start}")]
    UnreachableEdge { start: EdgeAddress, end: EdgeAddress },
}
