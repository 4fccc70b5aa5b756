//! Ring adjacency.
//!
//! Every ring is split into four quadrants of equal panel count. Walking a
//! ring maps a position to its residue
//! `(quadrant - first_quadrant) * panels_per_quadrant + (panel - 1)`,
//! shifts it by one and wraps modulo the ring size.

use serde::{Deserialize, Serialize};

use crate::{Direction, EdgeAddress, PanelPosition, TopologyError};

const QUADRANTS: u32 = 4;

fn default_first_quadrant() -> u32 {
    1
}

/// Panel layout of one ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingLayout {
    pub panels: u32,
    /// Digit used for the first quadrant in panel positions.
    #[serde(default = "default_first_quadrant")]
    pub first_quadrant: u32,
}

impl RingLayout {
    pub fn new(panels: u32) -> Result<Self, TopologyError> {
        let layout = Self {
            panels,
            first_quadrant: default_first_quadrant(),
        };
        layout.validate()?;
        Ok(layout)
    }

    pub fn with_first_quadrant(mut self, first_quadrant: u32) -> Self {
        self.first_quadrant = first_quadrant;
        self
    }

    pub fn validate(&self) -> Result<(), TopologyError> {
        let ppq = self.panels / QUADRANTS;
        if self.panels == 0 || self.panels % QUADRANTS != 0 || ppq > 9 || self.first_quadrant + QUADRANTS > 10 {
            return Err(TopologyError::InvalidLayout {
                panels: self.panels,
                first_quadrant: self.first_quadrant,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn panels_per_quadrant(&self) -> u32 {
        self.panels / QUADRANTS
    }
}

/// Ring layouts of one mirror, indexed by the ring digit (1-based).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MirrorTopology {
    pub mirror: u32,
    pub rings: Vec<RingLayout>,
}

impl MirrorTopology {
    pub fn new(mirror: u32, rings: Vec<RingLayout>) -> Result<Self, TopologyError> {
        for ring in &rings {
            ring.validate()?;
        }
        Ok(Self { mirror, rings })
    }

    /// Layout of the ring a position sits on, after checking the position
    /// belongs to this mirror.
    pub fn layout(&self, pos: PanelPosition) -> Result<&RingLayout, TopologyError> {
        if pos.mirror() != self.mirror {
            return Err(TopologyError::ForeignMirror {
                position: pos,
                mirror: self.mirror,
            });
        }
        self.rings
            .get(pos.ring() as usize - 1)
            .ok_or(TopologyError::UnknownRing { position: pos })
    }

    /// Zero-based index of a panel along its ring.
    pub fn residue(&self, pos: PanelPosition) -> Result<u32, TopologyError> {
        let layout = self.layout(pos)?;
        let ppq = layout.panels_per_quadrant();
        let quadrant = pos.quadrant();
        if quadrant < layout.first_quadrant
            || quadrant >= layout.first_quadrant + QUADRANTS
            || pos.panel() > ppq
        {
            return Err(TopologyError::OutsideRing { position: pos });
        }
        Ok((quadrant - layout.first_quadrant) * ppq + pos.panel() - 1)
    }

    /// Inverse of [`MirrorTopology::residue`] on a given ring.
    pub fn position_at(&self, ring: u32, residue: u32) -> Result<PanelPosition, TopologyError> {
        let layout = self
            .rings
            .get((ring as usize).wrapping_sub(1))
            .ok_or(TopologyError::InvalidPosition {
                value: self.mirror * 1000 + ring * 10,
            })?;
        let ppq = layout.panels_per_quadrant();
        let residue = residue % layout.panels;
        PanelPosition::from_parts(
            self.mirror,
            layout.first_quadrant + residue / ppq,
            ring,
            residue % ppq + 1,
        )
    }

    /// Adjacent panel on the same ring.
    pub fn neighbor(&self, pos: PanelPosition, dir: Direction) -> Result<PanelPosition, TopologyError> {
        let layout = self.layout(pos)?;
        let residue = self.residue(pos)? as i64;
        let shifted = (residue + dir.step()).rem_euclid(layout.panels as i64) as u32;
        self.position_at(pos.ring(), shifted)
    }

    /// Edge between two panels that must be ring neighbors.
    pub fn edge_from_panels(
        &self,
        a: PanelPosition,
        b: PanelPosition,
    ) -> Result<EdgeAddress, TopologyError> {
        let edge = EdgeAddress::new(a, b)?;
        self.panels_from_edge(&edge, Direction::Increasing)?;
        Ok(edge)
    }

    /// Order an edge's panels for `dir` as `(moving, fixed)`, where
    /// `moving == neighbor(fixed, dir)`.
    pub fn panels_from_edge(
        &self,
        edge: &EdgeAddress,
        dir: Direction,
    ) -> Result<(PanelPosition, PanelPosition), TopologyError> {
        let (a, b) = edge.panels();
        if self.neighbor(b, dir)? == a {
            Ok((a, b))
        } else if self.neighbor(a, dir)? == b {
            Ok((b, a))
        } else {
            Err(TopologyError::NotAdjacent { edge: *edge })
        }
    }

    /// Edge reached by shifting both panels of `edge` one step along `dir`.
    pub fn edge_neighbor(&self, edge: &EdgeAddress, dir: Direction) -> Result<EdgeAddress, TopologyError> {
        let (a, b) = edge.panels();
        EdgeAddress::new(self.neighbor(a, dir)?, self.neighbor(b, dir)?)
    }

    /// All panel positions on a ring, in residue order.
    pub fn ring_positions(&self, ring: u32) -> Result<Vec<PanelPosition>, TopologyError> {
        let layout = self
            .rings
            .get((ring as usize).wrapping_sub(1))
            .ok_or(TopologyError::InvalidPosition {
                value: self.mirror * 1000 + ring * 10,
            })?;
        (0..layout.panels)
            .map(|residue| self.position_at(ring, residue))
            .collect()
    }
}
