//! Panel positions and edge addresses.
//!
//! A panel position packs four decimal digits:
//! `mirror * 1000 + quadrant * 100 + ring * 10 + panel`. An edge is the
//! unordered pair of the two panels it links, rendered as `"a+b"`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::TopologyError;

/// Packed topological address of one panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct PanelPosition(u32);

impl PanelPosition {
    /// Validate a packed position.
    ///
    /// Mirror, ring and panel digits must be non-zero; the quadrant digit may
    /// be anything (test stands number quadrants from zero).
    pub fn new(value: u32) -> Result<Self, TopologyError> {
        let pos = Self(value);
        if !(1000..=9999).contains(&value) || pos.ring() == 0 || pos.panel() == 0 {
            return Err(TopologyError::InvalidPosition { value });
        }
        Ok(pos)
    }

    /// Pack individual digits into a position.
    pub fn from_parts(mirror: u32, quadrant: u32, ring: u32, panel: u32) -> Result<Self, TopologyError> {
        if mirror > 9 || quadrant > 9 || ring > 9 || panel > 9 {
            return Err(TopologyError::InvalidPosition {
                value: mirror * 1000 + quadrant * 100 + ring * 10 + panel,
            });
        }
        Self::new(mirror * 1000 + quadrant * 100 + ring * 10 + panel)
    }

    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn mirror(self) -> u32 {
        self.0 / 1000
    }

    #[inline]
    pub const fn quadrant(self) -> u32 {
        (self.0 / 100) % 10
    }

    #[inline]
    pub const fn ring(self) -> u32 {
        (self.0 / 10) % 10
    }

    #[inline]
    pub const fn panel(self) -> u32 {
        self.0 % 10
    }
}

impl TryFrom<u32> for PanelPosition {
    type Error = TopologyError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PanelPosition> for u32 {
    fn from(pos: PanelPosition) -> Self {
        pos.0
    }
}

impl fmt::Display for PanelPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PanelPosition {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<u32>()
            .map_err(|_| TopologyError::MalformedPosition { text: s.to_string() })?;
        Self::new(value)
    }
}

/// Address of the edge shared by two panels.
///
/// The pair is stored in ascending order, so the address of an edge does not
/// depend on the order its panels were named in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EdgeAddress {
    low: PanelPosition,
    high: PanelPosition,
}

impl EdgeAddress {
    pub fn new(a: PanelPosition, b: PanelPosition) -> Result<Self, TopologyError> {
        if a == b {
            return Err(TopologyError::DegenerateEdge { position: a });
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        Ok(Self { low, high })
    }

    /// Both panels, lower position first.
    #[inline]
    pub fn panels(&self) -> (PanelPosition, PanelPosition) {
        (self.low, self.high)
    }

    #[inline]
    pub fn contains(&self, pos: PanelPosition) -> bool {
        self.low == pos || self.high == pos
    }
}

impl fmt::Display for EdgeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.low, self.high)
    }
}

impl FromStr for EdgeAddress {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || TopologyError::MalformedEdge { text: s.to_string() };
        let (a, b) = s.split_once('+').ok_or_else(malformed)?;
        let a = a.parse::<PanelPosition>().map_err(|_| malformed())?;
        let b = b.parse::<PanelPosition>().map_err(|_| malformed())?;
        Self::new(a, b)
    }
}

impl TryFrom<String> for EdgeAddress {
    type Error = TopologyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EdgeAddress> for String {
    fn from(edge: EdgeAddress) -> Self {
        edge.to_string()
    }
}

/// Walking direction around a ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Towards lower panel positions (`0` on the wire).
    Decreasing,
    /// Towards higher panel positions (`1` on the wire).
    Increasing,
}

impl Direction {
    #[inline]
    pub const fn step(self) -> i64 {
        match self {
            Direction::Decreasing => -1,
            Direction::Increasing => 1,
        }
    }

    #[inline]
    pub const fn reversed(self) -> Self {
        match self {
            Direction::Decreasing => Direction::Increasing,
            Direction::Increasing => Direction::Decreasing,
        }
    }
}

impl TryFrom<u32> for Direction {
    type Error = TopologyError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Direction::Decreasing),
            1 => Ok(Direction::Increasing),
            _ => Err(TopologyError::InvalidDirection { value }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(v: u32) -> PanelPosition {
        PanelPosition::new(v).expect("valid position")
    }

    #[test]
    fn digits_unpack() {
        let p = pos(2317);
        assert_eq!(p.mirror(), 2);
        assert_eq!(p.quadrant(), 3);
        assert_eq!(p.ring(), 1);
        assert_eq!(p.panel(), 7);
        assert_eq!(PanelPosition::from_parts(2, 3, 1, 7).expect("parts"), p);
    }

    #[test]
    fn rejects_zero_ring_or_panel() {
        assert!(PanelPosition::new(1101).is_err());
        assert!(PanelPosition::new(1110).is_err());
        assert!(PanelPosition::new(999).is_err());
        assert!(PanelPosition::new(1021).is_ok());
    }

    #[test]
    fn edge_address_is_order_independent() {
        let ab = EdgeAddress::new(pos(1122), pos(1121)).expect("edge");
        let ba = EdgeAddress::new(pos(1121), pos(1122)).expect("edge");
        assert_eq!(ab, ba);
        assert_eq!(ab.to_string(), "1121+1122");
        assert_eq!("1122 + 1121".parse::<EdgeAddress>().expect("parse"), ab);
    }

    #[test]
    fn malformed_edges_fail() {
        assert!("1121".parse::<EdgeAddress>().is_err());
        assert!("1121+abc".parse::<EdgeAddress>().is_err());
        assert!("1121+1121".parse::<EdgeAddress>().is_err());
    }

    #[test]
    fn serde_uses_wire_forms() {
        let edge: EdgeAddress = "1021+1022".parse().expect("parse");
        let json = serde_json::to_string(&edge).expect("serialize");
        assert_eq!(json, "\"1021+1022\"");
        let p: PanelPosition = serde_json::from_str("1428").expect("deserialize");
        assert_eq!(p.value(), 1428);
        assert!(serde_json::from_str::<PanelPosition>("1400").is_err());
    }

    #[test]
    fn direction_from_wire_value() {
        assert_eq!(Direction::try_from(0).expect("dir"), Direction::Decreasing);
        assert_eq!(Direction::try_from(1).expect("dir"), Direction::Increasing);
        assert!(Direction::try_from(2).is_err());
    }
}
