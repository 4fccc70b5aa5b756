//! Alignment walk order.
//!
//! Alignment proceeds edge by edge around a ring. Each time a new edge joins
//! the walk, every edge visited so far is re-aligned, newest first, because
//! moving one panel disturbs the edges behind it. [`AlignmentWalk`] yields
//! those passes without touching any device.

use std::collections::{BTreeSet, VecDeque};

use crate::{Direction, EdgeAddress, MirrorTopology, TopologyError};

/// Why a walk stopped producing passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkEnd {
    /// The next edge is not in the requested set.
    Exhausted,
    /// The next edge could not be computed from the topology.
    Boundary,
    /// The ring was walked all the way round.
    CycleComplete,
}

/// Iterator over alignment passes.
///
/// Every item is the list of edges to align in that pass, newest first.
#[derive(Debug)]
pub struct AlignmentWalk<'a> {
    topology: &'a MirrorTopology,
    required: &'a BTreeSet<EdgeAddress>,
    direction: Direction,
    current: Option<EdgeAddress>,
    processed: VecDeque<EdgeAddress>,
    end: Option<WalkEnd>,
}

impl<'a> AlignmentWalk<'a> {
    pub fn new(
        topology: &'a MirrorTopology,
        start: EdgeAddress,
        required: &'a BTreeSet<EdgeAddress>,
        direction: Direction,
    ) -> Self {
        Self {
            topology,
            required,
            direction,
            current: Some(start),
            processed: VecDeque::new(),
            end: None,
        }
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Reason the walk ended, once the iterator returned `None`.
    #[inline]
    pub fn end(&self) -> Option<WalkEnd> {
        self.end
    }

    /// Edges visited so far, newest first.
    pub fn processed(&self) -> impl Iterator<Item = &EdgeAddress> {
        self.processed.iter()
    }
}

impl Iterator for AlignmentWalk<'_> {
    type Item = Vec<EdgeAddress>;

    fn next(&mut self) -> Option<Self::Item> {
        let Some(current) = self.current.take() else {
            if self.end.is_none() {
                self.end = Some(WalkEnd::Boundary);
            }
            return None;
        };
        if self.processed.contains(&current) {
            self.end = Some(WalkEnd::CycleComplete);
            return None;
        }
        if !self.required.contains(&current) {
            self.end = Some(WalkEnd::Exhausted);
            return None;
        }

        self.processed.push_front(current);
        self.current = self.topology.edge_neighbor(&current, self.direction).ok();
        Some(self.processed.iter().copied().collect())
    }
}

/// Edges from `start` to `end` inclusive, stepping along `dir`.
pub fn path_between(
    topology: &MirrorTopology,
    start: EdgeAddress,
    end: EdgeAddress,
    dir: Direction,
) -> Result<Vec<EdgeAddress>, TopologyError> {
    let mut path = vec![start];
    let mut cur = start;
    while cur != end {
        cur = topology.edge_neighbor(&cur, dir)?;
        if cur == start {
            return Err(TopologyError::UnreachableEdge { start, end });
        }
        path.push(cur);
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PanelPosition, RingLayout};

    fn topology() -> MirrorTopology {
        MirrorTopology::new(
            1,
            vec![
                RingLayout::new(16).expect("ring"),
                RingLayout::new(32).expect("ring"),
            ],
        )
        .expect("topology")
    }

    fn edge(s: &str) -> EdgeAddress {
        s.parse().expect("edge")
    }

    #[test]
    fn passes_grow_newest_first() {
        let topo = topology();
        let required: BTreeSet<_> = ["1111+1112", "1112+1113", "1113+1114"]
            .into_iter()
            .map(edge)
            .collect();
        let mut walk = AlignmentWalk::new(&topo, edge("1111+1112"), &required, Direction::Increasing);
        let passes: Vec<_> = walk.by_ref().collect();
        assert_eq!(
            passes,
            vec![
                vec![edge("1111+1112")],
                vec![edge("1112+1113"), edge("1111+1112")],
                vec![edge("1113+1114"), edge("1112+1113"), edge("1111+1112")],
            ]
        );
        assert_eq!(walk.end(), Some(WalkEnd::Exhausted));
    }

    #[test]
    fn start_outside_required_yields_nothing() {
        let topo = topology();
        let required = BTreeSet::new();
        let mut walk = AlignmentWalk::new(&topo, edge("1111+1112"), &required, Direction::Increasing);
        assert!(walk.next().is_none());
        assert_eq!(walk.end(), Some(WalkEnd::Exhausted));
    }

    #[test]
    fn full_ring_stops_after_one_cycle() {
        let topo = topology();
        let ring = topo.ring_positions(1).expect("ring");
        let required: BTreeSet<_> = ring
            .iter()
            .zip(ring.iter().cycle().skip(1))
            .map(|(a, b)| EdgeAddress::new(*a, *b).expect("edge"))
            .collect();
        assert_eq!(required.len(), 16);
        let start = EdgeAddress::new(ring[0], ring[1]).expect("edge");
        let mut walk = AlignmentWalk::new(&topo, start, &required, Direction::Increasing);
        let count = walk.by_ref().count();
        assert_eq!(count, 16);
        assert_eq!(walk.end(), Some(WalkEnd::CycleComplete));
    }

    #[test]
    fn decreasing_walk_moves_backwards() {
        let topo = topology();
        let required: BTreeSet<_> = ["1111+1414", "1413+1414"].into_iter().map(edge).collect();
        let walk = AlignmentWalk::new(&topo, edge("1111+1414"), &required, Direction::Decreasing);
        let last = walk.last().expect("passes");
        assert_eq!(last, vec![edge("1413+1414"), edge("1111+1414")]);
    }

    #[test]
    fn path_between_wraps_the_ring() {
        let topo = topology();
        let path = path_between(&topo, edge("1413+1414"), edge("1112+1113"), Direction::Increasing)
            .expect("path");
        assert_eq!(
            path,
            vec![
                edge("1413+1414"),
                edge("1111+1414"),
                edge("1111+1112"),
                edge("1112+1113"),
            ]
        );
    }

    #[test]
    fn path_between_rejects_off_ring_end() {
        let topo = topology();
        let off_ring = EdgeAddress::new(
            PanelPosition::new(1111).expect("pos"),
            PanelPosition::new(1121).expect("pos"),
        )
        .expect("edge");
        assert!(matches!(
            path_between(&topo, edge("1111+1112"), off_ring, Direction::Increasing),
            Err(TopologyError::UnreachableEdge { .. })
        ));
    }
}
