//! Edge-by-edge ring alignment.
//!
//! The walk order comes from [`AlignmentWalk`]; this module drives the edge
//! and panel devices for every step of it. Each edge is aligned by asking it
//! for a correction, moving its moving panel, waiting for that panel to stop
//! being busy, and asking again until the edge reports alignment.

use std::collections::BTreeSet;

use log::{debug, info, warn};
use segmir_topology::{AlignmentWalk, Direction, EdgeAddress, MirrorTopology, WalkEnd};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::clock::Clock;
use crate::device::{edge, DeviceState, Identity, StateHandle, Value};
use crate::error::MirrorError;
use crate::params::AlignmentParams;
use crate::tree::DeviceTree;

/// How a traversal ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentOutcome {
    /// Every requested edge reachable from the start was aligned.
    Completed,
    /// The walk hit an edge it could not navigate past.
    Boundary,
    /// The ring was walked all the way round.
    CycleComplete,
    /// The mirror left the `On` state.
    Stopped,
}

impl From<WalkEnd> for AlignmentOutcome {
    fn from(end: WalkEnd) -> Self {
        match end {
            WalkEnd::Exhausted => AlignmentOutcome::Completed,
            WalkEnd::Boundary => AlignmentOutcome::Boundary,
            WalkEnd::CycleComplete => AlignmentOutcome::CycleComplete,
        }
    }
}

/// Summary of one traversal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlignmentReport {
    pub outcome: AlignmentOutcome,
    pub passes: usize,
    /// Edges visited, newest first.
    pub edges: Vec<EdgeAddress>,
    pub align_commands: usize,
    pub move_commands: usize,
}

/// Devices and policy a traversal runs against.
pub(crate) struct AlignmentContext<'a> {
    pub tree: &'a mut DeviceTree,
    pub topology: &'a MirrorTopology,
    pub state: &'a StateHandle,
    pub clock: &'a dyn Clock,
    pub params: &'a AlignmentParams,
}

enum EdgeResult {
    Aligned,
    Stopped,
}

impl AlignmentContext<'_> {
    /// Align `required` edges starting at `start`, walking along `dir`.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, required), fields(start = %start, edges = required.len()))
    )]
    pub fn align_from(
        &mut self,
        start: EdgeAddress,
        required: &BTreeSet<EdgeAddress>,
        dir: Direction,
    ) -> Result<AlignmentReport, MirrorError> {
        self.topology.panels_from_edge(&start, dir)?;
        let present: BTreeSet<EdgeAddress> = required
            .iter()
            .copied()
            .filter(|e| self.tree.contains_edge(e))
            .collect();
        let mut report = AlignmentReport {
            outcome: AlignmentOutcome::Completed,
            passes: 0,
            edges: Vec::new(),
            align_commands: 0,
            move_commands: 0,
        };

        let mut walk = AlignmentWalk::new(self.topology, start, &present, dir);
        for pass in walk.by_ref() {
            if !self.state.is_on() {
                report.outcome = AlignmentOutcome::Stopped;
                break;
            }
            report.passes += 1;
            report.edges = pass.clone();
            debug!("alignment pass {} over {} edges", report.passes, pass.len());
            for edge in &pass {
                if !self.state.is_on() {
                    report.outcome = AlignmentOutcome::Stopped;
                    break;
                }
                if let EdgeResult::Stopped = self.align_edge(edge, dir, &mut report)? {
                    report.outcome = AlignmentOutcome::Stopped;
                    break;
                }
            }
            if report.outcome == AlignmentOutcome::Stopped {
                break;
            }
        }
        if report.outcome != AlignmentOutcome::Stopped {
            report.outcome = walk.end().map_or(AlignmentOutcome::Completed, AlignmentOutcome::from);
        }

        match report.outcome {
            AlignmentOutcome::Stopped => warn!("alignment from {start} stopped by operator"),
            outcome => info!(
                "alignment from {start} finished ({outcome:?}): {} passes, {} moves",
                report.passes, report.move_commands
            ),
        }
        Ok(report)
    }

    fn align_edge(
        &mut self,
        edge_addr: &EdgeAddress,
        dir: Direction,
        report: &mut AlignmentReport,
    ) -> Result<EdgeResult, MirrorError> {
        let (moving, fixed) = self.topology.panels_from_edge(edge_addr, dir)?;
        let edge_id = Identity::Edge(*edge_addr);
        let args = [Value::UInt(moving.value()), Value::UInt(fixed.value())];

        self.edge_command(edge_addr, edge::ALIGN, &args)?;
        report.align_commands += 1;

        let mut attempts = 0u32;
        while !self.edge_aligned(edge_addr)? {
            if let Some(max) = self.params.max_align_attempts {
                if attempts >= max {
                    return Err(MirrorError::GaveUp {
                        edge: *edge_addr,
                        attempts,
                    });
                }
            }
            if !self.state.is_on() {
                return Ok(EdgeResult::Stopped);
            }

            debug!("{edge_id}: moving panel {moving} onto {fixed}");
            self.edge_command(edge_addr, edge::MOVE, &[])?;
            report.move_commands += 1;
            attempts += 1;

            self.clock.sleep(self.params.settle_delay());
            loop {
                if !self.state.is_on() {
                    return Ok(EdgeResult::Stopped);
                }
                let panel_id = Identity::Panel(moving);
                let state = self
                    .tree
                    .panel_mut(moving)?
                    .state()
                    .map_err(MirrorError::device(panel_id))?;
                if state != DeviceState::Busy {
                    break;
                }
                self.clock.sleep(self.params.poll_interval());
            }

            self.edge_command(edge_addr, edge::ALIGN, &args)?;
            report.align_commands += 1;
        }
        debug!("{edge_id} aligned after {attempts} moves");
        Ok(EdgeResult::Aligned)
    }

    fn edge_command(&mut self, edge_addr: &EdgeAddress, command: u32, args: &[Value]) -> Result<(), MirrorError> {
        self.tree
            .edge_mut(edge_addr)?
            .operate(command, args)
            .map_err(MirrorError::device(Identity::Edge(*edge_addr)))
    }

    fn edge_aligned(&mut self, edge_addr: &EdgeAddress) -> Result<bool, MirrorError> {
        let identity = Identity::Edge(*edge_addr);
        let value = self
            .tree
            .edge_mut(edge_addr)?
            .get_data(edge::ALIGNED)
            .map_err(MirrorError::device(identity))?;
        value
            .as_bool()
            .ok_or_else(|| MirrorError::InvalidArgument(format!("{identity} reported a non-boolean alignment flag")))
    }
}
