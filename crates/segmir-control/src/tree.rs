//! Children of a mirror.
//!
//! Devices live in one arena. Two indexes point into it, by identity and by
//! panel position, and both are filled by [`DeviceTree::attach`] only.

use std::collections::{BTreeSet, HashMap};

use log::debug;
use segmir_topology::{EdgeAddress, PanelPosition};

use crate::device::{panel, Device, DeviceKind, Identity, Value};
use crate::error::MirrorError;
use crate::selection::{render_selection, resolve_selection};

struct ChildSlot {
    identity: Identity,
    device: Box<dyn Device>,
}

/// Arena of child devices plus the current selections.
#[derive(Default)]
pub struct DeviceTree {
    children: Vec<ChildSlot>,
    by_identity: HashMap<Identity, usize>,
    by_position: HashMap<PanelPosition, usize>,
    selected_panels: BTreeSet<usize>,
    selected_edges: BTreeSet<usize>,
    panel_selector: String,
    edge_selector: String,
}

impl std::fmt::Debug for DeviceTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceTree")
            .field("children", &self.children.iter().map(|c| c.identity).collect::<Vec<_>>())
            .field("selected_panels", &self.selected_panels)
            .field("selected_edges", &self.selected_edges)
            .finish()
    }
}

impl DeviceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a panel or edge. The new child joins its kind's selection.
    pub fn attach(&mut self, device: Box<dyn Device>) -> Result<usize, MirrorError> {
        let identity = device.identity();
        let kind = identity
            .kind()
            .ok_or_else(|| MirrorError::InvalidArgument(format!("{identity} cannot be a mirror child")))?;
        if self.by_identity.contains_key(&identity) {
            return Err(MirrorError::InvalidArgument(format!("{identity} is already attached")));
        }

        let index = self.children.len();
        self.children.push(ChildSlot { identity, device });
        self.by_identity.insert(identity, index);
        if let Identity::Panel(pos) = identity {
            self.by_position.insert(pos, index);
        }

        let selector = match kind {
            DeviceKind::Panel => &mut self.panel_selector,
            DeviceKind::Edge => &mut self.edge_selector,
        };
        selector.push_str(&identity.address());
        selector.push(' ');
        let selector = selector.clone();
        self.select(kind, &selector);
        debug!("attached {identity} as child {index}");
        Ok(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn index_of(&self, identity: &Identity) -> Option<usize> {
        self.by_identity.get(identity).copied()
    }

    pub fn panel_index(&self, pos: PanelPosition) -> Option<usize> {
        self.by_position.get(&pos).copied()
    }

    pub fn contains_edge(&self, edge: &EdgeAddress) -> bool {
        self.by_identity.contains_key(&Identity::Edge(*edge))
    }

    pub fn identity(&self, index: usize) -> Option<Identity> {
        self.children.get(index).map(|c| c.identity)
    }

    pub fn identities(&self, kind: DeviceKind) -> impl Iterator<Item = Identity> + '_ {
        self.children
            .iter()
            .map(|c| c.identity)
            .filter(move |id| id.kind() == Some(kind))
    }

    pub fn device_mut(&mut self, index: usize) -> Option<&mut dyn Device> {
        match self.children.get_mut(index) {
            Some(slot) => Some(slot.device.as_mut()),
            None => None,
        }
    }

    pub fn panel_mut(&mut self, pos: PanelPosition) -> Result<&mut dyn Device, MirrorError> {
        let index = self
            .panel_index(pos)
            .ok_or(MirrorError::NotFound(Identity::Panel(pos)))?;
        Ok(self.children[index].device.as_mut())
    }

    pub fn edge_mut(&mut self, edge: &EdgeAddress) -> Result<&mut dyn Device, MirrorError> {
        let identity = Identity::Edge(*edge);
        let index = self.index_of(&identity).ok_or(MirrorError::NotFound(identity))?;
        Ok(self.children[index].device.as_mut())
    }

    /// Replace the selection of `kind` with the children named by `selector`.
    pub fn select(&mut self, kind: DeviceKind, selector: &str) -> usize {
        let resolved = resolve_selection(selector, kind, &self.by_identity);
        let count = resolved.len();
        match kind {
            DeviceKind::Panel => {
                self.panel_selector = selector.to_string();
                self.selected_panels = resolved;
            }
            DeviceKind::Edge => {
                self.edge_selector = selector.to_string();
                self.selected_edges = resolved;
            }
        }
        count
    }

    /// Select every attached panel and edge.
    pub fn select_all(&mut self) {
        for kind in [DeviceKind::Panel, DeviceKind::Edge] {
            let selector = render_selection(&self.identities(kind).collect::<Vec<_>>());
            self.select(kind, &selector);
        }
    }

    pub fn selected(&self, kind: DeviceKind) -> &BTreeSet<usize> {
        match kind {
            DeviceKind::Panel => &self.selected_panels,
            DeviceKind::Edge => &self.selected_edges,
        }
    }

    /// Selected identities of `kind`, in attach order.
    pub fn selected_identities(&self, kind: DeviceKind) -> Vec<Identity> {
        self.selected(kind)
            .iter()
            .filter_map(|&i| self.identity(i))
            .collect()
    }

    pub fn selected_panels(&self) -> Vec<PanelPosition> {
        self.selected_identities(DeviceKind::Panel)
            .into_iter()
            .filter_map(|id| match id {
                Identity::Panel(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn selected_edges(&self) -> BTreeSet<EdgeAddress> {
        self.selected_identities(DeviceKind::Edge)
            .into_iter()
            .filter_map(|id| match id {
                Identity::Edge(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    /// Selection rendered as `[a, b, c]`.
    pub fn selection_string(&self, kind: DeviceKind) -> String {
        render_selection(&self.selected_identities(kind))
    }

    /// Selector string the current selection of `kind` was built from.
    pub fn selector(&self, kind: DeviceKind) -> &str {
        match kind {
            DeviceKind::Panel => &self.panel_selector,
            DeviceKind::Edge => &self.edge_selector,
        }
    }

    /// Measured actuator lengths of the panel at `pos`.
    pub fn actuator_lengths(&mut self, pos: PanelPosition) -> Result<[f64; 6], MirrorError> {
        let identity = Identity::Panel(pos);
        let device = self.panel_mut(pos)?;
        let mut lengths = [0.0; 6];
        for (k, slot) in lengths.iter_mut().enumerate() {
            let value = device
                .get_data(panel::ACTUATOR_LENGTHS + k as u32)
                .map_err(MirrorError::device(identity))?;
            *slot = value.as_f64().ok_or_else(|| {
                MirrorError::InvalidArgument(format!("{identity} reported a non-numeric actuator length"))
            })?;
        }
        Ok(lengths)
    }

    /// Run `command` on the child at `index`.
    pub fn operate(&mut self, index: usize, command: u32, args: &[Value]) -> Result<(), MirrorError> {
        let slot = self
            .children
            .get_mut(index)
            .ok_or_else(|| MirrorError::InvalidArgument(format!("no child at index {index}")))?;
        let identity = slot.identity;
        slot.device
            .operate(command, args)
            .map_err(MirrorError::device(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceError, DeviceState};

    struct Stub {
        identity: Identity,
        lengths: [f64; 6],
        commands: Vec<u32>,
    }

    impl Stub {
        fn boxed(identity: Identity) -> Box<dyn Device> {
            Box::new(Self {
                identity,
                lengths: [430.0, 431.0, 432.0, 433.0, 434.0, 435.0],
                commands: Vec::new(),
            })
        }
    }

    impl Device for Stub {
        fn identity(&self) -> Identity {
            self.identity
        }

        fn state(&mut self) -> Result<DeviceState, DeviceError> {
            Ok(DeviceState::On)
        }

        fn set_state(&mut self, _state: DeviceState) -> Result<(), DeviceError> {
            Ok(())
        }

        fn get_data(&mut self, offset: u32) -> Result<Value, DeviceError> {
            crate::device::pose_field(panel::ACTUATOR_LENGTHS, offset)
                .map(|i| Value::Float(self.lengths[i]))
                .ok_or(DeviceError::InvalidField { offset })
        }

        fn set_data(&mut self, offset: u32, _value: Value) -> Result<(), DeviceError> {
            Err(DeviceError::InvalidField { offset })
        }

        fn operate(&mut self, offset: u32, _args: &[Value]) -> Result<(), DeviceError> {
            if offset == panel::STOP {
                self.commands.push(offset);
                Ok(())
            } else {
                Err(DeviceError::NotImplemented { offset })
            }
        }
    }

    fn panel_id(v: u32) -> Identity {
        Identity::Panel(PanelPosition::new(v).expect("pos"))
    }

    fn edge_id(s: &str) -> Identity {
        Identity::Edge(s.parse().expect("edge"))
    }

    fn tree() -> DeviceTree {
        let mut tree = DeviceTree::new();
        for id in [panel_id(1121), panel_id(1122), panel_id(1123), edge_id("1121+1122")] {
            tree.attach(Stub::boxed(id)).expect("attach");
        }
        tree
    }

    #[test]
    fn attached_children_join_the_selection() {
        let tree = tree();
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.selection_string(DeviceKind::Panel), "[1121, 1122, 1123]");
        assert_eq!(tree.selection_string(DeviceKind::Edge), "[1121+1122]");
        assert_eq!(tree.panel_index(PanelPosition::new(1123).expect("pos")), Some(2));
    }

    #[test]
    fn duplicates_and_mirrors_are_rejected() {
        let mut tree = tree();
        assert!(tree.attach(Stub::boxed(panel_id(1122))).is_err());
        assert!(tree.attach(Stub::boxed(Identity::Mirror(1))).is_err());
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn selection_replaces_and_is_idempotent() {
        let mut tree = tree();
        assert_eq!(tree.select(DeviceKind::Panel, "1123, 1121, 1124"), 2);
        let first = tree.selected_panels();
        assert_eq!(tree.select(DeviceKind::Panel, "1123, 1121, 1124"), 2);
        assert_eq!(tree.selected_panels(), first);
        assert_eq!(tree.selection_string(DeviceKind::Panel), "[1121, 1123]");
        assert_eq!(tree.selector(DeviceKind::Panel), "1123, 1121, 1124");

        assert_eq!(tree.select(DeviceKind::Panel, ""), 0);
        tree.select_all();
        assert_eq!(tree.selected_panels().len(), 3);
        assert_eq!(tree.selected_edges().len(), 1);
    }

    #[test]
    fn lookups_fail_for_missing_children() {
        let mut tree = tree();
        let missing = PanelPosition::new(1124).expect("pos");
        assert!(matches!(tree.panel_mut(missing), Err(MirrorError::NotFound(_))));
        let edge = "1122+1123".parse().expect("edge");
        assert!(!tree.contains_edge(&edge));
        assert!(matches!(tree.edge_mut(&edge), Err(MirrorError::NotFound(_))));
    }

    #[test]
    fn reads_actuator_lengths_and_runs_commands() {
        let mut tree = tree();
        let lengths = tree
            .actuator_lengths(PanelPosition::new(1122).expect("pos"))
            .expect("lengths");
        assert_eq!(lengths[5], 435.0);
        assert!(tree.operate(0, panel::STOP, &[]).is_ok());
        let err = tree.operate(0, panel::READ, &[]).expect_err("unsupported");
        assert!(matches!(
            err,
            MirrorError::Device {
                source: DeviceError::NotImplemented { .. },
                ..
            }
        ));
        assert!(tree.operate(99, panel::STOP, &[]).is_err());
    }
}
