#![forbid(unsafe_code)]

//! Device commands: add, delete, move, update.
//!
//! Each command records what it displaced the first time it runs, so
//! `undo` restores the graph to its exact prior shape, device order
//! included.

use netdiagram_core::{
    Device, DeviceAttributes, DeviceId, GraphError, Link, Position, TopologyGraph,
};

use super::command::{
    CommandError, CommandKind, CommandMetadata, CommandResult, MergeConfig, UndoableCmd,
    elapsed_between, impl_cmd_accessors,
};

// ============================================================================
// AddNode
// ============================================================================

/// Command that places a new device.
#[derive(Debug)]
pub struct AddNodeCmd {
    /// Device to insert.
    pub device: Device,
    /// Command metadata.
    pub metadata: CommandMetadata,
}

impl AddNodeCmd {
    #[must_use]
    pub fn new(device: Device) -> Self {
        let metadata = CommandMetadata::new(format!("Add {}", device.display_label()));
        Self { device, metadata }
    }
}

impl UndoableCmd for AddNodeCmd {
    fn execute(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        graph.push_device(self.device.clone())?;
        Ok(())
    }

    fn undo(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        graph.remove_device(&self.device.id)?;
        Ok(())
    }

    fn kind(&self) -> CommandKind {
        CommandKind::AddNode
    }

    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.device.heap_bytes() + self.metadata.size_bytes()
    }

    impl_cmd_accessors!("AddNodeCmd");
}

// ============================================================================
// DeleteNode
// ============================================================================

/// What a device deletion removed, with original indices.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RemovedDevice {
    pub(crate) index: usize,
    pub(crate) device: Device,
}

/// Remove `links` (given with their indices, ascending) and then `ids`,
/// rolling everything back if any step fails.
///
/// Links are removed from the highest index down so the recorded indices
/// stay valid; restoring in ascending order then rebuilds the original
/// layout.
pub(crate) fn remove_cascade(
    graph: &mut TopologyGraph,
    ids: &[DeviceId],
    links: &[(usize, Link)],
) -> Result<Vec<RemovedDevice>, GraphError> {
    let mut removed_links: Vec<(usize, Link)> = Vec::with_capacity(links.len());
    for (_, link) in links.iter().rev() {
        match graph.remove_link(&link.id) {
            Ok(entry) => removed_links.push(entry),
            Err(err) => {
                restore_links(graph, removed_links.iter().rev());
                return Err(err);
            }
        }
    }

    let mut removed: Vec<RemovedDevice> = Vec::with_capacity(ids.len());
    for id in ids {
        match graph.remove_device(id) {
            Ok((index, device)) => removed.push(RemovedDevice { index, device }),
            Err(err) => {
                restore_devices(graph, removed.iter().rev());
                restore_links(graph, removed_links.iter().rev());
                return Err(err);
            }
        }
    }
    Ok(removed)
}

/// Reinsert devices (in reverse removal order) and then their links
/// (ascending index order).
pub(crate) fn restore_cascade(
    graph: &mut TopologyGraph,
    devices: &[RemovedDevice],
    links: &[(usize, Link)],
) -> CommandResult {
    for entry in devices.iter().rev() {
        graph.insert_device_at(entry.index, entry.device.clone())?;
    }
    for (index, link) in links {
        graph.insert_link_at(*index, link.clone())?;
    }
    Ok(())
}

fn restore_links<'a>(graph: &mut TopologyGraph, links: impl Iterator<Item = &'a (usize, Link)>) {
    for (index, link) in links {
        let _ = graph.insert_link_at(*index, link.clone());
    }
}

fn restore_devices<'a>(
    graph: &mut TopologyGraph,
    devices: impl Iterator<Item = &'a RemovedDevice>,
) {
    for entry in devices {
        let _ = graph.insert_device_at(entry.index, entry.device.clone());
    }
}

/// Command that deletes a device together with every link attached to it.
///
/// The incident links are captured when the command executes, not when it
/// is built, so the cascade always matches the graph it runs against.
#[derive(Debug)]
pub struct DeleteNodeCmd {
    /// Device to delete.
    pub id: DeviceId,
    /// Command metadata.
    pub metadata: CommandMetadata,
    removed: Option<RemovedDevice>,
    links: Vec<(usize, Link)>,
}

impl DeleteNodeCmd {
    #[must_use]
    pub fn new(id: impl Into<DeviceId>, label: &str) -> Self {
        Self {
            id: id.into(),
            metadata: CommandMetadata::new(format!("Delete {label}")),
            removed: None,
            links: Vec::new(),
        }
    }

    /// Links removed by the last execution, with their original indices.
    #[must_use]
    pub fn removed_links(&self) -> &[(usize, Link)] {
        &self.links
    }
}

impl UndoableCmd for DeleteNodeCmd {
    fn execute(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        if !graph.contains_device(&self.id) {
            return Err(GraphError::DeviceNotFound(self.id.clone()).into());
        }
        let links = graph.incident_links(&self.id);
        let mut removed = remove_cascade(graph, std::slice::from_ref(&self.id), &links)?;
        self.removed = removed.pop();
        self.links = links;
        Ok(())
    }

    fn undo(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        let Some(removed) = &self.removed else {
            return Err(CommandError::InvalidState(
                "device deletion was never executed".to_string(),
            ));
        };
        restore_cascade(graph, std::slice::from_ref(removed), &self.links)
    }

    fn kind(&self) -> CommandKind {
        CommandKind::DeleteNode
    }

    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.id.as_str().len()
            + self.removed.as_ref().map_or(0, |r| r.device.heap_bytes())
            + self.links.iter().map(|(_, l)| l.heap_bytes()).sum::<usize>()
            + self.metadata.size_bytes()
    }

    impl_cmd_accessors!("DeleteNodeCmd");
}

// ============================================================================
// MoveNode
// ============================================================================

/// Command that repositions a device.
///
/// Successive moves of the same device issued within the move window
/// collapse into one step that keeps the first origin and the latest
/// destination, so a whole drag undoes at once.
#[derive(Debug)]
pub struct MoveNodeCmd {
    /// Device being moved.
    pub id: DeviceId,
    /// Position before the move.
    pub from: Position,
    /// Position after the move.
    pub to: Position,
    /// Command metadata.
    pub metadata: CommandMetadata,
}

impl MoveNodeCmd {
    #[must_use]
    pub fn new(id: impl Into<DeviceId>, label: &str, from: Position, to: Position) -> Self {
        Self {
            id: id.into(),
            from,
            to,
            metadata: CommandMetadata::new(format!("Move {label}")),
        }
    }
}

impl UndoableCmd for MoveNodeCmd {
    fn execute(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        graph.set_position(&self.id, self.to)?;
        Ok(())
    }

    fn undo(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        graph.set_position(&self.id, self.from)?;
        Ok(())
    }

    fn kind(&self) -> CommandKind {
        CommandKind::MoveNode
    }

    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.id.as_str().len() + self.metadata.size_bytes()
    }

    fn can_merge(&self, other: &dyn UndoableCmd, config: &MergeConfig) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        if self.id != other.id {
            return false;
        }
        // Anchored on the first move so a drag cannot extend forever.
        elapsed_between(self.metadata.timestamp, other.metadata.timestamp) < config.move_window
    }

    fn accept_merge(&mut self, other: &dyn UndoableCmd) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        self.to = other.to;
        true
    }

    impl_cmd_accessors!("MoveNodeCmd");
}

// ============================================================================
// UpdateNode
// ============================================================================

/// Command that replaces a device's attribute record.
#[derive(Debug)]
pub struct UpdateNodeCmd {
    /// Device being edited.
    pub id: DeviceId,
    /// Attributes before the edit.
    pub before: DeviceAttributes,
    /// Attributes after the edit.
    pub after: DeviceAttributes,
    /// Command metadata.
    pub metadata: CommandMetadata,
}

impl UpdateNodeCmd {
    #[must_use]
    pub fn new(id: impl Into<DeviceId>, before: DeviceAttributes, after: DeviceAttributes) -> Self {
        let metadata = CommandMetadata::new(describe_update(&before, &after));
        Self {
            id: id.into(),
            before,
            after,
            metadata,
        }
    }
}

fn describe_update(before: &DeviceAttributes, after: &DeviceAttributes) -> String {
    let fields = before.changed_fields(after);
    let label = if before.label.is_empty() {
        &after.label
    } else {
        &before.label
    };
    if fields.is_empty() {
        format!("Update {label}")
    } else {
        format!("Update {label} ({})", fields.join(", "))
    }
}

impl UndoableCmd for UpdateNodeCmd {
    fn execute(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        graph.set_device_attributes(&self.id, self.after.clone())?;
        Ok(())
    }

    fn undo(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        graph.set_device_attributes(&self.id, self.before.clone())?;
        Ok(())
    }

    fn kind(&self) -> CommandKind {
        CommandKind::UpdateNode
    }

    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.id.as_str().len()
            + self.before.heap_bytes()
            + self.after.heap_bytes()
            + self.metadata.size_bytes()
    }

    fn can_merge(&self, other: &dyn UndoableCmd, config: &MergeConfig) -> bool {
        config.coalesce_updates
            && other
                .as_any()
                .downcast_ref::<Self>()
                .is_some_and(|o| o.id == self.id)
    }

    fn accept_merge(&mut self, other: &dyn UndoableCmd) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        self.after = other.after.clone();
        self.metadata.description = describe_update(&self.before, &self.after);
        true
    }

    impl_cmd_accessors!("UpdateNodeCmd");
}

// ============================================================================
// Tests
// ============================================================================
