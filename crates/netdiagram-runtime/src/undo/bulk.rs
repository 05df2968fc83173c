#![forbid(unsafe_code)]

//! Composite commands.
//!
//! [`CommandBatch`] groups arbitrary commands into one undo step. The bulk
//! commands cover multi-selection edits directly, computing their cascade
//! once for the whole group instead of per device.

use std::collections::HashSet;
use std::fmt;

use netdiagram_core::{
    DeviceAttributes, DeviceId, Link, LinkAttributes, LinkId, Position, TopologyGraph,
};

use super::command::{
    CommandError, CommandKind, CommandMetadata, CommandResult, MergeConfig, UndoableCmd,
    elapsed_between, impl_cmd_accessors,
};
use super::nodes::{RemovedDevice, remove_cascade, restore_cascade};

// ============================================================================
// CommandBatch
// ============================================================================

/// A batch of commands executed and undone together.
///
/// Commands run in insertion order and are undone in reverse. If any step
/// fails, the steps already applied are reverted before the error is
/// returned, so a batch is all-or-nothing.
///
/// A batch on top of history keeps growing while follow-up work arrives
/// within the smart-merge window: another batch is appended if the combined
/// length fits [`MergeConfig::batch_max_len`], a single edit while the batch
/// is below it. Whole-diagram commands are never absorbed.
pub struct CommandBatch {
    /// Commands in execution order.
    commands: Vec<Box<dyn UndoableCmd>>,
    /// Batch metadata.
    metadata: CommandMetadata,
    /// Number of leading commands currently applied.
    executed_to: usize,
}

impl fmt::Debug for CommandBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBatch")
            .field("commands_count", &self.commands.len())
            .field("metadata", &self.metadata)
            .field("executed_to", &self.executed_to)
            .finish()
    }
}

impl CommandBatch {
    /// Create a new command batch.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            commands: Vec::new(),
            metadata: CommandMetadata::new(description),
            executed_to: 0,
        }
    }

    /// Add a command to the batch.
    pub fn push(&mut self, cmd: Box<dyn UndoableCmd>) {
        self.commands.push(cmd);
    }

    /// Builder form of [`push`](Self::push).
    #[must_use]
    pub fn with(mut self, cmd: impl UndoableCmd + 'static) -> Self {
        self.commands.push(Box::new(cmd));
        self
    }

    /// Number of commands in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Check if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Descriptions of the contained commands, in execution order.
    pub fn descriptions(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(|c| c.description())
    }
}

impl UndoableCmd for CommandBatch {
    fn execute(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        for i in 0..self.commands.len() {
            if let Err(e) = self.commands[i].execute(graph) {
                // Rollback executed commands on failure
                for j in (0..i).rev() {
                    let _ = self.commands[j].undo(graph);
                }
                self.executed_to = 0;
                return Err(e);
            }
            self.executed_to = i + 1;
        }
        Ok(())
    }

    fn undo(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        let applied = self.executed_to;
        for i in (0..applied).rev() {
            if let Err(e) = self.commands[i].undo(graph) {
                for j in i + 1..applied {
                    let _ = self.commands[j].redo(graph);
                }
                return Err(e);
            }
        }
        self.executed_to = 0;
        Ok(())
    }

    fn kind(&self) -> CommandKind {
        CommandKind::Batch
    }

    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.metadata.size_bytes()
            + self.commands.iter().map(|c| c.size_bytes()).sum::<usize>()
    }

    fn can_merge(&self, other: &dyn UndoableCmd, config: &MergeConfig) -> bool {
        let cap = config.batch_max_len;
        if cap == 0 || self.executed_to != self.commands.len() {
            return false;
        }
        if elapsed_between(self.metadata.last_activity, other.metadata().timestamp)
            > config.smart_merge_window
        {
            return false;
        }
        match other.as_any().downcast_ref::<Self>() {
            Some(batch) => !batch.is_empty() && self.len() + batch.len() <= cap,
            None => !other.kind().is_whole_state() && self.len() < cap,
        }
    }

    fn accept_merge_owned(
        &mut self,
        mut other: Box<dyn UndoableCmd>,
    ) -> Result<(), Box<dyn UndoableCmd>> {
        let description = format!("{} + {}", self.metadata.description, other.description());
        if other.as_any().is::<Self>() {
            if let Some(batch) = other.as_any_mut().downcast_mut::<Self>() {
                self.commands.append(&mut batch.commands);
            }
        } else {
            self.commands.push(other);
        }
        self.executed_to = self.commands.len();
        self.metadata.description = description;
        Ok(())
    }

    impl_cmd_accessors!("CommandBatch");
}

// ============================================================================
// BulkDelete
// ============================================================================

/// Deletes a selection of devices and links in one step.
///
/// Links attached to any selected device are removed with it. Selected IDs
/// that are no longer present are skipped; a selection with nothing left
/// to delete fails.
#[derive(Debug)]
pub struct BulkDeleteCmd {
    pub devices: Vec<DeviceId>,
    pub links: Vec<LinkId>,
    pub metadata: CommandMetadata,
    removed_devices: Vec<RemovedDevice>,
    removed_links: Vec<(usize, Link)>,
}

impl BulkDeleteCmd {
    #[must_use]
    pub fn new(devices: Vec<DeviceId>, links: Vec<LinkId>) -> Self {
        let description = match (devices.len(), links.len()) {
            (0, n) => format!("Delete {n} link(s)"),
            (n, 0) => format!("Delete {n} device(s)"),
            (d, l) => format!("Delete {d} device(s) and {l} link(s)"),
        };
        Self {
            devices,
            links,
            metadata: CommandMetadata::new(description),
            removed_devices: Vec::new(),
            removed_links: Vec::new(),
        }
    }

    /// Links removed by the last execution (selected and cascaded).
    #[must_use]
    pub fn removed_links(&self) -> &[(usize, Link)] {
        &self.removed_links
    }

    fn cascade(&self, graph: &TopologyGraph) -> (Vec<DeviceId>, Vec<(usize, Link)>) {
        let mut seen = HashSet::new();
        let ids: Vec<DeviceId> = self
            .devices
            .iter()
            .filter(|id| graph.contains_device(id) && seen.insert(*id))
            .cloned()
            .collect();
        let selected: HashSet<&LinkId> = self.links.iter().collect();
        let links = graph
            .links()
            .iter()
            .enumerate()
            .filter(|(_, l)| selected.contains(&l.id) || ids.iter().any(|id| l.touches(id)))
            .map(|(i, l)| (i, l.clone()))
            .collect();
        (ids, links)
    }
}

impl UndoableCmd for BulkDeleteCmd {
    fn execute(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        let (ids, links) = self.cascade(graph);
        if ids.is_empty() && links.is_empty() {
            return Err(CommandError::TargetNotFound(
                "none of the selected devices or links exist".to_string(),
            ));
        }
        self.removed_devices = remove_cascade(graph, &ids, &links)?;
        self.removed_links = links;
        Ok(())
    }

    fn undo(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        restore_cascade(graph, &self.removed_devices, &self.removed_links)
    }

    fn kind(&self) -> CommandKind {
        CommandKind::BulkDelete
    }

    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.devices.iter().map(|d| d.as_str().len()).sum::<usize>()
            + self.links.iter().map(|l| l.as_str().len()).sum::<usize>()
            + self
                .removed_devices
                .iter()
                .map(|r| r.device.heap_bytes())
                .sum::<usize>()
            + self
                .removed_links
                .iter()
                .map(|(_, l)| l.heap_bytes())
                .sum::<usize>()
            + self.metadata.size_bytes()
    }

    impl_cmd_accessors!("BulkDeleteCmd");
}

// ============================================================================
// BulkMove
// ============================================================================

/// One device's displacement within a [`BulkMoveCmd`].
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceMove {
    pub id: DeviceId,
    pub from: Position,
    pub to: Position,
}

/// Moves several devices at once.
///
/// Like [`MoveNodeCmd`](super::nodes::MoveNodeCmd), successive bulk moves
/// of the identical device set within the move window collapse into one.
#[derive(Debug)]
pub struct BulkMoveCmd {
    pub moves: Vec<DeviceMove>,
    pub metadata: CommandMetadata,
}

impl BulkMoveCmd {
    #[must_use]
    pub fn new(moves: Vec<DeviceMove>) -> Self {
        let description = format!("Move {} device(s)", moves.len());
        Self {
            moves,
            metadata: CommandMetadata::new(description),
        }
    }

    fn id_set(&self) -> HashSet<&DeviceId> {
        self.moves.iter().map(|m| &m.id).collect()
    }

    fn apply(&self, graph: &mut TopologyGraph, forward: bool) -> CommandResult {
        for (i, m) in self.moves.iter().enumerate() {
            let target = if forward { m.to } else { m.from };
            if let Err(err) = graph.set_position(&m.id, target) {
                for done in self.moves[..i].iter().rev() {
                    let back = if forward { done.from } else { done.to };
                    let _ = graph.set_position(&done.id, back);
                }
                return Err(err.into());
            }
        }
        Ok(())
    }
}

impl UndoableCmd for BulkMoveCmd {
    fn execute(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        self.apply(graph, true)
    }

    fn undo(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        self.apply(graph, false)
    }

    fn kind(&self) -> CommandKind {
        CommandKind::BulkMove
    }

    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self
                .moves
                .iter()
                .map(|m| std::mem::size_of::<DeviceMove>() + m.id.as_str().len())
                .sum::<usize>()
            + self.metadata.size_bytes()
    }

    fn can_merge(&self, other: &dyn UndoableCmd, config: &MergeConfig) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        self.id_set() == other.id_set()
            && elapsed_between(self.metadata.timestamp, other.metadata.timestamp)
                < config.move_window
    }

    fn accept_merge(&mut self, other: &dyn UndoableCmd) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        for m in &mut self.moves {
            if let Some(next) = other.moves.iter().find(|n| n.id == m.id) {
                m.to = next.to;
            }
        }
        true
    }

    impl_cmd_accessors!("BulkMoveCmd");
}

// ============================================================================
// BulkUpdate
// ============================================================================

/// One device's attribute change within a [`BulkUpdateCmd`].
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceUpdate {
    pub id: DeviceId,
    pub before: DeviceAttributes,
    pub after: DeviceAttributes,
}

/// One link's attribute change within a [`BulkUpdateCmd`].
#[derive(Debug, Clone, PartialEq)]
pub struct LinkUpdate {
    pub id: LinkId,
    pub before: LinkAttributes,
    pub after: LinkAttributes,
}

/// Applies attribute edits to several devices and links at once.
///
/// Device edits are applied first, then link edits; a failure anywhere
/// reverts everything already applied. Successive bulk updates over the
/// identical selection coalesce, keeping the first `before` values.
#[derive(Debug)]
pub struct BulkUpdateCmd {
    pub devices: Vec<DeviceUpdate>,
    pub links: Vec<LinkUpdate>,
    pub metadata: CommandMetadata,
}

impl BulkUpdateCmd {
    #[must_use]
    pub fn new(devices: Vec<DeviceUpdate>, links: Vec<LinkUpdate>) -> Self {
        let description = match (devices.len(), links.len()) {
            (0, n) => format!("Update {n} link(s)"),
            (n, 0) => format!("Update {n} device(s)"),
            (d, l) => format!("Update {d} device(s) and {l} link(s)"),
        };
        Self {
            devices,
            links,
            metadata: CommandMetadata::new(description),
        }
    }

    fn selection(&self) -> (HashSet<&DeviceId>, HashSet<&LinkId>) {
        (
            self.devices.iter().map(|u| &u.id).collect(),
            self.links.iter().map(|u| &u.id).collect(),
        )
    }

    fn apply(&self, graph: &mut TopologyGraph, forward: bool) -> CommandResult {
        let device_attrs = |u: &DeviceUpdate, fwd: bool| {
            if fwd { u.after.clone() } else { u.before.clone() }
        };
        let link_attrs = |u: &LinkUpdate, fwd: bool| {
            if fwd { u.after.clone() } else { u.before.clone() }
        };
        let revert_devices = |graph: &mut TopologyGraph, done: &[DeviceUpdate]| {
            for u in done.iter().rev() {
                let _ = graph.set_device_attributes(&u.id, device_attrs(u, !forward));
            }
        };

        for (i, u) in self.devices.iter().enumerate() {
            if let Err(err) = graph.set_device_attributes(&u.id, device_attrs(u, forward)) {
                revert_devices(graph, &self.devices[..i]);
                return Err(err.into());
            }
        }
        for (i, u) in self.links.iter().enumerate() {
            if let Err(err) = graph.set_link_attributes(&u.id, link_attrs(u, forward)) {
                for done in self.links[..i].iter().rev() {
                    let _ = graph.set_link_attributes(&done.id, link_attrs(done, !forward));
                }
                revert_devices(graph, &self.devices);
                return Err(err.into());
            }
        }
        Ok(())
    }
}

impl UndoableCmd for BulkUpdateCmd {
    fn execute(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        self.apply(graph, true)
    }

    fn undo(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        self.apply(graph, false)
    }

    fn kind(&self) -> CommandKind {
        CommandKind::BulkUpdate
    }

    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self
                .devices
                .iter()
                .map(|u| u.id.as_str().len() + u.before.heap_bytes() + u.after.heap_bytes())
                .sum::<usize>()
            + self
                .links
                .iter()
                .map(|u| u.id.as_str().len() + u.before.heap_bytes() + u.after.heap_bytes())
                .sum::<usize>()
            + self.metadata.size_bytes()
    }

    fn can_merge(&self, other: &dyn UndoableCmd, config: &MergeConfig) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        config.coalesce_updates && self.selection() == other.selection()
    }

    fn accept_merge(&mut self, other: &dyn UndoableCmd) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        for u in &mut self.devices {
            if let Some(next) = other.devices.iter().find(|n| n.id == u.id) {
                u.after = next.after.clone();
            }
        }
        for u in &mut self.links {
            if let Some(next) = other.links.iter().find(|n| n.id == u.id) {
                u.after = next.after.clone();
            }
        }
        true
    }

    impl_cmd_accessors!("BulkUpdateCmd");
}

// ============================================================================
// Tests
// ============================================================================
