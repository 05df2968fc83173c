#![forbid(unsafe_code)]

//! Headless diagram editor.
//!
//! [`DiagramEditor`] turns user gestures (place a device, draw a link,
//! drag, edit, delete, paste) into undoable commands and runs them on an
//! [`UndoEngine`]. It is the only place that consults the connection
//! validator: a rejected connection never becomes a command.
//!
//! Rendering code reads [`graph`](DiagramEditor::graph) and
//! [`history_info`](DiagramEditor::history_info); nothing else mutates the
//! topology.

use std::collections::HashMap;

use netdiagram_core::{
    Device, DeviceAttributes, DeviceId, DeviceNumbering, DeviceType, ImportStrategy, Link,
    LinkAttributes, LinkId, PortStatus, Position, Rejection, TopologyGraph, TopologySnapshot,
    ValidationResult, validate,
};
use netdiagram_runtime::undo::{
    AddEdgeCmd, AddNodeCmd, BulkDeleteCmd, BulkMoveCmd, BulkUpdateCmd, ClearAllCmd, CommandBatch,
    DeleteEdgeCmd, DeleteNodeCmd, DeviceMove, DeviceUpdate, ImportCmd, LinkUpdate, LoadProjectCmd,
    MoveNodeCmd, UpdateEdgeCmd, UpdateNodeCmd,
};
use netdiagram_runtime::{
    EngineConfig, ExecuteOutcome, HistoryEntry, HistoryError, HistoryInfo, UndoEngine,
    UndoableCmd,
};
use thiserror::Error;

const TARGET: &str = "netdiagram.editor";

/// Offset applied to pasted devices so they do not cover the originals.
pub const PASTE_OFFSET: (f64, f64) = (50.0, 50.0);

/// Errors surfaced by editor gestures.
#[derive(Debug, Error)]
pub enum EditorError {
    /// The validator refused the connection; nothing was recorded.
    #[error("connection rejected: {0}")]
    Rejected(Rejection),
    #[error("device '{0}' not found")]
    UnknownDevice(DeviceId),
    #[error("link '{0}' not found")]
    UnknownLink(LinkId),
    /// A selection-based gesture had nothing to act on.
    #[error("nothing selected")]
    EmptySelection,
    #[error(transparent)]
    History(#[from] HistoryError),
}

/// Devices and their internal links, copied for a later paste.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Clipboard {
    devices: Vec<Device>,
    links: Vec<Link>,
}

impl Clipboard {
    #[must_use]
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    #[must_use]
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Gesture-level editing surface over an [`UndoEngine`].
#[derive(Debug, Default)]
pub struct DiagramEditor {
    engine: UndoEngine,
}

impl DiagramEditor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self::from_engine(UndoEngine::with_config(config))
    }

    #[must_use]
    pub fn from_engine(engine: UndoEngine) -> Self {
        Self { engine }
    }

    #[must_use]
    pub fn engine(&self) -> &UndoEngine {
        &self.engine
    }

    #[must_use]
    pub fn graph(&self) -> &TopologyGraph {
        self.engine.graph()
    }

    #[must_use]
    pub fn port_status(&self, id: &DeviceId) -> Option<PortStatus> {
        self.graph().port_status(id)
    }

    // ========================================================================
    // Devices
    // ========================================================================

    /// Place a new device with the next default label for its type.
    pub fn add_device(
        &mut self,
        device_type: DeviceType,
        position: Position,
    ) -> Result<DeviceId, EditorError> {
        let (id, label) = DeviceNumbering::from_devices(self.graph().devices()).allocate(device_type);
        let device = Device::with_defaults(id.clone(), device_type, position, label);
        self.run(AddNodeCmd::new(device))?;
        Ok(id)
    }

    /// Move one device. Consecutive moves during a drag merge into one step.
    pub fn move_device(
        &mut self,
        id: &DeviceId,
        to: Position,
    ) -> Result<ExecuteOutcome, EditorError> {
        let device = self.device(id)?;
        let cmd = MoveNodeCmd::new(id.clone(), device.display_label(), device.position, to);
        self.run(cmd)
    }

    /// Move several devices as one step.
    pub fn move_devices(
        &mut self,
        moves: &[(DeviceId, Position)],
    ) -> Result<ExecuteOutcome, EditorError> {
        if moves.is_empty() {
            return Err(EditorError::EmptySelection);
        }
        let moves = moves
            .iter()
            .map(|(id, to)| {
                self.device(id).map(|d| DeviceMove {
                    id: id.clone(),
                    from: d.position,
                    to: *to,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.run(BulkMoveCmd::new(moves))
    }

    /// Replace a device's attributes.
    pub fn update_device(
        &mut self,
        id: &DeviceId,
        attributes: DeviceAttributes,
    ) -> Result<ExecuteOutcome, EditorError> {
        let before = self.device(id)?.attributes.clone();
        self.run(UpdateNodeCmd::new(id.clone(), before, attributes))
    }

    /// Delete a device together with its links.
    pub fn delete_device(&mut self, id: &DeviceId) -> Result<(), EditorError> {
        let label = self.device(id)?.display_label().to_string();
        self.run(DeleteNodeCmd::new(id.clone(), &label))?;
        Ok(())
    }

    // ========================================================================
    // Links
    // ========================================================================

    /// What the validator would say about linking `source` to `target`.
    pub fn check_connection(
        &self,
        source: &DeviceId,
        target: &DeviceId,
    ) -> Result<ValidationResult, EditorError> {
        let source = self.device(source)?;
        let target = self.device(target)?;
        Ok(validate(source, target, self.graph().links()))
    }

    /// Link two devices if the validator allows it.
    pub fn connect(&mut self, source: &DeviceId, target: &DeviceId) -> Result<LinkId, EditorError> {
        let verdict = self.check_connection(source, target)?;
        if let Err(rejection) = verdict.into_result() {
            tracing::debug!(
                target: TARGET,
                source = %source,
                target_device = %target,
                reason = %rejection,
                "connection rejected"
            );
            return Err(EditorError::Rejected(rejection));
        }

        let (from, to) = (self.device(source)?, self.device(target)?);
        let attributes = LinkAttributes::derived_from(from, to);
        let (from_label, to_label) = (from.display_label().to_string(), to.display_label().to_string());
        let id = unique_link_id(self.graph(), source, target);
        let link = Link::new(id.clone(), source.clone(), target.clone(), attributes);
        self.run(AddEdgeCmd::new(link, &from_label, &to_label))?;
        Ok(id)
    }

    /// Replace a link's attributes.
    pub fn update_link(
        &mut self,
        id: &LinkId,
        attributes: LinkAttributes,
    ) -> Result<ExecuteOutcome, EditorError> {
        let before = self.link(id)?.attributes.clone();
        self.run(UpdateEdgeCmd::new(id.clone(), before, attributes))
    }

    pub fn delete_link(&mut self, id: &LinkId) -> Result<(), EditorError> {
        let label = self.link(id)?.attributes.label.clone();
        self.run(DeleteEdgeCmd::new(id.clone(), &label))?;
        Ok(())
    }

    // ========================================================================
    // Selections
    // ========================================================================

    /// Delete selected devices (with their links) and selected links as
    /// one step. IDs that no longer exist are ignored.
    pub fn delete_selection(
        &mut self,
        devices: &[DeviceId],
        links: &[LinkId],
    ) -> Result<(), EditorError> {
        let graph = self.graph();
        let devices: Vec<DeviceId> =
            devices.iter().filter(|id| graph.contains_device(id)).cloned().collect();
        let links: Vec<LinkId> = links.iter().filter(|id| graph.contains_link(id)).cloned().collect();
        if devices.is_empty() && links.is_empty() {
            return Err(EditorError::EmptySelection);
        }
        self.run(BulkDeleteCmd::new(devices, links))?;
        Ok(())
    }

    /// Replace the attributes of several devices and links as one step.
    ///
    /// Every ID must exist. Repeating the edit on the same selection
    /// coalesces with the previous one.
    pub fn update_selection(
        &mut self,
        devices: Vec<(DeviceId, DeviceAttributes)>,
        links: Vec<(LinkId, LinkAttributes)>,
    ) -> Result<ExecuteOutcome, EditorError> {
        if devices.is_empty() && links.is_empty() {
            return Err(EditorError::EmptySelection);
        }
        let devices = devices
            .into_iter()
            .map(|(id, after)| {
                let before = self.device(&id)?.attributes.clone();
                Ok(DeviceUpdate { id, before, after })
            })
            .collect::<Result<Vec<_>, EditorError>>()?;
        let links = links
            .into_iter()
            .map(|(id, after)| {
                let before = self.link(&id)?.attributes.clone();
                Ok(LinkUpdate { id, before, after })
            })
            .collect::<Result<Vec<_>, EditorError>>()?;
        self.run(BulkUpdateCmd::new(devices, links))
    }

    /// Copy the selected devices and the links running between them.
    #[must_use]
    pub fn copy(&self, selection: &[DeviceId]) -> Clipboard {
        let graph = self.graph();
        let devices: Vec<Device> = graph
            .devices()
            .iter()
            .filter(|d| selection.contains(&d.id))
            .cloned()
            .collect();
        let links = graph
            .links()
            .iter()
            .filter(|l| selection.contains(&l.source) && selection.contains(&l.target))
            .cloned()
            .collect();
        Clipboard { devices, links }
    }

    /// Paste a clipboard as one step, shifted by `offset`.
    ///
    /// Pasted devices get fresh IDs and the next default labels for their
    /// types; other attributes are kept. Returns the new device IDs in
    /// clipboard order.
    pub fn paste(
        &mut self,
        clipboard: &Clipboard,
        offset: (f64, f64),
    ) -> Result<Vec<DeviceId>, EditorError> {
        if clipboard.is_empty() {
            return Err(EditorError::EmptySelection);
        }
        let graph = self.graph();
        let mut numbering = DeviceNumbering::from_devices(graph.devices());
        let mut renamed: HashMap<&DeviceId, (DeviceId, String)> = HashMap::new();
        let mut commands: Vec<Box<dyn UndoableCmd>> = Vec::new();

        for device in &clipboard.devices {
            let (id, label) = numbering.allocate(device.device_type);
            let attributes = DeviceAttributes {
                label: label.clone(),
                ..device.attributes.clone()
            };
            let position = device.position.offset(offset.0, offset.1);
            let copy = Device::new(id.clone(), device.device_type, position, attributes);
            commands.push(Box::new(AddNodeCmd::new(copy)));
            renamed.insert(&device.id, (id, label));
        }

        let mut pasted_links = 0;
        for link in &clipboard.links {
            let (Some((source, source_label)), Some((target, target_label))) =
                (renamed.get(&link.source), renamed.get(&link.target))
            else {
                continue;
            };
            let id = unique_link_id(graph, source, target);
            let copy = Link::new(id, source.clone(), target.clone(), link.attributes.clone());
            commands.push(Box::new(AddEdgeCmd::new(copy, source_label, target_label)));
            pasted_links += 1;
        }

        let ids: Vec<DeviceId> = clipboard
            .devices
            .iter()
            .filter_map(|d| renamed.get(&d.id).map(|(id, _)| id.clone()))
            .collect();
        let mut batch = CommandBatch::new(format!(
            "Paste {} device(s) and {pasted_links} link(s)",
            ids.len()
        ));
        for cmd in commands {
            batch.push(cmd);
        }
        self.run(batch)?;
        Ok(ids)
    }

    // ========================================================================
    // Whole diagram
    // ========================================================================

    pub fn clear_all(&mut self) -> Result<(), EditorError> {
        self.run(ClearAllCmd::new())?;
        Ok(())
    }

    /// Combine an imported topology with the current one per `strategy`.
    pub fn import(
        &mut self,
        imported: TopologySnapshot,
        strategy: ImportStrategy,
        file_name: &str,
    ) -> Result<(), EditorError> {
        self.run(ImportCmd::new(imported, strategy, file_name))?;
        Ok(())
    }

    /// Replace the diagram with a saved project. Undoable.
    pub fn load_project(
        &mut self,
        project: TopologySnapshot,
        name: Option<String>,
    ) -> Result<(), EditorError> {
        self.run(LoadProjectCmd::new(project, name))?;
        Ok(())
    }

    // ========================================================================
    // History
    // ========================================================================

    pub fn undo(&mut self) -> Option<Result<String, EditorError>> {
        self.engine.undo().map(|r| r.map_err(EditorError::from))
    }

    pub fn redo(&mut self) -> Option<Result<String, EditorError>> {
        self.engine.redo().map(|r| r.map_err(EditorError::from))
    }

    /// Undo back to the entry at `index` (oldest is 0).
    pub fn undo_to_point(&mut self, index: usize) -> Result<usize, EditorError> {
        Ok(self.engine.undo_to_point(index)?)
    }

    #[must_use]
    pub fn history_info(&self) -> HistoryInfo {
        self.engine.history_info()
    }

    /// Undo entries with their kinds and times, oldest first.
    #[must_use]
    pub fn history_entries(&self) -> Vec<HistoryEntry> {
        self.engine.history_entries()
    }

    pub fn clear_history(&mut self) {
        self.engine.clear_history();
    }

    /// Forward the host's next tick to the engine.
    pub fn tick(&mut self) -> bool {
        self.engine.tick()
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn run(&mut self, cmd: impl UndoableCmd + 'static) -> Result<ExecuteOutcome, EditorError> {
        let kind = cmd.kind();
        let outcome = self.engine.execute(cmd)?;
        tracing::debug!(target: TARGET, kind = %kind, outcome = ?outcome, "gesture recorded");
        Ok(outcome)
    }

    fn device(&self, id: &DeviceId) -> Result<&Device, EditorError> {
        self.graph()
            .device(id)
            .ok_or_else(|| EditorError::UnknownDevice(id.clone()))
    }

    fn link(&self, id: &LinkId) -> Result<&Link, EditorError> {
        self.graph()
            .link(id)
            .ok_or_else(|| EditorError::UnknownLink(id.clone()))
    }
}

/// Conventional link ID for the pair, suffixed if already taken.
fn unique_link_id(graph: &TopologyGraph, source: &DeviceId, target: &DeviceId) -> LinkId {
    let base = LinkId::between(source, target);
    let mut id = base.clone();
    let mut suffix = 1;
    while graph.contains_link(&id) {
        suffix += 1;
        id = LinkId::new(format!("{base}-{suffix}"));
    }
    id
}

// ============================================================================
// Tests
// ============================================================================
