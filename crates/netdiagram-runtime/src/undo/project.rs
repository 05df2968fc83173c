#![forbid(unsafe_code)]

//! Whole-state commands: clear, import, load.
//!
//! These replace the entire topology. Each holds the snapshot it installs
//! and, once executed, the snapshot it displaced, so execute and undo are
//! full-state swaps.

use netdiagram_core::{ImportStrategy, TopologyGraph, TopologySnapshot};

use super::command::{
    CommandError, CommandKind, CommandMetadata, CommandResult, CommandSource, UndoableCmd,
    impl_cmd_accessors,
};

/// Before/after pair of a full-state swap.
#[derive(Debug, Default)]
struct StateSwap {
    before: Option<TopologySnapshot>,
    after: TopologySnapshot,
}

impl StateSwap {
    fn apply(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        self.before = Some(graph.restore(self.after.clone())?);
        Ok(())
    }

    fn revert(&self, graph: &mut TopologyGraph) -> CommandResult {
        let Some(before) = &self.before else {
            return Err(CommandError::InvalidState(
                "state swap was never executed".to_string(),
            ));
        };
        graph.restore(before.clone())?;
        Ok(())
    }

    fn size_bytes(&self) -> usize {
        self.before.as_ref().map_or(0, TopologySnapshot::heap_bytes) + self.after.heap_bytes()
    }
}

// ============================================================================
// ClearAll
// ============================================================================

/// Removes every device and link, keeping the project name.
#[derive(Debug)]
pub struct ClearAllCmd {
    pub metadata: CommandMetadata,
    swap: StateSwap,
}

impl ClearAllCmd {
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: CommandMetadata::new("Clear diagram"),
            swap: StateSwap::default(),
        }
    }
}

impl Default for ClearAllCmd {
    fn default() -> Self {
        Self::new()
    }
}

impl UndoableCmd for ClearAllCmd {
    fn execute(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        self.swap.after = TopologySnapshot {
            project_name: graph.project_name().map(str::to_string),
            ..TopologySnapshot::default()
        };
        self.swap.apply(graph)
    }

    fn undo(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        self.swap.revert(graph)
    }

    fn kind(&self) -> CommandKind {
        CommandKind::ClearAll
    }

    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.swap.size_bytes() + self.metadata.size_bytes()
    }

    impl_cmd_accessors!("ClearAllCmd");
}

// ============================================================================
// Import
// ============================================================================

/// Brings an externally parsed topology into the diagram.
///
/// The combined result is computed against the graph at execute time and
/// validated as a whole; an import that would break an invariant (for
/// example an append that duplicates IDs) fails and changes nothing.
#[derive(Debug)]
pub struct ImportCmd {
    pub imported: TopologySnapshot,
    pub strategy: ImportStrategy,
    pub metadata: CommandMetadata,
    swap: StateSwap,
}

impl ImportCmd {
    #[must_use]
    pub fn new(imported: TopologySnapshot, strategy: ImportStrategy, file_name: &str) -> Self {
        let description = format!(
            "Import {file_name} ({strategy}: {} device(s), {} link(s))",
            imported.devices.len(),
            imported.links.len()
        );
        Self {
            imported,
            strategy,
            metadata: CommandMetadata::new(description).with_source(CommandSource::External),
            swap: StateSwap::default(),
        }
    }
}

impl UndoableCmd for ImportCmd {
    fn execute(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        // Redo re-applies the result computed the first time.
        if self.swap.before.is_none() {
            self.swap.after = graph.snapshot().combined(&self.imported, self.strategy);
        }
        self.swap.apply(graph)
    }

    fn undo(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        self.swap.revert(graph)
    }

    fn kind(&self) -> CommandKind {
        CommandKind::Import
    }

    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.imported.heap_bytes()
            + self.swap.size_bytes()
            + self.metadata.size_bytes()
    }

    impl_cmd_accessors!("ImportCmd");
}

// ============================================================================
// LoadProject
// ============================================================================

/// Replaces the diagram with a saved project.
///
/// With `project_name` set the loaded state carries that name; otherwise
/// the name stored in the snapshot is used.
#[derive(Debug)]
pub struct LoadProjectCmd {
    pub metadata: CommandMetadata,
    swap: StateSwap,
}

impl LoadProjectCmd {
    #[must_use]
    pub fn new(mut state: TopologySnapshot, project_name: Option<String>) -> Self {
        if project_name.is_some() {
            state.project_name = project_name;
        }
        let description = match &state.project_name {
            Some(name) => format!("Load project {name}"),
            None => "Load project".to_string(),
        };
        Self {
            metadata: CommandMetadata::new(description).with_source(CommandSource::External),
            swap: StateSwap {
                before: None,
                after: state,
            },
        }
    }
}

impl UndoableCmd for LoadProjectCmd {
    fn execute(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        self.swap.apply(graph)
    }

    fn undo(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        self.swap.revert(graph)
    }

    fn kind(&self) -> CommandKind {
        CommandKind::LoadProject
    }

    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.swap.size_bytes() + self.metadata.size_bytes()
    }

    impl_cmd_accessors!("LoadProjectCmd");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use netdiagram_core::{Device, DeviceType, Link, LinkAttributes, Position};

    fn sample(ids: &[&str]) -> TopologySnapshot {
        let devices = ids
            .iter()
            .map(|id| Device::with_defaults(*id, DeviceType::Router, Position::default(), *id))
            .collect();
        TopologySnapshot::new(devices, Vec::new())
    }

    fn graph() -> TopologyGraph {
        let mut snap = sample(&["r1", "r2"]).with_project_name("campus");
        snap.links.push(Link::new("l", "r1", "r2", LinkAttributes::default()));
        TopologyGraph::from_snapshot(snap).unwrap()
    }

    #[test]
    fn clear_all_keeps_project_name() {
        let mut g = graph();
        let before = g.clone();
        let mut cmd = ClearAllCmd::new();
        cmd.execute(&mut g).unwrap();
        assert!(g.is_empty());
        assert_eq!(g.project_name(), Some("campus"));
        cmd.undo(&mut g).unwrap();
        assert_eq!(g, before);
    }

    #[test]
    fn import_strategies() {
        let mut g = graph();
        let before = g.clone();

        let mut merge = ImportCmd::new(sample(&["r2", "r3"]), ImportStrategy::Merge, "lab.json");
        assert_eq!(
            merge.description(),
            "Import lab.json (merge: 2 device(s), 0 link(s))"
        );
        merge.execute(&mut g).unwrap();
        assert_eq!(g.devices().len(), 3);
        assert_eq!(g.links().len(), 1);
        merge.undo(&mut g).unwrap();
        assert_eq!(g, before);

        let mut replace = ImportCmd::new(sample(&["x"]), ImportStrategy::Replace, "x.json");
        replace.execute(&mut g).unwrap();
        assert_eq!(g.devices().len(), 1);
        assert_eq!(g.project_name(), Some("campus"));
        replace.undo(&mut g).unwrap();
        replace.redo(&mut g).unwrap();
        assert_eq!(g.devices()[0].id, "x".into());
    }

    #[test]
    fn conflicting_append_fails_cleanly() {
        let mut g = graph();
        let before = g.clone();
        let mut cmd = ImportCmd::new(sample(&["r1"]), ImportStrategy::Append, "dup.json");
        assert!(matches!(cmd.execute(&mut g), Err(CommandError::Graph(_))));
        assert_eq!(g, before);
        assert_eq!(cmd.metadata.source, CommandSource::External);
    }

    #[test]
    fn load_project_overrides_name() {
        let mut g = graph();
        let before = g.clone();
        let mut cmd = LoadProjectCmd::new(sample(&["core"]), Some("datacenter".into()));
        assert_eq!(cmd.description(), "Load project datacenter");
        cmd.execute(&mut g).unwrap();
        assert_eq!(g.project_name(), Some("datacenter"));
        cmd.undo(&mut g).unwrap();
        assert_eq!(g, before);
    }

    #[test]
    fn undo_before_execute_is_invalid() {
        let mut g = graph();
        assert!(matches!(
            ClearAllCmd::new().undo(&mut g),
            Err(CommandError::InvalidState(_))
        ));
    }
}
