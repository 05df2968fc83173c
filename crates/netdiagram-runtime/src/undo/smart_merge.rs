#![forbid(unsafe_code)]

//! Fallback coalescing for compatible command kinds.
//!
//! When the top of the undo stack cannot absorb an incoming command
//! itself, the engine may still fold the two into a [`SmartMergeCmd`] if
//! their kinds appear together in [`SMART_MERGE_PAIRS`] and the newcomer
//! arrives within the sliding smart-merge window of the entry's last
//! activity. The wrapper replays its commands in order and reverts them in
//! reverse.

use std::fmt;

use netdiagram_core::TopologyGraph;

use super::command::{
    CommandKind, CommandMetadata, CommandResult, UndoableCmd, impl_cmd_accessors,
};

/// Kind pairs that may share one undo step. Matching is symmetric.
pub const SMART_MERGE_PAIRS: &[(CommandKind, CommandKind)] = &[
    (CommandKind::MoveNode, CommandKind::MoveNode),
    (CommandKind::UpdateNode, CommandKind::UpdateNode),
    (CommandKind::UpdateEdge, CommandKind::UpdateEdge),
    (CommandKind::BulkMove, CommandKind::BulkMove),
    (CommandKind::BulkUpdate, CommandKind::BulkUpdate),
    (CommandKind::MoveNode, CommandKind::UpdateNode),
];

/// Whether commands of kinds `a` and `b` may be smart-merged.
#[must_use]
pub fn kinds_compatible(a: CommandKind, b: CommandKind) -> bool {
    SMART_MERGE_PAIRS
        .iter()
        .any(|&(x, y)| (a == x && b == y) || (a == y && b == x))
}

/// An ordered group of compatible commands forming one undo step.
pub struct SmartMergeCmd {
    commands: Vec<Box<dyn UndoableCmd>>,
    metadata: CommandMetadata,
}

impl fmt::Debug for SmartMergeCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmartMergeCmd")
            .field("commands", &self.commands)
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl SmartMergeCmd {
    /// Wrap `first` (already applied) and `second` (already applied).
    ///
    /// The wrapper inherits the first command's issue time and source.
    #[must_use]
    pub fn new(first: Box<dyn UndoableCmd>, second: Box<dyn UndoableCmd>) -> Self {
        let mut metadata = first.metadata().clone();
        metadata.last_activity = second.metadata().last_activity;
        let mut merged = Self {
            commands: vec![first, second],
            metadata,
        };
        merged.refresh_description();
        merged
    }

    /// Whether `other` is compatible with the group's effective kind.
    #[must_use]
    pub fn accepts(&self, other: &dyn UndoableCmd) -> bool {
        kinds_compatible(self.kind(), other.kind())
    }

    /// Append an already-applied command.
    pub fn absorb(&mut self, cmd: Box<dyn UndoableCmd>) {
        self.metadata.last_activity = cmd.metadata().last_activity;
        self.commands.push(cmd);
        self.refresh_description();
    }

    /// Number of grouped commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    fn refresh_description(&mut self) {
        if let [only] = self.commands.as_slice() {
            self.metadata.description = only.description().to_string();
            return;
        }
        let mut groups: Vec<(CommandKind, usize)> = Vec::new();
        for cmd in &self.commands {
            match groups.iter_mut().find(|(k, _)| *k == cmd.kind()) {
                Some((_, n)) => *n += 1,
                None => groups.push((cmd.kind(), 1)),
            }
        }
        let parts: Vec<String> = groups
            .iter()
            .map(|(kind, n)| format!("{} ({n})", kind.label()))
            .collect();
        self.metadata.description = format!("Combined: {}", parts.join(", "));
    }
}

impl UndoableCmd for SmartMergeCmd {
    fn execute(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        for i in 0..self.commands.len() {
            if let Err(e) = self.commands[i].redo(graph) {
                for j in (0..i).rev() {
                    let _ = self.commands[j].undo(graph);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn undo(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        let n = self.commands.len();
        for i in (0..n).rev() {
            if let Err(e) = self.commands[i].undo(graph) {
                for j in i + 1..n {
                    let _ = self.commands[j].redo(graph);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// The single kind shared by every grouped command, else `SmartMerge`.
    fn kind(&self) -> CommandKind {
        let mut kinds = self.commands.iter().map(|c| c.kind());
        match kinds.next() {
            Some(first) if kinds.all(|k| k == first) => first,
            _ => CommandKind::SmartMerge,
        }
    }

    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.metadata.size_bytes()
            + self.commands.iter().map(|c| c.size_bytes()).sum::<usize>()
    }

    impl_cmd_accessors!("SmartMergeCmd");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::undo::edges::UpdateEdgeCmd;
    use crate::undo::nodes::{MoveNodeCmd, UpdateNodeCmd};
    use netdiagram_core::{Device, DeviceAttributes, DeviceType, LinkAttributes, Position};

    fn graph() -> TopologyGraph {
        let mut g = TopologyGraph::new();
        g.push_device(Device::with_defaults("r1", DeviceType::Router, Position::default(), "Router 1"))
            .unwrap();
        g.push_device(Device::with_defaults("r2", DeviceType::Router, Position::default(), "Router 2"))
            .unwrap();
        g
    }

    fn moved(id: &str, to: f64) -> Box<dyn UndoableCmd> {
        Box::new(MoveNodeCmd::new(id, id, Position::default(), Position::new(to, to)))
    }

    #[test]
    fn compatibility_is_symmetric() {
        assert!(kinds_compatible(CommandKind::MoveNode, CommandKind::UpdateNode));
        assert!(kinds_compatible(CommandKind::UpdateNode, CommandKind::MoveNode));
        assert!(kinds_compatible(CommandKind::BulkMove, CommandKind::BulkMove));
        assert!(!kinds_compatible(CommandKind::MoveNode, CommandKind::BulkMove));
        assert!(!kinds_compatible(CommandKind::AddNode, CommandKind::AddNode));
        assert!(!kinds_compatible(CommandKind::UpdateEdge, CommandKind::UpdateNode));
    }

    #[test]
    fn kind_is_shared_kind_or_smart_merge() {
        let same = SmartMergeCmd::new(moved("r1", 1.0), moved("r2", 2.0));
        assert_eq!(same.kind(), CommandKind::MoveNode);
        assert_eq!(same.description(), "Combined: Move device (2)");

        let update = UpdateNodeCmd::new(
            "r1",
            DeviceAttributes::labeled("Router 1"),
            DeviceAttributes::labeled("Edge"),
        );
        let mixed = SmartMergeCmd::new(moved("r1", 1.0), Box::new(update));
        assert_eq!(mixed.kind(), CommandKind::SmartMerge);
        assert_eq!(
            mixed.description(),
            "Combined: Move device (1), Update device (1)"
        );
    }

    #[test]
    fn mixed_group_accepts_nothing_further() {
        let update = UpdateNodeCmd::new("r1", DeviceAttributes::default(), DeviceAttributes::default());
        let mixed = SmartMergeCmd::new(moved("r1", 1.0), Box::new(update));
        assert!(!mixed.accepts(moved("r1", 2.0).as_ref()));

        let moves = SmartMergeCmd::new(moved("r1", 1.0), moved("r2", 1.0));
        assert!(moves.accepts(moved("r1", 2.0).as_ref()));
        let edge = UpdateEdgeCmd::new("l", LinkAttributes::default(), LinkAttributes::default());
        assert!(!moves.accepts(&edge));
    }

    #[test]
    fn undo_reverts_all_in_reverse() {
        let mut g = graph();
        let before = g.clone();
        let mut first = moved("r1", 1.0);
        first.execute(&mut g).unwrap();
        let mut second = moved("r2", 2.0);
        second.execute(&mut g).unwrap();
        let mut merged = SmartMergeCmd::new(first, second);
        let mut third = moved("r1", 3.0);
        third.execute(&mut g).unwrap();
        merged.absorb(third);
        assert_eq!(merged.len(), 3);

        merged.undo(&mut g).unwrap();
        assert_eq!(g, before);
        merged.redo(&mut g).unwrap();
        assert_eq!(g.device(&"r1".into()).unwrap().position, Position::new(3.0, 3.0));
        assert_eq!(g.device(&"r2".into()).unwrap().position, Position::new(2.0, 2.0));
    }
}
