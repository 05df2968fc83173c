#![forbid(unsafe_code)]

//! Link commands: add, delete, update.
//!
//! An [`AddEdgeCmd`] must only be built for a connection the validator has
//! accepted; the graph re-checks structure and ports on execute regardless.

use netdiagram_core::{Link, LinkAttributes, LinkId, TopologyGraph};

use super::command::{
    CommandError, CommandKind, CommandMetadata, CommandResult, MergeConfig, UndoableCmd,
    impl_cmd_accessors,
};

/// Command that adds a link.
#[derive(Debug)]
pub struct AddEdgeCmd {
    /// Link to insert.
    pub link: Link,
    /// Command metadata.
    pub metadata: CommandMetadata,
}

impl AddEdgeCmd {
    #[must_use]
    pub fn new(link: Link, source_label: &str, target_label: &str) -> Self {
        Self {
            link,
            metadata: CommandMetadata::new(format!("Connect {source_label} to {target_label}")),
        }
    }
}

impl UndoableCmd for AddEdgeCmd {
    fn execute(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        graph.push_link(self.link.clone())?;
        Ok(())
    }

    fn undo(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        graph.remove_link(&self.link.id)?;
        Ok(())
    }

    fn kind(&self) -> CommandKind {
        CommandKind::AddEdge
    }

    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.link.heap_bytes() + self.metadata.size_bytes()
    }

    impl_cmd_accessors!("AddEdgeCmd");
}

/// Command that removes a single link, restoring it at its old index.
#[derive(Debug)]
pub struct DeleteEdgeCmd {
    /// Link to remove.
    pub id: LinkId,
    /// Command metadata.
    pub metadata: CommandMetadata,
    removed: Option<(usize, Link)>,
}

impl DeleteEdgeCmd {
    #[must_use]
    pub fn new(id: impl Into<LinkId>, label: &str) -> Self {
        let description = if label.is_empty() {
            "Delete link".to_string()
        } else {
            format!("Delete link {label}")
        };
        Self {
            id: id.into(),
            metadata: CommandMetadata::new(description),
            removed: None,
        }
    }
}

impl UndoableCmd for DeleteEdgeCmd {
    fn execute(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        self.removed = Some(graph.remove_link(&self.id)?);
        Ok(())
    }

    fn undo(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        let Some((index, link)) = &self.removed else {
            return Err(CommandError::InvalidState(
                "link deletion was never executed".to_string(),
            ));
        };
        graph.insert_link_at(*index, link.clone())?;
        Ok(())
    }

    fn kind(&self) -> CommandKind {
        CommandKind::DeleteEdge
    }

    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.id.as_str().len()
            + self.removed.as_ref().map_or(0, |(_, l)| l.heap_bytes())
            + self.metadata.size_bytes()
    }

    impl_cmd_accessors!("DeleteEdgeCmd");
}

/// Command that replaces a link's attribute record.
///
/// Consecutive edits of the same link coalesce, keeping the first `before`.
#[derive(Debug)]
pub struct UpdateEdgeCmd {
    pub id: LinkId,
    pub before: LinkAttributes,
    pub after: LinkAttributes,
    pub metadata: CommandMetadata,
}

impl UpdateEdgeCmd {
    #[must_use]
    pub fn new(id: impl Into<LinkId>, before: LinkAttributes, after: LinkAttributes) -> Self {
        let id = id.into();
        let metadata = CommandMetadata::new(describe_update(&id, &before, &after));
        Self {
            id,
            before,
            after,
            metadata,
        }
    }
}

fn describe_update(id: &LinkId, before: &LinkAttributes, after: &LinkAttributes) -> String {
    let fields = before.changed_fields(after);
    if fields.is_empty() {
        format!("Update link {id}")
    } else {
        format!("Update link {id} ({})", fields.join(", "))
    }
}

impl UndoableCmd for UpdateEdgeCmd {
    fn execute(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        graph.set_link_attributes(&self.id, self.after.clone())?;
        Ok(())
    }

    fn undo(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        graph.set_link_attributes(&self.id, self.before.clone())?;
        Ok(())
    }

    fn kind(&self) -> CommandKind {
        CommandKind::UpdateEdge
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
        self.metadata.description = describe_update(&self.id, &self.before, &self.after);
        true
    }

    impl_cmd_accessors!("UpdateEdgeCmd");
}

// ============================================================================
// Tests
// ============================================================================
