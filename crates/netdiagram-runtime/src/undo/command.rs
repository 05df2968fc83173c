#![forbid(unsafe_code)]

//! Undoable command infrastructure for topology editing.
//!
//! This module provides the [`UndoableCmd`] trait for reversible graph
//! mutations plus the metadata, error, and merge-policy types shared by
//! every concrete command.
//!
//! # Design Principles
//!
//! 1. **Explicit state**: Commands capture all state needed for undo/redo
//! 2. **Memory-efficient**: Commands report their size for budget management
//! 3. **Mergeable**: Consecutive related commands can merge (e.g., dragging)
//! 4. **Traceable**: Commands include metadata for debugging and UI display
//!
//! # Invariants
//!
//! - `execute()` followed by `undo()` restores prior state exactly
//! - `undo()` followed by `redo()` restores the executed state exactly
//! - `execute()` and `undo()` either succeed or leave the graph untouched
//! - `size_bytes()` MUST be accurate for memory budgeting
//!
//! # Graph access
//!
//! Commands never hold the graph. The engine owns the [`TopologyGraph`] and
//! lends it to `execute`/`undo`, so the graph can only change through a
//! command the engine is running.

use std::any::Any;
use std::fmt;
use std::time::Duration;

use netdiagram_core::{GraphError, TopologyGraph};
use thiserror::Error;
use web_time::Instant;

/// Stable kind tag of a command, used by merge policy and history display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    AddNode,
    DeleteNode,
    MoveNode,
    UpdateNode,
    AddEdge,
    DeleteEdge,
    UpdateEdge,
    Batch,
    BulkDelete,
    BulkMove,
    BulkUpdate,
    SmartMerge,
    ClearAll,
    Import,
    LoadProject,
}

impl CommandKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AddNode => "ADD_NODE",
            Self::DeleteNode => "DELETE_NODE",
            Self::MoveNode => "MOVE_NODE",
            Self::UpdateNode => "UPDATE_NODE",
            Self::AddEdge => "ADD_EDGE",
            Self::DeleteEdge => "DELETE_EDGE",
            Self::UpdateEdge => "UPDATE_EDGE",
            Self::Batch => "BATCH",
            Self::BulkDelete => "BULK_DELETE",
            Self::BulkMove => "BULK_MOVE",
            Self::BulkUpdate => "BULK_UPDATE",
            Self::SmartMerge => "SMART_MERGE",
            Self::ClearAll => "CLEAR_ALL",
            Self::Import => "IMPORT_FILE",
            Self::LoadProject => "PROJECT_STATE",
        }
    }

    /// Whether the command swaps the whole diagram rather than editing it.
    #[must_use]
    pub const fn is_whole_state(self) -> bool {
        matches!(self, Self::ClearAll | Self::Import | Self::LoadProject)
    }

    /// Short noun phrase for grouped descriptions.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::AddNode => "Add device",
            Self::DeleteNode => "Delete device",
            Self::MoveNode => "Move device",
            Self::UpdateNode => "Update device",
            Self::AddEdge => "Add link",
            Self::DeleteEdge => "Delete link",
            Self::UpdateEdge => "Update link",
            Self::Batch => "Batch",
            Self::BulkDelete => "Delete selection",
            Self::BulkMove => "Move devices",
            Self::BulkUpdate => "Update selection",
            Self::SmartMerge => "Combined edit",
            Self::ClearAll => "Clear diagram",
            Self::Import => "Import file",
            Self::LoadProject => "Load project",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of a command - who/what triggered it.
///
/// Used for filtering undo history and debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandSource {
    /// Direct user action (pointer, keyboard).
    #[default]
    User,
    /// Triggered programmatically by application code.
    Programmatic,
    /// Triggered by an external system (file import, project load).
    External,
}

/// Metadata attached to every command for tracing and UI display.
#[derive(Debug, Clone)]
pub struct CommandMetadata {
    /// Human-readable description for UI (e.g., "Move router-1").
    pub description: String,
    /// When the command was issued. The engine restamps on submission.
    pub timestamp: Instant,
    /// Last time this entry was created or absorbed a merge.
    pub last_activity: Instant,
    /// Who/what triggered the command.
    pub source: CommandSource,
    /// Optional batch ID for grouping related commands.
    pub batch_id: Option<u64>,
}

impl CommandMetadata {
    /// Create new metadata with the given description.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        let now = Instant::now();
        Self {
            description: description.into(),
            timestamp: now,
            last_activity: now,
            source: CommandSource::User,
            batch_id: None,
        }
    }

    /// Set the command source.
    #[must_use]
    pub fn with_source(mut self, source: CommandSource) -> Self {
        self.source = source;
        self
    }

    /// Set the batch ID for grouping.
    #[must_use]
    pub fn with_batch(mut self, batch_id: u64) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    /// Set both the issue time and the activity time.
    pub fn stamp(&mut self, at: Instant) {
        self.timestamp = at;
        self.last_activity = at;
    }

    /// Size in bytes for memory accounting.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.description.len()
    }
}

impl Default for CommandMetadata {
    fn default() -> Self {
        Self::new("Unknown")
    }
}

/// Result of command execution or undo.
pub type CommandResult = Result<(), CommandError>;

/// Errors that can occur during command execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The mutation would break a graph invariant or its target is gone.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// A bulk command found none of its targets in the graph.
    #[error("no target found: {0}")]
    TargetNotFound(String),
    /// Command cannot run in its current state (e.g., undo before execute).
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// Configuration for command merging behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeConfig {
    /// Moves of the same device closer than this collapse into one step.
    pub move_window: Duration,
    /// Sliding window for the compatibility-table fallback.
    pub smart_merge_window: Duration,
    /// Consecutive attribute edits of one entity always coalesce.
    pub coalesce_updates: bool,
    /// Whether the compatibility-table fallback is enabled.
    pub smart_merge: bool,
    /// Most commands a batch may grow to by merging. `0` disables batch merging.
    pub batch_max_len: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            move_window: Duration::from_millis(1000),
            smart_merge_window: Duration::from_millis(500),
            coalesce_updates: true,
            smart_merge: true,
            batch_max_len: 10,
        }
    }
}

impl MergeConfig {
    /// Merging disabled entirely.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            move_window: Duration::ZERO,
            smart_merge_window: Duration::ZERO,
            coalesce_updates: false,
            smart_merge: false,
            batch_max_len: 0,
        }
    }
}

/// Time from `earlier` to `later`, zero if `later` is not after it.
#[must_use]
pub fn elapsed_between(earlier: Instant, later: Instant) -> Duration {
    later.saturating_duration_since(earlier)
}

/// A reversible command that can be undone and redone.
///
/// Commands capture all state needed to execute, undo, and redo an
/// operation. They support merging for collapsing bursts of related edits
/// (like the frames of a drag) into one undo step.
pub trait UndoableCmd {
    /// Execute the command, applying its effect.
    fn execute(&mut self, graph: &mut TopologyGraph) -> CommandResult;

    /// Undo the command, reverting its effect.
    fn undo(&mut self, graph: &mut TopologyGraph) -> CommandResult;

    /// Redo the command after it was undone.
    fn redo(&mut self, graph: &mut TopologyGraph) -> CommandResult {
        self.execute(graph)
    }

    /// Human-readable description for UI display.
    fn description(&self) -> &str {
        &self.metadata().description
    }

    /// Kind tag.
    fn kind(&self) -> CommandKind;

    /// Size of this command in bytes for memory budgeting.
    fn size_bytes(&self) -> usize;

    /// Check if this command can absorb `other`.
    fn can_merge(&self, _other: &dyn UndoableCmd, _config: &MergeConfig) -> bool {
        false
    }

    /// Absorb `other`, which has already been applied to the graph.
    ///
    /// After a successful merge, undoing `self` must revert both.
    fn accept_merge(&mut self, _other: &dyn UndoableCmd) -> bool {
        false
    }

    /// Absorb an owned, already-applied `other`, handing it back if refused.
    ///
    /// Containers override this to take `other`'s parts; everything else
    /// goes through [`accept_merge`](Self::accept_merge).
    fn accept_merge_owned(
        &mut self,
        other: Box<dyn UndoableCmd>,
    ) -> Result<(), Box<dyn UndoableCmd>> {
        if self.accept_merge(other.as_ref()) {
            Ok(())
        } else {
            Err(other)
        }
    }

    /// Get the command metadata.
    fn metadata(&self) -> &CommandMetadata;

    /// Mutable metadata, used by the engine to stamp and refresh times.
    fn metadata_mut(&mut self) -> &mut CommandMetadata;

    /// Downcast to concrete type for merging.
    fn as_any(&self) -> &dyn Any;

    /// Downcast to mutable concrete type for merging.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Debug description of the command.
    fn debug_name(&self) -> &'static str {
        "UndoableCmd"
    }
}

impl fmt::Debug for dyn UndoableCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.debug_name())
            .field("kind", &self.kind())
            .field("description", &self.description())
            .field("size_bytes", &self.size_bytes())
            .finish()
    }
}

/// Implements the boilerplate accessors of [`UndoableCmd`].
macro_rules! impl_cmd_accessors {
    ($name:literal) => {
        fn metadata(&self) -> &$crate::undo::command::CommandMetadata {
            &self.metadata
        }

        fn metadata_mut(&mut self) -> &mut $crate::undo::command::CommandMetadata {
            &mut self.metadata
        }

        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
            self
        }

        fn debug_name(&self) -> &'static str {
            $name
        }
    };
}

pub(crate) use impl_cmd_accessors;

// ============================================================================
// Tests
// ============================================================================
