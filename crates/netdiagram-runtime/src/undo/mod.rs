#![forbid(unsafe_code)]

//! Undo/redo for topology edits.
//!
//! Every change to a [`TopologyGraph`](netdiagram_core::TopologyGraph) is a
//! command: a value that knows how to apply itself and how to revert
//! itself. The [`UndoEngine`] runs commands, records them, and walks the
//! record backwards and forwards.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         UndoEngine                           │
//! │   clock ─► stamp ─► plan_merge ─► execute ─► push / merge    │
//! │                                                              │
//! │  ┌──────────────────┐            ┌──────────────────┐        │
//! │  │   Undo Stack     │  undo()    │   Redo Stack     │        │
//! │  │  ┌────────────┐  │ ────────►  │  ┌────────────┐  │        │
//! │  │  │ CommandN   │  │            │  │ Command1   │  │        │
//! │  │  ├────────────┤  │  ◄──────── │  ├────────────┤  │        │
//! │  │  │ Command1   │  │  redo()    │  │ CommandN   │  │        │
//! │  │  └────────────┘  │            │  └────────────┘  │        │
//! │  └──────────────────┘            └──────────────────┘        │
//! │                       TopologyGraph                          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use netdiagram_core::{Device, DeviceType, Position};
//! use netdiagram_runtime::undo::{AddNodeCmd, UndoEngine};
//!
//! let mut engine = UndoEngine::new();
//! let router = Device::with_defaults("router-1", DeviceType::Router, Position::new(0.0, 0.0), "Router 1");
//! engine.execute(AddNodeCmd::new(router))?;
//! engine.tick();
//!
//! engine.undo();
//! assert!(engine.graph().is_empty());
//! ```
//!
//! # Module Structure
//!
//! - [`command`]: the `UndoableCmd` trait, kinds, metadata, merge settings
//! - [`nodes`]: add/delete/move/update a device
//! - [`edges`]: add/delete/update a link
//! - [`bulk`]: multi-entity commands and [`CommandBatch`]
//! - [`project`]: whole-state commands (clear, import, load)
//! - [`smart_merge`]: fallback coalescing of compatible kinds
//! - [`history`]: bounded undo/redo stacks
//! - [`engine`]: the engine, its guard, and history reporting
//!
//! # Merge Strategy
//!
//! - Moves of the same device(s) collapse while they arrive within one
//!   second of the first move, so a drag is one undo step.
//! - Consecutive attribute edits of one device or link collapse into one.
//! - A batch keeps absorbing follow-up batches and edits within 500ms, up
//!   to ten commands.
//! - Otherwise, kinds listed in [`SMART_MERGE_PAIRS`] share a step when the
//!   newcomer follows the previous activity within 500ms.

pub mod bulk;
pub mod command;
pub mod edges;
pub mod engine;
pub mod history;
pub mod nodes;
pub mod project;
pub mod smart_merge;

pub use bulk::{
    BulkDeleteCmd, BulkMoveCmd, BulkUpdateCmd, CommandBatch, DeviceMove, DeviceUpdate, LinkUpdate,
};
pub use command::{
    CommandError, CommandKind, CommandMetadata, CommandResult, CommandSource, MergeConfig,
    UndoableCmd,
};
pub use edges::{AddEdgeCmd, DeleteEdgeCmd, UpdateEdgeCmd};
pub use engine::{
    EngineState, ExecuteOutcome, HistoryEntry, HistoryError, HistoryInfo, UndoEngine,
};
pub use history::{HistoryConfig, HistoryManager, MAX_HISTORY, MergePlan};
pub use nodes::{AddNodeCmd, DeleteNodeCmd, MoveNodeCmd, UpdateNodeCmd};
pub use project::{ClearAllCmd, ImportCmd, LoadProjectCmd};
pub use smart_merge::{SMART_MERGE_PAIRS, SmartMergeCmd, kinds_compatible};
