#![forbid(unsafe_code)]

//! netdiagram runtime
//!
//! The undo/redo engine that owns a topology during an editing session.
//!
//! # Key Components
//!
//! - [`UndoEngine`] - executes commands, records them, walks history
//! - [`undo`] - the command set and the bounded history stacks
//! - [`EngineConfig`] - history limits, merge windows, guard release
//! - [`Clock`] - the time source merge windows are measured with
//!
//! # Role in netdiagram
//! `netdiagram-runtime` sits between the data model in `netdiagram-core`
//! and the editor facade in `netdiagram`. The facade validates user intent
//! and builds commands; this crate applies them and makes them reversible.

pub mod clock;
pub mod config;
pub mod undo;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, EngineConfig, GuardRelease, HistoryPolicy, MergePolicy};
pub use undo::{
    CommandError, CommandKind, EngineState, ExecuteOutcome, HistoryEntry, HistoryError,
    HistoryInfo, UndoEngine, UndoableCmd,
};
