#![forbid(unsafe_code)]

//! netdiagram public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users. It
//! re-exports common types from the internal crates, offers a lightweight
//! prelude, and hosts [`DiagramEditor`], the headless editing surface a UI
//! drives.

pub mod editor;

// --- Core re-exports -------------------------------------------------------

pub use netdiagram_core::{
    Device, DeviceAttributes, DeviceId, DeviceRole, DeviceType, GraphError, ImportStrategy, Link,
    LinkAttributes, LinkId, PortCapacity, PortStatus, Position, RateUnit, Rejection,
    TopologyGraph, TopologySnapshot, ValidationResult,
};

// --- Runtime re-exports ----------------------------------------------------

pub use netdiagram_runtime::{
    EngineConfig, ExecuteOutcome, GuardRelease, HistoryEntry, HistoryError, HistoryInfo,
    UndoEngine,
};

// --- Editor ----------------------------------------------------------------

pub use editor::{Clipboard, DiagramEditor, EditorError, PASTE_OFFSET};

/// Standard result type for editor gestures.
pub type Result<T> = std::result::Result<T, EditorError>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        DeviceId, DeviceType, DiagramEditor, EditorError, EngineConfig, LinkId, Position, Result,
        TopologySnapshot,
    };

    pub use crate::{core, runtime};
}

pub use netdiagram_core as core;
pub use netdiagram_runtime as runtime;
