#![forbid(unsafe_code)]

//! The undo/redo engine.
//!
//! [`UndoEngine`] is the only owner of the [`TopologyGraph`] during an
//! editing session. Every structural change goes through
//! [`execute_command`](UndoEngine::execute_command); callers get read-only
//! access to the graph for rendering.
//!
//! # State machine
//!
//! ```text
//!            execute / undo / redo / undo_to_point
//!   ┌──────┐ ─────────────────────────────────────► ┌───────────┐
//!   │ Idle │                                        │ Executing │
//!   └──────┘ ◄───────────────────────────────────── └───────────┘
//!              tick()  (or immediately, per config,
//!                       and always after a failure)
//! ```
//!
//! Calls that arrive while `Executing` return [`HistoryError::Busy`] and
//! change nothing. Undo and redo on an empty stack are no-ops and return
//! `None` regardless of the guard.
//!
//! # Merging
//!
//! An incoming command is stamped with the engine clock and checked
//! against the top of the undo stack before it runs. It is executed on its
//! own either way; only after it succeeds is it folded into the top entry
//! (or pushed), so a failing command never alters history.

use std::fmt;

use netdiagram_core::TopologyGraph;
use thiserror::Error;
use web_time::Instant;

use super::command::{CommandError, CommandKind, UndoableCmd};
use super::history::HistoryManager;
use crate::clock::{Clock, SystemClock};
use crate::config::{EngineConfig, GuardRelease};

const TARGET: &str = "netdiagram.undo";

/// Re-entrancy guard state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Idle,
    Executing,
}

/// How a successfully executed command entered history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteOutcome {
    /// Pushed as a new undo entry.
    Applied,
    /// Folded into the previous undo entry.
    Merged,
}

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Another call has not been released yet.
    #[error("engine is busy; wait for the next tick")]
    Busy,
    /// A command's execute or undo failed; history is unchanged.
    #[error("command '{description}' failed: {source}")]
    Command {
        description: String,
        #[source]
        source: CommandError,
    },
}

/// Read-only snapshot of history state for display.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HistoryInfo {
    pub undo_count: usize,
    pub redo_count: usize,
    pub can_undo: bool,
    pub can_redo: bool,
    /// Description of the entry `undo` would revert.
    pub last_command: Option<String>,
    /// Description of the entry `redo` would replay.
    pub next_command: Option<String>,
    /// Most recent undo entries, oldest first.
    pub recent_commands: Vec<String>,
    pub is_executing: bool,
    pub max_depth: usize,
    /// Whether old entries were evicted and can no longer be undone.
    pub truncated: bool,
    pub evicted: usize,
    pub memory_bytes: usize,
    /// Every undo entry, oldest first.
    pub all_undo: Vec<String>,
    /// Every redo entry, next to replay first.
    pub all_redo: Vec<String>,
}

impl HistoryInfo {
    /// Undo entries that can still be added before eviction starts.
    #[must_use]
    pub fn remaining_capacity(&self) -> usize {
        self.max_depth.saturating_sub(self.undo_count)
    }
}

/// One undo entry as listed in a history panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub description: String,
    pub kind: CommandKind,
    /// When the entry was issued.
    pub timestamp: Instant,
    /// When it last absorbed a merge; equals `timestamp` if it never did.
    pub last_activity: Instant,
}

/// Command-pattern engine owning the topology and its history.
pub struct UndoEngine {
    graph: TopologyGraph,
    history: HistoryManager,
    config: EngineConfig,
    clock: Box<dyn Clock>,
    state: EngineState,
}

impl fmt::Debug for UndoEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoEngine")
            .field("devices", &self.graph.devices().len())
            .field("links", &self.graph.links().len())
            .field("history", &self.history)
            .field("state", &self.state)
            .finish()
    }
}

impl Default for UndoEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl UndoEngine {
    /// Engine over an empty graph with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self::from_graph(TopologyGraph::new(), config)
    }

    /// Engine over an existing graph. History starts empty.
    #[must_use]
    pub fn from_graph(graph: TopologyGraph, config: EngineConfig) -> Self {
        Self {
            graph,
            history: HistoryManager::new(config.to_history_config()),
            config,
            clock: Box::new(SystemClock),
            state: EngineState::Idle,
        }
    }

    /// Replace the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub fn graph(&self) -> &TopologyGraph {
        &self.graph
    }

    #[must_use]
    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    #[must_use]
    pub fn is_executing(&self) -> bool {
        self.state == EngineState::Executing
    }

    /// Give up the engine, keeping the graph.
    #[must_use]
    pub fn into_graph(self) -> TopologyGraph {
        self.graph
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Execute `cmd` and record it.
    pub fn execute<C: UndoableCmd + 'static>(&mut self, cmd: C) -> Result<ExecuteOutcome, HistoryError> {
        self.execute_command(Box::new(cmd))
    }

    /// Execute a boxed command and record it, merging where allowed.
    pub fn execute_command(
        &mut self,
        mut cmd: Box<dyn UndoableCmd>,
    ) -> Result<ExecuteOutcome, HistoryError> {
        self.acquire("execute")?;

        cmd.metadata_mut().stamp(self.clock.now());
        let kind = cmd.kind();
        let _span = tracing::debug_span!(
            "undo.execute",
            kind = %kind,
            description = %cmd.description()
        )
        .entered();

        let plan = self.history.plan_merge(cmd.as_ref());
        if let Err(source) = cmd.execute(&mut self.graph) {
            return Err(self.fail("execute", cmd.description().to_string(), source));
        }

        let (outcome, evicted) = match plan {
            Some(plan) => match self.history.commit_merge(plan, cmd) {
                Ok(evicted) => (ExecuteOutcome::Merged, evicted),
                Err(cmd) => (ExecuteOutcome::Applied, self.history.push(cmd)),
            },
            None => (ExecuteOutcome::Applied, self.history.push(cmd)),
        };

        let merged = outcome == ExecuteOutcome::Merged;
        tracing::debug!(
            target: TARGET,
            kind = %kind,
            merged,
            undo_depth = self.history.undo_depth(),
            "command applied"
        );
        self.warn_evicted(evicted);
        self.release();
        Ok(outcome)
    }

    /// Revert the most recent entry.
    ///
    /// `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Option<Result<String, HistoryError>> {
        if !self.history.can_undo() {
            return None;
        }
        if let Err(e) = self.acquire("undo") {
            return Some(Err(e));
        }
        let description = self.history.next_undo_description().unwrap_or_default().to_string();
        let _span = tracing::debug_span!("undo.undo", description = %description).entered();

        match self.history.undo(&mut self.graph) {
            Some(Ok(description)) => {
                tracing::debug!(target: TARGET, description = %description, "command undone");
                self.release();
                Some(Ok(description))
            }
            Some(Err(source)) => Some(Err(self.fail("undo", description, source))),
            None => {
                self.state = EngineState::Idle;
                None
            }
        }
    }

    /// Replay the most recently undone entry.
    ///
    /// `None` when there is nothing to redo.
    pub fn redo(&mut self) -> Option<Result<String, HistoryError>> {
        if !self.history.can_redo() {
            return None;
        }
        if let Err(e) = self.acquire("redo") {
            return Some(Err(e));
        }
        let description = self.history.next_redo_description().unwrap_or_default().to_string();
        let _span = tracing::debug_span!("undo.redo", description = %description).entered();

        let evicted_before = self.history.evicted();
        match self.history.redo(&mut self.graph) {
            Some(Ok(description)) => {
                tracing::debug!(target: TARGET, description = %description, "command redone");
                self.warn_evicted(self.history.evicted() - evicted_before);
                self.release();
                Some(Ok(description))
            }
            Some(Err(source)) => Some(Err(self.fail("redo", description, source))),
            None => {
                self.state = EngineState::Idle;
                None
            }
        }
    }

    /// Undo every entry above `index`, leaving `index + 1` entries.
    ///
    /// Reverted entries land on the redo stack so that `redo` replays them
    /// forward. Returns how many entries were undone. If one fails, the
    /// ones already undone stay undone and the error is returned.
    pub fn undo_to_point(&mut self, index: usize) -> Result<usize, HistoryError> {
        let keep = index.saturating_add(1);
        if self.history.undo_depth() <= keep {
            return Ok(0);
        }
        self.acquire("undo_to_point")?;
        let _span = tracing::debug_span!("undo.undo_to_point", index).entered();

        let mut undone = 0;
        while self.history.undo_depth() > keep {
            let description = self.history.next_undo_description().unwrap_or_default().to_string();
            match self.history.undo(&mut self.graph) {
                Some(Ok(_)) => undone += 1,
                Some(Err(source)) => return Err(self.fail("undo_to_point", description, source)),
                None => break,
            }
        }

        tracing::debug!(target: TARGET, index, undone, "history rewound");
        self.release();
        Ok(undone)
    }

    /// Host "next tick": release a deferred guard.
    ///
    /// Returns whether the engine was busy.
    pub fn tick(&mut self) -> bool {
        let was_busy = self.is_executing();
        self.state = EngineState::Idle;
        was_busy
    }

    /// Empty both stacks without touching the graph.
    pub fn clear_history(&mut self) {
        self.history.clear();
        tracing::debug!(target: TARGET, "history cleared");
    }

    /// Snapshot of history state for display.
    #[must_use]
    pub fn history_info(&self) -> HistoryInfo {
        let history = &self.history;
        let owned = |v: Vec<&str>| v.into_iter().map(str::to_string).collect::<Vec<_>>();

        let mut recent = owned(history.undo_descriptions(self.config.recent_len));
        recent.reverse();
        let mut all_undo = owned(history.undo_descriptions(usize::MAX));
        all_undo.reverse();

        HistoryInfo {
            undo_count: history.undo_depth(),
            redo_count: history.redo_depth(),
            can_undo: history.can_undo(),
            can_redo: history.can_redo(),
            last_command: history.next_undo_description().map(str::to_string),
            next_command: history.next_redo_description().map(str::to_string),
            recent_commands: recent,
            is_executing: self.is_executing(),
            max_depth: history.config().max_depth,
            truncated: history.is_truncated(),
            evicted: history.evicted(),
            memory_bytes: history.memory_usage(),
            all_undo,
            all_redo: owned(history.redo_descriptions(usize::MAX)),
        }
    }

    /// Every undo entry with its kind and times, oldest first.
    #[must_use]
    pub fn history_entries(&self) -> Vec<HistoryEntry> {
        self.history
            .undo_entries()
            .map(|cmd| {
                let meta = cmd.metadata();
                HistoryEntry {
                    description: cmd.description().to_string(),
                    kind: cmd.kind(),
                    timestamp: meta.timestamp,
                    last_activity: meta.last_activity,
                }
            })
            .collect()
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn acquire(&mut self, operation: &'static str) -> Result<(), HistoryError> {
        if self.is_executing() {
            tracing::warn!(target: TARGET, operation, "rejected while another call is in flight");
            return Err(HistoryError::Busy);
        }
        self.state = EngineState::Executing;
        Ok(())
    }

    fn release(&mut self) {
        if self.config.guard_release == GuardRelease::Immediate {
            self.state = EngineState::Idle;
        }
    }

    fn fail(
        &mut self,
        operation: &'static str,
        description: String,
        source: CommandError,
    ) -> HistoryError {
        self.state = EngineState::Idle;
        tracing::error!(
            target: TARGET,
            operation,
            description = %description,
            error = %source,
            "command failed; history unchanged"
        );
        HistoryError::Command {
            description,
            source,
        }
    }

    fn warn_evicted(&self, evicted: usize) {
        if evicted > 0 {
            tracing::warn!(
                target: TARGET,
                evicted,
                total_evicted = self.history.evicted(),
                max_depth = self.history.config().max_depth,
                "history truncated; oldest entries can no longer be undone"
            );
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
