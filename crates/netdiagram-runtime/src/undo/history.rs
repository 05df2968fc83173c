#![forbid(unsafe_code)]

//! History stacks for undo/redo operations.
//!
//! This module provides the [`HistoryManager`] which maintains dual stacks
//! for undo and redo operations with support for:
//!
//! - **Depth limits**: at most `max_depth` entries on the undo stack
//! - **Memory limits**: oldest entries evicted when the byte budget is exceeded
//! - **Branch handling**: new actions clear the redo stack
//! - **Command merging**: the top entry can absorb a compatible newcomer
//!
//! # Invariants
//!
//! 1. `total_bytes` always equals the sum of `size_bytes()` over both stacks
//! 2. `undo_stack.len() <= config.max_depth` after any operation
//! 3. `total_bytes <= config.max_bytes` after any operation, unless the
//!    only remaining entry is itself larger than the budget
//! 4. Redo stack is cleared whenever a new command is pushed or merged
//!
//! # Memory Model
//!
//! ```text
//! push(cmd5)
//! ┌───────────────────────────────────────────────┐
//! │ Undo Stack: [cmd1, cmd2, cmd3, cmd4, cmd5]    │
//! │ Redo Stack: []                                │
//! └───────────────────────────────────────────────┘
//!
//! undo() x2
//! ┌───────────────────────────────────────────────┐
//! │ Undo Stack: [cmd1, cmd2, cmd3]                │
//! │ Redo Stack: [cmd5, cmd4]                      │
//! └───────────────────────────────────────────────┘
//!
//! push(cmd6)  <-- new branch, clears redo
//! ┌───────────────────────────────────────────────┐
//! │ Undo Stack: [cmd1, cmd2, cmd3, cmd6]          │
//! │ Redo Stack: []                                │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Evicted entries can no longer be undone. The manager counts them and
//! reports the history as truncated so callers can tell the user.

use std::collections::VecDeque;
use std::fmt;

use netdiagram_core::TopologyGraph;

use super::command::{CommandError, MergeConfig, UndoableCmd, elapsed_between};
use super::smart_merge::{SmartMergeCmd, kinds_compatible};

/// Default undo depth.
pub const MAX_HISTORY: usize = 50;

/// Configuration for the history manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Maximum number of commands to keep in undo history.
    pub max_depth: usize,
    /// Maximum total bytes for all commands (0 = unlimited).
    pub max_bytes: usize,
    /// Configuration for command merging.
    pub merge_config: MergeConfig,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_depth: MAX_HISTORY,
            max_bytes: 10 * 1024 * 1024, // 10 MB
            merge_config: MergeConfig::default(),
        }
    }
}

impl HistoryConfig {
    /// Create a new configuration with custom limits.
    #[must_use]
    pub fn new(max_depth: usize, max_bytes: usize) -> Self {
        Self {
            max_depth,
            max_bytes,
            merge_config: MergeConfig::default(),
        }
    }

    /// Set the merge configuration.
    #[must_use]
    pub fn with_merge_config(mut self, config: MergeConfig) -> Self {
        self.merge_config = config;
        self
    }

    /// Create unlimited configuration (for testing).
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            max_depth: usize::MAX,
            max_bytes: 0,
            merge_config: MergeConfig::default(),
        }
    }
}

/// How an incoming command would fold into the top of the undo stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePlan {
    /// The top entry absorbs it through its own merge contract.
    Accept,
    /// The top entry is a smart-merge group that appends it.
    Absorb,
    /// The top entry and the newcomer are wrapped in a new group.
    Wrap,
}

/// Manager for undo/redo history.
///
/// Maintains dual stacks for undo and redo operations with
/// configurable memory and depth limits.
pub struct HistoryManager {
    /// Commands available for undo (newest at back).
    undo_stack: VecDeque<Box<dyn UndoableCmd>>,
    /// Commands available for redo (newest at back).
    redo_stack: VecDeque<Box<dyn UndoableCmd>>,
    /// Configuration for limits and merging.
    config: HistoryConfig,
    /// Total bytes used by all commands.
    total_bytes: usize,
    /// Undo entries dropped by the limits since the last clear.
    evicted: usize,
}

impl fmt::Debug for HistoryManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryManager")
            .field("undo_depth", &self.undo_stack.len())
            .field("redo_depth", &self.redo_stack.len())
            .field("total_bytes", &self.total_bytes)
            .field("evicted", &self.evicted)
            .field("config", &self.config)
            .finish()
    }
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl HistoryManager {
    /// Create a new history manager with the given configuration.
    #[must_use]
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            config,
            total_bytes: 0,
            evicted: 0,
        }
    }

    // ========================================================================
    // Core Operations
    // ========================================================================

    /// Push an already-executed command onto the undo stack.
    ///
    /// Clears the redo stack (new branch) and enforces limits. Returns the
    /// number of entries evicted.
    pub fn push(&mut self, cmd: Box<dyn UndoableCmd>) -> usize {
        self.clear_redo();
        self.total_bytes += cmd.size_bytes();
        self.undo_stack.push_back(cmd);
        self.enforce_limits()
    }

    /// Decide whether `cmd` can fold into the top entry.
    ///
    /// Own merges are tried first. The smart-merge fallback applies when
    /// enabled, when `cmd` was issued within the smart window of the top
    /// entry's last activity, and when the kinds are compatible.
    #[must_use]
    pub fn plan_merge(&self, cmd: &dyn UndoableCmd) -> Option<MergePlan> {
        let last = self.undo_stack.back()?;
        let merge = &self.config.merge_config;
        if last.can_merge(cmd, merge) {
            return Some(MergePlan::Accept);
        }
        if !merge.smart_merge {
            return None;
        }
        let idle = elapsed_between(last.metadata().last_activity, cmd.metadata().timestamp);
        if idle > merge.smart_merge_window {
            return None;
        }
        if let Some(group) = last.as_any().downcast_ref::<SmartMergeCmd>() {
            return group.accepts(cmd).then_some(MergePlan::Absorb);
        }
        kinds_compatible(last.kind(), cmd.kind()).then_some(MergePlan::Wrap)
    }

    /// Fold an already-executed command into the top entry per `plan`.
    ///
    /// Clears the redo stack on success. Returns the command back if the
    /// top entry refused it, in which case nothing changed.
    pub fn commit_merge(
        &mut self,
        plan: MergePlan,
        cmd: Box<dyn UndoableCmd>,
    ) -> Result<usize, Box<dyn UndoableCmd>> {
        let Some(last) = self.undo_stack.back_mut() else {
            return Err(cmd);
        };
        let old_size = last.size_bytes();
        let activity = cmd.metadata().last_activity;

        match plan {
            MergePlan::Accept => {
                last.accept_merge_owned(cmd)?;
                last.metadata_mut().last_activity = activity;
            }
            MergePlan::Absorb => {
                let Some(group) = last.as_any_mut().downcast_mut::<SmartMergeCmd>() else {
                    return Err(cmd);
                };
                group.absorb(cmd);
            }
            MergePlan::Wrap => {
                let Some(top) = self.undo_stack.pop_back() else {
                    return Err(cmd);
                };
                self.undo_stack.push_back(Box::new(SmartMergeCmd::new(top, cmd)));
            }
        }

        let new_size = self.undo_stack.back().map_or(0, |c| c.size_bytes());
        self.total_bytes = self.total_bytes.saturating_sub(old_size) + new_size;
        self.clear_redo();
        Ok(self.enforce_limits())
    }

    /// Undo the last command.
    ///
    /// # Returns
    ///
    /// - `Some(Ok(description))` if undo succeeded
    /// - `Some(Err(error))` if undo failed (command remains on undo stack)
    /// - `None` if no commands to undo
    pub fn undo(&mut self, graph: &mut TopologyGraph) -> Option<Result<String, CommandError>> {
        let mut cmd = self.undo_stack.pop_back()?;
        let description = cmd.description().to_string();
        let old_size = cmd.size_bytes();

        match cmd.undo(graph) {
            Ok(()) => {
                self.total_bytes = self.total_bytes.saturating_sub(old_size) + cmd.size_bytes();
                self.redo_stack.push_back(cmd);
                Some(Ok(description))
            }
            Err(e) => {
                self.undo_stack.push_back(cmd);
                Some(Err(e))
            }
        }
    }

    /// Redo the last undone command.
    ///
    /// # Returns
    ///
    /// - `Some(Ok(description))` if redo succeeded
    /// - `Some(Err(error))` if redo failed (command remains on redo stack)
    /// - `None` if no commands to redo
    pub fn redo(&mut self, graph: &mut TopologyGraph) -> Option<Result<String, CommandError>> {
        let mut cmd = self.redo_stack.pop_back()?;
        let description = cmd.description().to_string();
        let old_size = cmd.size_bytes();

        match cmd.redo(graph) {
            Ok(()) => {
                self.total_bytes = self.total_bytes.saturating_sub(old_size) + cmd.size_bytes();
                self.undo_stack.push_back(cmd);
                self.enforce_limits();
                Some(Ok(description))
            }
            Err(e) => {
                self.redo_stack.push_back(cmd);
                Some(Err(e))
            }
        }
    }

    /// Check if undo is available.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    // ========================================================================
    // Info
    // ========================================================================

    /// Get the undo stack depth.
    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Get the redo stack depth.
    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Get descriptions for undo commands (most recent first).
    pub fn undo_descriptions(&self, limit: usize) -> Vec<&str> {
        self.undo_stack
            .iter()
            .rev()
            .take(limit)
            .map(|c| c.description())
            .collect()
    }

    /// Get descriptions for redo commands (next to redo first).
    pub fn redo_descriptions(&self, limit: usize) -> Vec<&str> {
        self.redo_stack
            .iter()
            .rev()
            .take(limit)
            .map(|c| c.description())
            .collect()
    }

    /// Get the description of the next undo command.
    #[must_use]
    pub fn next_undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|c| c.description())
    }

    /// Get the description of the next redo command.
    #[must_use]
    pub fn next_redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|c| c.description())
    }

    /// Undo entries, oldest first.
    pub fn undo_entries(&self) -> impl Iterator<Item = &dyn UndoableCmd> {
        self.undo_stack.iter().map(|c| c.as_ref())
    }

    /// The command on top of the undo stack.
    #[must_use]
    pub fn last_command(&self) -> Option<&dyn UndoableCmd> {
        self.undo_stack.back().map(|c| c.as_ref())
    }

    /// Get total memory usage in bytes.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.total_bytes
    }

    /// Undo entries evicted by the limits since the last clear.
    #[must_use]
    pub fn evicted(&self) -> usize {
        self.evicted
    }

    /// Whether older history has been dropped and can no longer be undone.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.evicted > 0
    }

    /// Get the current configuration.
    #[must_use]
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Clear all history (both undo and redo).
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.total_bytes = 0;
        self.evicted = 0;
    }

    /// Clear only the redo stack.
    fn clear_redo(&mut self) {
        for cmd in self.redo_stack.drain(..) {
            self.total_bytes = self.total_bytes.saturating_sub(cmd.size_bytes());
        }
    }

    /// Enforce depth and memory limits by evicting oldest commands.
    ///
    /// Returns the number of undo entries evicted.
    fn enforce_limits(&mut self) -> usize {
        let mut evicted = 0;

        while self.undo_stack.len() > self.config.max_depth {
            if let Some(cmd) = self.undo_stack.pop_front() {
                self.total_bytes = self.total_bytes.saturating_sub(cmd.size_bytes());
                evicted += 1;
            }
        }

        if self.config.max_bytes > 0 {
            while self.total_bytes > self.config.max_bytes {
                // Speculative future goes first.
                if let Some(cmd) = self.redo_stack.pop_front() {
                    self.total_bytes = self.total_bytes.saturating_sub(cmd.size_bytes());
                    continue;
                }
                // The newest entry always survives.
                if self.undo_stack.len() <= 1 {
                    break;
                }
                if let Some(cmd) = self.undo_stack.pop_front() {
                    self.total_bytes = self.total_bytes.saturating_sub(cmd.size_bytes());
                    evicted += 1;
                }
            }
        }

        self.evicted += evicted;
        evicted
    }
}

// ============================================================================
// Tests
// ============================================================================
