#![forbid(unsafe_code)]

//! Engine configuration as data.
//!
//! [`EngineConfig`] gathers every tunable of the undo engine: history
//! limits, merge windows, and guard release. With the `policy-config`
//! feature it loads from TOML or JSON; omitted fields keep their defaults.
//!
//! ```toml
//! # netdiagram.toml
//! guard_release = "immediate"
//!
//! [history]
//! max_depth = 100
//!
//! [merge]
//! move_window_ms = 750
//! smart_merge = false
//! ```
//!
//! ```rust,ignore
//! let config = EngineConfig::from_toml_file("netdiagram.toml")?.validated()?;
//! let engine = UndoEngine::with_config(config);
//! ```

#[cfg(feature = "policy-config")]
use std::path::Path;
use std::time::Duration;

#[cfg(feature = "policy-config")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::undo::{HistoryConfig, MergeConfig};

/// When the re-entrancy guard is released after an engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "policy-config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "policy-config", serde(rename_all = "snake_case"))]
pub enum GuardRelease {
    /// As soon as the call returns.
    Immediate,
    /// On the host's next [`tick`](crate::UndoEngine::tick).
    #[default]
    NextTick,
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "policy-config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "policy-config", serde(default))]
pub struct EngineConfig {
    /// History stack limits.
    pub history: HistoryPolicy,

    /// Merge windows and switches.
    pub merge: MergePolicy,

    /// Guard release timing.
    pub guard_release: GuardRelease,

    /// Number of entries reported in `recent_commands`.
    pub recent_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history: HistoryPolicy::default(),
            merge: MergePolicy::default(),
            guard_release: GuardRelease::default(),
            recent_len: 5,
        }
    }
}

/// History stack limits.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "policy-config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "policy-config", serde(default))]
pub struct HistoryPolicy {
    /// Maximum undo entries.
    pub max_depth: usize,
    /// Byte budget over both stacks (0 = unlimited).
    pub max_bytes: usize,
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        let config = HistoryConfig::default();
        Self {
            max_depth: config.max_depth,
            max_bytes: config.max_bytes,
        }
    }
}

/// Merge windows and switches.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "policy-config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "policy-config", serde(default))]
pub struct MergePolicy {
    /// Window for collapsing moves of the same device(s), from the first move.
    pub move_window_ms: u64,
    /// Sliding window for the compatibility-table fallback.
    pub smart_merge_window_ms: u64,
    /// Always coalesce consecutive attribute edits of one entity.
    pub coalesce_updates: bool,
    /// Enable the compatibility-table fallback.
    pub smart_merge: bool,
    /// Cap on commands a batch may grow to by merging; `0` turns it off.
    pub batch_max_len: usize,
}

impl Default for MergePolicy {
    fn default() -> Self {
        let config = MergeConfig::default();
        Self {
            move_window_ms: duration_ms(config.move_window),
            smart_merge_window_ms: duration_ms(config.smart_merge_window),
            coalesce_updates: config.coalesce_updates,
            smart_merge: config.smart_merge,
            batch_max_len: config.batch_max_len,
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl EngineConfig {
    /// Load from a TOML string.
    #[cfg(feature = "policy-config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Toml)
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "policy-config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "policy-config")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(ConfigError::Json)
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "policy-config")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// Validate all parameters are within acceptable ranges.
    ///
    /// Returns a list of validation errors. An empty list means the config
    /// is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.history.max_depth == 0 {
            errors.push("history.max_depth must be > 0".into());
        }
        if self.history.max_bytes != 0 && self.history.max_bytes < 1024 {
            errors.push(format!(
                "history.max_bytes must be 0 (unlimited) or at least 1024, got {}",
                self.history.max_bytes
            ));
        }
        if self.merge.smart_merge && self.merge.smart_merge_window_ms == 0 {
            errors.push("merge.smart_merge_window_ms must be > 0 when smart_merge is on".into());
        }
        if self.recent_len == 0 {
            errors.push("recent_len must be > 0".into());
        }

        errors
    }

    /// `self` if valid, otherwise every validation error.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Merge settings in the form commands consume.
    #[must_use]
    pub fn to_merge_config(&self) -> MergeConfig {
        MergeConfig {
            move_window: Duration::from_millis(self.merge.move_window_ms),
            smart_merge_window: Duration::from_millis(self.merge.smart_merge_window_ms),
            coalesce_updates: self.merge.coalesce_updates,
            smart_merge: self.merge.smart_merge,
            batch_max_len: self.merge.batch_max_len,
        }
    }

    /// History settings in the form the history manager consumes.
    #[must_use]
    pub fn to_history_config(&self) -> HistoryConfig {
        HistoryConfig::new(self.history.max_depth, self.history.max_bytes)
            .with_merge_config(self.to_merge_config())
    }
}

/// Errors from loading or validating an [`EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading a file.
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),
    /// TOML parse error.
    #[cfg(feature = "policy-config")]
    #[error("TOML parse error: {0}")]
    Toml(#[source] toml::de::Error),
    /// JSON parse error.
    #[cfg(feature = "policy-config")]
    #[error("JSON parse error: {0}")]
    Json(#[source] serde_json::Error),
    /// Validation errors.
    #[error("validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Tests
// ============================================================================
