#![forbid(unsafe_code)]

//! Plain `(devices, links)` snapshots.
//!
//! A [`TopologySnapshot`] is what crosses the boundary to persistence and
//! file import/export: plain data, serializable with any serde format.
//! Whole-state commands (clear, import, load) hold two of these.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::graph::{GraphError, TopologyGraph};
use crate::link::Link;

/// Full copy of a topology.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub devices: Vec<Device>,
    pub links: Vec<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
}

/// How imported content combines with the current topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStrategy {
    /// Imported content replaces everything.
    #[default]
    Replace,
    /// Imported entities are added unless their ID already exists.
    Merge,
    /// Imported entities are added as-is.
    Append,
}

impl ImportStrategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Merge => "merge",
            Self::Append => "append",
        }
    }
}

impl fmt::Display for ImportStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TopologySnapshot {
    #[must_use]
    pub fn new(devices: Vec<Device>, links: Vec<Link>) -> Self {
        Self {
            devices,
            links,
            project_name: None,
        }
    }

    #[must_use]
    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty() && self.links.is_empty()
    }

    /// Check every graph invariant without building a graph for the caller.
    pub fn check_integrity(&self) -> Result<(), GraphError> {
        TopologyGraph::from_snapshot(self.clone()).map(|_| ())
    }

    /// Result of importing `imported` into `self` with `strategy`.
    ///
    /// The current project name is kept.
    #[must_use]
    pub fn combined(&self, imported: &TopologySnapshot, strategy: ImportStrategy) -> Self {
        let (devices, links) = match strategy {
            ImportStrategy::Replace => (imported.devices.clone(), imported.links.clone()),
            ImportStrategy::Append => (
                self.devices.iter().chain(&imported.devices).cloned().collect(),
                self.links.iter().chain(&imported.links).cloned().collect(),
            ),
            ImportStrategy::Merge => {
                let device_ids: HashSet<_> = self.devices.iter().map(|d| &d.id).collect();
                let link_ids: HashSet<_> = self.links.iter().map(|l| &l.id).collect();
                let devices = self
                    .devices
                    .iter()
                    .chain(imported.devices.iter().filter(|d| !device_ids.contains(&d.id)))
                    .cloned()
                    .collect();
                let links = self
                    .links
                    .iter()
                    .chain(imported.links.iter().filter(|l| !link_ids.contains(&l.id)))
                    .cloned()
                    .collect();
                (devices, links)
            }
        };
        Self {
            devices,
            links,
            project_name: self.project_name.clone(),
        }
    }

    /// Approximate heap footprint.
    #[must_use]
    pub fn heap_bytes(&self) -> usize {
        self.devices.iter().map(Device::heap_bytes).sum::<usize>()
            + self.links.iter().map(Link::heap_bytes).sum::<usize>()
            + self.project_name.as_ref().map_or(0, String::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceType, Position};
    use crate::link::LinkAttributes;

    fn snap(ids: &[&str]) -> TopologySnapshot {
        TopologySnapshot::new(
            ids.iter()
                .map(|id| Device::with_defaults(*id, DeviceType::Router, Position::default(), *id))
                .collect(),
            Vec::new(),
        )
    }

    #[test]
    fn replace_takes_imported_content() {
        let current = snap(&["a"]).with_project_name("lab");
        let combined = current.combined(&snap(&["b"]), ImportStrategy::Replace);
        assert_eq!(combined.devices.len(), 1);
        assert_eq!(combined.devices[0].id, "b".into());
        assert_eq!(combined.project_name.as_deref(), Some("lab"));
    }

    #[test]
    fn merge_skips_existing_ids() {
        let combined = snap(&["a", "b"]).combined(&snap(&["b", "c"]), ImportStrategy::Merge);
        let ids: Vec<_> = combined.devices.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert!(combined.check_integrity().is_ok());
    }

    #[test]
    fn append_can_produce_conflicts() {
        let combined = snap(&["a"]).combined(&snap(&["a"]), ImportStrategy::Append);
        assert_eq!(combined.devices.len(), 2);
        assert!(combined.check_integrity().is_err());
    }

    #[test]
    fn snapshot_roundtrips_through_json() {
        let mut s = snap(&["r1", "r2"]);
        s.links.push(Link::new("l", "r1", "r2", LinkAttributes::default()));
        let json = serde_json::to_string(&s).unwrap();
        let back: TopologySnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
