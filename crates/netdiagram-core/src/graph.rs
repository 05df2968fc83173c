#![forbid(unsafe_code)]

//! The topology graph: ordered device and link collections.
//!
//! [`TopologyGraph`] is the single mutable resource of an editing session.
//! Every mutator checks its preconditions before touching anything, so an
//! `Err` always leaves the graph exactly as it was.
//!
//! # Invariants
//!
//! 1. Device and link IDs are unique.
//! 2. Every link references two devices currently in the graph.
//! 3. No link joins a device to itself.
//! 4. At most one link per unordered device pair.
//! 5. `used_ports(d) <= capacity(d.device_type)` for every device.
//!
//! Collections are ordered. Removal reports the index an entity was taken
//! from so it can be put back in the same place, which makes
//! remove-then-reinsert an exact structural inverse.

use std::fmt;

use thiserror::Error;

use crate::device::{Device, DeviceAttributes, DeviceId, DeviceType, PortCapacity, Position};
use crate::link::{Link, LinkAttributes, LinkId};
use crate::snapshot::TopologySnapshot;

/// Errors raised when a mutation would break a graph invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("device '{0}' already exists")]
    DuplicateDeviceId(DeviceId),
    #[error("link '{0}' already exists")]
    DuplicateLinkId(LinkId),
    #[error("device '{0}' not found")]
    DeviceNotFound(DeviceId),
    #[error("link '{0}' not found")]
    LinkNotFound(LinkId),
    #[error("link '{link}' references missing device '{device}'")]
    DanglingLink { link: LinkId, device: DeviceId },
    #[error("device '{0}' cannot be linked to itself")]
    SelfLoop(DeviceId),
    #[error("devices '{from}' and '{to}' are already connected")]
    DuplicateConnection { from: DeviceId, to: DeviceId },
    #[error("{device_type} '{device}' has no free port ({used}/{capacity} ports)")]
    PortsExhausted {
        device: DeviceId,
        device_type: DeviceType,
        used: usize,
        capacity: u32,
    },
    #[error("device '{device}' still has {count} link(s) attached")]
    DeviceHasLinks { device: DeviceId, count: usize },
}

/// Port usage of a single device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortStatus {
    pub used: usize,
    pub capacity: PortCapacity,
}

impl PortStatus {
    /// Free ports, `None` when the device is unbounded.
    #[must_use]
    pub fn available(&self) -> Option<usize> {
        self.capacity.available(self.used)
    }

    /// Whether another link can be attached.
    #[must_use]
    pub fn has_free_port(&self) -> bool {
        self.capacity.has_free_port(self.used)
    }

    /// Usage in percent, `None` when unbounded.
    #[must_use]
    pub fn percentage(&self) -> Option<u32> {
        match self.capacity {
            PortCapacity::Unbounded => None,
            PortCapacity::Limited(0) => Some(0),
            PortCapacity::Limited(max) => {
                Some(((self.used as f64 / f64::from(max)) * 100.0).round() as u32)
            }
        }
    }
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.capacity {
            PortCapacity::Unbounded => write!(f, "{}/unbounded", self.used),
            PortCapacity::Limited(max) => write!(f, "{}/{}", self.used, max),
        }
    }
}

/// Count links incident to `device` in `links`.
#[must_use]
pub fn count_incident(device: &DeviceId, links: &[Link]) -> usize {
    links.iter().filter(|l| l.touches(device)).count()
}

/// Device/link collections with invariant-checked mutation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TopologyGraph {
    devices: Vec<Device>,
    links: Vec<Link>,
    project_name: Option<String>,
}

impl TopologyGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a snapshot, validating every invariant.
    pub fn from_snapshot(snapshot: TopologySnapshot) -> Result<Self, GraphError> {
        let TopologySnapshot {
            devices,
            links,
            project_name,
        } = snapshot;
        let mut graph = Self {
            devices: Vec::with_capacity(devices.len()),
            links: Vec::with_capacity(links.len()),
            project_name,
        };
        for device in devices {
            graph.push_device(device)?;
        }
        for link in links {
            graph.push_link(link)?;
        }
        Ok(graph)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    #[must_use]
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    #[must_use]
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    #[must_use]
    pub fn project_name(&self) -> Option<&str> {
        self.project_name.as_deref()
    }

    #[must_use]
    pub fn device(&self, id: &DeviceId) -> Option<&Device> {
        self.devices.iter().find(|d| &d.id == id)
    }

    #[must_use]
    pub fn link(&self, id: &LinkId) -> Option<&Link> {
        self.links.iter().find(|l| &l.id == id)
    }

    #[must_use]
    pub fn contains_device(&self, id: &DeviceId) -> bool {
        self.device(id).is_some()
    }

    #[must_use]
    pub fn contains_link(&self, id: &LinkId) -> bool {
        self.link(id).is_some()
    }

    /// Link joining `a` and `b` in either direction, if any.
    #[must_use]
    pub fn link_between(&self, a: &DeviceId, b: &DeviceId) -> Option<&Link> {
        self.links.iter().find(|l| l.connects(a, b))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty() && self.links.is_empty()
    }

    /// Total number of devices and links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len() + self.links.len()
    }

    /// Number of links attached to `id`.
    #[must_use]
    pub fn used_ports(&self, id: &DeviceId) -> usize {
        count_incident(id, &self.links)
    }

    /// Port usage for a device, `None` if it does not exist.
    #[must_use]
    pub fn port_status(&self, id: &DeviceId) -> Option<PortStatus> {
        self.device(id).map(|d| PortStatus {
            used: self.used_ports(id),
            capacity: d.device_type.port_capacity(),
        })
    }

    /// Links attached to `id` with their current indices, in index order.
    #[must_use]
    pub fn incident_links(&self, id: &DeviceId) -> Vec<(usize, Link)> {
        self.links
            .iter()
            .enumerate()
            .filter(|(_, l)| l.touches(id))
            .map(|(i, l)| (i, l.clone()))
            .collect()
    }

    /// Copy of the current collections.
    #[must_use]
    pub fn snapshot(&self) -> TopologySnapshot {
        TopologySnapshot {
            devices: self.devices.clone(),
            links: self.links.clone(),
            project_name: self.project_name.clone(),
        }
    }

    /// Approximate heap footprint of the collections.
    #[must_use]
    pub fn heap_bytes(&self) -> usize {
        self.devices.iter().map(Device::heap_bytes).sum::<usize>()
            + self.links.iter().map(Link::heap_bytes).sum::<usize>()
    }

    // ========================================================================
    // Device mutation
    // ========================================================================

    /// Append a device.
    pub fn push_device(&mut self, device: Device) -> Result<(), GraphError> {
        let index = self.devices.len();
        self.insert_device_at(index, device)
    }

    /// Insert a device at `index` (clamped to the collection length).
    pub fn insert_device_at(&mut self, index: usize, device: Device) -> Result<(), GraphError> {
        if self.contains_device(&device.id) {
            return Err(GraphError::DuplicateDeviceId(device.id));
        }
        let index = index.min(self.devices.len());
        self.devices.insert(index, device);
        Ok(())
    }

    /// Remove a device that has no links attached.
    ///
    /// Returns the index it occupied together with the device.
    pub fn remove_device(&mut self, id: &DeviceId) -> Result<(usize, Device), GraphError> {
        let index = self
            .device_index(id)
            .ok_or_else(|| GraphError::DeviceNotFound(id.clone()))?;
        let count = self.used_ports(id);
        if count > 0 {
            return Err(GraphError::DeviceHasLinks {
                device: id.clone(),
                count,
            });
        }
        Ok((index, self.devices.remove(index)))
    }

    /// Move a device, returning its previous position.
    pub fn set_position(&mut self, id: &DeviceId, position: Position) -> Result<Position, GraphError> {
        let device = self.device_mut(id)?;
        Ok(std::mem::replace(&mut device.position, position))
    }

    /// Replace a device's attributes, returning the previous record.
    pub fn set_device_attributes(
        &mut self,
        id: &DeviceId,
        attributes: DeviceAttributes,
    ) -> Result<DeviceAttributes, GraphError> {
        let device = self.device_mut(id)?;
        Ok(std::mem::replace(&mut device.attributes, attributes))
    }

    // ========================================================================
    // Link mutation
    // ========================================================================

    /// Append a link.
    pub fn push_link(&mut self, link: Link) -> Result<(), GraphError> {
        let index = self.links.len();
        self.insert_link_at(index, link)
    }

    /// Insert a link at `index` (clamped), enforcing every link invariant.
    pub fn insert_link_at(&mut self, index: usize, link: Link) -> Result<(), GraphError> {
        self.check_link(&link)?;
        let index = index.min(self.links.len());
        self.links.insert(index, link);
        Ok(())
    }

    /// Remove a link, returning the index it occupied and the link.
    pub fn remove_link(&mut self, id: &LinkId) -> Result<(usize, Link), GraphError> {
        let index = self
            .links
            .iter()
            .position(|l| &l.id == id)
            .ok_or_else(|| GraphError::LinkNotFound(id.clone()))?;
        Ok((index, self.links.remove(index)))
    }

    /// Replace a link's attributes, returning the previous record.
    pub fn set_link_attributes(
        &mut self,
        id: &LinkId,
        attributes: LinkAttributes,
    ) -> Result<LinkAttributes, GraphError> {
        let link = self
            .links
            .iter_mut()
            .find(|l| &l.id == id)
            .ok_or_else(|| GraphError::LinkNotFound(id.clone()))?;
        Ok(std::mem::replace(&mut link.attributes, attributes))
    }

    // ========================================================================
    // Whole-state operations
    // ========================================================================

    /// Swap in a validated snapshot, returning the previous state.
    ///
    /// The graph is unchanged if the snapshot violates an invariant.
    pub fn restore(&mut self, snapshot: TopologySnapshot) -> Result<TopologySnapshot, GraphError> {
        let next = Self::from_snapshot(snapshot)?;
        let previous = std::mem::replace(self, next);
        Ok(previous.into_snapshot())
    }

    /// Remove everything except the project name.
    pub fn clear(&mut self) -> TopologySnapshot {
        let previous = self.snapshot();
        self.devices.clear();
        self.links.clear();
        previous
    }

    pub fn set_project_name(&mut self, name: Option<String>) -> Option<String> {
        std::mem::replace(&mut self.project_name, name)
    }

    #[must_use]
    pub fn into_snapshot(self) -> TopologySnapshot {
        TopologySnapshot {
            devices: self.devices,
            links: self.links,
            project_name: self.project_name,
        }
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn device_index(&self, id: &DeviceId) -> Option<usize> {
        self.devices.iter().position(|d| &d.id == id)
    }

    fn device_mut(&mut self, id: &DeviceId) -> Result<&mut Device, GraphError> {
        self.devices
            .iter_mut()
            .find(|d| &d.id == id)
            .ok_or_else(|| GraphError::DeviceNotFound(id.clone()))
    }

    fn check_link(&self, link: &Link) -> Result<(), GraphError> {
        if self.contains_link(&link.id) {
            return Err(GraphError::DuplicateLinkId(link.id.clone()));
        }
        for endpoint in [&link.source, &link.target] {
            if !self.contains_device(endpoint) {
                return Err(GraphError::DanglingLink {
                    link: link.id.clone(),
                    device: endpoint.clone(),
                });
            }
        }
        if link.source == link.target {
            return Err(GraphError::SelfLoop(link.source.clone()));
        }
        if self.link_between(&link.source, &link.target).is_some() {
            return Err(GraphError::DuplicateConnection {
                from: link.source.clone(),
                to: link.target.clone(),
            });
        }
        for endpoint in [&link.source, &link.target] {
            self.check_free_port(endpoint)?;
        }
        Ok(())
    }

    fn check_free_port(&self, id: &DeviceId) -> Result<(), GraphError> {
        let Some(status) = self.port_status(id) else {
            return Err(GraphError::DeviceNotFound(id.clone()));
        };
        match status.capacity {
            PortCapacity::Limited(capacity) if !status.has_free_port() => {
                let device_type = self
                    .device(id)
                    .map(|d| d.device_type)
                    .ok_or_else(|| GraphError::DeviceNotFound(id.clone()))?;
                Err(GraphError::PortsExhausted {
                    device: id.clone(),
                    device_type,
                    used: status.used,
                    capacity,
                })
            }
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, device_type: DeviceType) -> Device {
        Device::with_defaults(id, device_type, Position::default(), id)
    }

    fn link(id: &str, a: &str, b: &str) -> Link {
        Link::new(id, a, b, LinkAttributes::default())
    }

    fn sample() -> TopologyGraph {
        let mut g = TopologyGraph::new();
        g.push_device(device("r1", DeviceType::Router)).unwrap();
        g.push_device(device("pc1", DeviceType::Pc)).unwrap();
        g.push_device(device("pc2", DeviceType::Pc)).unwrap();
        g.push_link(link("l1", "r1", "pc1")).unwrap();
        g
    }

    #[test]
    fn rejects_duplicate_device() {
        let mut g = sample();
        let err = g.push_device(device("r1", DeviceType::Switch)).unwrap_err();
        assert_eq!(err, GraphError::DuplicateDeviceId("r1".into()));
        assert_eq!(g.devices().len(), 3);
    }

    #[test]
    fn rejects_self_loop() {
        let mut g = sample();
        let err = g.push_link(link("l2", "r1", "r1")).unwrap_err();
        assert_eq!(err, GraphError::SelfLoop("r1".into()));
    }

    #[test]
    fn rejects_duplicate_pair_in_either_direction() {
        let mut g = sample();
        let err = g.push_link(link("l2", "pc1", "r1")).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateConnection { .. }));
    }

    #[test]
    fn rejects_dangling_link() {
        let mut g = sample();
        let err = g.push_link(link("l2", "r1", "ghost")).unwrap_err();
        assert!(matches!(err, GraphError::DanglingLink { .. }));
    }

    #[test]
    fn enforces_port_capacity() {
        let mut g = sample();
        let err = g.push_link(link("l2", "pc1", "pc2")).unwrap_err();
        match err {
            GraphError::PortsExhausted {
                device,
                used,
                capacity,
                ..
            } => {
                assert_eq!(device, "pc1".into());
                assert_eq!((used, capacity), (1, 1));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(g.links().len(), 1);
    }

    #[test]
    fn remove_device_requires_detached_links() {
        let mut g = sample();
        let err = g.remove_device(&"pc1".into()).unwrap_err();
        assert!(matches!(err, GraphError::DeviceHasLinks { count: 1, .. }));

        g.remove_link(&"l1".into()).unwrap();
        let (index, removed) = g.remove_device(&"pc1".into()).unwrap();
        assert_eq!(index, 1);
        assert_eq!(removed.id, "pc1".into());
    }

    #[test]
    fn reinsert_at_index_restores_order() {
        let mut g = sample();
        let before = g.clone();
        let (index, removed) = g.remove_device(&"pc2".into()).unwrap();
        g.insert_device_at(index, removed).unwrap();
        assert_eq!(g, before);
    }

    #[test]
    fn port_status_reports_usage() {
        let g = sample();
        let status = g.port_status(&"pc1".into()).unwrap();
        assert_eq!(status.to_string(), "1/1");
        assert_eq!(status.percentage(), Some(100));
        assert!(!status.has_free_port());

        let router = g.port_status(&"r1".into()).unwrap();
        assert!(router.has_free_port());
        assert_eq!(router.available(), None);
    }

    #[test]
    fn restore_rejects_invalid_snapshot_and_keeps_state() {
        let mut g = sample();
        let before = g.clone();
        let mut bad = g.snapshot();
        bad.links.push(link("l9", "pc2", "ghost"));
        assert!(g.restore(bad).is_err());
        assert_eq!(g, before);
    }

    #[test]
    fn restore_returns_previous_state() {
        let mut g = sample();
        let previous = g.restore(TopologySnapshot::default()).unwrap();
        assert!(g.is_empty());
        assert_eq!(previous.devices.len(), 3);
    }

    #[test]
    fn set_position_returns_old_value() {
        let mut g = sample();
        let old = g.set_position(&"r1".into(), Position::new(5.0, 6.0)).unwrap();
        assert_eq!(old, Position::default());
        assert_eq!(g.device(&"r1".into()).unwrap().position, Position::new(5.0, 6.0));
        assert!(g.set_position(&"nope".into(), Position::default()).is_err());
    }

    #[test]
    fn len_counts_devices_and_links() {
        let g = sample();
        assert_eq!(g.len(), g.devices().len() + g.links().len());
        assert_eq!(TopologyGraph::new().len(), 0);
    }
}
