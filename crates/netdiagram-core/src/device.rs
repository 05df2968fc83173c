#![forbid(unsafe_code)]

//! Device nodes: types, port capacities, positions and attribute records.
//!
//! A [`Device`] keeps its `id` and [`DeviceType`] for its whole lifetime.
//! Only the [`Position`] and the [`DeviceAttributes`] record are mutable;
//! changing the type means deleting the device and creating a new one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Stable identifier of a device node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub String);

impl DeviceId {
    /// Create a new device ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw ID.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Number of links a device can terminate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortCapacity {
    /// No port limit.
    Unbounded,
    /// At most this many incident links.
    Limited(u32),
}

impl PortCapacity {
    /// Whether `used` links leave room for one more.
    #[must_use]
    pub const fn has_free_port(self, used: usize) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Limited(max) => used < max as usize,
        }
    }

    /// Free ports left, `None` when unbounded.
    #[must_use]
    pub fn available(self, used: usize) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::Limited(max) => Some((max as usize).saturating_sub(used)),
        }
    }
}

impl fmt::Display for PortCapacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbounded => f.write_str("unbounded"),
            Self::Limited(max) => write!(f, "{max}"),
        }
    }
}

/// Kind of network device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Router,
    Switch,
    Firewall,
    Server,
    Pc,
    Isp,
}

impl DeviceType {
    /// All device types, in palette order.
    pub const ALL: [DeviceType; 6] = [
        Self::Router,
        Self::Switch,
        Self::Firewall,
        Self::Server,
        Self::Pc,
        Self::Isp,
    ];

    /// Lower-case wire name (`"router"`, `"pc"`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Router => "router",
            Self::Switch => "switch",
            Self::Firewall => "firewall",
            Self::Server => "server",
            Self::Pc => "pc",
            Self::Isp => "isp",
        }
    }

    /// Name used in default labels and user-facing messages.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Router => "Router",
            Self::Switch => "Switch",
            Self::Firewall => "Firewall",
            Self::Server => "Server",
            Self::Pc => "PC",
            Self::Isp => "ISP",
        }
    }

    /// Port capacity for this type. End hosts have a single uplink.
    #[must_use]
    pub const fn port_capacity(self) -> PortCapacity {
        match self {
            Self::Pc | Self::Server => PortCapacity::Limited(1),
            Self::Router | Self::Switch | Self::Firewall | Self::Isp => PortCapacity::Unbounded,
        }
    }

    /// End hosts whose port usage is reported when a link is accepted.
    #[must_use]
    pub const fn is_end_host(self) -> bool {
        matches!(self, Self::Pc | Self::Server)
    }

    /// Whether new devices of this type get a default throughput.
    #[must_use]
    pub const fn has_default_throughput(self) -> bool {
        !matches!(self, Self::Pc | Self::Isp)
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Error returned when parsing an unknown device type name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown device type '{0}'")]
pub struct UnknownDeviceType(pub String);

impl FromStr for DeviceType {
    type Err = UnknownDeviceType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == lowered)
            .ok_or_else(|| UnknownDeviceType(s.to_string()))
    }
}

/// Canvas position of a device.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// This position shifted by `(dx, dy)`.
    #[must_use]
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Hierarchical role of a device in the network design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceRole {
    Core,
    Distribution,
    Access,
}

/// Unit for bandwidth and throughput figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RateUnit {
    #[serde(rename = "bps")]
    Bps,
    Kbps,
    #[default]
    Mbps,
    Gbps,
}

impl RateUnit {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bps => "bps",
            Self::Kbps => "Kbps",
            Self::Mbps => "Mbps",
            Self::Gbps => "Gbps",
        }
    }
}

impl fmt::Display for RateUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Editable properties of a device.
///
/// Snapshots of this record are what update commands store, so it is a
/// plain value type with a fixed set of fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceAttributes {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_throughput: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throughput_unit: Option<RateUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth_unit: Option<RateUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_role: Option<DeviceRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_capacity: Option<String>,
}

impl DeviceAttributes {
    /// Attributes carrying only a label.
    #[must_use]
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Names of the fields whose values differ from `other`.
    #[must_use]
    pub fn changed_fields(&self, other: &Self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.label != other.label {
            fields.push("label");
        }
        if self.max_throughput != other.max_throughput {
            fields.push("max_throughput");
        }
        if self.throughput_unit != other.throughput_unit {
            fields.push("throughput_unit");
        }
        if self.bandwidth != other.bandwidth {
            fields.push("bandwidth");
        }
        if self.bandwidth_unit != other.bandwidth_unit {
            fields.push("bandwidth_unit");
        }
        if self.device_role != other.device_role {
            fields.push("device_role");
        }
        if self.user_capacity != other.user_capacity {
            fields.push("user_capacity");
        }
        fields
    }

    /// Approximate heap footprint, for history memory accounting.
    #[must_use]
    pub fn heap_bytes(&self) -> usize {
        self.label.len()
            + self.max_throughput.as_ref().map_or(0, String::len)
            + self.bandwidth.as_ref().map_or(0, String::len)
            + self.user_capacity.as_ref().map_or(0, String::len)
    }
}

/// A device node in the topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub device_type: DeviceType,
    pub position: Position,
    pub attributes: DeviceAttributes,
}

impl Device {
    /// Create a device with the given attributes.
    #[must_use]
    pub fn new(
        id: impl Into<DeviceId>,
        device_type: DeviceType,
        position: Position,
        attributes: DeviceAttributes,
    ) -> Self {
        Self {
            id: id.into(),
            device_type,
            position,
            attributes,
        }
    }

    /// Create a freshly placed device with palette defaults.
    ///
    /// Everything except PCs and ISP uplinks starts with a 1000 Mbps
    /// throughput.
    #[must_use]
    pub fn with_defaults(
        id: impl Into<DeviceId>,
        device_type: DeviceType,
        position: Position,
        label: impl Into<String>,
    ) -> Self {
        let mut attributes = DeviceAttributes::labeled(label);
        if device_type.has_default_throughput() {
            attributes.max_throughput = Some("1000".to_string());
            attributes.throughput_unit = Some(RateUnit::Mbps);
        }
        Self::new(id, device_type, position, attributes)
    }

    /// Label if set, otherwise the ID.
    #[must_use]
    pub fn display_label(&self) -> &str {
        if self.attributes.label.is_empty() {
            self.id.as_str()
        } else {
            &self.attributes.label
        }
    }

    #[must_use]
    pub fn heap_bytes(&self) -> usize {
        self.id.0.len() + self.attributes.heap_bytes()
    }
}

// ============================================================================
// Tests
// ============================================================================
