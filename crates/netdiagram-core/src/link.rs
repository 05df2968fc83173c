#![forbid(unsafe_code)]

//! Links between devices.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::{Device, DeviceId, RateUnit};

/// Stable identifier of a link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(pub String);

impl LinkId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Conventional ID for a link between two devices.
    #[must_use]
    pub fn between(source: &DeviceId, target: &DeviceId) -> Self {
        Self(format!("link-{source}-{target}"))
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LinkId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for LinkId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Editable properties of a link.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LinkAttributes {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth_unit: Option<RateUnit>,
}

impl LinkAttributes {
    /// Default bandwidth used when neither endpoint specifies one.
    pub const DEFAULT_BANDWIDTH: &'static str = "1000";

    /// Attributes for a new link, inheriting bandwidth from its endpoints.
    ///
    /// The source device wins over the target; with neither set the link
    /// gets 1000 Mbps. The label is the bandwidth figure.
    #[must_use]
    pub fn derived_from(source: &Device, target: &Device) -> Self {
        let inherited = [source, target].into_iter().find_map(|d| {
            match (&d.attributes.bandwidth, d.attributes.bandwidth_unit) {
                (Some(bw), Some(unit)) => Some((bw.clone(), unit)),
                _ => None,
            }
        });
        let (bandwidth, unit) =
            inherited.unwrap_or_else(|| (Self::DEFAULT_BANDWIDTH.to_string(), RateUnit::Mbps));
        Self {
            label: format!("{bandwidth} {unit}"),
            bandwidth: Some(bandwidth),
            bandwidth_unit: Some(unit),
        }
    }

    /// Names of the fields whose values differ from `other`.
    #[must_use]
    pub fn changed_fields(&self, other: &Self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.label != other.label {
            fields.push("label");
        }
        if self.bandwidth != other.bandwidth {
            fields.push("bandwidth");
        }
        if self.bandwidth_unit != other.bandwidth_unit {
            fields.push("bandwidth_unit");
        }
        fields
    }

    #[must_use]
    pub fn heap_bytes(&self) -> usize {
        self.label.len() + self.bandwidth.as_ref().map_or(0, String::len)
    }
}

/// An undirected connection between two devices.
///
/// `source` and `target` record drawing direction only; uniqueness and
/// port accounting treat the pair as unordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub source: DeviceId,
    pub target: DeviceId,
    pub attributes: LinkAttributes,
}

impl Link {
    #[must_use]
    pub fn new(
        id: impl Into<LinkId>,
        source: impl Into<DeviceId>,
        target: impl Into<DeviceId>,
        attributes: LinkAttributes,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            attributes,
        }
    }

    /// Whether this link joins `a` and `b`, in either direction.
    #[must_use]
    pub fn connects(&self, a: &DeviceId, b: &DeviceId) -> bool {
        (&self.source == a && &self.target == b) || (&self.source == b && &self.target == a)
    }

    /// Whether `device` is one of the endpoints.
    #[must_use]
    pub fn touches(&self, device: &DeviceId) -> bool {
        &self.source == device || &self.target == device
    }

    #[must_use]
    pub fn heap_bytes(&self) -> usize {
        self.id.0.len() + self.source.0.len() + self.target.0.len() + self.attributes.heap_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceType, Position};

    #[test]
    fn connects_is_unordered() {
        let link = Link::new("l1", "a", "b", LinkAttributes::default());
        assert!(link.connects(&"a".into(), &"b".into()));
        assert!(link.connects(&"b".into(), &"a".into()));
        assert!(!link.connects(&"a".into(), &"c".into()));
        assert!(link.touches(&"b".into()));
    }

    #[test]
    fn derived_attributes_prefer_source_bandwidth() {
        let mut src = Device::with_defaults("s", DeviceType::Switch, Position::default(), "Switch 1");
        let mut dst = Device::with_defaults("r", DeviceType::Router, Position::default(), "Router 1");
        dst.attributes.bandwidth = Some("10".into());
        dst.attributes.bandwidth_unit = Some(RateUnit::Gbps);

        let attrs = LinkAttributes::derived_from(&src, &dst);
        assert_eq!(attrs.label, "10 Gbps");

        src.attributes.bandwidth = Some("100".into());
        src.attributes.bandwidth_unit = Some(RateUnit::Mbps);
        let attrs = LinkAttributes::derived_from(&src, &dst);
        assert_eq!(attrs.label, "100 Mbps");
    }

    #[test]
    fn derived_attributes_default_to_gigabit() {
        let a = Device::with_defaults("a", DeviceType::Pc, Position::default(), "PC 1");
        let b = Device::with_defaults("b", DeviceType::Pc, Position::default(), "PC 2");
        let attrs = LinkAttributes::derived_from(&a, &b);
        assert_eq!(attrs.label, "1000 Mbps");
        assert_eq!(attrs.bandwidth_unit, Some(RateUnit::Mbps));
    }
}
