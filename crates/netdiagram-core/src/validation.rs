#![forbid(unsafe_code)]

//! Connection validation.
//!
//! [`validate`] decides whether a link between two devices is legal. It is
//! a pure function of its inputs and must be consulted before any
//! link-adding command is built.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. identity (a device cannot link to itself)
//! 2. duplicate (one link per unordered pair)
//! 3. port capacity of the source, then of the target
//! 4. rule lookup by `(source type, target type)` in [`CONNECTION_RULES`]
//!
//! A type pair with no matching rule is rejected.

use thiserror::Error;

use crate::device::{Device, DeviceType, PortCapacity};
use crate::graph::{PortStatus, count_incident};
use crate::link::Link;

/// Why a prospective connection was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("a device cannot be connected to itself")]
    SelfConnection,
    #[error("'{from}' and '{to}' are already connected")]
    AlreadyConnected { from: String, to: String },
    #[error("{device_type} port limit reached on '{label}' ({used}/{capacity} ports)")]
    PortsExhausted {
        device_type: DeviceType,
        label: String,
        used: usize,
        capacity: u32,
    },
    #[error("no connection rule for {from} → {to}")]
    NoRule { from: DeviceType, to: DeviceType },
    #[error("{reason}")]
    Forbidden { reason: &'static str },
}

/// A row of the compatibility table.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionRule {
    pub from: &'static [DeviceType],
    pub to: &'static [DeviceType],
    pub allowed: bool,
    pub reason: &'static str,
}

impl ConnectionRule {
    #[must_use]
    pub fn matches(&self, source: DeviceType, target: DeviceType) -> bool {
        self.from.contains(&source) && self.to.contains(&target)
    }
}

use DeviceType::{Firewall, Isp, Pc, Router, Server, Switch};

/// Built-in compatibility table.
///
/// Every pair used in practice is allowed; ISP uplinks only terminate on
/// network gear, and end hosts never connect to an ISP directly.
pub const CONNECTION_RULES: &[ConnectionRule] = &[
    ConnectionRule {
        from: &[Isp],
        to: &[Router, Firewall, Switch],
        allowed: true,
        reason: "ISP connects to Router, Firewall and Switch",
    },
    ConnectionRule {
        from: &[Pc],
        to: &[Pc, Server, Switch, Router, Firewall],
        allowed: true,
        reason: "PC connects to any device",
    },
    ConnectionRule {
        from: &[Server],
        to: &[Pc, Server, Switch, Router, Firewall],
        allowed: true,
        reason: "Server connects to any device",
    },
    ConnectionRule {
        from: &[Switch],
        to: &[Pc, Server, Switch, Router, Firewall, Isp],
        allowed: true,
        reason: "Switch connects to any device, including ISP",
    },
    ConnectionRule {
        from: &[Router],
        to: &[Pc, Server, Switch, Router, Firewall, Isp],
        allowed: true,
        reason: "Router connects to any device, including ISP",
    },
    ConnectionRule {
        from: &[Firewall],
        to: &[Pc, Server, Switch, Router, Firewall, Isp],
        allowed: true,
        reason: "Firewall connects to any device, including ISP",
    },
];

/// Outcome of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    /// Human-readable explanation, shown to the user either way.
    pub reason: String,
    /// Typed cause when invalid.
    pub rejection: Option<Rejection>,
}

impl ValidationResult {
    fn accepted(reason: String) -> Self {
        Self {
            is_valid: true,
            reason,
            rejection: None,
        }
    }

    fn rejected(rejection: Rejection) -> Self {
        Self {
            is_valid: false,
            reason: rejection.to_string(),
            rejection: Some(rejection),
        }
    }

    /// `Ok(reason)` when valid, `Err(rejection)` otherwise.
    pub fn into_result(self) -> Result<String, Rejection> {
        match self.rejection {
            Some(rejection) => Err(rejection),
            None => Ok(self.reason),
        }
    }
}

/// Port usage of `device` given `links`.
#[must_use]
pub fn port_status(device: &Device, links: &[Link]) -> PortStatus {
    PortStatus {
        used: count_incident(&device.id, links),
        capacity: device.device_type.port_capacity(),
    }
}

/// Validate a link from `source` to `target` against the built-in rules.
#[must_use]
pub fn validate(source: &Device, target: &Device, links: &[Link]) -> ValidationResult {
    validate_with(CONNECTION_RULES, source, target, links)
}

/// Validate against a caller-supplied rule table.
#[must_use]
pub fn validate_with(
    rules: &[ConnectionRule],
    source: &Device,
    target: &Device,
    links: &[Link],
) -> ValidationResult {
    if source.id == target.id {
        return ValidationResult::rejected(Rejection::SelfConnection);
    }

    if links.iter().any(|l| l.connects(&source.id, &target.id)) {
        return ValidationResult::rejected(Rejection::AlreadyConnected {
            from: source.display_label().to_string(),
            to: target.display_label().to_string(),
        });
    }

    for device in [source, target] {
        if let Err(rejection) = check_ports(device, links) {
            return ValidationResult::rejected(rejection);
        }
    }

    let (from, to) = (source.device_type, target.device_type);
    let Some(rule) = rules.iter().find(|r| r.matches(from, to)) else {
        return ValidationResult::rejected(Rejection::NoRule { from, to });
    };
    if !rule.allowed {
        return ValidationResult::rejected(Rejection::Forbidden {
            reason: rule.reason,
        });
    }

    ValidationResult::accepted(format!("{}{}", rule.reason, port_preview(source, target, links)))
}

fn check_ports(device: &Device, links: &[Link]) -> Result<(), Rejection> {
    let status = port_status(device, links);
    match status.capacity {
        PortCapacity::Limited(capacity) if !status.has_free_port() => {
            Err(Rejection::PortsExhausted {
                device_type: device.device_type,
                label: device.display_label().to_string(),
                used: status.used,
                capacity,
            })
        }
        _ => Ok(()),
    }
}

/// Port usage after the link is added, for end hosts only.
fn port_preview(source: &Device, target: &Device, links: &[Link]) -> String {
    let parts: Vec<String> = [source, target]
        .into_iter()
        .filter(|d| d.device_type.is_end_host())
        .filter_map(|d| {
            let status = port_status(d, links);
            match status.capacity {
                PortCapacity::Limited(max) if max > 0 => {
                    Some(format!("{}: {}/{}", d.device_type, status.used + 1, max))
                }
                _ => None,
            }
        })
        .collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

// ============================================================================
// Tests
// ============================================================================
