#![forbid(unsafe_code)]

//! netdiagram core
//!
//! The data model every other netdiagram crate builds on:
//!
//! - [`device`] - device types, port capacities, positions, attribute records
//! - [`link`] - links between devices
//! - [`graph`] - [`TopologyGraph`], the invariant-checked device/link store
//! - [`snapshot`] - plain `(devices, links)` copies for persistence and
//!   whole-state commands
//! - [`numbering`] - default labels and IDs derived from current state
//! - [`validation`] - the connection gate consulted before linking devices
//!
//! # Role in netdiagram
//! `netdiagram-core` holds no history. The undo/redo engine in
//! `netdiagram-runtime` owns a [`TopologyGraph`] and mutates it only through
//! commands; editors read it back to render.

pub mod device;
pub mod graph;
pub mod link;
pub mod numbering;
pub mod snapshot;
pub mod validation;

pub use device::{
    Device, DeviceAttributes, DeviceId, DeviceRole, DeviceType, PortCapacity, Position, RateUnit,
    UnknownDeviceType,
};
pub use graph::{GraphError, PortStatus, TopologyGraph};
pub use link::{Link, LinkAttributes, LinkId};
pub use numbering::DeviceNumbering;
pub use snapshot::{ImportStrategy, TopologySnapshot};
pub use validation::{CONNECTION_RULES, ConnectionRule, Rejection, ValidationResult, validate};
