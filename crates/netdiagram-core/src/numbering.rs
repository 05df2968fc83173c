#![forbid(unsafe_code)]

//! Default device labels and IDs derived from the current topology.
//!
//! Labels follow `"<DisplayName> <n>"` (`"Router 3"`, `"PC 12"`). The next
//! number for a type is one past the highest number already in use, read
//! from the devices present right now, so numbering depends only on state.
//!
//! A [`DeviceNumbering`] also remembers what it handed out, which lets a
//! single paste allocate several devices of one type without collisions.

use std::collections::{HashMap, HashSet};

use crate::device::{Device, DeviceId, DeviceType};

/// Allocator for default labels and unique device IDs.
#[derive(Debug, Clone, Default)]
pub struct DeviceNumbering {
    highest: HashMap<DeviceType, u32>,
    taken_ids: HashSet<DeviceId>,
}

impl DeviceNumbering {
    /// Scan `devices` for existing label numbers and IDs.
    #[must_use]
    pub fn from_devices(devices: &[Device]) -> Self {
        let mut numbering = Self::default();
        for device in devices {
            numbering.taken_ids.insert(device.id.clone());
            if let Some(n) = label_number(device.device_type, &device.attributes.label) {
                let entry = numbering.highest.entry(device.device_type).or_insert(0);
                *entry = (*entry).max(n);
            }
        }
        numbering
    }

    /// Number the next device of `device_type` would get, without reserving it.
    #[must_use]
    pub fn peek(&self, device_type: DeviceType) -> u32 {
        self.highest.get(&device_type).copied().unwrap_or(0) + 1
    }

    /// Reserve the next label and a unique ID for `device_type`.
    pub fn allocate(&mut self, device_type: DeviceType) -> (DeviceId, String) {
        let number = self.peek(device_type);
        self.highest.insert(device_type, number);

        let label = format!("{} {number}", device_type.display_name());
        let mut id = DeviceId::new(format!("{}-{number}", device_type.as_str()));
        let mut suffix = 1;
        while self.taken_ids.contains(&id) {
            suffix += 1;
            id = DeviceId::new(format!("{}-{number}-{suffix}", device_type.as_str()));
        }
        self.taken_ids.insert(id.clone());
        (id, label)
    }
}

/// Number in a default-style label for `device_type`, if the label has one.
///
/// Matching is case-insensitive on the display name.
#[must_use]
pub fn label_number(device_type: DeviceType, label: &str) -> Option<u32> {
    let name = device_type.display_name();
    let label = label.trim();
    let (prefix, rest) = label.split_at_checked(name.len())?;
    if !prefix.eq_ignore_ascii_case(name) {
        return None;
    }
    let digits = rest.strip_prefix(' ')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
