//! Device matrix: the ordered set of hardware variants and their targets.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A hardware device variant and the target triple it compiles for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// Numeric device identifier (e.g. "52840"), also used as the feature name
    pub id: String,
    /// Compiler target triple
    pub target: String,
}

impl DeviceEntry {
    pub fn new(id: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            target: target.into(),
        }
    }

    /// Check whether this device belongs to the family named by `prefix`
    pub fn in_family(&self, prefix: &str) -> bool {
        self.id.starts_with(prefix)
    }
}

impl std::fmt::Display for DeviceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.id, self.target)
    }
}

/// Immutable, ordered device matrix.
///
/// Declaration order is iteration order, so two runs over the same
/// configuration always visit devices in the same sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMatrix {
    devices: Vec<DeviceEntry>,
}

impl DeviceMatrix {
    /// Build a matrix, rejecting duplicate ids, non-numeric ids and empty targets
    pub fn new(devices: Vec<DeviceEntry>) -> ConfigResult<Self> {
        let mut seen = HashSet::new();
        for device in &devices {
            if device.id.is_empty() || !device.id.chars().all(|c| c.is_ascii_digit()) {
                return Err(ConfigError::InvalidDeviceId(device.id.clone()));
            }
            if device.target.trim().is_empty() {
                return Err(ConfigError::EmptyTarget(device.id.clone()));
            }
            if !seen.insert(device.id.as_str()) {
                return Err(ConfigError::DuplicateDevice(device.id.clone()));
            }
        }
        Ok(Self { devices })
    }

    /// All devices in declaration order
    pub fn devices(&self) -> &[DeviceEntry] {
        &self.devices
    }
}
