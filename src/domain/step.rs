//! Build steps, their outcomes, and the pipeline phases they belong to.

use super::{DemoEntry, DeviceEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Pipeline phase, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    UnitTest,
    DeviceCheck,
    DemoBuild,
    FormatCheck,
    DocBuild,
}

impl Phase {
    /// All phases in the order the pipeline runs them
    pub const ALL: [Phase; 5] = [
        Phase::UnitTest,
        Phase::DeviceCheck,
        Phase::DemoBuild,
        Phase::FormatCheck,
        Phase::DocBuild,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::UnitTest => "unit test",
            Self::DeviceCheck => "device check",
            Self::DemoBuild => "demo build",
            Self::FormatCheck => "format check",
            Self::DocBuild => "doc build",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Feature flags enabled for one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet(BTreeSet<String>);

impl FeatureSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(feature: impl Into<String>) -> Self {
        Self(BTreeSet::from([feature.into()]))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Comma-separated list as accepted by `--features`
    pub fn to_arg(&self) -> String {
        self.0.iter().map(String::as_str).collect::<Vec<_>>().join(",")
    }
}

impl<S: Into<String>> FromIterator<S> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// One concrete invocation to be executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStep {
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demo: Option<DemoEntry>,
    pub features: FeatureSet,
    pub default_features: bool,
}

impl BuildStep {
    /// A step with no device or demo context (test, fmt, doc)
    pub fn standalone(phase: Phase) -> Self {
        Self {
            phase,
            device: None,
            demo: None,
            features: FeatureSet::empty(),
            default_features: true,
        }
    }

    pub fn device_check(device: &DeviceEntry) -> Self {
        Self {
            phase: Phase::DeviceCheck,
            device: Some(device.clone()),
            demo: None,
            features: FeatureSet::single(&device.id),
            default_features: true,
        }
    }

    pub fn demo_build(demo: &DemoEntry, device: &DeviceEntry, default_features: bool) -> Self {
        Self {
            phase: Phase::DemoBuild,
            device: Some(device.clone()),
            demo: Some(demo.clone()),
            features: FeatureSet::single(&device.id),
            default_features,
        }
    }

    /// Short description of the matrix cell, used in failure reports
    pub fn context(&self) -> String {
        let mut parts = Vec::new();
        if let Some(demo) = &self.demo {
            parts.push(format!("demo {}", demo.name));
        }
        if let Some(device) = &self.device {
            parts.push(format!("device {}", device));
        }
        if !self.features.is_empty() {
            parts.push(format!("features [{}]", self.features.to_arg()));
        }
        if !self.default_features {
            parts.push("no default features".to_string());
        }
        if parts.is_empty() {
            self.phase.display_name().to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Result of executing one build step. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub step: BuildStep,
    pub success: bool,
    pub output: String,
    /// `None` when the tool was terminated by a signal
    pub exit_code: Option<i32>,
}

/// A device left out of a restricted demo's matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipNotice {
    pub demo: String,
    pub device: String,
    pub prefix: String,
}

impl std::fmt::Display for SkipNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Skipping {} for device {}: only {}* devices are supported",
            self.demo, self.device, self.prefix
        )
    }
}

/// One cell of the expanded matrix, in execution order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatrixCell {
    Step(BuildStep),
    Skipped(SkipNotice),
}

impl MatrixCell {
    pub fn as_step(&self) -> Option<&BuildStep> {
        match self {
            Self::Step(step) => Some(step),
            Self::Skipped(_) => None,
        }
    }
}
