//! Demo application entities and the directory-name classifier.

use crate::error::{ConfigError, ConfigResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which devices a demo must be built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemoClass {
    /// Built for every device in the matrix
    Unrestricted,
    /// Built only for devices in the restricted family
    Restricted,
    /// Not built at all
    Excluded,
}

/// A buildable demo application directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoEntry {
    /// Directory containing the demo crate
    pub path: PathBuf,
    /// Directory name, used for classification and progress output
    pub name: String,
    pub class: DemoClass,
}

impl DemoEntry {
    pub fn new(path: PathBuf, class: DemoClass) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { path, name, class }
    }

    pub fn is_restricted(&self) -> bool {
        self.class == DemoClass::Restricted
    }
}

/// Maps a demo directory name to its class
pub trait DemoClassifier {
    fn classify(&self, name: &str) -> DemoClass;
}

impl<F> DemoClassifier for F
where
    F: Fn(&str) -> DemoClass,
{
    fn classify(&self, name: &str) -> DemoClass {
        self(name)
    }
}

/// Default classifier: one regex per class, restricted checked first
#[derive(Debug, Clone)]
pub struct PatternClassifier {
    unrestricted: Regex,
    restricted: Regex,
}

impl PatternClassifier {
    pub fn new(unrestricted: &str, restricted: &str) -> ConfigResult<Self> {
        Ok(Self {
            unrestricted: compile(unrestricted)?,
            restricted: compile(restricted)?,
        })
    }
}

fn compile(pattern: &str) -> ConfigResult<Regex> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

impl DemoClassifier for PatternClassifier {
    fn classify(&self, name: &str) -> DemoClass {
        if self.restricted.is_match(name) {
            DemoClass::Restricted
        } else if self.unrestricted.is_match(name) {
            DemoClass::Unrestricted
        } else {
            DemoClass::Excluded
        }
    }
}
