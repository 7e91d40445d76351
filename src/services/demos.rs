//! Demo service for discovering demo application directories.

use crate::domain::{DemoClass, DemoClassifier, DemoEntry};
use crate::error::{ConfigError, ConfigResult};
use std::fs;
use std::path::PathBuf;

/// Service for demo discovery
pub struct DemoService {
    root: PathBuf,
    demos_directory: PathBuf,
}

impl DemoService {
    /// Create a new DemoService. `demos_directory` is relative to `root`.
    pub fn new(root: PathBuf, demos_directory: PathBuf) -> Self {
        Self {
            root,
            demos_directory,
        }
    }

    /// Discover and classify all demo directories, sorted by name.
    ///
    /// A missing demos directory yields no demos. Directories the classifier
    /// excludes are dropped here, so later phases never see them.
    pub fn discover_demos(&self, classifier: &dyn DemoClassifier) -> ConfigResult<Vec<DemoEntry>> {
        let dir = self.root.join(&self.demos_directory);
        if !dir.exists() {
            tracing::debug!("No demo directory at {}", dir.display());
            return Ok(Vec::new());
        }

        let read_err = |source| ConfigError::DemoDirectory {
            path: dir.clone(),
            source,
        };

        let mut demos = Vec::new();
        for entry in fs::read_dir(&dir).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            let path = entry.path();

            if !path.is_dir() {
                continue;
            }

            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    tracing::warn!(
                        "Ignoring demo directory {} (name is not valid UTF-8)",
                        raw.to_string_lossy()
                    );
                    continue;
                }
            };

            match classifier.classify(&name) {
                DemoClass::Excluded => {
                    tracing::warn!("Ignoring demo directory {} (matches no demo pattern)", name);
                }
                class => demos.push(DemoEntry::new(self.demos_directory.join(&name), class)),
            }
        }

        demos.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(demos)
    }
}
