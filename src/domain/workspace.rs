//! Workspace entity representing the repository being verified.

use crate::config::{CiConfig, PROJECT_CONFIG_FILE};
use std::path::{Path, PathBuf};

/// The multi-crate repository the pipeline runs against
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Repository root path
    pub root_path: PathBuf,
    /// Directory of the unit-tested crate (absolute path)
    pub unit_test_directory: PathBuf,
    /// Directory of the device-support crate (absolute path)
    pub device_crate_directory: PathBuf,
    /// Directory containing demo crates (absolute path)
    pub demos_directory: PathBuf,
    /// Loaded configuration
    pub config: CiConfig,
}

impl Workspace {
    /// Create a new Workspace from a root path and configuration
    pub fn new(root_path: PathBuf, config: CiConfig) -> Self {
        let unit_test_directory = root_path.join(&config.packages.unit_test);
        let device_crate_directory = root_path.join(&config.packages.device_crate);
        let demos_directory = root_path.join(&config.demos.directory);

        Self {
            root_path,
            unit_test_directory,
            device_crate_directory,
            demos_directory,
            config,
        }
    }

    /// Discover the workspace root by walking up from `start_path`.
    ///
    /// The first directory holding a project config file or a `.git` entry wins.
    pub fn discover(start_path: Option<PathBuf>) -> Option<PathBuf> {
        let start = start_path
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        let mut current = start.as_path();
        loop {
            if is_root_marker(current) {
                return Some(current.to_path_buf());
            }

            match current.parent() {
                Some(parent) => current = parent,
                None => return None,
            }
        }
    }

    /// Check if the demos directory exists
    pub fn has_demos_directory(&self) -> bool {
        self.demos_directory.is_dir()
    }
}

fn is_root_marker(dir: &Path) -> bool {
    dir.join(PROJECT_CONFIG_FILE).exists() || dir.join(".git").exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_workspace_new() {
        let config = CiConfig::default();
        let workspace = Workspace::new(PathBuf::from("/tmp/rubble"), config);

        assert_eq!(workspace.root_path, PathBuf::from("/tmp/rubble"));
        assert_eq!(
            workspace.unit_test_directory,
            PathBuf::from("/tmp/rubble/rubble")
        );
        assert_eq!(
            workspace.device_crate_directory,
            PathBuf::from("/tmp/rubble/rubble-nrf5x")
        );
        assert_eq!(workspace.demos_directory, PathBuf::from("/tmp/rubble/demos"));
    }

    #[test]
    fn test_discover_walks_up_to_marker() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(PROJECT_CONFIG_FILE), "").unwrap();
        let nested = temp.path().join("demos").join("nrf52-beacon");
        std::fs::create_dir_all(&nested).unwrap();

        let root = Workspace::discover(Some(nested)).unwrap();
        assert_eq!(root, temp.path());
    }

    #[test]
    fn test_has_demos_directory() {
        let temp = TempDir::new().unwrap();
        let workspace = Workspace::new(temp.path().to_path_buf(), CiConfig::default());
        assert!(!workspace.has_demos_directory());

        std::fs::create_dir(temp.path().join("demos")).unwrap();
        assert!(workspace.has_demos_directory());
    }
}
