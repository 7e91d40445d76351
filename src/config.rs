//! Configuration management for ci-matrix.
//!
//! Supports layered configuration: defaults → user → project → explicit file → env

use crate::domain::{DeviceEntry, DeviceMatrix, PatternClassifier};
use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the project-level configuration file
pub const PROJECT_CONFIG_FILE: &str = ".ci-matrix.toml";

/// Environment variable carrying extra compiler flags for build invocations
pub const STRICTNESS_ENV: &str = "RUSTFLAGS";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiConfig {
    #[serde(default = "default_devices")]
    pub devices: Vec<DeviceEntry>,
    #[serde(default)]
    pub packages: PackagesConfig,
    #[serde(default)]
    pub demos: DemosConfig,
    #[serde(default)]
    pub tool: ToolConfig,
    #[serde(default)]
    pub strictness: StrictnessConfig,
}

impl Default for CiConfig {
    fn default() -> Self {
        Self {
            devices: default_devices(),
            packages: PackagesConfig::default(),
            demos: DemosConfig::default(),
            tool: ToolConfig::default(),
            strictness: StrictnessConfig::default(),
        }
    }
}

impl CiConfig {
    /// Load configuration with hierarchy: defaults → user → project → explicit → env
    pub fn load(project_root: Option<&Path>, explicit: Option<&Path>) -> ConfigResult<Self> {
        use config::{Config, Environment, File};

        let mut builder = Config::builder();

        // 1. Start with defaults
        builder = builder.add_source(
            File::from_str(
                include_str!("../default_config.toml"),
                config::FileFormat::Toml,
            )
            .required(false),
        );

        // 2. User config (~/.config/ci-matrix/config.toml)
        if let Some(config_dir) = directories::ProjectDirs::from("com", "ci-matrix", "ci-matrix") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                builder = builder.add_source(File::from(user_config).required(false));
            }
        }

        // 3. Project-specific config (.ci-matrix.toml in workspace root)
        if let Some(root) = project_root {
            let project_config = root.join(PROJECT_CONFIG_FILE);
            if project_config.exists() {
                builder = builder.add_source(File::from(project_config).required(false));
            }
        }

        // 4. Explicit --config file
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }

        // 5. Environment variables (CI_MATRIX__*)
        builder = builder.add_source(
            Environment::with_prefix("CI_MATRIX")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validated, ordered device matrix
    pub fn device_matrix(&self) -> ConfigResult<DeviceMatrix> {
        DeviceMatrix::new(self.devices.clone())
    }

    /// Classifier built from the configured demo patterns
    pub fn classifier(&self) -> ConfigResult<PatternClassifier> {
        PatternClassifier::new(
            &self.demos.unrestricted_pattern,
            &self.demos.restricted_pattern,
        )
    }

    /// Check everything that can be checked before any phase runs
    pub fn validate(&self) -> ConfigResult<()> {
        self.device_matrix()?;
        self.classifier()?;
        if self.tool.program.trim().is_empty() {
            return Err(ConfigError::Invalid("tool.program must not be empty".into()));
        }
        if self.demos.restricted_prefix.is_empty() {
            return Err(ConfigError::Invalid(
                "demos.restricted_prefix must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn default_devices() -> Vec<DeviceEntry> {
    vec![
        DeviceEntry::new("52810", "thumbv7em-none-eabi"),
        DeviceEntry::new("52811", "thumbv7em-none-eabi"),
        DeviceEntry::new("52832", "thumbv7em-none-eabihf"),
        DeviceEntry::new("52833", "thumbv7em-none-eabihf"),
        DeviceEntry::new("52840", "thumbv7em-none-eabihf"),
    ]
}

/// Crates exercised by the standalone phases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagesConfig {
    /// Directory of the crate whose unit tests run first (relative to root)
    #[serde(default = "default_unit_test")]
    pub unit_test: PathBuf,
    /// Directory of the device-support crate checked once per device
    #[serde(default = "default_device_crate")]
    pub device_crate: PathBuf,
    /// Packages passed to the documentation generator
    #[serde(default = "default_docs")]
    pub docs: Vec<String>,
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            unit_test: default_unit_test(),
            device_crate: default_device_crate(),
            docs: default_docs(),
        }
    }
}

fn default_unit_test() -> PathBuf {
    PathBuf::from("rubble")
}

fn default_device_crate() -> PathBuf {
    PathBuf::from("rubble-nrf5x")
}

fn default_docs() -> Vec<String> {
    vec!["rubble".to_string(), "rubble-nrf5x".to_string()]
}

/// Demo discovery and classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemosConfig {
    /// Directory containing demo crates (relative to root)
    #[serde(default = "default_demos_directory")]
    pub directory: PathBuf,
    /// Demos built for every device
    #[serde(default = "default_unrestricted_pattern")]
    pub unrestricted_pattern: String,
    /// Demos built only for the restricted device family
    #[serde(default = "default_restricted_pattern")]
    pub restricted_pattern: String,
    /// Device id prefix of the restricted family
    #[serde(default = "default_restricted_prefix")]
    pub restricted_prefix: String,
}

impl Default for DemosConfig {
    fn default() -> Self {
        Self {
            directory: default_demos_directory(),
            unrestricted_pattern: default_unrestricted_pattern(),
            restricted_pattern: default_restricted_pattern(),
            restricted_prefix: default_restricted_prefix(),
        }
    }
}

fn default_demos_directory() -> PathBuf {
    PathBuf::from("demos")
}

fn default_unrestricted_pattern() -> String {
    "^nrf5x-".to_string()
}

fn default_restricted_pattern() -> String {
    "^nrf52-".to_string()
}

fn default_restricted_prefix() -> String {
    "52".to_string()
}

/// External build tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    #[serde(default = "default_program")]
    pub program: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
        }
    }
}

fn default_program() -> String {
    "cargo".to_string()
}

/// Extra strictness flags for test/check/build invocations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrictnessConfig {
    #[serde(default = "default_rustflags")]
    pub rustflags: String,
}

impl Default for StrictnessConfig {
    fn default() -> Self {
        Self {
            rustflags: default_rustflags(),
        }
    }
}

impl StrictnessConfig {
    /// Resolve the effective flags: the environment wins when present
    pub fn resolve(&self, from_env: Option<String>) -> String {
        from_env.unwrap_or_else(|| self.rustflags.clone())
    }

    /// Resolve against the process environment
    pub fn resolve_from_env(&self) -> String {
        self.resolve(std::env::var(STRICTNESS_ENV).ok())
    }
}

fn default_rustflags() -> String {
    "--deny warnings".to_string()
}
