//! Unified error types for ci-matrix.

use crate::domain::Phase;
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;

/// Main application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Invocation(#[from] InvocationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Process exit code for this error.
    ///
    /// Tool failures propagate the tool's own exit code where one exists.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Invocation(InvocationError::Launch { .. }) => 127,
            Self::Invocation(InvocationError::Failure { exit_code, .. }) => {
                clamp_exit_code(*exit_code)
            }
            Self::Invocation(InvocationError::Wait { .. }) | Self::Io(_) => 1,
        }
    }

    /// Write the failure report: captured tool output, then the error line
    pub fn render(&self, out: &mut impl Write) -> std::io::Result<()> {
        if let Some(output) = self.captured_output().filter(|o| !o.trim().is_empty()) {
            writeln!(out, "--- captured output ---")?;
            write!(out, "{}", output)?;
            if !output.ends_with('\n') {
                writeln!(out)?;
            }
            writeln!(out, "-----------------------")?;
        }
        writeln!(out, "error: {}", self)
    }

    /// Captured tool output, if this error carries any
    pub fn captured_output(&self) -> Option<&str> {
        match self {
            Self::Invocation(InvocationError::Failure { output, .. }) => Some(output),
            _ => None,
        }
    }
}

fn clamp_exit_code(code: Option<i32>) -> u8 {
    match code {
        Some(c) if (1..=255).contains(&c) => c as u8,
        _ => 1,
    }
}

/// Configuration-related errors, raised before any phase runs
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Duplicate device identifier: {0}")]
    DuplicateDevice(String),

    #[error("Invalid device identifier '{0}': expected a non-empty numeric code")]
    InvalidDeviceId(String),

    #[error("Device {0} has an empty target triple")]
    EmptyTarget(String),

    #[error("Invalid demo pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Cannot read demo directory {path}: {source}")]
    DemoDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from running an external build-tool invocation
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{phase} failed: {context} (exit code {})", display_code(.exit_code))]
    Failure {
        phase: Phase,
        context: String,
        exit_code: Option<i32>,
        output: String,
    },
}

fn display_code(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "none".to_string())
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for configuration loading and validation
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BuildStep, DemoClass, DemoEntry, DeviceEntry};

    fn failure(exit_code: Option<i32>) -> AppError {
        AppError::Invocation(InvocationError::Failure {
            phase: Phase::DeviceCheck,
            context: "device 52840".to_string(),
            exit_code,
            output: "error[E0425]".to_string(),
        })
    }

    #[test]
    fn test_failure_propagates_tool_exit_code() {
        assert_eq!(failure(Some(101)).exit_code(), 101);
        assert_eq!(failure(None).exit_code(), 1);
        assert_eq!(failure(Some(300)).exit_code(), 1);
    }

    #[test]
    fn test_launch_and_config_exit_codes() {
        let launch = AppError::Invocation(InvocationError::Launch {
            program: "cargo".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
        assert_eq!(launch.exit_code(), 127);

        let config = AppError::from(ConfigError::DuplicateDevice("52840".to_string()));
        assert_eq!(config.exit_code(), 2);

        let wait = AppError::Invocation(InvocationError::Wait {
            program: "cargo".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::Interrupted),
        });
        assert_eq!(wait.exit_code(), 1);
        assert!(wait.to_string().starts_with("Failed waiting for cargo"));
    }

    fn rendered(err: &AppError) -> String {
        let mut out = Vec::new();
        err.render(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_render_prints_output_before_context() {
        let demo = DemoEntry::new(PathBuf::from("demos/nrf52-beacon"), DemoClass::Restricted);
        let device = DeviceEntry::new("52840", "thumbv7em-none-eabihf");
        let step = BuildStep::demo_build(&demo, &device, false);

        let err = AppError::Invocation(InvocationError::Failure {
            phase: step.phase,
            context: step.context(),
            exit_code: Some(101),
            output: "error[E0425]: cannot find value\nerror: aborting".to_string(),
        });

        insta::assert_snapshot!(rendered(&err), @r"
        --- captured output ---
        error[E0425]: cannot find value
        error: aborting
        -----------------------
        error: demo build failed: demo nrf52-beacon, device 52840 (thumbv7em-none-eabihf), features [52840], no default features (exit code 101)
        ");
    }

    #[test]
    fn test_render_without_output_is_error_line_only() {
        let mut err = failure(Some(2));
        if let AppError::Invocation(InvocationError::Failure { output, .. }) = &mut err {
            *output = "  \n".to_string();
        }
        assert_eq!(
            rendered(&err),
            "error: device check failed: device 52840 (exit code 2)\n"
        );

        let config = AppError::from(ConfigError::DuplicateDevice("52840".to_string()));
        assert_eq!(
            rendered(&config),
            "error: Configuration error: Duplicate device identifier: 52840\n"
        );
    }

    #[test]
    fn test_failure_message_names_phase_and_context() {
        let err = failure(Some(101));
        assert_eq!(
            err.to_string(),
            "device check failed: device 52840 (exit code 101)"
        );
        assert_eq!(err.captured_output(), Some("error[E0425]"));
    }
}
