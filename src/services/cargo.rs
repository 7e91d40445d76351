//! Renders build steps into concrete build-tool invocations.

use super::process::Invocation;
use crate::config::STRICTNESS_ENV;
use crate::domain::{BuildStep, Phase, Workspace};
use std::path::{Path, PathBuf};

/// Knows how to turn a [`BuildStep`] into a `cargo` command line
#[derive(Debug, Clone)]
pub struct Toolchain {
    program: String,
    rustflags: String,
    root: PathBuf,
    unit_test_dir: PathBuf,
    device_crate_dir: PathBuf,
    doc_packages: Vec<String>,
}

impl Toolchain {
    /// Build a toolchain for `workspace` with already-resolved strictness flags
    pub fn new(workspace: &Workspace, rustflags: impl Into<String>) -> Self {
        Self {
            program: workspace.config.tool.program.clone(),
            rustflags: rustflags.into(),
            root: workspace.root_path.clone(),
            unit_test_dir: workspace.unit_test_directory.clone(),
            device_crate_dir: workspace.device_crate_directory.clone(),
            doc_packages: workspace.config.packages.docs.clone(),
        }
    }

    pub fn rustflags(&self) -> &str {
        &self.rustflags
    }

    /// Render the invocation for one step
    pub fn invocation(&self, step: &BuildStep) -> Invocation {
        match step.phase {
            Phase::UnitTest => self.test(),
            Phase::DeviceCheck => self.check(step),
            Phase::DemoBuild => self.build(step),
            Phase::FormatCheck => self.format_check(),
            Phase::DocBuild => self.doc_build(),
        }
    }

    /// Human-readable progress line printed before `step` runs
    pub fn describe(&self, step: &BuildStep) -> String {
        match (step.phase, &step.device) {
            (Phase::UnitTest, _) => {
                format!("Running unit tests for {}...", dir_name(&self.unit_test_dir))
            }
            (Phase::DeviceCheck, Some(device)) => format!(
                "Checking {} for device {} ({})...",
                dir_name(&self.device_crate_dir),
                device.id,
                device.target
            ),
            (Phase::DemoBuild, Some(device)) => {
                let demo = step.demo.as_ref().map(|d| d.name.as_str()).unwrap_or("workspace");
                let mode = if step.default_features {
                    ""
                } else {
                    " without default features"
                };
                format!(
                    "Building {} for device {}, target {}{}...",
                    demo, device.id, device.target, mode
                )
            }
            (Phase::FormatCheck, _) => "Checking formatting...".to_string(),
            (Phase::DocBuild, _) => {
                format!("Building documentation for {}...", self.doc_packages.join(", "))
            }
            (phase, None) => format!("Running {}...", phase),
        }
    }

    fn strict(&self, invocation: Invocation) -> Invocation {
        if self.rustflags.is_empty() {
            invocation
        } else {
            invocation.env(STRICTNESS_ENV, self.rustflags.clone())
        }
    }

    fn test(&self) -> Invocation {
        self.strict(
            Invocation::new(&self.program, &self.unit_test_dir)
                .arg("test")
                .label("test"),
        )
    }

    fn check(&self, step: &BuildStep) -> Invocation {
        let mut invocation = Invocation::new(&self.program, &self.device_crate_dir).arg("check");
        if !step.features.is_empty() {
            invocation = invocation.args(["--features".to_string(), step.features.to_arg()]);
        }
        if let Some(device) = &step.device {
            invocation = invocation.args(["--target", device.target.as_str()]);
        }
        self.strict(invocation.label(format!("check-{}", step.features.to_arg())))
    }

    fn build(&self, step: &BuildStep) -> Invocation {
        let dir = step
            .demo
            .as_ref()
            .map(|demo| self.root.join(&demo.path))
            .unwrap_or_else(|| self.root.clone());

        let mut invocation = Invocation::new(&self.program, dir).arg("build");
        if let Some(device) = &step.device {
            invocation = invocation.args(["--target", device.target.as_str()]);
        }
        if !step.default_features {
            invocation = invocation.arg("--no-default-features");
        }
        if !step.features.is_empty() {
            invocation = invocation.args(["--features".to_string(), step.features.to_arg()]);
        }

        let demo = step.demo.as_ref().map(|d| d.name.as_str()).unwrap_or("root");
        let mode = if step.default_features { "default" } else { "no-default" };
        self.strict(invocation.label(format!(
            "build-{}-{}-{}",
            demo,
            step.features.to_arg(),
            mode
        )))
    }

    fn format_check(&self) -> Invocation {
        Invocation::new(&self.program, &self.root)
            .args(["fmt", "--all", "--", "--check"])
            .label("fmt")
    }

    fn doc_build(&self) -> Invocation {
        let mut invocation = Invocation::new(&self.program, &self.root).arg("doc");
        for package in &self.doc_packages {
            invocation = invocation.args(["-p", package.as_str()]);
        }
        invocation.label("doc")
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
