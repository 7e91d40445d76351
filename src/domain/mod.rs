//! Domain entities for ci-matrix.
//!
//! This module contains the core entities:
//! - DeviceMatrix: Ordered hardware variants and their target triples
//! - DemoEntry: A demo application and its device restriction
//! - BuildStep: One concrete build-tool invocation in a phase
//! - Workspace: The repository being verified

mod demo;
mod device;
mod step;
mod workspace;

pub use demo::{DemoClass, DemoClassifier, DemoEntry, PatternClassifier};
pub use device::{DeviceEntry, DeviceMatrix};
pub use step::{BuildStep, FeatureSet, MatrixCell, Phase, SkipNotice, StepOutcome};
pub use workspace::Workspace;
