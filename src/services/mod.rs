//! Infrastructure services for ci-matrix.
//!
//! This module contains:
//! - ProcessRunner: Blocking process execution and output capture
//! - Toolchain: Rendering build steps into cargo invocations
//! - StepExecutor: Running steps under the fail-fast policy
//! - MatrixIterator: Expanding devices and demos into ordered steps
//! - DemoService: Demo directory discovery

mod cargo;
mod demos;
pub mod executor;
pub mod matrix;
pub mod process;

#[cfg(test)]
pub(crate) mod testing;

pub use cargo::Toolchain;
pub use demos::DemoService;
pub use executor::{fail_fast, StepExecutor};
pub use matrix::MatrixIterator;
pub use process::{CommandOutput, CommandRunner, Invocation, ProcessRunner};
