//! ci-matrix: fail-fast build and test matrix runner
//!
//! This crate runs a fixed sequence of build-tool invocations over a
//! device × demo matrix for a multi-crate embedded workspace, stopping the
//! whole run at the first failing step.

pub mod config;
pub mod domain;
pub mod error;
pub mod pipeline;
pub mod services;

pub use config::CiConfig;
pub use error::{AppError, Result};
pub use pipeline::{Pipeline, PipelineReport, PipelineState};
