//! Step execution under the fail-fast policy.

use super::cargo::Toolchain;
use super::process::CommandRunner;
use crate::domain::{BuildStep, SkipNotice, StepOutcome};
use crate::error::{InvocationError, Result};
use std::io::Write;

/// Turn a failed outcome into an error; successful outcomes pass through.
///
/// Applied after every step, so the first failure stops the run.
pub fn fail_fast(outcome: StepOutcome) -> std::result::Result<StepOutcome, InvocationError> {
    if outcome.success {
        return Ok(outcome);
    }

    Err(InvocationError::Failure {
        phase: outcome.step.phase,
        context: outcome.step.context(),
        exit_code: outcome.exit_code,
        output: outcome.output,
    })
}

/// Runs build steps one at a time, printing progress to `out`
pub struct StepExecutor<R, W> {
    runner: R,
    toolchain: Toolchain,
    out: W,
}

impl<R: CommandRunner, W: Write> StepExecutor<R, W> {
    pub fn new(runner: R, toolchain: Toolchain, out: W) -> Self {
        Self {
            runner,
            toolchain,
            out,
        }
    }

    /// Execute one step. A failing step is returned as an error and
    /// nothing else should run afterwards.
    pub fn execute(&mut self, step: BuildStep) -> Result<StepOutcome> {
        writeln!(self.out, "{}", self.toolchain.describe(&step))?;
        self.out.flush()?;

        let invocation = self.toolchain.invocation(&step);
        let result = self.runner.run(&invocation)?;

        let outcome = StepOutcome {
            step,
            success: result.success,
            output: result.output,
            exit_code: result.exit_code,
        };

        Ok(fail_fast(outcome)?)
    }

    /// Report a device skipped for a restricted demo
    pub fn notice(&mut self, notice: &SkipNotice) -> Result<()> {
        tracing::info!("{}", notice);
        writeln!(self.out, "{}", notice)?;
        Ok(())
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub fn into_parts(self) -> (R, W) {
        (self.runner, self.out)
    }
}
