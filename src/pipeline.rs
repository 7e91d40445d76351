//! Pipeline controller: runs the five phases in order, stopping at the first failure.

use crate::domain::{DemoEntry, DeviceMatrix, MatrixCell, Phase, SkipNotice};
use crate::error::Result;
use crate::services::{CommandRunner, MatrixIterator, StepExecutor, Toolchain};
use serde::Serialize;
use std::io::Write;

/// Where the pipeline currently is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    /// Not started yet
    Pending,
    /// Executing steps of a phase
    Running(Phase),
    /// Every phase completed with all steps succeeding
    Succeeded,
    /// Stopped at the first failing step; later phases never ran
    Failed { phase: Phase, step: String },
}

/// Summary of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    /// Steps executed per phase, in phase order
    pub phases: Vec<(Phase, usize)>,
    /// Devices skipped for restricted demos
    pub skipped: Vec<SkipNotice>,
}

impl PipelineReport {
    pub fn steps_in(&self, phase: Phase) -> usize {
        self.phases
            .iter()
            .find(|(p, _)| *p == phase)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn total_steps(&self) -> usize {
        self.phases.iter().map(|(_, n)| n).sum()
    }
}

/// One line of a dry-run plan
#[derive(Debug, Clone, Serialize)]
pub struct PlanEntry {
    pub phase: Phase,
    pub cell: MatrixCell,
    /// Rendered command line, absent for skip notices
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// Every cell the pipeline would visit, in execution order
pub fn plan(
    devices: &DeviceMatrix,
    demos: &[DemoEntry],
    restricted_prefix: &str,
) -> Vec<(Phase, MatrixCell)> {
    let iter = MatrixIterator::new(devices, restricted_prefix);
    Phase::ALL
        .iter()
        .flat_map(|&phase| iter.cells(phase, demos).map(move |cell| (phase, cell)))
        .collect()
}

/// Attach rendered command lines to a plan
pub fn plan_entries(cells: Vec<(Phase, MatrixCell)>, toolchain: &Toolchain) -> Vec<PlanEntry> {
    cells
        .into_iter()
        .map(|(phase, cell)| {
            let command = cell
                .as_step()
                .map(|step| toolchain.invocation(step).command_line());
            PlanEntry {
                phase,
                cell,
                command,
            }
        })
        .collect()
}

/// Plain-text rendering of a plan, one line per cell
pub fn render_plan(entries: &[PlanEntry]) -> String {
    entries
        .iter()
        .map(|entry| match (&entry.cell, &entry.command) {
            (MatrixCell::Skipped(notice), _) => format!("[{}] {}", entry.phase, notice),
            (MatrixCell::Step(_), Some(command)) => format!("[{}] {}", entry.phase, command),
            (MatrixCell::Step(step), None) => format!("[{}] {}", entry.phase, step.context()),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drives the step executor through every phase
pub struct Pipeline<R, W> {
    devices: DeviceMatrix,
    demos: Vec<DemoEntry>,
    restricted_prefix: String,
    executor: StepExecutor<R, W>,
    state: PipelineState,
}

impl<R: CommandRunner, W: Write> Pipeline<R, W> {
    pub fn new(
        devices: DeviceMatrix,
        demos: Vec<DemoEntry>,
        restricted_prefix: impl Into<String>,
        executor: StepExecutor<R, W>,
    ) -> Self {
        Self {
            devices,
            demos,
            restricted_prefix: restricted_prefix.into(),
            executor,
            state: PipelineState::Pending,
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// The cells `run` would execute, with their command lines
    pub fn plan(&self) -> Vec<PlanEntry> {
        plan_entries(
            plan(&self.devices, &self.demos, &self.restricted_prefix),
            self.executor.toolchain(),
        )
    }

    /// Run all phases. The first failing step ends the run with its error.
    pub fn run(&mut self) -> Result<PipelineReport> {
        let iter = MatrixIterator::new(&self.devices, &self.restricted_prefix);
        let mut report = PipelineReport::default();

        for phase in Phase::ALL {
            self.state = PipelineState::Running(phase);
            tracing::info!("Starting {} phase", phase);

            let mut executed = 0;
            for cell in iter.cells(phase, &self.demos) {
                match cell {
                    MatrixCell::Skipped(notice) => {
                        self.executor.notice(&notice)?;
                        report.skipped.push(notice);
                    }
                    MatrixCell::Step(step) => {
                        let context = step.context();
                        if let Err(err) = self.executor.execute(step) {
                            tracing::info!("{} phase failed at {}", phase, context);
                            self.state = PipelineState::Failed {
                                phase,
                                step: context,
                            };
                            return Err(err);
                        }
                        executed += 1;
                    }
                }
            }

            tracing::info!("Finished {} phase ({} steps)", phase, executed);
            report.phases.push((phase, executed));
        }

        self.state = PipelineState::Succeeded;
        Ok(report)
    }

    pub fn into_executor(self) -> StepExecutor<R, W> {
        self.executor
    }
}
