//! Test doubles for the command runner.

use super::process::{CommandOutput, CommandRunner, Invocation};
use crate::error::InvocationError;
use std::cell::RefCell;

#[derive(Debug, Clone)]
enum FailureRule {
    Never,
    /// Fail the k-th invocation (1-based)
    At(usize),
    /// Fail the first invocation whose command line contains the text
    Matching(String),
    /// Refuse to launch the k-th invocation
    LaunchAt(usize),
}

/// Records every invocation and fails according to a rule
#[derive(Debug)]
pub struct RecordingRunner {
    rule: FailureRule,
    calls: RefCell<Vec<Invocation>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::with_rule(FailureRule::Never)
    }

    pub fn failing_at(k: usize) -> Self {
        Self::with_rule(FailureRule::At(k))
    }

    pub fn failing_on(pattern: &str) -> Self {
        Self::with_rule(FailureRule::Matching(pattern.to_string()))
    }

    pub fn launch_error_at(k: usize) -> Self {
        Self::with_rule(FailureRule::LaunchAt(k))
    }

    fn with_rule(rule: FailureRule) -> Self {
        Self {
            rule,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(Invocation::command_line).collect()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, InvocationError> {
        let mut calls = self.calls.borrow_mut();
        calls.push(invocation.clone());
        let n = calls.len();

        let fails = match &self.rule {
            FailureRule::Never => false,
            FailureRule::At(k) => n == *k,
            FailureRule::Matching(pattern) => invocation.command_line().contains(pattern.as_str()),
            FailureRule::LaunchAt(k) if n == *k => {
                return Err(InvocationError::Launch {
                    program: invocation.program.clone(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            FailureRule::LaunchAt(_) => false,
        };

        if fails {
            Ok(CommandOutput {
                success: false,
                exit_code: Some(101),
                output: format!("simulated failure of `{}`\n", invocation.command_line()),
            })
        } else {
            Ok(CommandOutput {
                success: true,
                exit_code: Some(0),
                output: String::new(),
            })
        }
    }
}
