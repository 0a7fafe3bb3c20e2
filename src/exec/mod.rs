//! Policy-gated command execution.
//!
//! Every command, whether it belongs to a definition's pipeline, an alert,
//! or a bootstrap producer, is checked by the [`PolicyGate`] and then run
//! through the configured [`Shell`]. Stdout is captured per child process;
//! stderr is collected separately and only logged.

pub mod shell;

pub use shell::Shell;

use crate::policy::{GateDecision, PolicyGate};

/// Result of running one command or a whole pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Every command exited zero; holds the last command's stdout.
    Completed(String),
    /// The gate refused `command`; nothing after it ran.
    Denied {
        command: String,
        decision: GateDecision,
    },
    /// `command` could not be spawned or exited non-zero.
    Failed { command: String, reason: String },
}

impl PipelineOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, PipelineOutcome::Completed(_))
    }

    pub fn output(&self) -> Option<&str> {
        match self {
            PipelineOutcome::Completed(out) => Some(out),
            _ => None,
        }
    }
}

/// Runs gated commands through a shell. Shared read-only across threads.
#[derive(Debug, Clone)]
pub struct Executor {
    gate: PolicyGate,
    shell: Shell,
}

impl Executor {
    pub fn new(gate: PolicyGate, shell: Shell) -> Self {
        Self { gate, shell }
    }

    pub fn gate(&self) -> &PolicyGate {
        &self.gate
    }

    /// Gate and run a single command, capturing its stdout.
    pub fn run(&self, command: &str) -> PipelineOutcome {
        let decision = self.gate.check(command);
        if !decision.is_permitted() {
            log::warn!("{}: {}: {command}", decision.label(), decision.reason());
            return PipelineOutcome::Denied {
                command: command.to_string(),
                decision,
            };
        }

        log::debug!("command: {command}");
        let output = match self.shell.command(command).output() {
            Ok(o) => o,
            Err(e) => {
                log::error!("cannot spawn {}: {command}: {e}", self.shell.program());
                return PipelineOutcome::Failed {
                    command: command.to_string(),
                    reason: format!("spawn failed: {e}"),
                };
            }
        };

        if !output.stderr.is_empty() {
            log::warn!(
                "stderr from {command}: {}",
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
        }
        if !output.status.success() {
            log::error!("command failed: {command}: {}", output.status);
            return PipelineOutcome::Failed {
                command: command.to_string(),
                reason: output.status.to_string(),
            };
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        log::debug!("{stdout}");
        PipelineOutcome::Completed(stdout)
    }

    /// Run `commands` in order, stopping at the first denial or failure.
    ///
    /// Only the last command's stdout is kept; earlier commands run for their
    /// side effects.
    pub fn run_pipeline<S: AsRef<str>>(&self, commands: &[S]) -> PipelineOutcome {
        let Some((last, init)) = commands.split_last() else {
            return PipelineOutcome::Failed {
                command: String::new(),
                reason: "empty pipeline".into(),
            };
        };
        for command in init {
            let outcome = self.run(command.as_ref());
            if !outcome.is_ok() {
                return outcome;
            }
        }
        self.run(last.as_ref())
    }
}
