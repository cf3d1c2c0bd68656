use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use terraform_plugin::PluginError;
use terraform_plugin::executor::{CommandExecutor, CommandSpec, ExecutionResult};

/// Records every executed command, optionally failing on the Nth call.
#[derive(Default)]
pub struct RecordingExecutor {
    calls: Arc<Mutex<Vec<CommandSpec>>>,
    call_count: AtomicUsize,
    /// 1-indexed call that returns an error.
    fail_on_call: Option<usize>,
    /// 1-indexed call that exits with the given code.
    exit_on_call: Option<(usize, i32)>,
    /// Stdout handed back for commands that request capture.
    captured_stdout: Option<String>,
    /// Command reported as missing from PATH.
    missing_command: Option<String>,
}

#[allow(dead_code)]
impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::default()
        }
    }

    pub fn exiting_on(call: usize, code: i32) -> Self {
        Self {
            exit_on_call: Some((call, code)),
            ..Self::default()
        }
    }

    pub fn with_stdout(stdout: impl Into<String>) -> Self {
        Self {
            captured_stdout: Some(stdout.into()),
            ..Self::default()
        }
    }

    pub fn missing(command: impl Into<String>) -> Self {
        Self {
            missing_command: Some(command.into()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Command lines as `command arg1 arg2 ...`, ignoring redaction.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|spec| {
                std::iter::once(spec.command.clone())
                    .chain(spec.args.iter().cloned())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect()
    }
}

impl CommandExecutor for RecordingExecutor {
    fn execute(&self, spec: &CommandSpec) -> anyhow::Result<ExecutionResult> {
        let current = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls.lock().unwrap().push(spec.clone());

        if self.missing_command.as_deref() == Some(spec.command.as_str()) {
            return Err(PluginError::CommandNotFound {
                command: spec.command.clone(),
            }
            .into());
        }

        if self.fail_on_call == Some(current) {
            anyhow::bail!("simulated failure on call {}", current);
        }

        if let Some((call, code)) = self.exit_on_call {
            if call == current {
                use std::os::unix::process::ExitStatusExt;
                return Ok(ExecutionResult {
                    status: Some(std::process::ExitStatus::from_raw(code << 8)),
                    stdout: None,
                });
            }
        }

        let stdout = if spec.capture_stdout {
            self.captured_stdout.clone()
        } else {
            None
        };
        Ok(ExecutionResult {
            status: None,
            stdout,
        })
    }
}
