//! Real command executor implementation.
//!
//! This module provides [`RealCommandExecutor`], which runs commands with
//! `std::process::Command`, streams their output to the log and kills them
//! when the invocation is cancelled.

use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use which::which;

use super::pipe::{StreamType, panic_message, spawn_reader};
use super::{CommandExecutor, CommandSpec, ExecutionResult};
use crate::cancel::CancellationToken;
use crate::error::RsdetectError;
use crate::remote::POLL_INTERVAL;

/// Kills a child process and joins its reader threads.
///
/// Called from cancellation and error paths so no process or thread outlives
/// [`RealCommandExecutor::execute()`].
fn cleanup_child_process<I>(child: &mut Child, handles: I)
where
    I: IntoIterator<Item = JoinHandle<()>>,
{
    let pid = child.id();
    if let Err(e) = child.kill() {
        tracing::debug!(pid = pid, "kill returned error (process may have already exited): {}", e);
    }
    if let Err(e) = child.wait() {
        tracing::warn!(pid = pid, "failed to wait for child process after kill: {}", e);
    }
    for handle in handles {
        if let Err(e) = handle.join() {
            tracing::warn!("reader thread panicked during cleanup: {}", panic_message(&*e));
        }
    }
}

fn execution_error(spec: &CommandSpec, status: String) -> anyhow::Error {
    RsdetectError::Execution {
        command: spec.command.clone(),
        status,
    }
    .into()
}

/// Polls the child until it exits or `cancel` is set.
///
/// Returns `Ok(None)` on cancellation.
fn wait_or_cancel(
    child: &mut Child,
    cancel: &CancellationToken,
) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if cancel.is_cancelled() {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Command executor that runs actual system commands.
///
/// When `dry_run` is true, commands are logged but not executed,
/// and `execute()` returns `Ok(ExecutionResult { status: None })`.
pub struct RealCommandExecutor {
    pub dry_run: bool,
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, spec: &CommandSpec, cancel: &CancellationToken) -> Result<ExecutionResult> {
        if self.dry_run {
            tracing::info!(
                "dry run: not starting {} with {} arguments",
                spec.command,
                spec.args.len()
            );
            return Ok(ExecutionResult { status: None });
        }

        if cancel.is_cancelled() {
            return Err(RsdetectError::Cancelled.into());
        }

        let cmd =
            which(&spec.command).with_context(|| format!("command not found: {}", spec.command))?;
        tracing::trace!("command found: {}: {}", spec.command, cmd.to_string_lossy());

        let mut command = Command::new(cmd);
        command.args(&spec.args);

        if let Some(ref cwd) = spec.cwd {
            command.current_dir(cwd);
        }

        if spec.clear_env {
            command.env_clear();
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn command `{}`", spec.command))?;

        tracing::trace!("spawned command: {}: pid={}", spec.command, child.id());

        let stdout_handle = match spawn_reader(child.stdout.take(), StreamType::Stdout) {
            Ok(handle) => handle,
            Err(e) => {
                cleanup_child_process(&mut child, []);
                let status = format!("failed to spawn stdout reader thread: {}", e);
                return Err(execution_error(spec, status));
            }
        };

        let stderr_handle = match spawn_reader(child.stderr.take(), StreamType::Stderr) {
            Ok(handle) => handle,
            Err(e) => {
                cleanup_child_process(&mut child, [stdout_handle]);
                let status = format!("failed to spawn stderr reader thread: {}", e);
                return Err(execution_error(spec, status));
            }
        };

        let status = match wait_or_cancel(&mut child, cancel) {
            Ok(Some(status)) => status,
            Ok(None) => {
                tracing::warn!(pid = child.id(), "invocation cancelled, killing {}", spec.command);
                cleanup_child_process(&mut child, [stdout_handle, stderr_handle]);
                return Err(RsdetectError::Cancelled.into());
            }
            Err(e) => {
                cleanup_child_process(&mut child, [stdout_handle, stderr_handle]);
                return Err(execution_error(spec, format!("failed to wait for command: {}", e)));
            }
        };

        let mut panicked_streams = Vec::new();
        for (name, handle) in [("stdout", stdout_handle), ("stderr", stderr_handle)] {
            if let Err(e) = handle.join() {
                let msg = panic_message(&*e);
                tracing::error!(stream = name, panic = msg, "reader thread panicked");
                panicked_streams.push(format!("{}: {}", name, msg));
            }
        }

        if !panicked_streams.is_empty() {
            return Err(execution_error(
                spec,
                format!(
                    "reader thread(s) panicked during command execution: {}",
                    panicked_streams.join(", ")
                ),
            ));
        }

        tracing::trace!("executed command: {}: success={}", spec.command, status.success());

        Ok(ExecutionResult {
            status: Some(status),
        })
    }
}
