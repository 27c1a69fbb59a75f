//! External command execution.
//!
//! Every collaborator of the pipeline (git, the conda build tool, the
//! anaconda upload tool) is a blocking external process. Commands are run
//! through this module so they are logged uniformly and failures carry the
//! rendered command line and captured stderr.

use crate::error::{CliError, CommandFailure};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Render a command line for logs and error messages
fn render(program: &str, args: &[&str]) -> String {
    let mut line = String::from(program);
    for arg in args {
        line.push(' ');
        if arg.contains(' ') {
            line.push('\'');
            line.push_str(arg);
            line.push('\'');
        } else {
            line.push_str(arg);
        }
    }
    line
}

/// Run a command, streaming its output to the terminal.
///
/// Used for long external operations (clone, conda build) whose progress
/// the user wants to see. Fails if the command cannot be spawned or exits
/// non-zero.
pub async fn run(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
) -> std::result::Result<(), CommandFailure> {
    let command = render(program, args);
    log::debug!("running: {command}");

    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let status = cmd.status().await.map_err(|e| CommandFailure {
        command: command.clone(),
        reason: format!("failed to spawn: {e}"),
    })?;

    if status.success() {
        Ok(())
    } else {
        Err(CommandFailure {
            command,
            reason: format!("exited with {status}"),
        })
    }
}

/// Run a command and capture its stdout.
///
/// Stderr is captured separately and folded into the failure reason when
/// the command exits non-zero, so callers can inspect tool diagnostics
/// (e.g. "already exists" from the upload tool).
pub async fn output(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
) -> std::result::Result<String, CommandFailure> {
    output_env(program, args, cwd, &[]).await
}

/// Like [`output`], with extra environment variables for the child.
///
/// Credentials go through the environment rather than argv so the logged
/// command line never contains them.
pub async fn output_env(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    envs: &[(&str, &str)],
) -> std::result::Result<String, CommandFailure> {
    let command = render(program, args);
    log::debug!("running: {command}");

    let mut cmd = Command::new(program);
    cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    for (key, value) in envs {
        cmd.env(key, value);
    }

    let out = cmd.output().await.map_err(|e| CommandFailure {
        command: command.clone(),
        reason: format!("failed to spawn: {e}"),
    })?;

    if out.status.success() {
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    } else {
        let stderr = String::from_utf8_lossy(&out.stderr);
        Err(CommandFailure {
            command,
            reason: format!("exited with {}: {}", out.status, stderr.trim()),
        })
    }
}

/// Verify that every required external command is on PATH.
///
/// Checked once per CLI invocation before any work starts, so a missing
/// tool fails fast instead of halfway through a multi-package run.
pub fn ensure_commands(commands: &[&str]) -> std::result::Result<(), CliError> {
    for command in commands {
        if which::which(command).is_err() {
            return Err(CliError::MissingCommand {
                command: (*command).to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_command_line_with_quoting() {
        assert_eq!(render("git", &["fetch", "origin"]), "git fetch origin");
        assert_eq!(
            render("anaconda", &["upload", "a file.tar.bz2"]),
            "anaconda upload 'a file.tar.bz2'"
        );
    }

    #[test]
    fn missing_command_is_reported_by_name() {
        let err = ensure_commands(&["pslpkg-no-such-tool-xyz"]).unwrap_err();
        assert!(err.to_string().contains("pslpkg-no-such-tool-xyz"));
    }
}
