//! Shell command execution.
//!
//! Every external command (node, nvm, npm, lsof, the gitbook binary) is run
//! through `bash -c` so the runtime wrapper from [`crate::runtime`] can source
//! shell scripts before the command itself.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

/// Shell used for all commands.
pub const SHELL: &str = "/bin/bash";

/// Errors from running shell commands.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Failed to start `{cmd}`: {source}")]
    Spawn {
        cmd: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{cmd}` exited with {}", describe_exit(.code))]
    Failed { cmd: String, code: Option<i32> },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

/// Where a command's output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Collect stdout and stderr into [`ShellOutput::output`]
    Capture,
    /// Share the terminal with the child
    Inherit,
}

/// Result of a finished shell command.
#[derive(Debug, Clone)]
pub struct ShellOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    /// Combined output (stdout followed by stderr); empty in inherit mode
    pub output: String,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Build a `bash -c <cmd>` command.
pub fn shell_command(cmd: &str) -> Command {
    let mut command = Command::new(SHELL);
    command.arg("-c").arg(cmd);
    command
}

/// Run a command to completion.
pub async fn run(
    cmd: &str,
    cwd: Option<&Path>,
    mode: OutputMode,
) -> Result<ShellOutput, ProcessError> {
    debug!(cmd = %cmd, "running command");

    let mut command = shell_command(cmd);
    command.stdin(Stdio::null());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let spawn_err = |source| ProcessError::Spawn {
        cmd: cmd.to_string(),
        source,
    };

    match mode {
        OutputMode::Capture => {
            let out = command.output().await.map_err(spawn_err)?;
            let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
            output.push_str(&String::from_utf8_lossy(&out.stderr));
            Ok(ShellOutput {
                code: out.status.code(),
                output,
            })
        }
        OutputMode::Inherit => {
            let status = command
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .await
                .map_err(spawn_err)?;
            Ok(ShellOutput {
                code: status.code(),
                output: String::new(),
            })
        }
    }
}

/// Run a command and fail on a nonzero exit.
pub async fn run_checked(
    cmd: &str,
    cwd: Option<&Path>,
    mode: OutputMode,
) -> Result<ShellOutput, ProcessError> {
    let out = run(cmd, cwd, mode).await?;
    if !out.success() {
        if !out.output.is_empty() {
            debug!(output = %out.output, "command output");
        }
        return Err(ProcessError::Failed {
            cmd: cmd.to_string(),
            code: out.code,
        });
    }
    Ok(out)
}

/// Quote a value for interpolation into a bash command line.
pub fn quote(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('$', "\\$")
        .replace('`', "\\`");
    format!("\"{}\"", escaped)
}
