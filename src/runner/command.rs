//! Shell command execution
//!
//! The only place rjust spawns processes: recipe lines stream through to the
//! terminal, backticks have their standard output captured.

use crate::error::{EvaluationError, EvaluationResult};
use crate::runner::Context;
use std::io;
use std::path::Path;
use std::process::{Command as StdCommand, ExitStatus, Stdio};

/// Build a shell invocation for `command`
fn shell_command(ctx: &Context, command: &str) -> io::Result<StdCommand> {
    let (program, args) = ctx.shell.split_first().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "shell must not be empty")
    })?;

    let mut cmd = StdCommand::new(program);
    cmd.args(args);
    cmd.arg(command);
    cmd.envs(ctx.env.iter().map(|(k, v)| (k, v)));
    Ok(cmd)
}

/// Run one recipe line in `dir` with `env` added to the environment
///
/// Blocks until the shell exits. Standard streams are inherited.
pub fn run_line(
    ctx: &Context,
    command: &str,
    dir: &Path,
    env: &[(String, String)],
) -> io::Result<ExitStatus> {
    let mut cmd = shell_command(ctx, command)?;
    cmd.current_dir(dir);
    cmd.envs(env.iter().map(|(k, v)| (k, v)));
    cmd.stdin(Stdio::inherit());
    cmd.stdout(Stdio::inherit());
    cmd.stderr(Stdio::inherit());

    cmd.status()
}

/// Run a backtick and return its trimmed standard output
pub fn capture(ctx: &Context, command: &str) -> EvaluationResult<String> {
    let spawn_error = |e: io::Error| EvaluationError::ShellSpawn {
        command: command.to_string(),
        error: e.to_string(),
    };

    let mut cmd = shell_command(ctx, command).map_err(spawn_error)?;
    cmd.current_dir(&ctx.working_dir);
    cmd.stdin(Stdio::inherit());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::inherit());

    let output = cmd.output().map_err(spawn_error)?;

    if !output.status.success() {
        return Err(EvaluationError::ShellFailed {
            command: command.to_string(),
            code: output.status.code(),
        });
    }

    let stdout = String::from_utf8(output.stdout).map_err(|_| EvaluationError::ShellOutput {
        command: command.to_string(),
    })?;

    Ok(stdout.trim().to_string())
}
