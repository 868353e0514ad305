//! External process execution
//!
//! Every capability the pipeline drives (`git`, `docker`) is an external
//! program. This module runs one command to completion, captures its output
//! and turns a non-zero exit into a typed error. Children are killed when
//! their future is dropped, so a stage timeout never leaves a process behind.

use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Captured result of a successful command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Errors from running an external command
#[derive(Debug, Error)]
pub enum CommandError {
    /// The program could not be started
    #[error("failed to execute '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited unsuccessfully
    #[error("'{program}' exited with code {exit_code}: {detail}")]
    Failed {
        program: String,
        exit_code: i32,
        detail: String,
    },
}

/// Checks that a program is installed and answers `--version`
pub async fn check_available(program: &str) -> anyhow::Result<()> {
    let output = run(Command::new(program).arg("--version"), None)
        .await
        .map_err(|e| anyhow::anyhow!("{}. Is {} installed?", e, program))?;

    info!("{} is available: {}", program, output.stdout.trim());

    Ok(())
}

/// Runs a command to completion
///
/// `stdin` is written to the child and then closed; without it the child
/// gets an empty stdin. Output is logged at debug level.
pub async fn run(
    command: &mut Command,
    stdin: Option<&[u8]>,
) -> Result<CommandOutput, CommandError> {
    let program = command.as_std().get_program().to_string_lossy().to_string();

    command
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|source| CommandError::Spawn {
        program: program.clone(),
        source,
    })?;

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(input)
            .await
            .map_err(|source| CommandError::Spawn {
                program: program.clone(),
                source,
            })?;
        // Dropping the pipe closes the child's stdin
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|source| CommandError::Spawn {
            program: program.clone(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if !stdout.trim().is_empty() {
        debug!("{} stdout: {}", program, stdout.trim());
    }
    if !stderr.trim().is_empty() {
        debug!("{} stderr: {}", program, stderr.trim());
    }

    if !output.status.success() {
        let exit_code = output.status.code().unwrap_or(-1);
        let detail = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };

        return Err(CommandError::Failed {
            program,
            exit_code,
            detail,
        });
    }

    Ok(CommandOutput { stdout, stderr })
}
