/*!
executor.rs - running shell commands.

Two modes:
  - captured:  spawn, feed stdin, block until exit, collect stdout/stderr
  - detached:  hand the command to an `AsyncRunner` and return immediately

Captured runs drive the child on a Tokio runtime so stdin is written while
stdout/stderr are drained; a large selection piped into a chatty command
cannot deadlock on full pipes. The public call is still blocking, and there is
no timeout: a child that never exits blocks the caller.
*/

use serde_json::{Map, Value};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;

use super::error::ExecError;
use crate::{log_debug, log_trace};

/// How a command is handed to the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// One string interpreted by the platform shell.
    Shell(String),
    /// Program plus arguments, no shell interpretation.
    Direct(Vec<String>),
}

impl Invocation {
    /// Build the invocation shape selected by the `shell` setting.
    pub fn from_settings(command: &str, shell: bool) -> Result<Self, ExecError> {
        if shell {
            Ok(Invocation::Shell(command.to_string()))
        } else {
            Ok(Invocation::Direct(shell_words::split(command)?))
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Invocation::Shell(s) => s.trim().is_empty(),
            Invocation::Direct(argv) => argv.first().is_none_or(|p| p.is_empty()),
        }
    }

    /// The invocation as a single shell-ready string.
    pub fn to_shell_string(&self) -> String {
        match self {
            Invocation::Shell(s) => s.clone(),
            Invocation::Direct(argv) => shell_words::join(argv),
        }
    }

    fn program_and_args(&self) -> (String, Vec<String>) {
        match self {
            Invocation::Shell(s) => {
                let (sh, flag) = shell_program();
                (sh.to_string(), vec![flag.to_string(), s.clone()])
            }
            Invocation::Direct(argv) => {
                let program = argv.first().cloned().unwrap_or_default();
                (program, argv.iter().skip(1).cloned().collect())
            }
        }
    }

    fn tokio_command(&self, cwd: &Path) -> tokio::process::Command {
        let (program, args) = self.program_and_args();
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args).current_dir(cwd);
        cmd
    }

    fn std_command(&self, cwd: &Path) -> std::process::Command {
        let (program, args) = self.program_and_args();
        let mut cmd = std::process::Command::new(program);
        cmd.args(args).current_dir(cwd);
        cmd
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_shell_string())
    }
}

fn shell_program() -> (&'static str, &'static str) {
    if cfg!(windows) {
        ("cmd", "/C")
    } else {
        ("sh", "-c")
    }
}

/// Outcome of a captured run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub succeeded: bool,
    /// Empty when the command failed.
    pub stdout: String,
    pub stderr: String,
    /// `-1` when the child was killed by a signal.
    pub exit_code: i32,
}

/// Run `invocation` in `cwd`, optionally feeding `stdin`, and wait for it.
pub fn run_captured(
    cwd: &Path,
    invocation: &Invocation,
    stdin: Option<&str>,
) -> Result<ExecutionResult, ExecError> {
    if invocation.is_empty() {
        return Err(ExecError::EmptyCommand);
    }
    let rt = tokio::runtime::Runtime::new().map_err(|source| ExecError::Io {
        command: invocation.to_string(),
        source,
    })?;
    rt.block_on(capture(cwd, invocation, stdin))
}

async fn capture(
    cwd: &Path,
    invocation: &Invocation,
    stdin: Option<&str>,
) -> Result<ExecutionResult, ExecError> {
    let label = invocation.to_string();
    log_debug!("captured run in {}: {}", cwd.display(), label);

    let mut cmd = invocation.tokio_command(cwd);
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
        command: label.clone(),
        source,
    })?;

    let pipe = child.stdin.take();
    let feed = async move {
        if let (Some(input), Some(mut pipe)) = (stdin, pipe) {
            pipe.write_all(input.as_bytes()).await?;
            pipe.shutdown().await?;
        }
        Ok::<(), std::io::Error>(())
    };

    let (fed, output) = tokio::join!(feed, child.wait_with_output());
    let output = output.map_err(|source| ExecError::Io {
        command: label.clone(),
        source,
    })?;

    match fed {
        // The child may exit without reading all of its input (`head -1`).
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
            log_trace!("child closed stdin early: {}", label);
        }
        Err(source) => {
            return Err(ExecError::Io {
                command: label,
                source,
            });
        }
        Ok(()) => {}
    }

    let exit_code = output.status.code().unwrap_or(-1);
    let succeeded = output.status.success();
    Ok(ExecutionResult {
        succeeded,
        stdout: if succeeded {
            String::from_utf8_lossy(&output.stdout).into_owned()
        } else {
            String::new()
        },
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code,
    })
}

/* -------------------------------------------------------------------------- */
/* Fire-and-forget                                                            */
/* -------------------------------------------------------------------------- */

/// A command handed off to the host's asynchronous run facility.
#[derive(Debug)]
pub struct AsyncRequest {
    pub command: String,
    pub shell: bool,
    pub working_dir: PathBuf,
    /// `exec_args` from the resolved settings, passed through as-is.
    pub options: Map<String, Value>,
    /// File the command reads its stdin from. Deleted when dropped, so a
    /// runner must hold it until the child is done with it.
    pub stdin_file: Option<TempPath>,
}

impl AsyncRequest {
    pub fn invocation(&self) -> Result<Invocation, ExecError> {
        Invocation::from_settings(&self.command, self.shell)
    }

    /// String entries of the `env` option.
    pub fn env(&self) -> Vec<(String, String)> {
        self.options
            .get("env")
            .and_then(|v| v.as_object())
            .map(|env| {
                env.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A std command ready to spawn (cwd and env applied).
    pub fn std_command(&self) -> Result<std::process::Command, ExecError> {
        let invocation = self.invocation()?;
        if invocation.is_empty() {
            return Err(ExecError::EmptyCommand);
        }
        let mut cmd = invocation.std_command(&self.working_dir);
        cmd.envs(self.env());
        Ok(cmd)
    }
}

/// Host capability for running a command without blocking the caller.
pub trait AsyncRunner {
    fn run_async(&mut self, request: AsyncRequest) -> anyhow::Result<()>;
}

/// Write `text` to a fresh temp file that is deleted when the guard drops.
pub fn stage_stdin(text: &str) -> std::io::Result<TempPath> {
    let mut file = tempfile::Builder::new()
        .prefix("shellpipe-")
        .suffix(".stdin")
        .tempfile()?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    Ok(file.into_temp_path())
}

/// `command < 'path'`
pub fn with_stdin_redirect(command: &str, path: &Path) -> String {
    format!(
        "{} < {}",
        command,
        shell_words::quote(&path.to_string_lossy())
    )
}

/// Run `invocation` captured (`Some(result)`) or hand it to `runner` (`None`).
///
/// Detached runs with `stdin` stage it into a temp file and redirect from it,
/// which needs the shell form regardless of the invocation shape.
pub fn execute(
    cwd: &Path,
    invocation: &Invocation,
    capture: bool,
    stdin: Option<&str>,
    options: &Map<String, Value>,
    runner: &mut dyn AsyncRunner,
) -> Result<Option<ExecutionResult>, ExecError> {
    if capture {
        return run_captured(cwd, invocation, stdin).map(Some);
    }
    if invocation.is_empty() {
        return Err(ExecError::EmptyCommand);
    }

    let mut command = invocation.to_shell_string();
    let mut shell = matches!(invocation, Invocation::Shell(_));
    let stdin_file = match stdin {
        Some(text) => {
            let staged = stage_stdin(text).map_err(|source| ExecError::Io {
                command: command.clone(),
                source,
            })?;
            command = with_stdin_redirect(&command, &staged);
            shell = true;
            Some(staged)
        }
        None => None,
    };

    runner
        .run_async(AsyncRequest {
            command,
            shell,
            working_dir: cwd.to_path_buf(),
            options: options.clone(),
            stdin_file,
        })
        .map_err(ExecError::Runner)?;
    Ok(None)
}
