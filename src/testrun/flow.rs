/*!
flow.rs - "run this test file / the test under the cursor / the last test".

  1. save the active document
  2. repeat_last_test: cursors, file and mode come from the run memory
  3. single_test: slice the block under the cursor into `.tmp.<basename>`
  4. derive the task-runner command from the path
  5. remember cursors, file and mode
  6. dispatch the command like any other command string

Not-a-test-file and no-tests cases are logged and skipped, not errors.
*/

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::TempPath;

use super::derive::{command_from_file_path, is_test_file};
use super::slicer::slice_test_block;
use crate::pipe::{AsyncRunner, Outcome, Workspace, dispatch};
use crate::session::Session;
use crate::{log_debug, log_info};

/// Which tests to run.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[value(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// The whole test file
    All,
    /// Only the test block under the (last) cursor
    SingleTest,
    /// Whatever ran last time
    RepeatLastTest,
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchMode::All => "all",
            MatchMode::SingleTest => "single_test",
            MatchMode::RepeatLastTest => "repeat_last_test",
        };
        f.write_str(s)
    }
}

/// Inputs of the last test run, for `repeat_last_test`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunMemory {
    pub selections: Vec<usize>,
    pub last_test_file_path: Option<PathBuf>,
    pub match_mode: Option<MatchMode>,
}

/// Why a test run did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    NothingToRepeat,
    NoFile,
    NotATestFile,
    NoTests,
    NotRunnable,
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Skip::NothingToRepeat => "no previous test run to repeat",
            Skip::NoFile => "no file to test",
            Skip::NotATestFile => "not a valid test file",
            Skip::NoTests => "no tests in current file",
            Skip::NotRunnable => "file is not under a <module>/tests directory",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub enum TestOutcome {
    Skipped(Skip),
    Dispatched {
        command: String,
        outcome: Outcome,
        /// Sliced single-test file; deleted when this outcome is dropped.
        scratch: Option<TempPath>,
    },
}

/// `.tmp.<basename>` next to `path`.
pub fn scratch_path(path: &Path) -> PathBuf {
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".tmp.{base}"))
}

fn skip(reason: Skip) -> Result<TestOutcome> {
    log_debug!("test run skipped: {reason}");
    Ok(TestOutcome::Skipped(reason))
}

/// Write the block under the last cursor of `file` to its scratch path.
fn write_single_test(file: &Path, cursors: &[usize]) -> Result<Result<TempPath, Skip>> {
    if !is_test_file(file) {
        return Ok(Err(Skip::NotATestFile));
    }
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read test file {}", file.display()))?;
    let Some(code) = slice_test_block(&text, cursors) else {
        return Ok(Err(Skip::NoTests));
    };
    let scratch = scratch_path(file);
    std::fs::write(&scratch, code)
        .with_context(|| format!("failed to write {}", scratch.display()))?;
    Ok(Ok(TempPath::from_path(scratch)))
}

/// Run tests for the active document according to `mode`.
pub fn run_test(
    session: &mut Session,
    workspace: &mut dyn Workspace,
    runner: &mut dyn AsyncRunner,
    cwd: &Path,
    mode: MatchMode,
) -> Result<TestOutcome> {
    let (mut cursors, mut file) = match workspace.active_document() {
        Some(doc) => {
            doc.save().context("failed to save the active document")?;
            (
                doc.selections().iter().map(|r| r.start).collect::<Vec<_>>(),
                doc.file_path().map(Path::to_path_buf),
            )
        }
        None => (Vec::new(), None),
    };

    let mut mode = mode;
    if mode == MatchMode::RepeatLastTest {
        let memory = session.run_memory();
        match memory.match_mode {
            Some(MatchMode::RepeatLastTest) | None => return skip(Skip::NothingToRepeat),
            Some(m) => mode = m,
        }
        cursors = memory.selections;
        file = memory.last_test_file_path;
    }

    let Some(file) = file else {
        return skip(Skip::NoFile);
    };

    let scratch = match mode {
        MatchMode::SingleTest => match write_single_test(&file, &cursors)? {
            Ok(path) => Some(path),
            Err(reason) => return skip(reason),
        },
        MatchMode::All | MatchMode::RepeatLastTest => None,
    };
    let run_path = scratch.as_deref().unwrap_or(file.as_path());

    let Some(command) = command_from_file_path(run_path) else {
        return skip(Skip::NotRunnable);
    };
    log_debug!("test command for {}: {}", run_path.display(), command);

    session.remember(&RunMemory {
        selections: cursors,
        last_test_file_path: Some(file),
        match_mode: Some(mode),
    })?;

    log_info!("{mode} test run: {command}");
    let outcome = dispatch(workspace, session.store(), runner, cwd, &command)?;
    Ok(TestOutcome::Dispatched {
        command,
        outcome,
        scratch,
    })
}
