/*!
coordinator.rs - routes document text into a command and its output back out.

Flow for one command string:
  1. parse, reject empty commands and invalid marker combinations
  2. resolve settings, wrap the shell text in the configured surround
  3. pick input regions (non-empty selections, else the whole document)
  4. output mode:
       ReplaceSelection / NewDocument -> one captured run per region, in order
       None                           -> one fire-and-forget run, selection text
                                         staged in a temp file and redirected in

A failing run is reported on the output panel and the loop moves on to the
next region. Usage errors are reported before anything is spawned.
*/

use std::path::Path;

use super::error::{DispatchError, ExecError};
use super::executor::{self, AsyncRunner, ExecutionResult, Invocation};
use super::grammar::{OutputMode, ParsedCommand, parse_command};
use super::settings::{self, ResolvedSettings};
use crate::{log_debug, log_error};
use crate::store::SettingsStore;

/* -------------------------------------------------------------------------- */
/* Host collaborators                                                          */
/* -------------------------------------------------------------------------- */

/// Half-open byte range `[start, end)` in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Region {
    pub start: usize,
    pub end: usize,
}

impl Region {
    /// Endpoints in either order.
    pub fn new(a: usize, b: usize) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Move by `delta` bytes, saturating at zero.
    pub fn shifted(&self, delta: isize) -> Self {
        let mv = |x: usize| x.saturating_add_signed(delta);
        Self {
            start: mv(self.start),
            end: mv(self.end),
        }
    }
}

/// The active document as the coordinator sees it.
pub trait Document {
    /// Selections in document order.
    fn selections(&self) -> Vec<Region>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn substr(&self, region: Region) -> String;
    fn replace(&mut self, region: Region, text: &str);
    fn file_path(&self) -> Option<&Path>;
    fn save(&mut self) -> anyhow::Result<()>;
}

/// The window around the active document: where new documents, error
/// dialogs and the output panel live.
pub trait Workspace {
    fn active_document(&mut self) -> Option<&mut dyn Document>;
    fn new_document(&mut self, name: &str, content: &str) -> anyhow::Result<()>;
    fn error_message(&mut self, message: &str);
    fn show_output_panel(&mut self, message: &str);
}

/* -------------------------------------------------------------------------- */
/* Dispatch                                                                    */
/* -------------------------------------------------------------------------- */

pub const MSG_EMPTY_COMMAND: &str = "Nothing to run: the command is empty.";
pub const MSG_OUTPUT_NEEDS_INPUT: &str = "Piping output to the document requires piping input from \
     the document as well. Please use a preceding |.";
pub const MSG_NO_DOCUMENT: &str = "A document has to be active to pipe text from and/or to it.";

/// What a dispatch did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Captured runs, one per input region (or one without input).
    Captured { runs: usize, failures: usize },
    /// Handed to the async runner.
    Detached { redirected: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sink {
    Replace,
    NewDocument,
}

/// Output panel text for a failed captured run.
pub fn failure_report(command: &str, result: &ExecutionResult) -> String {
    format!(
        "`{}` exited with a status code of {}\n\n{}",
        command, result.exit_code, result.stderr
    )
}

fn usage(workspace: &mut dyn Workspace, message: &str) -> DispatchError {
    workspace.error_message(message);
    DispatchError::Usage(message.to_string())
}

/// Reject marker combinations that have no meaning before any work is done.
fn validate(parsed: &ParsedCommand, workspace: &mut dyn Workspace) -> Result<(), DispatchError> {
    if parsed.is_empty() {
        return Err(usage(workspace, MSG_EMPTY_COMMAND));
    }
    if !parsed.has_input_pipe && parsed.output_mode == OutputMode::ReplaceSelection {
        return Err(usage(workspace, MSG_OUTPUT_NEEDS_INPUT));
    }
    let needs_document =
        parsed.has_input_pipe || parsed.output_mode == OutputMode::ReplaceSelection;
    if needs_document && workspace.active_document().is_none() {
        return Err(usage(workspace, MSG_NO_DOCUMENT));
    }
    Ok(())
}

/// Non-empty selections in document order, or the whole document.
pub fn input_regions(document: &dyn Document) -> Vec<Region> {
    let mut regions: Vec<Region> = document
        .selections()
        .into_iter()
        .filter(|r| !r.is_empty())
        .collect();
    if regions.is_empty() {
        regions.push(Region::new(0, document.len()));
    }
    regions
}

/// Parse and run `raw` against the workspace.
pub fn dispatch(
    workspace: &mut dyn Workspace,
    store: &dyn SettingsStore,
    runner: &mut dyn AsyncRunner,
    cwd: &Path,
    raw: &str,
) -> Result<Outcome, DispatchError> {
    let parsed = parse_command(raw);
    validate(&parsed, workspace)?;
    log_debug!(
        "dispatch: input={} output={} cmd={}",
        parsed.has_input_pipe,
        parsed.output_mode,
        parsed.shell_text
    );

    let settings = settings::resolve(store, &parsed.shell_text)?;
    let command = settings.surround.wrap(&parsed.shell_text);

    let regions = if parsed.has_input_pipe {
        workspace.active_document().map(|doc| input_regions(doc))
    } else {
        None
    };

    match parsed.output_mode {
        OutputMode::None => run_detached(workspace, runner, cwd, &command, &settings, regions),
        OutputMode::ReplaceSelection => {
            run_captured(workspace, cwd, &command, &settings, regions, Sink::Replace)
        }
        OutputMode::NewDocument => {
            run_captured(workspace, cwd, &command, &settings, regions, Sink::NewDocument)
        }
    }
}

fn run_captured(
    workspace: &mut dyn Workspace,
    cwd: &Path,
    command: &str,
    settings: &ResolvedSettings,
    regions: Option<Vec<Region>>,
    sink: Sink,
) -> Result<Outcome, DispatchError> {
    let invocation = Invocation::from_settings(command, settings.shell)?;
    let name = command.trim();

    let targets: Vec<Option<Region>> = match regions {
        Some(rs) => rs.into_iter().map(Some).collect(),
        None => vec![None],
    };

    let mut runs = 0;
    let mut failures = 0;
    // Replacing a region moves every region after it.
    let mut delta: isize = 0;

    for target in targets {
        let region = target.map(|r| r.shifted(delta));
        let input = match region {
            Some(r) => workspace.active_document().map(|doc| doc.substr(r)),
            None => None,
        };

        runs += 1;
        let result = match executor::run_captured(cwd, &invocation, input.as_deref()) {
            Ok(result) => result,
            Err(ExecError::EmptyCommand) => return Err(ExecError::EmptyCommand.into()),
            Err(e) => {
                failures += 1;
                log_error!("{e}");
                workspace.show_output_panel(&format!("`{command}` could not be run\n\n{e}"));
                continue;
            }
        };
        if !result.succeeded {
            failures += 1;
            workspace.show_output_panel(&failure_report(command, &result));
            continue;
        }

        match (sink, region) {
            (Sink::Replace, Some(r)) => {
                if let Some(doc) = workspace.active_document() {
                    doc.replace(r, &result.stdout);
                    delta += result.stdout.len() as isize - r.len() as isize;
                }
            }
            // Validation guarantees an input region for replacements.
            (Sink::Replace, None) => {}
            (Sink::NewDocument, _) => workspace
                .new_document(name, &result.stdout)
                .map_err(DispatchError::Host)?,
        }
    }

    Ok(Outcome::Captured { runs, failures })
}

fn run_detached(
    workspace: &mut dyn Workspace,
    runner: &mut dyn AsyncRunner,
    cwd: &Path,
    command: &str,
    settings: &ResolvedSettings,
    regions: Option<Vec<Region>>,
) -> Result<Outcome, DispatchError> {
    let stdin = match (regions, workspace.active_document()) {
        (Some(rs), Some(doc)) => Some(rs.iter().map(|r| doc.substr(*r)).collect::<String>()),
        _ => None,
    };
    let redirected = stdin.is_some();

    let invocation = Invocation::from_settings(command, settings.shell)?;
    executor::execute(
        cwd,
        &invocation,
        false,
        stdin.as_deref(),
        &settings.exec_args,
        runner,
    )?;
    Ok(Outcome::Detached { redirected })
}
