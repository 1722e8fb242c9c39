/*!
`run.rs`

Implements the `run` subcommand: dispatch one command string against a file
(the "document") and the selections given on the command line.

    shellpipe run '| sort |'  --file notes.txt --select 10:80
    shellpipe run '| wc -l >' --file notes.txt
    shellpipe run 'make test'
    printf 'b\na\n' | shellpipe run '| sort |' --stdin

Selections:
  --select START:END   byte range (repeatable)
  --select N           empty selection (a cursor) at N
  No non-empty selection means the whole document is the input.

Results:
  - `|` output replaces the selections and the file is saved, unless
    `--print` (or `--stdin`) asks for the text on stdout instead.
  - `>` output becomes a new document: printed, or written under `--output-dir`
    (the written paths are printed).
  - No output marker: the command runs in the foreground of the terminal.
*/

use anyhow::{Context, Result, bail};
use clap::Args;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use super::{EXIT_FAILED, GlobalOpts, exit_code_for, usage_or_err};
use crate::host::{TerminalWorkspace, TextDocument, WaitingRunner};
use crate::pipe::{Document, Outcome, Region, dispatch};
use crate::{log_debug, log_info};

/// CLI arguments for `shellpipe run <COMMAND>`
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Command string: `[|] shell command [| or >]`
    #[arg(value_name = "COMMAND", allow_hyphen_values = true)]
    pub command: String,

    /// File acting as the active document
    #[arg(short, long, value_name = "PATH", conflicts_with = "stdin")]
    pub file: Option<PathBuf>,

    /// Read the document from standard input (implies --print)
    #[arg(long)]
    pub stdin: bool,

    /// Selection as START:END byte offsets, or N for a cursor (repeatable)
    #[arg(long = "select", value_name = "START:END", value_parser = parse_region)]
    pub selections: Vec<Region>,

    /// Write new documents here instead of printing them
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Print the resulting document instead of saving it
    #[arg(long)]
    pub print: bool,
}

/// `START:END` or `N`.
pub fn parse_region(s: &str) -> Result<Region, String> {
    let parse = |v: &str| {
        v.trim()
            .parse::<usize>()
            .map_err(|_| format!("invalid offset '{v}' in selection '{s}'"))
    };
    match s.split_once(':') {
        Some((a, b)) => Ok(Region::new(parse(a)?, parse(b)?)),
        None => {
            let n = parse(s)?;
            Ok(Region::new(n, n))
        }
    }
}

fn load_document(args: &RunArgs, global: &GlobalOpts) -> Result<Option<TextDocument>> {
    let doc = if let Some(path) = &args.file {
        TextDocument::open(global.resolve(path))?
    } else if args.stdin {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read the document from stdin")?;
        TextDocument::new(text)
    } else {
        if !args.selections.is_empty() {
            bail!("--select needs a document (--file or --stdin)");
        }
        return Ok(None);
    };
    Ok(Some(doc.with_selections(args.selections.clone())?))
}

/// Entry point for the run subcommand.
pub fn execute_run(args: RunArgs, global: &GlobalOpts) -> Result<ExitCode> {
    let session = global.open_session()?;
    let document = load_document(&args, global)?;
    let output_dir = args.output_dir.as_deref().map(|d| global.resolve(d));
    let mut workspace = TerminalWorkspace::new(document, output_dir);
    let mut runner = WaitingRunner::default();

    let outcome = match dispatch(
        &mut workspace,
        session.store(),
        &mut runner,
        &global.cwd,
        &args.command,
    ) {
        Ok(outcome) => outcome,
        Err(e) => return usage_or_err(e.into()),
    };
    log_debug!("run outcome: {outcome:?}");

    for path in workspace.created() {
        println!("{}", path.display());
    }
    if let Some(doc) = workspace.document_mut() {
        if args.print || args.stdin {
            print!("{}", doc.text());
        } else if doc.is_dirty() {
            doc.save()?;
            if let Some(path) = doc.file_path() {
                log_info!("saved {}", path.display());
            }
        }
    }

    Ok(match outcome {
        Outcome::Captured { failures, .. } if failures > 0 => ExitCode::from(EXIT_FAILED),
        Outcome::Captured { .. } => ExitCode::SUCCESS,
        Outcome::Detached { .. } => exit_code_for(runner.last_status),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regions_from_flags() {
        assert_eq!(parse_region("3:9"), Ok(Region::new(3, 9)));
        assert_eq!(parse_region("9:3"), Ok(Region::new(3, 9)));
        assert_eq!(parse_region("7"), Ok(Region::new(7, 7)));
        assert!(parse_region("a:2").is_err());
        assert!(parse_region("").is_err());
    }

    fn args(command: &str, file: Option<PathBuf>, selections: Vec<Region>) -> RunArgs {
        RunArgs {
            command: command.into(),
            file,
            stdin: false,
            selections,
            output_dir: None,
            print: false,
        }
    }

    #[test]
    fn select_without_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let global = GlobalOpts::new(Some(dir.path().to_path_buf()), None).unwrap();
        let err = execute_run(args("| cat |", None, vec![Region::new(0, 1)]), &global);
        assert!(err.is_err());
    }

    #[test]
    fn replace_without_input_exits_with_usage() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("doc.txt"), "abc").unwrap();
        let global = GlobalOpts::new(Some(dir.path().to_path_buf()), None).unwrap();
        let code = execute_run(args("date |", Some("doc.txt".into()), vec![]), &global).unwrap();
        assert_eq!(code, ExitCode::from(super::super::EXIT_USAGE));
        assert_eq!(std::fs::read_to_string(dir.path().join("doc.txt")).unwrap(), "abc");
    }

    #[cfg(unix)]
    #[test]
    fn replaces_selection_and_saves_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.txt");
        std::fs::write(&file, "keep shout keep").unwrap();
        let global = GlobalOpts::new(Some(dir.path().to_path_buf()), None).unwrap();

        let code = execute_run(
            args("| tr a-z A-Z |", Some("doc.txt".into()), vec![Region::new(5, 10)]),
            &global,
        )
        .unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "keep SHOUT keep");
    }

    #[cfg(unix)]
    #[test]
    fn overlapping_selections_are_piped_once() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.txt");
        std::fs::write(&file, "abcdef").unwrap();
        let global = GlobalOpts::new(Some(dir.path().to_path_buf()), None).unwrap();

        let code = execute_run(
            args(
                "| sed 's/.*/[&]/' | tr -d '\\n' |",
                Some("doc.txt".into()),
                vec![Region::new(0, 4), Region::new(2, 6)],
            ),
            &global,
        )
        .unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "[abcdef]");
    }

    #[cfg(unix)]
    #[test]
    fn new_document_lands_in_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("doc.txt"), "b\na\n").unwrap();
        let global = GlobalOpts::new(Some(dir.path().to_path_buf()), None).unwrap();
        let out = dir.path().join("out");

        let mut run = args("| sort >", Some("doc.txt".into()), vec![]);
        run.output_dir = Some(out.clone());
        assert_eq!(execute_run(run, &global).unwrap(), ExitCode::SUCCESS);

        assert_eq!(std::fs::read_to_string(out.join("sort.txt")).unwrap(), "a\nb\n");
        assert_eq!(std::fs::read_to_string(dir.path().join("doc.txt")).unwrap(), "b\na\n");
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_exits_1_and_keeps_text() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("doc.txt"), "abc").unwrap();
        let global = GlobalOpts::new(Some(dir.path().to_path_buf()), None).unwrap();

        let code = execute_run(args("| false |", Some("doc.txt".into()), vec![]), &global).unwrap();
        assert_eq!(code, ExitCode::from(EXIT_FAILED));
        assert_eq!(std::fs::read_to_string(dir.path().join("doc.txt")).unwrap(), "abc");
    }

    #[cfg(unix)]
    #[test]
    fn foreground_run_reports_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("doc.txt"), "abc").unwrap();
        let global = GlobalOpts::new(Some(dir.path().to_path_buf()), None).unwrap();

        let ok = execute_run(args("| cat > copy.txt", Some("doc.txt".into()), vec![]), &global);
        assert_eq!(ok.unwrap(), ExitCode::SUCCESS);
        assert_eq!(std::fs::read_to_string(dir.path().join("copy.txt")).unwrap(), "abc");

        let failed = execute_run(args("exit 3", None, vec![]), &global).unwrap();
        assert_eq!(failed, ExitCode::from(EXIT_FAILED));
    }
}
