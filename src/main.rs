use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod cmd;
mod host;
mod index;
mod pipe;
mod session;
mod store;
mod testrun;
mod utils;

use cmd::{GlobalOpts, IndexArgs, RunArgs, TestArgs};

/// shellpipe - pipe document text through ad hoc shell commands
///
/// Command layout:
///   shellpipe run  '<COMMAND>' [--file PATH] [--select START:END ...]
///   shellpipe test [--file PATH] [--cursor N ...] [--match all|single_test|repeat_last_test]
///   shellpipe index [DIR] [--json] [--symbol NAME]
///
/// Command strings:
///   '| cmd |'   selections -> cmd -> replace selections
///   '| cmd >'   selections -> cmd -> new document
///   '| cmd'     selections -> cmd, output to the terminal
///   'cmd >'     cmd -> new document
///   'cmd'       cmd, output to the terminal
///
/// Global flags / env:
///   -v / -vv             Increase verbosity
///   -q / --quiet         Errors only
///   -C / --cwd DIR       Working directory for commands and relative paths
///   -s / --settings FILE Settings file (JSON or YAML)
///   SHELLPIPE_SETTINGS   Fallback for --settings; default <cwd>/.shellpipe.json
///
/// Examples:
///   shellpipe run '| sort -u |' --file words.txt
///   shellpipe run '| jq . >' --file data.json --select 120:480
///   shellpipe test --file pkg/tests/test_math.r --cursor 300 --match single_test
#[derive(Parser, Debug)]
#[command(
    name = "shellpipe",
    version,
    author,
    about = "shellpipe - pipe document selections through ad hoc shell commands",
    propagate_version = true,
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Silence all non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Working directory for commands and relative paths
    #[arg(short = 'C', long = "cwd", global = true, value_name = "DIR")]
    cwd: Option<PathBuf>,

    /// Settings file (falls back to SHELLPIPE_SETTINGS, then .shellpipe.json)
    #[arg(short = 's', long = "settings", global = true, value_name = "FILE")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a command string against a document
    Run(RunArgs),

    /// Run the tests of a test file, or the single test under the cursor
    Test(TestArgs),

    /// List function definitions in .r files
    Index(IndexArgs),
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    let level = utils::derive_level(cli.verbose, cli.quiet);
    utils::init_logging(level);

    let global = GlobalOpts::new(cli.cwd, cli.settings)?;

    match cli.command {
        Commands::Run(args) => cmd::execute_run(args, &global),
        Commands::Test(args) => cmd::execute_test(args, &global),
        Commands::Index(args) => cmd::execute_index(args, &global),
    }
}
