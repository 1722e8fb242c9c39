/*!
Piping engine: command grammar, per-command settings, process execution and
the coordinator that moves document text through a command.

  grammar.rs      `[|] cmd [|>]` -> ParsedCommand
  settings.rs     defaults + first matching `cmd_settings` override
  executor.rs     captured / fire-and-forget runs, AsyncRunner seam
  coordinator.rs  Document / Workspace seams + dispatch
  error.rs        typed errors
*/

pub mod coordinator;
pub mod error;
pub mod executor;
pub mod grammar;
pub mod settings;

pub use coordinator::{Document, Outcome, Region, Workspace, dispatch};
pub use error::DispatchError;
pub use executor::{AsyncRequest, AsyncRunner};
