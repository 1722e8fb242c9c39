/*!
Test runs: pick a test file (or one test block inside it) and hand the
matching task-runner command to the piping engine.

  slicer.rs  preamble + block under the cursor
  derive.rs  `<module>/tests/<rest>` -> `rake 'test_only[...]'`
  flow.rs    the all / single_test / repeat_last_test flow and its memory
*/

pub mod derive;
pub mod flow;
pub mod slicer;

pub use flow::{MatchMode, RunMemory, TestOutcome, run_test};
