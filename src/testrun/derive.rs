//! Turn a test file path into the task-runner command that runs it.
//!
//! Convention: `.../<module>/tests/<rest>` runs as
//! `rake 'test_only[<module>, <rest>]'`.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

fn convention() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r".*/([^/]+)/tests/(.*)").expect("test path regex is valid"))
}

/// `None` when the path is not inside a `<module>/tests/` directory.
pub fn command_from_file_path(path: &Path) -> Option<String> {
    let raw = path.to_string_lossy();
    let caps = convention().captures(&raw)?;
    let module = caps.get(1)?.as_str();
    let rest = caps.get(2)?.as_str();
    Some(format!("rake 'test_only[{module}, {rest}]'"))
}

/// Test files are named `test_*.r`.
pub fn is_test_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("test_") && n.ends_with(".r"))
}
