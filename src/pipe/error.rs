//! Error types for the piping engine.

use thiserror::Error;

/// Bad values in the settings store.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid value for setting '{key}': {source}")]
    InvalidValue {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid cmd_regex '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Failures that stop a process from being run at all. A process that runs
/// and exits non-zero is not an error; see `ExecutionResult::succeeded`.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("refusing to run an empty command")]
    EmptyCommand,

    #[error("failed to split command into arguments: {0}")]
    Split(#[from] shell_words::ParseError),

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error while running `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("async runner failed: {0}")]
    Runner(#[source] anyhow::Error),
}

/// Everything that aborts a dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Invalid marker combination or missing document; nothing was spawned.
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    /// The host could not perform an output action (e.g. open a document).
    #[error("host error: {0}")]
    Host(#[source] anyhow::Error),
}

impl DispatchError {
    pub fn is_usage(&self) -> bool {
        matches!(self, DispatchError::Usage(_))
    }
}
