/*!
Subcommands and the options they share.

  src/cmd/
    mod.rs      (this file: GlobalOpts, settings lookup, exit codes)
    run.rs      (RunArgs   + execute_run)
    test.rs     (TestArgs  + execute_test)
    index.rs    (IndexArgs + execute_index)
    format.rs   (terminal formatting helpers)

Conventions:
  - Each subcommand module exposes one public `execute_*` function returning
    `anyhow::Result<ExitCode>`; main maps it to the process status.
  - Exit status: 0 ok, 1 a command failed, 2 usage error.
*/

pub mod format;
pub mod index;
pub mod run;

pub use index::{IndexArgs, execute_index};
pub use run::{RunArgs, execute_run};
pub use test::{TestArgs, execute_test};

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitCode, ExitStatus};

use crate::log_debug;
use crate::pipe::DispatchError;
use crate::session::Session;
use crate::store::FileStore;

/// Environment fallback for `--settings`.
pub const SETTINGS_ENV: &str = "SHELLPIPE_SETTINGS";
/// Settings file looked up in the working directory.
pub const SETTINGS_FILE: &str = ".shellpipe.json";

pub const EXIT_FAILED: u8 = 1;
pub const EXIT_USAGE: u8 = 2;

/// Options every subcommand sees.
#[derive(Debug, Clone)]
pub struct GlobalOpts {
    /// Working directory for spawned commands and relative paths.
    pub cwd: PathBuf,
    pub settings: PathBuf,
}

impl GlobalOpts {
    pub fn new(cwd: Option<PathBuf>, settings: Option<PathBuf>) -> Result<Self> {
        let here = std::env::current_dir().context("failed to read the current directory")?;
        let cwd = match cwd {
            Some(dir) => here.join(dir),
            None => here,
        };
        if !cwd.is_dir() {
            anyhow::bail!("working directory {} does not exist", cwd.display());
        }
        let settings = settings_path(&cwd, settings, std::env::var_os(SETTINGS_ENV));
        Ok(Self { cwd, settings })
    }

    /// `path` relative to the working directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.cwd.join(path)
    }

    pub fn open_session(&self) -> Result<Session> {
        let store = FileStore::open(&self.settings)
            .with_context(|| format!("failed to load settings from {}", self.settings.display()))?;
        if let Some(path) = store.path() {
            log_debug!("settings: {}", path.display());
        }
        Ok(Session::new(store))
    }
}

/// Settings file: flag > environment > `<cwd>/.shellpipe.json`.
pub fn settings_path(cwd: &Path, flag: Option<PathBuf>, env: Option<OsString>) -> PathBuf {
    flag.or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from))
        .map(|p| cwd.join(p))
        .unwrap_or_else(|| cwd.join(SETTINGS_FILE))
}

/// Exit code for a fire-and-forget child that was waited on.
pub fn exit_code_for(status: Option<ExitStatus>) -> ExitCode {
    match status {
        Some(s) if !s.success() => ExitCode::from(EXIT_FAILED),
        _ => ExitCode::SUCCESS,
    }
}

/// Usage errors were already shown to the user; everything else propagates.
pub fn usage_or_err(err: anyhow::Error) -> Result<ExitCode> {
    match err.downcast_ref::<DispatchError>() {
        Some(e) if e.is_usage() => Ok(ExitCode::from(EXIT_USAGE)),
        _ => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_path_precedence() {
        let cwd = Path::new("/work");
        assert_eq!(
            settings_path(cwd, Some("a.yaml".into()), Some("b.json".into())),
            PathBuf::from("/work/a.yaml")
        );
        assert_eq!(
            settings_path(cwd, None, Some("/etc/b.json".into())),
            PathBuf::from("/etc/b.json")
        );
        assert_eq!(
            settings_path(cwd, None, Some("".into())),
            PathBuf::from("/work/.shellpipe.json")
        );
        assert_eq!(settings_path(cwd, None, None), PathBuf::from("/work/.shellpipe.json"));
    }

    #[test]
    fn usage_errors_map_to_exit_2() {
        let err = anyhow::Error::from(DispatchError::Usage("nope".into()));
        assert_eq!(usage_or_err(err).unwrap(), ExitCode::from(EXIT_USAGE));

        let other = anyhow::anyhow!("disk on fire");
        assert!(usage_or_err(other).is_err());
    }

    #[test]
    fn missing_working_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(GlobalOpts::new(Some(missing), None).is_err());

        let opts = GlobalOpts::new(Some(dir.path().to_path_buf()), None).unwrap();
        assert_eq!(opts.settings, dir.path().join(SETTINGS_FILE));
        assert_eq!(opts.resolve(Path::new("x.r")), dir.path().join("x.r"));
    }
}
