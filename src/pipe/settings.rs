/*!
settings.rs - per-command execution settings.

Defaults live under `exec_args`, `surround_cmd` and `shell`. `cmd_settings` is
an ordered list of overrides:

  { "cmd_regex": "^pytest", "surround_cmd": ["source .venv/bin/activate && ", ""] }

The first override whose `cmd_regex` matches anywhere in the shell text
replaces the fields it sets; the rest of the list is ignored. Settings are
read from the store on every call since the user may edit them between runs.
*/

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::SettingsError;
use crate::store::SettingsStore;

pub const KEY_EXEC_ARGS: &str = "exec_args";
pub const KEY_SURROUND: &str = "surround_cmd";
pub const KEY_SHELL: &str = "shell";
pub const KEY_CMD_SETTINGS: &str = "cmd_settings";

/// Fixed text wrapped around the user's shell text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct Surround {
    pub prefix: String,
    pub suffix: String,
}

impl Surround {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    pub fn wrap(&self, shell_text: &str) -> String {
        format!("{}{}{}", self.prefix, shell_text, self.suffix)
    }
}

impl From<(String, String)> for Surround {
    fn from((prefix, suffix): (String, String)) -> Self {
        Self::new(prefix, suffix)
    }
}

impl From<Surround> for (String, String) {
    fn from(s: Surround) -> Self {
        (s.prefix, s.suffix)
    }
}

/// Settings in effect for one command run.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSettings {
    /// Passed through untouched to the async runner.
    pub exec_args: Map<String, Value>,
    pub surround: Surround,
    /// `true`: run the command string through the shell. `false`: split it
    /// into argv and run the program directly (captured runs only).
    pub shell: bool,
}

impl Default for ResolvedSettings {
    fn default() -> Self {
        Self {
            exec_args: Map::new(),
            surround: Surround::default(),
            shell: true,
        }
    }
}

/// One entry of `cmd_settings`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CmdOverride {
    pub cmd_regex: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec_args: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surround_cmd: Option<Surround>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<bool>,
}

impl CmdOverride {
    fn matches(&self, shell_text: &str) -> Result<bool, SettingsError> {
        let re = Regex::new(&self.cmd_regex).map_err(|source| SettingsError::InvalidPattern {
            pattern: self.cmd_regex.clone(),
            source,
        })?;
        Ok(re.is_match(shell_text))
    }

    fn apply(self, settings: &mut ResolvedSettings) {
        if let Some(exec_args) = self.exec_args {
            settings.exec_args = exec_args;
        }
        if let Some(surround) = self.surround_cmd {
            settings.surround = surround;
        }
        if let Some(shell) = self.shell {
            settings.shell = shell;
        }
    }
}

fn read_key<T: DeserializeOwned>(
    store: &dyn SettingsStore,
    key: &'static str,
) -> Result<Option<T>, SettingsError> {
    match store.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v)
            .map(Some)
            .map_err(|source| SettingsError::InvalidValue { key, source }),
    }
}

/// Defaults merged with the first matching override for `shell_text`.
pub fn resolve(
    store: &dyn SettingsStore,
    shell_text: &str,
) -> Result<ResolvedSettings, SettingsError> {
    let mut settings = ResolvedSettings::default();
    if let Some(exec_args) = read_key(store, KEY_EXEC_ARGS)? {
        settings.exec_args = exec_args;
    }
    if let Some(surround) = read_key(store, KEY_SURROUND)? {
        settings.surround = surround;
    }
    if let Some(shell) = read_key(store, KEY_SHELL)? {
        settings.shell = shell;
    }

    let overrides: Vec<CmdOverride> = read_key(store, KEY_CMD_SETTINGS)?.unwrap_or_default();
    for over in overrides {
        if over.matches(shell_text)? {
            crate::log_debug!("settings override '{}' matched", over.cmd_regex);
            over.apply(&mut settings);
            break;
        }
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileStore;
    use serde_json::json;

    fn store(v: Value) -> FileStore {
        FileStore::from_value(v).unwrap()
    }

    #[test]
    fn empty_store_gives_defaults() {
        let s = resolve(&FileStore::in_memory(), "ls").unwrap();
        assert_eq!(s, ResolvedSettings::default());
        assert!(s.shell);
    }

    #[test]
    fn defaults_without_match() {
        let st = store(json!({
            "exec_args": {"env": {"A": "1"}},
            "surround_cmd": ["(", ")"],
            "cmd_settings": [{"cmd_regex": "^cargo", "surround_cmd": ["x", "y"]}]
        }));
        let s = resolve(&st, "ls -la").unwrap();
        assert_eq!(s.surround, Surround::new("(", ")"));
        assert_eq!(s.exec_args.get("env"), Some(&json!({"A": "1"})));
    }

    #[test]
    fn first_match_wins() {
        let st = store(json!({
            "surround_cmd": ["", ""],
            "cmd_settings": [
                {"cmd_regex": "test", "surround_cmd": ["first ", ""]},
                {"cmd_regex": "rake", "surround_cmd": ["second ", ""], "shell": false}
            ]
        }));
        let s = resolve(&st, "rake test").unwrap();
        assert_eq!(s.surround.prefix, "first ");
        assert!(s.shell, "second record must not leak its fields");
    }

    #[test]
    fn pattern_is_a_substring_search() {
        let st = store(json!({
            "cmd_settings": [{"cmd_regex": "sort", "shell": false}]
        }));
        assert!(!resolve(&st, "uniq | sort -n").unwrap().shell);
    }

    #[test]
    fn override_replaces_only_given_fields() {
        let st = store(json!({
            "exec_args": {"quiet": true},
            "surround_cmd": ["a", "b"],
            "cmd_settings": [{"cmd_regex": ".", "exec_args": {"env": {}}}]
        }));
        let s = resolve(&st, "x").unwrap();
        assert_eq!(s.surround, Surround::new("a", "b"));
        assert!(s.exec_args.get("quiet").is_none());
        assert!(s.exec_args.contains_key("env"));
    }

    #[test]
    fn bad_regex_is_reported() {
        let st = store(json!({"cmd_settings": [{"cmd_regex": "(unclosed"}]}));
        let err = resolve(&st, "x").unwrap_err();
        assert!(matches!(err, SettingsError::InvalidPattern { .. }));
    }

    #[test]
    fn bad_surround_shape_is_reported() {
        let st = store(json!({"surround_cmd": "just one string"}));
        let err = resolve(&st, "x").unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue { key: "surround_cmd", .. }));
    }

    #[test]
    fn resolution_sees_store_changes() {
        let mut st = FileStore::in_memory();
        assert_eq!(resolve(&st, "x").unwrap().surround, Surround::default());
        st.set(KEY_SURROUND, json!(["p", "s"]));
        assert_eq!(resolve(&st, "x").unwrap().surround, Surround::new("p", "s"));
    }

    fn strip<'a>(s: &Surround, wrapped: &'a str) -> Option<&'a str> {
        wrapped
            .strip_prefix(s.prefix.as_str())?
            .strip_suffix(s.suffix.as_str())
    }

    #[test]
    fn surround_wrap_is_reversible() {
        let s = Surround::new("time (", ") 2>&1");
        let wrapped = s.wrap("make -j4");
        assert_eq!(wrapped, "time (make -j4) 2>&1");
        assert_eq!(strip(&s, &wrapped), Some("make -j4"));
        assert_eq!(strip(&s, "make -j4"), None);
        assert_eq!(strip(&Surround::default(), " x "), Some(" x "));
    }
}
