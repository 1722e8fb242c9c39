/*!
grammar.rs - command string grammar.

  [|] <shell text> [| or >]

  leading  `|`  pipe the selection (or whole document) into the command
  trailing `|`  replace the selection with the command's stdout
  trailing `>`  open a new document holding the command's stdout

Whitespace around each part is insignificant. Parsing never fails; an empty
shell text is rejected later, before anything is spawned.
*/

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Where captured output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputMode {
    /// No trailing marker: run fire-and-forget, output is not routed back.
    None,
    /// Trailing `|`.
    ReplaceSelection,
    /// Trailing `>`.
    NewDocument,
}

impl OutputMode {
    fn from_marker(marker: Option<&str>) -> Self {
        match marker {
            Some("|") => OutputMode::ReplaceSelection,
            Some(">") => OutputMode::NewDocument,
            _ => OutputMode::None,
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutputMode::None => "none",
            OutputMode::ReplaceSelection => "replace-selection",
            OutputMode::NewDocument => "new-document",
        };
        f.write_str(s)
    }
}

/// A command string split into its three parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub has_input_pipe: bool,
    pub shell_text: String,
    pub output_mode: OutputMode,
}

impl ParsedCommand {
    pub fn is_empty(&self) -> bool {
        self.shell_text.is_empty()
    }
}

fn grammar() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^\s*(?P<input>\|)?\s*(?P<shell_cmd>.*?)\s*(?P<output>[|>])?\s*$")
            .expect("command grammar regex is valid")
    })
}

/// Parse a raw command string.
///
/// Examples:
/// - `"|sort|"`      -> input pipe, `sort`, ReplaceSelection
/// - `"| wc -l >"`   -> input pipe, `wc -l`, NewDocument
/// - `"make test"`   -> no pipe, `make test`, None
pub fn parse_command(raw: &str) -> ParsedCommand {
    // The pattern matches every string: all groups are optional and the
    // middle group accepts anything, so a miss only happens on a regex bug.
    let Some(caps) = grammar().captures(raw) else {
        return ParsedCommand {
            has_input_pipe: false,
            shell_text: raw.trim().to_string(),
            output_mode: OutputMode::None,
        };
    };

    ParsedCommand {
        has_input_pipe: caps.name("input").is_some(),
        shell_text: caps
            .name("shell_cmd")
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default(),
        output_mode: OutputMode::from_marker(caps.name("output").map(|m| m.as_str())),
    }
}
