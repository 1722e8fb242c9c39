//! Terminal host: the editor collaborators, backed by files and the terminal.
//!
//!   TextDocument       in-memory text + selections, optionally tied to a file
//!   TerminalWorkspace  new documents -> stdout or files, dialogs -> stderr boxes
//!   WaitingRunner      AsyncRunner that streams the child to the terminal and
//!                      waits, keeping staged stdin alive until the child exits

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Instant;

use crate::cmd::format::{Role, StyleOptions, box_header, color, emoji};
use crate::pipe::{AsyncRequest, AsyncRunner, Document, Region, Workspace};
use crate::{log_debug, log_info};

/* -------------------------------------------------------------------------- */
/* Document                                                                    */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, Default)]
pub struct TextDocument {
    path: Option<PathBuf>,
    text: String,
    selections: Vec<Region>,
    dirty: bool,
}

impl TextDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Self {
            path: Some(path),
            text,
            ..Default::default()
        })
    }

    /// Replace the selections. Each must lie inside the text on character
    /// boundaries; they are kept in document order, and overlapping or
    /// repeated selections are merged into one.
    pub fn with_selections(mut self, mut selections: Vec<Region>) -> Result<Self> {
        for r in &selections {
            if r.end > self.text.len() {
                bail!(
                    "selection {}:{} is outside the document ({} bytes)",
                    r.start,
                    r.end,
                    self.text.len()
                );
            }
            if !self.text.is_char_boundary(r.start) || !self.text.is_char_boundary(r.end) {
                bail!("selection {}:{} splits a UTF-8 character", r.start, r.end);
            }
        }
        selections.sort();
        let mut merged: Vec<Region> = Vec::with_capacity(selections.len());
        for r in selections {
            match merged.last_mut() {
                Some(last) if r.start < last.end || r == *last => {
                    *last = Region::new(last.start, last.end.max(r.end));
                }
                _ => merged.push(r),
            }
        }
        self.selections = merged;
        Ok(self)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl Document for TextDocument {
    fn selections(&self) -> Vec<Region> {
        self.selections.clone()
    }

    fn len(&self) -> usize {
        self.text.len()
    }

    fn substr(&self, region: Region) -> String {
        self.text
            .get(region.start..region.end)
            .unwrap_or_default()
            .to_string()
    }

    fn replace(&mut self, region: Region, text: &str) {
        if self.text.get(region.start..region.end).is_none() {
            log_debug!("ignoring replace of invalid region {}:{}", region.start, region.end);
            return;
        }
        self.text.replace_range(region.start..region.end, text);
        self.dirty = true;

        let delta = text.len() as isize - region.len() as isize;
        for sel in &mut self.selections {
            if *sel == region {
                *sel = Region::new(region.start, region.start + text.len());
            } else if sel.start >= region.end {
                *sel = sel.shifted(delta);
            }
        }
    }

    fn file_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn save(&mut self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if self.dirty {
            std::fs::write(path, &self.text)
                .with_context(|| format!("failed to save {}", path.display()))?;
            self.dirty = false;
        }
        Ok(())
    }
}

/* -------------------------------------------------------------------------- */
/* Workspace                                                                   */
/* -------------------------------------------------------------------------- */

pub struct TerminalWorkspace {
    document: Option<TextDocument>,
    /// Where new documents are written; stdout when unset.
    output_dir: Option<PathBuf>,
    style: StyleOptions,
    created: Vec<PathBuf>,
}

impl TerminalWorkspace {
    pub fn new(document: Option<TextDocument>, output_dir: Option<PathBuf>) -> Self {
        Self {
            document,
            output_dir,
            style: StyleOptions::detect(),
            created: Vec::new(),
        }
    }

    pub fn document_mut(&mut self) -> Option<&mut TextDocument> {
        self.document.as_mut()
    }

    /// Files written for new documents (only with an output directory).
    pub fn created(&self) -> &[PathBuf] {
        &self.created
    }
}

/// File name for a new document named after its command.
pub fn document_file_name(name: &str) -> String {
    let mut stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    stem = stem.trim_matches('_').chars().take(60).collect();
    if stem.is_empty() {
        stem.push_str("untitled");
    }
    format!("{stem}.txt")
}

fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = file_name.rsplit_once('.').unwrap_or((file_name, ""));
    (1..)
        .map(|n| dir.join(format!("{stem}-{n}.{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

impl Workspace for TerminalWorkspace {
    fn active_document(&mut self) -> Option<&mut dyn Document> {
        self.document.as_mut().map(|d| d as &mut dyn Document)
    }

    fn new_document(&mut self, name: &str, content: &str) -> Result<()> {
        match &self.output_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
                let path = unique_path(dir, &document_file_name(name));
                std::fs::write(&path, content)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                log_info!("new document '{}' -> {}", name, path.display());
                self.created.push(path);
            }
            None => {
                let title = format!("{} {}", emoji("doc", &self.style), name);
                println!("{}", box_header(title.trim(), Some("new document"), &self.style));
                print!("{content}");
                if !content.ends_with('\n') {
                    println!();
                }
            }
        }
        Ok(())
    }

    fn error_message(&mut self, message: &str) {
        let title = format!("{} Error", emoji("error", &self.style));
        eprintln!(
            "{}",
            box_header(
                title.trim(),
                Some(color(Role::Error, message, &self.style)),
                &self.style
            )
        );
    }

    fn show_output_panel(&mut self, message: &str) {
        let title = format!("{} Output", emoji("panel", &self.style));
        eprintln!("{}", box_header(title.trim(), None::<&str>, &self.style));
        eprintln!("{message}");
    }
}

/* -------------------------------------------------------------------------- */
/* Runner                                                                      */
/* -------------------------------------------------------------------------- */

/// Runs fire-and-forget commands in the foreground of the terminal: output
/// goes straight to the terminal and the call returns once the child exits.
#[derive(Debug, Default)]
pub struct WaitingRunner {
    pub last_status: Option<ExitStatus>,
}

impl AsyncRunner for WaitingRunner {
    fn run_async(&mut self, request: AsyncRequest) -> Result<()> {
        let mut cmd = request.std_command()?;
        cmd.stdin(Stdio::null());
        log_info!("running in {}: {}", request.working_dir.display(), request.command);

        let started = Instant::now();
        let status = cmd
            .status()
            .with_context(|| format!("failed to run `{}`", request.command))?;

        let style = StyleOptions::detect();
        let elapsed = started.elapsed().as_millis();
        let summary = match status.code() {
            Some(0) => color(Role::Success, format!("[Finished in {elapsed} ms]"), &style),
            Some(code) => color(
                Role::Error,
                format!("[Finished in {elapsed} ms with exit code {code}]"),
                &style,
            ),
            None => color(Role::Error, format!("[Terminated after {elapsed} ms]"), &style),
        };
        eprintln!("{summary}");
        self.last_status = Some(status);
        // `request.stdin_file` is dropped here, after the child is done.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selections_are_validated_and_sorted() {
        let doc = TextDocument::new("héllo")
            .with_selections(vec![Region::new(3, 6), Region::new(0, 1)])
            .unwrap();
        assert_eq!(doc.selections(), vec![Region::new(0, 1), Region::new(3, 6)]);

        assert!(TextDocument::new("abc").with_selections(vec![Region::new(1, 9)]).is_err());
        assert!(TextDocument::new("héllo").with_selections(vec![Region::new(0, 2)]).is_err());
    }

    #[test]
    fn overlapping_selections_merge() {
        let doc = TextDocument::new("abcdefgh")
            .with_selections(vec![
                Region::new(2, 6),
                Region::new(0, 4),
                Region::new(3, 3),
                Region::new(6, 8),
                Region::new(7, 7),
                Region::new(7, 7),
            ])
            .unwrap();
        assert_eq!(doc.selections(), vec![Region::new(0, 6), Region::new(6, 8)]);
    }

    #[test]
    fn replace_moves_later_selections() {
        let mut doc = TextDocument::new("aa bb cc")
            .with_selections(vec![Region::new(0, 2), Region::new(6, 8)])
            .unwrap();
        doc.replace(Region::new(0, 2), "xxxx");
        assert_eq!(doc.text(), "xxxx bb cc");
        assert_eq!(doc.selections(), vec![Region::new(0, 4), Region::new(8, 10)]);
        assert_eq!(doc.substr(Region::new(8, 10)), "cc");
        assert!(doc.is_dirty());
    }

    #[test]
    fn save_writes_only_when_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "one").unwrap();

        let mut doc = TextDocument::open(&path).unwrap();
        std::fs::write(&path, "changed on disk").unwrap();
        doc.save().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "changed on disk");

        doc.replace(Region::new(0, 3), "two");
        doc.save().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "two");
        assert!(!doc.is_dirty());
    }

    #[test]
    fn new_documents_go_to_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = TerminalWorkspace::new(None, Some(dir.path().to_path_buf()));
        ws.new_document("sort -u | uniq", "a\n").unwrap();
        ws.new_document("sort -u | uniq", "b\n").unwrap();

        let created = ws.created().to_vec();
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].file_name().unwrap(), "sort_-u___uniq.txt");
        assert_eq!(created[1].file_name().unwrap(), "sort_-u___uniq-1.txt");
        assert_eq!(std::fs::read_to_string(&created[1]).unwrap(), "b\n");
    }

    #[test]
    fn document_names() {
        assert_eq!(document_file_name("wc -l"), "wc_-l.txt");
        assert_eq!(document_file_name("   "), "untitled.txt");
    }

    #[cfg(unix)]
    #[test]
    fn waiting_runner_records_status() {
        let mut runner = WaitingRunner::default();
        runner
            .run_async(AsyncRequest {
                command: "exit 4".into(),
                shell: true,
                working_dir: std::env::temp_dir(),
                options: serde_json::Map::new(),
                stdin_file: None,
            })
            .unwrap();
        assert_eq!(runner.last_status.and_then(|s| s.code()), Some(4));
    }

    #[cfg(unix)]
    #[test]
    fn waiting_runner_applies_env() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = serde_json::Map::new();
        options.insert("env".into(), serde_json::json!({"SHELLPIPE_T": "v1"}));
        let mut runner = WaitingRunner::default();
        runner
            .run_async(AsyncRequest {
                command: "printf %s \"$SHELLPIPE_T\" > out.txt".into(),
                shell: true,
                working_dir: dir.path().to_path_buf(),
                options,
                stdin_file: None,
            })
            .unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("out.txt")).unwrap(), "v1");
    }
}
