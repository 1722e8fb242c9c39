//! Symbol index: where each `name <- function(...)` style definition lives.
//!
//! A single regex scan per file; results accumulate across calls so several
//! directories can feed one index.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

use crate::log_trace;

/// Extension of indexed source files.
pub const SOURCE_EXT: &str = ".r";

fn definition() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([a-zA-Z0-9_]+) *(=|<-|<<-) *(function\(.*?\))")
            .expect("definition regex is valid")
    })
}

/// One definition site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolLocation {
    /// Byte offset of the match start.
    pub offset: usize,
    /// `function(...)` text.
    pub signature: String,
    pub file: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct SymbolIndex {
    symbols: BTreeMap<String, Vec<SymbolLocation>>,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&[SymbolLocation]> {
        self.symbols.get(name).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<SymbolLocation>)> {
        self.symbols.iter()
    }

    /// Record every definition in `text`, attributed to `file`.
    pub fn index_text(&mut self, file: &Path, text: &str) -> usize {
        let mut found = 0;
        for caps in definition().captures_iter(text) {
            let (Some(whole), Some(name), Some(sig)) = (caps.get(0), caps.get(1), caps.get(3))
            else {
                continue;
            };
            self.symbols
                .entry(name.as_str().to_string())
                .or_default()
                .push(SymbolLocation {
                    offset: whole.start(),
                    signature: sig.as_str().to_string(),
                    file: file.to_path_buf(),
                });
            found += 1;
        }
        found
    }

    pub fn index_file(&mut self, file: &Path) -> Result<usize> {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        let found = self.index_text(file, &text);
        log_trace!("indexed {} ({} definitions)", file.display(), found);
        Ok(found)
    }

    /// Index every source file below `dir`. Returns the number of files read.
    pub fn index_dir(&mut self, dir: &Path) -> Result<usize> {
        let files = source_files(dir)?;
        for f in &files {
            self.index_file(f)?;
        }
        Ok(files.len())
    }
}

/// Source files below `dir`, sorted.
pub fn source_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
        if entry.file_type().is_file()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.ends_with(SOURCE_EXT))
        {
            out.push(entry.into_path());
        }
    }
    Ok(out)
}
