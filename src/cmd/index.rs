/*!
`index.rs`

Implements the `index` subcommand: list `name <- function(...)` style
definitions found in `.r` files below a directory.

JSON Output Shape:
{
  "status": "ok",
  "dir": "...",
  "files": 3,
  "count": 2,
  "symbols": {
    "add": [ { "offset": 0, "signature": "function(a, b)", "file": "..." } ]
  }
}
*/

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use super::GlobalOpts;
use super::format::{Role, StyleOptions, box_header, color, emoji, table};
use crate::index::{SymbolIndex, SymbolLocation};
use crate::log_debug;
use crate::session::Session;
use crate::store::FileStore;

/// CLI arguments for `shellpipe index [DIR]`
#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Directory to scan (defaults to the working directory)
    #[arg(value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Output JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Only show this symbol
    #[arg(long, value_name = "NAME")]
    pub symbol: Option<String>,
}

/// Entry point for the index subcommand.
pub fn execute_index(args: IndexArgs, global: &GlobalOpts) -> Result<ExitCode> {
    let dir = match &args.dir {
        Some(d) => global.resolve(d),
        None => global.cwd.clone(),
    };
    // Indexing reads no settings.
    let mut session = Session::new(FileStore::in_memory());
    let files = session
        .symbols_mut()
        .index_dir(&dir)
        .with_context(|| format!("failed to index {}", dir.display()))?;
    log_debug!(
        "indexed {} files under {} ({} symbols)",
        files,
        dir.display(),
        session.symbols().len()
    );

    let rows = collect(session.symbols(), args.symbol.as_deref());

    if args.json {
        let mut symbols = serde_json::Map::new();
        for (name, loc) in &rows {
            let entry = symbols
                .entry(name.to_string())
                .or_insert_with(|| serde_json::Value::Array(Vec::new()));
            if let serde_json::Value::Array(list) = entry {
                list.push(serde_json::to_value(loc)?);
            }
        }
        println!(
            "{}",
            serde_json::json!({
                "status": "ok",
                "dir": dir.display().to_string(),
                "files": files,
                "count": symbols.len(),
                "symbols": symbols,
            })
        );
        return Ok(ExitCode::SUCCESS);
    }

    let style = StyleOptions::detect();
    let names = rows
        .iter()
        .map(|(n, _)| *n)
        .collect::<std::collections::BTreeSet<_>>()
        .len();
    println!(
        "{}",
        box_header(
            format!("{} Symbols ({names})", emoji("info", &style)).trim(),
            Some(format!("{} • {files} files", dir.display())),
            &style
        )
    );
    if session.symbols().is_empty() || rows.is_empty() {
        println!("{}", color(Role::Dim, "(none)", &style));
        return Ok(ExitCode::SUCCESS);
    }

    let table_rows: Vec<Vec<String>> = rows
        .iter()
        .map(|(name, loc)| {
            vec![
                name.to_string(),
                loc.signature.clone(),
                format!("{}:{}", relative(&loc.file, &dir).display(), loc.offset),
            ]
        })
        .collect();
    println!("{}", table(&["NAME", "SIGNATURE", "LOCATION"], &table_rows, &style));
    Ok(ExitCode::SUCCESS)
}

/// Definitions in name order, optionally limited to one name.
fn collect<'a>(index: &'a SymbolIndex, only: Option<&'a str>) -> Vec<(&'a str, &'a SymbolLocation)> {
    match only {
        Some(name) => index
            .get(name)
            .unwrap_or_default()
            .iter()
            .map(|l| (name, l))
            .collect(),
        None => index
            .iter()
            .flat_map(|(name, locs)| locs.iter().map(move |l| (name.as_str(), l)))
            .collect(),
    }
}

fn relative<'a>(file: &'a Path, dir: &Path) -> &'a Path {
    file.strip_prefix(dir).unwrap_or(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_filters_by_name() {
        let mut index = SymbolIndex::new();
        index.index_text(
            Path::new("a.r"),
            "add <- function(a, b) a + b\nsub = function(a, b) a - b\n",
        );
        index.index_text(Path::new("b.r"), "add <- function(x) x\n");

        let all = collect(&index, None);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].0, "add");

        let only = collect(&index, Some("sub"));
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].1.signature, "function(a, b)");
    }

    #[test]
    fn index_command_runs_on_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("m.r"), "f <- function() 1\n").unwrap();
        let global = GlobalOpts::new(Some(dir.path().to_path_buf()), None).unwrap();

        let args = IndexArgs {
            dir: None,
            json: true,
            symbol: None,
        };
        assert_eq!(execute_index(args, &global).unwrap(), ExitCode::SUCCESS);

        let missing = IndexArgs {
            dir: Some("nope".into()),
            json: false,
            symbol: None,
        };
        assert!(execute_index(missing, &global).is_err());
    }

    #[test]
    fn relative_paths_for_display() {
        assert_eq!(relative(Path::new("/a/b/c.r"), Path::new("/a")), Path::new("b/c.r"));
        assert_eq!(relative(Path::new("/x/c.r"), Path::new("/a")), Path::new("/x/c.r"));
    }
}
