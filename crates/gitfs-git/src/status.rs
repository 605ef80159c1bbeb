//! Status report parsing and the cached change set
//!
//! The tracker reads git's comment-prefixed long status format. Only lines
//! starting with `#\t` carry file entries:
//!
//! ```text
//! # Changes to be committed:
//! #	new file:   notes.txt
//! #	renamed:    a.txt -> b.txt
//! # Untracked files:
//! #	scratch.txt
//! ```
//!
//! Anything after the prefix that is not a recognized `category: path` pair
//! is kept as an untracked entry, verbatim after trimming. The format cannot
//! tell an untracked file named `modified:notes.txt` from a modified
//! `notes.txt`; such names are classified by their label.
//!
//! Names containing `"`, `\` or control characters are C-quoted by git even
//! with `core.quotePath=false`. Entries keep that quoted text;
//! [`unquote_path`] recovers the file name.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{RepoCommands, RepositoryState};

/// Prefix of an annotated status entry line.
const ENTRY_PREFIX: &str = "#\t";

/// Change category of a status entry.
///
/// Variant order is the order in which staged categories are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FileStatusCategory {
    Renamed,
    Modified,
    New,
    Untracked,
}

impl FileStatusCategory {
    /// Map a label printed by `git status` onto a category.
    ///
    /// Untracked entries carry no label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "renamed" => Some(Self::Renamed),
            "modified" => Some(Self::Modified),
            "new file" => Some(Self::New),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Renamed => "renamed",
            Self::Modified => "modified",
            Self::New => "new",
            Self::Untracked => "untracked",
        }
    }
}

impl std::fmt::Display for FileStatusCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Paths grouped by category, each group in report order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    entries: BTreeMap<FileStatusCategory, Vec<String>>,
}

impl StatusSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, category: FileStatusCategory, path: impl Into<String>) {
        self.entries.entry(category).or_default().push(path.into());
    }

    pub fn paths(&self, category: FileStatusCategory) -> &[String] {
        self.entries.get(&category).map(Vec::as_slice).unwrap_or_default()
    }

    /// Renamed, then modified, then new paths.
    pub fn staged(&self) -> Vec<String> {
        [
            FileStatusCategory::Renamed,
            FileStatusCategory::Modified,
            FileStatusCategory::New,
        ]
        .into_iter()
        .flat_map(|category| self.paths(category).iter().cloned())
        .collect()
    }

    pub fn unstaged(&self) -> Vec<String> {
        self.paths(FileStatusCategory::Untracked).to_vec()
    }

    /// Total number of entries across all categories.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (FileStatusCategory, &str)> {
        self.entries
            .iter()
            .flat_map(|(category, paths)| paths.iter().map(move |p| (*category, p.as_str())))
    }
}

/// Parse a full status report into a snapshot.
pub fn parse_status_report(report: &str) -> StatusSnapshot {
    let mut snapshot = StatusSnapshot::new();
    for line in report.lines() {
        if let Some((category, path)) = parse_status_line(line) {
            snapshot.push(category, path);
        }
    }
    snapshot
}

/// Parse one report line; `None` for lines that carry no file entry.
pub fn parse_status_line(line: &str) -> Option<(FileStatusCategory, String)> {
    let remainder = line.trim().strip_prefix(ENTRY_PREFIX)?;
    let remainder = remainder.trim();
    if remainder.is_empty() {
        return None;
    }

    let tokens: Vec<&str> = remainder.split(':').map(str::trim).collect();
    if let [label, path] = tokens.as_slice()
        && !path.is_empty()
        && let Some(category) = FileStatusCategory::from_label(label)
    {
        return Some((category, (*path).to_string()));
    }

    Some((FileStatusCategory::Untracked, remainder.to_string()))
}

/// Undo git's C-style quoting of a status path.
///
/// Text that is not a double-quoted string is returned unchanged.
pub fn unquote_path(raw: &str) -> Cow<'_, str> {
    let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return Cow::Borrowed(raw);
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut input = inner.bytes().peekable();
    while let Some(byte) = input.next() {
        if byte != b'\\' {
            bytes.push(byte);
            continue;
        }
        match input.next() {
            Some(b'a') => bytes.push(0x07),
            Some(b'b') => bytes.push(0x08),
            Some(b't') => bytes.push(b'\t'),
            Some(b'n') => bytes.push(b'\n'),
            Some(b'v') => bytes.push(0x0b),
            Some(b'f') => bytes.push(0x0c),
            Some(b'r') => bytes.push(b'\r'),
            Some(first @ b'0'..=b'3') => {
                let mut value = first - b'0';
                for _ in 0..2 {
                    match input.peek().copied() {
                        Some(digit @ b'0'..=b'7') => {
                            value = value * 8 + (digit - b'0');
                            input.next();
                        }
                        _ => break,
                    }
                }
                bytes.push(value);
            }
            // `\"` and `\\`
            Some(other) => bytes.push(other),
            None => bytes.push(b'\\'),
        }
    }
    Cow::Owned(String::from_utf8_lossy(&bytes).into_owned())
}

/// Cached view of the working tree's change set.
///
/// Every query refreshes from a new status report first, so answers are never
/// older than the call itself. A status command that fails yields an empty
/// snapshot, which reads as "nothing to sync".
pub struct StatusTracker {
    commands: Arc<dyn RepoCommands>,
    snapshot: StatusSnapshot,
}

impl StatusTracker {
    pub fn new(commands: Arc<dyn RepoCommands>) -> Self {
        Self {
            commands,
            snapshot: StatusSnapshot::new(),
        }
    }

    pub fn refresh(&mut self, repo: &RepositoryState) -> &StatusSnapshot {
        self.snapshot.clear();
        match self.commands.status(repo) {
            Ok(report) => self.snapshot = parse_status_report(&report),
            Err(e) => {
                tracing::warn!(repo = %repo.root(), error = %e, "status query failed; treating tree as clean");
            }
        }
        tracing::debug!(entries = self.snapshot.len(), "refreshed status");
        &self.snapshot
    }

    pub fn staged_files(&mut self, repo: &RepositoryState) -> Vec<String> {
        self.refresh(repo).staged()
    }

    pub fn unstaged_files(&mut self, repo: &RepositoryState) -> Vec<String> {
        self.refresh(repo).unstaged()
    }

    pub fn clear(&mut self) {
        self.snapshot.clear();
    }
}
