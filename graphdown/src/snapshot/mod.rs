// Snapshot - repository-relative path to raw bytes, plus repository layout rules

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::{GraphdownError, Result};

pub const DATASETS_DIR: &str = "datasets";
pub const TYPES_DIR: &str = "types";
pub const RECORDS_DIR: &str = "records";

const RECORD_EXTENSION: &str = ".md";
const SKIPPED_DIRS: [&str; 1] = [".git"];

/// An in-memory copy of a repository. Paths use `/` separators and never
/// start with `/`. Directories are tracked so empty roots survive loading
/// and archiving.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
}

/// Role of a markdown file in the repository layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordLocation {
    /// `datasets/<file>.md`
    Dataset,
    /// `datasets/<dir>/.../<file>.md`, never a valid manifest location.
    NestedDataset,
    /// `types/**/<file>.md`
    Type,
    /// `records/<recordTypeId>/**/<file>.md`
    Data { record_type_dir: String },
}

/// Classify a repository path. Anything that is not a `.md` file under one
/// of the three record roots is not a record file.
pub fn classify_path(path: &str) -> Option<RecordLocation> {
    if !path.ends_with(RECORD_EXTENSION) {
        return None;
    }

    let parts: Vec<&str> = path.split('/').collect();
    match (parts[0], parts.len()) {
        (DATASETS_DIR, 2) => Some(RecordLocation::Dataset),
        (DATASETS_DIR, n) if n > 2 => Some(RecordLocation::NestedDataset),
        (TYPES_DIR, n) if n >= 2 => Some(RecordLocation::Type),
        (RECORDS_DIR, n) if n >= 3 => Some(RecordLocation::Data {
            record_type_dir: parts[1].to_string(),
        }),
        _ => None,
    }
}

/// Normalize a path to the snapshot convention.
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut path = path.as_str();
    while let Some(rest) = path.strip_prefix("./").or_else(|| path.strip_prefix('/')) {
        path = rest;
    }
    path.trim_end_matches('/').to_string()
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from `(path, bytes)` pairs.
    pub fn from_files<I, P, B>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, B)>,
        P: AsRef<str>,
        B: Into<Vec<u8>>,
    {
        let mut snapshot = Self::new();
        for (path, bytes) in files {
            snapshot.insert(path.as_ref(), bytes);
        }
        snapshot
    }

    /// Insert or replace a file. Returns the previous contents.
    pub fn insert(&mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Option<Vec<u8>> {
        self.files.insert(normalize_path(path), bytes.into())
    }

    /// Record a directory, which may be empty.
    pub fn insert_dir(&mut self, path: &str) {
        let path = normalize_path(path);
        if !path.is_empty() {
            self.dirs.insert(path);
        }
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn remove(&mut self, path: &str) -> Option<Vec<u8>> {
        self.files.remove(path)
    }

    /// Files in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files.iter().map(|(p, b)| (p.as_str(), b.as_slice()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Explicitly recorded directories in path order.
    pub fn dirs(&self) -> impl Iterator<Item = &str> {
        self.dirs.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Whether `dir` was recorded or holds at least one file.
    pub fn has_dir(&self, dir: &str) -> bool {
        let prefix = format!("{dir}/");
        self.dirs.contains(dir)
            || self.dirs.iter().any(|d| d.starts_with(&prefix))
            || self.files.keys().any(|p| p.starts_with(&prefix))
    }

    /// Record files in discovery order: dataset manifests, then types, then
    /// data records, each sorted by path.
    pub fn record_files(&self) -> Vec<(RecordLocation, &str, &[u8])> {
        let mut found: Vec<(RecordLocation, &str, &[u8])> = self
            .iter()
            .filter_map(|(path, bytes)| classify_path(path).map(|loc| (loc, path, bytes)))
            .collect();
        found.sort_by_key(|(loc, path, _)| (discovery_rank(loc), *path));
        found
    }

    /// Names of the directories directly under `records/`, whether recorded
    /// explicitly or implied by a file below them. Files sitting directly in
    /// `records/` name no directory.
    pub fn record_type_dirs(&self) -> BTreeSet<&str> {
        let prefix = format!("{RECORDS_DIR}/");
        let from_dirs = self.dirs.iter().filter_map(|d| {
            d.strip_prefix(&prefix)
                .map(|rest| rest.split('/').next().unwrap_or(rest))
        });
        let from_files = self.files.keys().filter_map(|p| {
            p.strip_prefix(&prefix)
                .and_then(|rest| rest.split_once('/'))
                .map(|(dir, _)| dir)
        });
        from_dirs
            .chain(from_files)
            .filter(|dir| !dir.is_empty())
            .collect()
    }

    /// The subset of this snapshot under `datasets/`, `types/` and `records/`.
    pub fn restrict_to_dataset(&self) -> Snapshot {
        let in_roots = |path: &str| {
            [DATASETS_DIR, TYPES_DIR, RECORDS_DIR]
                .iter()
                .any(|root| path == *root || path.starts_with(&format!("{root}/")))
        };
        Snapshot {
            files: self
                .files
                .iter()
                .filter(|(p, _)| in_roots(p))
                .map(|(p, b)| (p.clone(), b.clone()))
                .collect(),
            dirs: self.dirs.iter().filter(|d| in_roots(d)).cloned().collect(),
        }
    }

    // ── Filesystem ───────────────────────────────────────────────────

    /// Load every file and directory below `root`, skipping `.git`.
    pub fn load_from_dir(root: &Path) -> Result<Snapshot> {
        if !root.is_dir() {
            return Err(GraphdownError::Other(format!(
                "Dataset directory does not exist: {}",
                root.display()
            )));
        }

        let pattern = format!(
            "{}/**/*",
            glob::Pattern::escape(&root.to_string_lossy())
        );
        let entries = glob::glob(&pattern)
            .map_err(|e| GraphdownError::Other(format!("Glob error: {e}")))?;

        let mut snapshot = Snapshot::new();
        for entry in entries {
            let path = entry.map_err(|e| GraphdownError::Io(e.into_error()))?;
            let rel = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");

            if rel.split('/').any(|seg| SKIPPED_DIRS.contains(&seg)) {
                continue;
            }

            if path.is_dir() {
                snapshot.insert_dir(&rel);
            } else {
                snapshot.insert(&rel, std::fs::read(&path)?);
            }
        }

        log::debug!(
            "Loaded {} files from {}",
            snapshot.len(),
            root.display()
        );
        Ok(snapshot)
    }

    /// Write every directory and file below `root`, creating it if needed.
    pub fn write_to_dir(&self, root: &Path) -> Result<()> {
        std::fs::create_dir_all(root)?;
        for dir in &self.dirs {
            std::fs::create_dir_all(root.join(dir))?;
        }
        for (path, bytes) in &self.files {
            let target = root.join(path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&target, bytes)?;
        }
        Ok(())
    }
}

fn discovery_rank(location: &RecordLocation) -> u8 {
    match location {
        RecordLocation::Dataset | RecordLocation::NestedDataset => 0,
        RecordLocation::Type => 1,
        RecordLocation::Data { .. } => 2,
    }
}
