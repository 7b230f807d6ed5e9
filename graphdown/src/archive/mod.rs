// Snapshot archiver - deterministic zip export and import

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::error::{GraphdownError, Result};
use crate::links;
use crate::record::Record;
use crate::snapshot::{classify_path, normalize_path, Snapshot};

/// What an export includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportMode {
    /// The three dataset roots plus every blob a record references.
    #[default]
    DatasetOnly,
    /// Every file, byte for byte.
    WholeRepo,
}

pub fn export_snapshot_zip(snapshot: &Snapshot, mode: ExportMode) -> Result<Vec<u8>> {
    match mode {
        ExportMode::DatasetOnly => export_dataset_zip(snapshot),
        ExportMode::WholeRepo => export_whole_repo_zip(snapshot),
    }
}

/// Zip the dataset roots and the blobs reachable from their records.
pub fn export_dataset_zip(snapshot: &Snapshot) -> Result<Vec<u8>> {
    let dataset = snapshot.restrict_to_dataset();
    let blobs = reachable_blobs(snapshot, &dataset);

    let dirs: Vec<&str> = dataset.dirs().collect();
    let mut files: Vec<(&str, &[u8])> = dataset.iter().collect();
    for path in &blobs {
        if let Some(bytes) = snapshot.get(path) {
            files.push((path.as_str(), bytes));
        }
    }
    files.sort_by(|a, b| a.0.cmp(b.0));

    log::debug!(
        "Dataset export: {} files, {} blobs",
        files.len(),
        blobs.len()
    );
    write_zip(&dirs, &files)
}

/// Zip every directory and file of the snapshot verbatim.
pub fn export_whole_repo_zip(snapshot: &Snapshot) -> Result<Vec<u8>> {
    let dirs: Vec<&str> = snapshot.dirs().collect();
    let files: Vec<(&str, &[u8])> = snapshot.iter().collect();
    write_zip(&dirs, &files)
}

/// Blob paths referenced by any record in `dataset` that exist in `snapshot`.
///
/// Records that do not parse are still scanned as raw text so a broken
/// header never drops the blobs its body points at.
fn reachable_blobs(snapshot: &Snapshot, dataset: &Snapshot) -> BTreeSet<String> {
    let mut reachable = BTreeSet::new();

    for (path, bytes) in dataset.iter() {
        if classify_path(path).is_none() {
            continue;
        }
        let digests = match Record::parse(path, bytes) {
            Ok(record) => record.blob_refs(),
            Err(_) => links::extract_blob_refs(&String::from_utf8_lossy(bytes)),
        };
        for digest in digests {
            let blob = links::blob_path(&digest);
            if snapshot.contains(&blob) {
                reachable.insert(blob);
            } else {
                log::warn!("{path} references missing blob {blob}");
            }
        }
    }

    reachable
}

fn write_zip(dirs: &[&str], files: &[(&str, &[u8])]) -> Result<Vec<u8>> {
    // Fixed timestamps keep the archive bytes a pure function of the snapshot
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for dir in dirs {
        writer.add_directory(format!("{dir}/"), options)?;
    }
    for (path, bytes) in files {
        writer.start_file(*path, options)?;
        writer.write_all(bytes)?;
    }

    Ok(writer.finish()?.into_inner())
}

// ── Import ───────────────────────────────────────────────────────────

pub fn load_repo_snapshot_from_zip_file(path: &Path) -> Result<Snapshot> {
    let bytes = std::fs::read(path)?;
    load_repo_snapshot_from_zip_bytes(&bytes)
}

/// Decode a zip produced by either export mode (or any other zip).
pub fn load_repo_snapshot_from_zip_bytes(bytes: &[u8]) -> Result<Snapshot> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut snapshot = Snapshot::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry_path(entry.name())?;
        if name.is_empty() {
            continue;
        }

        if entry.is_dir() {
            snapshot.insert_dir(&name);
        } else {
            // The header size is untrusted; let the buffer grow with the data
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents)?;
            snapshot.insert(&name, contents);
        }
    }

    log::debug!("Imported {} files from zip", snapshot.len());
    Ok(snapshot)
}

/// Normalize an entry name, refusing anything that would escape the root.
fn entry_path(raw: &str) -> Result<String> {
    let unified = raw.replace('\\', "/");
    let absolute = unified.starts_with('/') || unified.split('/').next().is_some_and(|s| s.ends_with(':'));
    if absolute || unified.split('/').any(|segment| segment == "..") {
        return Err(GraphdownError::InvalidArchivePath(raw.to_string()));
    }
    Ok(normalize_path(&unified))
}
