//! gdhash-v1: a canonical SHA-256 digest over record files.
//!
//! Records are decoded as UTF-8, line endings are normalized to `\n`, and
//! the records are sorted by id before hashing. Stored bytes are never
//! modified; normalization only affects what is fed to the digest.

use serde_yaml::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::document::{self, FrontMatterError};
use crate::error::{GraphdownError, Result};
use crate::record::{parse_header, KEY_ID};
use crate::snapshot::{classify_path, RecordLocation, Snapshot};

pub const GDHASH_V1_DOMAIN: &[u8] = b"graphdown:gdhash:v1";

/// Which record files a fingerprint covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintScope {
    /// `types/` only.
    Schema,
    /// `types/` and `records/`.
    Snapshot,
}

impl FingerprintScope {
    fn includes(&self, location: &RecordLocation) -> bool {
        match (self, location) {
            (_, RecordLocation::Type) => true,
            (FingerprintScope::Snapshot, RecordLocation::Data { .. }) => true,
            _ => false,
        }
    }
}

/// Digest of the type records: changes only when the schema does.
pub fn compute_schema_fingerprint(snapshot: &Snapshot) -> Result<String> {
    compute_fingerprint(snapshot, FingerprintScope::Schema)
}

/// Digest of type and data records.
pub fn compute_snapshot_fingerprint(snapshot: &Snapshot) -> Result<String> {
    compute_fingerprint(snapshot, FingerprintScope::Snapshot)
}

pub fn compute_fingerprint(snapshot: &Snapshot, scope: FingerprintScope) -> Result<String> {
    // id -> (path, normalized content); BTreeMap gives byte-wise id order
    let mut by_id: BTreeMap<String, (&str, String)> = BTreeMap::new();

    for (path, bytes) in snapshot.iter() {
        let included = classify_path(path).is_some_and(|loc| scope.includes(&loc));
        if !included {
            continue;
        }

        let text = std::str::from_utf8(bytes).map_err(|_| GraphdownError::FrontMatter {
            path: path.to_string(),
            source: FrontMatterError::InvalidUtf8,
        })?;
        let normalized = normalize_line_endings(text);
        let id = record_id(path, &normalized)?;

        if let Some((first, _)) = by_id.get(&id) {
            return Err(GraphdownError::DuplicateId {
                id,
                first: first.to_string(),
                second: path.to_string(),
            });
        }
        by_id.insert(id, (path, normalized));
    }

    let mut hasher = Sha256::new();
    hasher.update(GDHASH_V1_DOMAIN);
    hasher.update([0u8]);
    for (id, (_, content)) in &by_id {
        hasher.update(id.as_bytes());
        hasher.update([0u8]);
        hasher.update(content.len().to_string().as_bytes());
        hasher.update([0u8]);
        hasher.update(content.as_bytes());
        hasher.update([0u8]);
    }

    log::debug!("gdhash-v1 over {} records ({scope:?})", by_id.len());
    Ok(hex::encode(hasher.finalize()))
}

/// Replace `\r\n` and lone `\r` with `\n`.
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

fn record_id(path: &str, text: &str) -> Result<String> {
    let front_matter = document::split_front_matter(text).map_err(|source| {
        GraphdownError::FrontMatter {
            path: path.to_string(),
            source,
        }
    })?;
    let header = parse_header(&front_matter.yaml).map_err(GraphdownError::Other)?;

    match header.get(KEY_ID) {
        Some(Value::String(id)) if !id.trim().is_empty() => Ok(id.trim().to_string()),
        _ => Err(GraphdownError::MissingId {
            path: path.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{car_dataset, record_md};

    fn expected_digest(records: &[(&str, &str)]) -> String {
        let mut stream = Vec::new();
        stream.extend_from_slice(b"graphdown:gdhash:v1\0");
        for (id, content) in records {
            stream.extend_from_slice(id.as_bytes());
            stream.push(0);
            stream.extend_from_slice(content.len().to_string().as_bytes());
            stream.push(0);
            stream.extend_from_slice(content.as_bytes());
            stream.push(0);
        }
        hex::encode(Sha256::digest(&stream))
    }

    #[test]
    fn test_byte_stream_layout() {
        let b = record_md("b", "note", "{}", "second");
        let a = record_md("a", "note", "{}", "first");
        let snapshot = Snapshot::from_files([
            ("records/note/z.md", b.as_str()),
            ("records/note/y.md", a.as_str()),
            ("types/note.md", "---\nid: type:note\n---\n"),
        ]);

        let digest = compute_snapshot_fingerprint(&snapshot).unwrap();
        assert_eq!(
            digest,
            expected_digest(&[
                ("a", a.as_str()),
                ("b", b.as_str()),
                ("type:note", "---\nid: type:note\n---\n"),
            ])
        );
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_empty_selection_hashes_domain_only() {
        let digest = compute_schema_fingerprint(&Snapshot::new()).unwrap();
        assert_eq!(digest, expected_digest(&[]));
    }

    #[test]
    fn test_line_endings_do_not_matter() {
        let lf = car_dataset().build();
        let mut crlf = Snapshot::new();
        for (path, bytes) in lf.iter() {
            let text = String::from_utf8(bytes.to_vec()).unwrap();
            crlf.insert(path, text.replace('\n', "\r\n"));
        }
        let mut cr = Snapshot::new();
        for (path, bytes) in lf.iter() {
            let text = String::from_utf8(bytes.to_vec()).unwrap();
            cr.insert(path, text.replace('\n', "\r"));
        }

        let expected = compute_snapshot_fingerprint(&lf).unwrap();
        assert_eq!(compute_snapshot_fingerprint(&crlf).unwrap(), expected);
        assert_eq!(compute_snapshot_fingerprint(&cr).unwrap(), expected);
    }

    #[test]
    fn test_file_paths_do_not_matter() {
        let a = car_dataset().build();
        let mut moved = Snapshot::new();
        for (path, bytes) in a.iter() {
            moved.insert(&path.replace("/1.md", "/renamed/one.md"), bytes);
        }
        assert_eq!(
            compute_snapshot_fingerprint(&a).unwrap(),
            compute_snapshot_fingerprint(&moved).unwrap()
        );
    }

    #[test]
    fn test_schema_vs_snapshot_fingerprints() {
        let before = car_dataset().build();
        let after = car_dataset()
            .record("engine", "1", "engine:1", "{}", "V12")
            .build();

        assert_eq!(
            compute_schema_fingerprint(&before).unwrap(),
            compute_schema_fingerprint(&after).unwrap()
        );
        assert_ne!(
            compute_snapshot_fingerprint(&before).unwrap(),
            compute_snapshot_fingerprint(&after).unwrap()
        );
    }

    #[test]
    fn test_non_record_files_are_ignored() {
        let base = car_dataset().build();
        let extra = car_dataset()
            .file("assets/logo.png", vec![0u8, 1, 2])
            .file("README.md", "# Readme")
            .file("datasets/main.md", "---\nid: dataset:other\n---\n")
            .build();
        assert_eq!(
            compute_snapshot_fingerprint(&base).unwrap(),
            compute_snapshot_fingerprint(&extra).unwrap()
        );
    }

    #[test]
    fn test_duplicate_ids_fail() {
        let snapshot = car_dataset()
            .record("engine", "2", "engine:1", "{}", "")
            .build();
        let err = compute_snapshot_fingerprint(&snapshot).unwrap_err();
        assert!(matches!(err, GraphdownError::DuplicateId { ref id, .. } if id == "engine:1"));
    }

    #[test]
    fn test_parse_failures_fail() {
        let snapshot = car_dataset().file("records/car/2.md", "no header").build();
        assert!(matches!(
            compute_snapshot_fingerprint(&snapshot),
            Err(GraphdownError::FrontMatter { .. })
        ));

        let snapshot = car_dataset().file("types/x.md", vec![b'-', b'-', b'-', 0xff]).build();
        assert!(matches!(
            compute_schema_fingerprint(&snapshot),
            Err(GraphdownError::FrontMatter { source: FrontMatterError::InvalidUtf8, .. })
        ));

        let snapshot = car_dataset().file("types/x.md", "---\nname: x\n---\n").build();
        assert!(matches!(
            compute_schema_fingerprint(&snapshot),
            Err(GraphdownError::MissingId { .. })
        ));
    }
}
