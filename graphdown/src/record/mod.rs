// Record model - a parsed markdown file with reserved front matter keys

use serde_yaml::{Mapping, Value};

use crate::document::{self, FrontMatterError};
use crate::error::{ErrorCode, ValidationError};
use crate::links;
use crate::snapshot::{RecordLocation, Snapshot};

pub const KEY_ID: &str = "id";
pub const KEY_TYPE_ID: &str = "typeId";
pub const KEY_CREATED_AT: &str = "createdAt";
pub const KEY_UPDATED_AT: &str = "updatedAt";
pub const KEY_FIELDS: &str = "fields";

const RESERVED_STRING_KEYS: [&str; 4] = [KEY_ID, KEY_TYPE_ID, KEY_CREATED_AT, KEY_UPDATED_AT];

/// Where in the repository layout a record lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Dataset,
    Type,
    Data,
}

/// A parsed record. `fields` holds arbitrary YAML; unknown top-level keys
/// are kept in `extra` untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub path: String,
    pub id: String,
    pub type_id: String,
    pub created_at: String,
    pub updated_at: String,
    pub fields: Mapping,
    pub extra: Mapping,
    pub body: String,
}

impl Record {
    /// Parse a record file, reporting every problem with its reserved keys.
    ///
    /// Front matter and YAML failures stop at the first error since nothing
    /// past them can be read.
    pub fn parse(path: &str, bytes: &[u8]) -> Result<Record, Vec<ValidationError>> {
        let front_matter = document::parse_front_matter(bytes).map_err(|e| {
            let message = match e {
                FrontMatterError::InvalidUtf8 => "File is not valid UTF-8".to_string(),
                other => format!("Front matter is missing or malformed: {other}"),
            };
            vec![ValidationError::in_file(
                ErrorCode::FrontMatterMissing,
                path,
                message,
            )]
        })?;

        let header = parse_header(&front_matter.yaml).map_err(|message| {
            vec![ValidationError::in_file(ErrorCode::YamlInvalid, path, message)]
        })?;

        Self::from_header(path, header, front_matter.body)
    }

    fn from_header(
        path: &str,
        mut header: Mapping,
        body: String,
    ) -> Result<Record, Vec<ValidationError>> {
        let mut errors = Vec::new();
        let mut strings = Vec::with_capacity(RESERVED_STRING_KEYS.len());

        for key in RESERVED_STRING_KEYS {
            match header.remove(key) {
                Some(Value::String(s)) if !s.trim().is_empty() => strings.push(s.trim().to_string()),
                Some(_) => errors.push(ValidationError::in_file(
                    ErrorCode::RequiredFieldMissing,
                    path,
                    format!("Top-level '{key}' must be a non-empty string"),
                )),
                None => errors.push(ValidationError::in_file(
                    ErrorCode::RequiredFieldMissing,
                    path,
                    format!("Missing required top-level '{key}'"),
                )),
            }
        }

        let fields = match header.remove(KEY_FIELDS) {
            Some(Value::Mapping(m)) => Some(m),
            Some(_) => {
                errors.push(ValidationError::in_file(
                    ErrorCode::RequiredFieldMissing,
                    path,
                    "Top-level 'fields' must be an object",
                ));
                None
            }
            None => {
                errors.push(ValidationError::in_file(
                    ErrorCode::RequiredFieldMissing,
                    path,
                    "Missing required top-level 'fields'",
                ));
                None
            }
        };

        match (fields, <[String; 4]>::try_from(strings)) {
            (Some(fields), Ok([id, type_id, created_at, updated_at])) if errors.is_empty() => {
                Ok(Record {
                    path: path.to_string(),
                    id,
                    type_id,
                    created_at,
                    updated_at,
                    fields,
                    extra: header,
                    body,
                })
            }
            _ => Err(errors),
        }
    }

    /// Look up a value under `fields`.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// A field value as a trimmed, non-blank string.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.field(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// The body followed by every string found anywhere under `fields`.
    pub fn text_segments(&self) -> Vec<&str> {
        let mut segments = vec![self.body.as_str()];
        for value in self.fields.values() {
            links::collect_strings(value, &mut segments);
        }
        segments
    }

    /// Record-ref targets in body and fields, in order, duplicates kept.
    pub fn record_refs(&self) -> Vec<String> {
        self.text_segments()
            .into_iter()
            .flat_map(links::extract_record_refs)
            .collect()
    }

    /// Blob digests referenced from body and fields, in order, duplicates kept.
    pub fn blob_refs(&self) -> Vec<String> {
        self.text_segments()
            .into_iter()
            .flat_map(links::extract_blob_refs)
            .collect()
    }
}

/// A parsed record together with where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedRecord {
    pub location: RecordLocation,
    pub record: Record,
}

impl LocatedRecord {
    pub fn kind(&self) -> RecordKind {
        match self.location {
            RecordLocation::Dataset | RecordLocation::NestedDataset => RecordKind::Dataset,
            RecordLocation::Type => RecordKind::Type,
            RecordLocation::Data { .. } => RecordKind::Data,
        }
    }
}

/// Parse every record file of a snapshot in discovery order. Nested dataset
/// manifests are not records and are always skipped; direct manifests only
/// when `include_datasets` is set. Files that fail to parse contribute
/// errors instead of records.
pub fn parse_record_files(
    snapshot: &Snapshot,
    include_datasets: bool,
) -> (Vec<LocatedRecord>, Vec<ValidationError>) {
    let mut records = Vec::new();
    let mut errors = Vec::new();

    for (location, path, bytes) in snapshot.record_files() {
        let skip = match location {
            RecordLocation::NestedDataset => true,
            RecordLocation::Dataset => !include_datasets,
            _ => false,
        };
        if skip {
            continue;
        }
        match Record::parse(path, bytes) {
            Ok(record) => records.push(LocatedRecord { location, record }),
            Err(mut e) => errors.append(&mut e),
        }
    }

    log::debug!(
        "Parsed {} record files ({} errors)",
        records.len(),
        errors.len()
    );
    (records, errors)
}

/// Parse a front matter block that must be a YAML mapping.
pub fn parse_header(yaml: &str) -> Result<Mapping, String> {
    match serde_yaml::from_str::<Value>(yaml) {
        Ok(Value::Mapping(m)) => Ok(m),
        Ok(Value::Tagged(tagged)) => match tagged.value {
            Value::Mapping(m) => Ok(m),
            _ => Err("Front matter must be a YAML object".into()),
        },
        Ok(_) => Err("Front matter must be a YAML object".into()),
        Err(e) => Err(format!("Front matter is not valid YAML: {e}")),
    }
}
