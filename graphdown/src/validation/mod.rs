use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use crate::error::{ErrorCode, Result, ValidationError};
use crate::graph::{duplicate_id_errors, type_id_mismatch};
use crate::record::{parse_record_files, LocatedRecord, Record, RecordKind};
use crate::schema::{SchemaRegistry, TypeDef};
use crate::snapshot::{RecordLocation, Snapshot, DATASETS_DIR, RECORDS_DIR, TYPES_DIR};

const DATASET_ID_PREFIX: &str = "dataset:";
const DATASET_REQUIRED_FIELDS: [&str; 2] = ["name", "description"];

/// Knobs for a validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    /// Require `datasets/` with exactly one manifest directly inside it.
    pub require_dataset_manifest: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        ValidationOptions {
            require_dataset_manifest: true,
        }
    }
}

/// Outcome of validating a snapshot. `ok` is true iff `errors` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<ValidationError>) -> Self {
        ValidationReport {
            ok: errors.is_empty(),
            errors,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }

    /// Whether any error carries `code`.
    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }
}

/// Validate a dataset snapshot with the default options.
pub fn validate_dataset_snapshot(snapshot: &Snapshot) -> ValidationReport {
    validate_snapshot_with(snapshot, &ValidationOptions::default())
}

/// Load a dataset directory and validate it.
pub fn validate_dataset_dir(path: &Path, options: &ValidationOptions) -> Result<ValidationReport> {
    let snapshot = Snapshot::load_from_dir(path)?;
    Ok(validate_snapshot_with(&snapshot, options))
}

/// Run every check against `snapshot`.
///
/// Missing root directories stop the run. Every other stage runs and adds
/// its errors in a fixed order: manifest placement, per-file parsing,
/// types, directories, ids, required fields, composition.
pub fn validate_snapshot_with(snapshot: &Snapshot, options: &ValidationOptions) -> ValidationReport {
    let mut errors = check_required_dirs(snapshot, options);
    if !errors.is_empty() {
        return ValidationReport::from_errors(errors);
    }

    if options.require_dataset_manifest {
        errors.extend(check_manifest_placement(snapshot));
    }

    let (records, parse_errors) = parse_record_files(snapshot, options.require_dataset_manifest);
    errors.extend(parse_errors);

    for manifest in records.iter().filter(|r| r.kind() == RecordKind::Dataset) {
        errors.extend(check_manifest_record(&manifest.record));
    }

    let (registry, registry_errors) = SchemaRegistry::build(
        records
            .iter()
            .filter(|r| r.kind() == RecordKind::Type)
            .map(|r| &r.record),
    );
    errors.extend(registry_errors);

    errors.extend(check_record_dirs(snapshot, &registry, &records));
    errors.extend(duplicate_id_errors(records.iter().map(|r| &r.record)));
    errors.extend(check_required_fields(&registry, &records));
    errors.extend(registry.composition_errors());
    errors.extend(check_composition_satisfaction(&registry, &records));

    log::debug!("Validation finished with {} errors", errors.len());
    ValidationReport::from_errors(errors)
}

// ── Structure ────────────────────────────────────────────────────────

fn check_required_dirs(snapshot: &Snapshot, options: &ValidationOptions) -> Vec<ValidationError> {
    let mut required = vec![TYPES_DIR, RECORDS_DIR];
    if options.require_dataset_manifest {
        required.insert(0, DATASETS_DIR);
    }

    required
        .into_iter()
        .filter(|dir| !snapshot.has_dir(dir))
        .map(|dir| {
            ValidationError::in_file(
                ErrorCode::DirMissing,
                dir,
                format!("Required directory '{dir}/' is missing"),
            )
        })
        .collect()
}

fn check_manifest_placement(snapshot: &Snapshot) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut direct = Vec::new();

    for (location, path, _) in snapshot.record_files() {
        match location {
            RecordLocation::Dataset => direct.push(path),
            RecordLocation::NestedDataset => errors.push(ValidationError::in_file(
                ErrorCode::DatasetFileLocation,
                path,
                "Dataset manifest must live directly under datasets/",
            )),
            _ => {}
        }
    }

    if direct.len() != 1 {
        errors.push(ValidationError::new(
            ErrorCode::DatasetFileCount,
            format!(
                "Expected exactly one dataset manifest directly under datasets/, found {}{}",
                direct.len(),
                if direct.is_empty() {
                    String::new()
                } else {
                    format!(": {}", direct.join(", "))
                }
            ),
        ));
    }

    errors
}

fn check_manifest_record(record: &Record) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if !record.id.starts_with(DATASET_ID_PREFIX) {
        errors.push(ValidationError::in_file(
            ErrorCode::IdPrefixInvalid,
            &record.path,
            format!("Dataset id '{}' must start with '{DATASET_ID_PREFIX}'", record.id),
        ));
    }

    for field in DATASET_REQUIRED_FIELDS {
        if record.field_str(field).is_none() {
            errors.push(ValidationError::in_file(
                ErrorCode::DatasetFieldsMissing,
                &record.path,
                format!("Dataset manifest requires a non-blank fields.{field}"),
            ));
        }
    }

    errors
}

fn check_record_dirs(
    snapshot: &Snapshot,
    registry: &SchemaRegistry,
    records: &[LocatedRecord],
) -> Vec<ValidationError> {
    let mut errors: Vec<ValidationError> = snapshot
        .record_type_dirs()
        .into_iter()
        .filter(|dir| !registry.contains(dir))
        .map(|dir| {
            ValidationError::in_file(
                ErrorCode::UnknownRecordDir,
                &format!("{RECORDS_DIR}/{dir}"),
                format!("No type declares recordTypeId '{dir}'"),
            )
        })
        .collect();

    for located in records {
        if let RecordLocation::Data { record_type_dir } = &located.location {
            errors.extend(type_id_mismatch(&located.record, record_type_dir));
        }
    }

    errors
}

// ── Fields ───────────────────────────────────────────────────────────

fn check_required_fields(registry: &SchemaRegistry, records: &[LocatedRecord]) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for record in data_records(records) {
        let Some(type_def) = registry.get(&record.type_id) else {
            continue;
        };

        if type_def.has_malformed_field_defs() {
            errors.push(ValidationError::in_file(
                ErrorCode::RequiredFieldMissing,
                &record.path,
                format!(
                    "Type '{}' has fieldDefs that are not a map; its required fields cannot be satisfied",
                    type_def.record_type_id
                ),
            ));
            continue;
        }

        for field in type_def.enforced_fields() {
            if !has_literal_value(record.field(&field.name)) {
                errors.push(ValidationError::in_file(
                    ErrorCode::RequiredFieldMissing,
                    &record.path,
                    format!(
                        "Record '{}' is missing required field '{}'",
                        record.id, field.name
                    ),
                ));
            }
        }
    }

    errors
}

/// Present, non-null and not a blank string. Empty lists and maps count.
fn has_literal_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Tagged(tagged)) => has_literal_value(Some(&tagged.value)),
        Some(_) => true,
    }
}

// ── Composition ──────────────────────────────────────────────────────

fn check_composition_satisfaction(
    registry: &SchemaRegistry,
    records: &[LocatedRecord],
) -> Vec<ValidationError> {
    let mut by_id: HashMap<&str, &Record> = HashMap::new();
    for located in records {
        by_id.entry(located.record.id.as_str()).or_insert(&located.record);
    }

    let mut errors = Vec::new();
    for record in data_records(records) {
        let Some(type_def) = registry.get(&record.type_id) else {
            continue;
        };
        errors.extend(unsatisfied_components(record, type_def, registry, &by_id));
    }
    errors
}

fn unsatisfied_components(
    record: &Record,
    type_def: &TypeDef,
    registry: &SchemaRegistry,
    by_id: &HashMap<&str, &Record>,
) -> Vec<ValidationError> {
    let components: Vec<_> = type_def
        .components()
        .filter(|c| c.record_type_id.as_deref().is_some_and(|id| registry.contains(id)))
        .collect();
    if components.is_empty() {
        return Vec::new();
    }

    let targets: BTreeSet<String> = record.record_refs().into_iter().collect();

    components
        .into_iter()
        .filter_map(|component| {
            let wanted = component.record_type_id.as_deref().unwrap_or_default();
            let count = targets
                .iter()
                .filter(|target| {
                    by_id
                        .get(target.as_str())
                        .is_some_and(|r| r.type_id == wanted)
                })
                .count() as u64;

            if component.accepts(count) {
                return None;
            }

            let expected = match component.max {
                Some(max) if max == component.min => format!("exactly {max}"),
                Some(max) => format!("between {} and {max}", component.min),
                None => format!("at least {}", component.min),
            };
            Some(ValidationError::in_file(
                ErrorCode::CompositionConstraintViolation,
                &record.path,
                format!(
                    "Record '{}' component '{}' needs {expected} distinct link(s) to '{wanted}' records, found {count}",
                    record.id, component.name
                ),
            ))
        })
        .collect()
}

fn data_records(records: &[LocatedRecord]) -> impl Iterator<Item = &Record> {
    records
        .iter()
        .filter(|r| r.kind() == RecordKind::Data)
        .map(|r| &r.record)
}
