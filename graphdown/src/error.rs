use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

use crate::document::FrontMatterError;

/// Failures that abort a single operation (hashing, archiving, loading).
/// Validation problems are never reported through this type; see [`ValidationError`].
#[derive(Error, Debug)]
pub enum GraphdownError {
    #[error("Front matter error in {path}: {source}")]
    FrontMatter {
        path: String,
        #[source]
        source: FrontMatterError,
    },

    #[error("Record {path} has no usable id")]
    MissingId { path: String },

    #[error("Duplicate id '{id}' in {first} and {second}")]
    DuplicateId {
        id: String,
        first: String,
        second: String,
    },

    #[error("Invalid archive entry path: {0}")]
    InvalidArchivePath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, GraphdownError>;

/// Stable identifiers for validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorCode {
    DirMissing,
    DatasetFileLocation,
    DatasetFileCount,
    FrontMatterMissing,
    YamlInvalid,
    IdPrefixInvalid,
    DatasetFieldsMissing,
    RecordTypeIdInvalid,
    UnknownRecordDir,
    TypeIdMismatch,
    DuplicateId,
    RequiredFieldMissing,
    CompositionSchemaInvalid,
    CompositionUnknownType,
    CompositionConstraintViolation,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DirMissing => "E_DIR_MISSING",
            ErrorCode::DatasetFileLocation => "E_DATASET_FILE_LOCATION",
            ErrorCode::DatasetFileCount => "E_DATASET_FILE_COUNT",
            ErrorCode::FrontMatterMissing => "E_FRONT_MATTER_MISSING",
            ErrorCode::YamlInvalid => "E_YAML_INVALID",
            ErrorCode::IdPrefixInvalid => "E_ID_PREFIX_INVALID",
            ErrorCode::DatasetFieldsMissing => "E_DATASET_FIELDS_MISSING",
            ErrorCode::RecordTypeIdInvalid => "E_RECORD_TYPE_ID_INVALID",
            ErrorCode::UnknownRecordDir => "E_UNKNOWN_RECORD_DIR",
            ErrorCode::TypeIdMismatch => "E_TYPEID_MISMATCH",
            ErrorCode::DuplicateId => "E_DUPLICATE_ID",
            ErrorCode::RequiredFieldMissing => "E_REQUIRED_FIELD_MISSING",
            ErrorCode::CompositionSchemaInvalid => "E_COMPOSITION_SCHEMA_INVALID",
            ErrorCode::CompositionUnknownType => "E_COMPOSITION_UNKNOWN_TYPE",
            ErrorCode::CompositionConstraintViolation => "E_COMPOSITION_CONSTRAINT_VIOLATION",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A single dataset defect. Collected, never thrown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl ValidationError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ValidationError {
            code,
            message: message.into(),
            file: None,
        }
    }

    pub fn in_file(code: ErrorCode, file: &str, message: impl Into<String>) -> Self {
        ValidationError {
            code,
            message: message.into(),
            file: Some(file.to_string()),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{} {}: {}", self.code, file, self.message),
            None => write!(f, "{} {}", self.code, self.message),
        }
    }
}
