pub mod error;
pub mod document;
pub mod record;
pub mod links;
pub mod schema;
pub mod snapshot;
pub mod graph;
pub mod validation;
pub mod hash;
pub mod archive;
pub mod github;

#[cfg(test)]
mod test_support;

pub use archive::{
    export_dataset_zip, export_snapshot_zip, export_whole_repo_zip,
    load_repo_snapshot_from_zip_bytes, load_repo_snapshot_from_zip_file, ExportMode,
};
pub use error::{ErrorCode, GraphdownError, Result, ValidationError};
pub use graph::{build_graph, Graph};
pub use hash::{compute_schema_fingerprint, compute_snapshot_fingerprint};
pub use record::Record;
pub use schema::{SchemaRegistry, TypeDef};
pub use snapshot::Snapshot;
pub use validation::{validate_dataset_snapshot, ValidationOptions, ValidationReport};
