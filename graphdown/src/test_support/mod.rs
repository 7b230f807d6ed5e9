// Helpers for building in-memory datasets in tests

use crate::snapshot::Snapshot;

pub const MANIFEST_PATH: &str = "datasets/main.md";

/// Render a record file. `fields` is a YAML flow mapping such as `{name: A}`.
pub fn record_md(id: &str, type_id: &str, fields: &str, body: &str) -> String {
    format!(
        "---\nid: {id}\ntypeId: {type_id}\ncreatedAt: 2024-01-01T00:00:00Z\nupdatedAt: 2024-01-02T00:00:00Z\nfields: {fields}\n---\n{body}"
    )
}

/// Render a type record whose `fields` are `{recordTypeId: <id>, <extra>}`.
pub fn type_md(record_type_id: &str, extra: &str) -> String {
    let fields = if extra.is_empty() {
        format!("{{recordTypeId: {record_type_id}}}")
    } else {
        format!("{{recordTypeId: {record_type_id}, {extra}}}")
    };
    record_md(&format!("type:{record_type_id}"), "sys:type", &fields, "")
}

pub fn manifest_md() -> String {
    record_md(
        "dataset:demo",
        "sys:dataset",
        "{name: Demo, description: A demo dataset}",
        "# Demo",
    )
}

/// Fluent builder over a [`Snapshot`].
pub struct DatasetBuilder {
    snapshot: Snapshot,
}

impl DatasetBuilder {
    /// A dataset with a manifest and empty `types/` and `records/` roots.
    pub fn new() -> Self {
        let mut snapshot = Snapshot::new();
        snapshot.insert(MANIFEST_PATH, manifest_md());
        snapshot.insert_dir("types");
        snapshot.insert_dir("records");
        DatasetBuilder { snapshot }
    }

    pub fn type_def(mut self, record_type_id: &str, extra: &str) -> Self {
        self.snapshot.insert(
            &format!("types/{record_type_id}.md"),
            type_md(record_type_id, extra),
        );
        self
    }

    /// Add a data record at `records/<record_type_id>/<file>.md`.
    pub fn record(mut self, record_type_id: &str, file: &str, id: &str, fields: &str, body: &str) -> Self {
        self.snapshot.insert(
            &format!("records/{record_type_id}/{file}.md"),
            record_md(id, record_type_id, fields, body),
        );
        self
    }

    pub fn file(mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.snapshot.insert(path, bytes);
        self
    }

    pub fn without(mut self, path: &str) -> Self {
        self.snapshot.remove(path);
        self
    }

    pub fn build(self) -> Snapshot {
        self.snapshot
    }
}

/// The car / engine / chassis dataset with a satisfied composition.
pub fn car_dataset() -> DatasetBuilder {
    DatasetBuilder::new()
        .type_def(
            "car",
            "composition: {engine: {recordTypeId: engine, min: 1, max: 1}, chassis: {recordTypeId: chassis, min: 1}}",
        )
        .type_def("engine", "")
        .type_def("chassis", "")
        .record("engine", "1", "engine:1", "{}", "V8")
        .record("chassis", "1", "chassis:1", "{}", "Steel")
        .record("car", "1", "car:1", "{}", "Uses [[engine:1]] on [[chassis:1]].")
}
