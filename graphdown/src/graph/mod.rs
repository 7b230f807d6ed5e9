// Graph builder - typed node index plus wiki-link adjacency over a snapshot

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{ErrorCode, ValidationError};
use crate::record::{parse_record_files, Record, RecordKind};
use crate::schema::{SchemaRegistry, TypeDef};
use crate::snapshot::{RecordLocation, Snapshot};

/// A record registered in the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub record: Record,
    pub kind: RecordKind,
}

/// Read-only relationship graph. Edges are keyed by raw ids, so a link to an
/// id with no node is still an edge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    nodes_by_id: BTreeMap<String, GraphNode>,
    types_by_record_type_id: BTreeMap<String, TypeDef>,
    outgoing: BTreeMap<String, BTreeSet<String>>,
    incoming: BTreeMap<String, BTreeSet<String>>,
}

pub type GraphBuildResult = std::result::Result<Graph, Vec<ValidationError>>;

/// Build the graph for a snapshot of types and data records.
///
/// Parse failures, invalid or duplicate types, id collisions and data
/// records whose `typeId` disagrees with their directory all abort the
/// build; every such error is returned together.
pub fn build_graph(snapshot: &Snapshot) -> GraphBuildResult {
    let (parsed, mut errors) = parse_record_files(snapshot, false);

    let (types, data): (Vec<_>, Vec<_>) = parsed
        .into_iter()
        .partition(|r| r.kind() == RecordKind::Type);

    let (registry, registry_errors) = SchemaRegistry::build(types.iter().map(|r| &r.record));
    errors.extend(registry_errors);

    errors.extend(duplicate_id_errors(
        types.iter().chain(data.iter()).map(|r| &r.record),
    ));

    for located in &data {
        if let RecordLocation::Data { record_type_dir } = &located.location {
            if let Some(e) = type_id_mismatch(&located.record, record_type_dir) {
                errors.push(e);
            }
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let mut graph = Graph {
        types_by_record_type_id: registry.into_iter().collect(),
        ..Graph::default()
    };

    for located in types.into_iter().chain(data) {
        let kind = located.kind();
        graph.add_node(located.record, kind);
    }

    log::debug!(
        "Built graph with {} nodes and {} types",
        graph.nodes_by_id.len(),
        graph.types_by_record_type_id.len()
    );
    Ok(graph)
}

/// One `E_DUPLICATE_ID` per record whose id was already seen.
pub fn duplicate_id_errors<'a, I>(records: I) -> Vec<ValidationError>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut first_seen: HashMap<&str, &str> = HashMap::new();
    let mut errors = Vec::new();

    for record in records {
        match first_seen.get(record.id.as_str()) {
            Some(first) => errors.push(ValidationError::in_file(
                ErrorCode::DuplicateId,
                &record.path,
                format!("Duplicate id '{}' (first declared in {first})", record.id),
            )),
            None => {
                first_seen.insert(&record.id, &record.path);
            }
        }
    }

    errors
}

/// `E_TYPEID_MISMATCH` when a data record's `typeId` differs from its
/// `records/<dir>/` directory.
pub fn type_id_mismatch(record: &Record, record_type_dir: &str) -> Option<ValidationError> {
    (record.type_id != record_type_dir).then(|| {
        ValidationError::in_file(
            ErrorCode::TypeIdMismatch,
            &record.path,
            format!(
                "Record '{}' has typeId '{}' but lives under records/{record_type_dir}/",
                record.id, record.type_id
            ),
        )
    })
}

impl Graph {
    fn add_node(&mut self, record: Record, kind: RecordKind) {
        let id = record.id.clone();
        let targets: BTreeSet<String> = record.record_refs().into_iter().collect();

        for target in &targets {
            self.incoming
                .entry(target.clone())
                .or_default()
                .insert(id.clone());
        }
        self.outgoing.insert(id.clone(), targets);
        self.nodes_by_id.insert(id, GraphNode { record, kind });
    }

    pub fn get_node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes_by_id.get(id)
    }

    pub fn get_record(&self, id: &str) -> Option<&Record> {
        self.get_node(id).map(|node| &node.record)
    }

    /// The `typeId` of the record with this id.
    pub fn get_record_type_id(&self, id: &str) -> Option<&str> {
        self.get_record(id).map(|r| r.type_id.as_str())
    }

    /// The type definition governing the record with this id.
    pub fn get_type_for_record(&self, id: &str) -> Option<&TypeDef> {
        let type_id = self.get_record_type_id(id)?;
        self.types_by_record_type_id.get(type_id)
    }

    pub fn get_type(&self, record_type_id: &str) -> Option<&TypeDef> {
        self.types_by_record_type_id.get(record_type_id)
    }

    /// Ids this record links to, sorted. Targets need not exist.
    pub fn get_links_from(&self, id: &str) -> Vec<&str> {
        self.outgoing
            .get(id)
            .map(|targets| targets.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Ids of records linking to this id, sorted.
    pub fn get_links_to(&self, id: &str) -> Vec<&str> {
        self.incoming
            .get(id)
            .map(|sources| sources.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// All nodes ordered by id.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes_by_id.values()
    }

    /// Data records whose `typeId` is `record_type_id`, ordered by id.
    pub fn records_of_type<'a>(&'a self, record_type_id: &'a str) -> impl Iterator<Item = &'a Record> + 'a {
        self.nodes_by_id
            .values()
            .filter(move |node| node.kind == RecordKind::Data && node.record.type_id == record_type_id)
            .map(|node| &node.record)
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDef> {
        self.types_by_record_type_id.values()
    }

    pub fn len(&self) -> usize {
        self.nodes_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes_by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{car_dataset, DatasetBuilder};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_build_car_graph() {
        let graph = build_graph(&car_dataset().build()).unwrap();

        // three types plus three data records; the manifest is not a node
        assert_eq!(graph.len(), 6);
        assert_eq!(graph.get_record("car:1").unwrap().body, "Uses [[engine:1]] on [[chassis:1]].");
        assert_eq!(graph.get_record_type_id("car:1"), Some("car"));
        assert_eq!(graph.get_type_for_record("car:1").unwrap().record_type_id, "car");
        assert_eq!(graph.get_node("type:car").unwrap().kind, RecordKind::Type);
        assert_eq!(graph.get_links_from("car:1"), vec!["chassis:1", "engine:1"]);
        assert_eq!(graph.get_links_to("engine:1"), vec!["car:1"]);
        assert_eq!(graph.records_of_type("engine").count(), 1);
    }

    #[test]
    fn test_unknown_ids_yield_empty_results() {
        let graph = build_graph(&car_dataset().build()).unwrap();
        assert!(graph.get_record("nope").is_none());
        assert!(graph.get_type_for_record("nope").is_none());
        assert!(graph.get_links_from("nope").is_empty());
        assert!(graph.get_links_to("nope").is_empty());
    }

    #[test]
    fn test_dangling_links_are_edges() {
        let snapshot = DatasetBuilder::new()
            .type_def("note", "")
            .record("note", "a", "note:a", "{related: ['[[note:missing]]']}", "")
            .build();
        let graph = build_graph(&snapshot).unwrap();
        assert_eq!(graph.get_links_from("note:a"), vec!["note:missing"]);
        assert_eq!(graph.get_links_to("note:missing"), vec!["note:a"]);
        assert!(graph.get_record("note:missing").is_none());
    }

    #[test]
    fn test_links_from_nested_fields_and_structured_refs() {
        let snapshot = DatasetBuilder::new()
            .type_def("note", "")
            .record("note", "b", "note:b", "{}", "")
            .record("note", "c", "note:c", "{}", "")
            .record(
                "note",
                "a",
                "note:a",
                "{meta: {deep: [{x: 'see [[note:b]]'}]}, owner: {ref: note:c}}",
                "",
            )
            .build();
        let graph = build_graph(&snapshot).unwrap();
        assert_eq!(graph.get_links_from("note:a"), vec!["note:b"]);
        assert!(graph.get_links_to("note:c").is_empty());
    }

    #[test]
    fn test_nested_record_directories() {
        let snapshot = DatasetBuilder::new()
            .type_def("note", "")
            .file(
                "records/note/2024/01/a.md",
                crate::test_support::record_md("note:a", "note", "{}", ""),
            )
            .build();
        let graph = build_graph(&snapshot).unwrap();
        assert_eq!(graph.get_record("note:a").unwrap().path, "records/note/2024/01/a.md");
    }

    #[test]
    fn test_duplicate_id_across_types_and_records() {
        let snapshot = DatasetBuilder::new()
            .type_def("note", "")
            .record("note", "a", "type:note", "{}", "")
            .build();
        let errors = build_graph(&snapshot).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::DuplicateId);
        assert_eq!(errors[0].file.as_deref(), Some("records/note/a.md"));
    }

    #[test]
    fn test_type_id_mismatch_is_fatal() {
        let snapshot = DatasetBuilder::new()
            .type_def("note", "")
            .type_def("task", "")
            .file(
                "records/note/a.md",
                crate::test_support::record_md("task:a", "task", "{}", ""),
            )
            .build();
        let errors = build_graph(&snapshot).unwrap_err();
        assert_eq!(errors[0].code, ErrorCode::TypeIdMismatch);
    }

    #[test]
    fn test_parse_failure_is_fatal() {
        let snapshot = car_dataset().file("records/car/2.md", "no front matter").build();
        let errors = build_graph(&snapshot).unwrap_err();
        assert_eq!(errors[0].code, ErrorCode::FrontMatterMissing);
    }

    #[test]
    fn test_build_is_deterministic() {
        let snapshot = car_dataset().build();
        assert_eq!(build_graph(&snapshot).unwrap(), build_graph(&snapshot).unwrap());
    }
}
