use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::sync::OnceLock;

use super::types::{Component, ComponentDef, Composition, FieldDef, FieldDefs, Requirement, TypeDef};
use crate::error::{ErrorCode, ValidationError};
use crate::record::Record;

pub const TYPE_RECORD_TYPE_ID: &str = "sys:type";

const KEY_RECORD_TYPE_ID: &str = "recordTypeId";
const KEY_FIELD_DEFS: &str = "fieldDefs";
const KEY_COMPOSITION: &str = "composition";
const KEY_BODY_FIELD: &str = "bodyField";

fn record_type_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("recordTypeId pattern is valid"))
}

/// Whether `name` is usable as a `records/<name>/` directory.
pub fn is_valid_record_type_id(name: &str) -> bool {
    record_type_id_regex().is_match(name)
}

/// Parse a type record into a [`TypeDef`].
pub fn parse_type_def(record: &Record) -> Result<TypeDef, ValidationError> {
    if record.type_id != TYPE_RECORD_TYPE_ID {
        return Err(ValidationError::in_file(
            ErrorCode::RecordTypeIdInvalid,
            &record.path,
            format!(
                "Type record '{}' must have typeId '{TYPE_RECORD_TYPE_ID}', found '{}'",
                record.id, record.type_id
            ),
        ));
    }

    let mut fields = record.fields.clone();

    let record_type_id = match fields.remove(KEY_RECORD_TYPE_ID) {
        Some(Value::String(s)) if is_valid_record_type_id(&s) => s,
        Some(Value::String(s)) if !s.trim().is_empty() => {
            return Err(ValidationError::in_file(
                ErrorCode::RecordTypeIdInvalid,
                &record.path,
                format!("recordTypeId '{s}' must match ^[A-Za-z0-9][A-Za-z0-9_-]*$"),
            ));
        }
        _ => {
            return Err(ValidationError::in_file(
                ErrorCode::RecordTypeIdInvalid,
                &record.path,
                format!("Type record '{}' must declare fields.recordTypeId as a non-empty string", record.id),
            ));
        }
    };

    let field_defs = fields.remove(KEY_FIELD_DEFS).map(|v| parse_field_defs(&v));
    let composition = fields.remove(KEY_COMPOSITION).map(|v| parse_composition(&v));
    let body_field = match fields.remove(KEY_BODY_FIELD) {
        Some(Value::String(s)) => Some(s),
        Some(other) => {
            // Not interpreted, so an odd shape stays visible as opaque data.
            fields.insert(Value::String(KEY_BODY_FIELD.into()), other);
            None
        }
        None => None,
    };

    Ok(TypeDef {
        type_record_id: record.id.clone(),
        record_type_id,
        path: record.path.clone(),
        field_defs,
        composition,
        body_field,
        extra: fields,
    })
}

fn parse_field_defs(value: &Value) -> FieldDefs {
    let Some(map) = value.as_mapping() else {
        return FieldDefs::Malformed;
    };

    let defs = map
        .iter()
        .map(|(key, def)| {
            let name = key_name(key);
            match def.as_mapping() {
                Some(obj) => parse_field_def(name, obj),
                None => FieldDef {
                    name,
                    kind: None,
                    requirement: Requirement::Unsatisfiable,
                    extra: Mapping::new(),
                },
            }
        })
        .collect();

    FieldDefs::Declared(defs)
}

fn parse_field_def(name: String, obj: &Mapping) -> FieldDef {
    let mut extra = obj.clone();
    let kind = match extra.remove("kind") {
        Some(Value::String(kind)) => Some(kind),
        _ => None,
    };
    let requirement = match (kind.is_some(), extra.remove("required")) {
        (false, _) => Requirement::Unsatisfiable,
        (true, None) | (true, Some(Value::Bool(false))) => Requirement::Optional,
        (true, Some(Value::Bool(true))) => Requirement::Required,
        (true, Some(_)) => Requirement::Unsatisfiable,
    };

    FieldDef {
        name,
        kind,
        requirement,
        extra,
    }
}

fn parse_composition(value: &Value) -> Composition {
    let Some(map) = value.as_mapping() else {
        return Composition::Malformed;
    };

    let components = map
        .iter()
        .map(|(key, component)| {
            let name = key_name(key);
            match component.as_mapping() {
                Some(obj) => parse_component(name, obj),
                None => Component::Invalid {
                    name,
                    reason: "component must be an object".into(),
                },
            }
        })
        .collect();

    Composition::Declared(components)
}

fn parse_component(name: String, obj: &Mapping) -> Component {
    let mut extra = obj.clone();
    let record_type_id = match extra.remove(KEY_RECORD_TYPE_ID) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    };

    let min = match parse_bound(extra.remove("min")) {
        Ok(min) => min.unwrap_or(1),
        Err(reason) => return Component::Invalid { name, reason: format!("min {reason}") },
    };
    let max = match parse_bound(extra.remove("max")) {
        Ok(max) => max,
        Err(reason) => return Component::Invalid { name, reason: format!("max {reason}") },
    };

    if let Some(max) = max {
        if min > max {
            return Component::Invalid {
                name,
                reason: format!("min ({min}) is greater than max ({max})"),
            };
        }
    }

    Component::Valid(ComponentDef {
        name,
        record_type_id,
        min,
        max,
        extra,
    })
}

fn parse_bound(value: Option<Value>) -> Result<Option<u64>, String> {
    match value {
        None => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| format!("must be a non-negative integer, found {n}")),
        Some(_) => Err("must be a non-negative integer".into()),
    }
}

fn key_name(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}
