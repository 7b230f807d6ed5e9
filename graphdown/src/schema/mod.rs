mod parser;
mod types;

pub use parser::{is_valid_record_type_id, parse_type_def, TYPE_RECORD_TYPE_ID};
pub use types::*;

use std::collections::BTreeMap;

use crate::error::{ErrorCode, ValidationError};
use crate::record::Record;

/// Type definitions indexed by `recordTypeId`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaRegistry {
    types: BTreeMap<String, TypeDef>,
}

impl SchemaRegistry {
    /// Build the registry from type records in discovery order.
    ///
    /// Invalid type records and later duplicates of a `recordTypeId` are
    /// reported and left out; everything else is registered.
    pub fn build<'a, I>(type_records: I) -> (SchemaRegistry, Vec<ValidationError>)
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut registry = SchemaRegistry::default();
        let mut errors = Vec::new();

        for record in type_records {
            let type_def = match parse_type_def(record) {
                Ok(def) => def,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };

            if let Some(existing) = registry.types.get(&type_def.record_type_id) {
                errors.push(ValidationError::in_file(
                    ErrorCode::RecordTypeIdInvalid,
                    &type_def.path,
                    format!(
                        "recordTypeId '{}' is already declared by {}",
                        type_def.record_type_id, existing.path
                    ),
                ));
                continue;
            }

            registry
                .types
                .insert(type_def.record_type_id.clone(), type_def);
        }

        log::debug!("Registered {} record types", registry.types.len());
        (registry, errors)
    }

    pub fn get(&self, record_type_id: &str) -> Option<&TypeDef> {
        self.types.get(record_type_id)
    }

    pub fn contains(&self, record_type_id: &str) -> bool {
        self.types.contains_key(record_type_id)
    }

    /// All types, ordered by `recordTypeId`.
    pub fn types(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Check every composition declaration for shape and for component
    /// types that exist in this registry.
    pub fn composition_errors(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for type_def in self.types.values() {
            let components = match &type_def.composition {
                None => continue,
                Some(Composition::Malformed) => {
                    errors.push(ValidationError::in_file(
                        ErrorCode::CompositionSchemaInvalid,
                        &type_def.path,
                        format!(
                            "composition of type '{}' must be a map of components",
                            type_def.record_type_id
                        ),
                    ));
                    continue;
                }
                Some(Composition::Declared(components)) => components,
            };

            for component in components {
                match component {
                    Component::Invalid { name, reason } => {
                        errors.push(ValidationError::in_file(
                            ErrorCode::CompositionSchemaInvalid,
                            &type_def.path,
                            format!(
                                "composition component '{name}' of type '{}': {reason}",
                                type_def.record_type_id
                            ),
                        ));
                    }
                    Component::Valid(def) => {
                        let known = def
                            .record_type_id
                            .as_deref()
                            .is_some_and(|id| self.contains(id));
                        if !known {
                            errors.push(ValidationError::in_file(
                                ErrorCode::CompositionUnknownType,
                                &type_def.path,
                                format!(
                                    "composition component '{}' of type '{}' references unknown recordTypeId '{}'",
                                    def.name,
                                    type_def.record_type_id,
                                    def.record_type_id.as_deref().unwrap_or("")
                                ),
                            ));
                        }
                    }
                }
            }
        }

        errors
    }
}

impl IntoIterator for SchemaRegistry {
    type Item = (String, TypeDef);
    type IntoIter = std::collections::btree_map::IntoIter<String, TypeDef>;

    fn into_iter(self) -> Self::IntoIter {
        self.types.into_iter()
    }
}
