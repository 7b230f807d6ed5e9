use serde_yaml::Mapping;

/// Schema parsed from a type record under `types/`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    /// Id of the type record itself.
    pub type_record_id: String,
    /// Directory-safe name data records of this type live under.
    pub record_type_id: String,
    pub path: String,
    pub field_defs: Option<FieldDefs>,
    pub composition: Option<Composition>,
    pub body_field: Option<String>,
    /// Any other keys under the type record's `fields`, kept as opaque data.
    pub extra: Mapping,
}

impl TypeDef {
    /// Field definitions whose value must be present on every record.
    /// Malformed definitions count as required and can never be skipped.
    pub fn enforced_fields(&self) -> impl Iterator<Item = &FieldDef> {
        let defs: &[FieldDef] = match &self.field_defs {
            Some(FieldDefs::Declared(defs)) => defs,
            _ => &[],
        };
        defs.iter()
            .filter(|def| def.requirement != Requirement::Optional)
    }

    /// Whether `fieldDefs` is present but not a map of field objects.
    pub fn has_malformed_field_defs(&self) -> bool {
        matches!(self.field_defs, Some(FieldDefs::Malformed))
    }

    /// Well-formed composition components, in declaration order.
    pub fn components(&self) -> impl Iterator<Item = &ComponentDef> {
        let components: &[Component] = match &self.composition {
            Some(Composition::Declared(components)) => components,
            _ => &[],
        };
        components.iter().filter_map(|c| match c {
            Component::Valid(def) => Some(def),
            Component::Invalid { .. } => None,
        })
    }
}

/// `fields.fieldDefs` of a type record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDefs {
    Declared(Vec<FieldDef>),
    /// Present but not a map (a list, null, a scalar).
    Malformed,
}

/// A single field definition. `kind` is an open-world tag and is never
/// interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub kind: Option<String>,
    pub requirement: Requirement,
    pub extra: Mapping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Optional,
    Required,
    /// The definition is not an object with a string `kind` and an optional
    /// boolean `required`.
    Unsatisfiable,
}

/// `fields.composition` of a type record.
#[derive(Debug, Clone, PartialEq)]
pub enum Composition {
    Declared(Vec<Component>),
    Malformed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Valid(ComponentDef),
    Invalid { name: String, reason: String },
}

/// A required link count to records of another type.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDef {
    pub name: String,
    pub record_type_id: Option<String>,
    pub min: u64,
    pub max: Option<u64>,
    pub extra: Mapping,
}

impl ComponentDef {
    pub fn accepts(&self, count: u64) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }
}
