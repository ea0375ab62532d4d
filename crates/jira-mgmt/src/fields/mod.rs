//! Field registry for issue projection.
//!
//! Every projectable attribute is a [`Field`] variant. The variant knows its
//! public name, the backend field it is computed from, and how to extract its
//! value from an [`Issue`]. Presets are named bundles of fields; the `full`
//! preset is structural and always means "every registered field".

mod selector;

pub use selector::FieldSelector;

use crate::jira::Issue;
use crate::value::{FieldValue, Record};
use thiserror::Error;

/// A projectable issue attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Key,
    Summary,
    Status,
    Assignee,
    Type,
    Priority,
    Parent,
    Description,
    Labels,
    Reporter,
    Created,
    Updated,
    Project,
    Subtasks,
}

impl Field {
    /// Every field, in projection order.
    pub const ALL: [Field; 14] = [
        Field::Key,
        Field::Summary,
        Field::Status,
        Field::Assignee,
        Field::Type,
        Field::Priority,
        Field::Parent,
        Field::Description,
        Field::Labels,
        Field::Reporter,
        Field::Created,
        Field::Updated,
        Field::Project,
        Field::Subtasks,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Key => "key",
            Field::Summary => "summary",
            Field::Status => "status",
            Field::Assignee => "assignee",
            Field::Type => "type",
            Field::Priority => "priority",
            Field::Parent => "parent",
            Field::Description => "description",
            Field::Labels => "labels",
            Field::Reporter => "reporter",
            Field::Created => "created",
            Field::Updated => "updated",
            Field::Project => "project",
            Field::Subtasks => "subtasks",
        }
    }

    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Backend field needed to compute this one. `None` for the key, which
    /// the service always returns.
    pub fn backend_field(self) -> Option<&'static str> {
        match self {
            Field::Key => None,
            Field::Type => Some("issuetype"),
            other => Some(other.name()),
        }
    }

    /// Whether `list` may sort by this field.
    pub fn is_sortable(self) -> bool {
        matches!(
            self,
            Field::Key
                | Field::Summary
                | Field::Status
                | Field::Assignee
                | Field::Type
                | Field::Priority
                | Field::Created
                | Field::Updated
        )
    }

    /// Extract the projected value. `None` means the key is omitted entirely,
    /// which only happens for an empty subtask list.
    pub fn extract(self, issue: &Issue) -> Option<FieldValue> {
        let f = &issue.fields;
        let value = match self {
            Field::Key => FieldValue::from(issue.key.as_str()),
            Field::Summary => f.summary.clone().into(),
            Field::Status => f.status_name().into(),
            Field::Assignee => f.assignee_name().into(),
            Field::Type => f.type_name().into(),
            Field::Priority => f.priority_name().into(),
            Field::Parent => f.parent.as_ref().map(|p| p.key.as_str()).into(),
            Field::Description => f.description_text().into(),
            Field::Labels => f.labels.clone().into(),
            Field::Reporter => f.reporter_name().into(),
            Field::Created => f.created.clone().into(),
            Field::Updated => f.updated.clone().into(),
            Field::Project => f.project_key().into(),
            Field::Subtasks => {
                if f.subtasks.is_empty() {
                    return None;
                }
                FieldValue::List(f.subtasks.iter().map(subtask_record).collect())
            }
        };
        Some(value)
    }

    /// Sort key as a display string; unset values sort as empty.
    pub fn sort_key(self, issue: &Issue) -> String {
        match self.extract(issue) {
            Some(FieldValue::Text(s)) => s,
            _ => String::new(),
        }
    }
}

fn subtask_record(sub: &Issue) -> FieldValue {
    let mut record = Record::new()
        .with("key", sub.key.as_str())
        .with("summary", sub.fields.summary.clone());
    if let Some(status) = sub.fields.status_name() {
        record.insert("status", status);
    }
    record.into()
}

/// A named bundle of fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preset {
    pub name: &'static str,
    pub fields: Vec<Field>,
    /// Set only for `full`: selects every registered field.
    pub select_all: bool,
}

/// A name in a projection that is neither a preset nor a field.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown field: {0}")]
pub struct UnknownField(pub String);

/// Process-wide registry of fields and presets. Immutable after construction.
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    fields: Vec<Field>,
    presets: Vec<Preset>,
    default_preset: &'static str,
}

impl FieldRegistry {
    /// The standard issue registry.
    pub fn issues() -> Self {
        use Field::*;
        let fields = Field::ALL.to_vec();
        let presets = vec![
            Preset {
                name: "minimal",
                fields: vec![Key, Status],
                select_all: false,
            },
            Preset {
                name: "default",
                fields: vec![Key, Summary, Status, Assignee],
                select_all: false,
            },
            Preset {
                name: "overview",
                fields: vec![Key, Summary, Status, Assignee, Type, Priority, Parent],
                select_all: false,
            },
            Preset {
                name: "full",
                fields: fields.clone(),
                select_all: true,
            },
        ];
        Self {
            fields,
            presets,
            default_preset: "default",
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    pub fn field(&self, name: &str) -> Option<Field> {
        Field::from_name(name).filter(|f| self.fields.contains(f))
    }

    pub fn preset(&self, name: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.name == name)
    }

    pub fn default_preset(&self) -> &Preset {
        self.preset(self.default_preset)
            .unwrap_or(&self.presets[0])
    }

    pub fn sortable_fields(&self) -> Vec<Field> {
        self.fields.iter().copied().filter(|f| f.is_sortable()).collect()
    }

    /// Expand presets and validate names, keeping first occurrences only.
    pub fn expand<S: AsRef<str>>(&self, requested: &[S]) -> Result<Vec<Field>, UnknownField> {
        let mut expanded = Vec::new();
        for name in requested {
            let name = name.as_ref();
            if let Some(preset) = self.preset(name) {
                expanded.extend(preset.fields.iter().copied());
            } else if let Some(field) = self.field(name) {
                expanded.push(field);
            } else {
                return Err(UnknownField(name.to_string()));
            }
        }
        Ok(dedup_fields(expanded))
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::issues()
    }
}

/// Order-preserving dedup by first occurrence.
pub fn dedup_fields(fields: Vec<Field>) -> Vec<Field> {
    let mut unique = Vec::with_capacity(fields.len());
    for field in fields {
        if !unique.contains(&field) {
            unique.push(field);
        }
    }
    unique
}
