//! Per-statement field selection.

use super::{dedup_fields, Field, FieldRegistry, UnknownField};
use crate::jira::Issue;
use crate::value::Record;

/// Answers "is this field wanted?" and "which backend fields must be
/// fetched?" for one statement.
#[derive(Debug, Clone)]
pub struct FieldSelector<'r> {
    registry: &'r FieldRegistry,
    selected: Vec<Field>,
    select_all: bool,
}

impl<'r> FieldSelector<'r> {
    /// Build from a requested list of field and preset names.
    ///
    /// An empty request selects the registry's default preset. Requesting
    /// `full`, or a list that already covers every registered field, sets
    /// the select-all flag.
    pub fn build<S: AsRef<str>>(
        registry: &'r FieldRegistry,
        requested: &[S],
    ) -> Result<Self, UnknownField> {
        if requested.is_empty() {
            let preset = registry.default_preset();
            return Ok(Self {
                registry,
                selected: preset.fields.clone(),
                select_all: preset.select_all,
            });
        }

        let mut select_all = requested.iter().any(|name| {
            registry
                .preset(name.as_ref())
                .is_some_and(|preset| preset.select_all)
        });
        let selected = registry.expand(requested)?;
        if registry.fields().iter().all(|f| selected.contains(f)) {
            select_all = true;
        }

        Ok(Self {
            registry,
            selected,
            select_all,
        })
    }

    pub fn includes(&self, field: Field) -> bool {
        self.select_all || self.selected.contains(&field)
    }

    pub fn select_all(&self) -> bool {
        self.select_all
    }

    /// Selected fields in registry order.
    pub fn fields(&self) -> Vec<Field> {
        self.registry
            .fields()
            .iter()
            .copied()
            .filter(|f| self.includes(*f))
            .collect()
    }

    /// Project an issue into a record, fields in registry order.
    pub fn apply(&self, issue: &Issue) -> Record {
        let mut record = Record::new();
        for field in self.fields() {
            if let Some(value) = field.extract(issue) {
                record.insert(field.name(), value);
            }
        }
        record
    }

    /// Minimal set of backend fields needed to compute the selection.
    pub fn backend_fields(&self) -> Vec<String> {
        backend_fields_for(self.fields())
    }

    /// Backend fields for the selection plus `extra` fields that are needed
    /// for filtering or sorting but not projected.
    pub fn backend_fields_with(&self, extra: &[Field]) -> Vec<String> {
        let mut fields = self.fields();
        fields.extend_from_slice(extra);
        backend_fields_for(dedup_fields(fields))
    }
}

fn backend_fields_for(fields: Vec<Field>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in fields.into_iter().filter_map(Field::backend_field) {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}
