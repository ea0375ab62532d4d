//! Query language self-description for agent introspection.
//!
//! [`SchemaDocument`] lists every operation with its parameters and examples,
//! the projectable fields, presets, and which fields `list` can sort and
//! filter on. It is returned by the `schema()` operation and the `schema`
//! command.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::output::ExitCode;
use crate::query::{OperationSpec, ParamSpec, QuerySchema};

/// Complete description of the query language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SchemaDocument {
    /// Tool version
    pub version: String,
    pub operations: Vec<OperationDoc>,
    /// Projectable fields, in projection order
    pub fields: Vec<String>,
    /// Preset name to member fields
    pub presets: BTreeMap<String, Vec<String>>,
    /// Preset used when a statement has no projection block
    pub default_preset: String,
    /// Fields accepted by `sort_<field>`
    pub sortable: Vec<String>,
    /// Named filters accepted by `list` and `count`
    pub filterable: Vec<String>,
    pub exit_codes: Vec<ExitCodeDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OperationDoc {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterDoc>,
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ParameterDoc {
    pub name: String,
    /// string, int, or asc|desc
    #[serde(rename = "type")]
    pub param_type: String,
    pub optional: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExitCodeDoc {
    pub code: i32,
    pub description: String,
}

const FILTERABLE: &[&str] = &["project", "type", "status", "assignee", "priority"];

impl SchemaDocument {
    pub fn build(schema: &QuerySchema) -> Self {
        let registry = schema.registry();

        SchemaDocument {
            version: env!("CARGO_PKG_VERSION").to_string(),
            operations: schema.operations().iter().map(OperationDoc::from).collect(),
            fields: registry.fields().iter().map(|f| f.name().to_string()).collect(),
            presets: registry
                .presets()
                .iter()
                .map(|p| {
                    let members = p.fields.iter().map(|f| f.name().to_string()).collect();
                    (p.name.to_string(), members)
                })
                .collect(),
            default_preset: registry.default_preset().name.to_string(),
            sortable: registry
                .sortable_fields()
                .iter()
                .map(|f| f.name().to_string())
                .collect(),
            filterable: FILTERABLE.iter().map(|s| s.to_string()).collect(),
            exit_codes: ExitCode::ALL
                .iter()
                .map(|code| ExitCodeDoc {
                    code: code.code(),
                    description: code.description().to_string(),
                })
                .collect(),
        }
    }

    /// JSON Schema of the document itself.
    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(SchemaDocument)
    }
}

impl From<&OperationSpec> for OperationDoc {
    fn from(spec: &OperationSpec) -> Self {
        OperationDoc {
            name: spec.name.to_string(),
            description: spec.description.to_string(),
            parameters: spec.params.iter().map(ParameterDoc::from).collect(),
            examples: spec.examples.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl From<&ParamSpec> for ParameterDoc {
    fn from(spec: &ParamSpec) -> Self {
        ParameterDoc {
            name: spec.name.to_string(),
            param_type: spec.kind.to_string(),
            optional: spec.optional,
            default: spec.default.map(str::to_string),
            description: spec.description.to_string(),
        }
    }
}
