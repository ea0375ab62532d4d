//! Agent-facing Jira query library
//!
//! Parses and executes the batched query language (`get`, `list`, `count`,
//! `summary`, `search`, `schema`) with field projection, and provides the
//! REST client and configuration used by the `jira-mgmt` binary.

pub mod cli;
pub mod config;
pub mod config_manager;
pub mod errors;
pub mod fields;
pub mod jira;
pub mod output;
pub mod query;
pub mod schema;
pub mod value;

// Re-export commonly used types
pub use errors::{BackendError, QueryError};
pub use fields::{Field, FieldRegistry, FieldSelector};
pub use jira::{InMemoryBackend, IssueBackend, JiraClient};
pub use output::{serialize_results, ExitCode, JsonError};
pub use query::{Executor, Query, QuerySchema, ScopeDefaults};
pub use schema::SchemaDocument;
pub use value::{FieldValue, Record};
