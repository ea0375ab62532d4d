//! Query language: parsing and execution.
//!
//! A query string is one or more statements such as
//! `get(PROJ-1) { overview }; list(status=Open, sort_key=desc, take=5)`.
//! [`QuerySchema`] holds the field registry and the operation table shared by
//! the parser and the executor.
//!
//! # Example
//!
//! ```
//! use jira_mgmt::jira::InMemoryBackend;
//! use jira_mgmt::query::{Executor, QuerySchema, ScopeDefaults};
//!
//! let schema = QuerySchema::new();
//! let query = schema.parse("count(project=PROJ)").unwrap();
//!
//! let backend = InMemoryBackend::new();
//! let executor = Executor::new(&schema, &backend, ScopeDefaults::default());
//! let results = executor.execute(&query).unwrap();
//! assert_eq!(results.len(), 1);
//! ```

pub mod lexer;
pub mod ops;
pub mod parser;

pub use parser::{Arg, Parser, Query, Statement};

use crate::errors::QueryError;
use crate::fields::{FieldRegistry, FieldSelector};
use crate::jira::IssueBackend;
use crate::value::FieldValue;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// One documented parameter of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: &'static str,
    pub optional: bool,
    pub default: Option<&'static str>,
    pub description: &'static str,
}

/// Static metadata for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
    pub examples: &'static [&'static str],
    /// Reads from the backend. `false` only for `schema`.
    pub remote: bool,
}

const fn param(
    name: &'static str,
    kind: &'static str,
    optional: bool,
    description: &'static str,
) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        optional,
        default: None,
        description,
    }
}

/// Every operation the language knows.
pub const OPERATIONS: &[OperationSpec] = &[
    OperationSpec {
        name: "get",
        description: "Fetch a single issue by key",
        params: &[param(
            "key",
            "string",
            false,
            "Issue key (positional), e.g. PROJ-123",
        )],
        examples: &["get(PROJ-123) { overview }", "get(PROJ-456) { full }"],
        remote: true,
    },
    OperationSpec {
        name: "list",
        description: "List issues with filters, sorting, and pagination",
        params: &[
            param(
                "project",
                "string",
                true,
                "Project key (positional or named; defaults to configured project)",
            ),
            param("type", "string", true, "Issue type filter (epic, story, task, bug)"),
            param("status", "string", true, "Status filter"),
            param("assignee", "string", true, "Assignee display name filter"),
            param("priority", "string", true, "Priority name filter"),
            param(
                "sort_<field>",
                "asc|desc",
                true,
                "Sort by one field (key, summary, status, assignee, type, priority, created, updated)",
            ),
            ParamSpec {
                name: "skip",
                kind: "int",
                optional: true,
                default: Some("0"),
                description: "Skip first N items",
            },
            param("take", "int", true, "Return at most N items"),
        ],
        examples: &[
            "list() { overview }",
            "list(project=PROJ, type=epic) { minimal }",
            "list(status=open, sort_key=asc) { default }",
            "list(skip=10, take=5) { overview }",
        ],
        remote: true,
    },
    OperationSpec {
        name: "count",
        description: "Count issues matching filters",
        params: &[
            param(
                "project",
                "string",
                true,
                "Project key (defaults to configured project)",
            ),
            param("type", "string", true, "Issue type filter"),
            param("status", "string", true, "Status filter"),
            param("assignee", "string", true, "Assignee display name filter"),
            param("priority", "string", true, "Priority name filter"),
        ],
        examples: &["count()", "count(status=done)", "count(project=PROJ, type=bug)"],
        remote: true,
    },
    OperationSpec {
        name: "summary",
        description: "Project/board overview with issue counts by status and type",
        params: &[
            param(
                "project",
                "string",
                true,
                "Project key (defaults to configured project)",
            ),
            param("board", "int", true, "Board ID (defaults to configured board)"),
        ],
        examples: &["summary()", "summary(project=PROJ)", "summary(board=42)"],
        remote: true,
    },
    OperationSpec {
        name: "search",
        description: "Search issues using raw JQL",
        params: &[param(
            "jql",
            "string",
            false,
            "JQL query string (named or positional)",
        )],
        examples: &[
            r#"search(jql="assignee = currentUser()") { default }"#,
            r#"search(jql="project = PROJ AND status = Open") { overview }"#,
        ],
        remote: true,
    },
    OperationSpec {
        name: "schema",
        description: "Describe operations, fields, and presets",
        params: &[],
        examples: &["schema()"],
        remote: false,
    },
];

/// Field registry plus operation table. Immutable; cheap to clone.
#[derive(Debug, Clone)]
pub struct QuerySchema {
    registry: Arc<FieldRegistry>,
    operations: &'static [OperationSpec],
}

impl QuerySchema {
    pub fn new() -> Self {
        Self::with_registry(Arc::new(FieldRegistry::issues()))
    }

    pub fn with_registry(registry: Arc<FieldRegistry>) -> Self {
        Self {
            registry,
            operations: OPERATIONS,
        }
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn operations(&self) -> &[OperationSpec] {
        self.operations
    }

    pub fn operation(&self, name: &str) -> Option<&OperationSpec> {
        self.operations.iter().find(|op| op.name == name)
    }

    pub fn has_operation(&self, name: &str) -> bool {
        self.operation(name).is_some()
    }

    pub fn parse(&self, input: &str) -> Result<Query, QueryError> {
        Parser::parse(input, self)
    }

    /// Whether any statement reads from the backend. Unknown operations
    /// count as remote.
    pub fn needs_backend(&self, query: &Query) -> bool {
        query
            .statements
            .iter()
            .any(|stmt| self.operation(&stmt.operation).map_or(true, |op| op.remote))
    }
}

impl Default for QuerySchema {
    fn default() -> Self {
        Self::new()
    }
}

/// Caller-configured scope consulted when a statement omits one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeDefaults {
    pub project: Option<String>,
    pub board: Option<u64>,
}

/// Everything a handler needs to run one statement.
pub struct OperationContext<'a, B> {
    pub statement: &'a Statement,
    pub selector: FieldSelector<'a>,
    pub backend: &'a B,
    pub defaults: &'a ScopeDefaults,
    pub schema: &'a QuerySchema,
}

impl<B> OperationContext<'_, B> {
    pub fn operation(&self) -> &str {
        &self.statement.operation
    }
}

pub type Handler<B> = fn(&OperationContext<'_, B>) -> Result<FieldValue, QueryError>;

/// Runs parsed queries against a backend, one statement at a time.
pub struct Executor<'a, B: IssueBackend> {
    schema: &'a QuerySchema,
    backend: &'a B,
    defaults: ScopeDefaults,
    handlers: HashMap<&'static str, Handler<B>>,
}

impl<'a, B: IssueBackend> Executor<'a, B> {
    pub fn new(schema: &'a QuerySchema, backend: &'a B, defaults: ScopeDefaults) -> Self {
        let mut handlers: HashMap<&'static str, Handler<B>> = HashMap::new();
        handlers.insert("get", ops::get::<B>);
        handlers.insert("list", ops::list::<B>);
        handlers.insert("count", ops::count::<B>);
        handlers.insert("summary", ops::summary::<B>);
        handlers.insert("search", ops::search::<B>);
        handlers.insert("schema", ops::schema::<B>);

        Self {
            schema,
            backend,
            defaults,
            handlers,
        }
    }

    /// Execute every statement in order, one result per statement.
    ///
    /// Stops at the first failure; the error is wrapped with the operation
    /// name and zero-based statement index.
    pub fn execute(&self, query: &Query) -> Result<Vec<FieldValue>, QueryError> {
        let mut results = Vec::with_capacity(query.statements.len());

        for (index, statement) in query.statements.iter().enumerate() {
            debug!(index, operation = %statement.operation, "dispatching statement");
            let result =
                self.execute_statement(statement)
                    .map_err(|source| QueryError::Statement {
                        operation: statement.operation.clone(),
                        index,
                        source: Box::new(source),
                    })?;
            results.push(result);
        }

        info!(statements = results.len(), "query executed");
        Ok(results)
    }

    fn execute_statement(&self, statement: &Statement) -> Result<FieldValue, QueryError> {
        let handler = self.handlers.get(statement.operation.as_str()).ok_or_else(|| {
            QueryError::Internal(format!(
                "no handler registered for operation '{}'",
                statement.operation
            ))
        })?;

        let requested = statement.fields.as_deref().unwrap_or(&[]);
        let selector = FieldSelector::build(self.schema.registry(), requested).map_err(|e| {
            QueryError::invalid_argument(&statement.operation, "fields", e.to_string())
        })?;

        let ctx = OperationContext {
            statement,
            selector,
            backend: self.backend,
            defaults: &self.defaults,
            schema: self.schema,
        };
        let result = handler(&ctx)?;
        if let Some(items) = result.as_list() {
            debug!(items = items.len(), "statement produced list");
        }
        Ok(result)
    }
}
