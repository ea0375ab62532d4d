//! Operation handlers and the list helpers they share.

use super::{OperationContext, Statement};
use crate::errors::QueryError;
use crate::fields::{Field, FieldRegistry};
use crate::jira::{Issue, IssueBackend, IssueFilter};
use crate::schema::SchemaDocument;
use crate::value::{FieldValue, Record};
use std::collections::BTreeMap;

/// Named arguments accepted by `list` and `count`, besides `sort_<field>`.
const LIST_ARGS: &[&str] = &[
    "project", "type", "status", "assignee", "priority", "skip", "take",
];

/// Backend fields needed for tallies.
const TALLY_FIELDS: &[Field] = &[Field::Status, Field::Type];

/// `get(KEY)`
pub fn get<B: IssueBackend>(ctx: &OperationContext<'_, B>) -> Result<FieldValue, QueryError> {
    check_args(ctx.statement, &[], false)?;

    let mut keys = ctx.statement.positional();
    let key = keys
        .next()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            QueryError::invalid_argument("get", "key", "get requires an issue key argument")
        })?;
    if keys.next().is_some() {
        return Err(QueryError::invalid_argument(
            "get",
            "key",
            "get takes exactly one issue key",
        ));
    }

    let issue = ctx
        .backend
        .fetch_one(key, &ctx.selector.backend_fields())?;
    Ok(ctx.selector.apply(&issue).into())
}

/// `list(project?, type?, status?, assignee?, priority?, sort_<field>?, skip?, take?)`
pub fn list<B: IssueBackend>(ctx: &OperationContext<'_, B>) -> Result<FieldValue, QueryError> {
    let op = ctx.operation();
    check_args(ctx.statement, LIST_ARGS, true)?;

    let filters = Filters::resolve(ctx)?;
    let sort = SortSpec::from_statement(ctx.statement, ctx.schema.registry())?;
    let page = Pagination::from_statement(ctx.statement, op)?;

    let mut extra = filters.memory_fields();
    if let Some(sort) = &sort {
        extra.push(sort.field);
    }
    let fields = ctx.selector.backend_fields_with(&extra);

    let issues = ctx.backend.fetch_many(&filters.backend, &fields)?;
    let mut issues: Vec<Issue> = issues
        .into_iter()
        .filter(|issue| filters.matches(issue))
        .collect();
    if let Some(sort) = &sort {
        sort.apply(&mut issues);
    }

    let records: Vec<FieldValue> = page
        .apply(issues)
        .iter()
        .map(|issue| FieldValue::from(ctx.selector.apply(issue)))
        .collect();
    Ok(FieldValue::List(records))
}

/// `count(project?, type?, status?, assignee?, priority?)`
///
/// Sort and pagination arguments are validated as in `list`, then ignored.
pub fn count<B: IssueBackend>(ctx: &OperationContext<'_, B>) -> Result<FieldValue, QueryError> {
    check_args(ctx.statement, LIST_ARGS, true)?;
    SortSpec::from_statement(ctx.statement, ctx.schema.registry())?;
    Pagination::from_statement(ctx.statement, ctx.operation())?;

    let filters = Filters::resolve(ctx)?;
    let mut needed = TALLY_FIELDS.to_vec();
    needed.extend(filters.memory_fields());
    let fields = backend_names(&needed);

    let total = ctx
        .backend
        .fetch_many(&filters.backend, &fields)?
        .iter()
        .filter(|issue| filters.matches(issue))
        .count();
    Ok(Record::new().with("count", total).into())
}

/// `summary(project?, board?)`
pub fn summary<B: IssueBackend>(ctx: &OperationContext<'_, B>) -> Result<FieldValue, QueryError> {
    let op = ctx.operation();
    let stmt = ctx.statement;
    check_args(stmt, &["project", "board"], false)?;
    at_most_one_positional(stmt)?;

    let project = explicit_project(stmt).or_else(|| default_project(ctx));
    let board = match stmt.named("board") {
        Some(raw) => Some(parse_board_id(op, raw)?),
        None => ctx.defaults.board.filter(|id| *id > 0),
    };

    if project.is_none() && board.is_none() {
        return Err(QueryError::validation(
            op,
            "summary requires a project or board (via argument or config)",
        ));
    }

    let mut result = Record::new();

    if let Some(key) = project {
        let info = ctx.backend.fetch_project(&key)?;
        result.insert(
            "project",
            Record::new()
                .with("key", info.key)
                .with("name", info.name)
                .with("type", info.project_type_key),
        );

        let issues = ctx
            .backend
            .fetch_many(&IssueFilter::for_project(&key), &backend_names(TALLY_FIELDS))?;
        let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
        for issue in &issues {
            if let Some(status) = issue.fields.status_name() {
                *by_status.entry(status.to_string()).or_default() += 1;
            }
            if let Some(issue_type) = issue.fields.type_name() {
                *by_type.entry(issue_type.to_string()).or_default() += 1;
            }
        }
        result.insert("total_issues", issues.len());
        result.insert("by_status", Record::from(by_status));
        result.insert("by_type", Record::from(by_type));
    }

    if let Some(id) = board {
        let info = ctx.backend.fetch_board(id)?;
        result.insert(
            "board",
            Record::new()
                .with("id", info.id)
                .with("name", info.name)
                .with("type", info.board_type),
        );
    }

    Ok(result.into())
}

/// `search(jql)`
pub fn search<B: IssueBackend>(ctx: &OperationContext<'_, B>) -> Result<FieldValue, QueryError> {
    let stmt = ctx.statement;
    check_args(stmt, &["jql"], false)?;
    at_most_one_positional(stmt)?;

    let jql = stmt
        .named("jql")
        .or_else(|| stmt.first_positional())
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| {
            QueryError::invalid_argument("search", "jql", "search requires a jql argument")
        })?;

    let issues = ctx
        .backend
        .fetch_by_raw_query(jql, &ctx.selector.backend_fields())?;
    Ok(FieldValue::List(
        issues
            .iter()
            .map(|issue| FieldValue::from(ctx.selector.apply(issue)))
            .collect(),
    ))
}

/// `schema()`
pub fn schema<B: IssueBackend>(ctx: &OperationContext<'_, B>) -> Result<FieldValue, QueryError> {
    check_args(ctx.statement, &[], false)?;

    let doc = SchemaDocument::build(ctx.schema);
    let value = serde_json::to_value(&doc)
        .map_err(|e| QueryError::Internal(format!("failed to encode schema: {}", e)))?;
    Ok(FieldValue::from(value))
}

/// Reject named arguments the operation does not know.
fn check_args(stmt: &Statement, allowed: &[&str], sort_allowed: bool) -> Result<(), QueryError> {
    for (key, _) in stmt.named_args() {
        let known = allowed.contains(&key) || (sort_allowed && key.starts_with("sort_"));
        if !known {
            return Err(QueryError::invalid_argument(
                &stmt.operation,
                key,
                format!("unknown argument '{}'", key),
            ));
        }
    }
    Ok(())
}

fn at_most_one_positional(stmt: &Statement) -> Result<(), QueryError> {
    if stmt.positional().count() > 1 {
        return Err(QueryError::validation(
            &stmt.operation,
            format!("{} accepts at most one positional argument", stmt.operation),
        ));
    }
    Ok(())
}

/// `project=` or the positional value; blank counts as unset.
fn explicit_project(stmt: &Statement) -> Option<String> {
    stmt.named("project")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .or_else(|| stmt.first_positional().map(str::trim).filter(|p| !p.is_empty()))
        .map(str::to_string)
}

fn default_project<B>(ctx: &OperationContext<'_, B>) -> Option<String> {
    ctx.defaults
        .project
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
}

fn parse_board_id(op: &str, raw: &str) -> Result<u64, QueryError> {
    match raw.parse::<u64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(QueryError::invalid_argument(
            op,
            "board",
            format!("invalid board ID: {}", raw),
        )),
    }
}

fn backend_names(fields: &[Field]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in fields.iter().filter_map(|f| f.backend_field()) {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Filters for `list` and `count`: project, type and status go to the
/// backend, assignee and priority are matched in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    pub backend: IssueFilter,
    pub assignee: Option<String>,
    pub priority: Option<String>,
}

impl Filters {
    /// Resolve from the statement, falling back to the default project.
    pub fn resolve<B>(ctx: &OperationContext<'_, B>) -> Result<Self, QueryError> {
        let stmt = ctx.statement;
        let op = ctx.operation();
        at_most_one_positional(stmt)?;

        let project = explicit_project(stmt)
            .or_else(|| default_project(ctx))
            .ok_or_else(|| {
                QueryError::invalid_argument(
                    op,
                    "project",
                    format!("{} requires a project (via argument or config)", op),
                )
            })?;

        Ok(Filters {
            backend: IssueFilter {
                project: Some(project),
                issue_type: stmt.named("type").map(str::to_string),
                status: stmt.named("status").map(str::to_string),
            },
            assignee: stmt.named("assignee").map(str::to_string),
            priority: stmt.named("priority").map(str::to_string),
        })
    }

    /// Fields the in-memory filters read.
    pub fn memory_fields(&self) -> Vec<Field> {
        let mut fields = Vec::new();
        if self.assignee.is_some() {
            fields.push(Field::Assignee);
        }
        if self.priority.is_some() {
            fields.push(Field::Priority);
        }
        fields
    }

    pub fn matches(&self, issue: &Issue) -> bool {
        equals_ignore_case(issue.fields.assignee_name(), self.assignee.as_deref())
            && equals_ignore_case(issue.fields.priority_name(), self.priority.as_deref())
    }
}

fn equals_ignore_case(actual: Option<&str>, wanted: Option<&str>) -> bool {
    match wanted {
        None => true,
        Some(w) => actual.is_some_and(|a| a.eq_ignore_ascii_case(w)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// A single `sort_<field>=asc|desc` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: Field,
    pub order: SortOrder,
}

impl SortSpec {
    /// At most one sort argument per statement; the field must be sortable.
    pub fn from_statement(
        stmt: &Statement,
        registry: &FieldRegistry,
    ) -> Result<Option<Self>, QueryError> {
        let op = stmt.operation.as_str();
        let mut spec = None;

        for (key, value) in stmt.named_args() {
            let Some(name) = key.strip_prefix("sort_") else {
                continue;
            };
            if spec.is_some() {
                return Err(QueryError::invalid_argument(
                    op,
                    key,
                    "only one sort_<field> argument is allowed",
                ));
            }

            let field = registry
                .field(name)
                .filter(|f| f.is_sortable())
                .ok_or_else(|| {
                    QueryError::invalid_argument(
                        op,
                        key,
                        format!("cannot sort by '{}'", name),
                    )
                })?;
            let order = match value.to_ascii_lowercase().as_str() {
                "asc" => SortOrder::Asc,
                "desc" => SortOrder::Desc,
                _ => {
                    return Err(QueryError::invalid_argument(
                        op,
                        key,
                        format!("sort order must be asc or desc, got '{}'", value),
                    ))
                }
            };
            spec = Some(SortSpec { field, order });
        }

        Ok(spec)
    }

    /// Stable sort on the field's display string; ties keep fetch order.
    pub fn apply(&self, issues: &mut Vec<Issue>) {
        let mut keyed: Vec<(String, Issue)> = issues
            .drain(..)
            .map(|issue| (self.field.sort_key(&issue), issue))
            .collect();
        keyed.sort_by(|a, b| match self.order {
            SortOrder::Asc => a.0.cmp(&b.0),
            SortOrder::Desc => b.0.cmp(&a.0),
        });
        issues.extend(keyed.into_iter().map(|(_, issue)| issue));
    }
}

/// `skip`/`take`, clamped to the available items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pagination {
    pub skip: usize,
    pub take: Option<usize>,
}

impl Pagination {
    pub fn from_statement(stmt: &Statement, op: &str) -> Result<Self, QueryError> {
        Ok(Pagination {
            skip: parse_count(op, "skip", stmt.named("skip"))?.unwrap_or(0),
            take: parse_count(op, "take", stmt.named("take"))?,
        })
    }

    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let take = self.take.unwrap_or(usize::MAX);
        items.into_iter().skip(self.skip).take(take).collect()
    }
}

fn parse_count(op: &str, name: &str, raw: Option<&str>) -> Result<Option<usize>, QueryError> {
    raw.map(|value| {
        value.parse::<usize>().map_err(|_| {
            QueryError::invalid_argument(
                op,
                name,
                format!("{} must be a non-negative integer, got '{}'", name, value),
            )
        })
    })
    .transpose()
}
