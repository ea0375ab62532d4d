//! End-to-end query execution against the in-memory backend.
//!
//! Each test parses a query string, executes it and inspects the projected
//! values and the requests the backend received.

use jira_mgmt::errors::{BackendError, QueryError};
use jira_mgmt::jira::memory::BackendCall;
use jira_mgmt::jira::types::{Board, IssueType, Priority, Status, User};
use jira_mgmt::jira::{InMemoryBackend, Issue, IssueFields, IssueFilter, Project};
use jira_mgmt::query::{Executor, QuerySchema, ScopeDefaults};
use jira_mgmt::{serialize_results, FieldValue, Record};

/// Helper to build an issue in project `PROJ`
fn issue(key: &str, summary: &str, status: &str, issue_type: &str) -> Issue {
    Issue {
        id: key.trim_start_matches("PROJ-").to_string(),
        key: key.to_string(),
        fields: IssueFields {
            summary: Some(summary.to_string()),
            status: Some(Status {
                name: status.to_string(),
                ..Status::default()
            }),
            issue_type: Some(IssueType {
                name: issue_type.to_string(),
                ..IssueType::default()
            }),
            project: Some(Project {
                key: "PROJ".to_string(),
                ..Project::default()
            }),
            ..IssueFields::default()
        },
    }
}

fn with_assignee(mut issue: Issue, name: &str) -> Issue {
    issue.fields.assignee = Some(User {
        display_name: name.to_string(),
        ..User::default()
    });
    issue
}

fn with_priority(mut issue: Issue, name: &str) -> Issue {
    issue.fields.priority = Some(Priority {
        name: name.to_string(),
        ..Priority::default()
    });
    issue
}

/// Backend with project PROJ, board 42 and five issues
fn setup_backend() -> InMemoryBackend {
    let backend = InMemoryBackend::new();
    backend.add_project(Project {
        id: "10000".to_string(),
        key: "PROJ".to_string(),
        name: "Project".to_string(),
        project_type_key: "software".to_string(),
    });
    backend.add_board(Board {
        id: 42,
        name: "PROJ board".to_string(),
        board_type: "scrum".to_string(),
    });

    backend.add_issue(with_assignee(
        with_priority(issue("PROJ-1", "Login page", "Done", "Story"), "High"),
        "Alice",
    ));
    backend.add_issue(with_assignee(
        issue("PROJ-2", "Crash on save", "Open", "Bug"),
        "Bob",
    ));
    backend.add_issue(with_priority(
        issue("PROJ-3", "Billing epic", "Open", "Epic"),
        "High",
    ));
    backend.add_issue(with_assignee(
        issue("PROJ-4", "Export CSV", "In Progress", "Story"),
        "alice",
    ));
    backend.add_issue(issue("PROJ-5", "Audit log", "Open", "Bug"));
    backend
}

fn project_defaults() -> ScopeDefaults {
    ScopeDefaults {
        project: Some("PROJ".to_string()),
        board: None,
    }
}

fn run(
    backend: &InMemoryBackend,
    defaults: ScopeDefaults,
    query: &str,
) -> Result<Vec<FieldValue>, QueryError> {
    let schema = QuerySchema::new();
    let parsed = schema.parse(query)?;
    Executor::new(&schema, backend, defaults).execute(&parsed)
}

fn keys(value: &FieldValue) -> Vec<String> {
    value
        .as_list()
        .unwrap()
        .iter()
        .map(|item| {
            item.as_record()
                .and_then(|r| r.get("key"))
                .and_then(FieldValue::as_text)
                .unwrap()
                .to_string()
        })
        .collect()
}

fn record_keys(record: &Record) -> Vec<&str> {
    record.keys().collect()
}

// ============================================================================
// get
// ============================================================================

#[test]
fn test_get_projects_default_preset() {
    let backend = setup_backend();
    let results = run(&backend, ScopeDefaults::default(), "get(PROJ-2)").unwrap();

    assert_eq!(results.len(), 1);
    let record = results[0].as_record().unwrap();
    assert_eq!(
        record_keys(record),
        vec!["key", "summary", "status", "assignee"]
    );
    assert_eq!(
        record.get("status").and_then(FieldValue::as_text),
        Some("Open")
    );
}

#[test]
fn test_get_unset_relation_is_null() {
    let backend = setup_backend();
    let results = run(
        &backend,
        ScopeDefaults::default(),
        "get(PROJ-5) { key assignee subtasks }",
    )
    .unwrap();

    let record = results[0].as_record().unwrap();
    assert_eq!(record.get("assignee"), Some(&FieldValue::Null));
    assert!(!record.contains_key("subtasks"));
}

#[test]
fn test_get_requests_only_needed_backend_fields() {
    let backend = setup_backend();
    run(&backend, ScopeDefaults::default(), "get(PROJ-1) { minimal }").unwrap();

    assert_eq!(
        backend.last_requested_fields(),
        Some(vec!["status".to_string()])
    );
}

#[test]
fn test_get_full_requests_every_backend_field() {
    let backend = setup_backend();
    run(&backend, ScopeDefaults::default(), "get(PROJ-1) { full }").unwrap();

    let fields = backend.last_requested_fields().unwrap();
    assert!(fields.contains(&"issuetype".to_string()));
    assert!(fields.contains(&"subtasks".to_string()));
    assert!(!fields.contains(&"key".to_string()));
}

#[test]
fn test_get_missing_key_is_validation_error() {
    let backend = setup_backend();
    let err = run(&backend, ScopeDefaults::default(), "get()").unwrap_err();

    assert!(matches!(
        err.root(),
        QueryError::Validation { argument: Some(a), .. } if a == "key"
    ));
}

#[test]
fn test_get_blank_key_is_rejected_before_fetch() {
    let backend = setup_backend();
    for query in [r#"get("")"#, r#"get("  ")"#] {
        let err = run(&backend, ScopeDefaults::default(), query).unwrap_err();
        assert!(matches!(
            err.root(),
            QueryError::Validation { argument: Some(a), .. } if a == "key"
        ));
    }
    assert!(backend.calls().is_empty());
}

#[test]
fn test_get_not_found_is_wrapped_with_statement_context() {
    let backend = setup_backend();
    let err = run(&backend, ScopeDefaults::default(), "get(PROJ-99)").unwrap_err();

    match &err {
        QueryError::Statement {
            operation, index, ..
        } => {
            assert_eq!(operation, "get");
            assert_eq!(*index, 0);
        }
        other => panic!("expected statement wrapper, got {:?}", other),
    }
    assert!(matches!(
        err.root(),
        QueryError::Backend(BackendError::NotFound { .. })
    ));
}

// ============================================================================
// list
// ============================================================================

#[test]
fn test_list_without_project_fails() {
    let backend = setup_backend();
    let err = run(&backend, ScopeDefaults::default(), "list()").unwrap_err();

    assert!(matches!(
        err.root(),
        QueryError::Validation { argument: Some(a), .. } if a == "project"
    ));
    assert!(backend.calls().is_empty());
}

#[test]
fn test_list_uses_configured_default_project() {
    let backend = setup_backend();
    let results = run(&backend, project_defaults(), "list() { minimal }").unwrap();

    assert_eq!(keys(&results[0]).len(), 5);
    assert!(matches!(
        &backend.calls()[0],
        BackendCall::FetchMany { filter, .. } if filter.project.as_deref() == Some("PROJ")
    ));
}

#[test]
fn test_blank_project_falls_back_to_default() {
    let backend = setup_backend();

    let results = run(&backend, project_defaults(), r#"list(project="") { key }"#).unwrap();
    assert_eq!(keys(&results[0]).len(), 5);

    let results = run(&backend, project_defaults(), r#"count(project="")"#).unwrap();
    let record = results[0].as_record().unwrap();
    assert_eq!(record.get("count").and_then(FieldValue::as_int), Some(5));

    let results = run(&backend, project_defaults(), r#"summary(project="")"#).unwrap();
    assert!(results[0].as_record().unwrap().contains_key("project"));
}

#[test]
fn test_blank_project_without_default_fails() {
    let backend = setup_backend();
    let err = run(&backend, ScopeDefaults::default(), r#"count(project=" ")"#).unwrap_err();

    assert!(matches!(
        err.root(),
        QueryError::Validation { argument: Some(a), .. } if a == "project"
    ));
}

#[test]
fn test_list_positional_argument_is_project() {
    let backend = setup_backend();
    let results = run(&backend, ScopeDefaults::default(), "list(PROJ) { minimal }").unwrap();

    assert_eq!(keys(&results[0]).len(), 5);
}

#[test]
fn test_list_backend_filters_are_passed_through() {
    let backend = setup_backend();
    let results = run(
        &backend,
        project_defaults(),
        "list(type=Bug, status=Open) { minimal }",
    )
    .unwrap();

    assert_eq!(keys(&results[0]), vec!["PROJ-2", "PROJ-5"]);
    let expected = IssueFilter {
        project: Some("PROJ".to_string()),
        issue_type: Some("Bug".to_string()),
        status: Some("Open".to_string()),
    };
    assert!(matches!(
        &backend.calls()[0],
        BackendCall::FetchMany { filter, .. } if *filter == expected
    ));
}

#[test]
fn test_list_memory_filters_fetch_unprojected_fields() {
    let backend = setup_backend();
    let results = run(
        &backend,
        project_defaults(),
        "list(assignee=ALICE) { minimal }",
    )
    .unwrap();

    assert_eq!(keys(&results[0]), vec!["PROJ-1", "PROJ-4"]);
    let fields = backend.last_requested_fields().unwrap();
    assert!(fields.contains(&"assignee".to_string()));

    // assignee was only needed for filtering
    let record = results[0].as_list().unwrap()[0].as_record().unwrap();
    assert_eq!(record_keys(record), vec!["key", "status"]);
}

#[test]
fn test_list_priority_filter() {
    let backend = setup_backend();
    let results = run(&backend, project_defaults(), "list(priority=high) { minimal }").unwrap();

    assert_eq!(keys(&results[0]), vec!["PROJ-1", "PROJ-3"]);
}

#[test]
fn test_list_sort_descending() {
    let backend = setup_backend();
    let results = run(&backend, project_defaults(), "list(sort_summary=desc) { key }").unwrap();

    assert_eq!(
        keys(&results[0]),
        vec!["PROJ-1", "PROJ-4", "PROJ-2", "PROJ-3", "PROJ-5"]
    );
}

#[test]
fn test_list_sort_is_stable_on_ties() {
    let backend = setup_backend();
    let results = run(&backend, project_defaults(), "list(sort_status=asc) { key }").unwrap();

    // Done < In Progress < Open; the three Open issues keep fetch order
    assert_eq!(
        keys(&results[0]),
        vec!["PROJ-1", "PROJ-4", "PROJ-2", "PROJ-3", "PROJ-5"]
    );
}

#[test]
fn test_list_sort_field_is_fetched() {
    let backend = setup_backend();
    run(&backend, project_defaults(), "list(sort_priority=asc) { key }").unwrap();

    assert_eq!(
        backend.last_requested_fields(),
        Some(vec!["priority".to_string()])
    );
}

#[test]
fn test_list_rejects_unsortable_field() {
    let backend = setup_backend();
    let err = run(&backend, project_defaults(), "list(sort_labels=asc)").unwrap_err();

    assert!(matches!(
        err.root(),
        QueryError::Validation { argument: Some(a), .. } if a == "sort_labels"
    ));
}

#[test]
fn test_list_rejects_second_sort_argument() {
    let backend = setup_backend();
    let err = run(
        &backend,
        project_defaults(),
        "list(sort_key=asc, sort_status=desc)",
    )
    .unwrap_err();

    assert!(matches!(err.root(), QueryError::Validation { .. }));
}

#[test]
fn test_list_rejects_unknown_argument() {
    let backend = setup_backend();
    let err = run(&backend, project_defaults(), "list(colour=red)").unwrap_err();

    assert!(matches!(
        err.root(),
        QueryError::Validation { argument: Some(a), .. } if a == "colour"
    ));
}

#[test]
fn test_list_pagination_is_clamped() {
    let backend = InMemoryBackend::new();
    for n in 1..=12 {
        backend.add_issue(issue(&format!("PROJ-{}", n), "item", "Open", "Task"));
    }

    let results = run(&backend, project_defaults(), "list(skip=10, take=5) { key }").unwrap();
    assert_eq!(keys(&results[0]), vec!["PROJ-11", "PROJ-12"]);

    let results = run(&backend, project_defaults(), "list(skip=50) { key }").unwrap();
    assert!(keys(&results[0]).is_empty());
}

#[test]
fn test_list_pagination_applies_after_sort() {
    let backend = setup_backend();
    let results = run(
        &backend,
        project_defaults(),
        "list(sort_key=desc, take=2) { key }",
    )
    .unwrap();

    assert_eq!(keys(&results[0]), vec!["PROJ-5", "PROJ-4"]);
}

#[test]
fn test_list_rejects_negative_take() {
    let backend = setup_backend();
    let err = run(&backend, project_defaults(), "list(take=-1)").unwrap_err();

    assert!(matches!(
        err.root(),
        QueryError::Validation { argument: Some(a), .. } if a == "take"
    ));
}

// ============================================================================
// count
// ============================================================================

#[test]
fn test_count_matches_filters() {
    let backend = setup_backend();
    let results = run(&backend, project_defaults(), "count(status=open)").unwrap();

    let record = results[0].as_record().unwrap();
    assert_eq!(record.get("count").and_then(FieldValue::as_int), Some(3));
}

#[test]
fn test_count_ignores_projection_and_pagination() {
    let backend = setup_backend();
    let results = run(&backend, project_defaults(), "count(take=1) { full }").unwrap();

    let record = results[0].as_record().unwrap();
    assert_eq!(record_keys(record), vec!["count"]);
    assert_eq!(record.get("count").and_then(FieldValue::as_int), Some(5));
}

#[test]
fn test_count_validates_sort_and_pagination() {
    let backend = setup_backend();

    let err = run(&backend, project_defaults(), "count(take=abc)").unwrap_err();
    assert!(matches!(
        err.root(),
        QueryError::Validation { argument: Some(a), .. } if a == "take"
    ));

    let err = run(&backend, project_defaults(), "count(sort_bogus=asc)").unwrap_err();
    assert!(matches!(
        err.root(),
        QueryError::Validation { argument: Some(a), .. } if a == "sort_bogus"
    ));
    assert!(backend.calls().is_empty());

    let results = run(&backend, project_defaults(), "count(sort_key=desc, skip=2)").unwrap();
    let record = results[0].as_record().unwrap();
    assert_eq!(record.get("count").and_then(FieldValue::as_int), Some(5));
}

#[test]
fn test_count_requires_project() {
    let backend = setup_backend();
    let err = run(&backend, ScopeDefaults::default(), "count()").unwrap_err();
    assert!(matches!(err.root(), QueryError::Validation { .. }));
}

// ============================================================================
// summary
// ============================================================================

#[test]
fn test_summary_requires_project_or_board() {
    let backend = setup_backend();
    let err = run(&backend, ScopeDefaults::default(), "summary()").unwrap_err();

    assert!(matches!(err.root(), QueryError::Validation { .. }));
}

#[test]
fn test_summary_project_only() {
    let backend = setup_backend();
    let results = run(
        &backend,
        ScopeDefaults::default(),
        "summary(project=PROJ)",
    )
    .unwrap();

    let record = results[0].as_record().unwrap();
    assert_eq!(
        record_keys(record),
        vec!["project", "total_issues", "by_status", "by_type"]
    );
    assert!(!record.contains_key("board"));
    assert_eq!(
        record.get("total_issues").and_then(FieldValue::as_int),
        Some(5)
    );

    let by_status = record.get("by_status").and_then(FieldValue::as_record).unwrap();
    assert_eq!(by_status.get("Open").and_then(FieldValue::as_int), Some(3));
    assert_eq!(by_status.get("Done").and_then(FieldValue::as_int), Some(1));

    let by_type = record.get("by_type").and_then(FieldValue::as_record).unwrap();
    assert_eq!(by_type.get("Story").and_then(FieldValue::as_int), Some(2));
}

#[test]
fn test_summary_excludes_unset_status_from_tally() {
    let backend = setup_backend();
    let mut no_status = issue("PROJ-6", "Draft", "x", "Task");
    no_status.fields.status = None;
    backend.add_issue(no_status);

    let results = run(&backend, project_defaults(), "summary()").unwrap();
    let record = results[0].as_record().unwrap();

    assert_eq!(
        record.get("total_issues").and_then(FieldValue::as_int),
        Some(6)
    );
    let by_status = record.get("by_status").and_then(FieldValue::as_record).unwrap();
    let tallied: i64 = by_status.iter().filter_map(|(_, v)| v.as_int()).sum();
    assert_eq!(tallied, 5);
}

#[test]
fn test_summary_board_from_defaults() {
    let backend = setup_backend();
    let defaults = ScopeDefaults {
        project: None,
        board: Some(42),
    };
    let results = run(&backend, defaults, "summary()").unwrap();

    let record = results[0].as_record().unwrap();
    assert_eq!(record_keys(record), vec!["board"]);
    let board = record.get("board").and_then(FieldValue::as_record).unwrap();
    assert_eq!(board.get("id").and_then(FieldValue::as_int), Some(42));
    assert_eq!(board.get("type").and_then(FieldValue::as_text), Some("scrum"));
}

#[test]
fn test_summary_project_and_board_together() {
    let backend = setup_backend();
    let results = run(&backend, project_defaults(), "summary(board=42)").unwrap();

    let record = results[0].as_record().unwrap();
    assert!(record.contains_key("project"));
    assert!(record.contains_key("board"));
}

#[test]
fn test_summary_rejects_non_numeric_board() {
    let backend = setup_backend();
    let err = run(&backend, project_defaults(), "summary(board=abc)").unwrap_err();

    assert!(matches!(
        err.root(),
        QueryError::Validation { argument: Some(a), .. } if a == "board"
    ));
}

#[test]
fn test_summary_unknown_project_is_not_found() {
    let backend = setup_backend();
    let err = run(&backend, ScopeDefaults::default(), "summary(NOPE)").unwrap_err();

    assert!(matches!(
        err.root(),
        QueryError::Backend(BackendError::NotFound { .. })
    ));
}

// ============================================================================
// search
// ============================================================================

#[test]
fn test_search_by_named_jql() {
    let backend = setup_backend();
    backend.add_raw_query("assignee = currentUser()", &["PROJ-4", "PROJ-1"]);

    let results = run(
        &backend,
        ScopeDefaults::default(),
        r#"search(jql="assignee = currentUser()") { key }"#,
    )
    .unwrap();

    assert_eq!(keys(&results[0]), vec!["PROJ-4", "PROJ-1"]);
}

#[test]
fn test_search_by_positional_string() {
    let backend = setup_backend();
    backend.add_raw_query("status = \"Open\"", &["PROJ-2"]);

    let results = run(
        &backend,
        ScopeDefaults::default(),
        r#"search("status = \"Open\"") { minimal }"#,
    )
    .unwrap();

    assert_eq!(keys(&results[0]), vec!["PROJ-2"]);
    assert_eq!(
        backend.last_requested_fields(),
        Some(vec!["status".to_string()])
    );
}

#[test]
fn test_search_requires_jql() {
    let backend = setup_backend();
    let err = run(&backend, ScopeDefaults::default(), "search()").unwrap_err();

    assert!(matches!(
        err.root(),
        QueryError::Validation { argument: Some(a), .. } if a == "jql"
    ));
}

#[test]
fn test_search_backend_rejection_is_api_error() {
    let backend = setup_backend();
    let err = run(&backend, ScopeDefaults::default(), r#"search(jql="bad ((")"#).unwrap_err();

    assert!(matches!(
        err.root(),
        QueryError::Backend(BackendError::Api { status: 400, .. })
    ));
}

// ============================================================================
// schema and batches
// ============================================================================

#[test]
fn test_schema_operation_describes_language() {
    let backend = InMemoryBackend::new();
    let results = run(&backend, ScopeDefaults::default(), "schema()").unwrap();

    let record = results[0].as_record().unwrap();
    assert!(record.contains_key("operations"));
    assert!(record.contains_key("presets"));
    assert!(backend.calls().is_empty());
}

#[test]
fn test_batch_results_in_statement_order() {
    let backend = setup_backend();
    let results = run(
        &backend,
        ScopeDefaults::default(),
        "get(PROJ-1) { minimal }; get(PROJ-2) { minimal }",
    )
    .unwrap();

    assert_eq!(results.len(), 2);
    let first = results[0].as_record().unwrap();
    let second = results[1].as_record().unwrap();
    assert_eq!(first.get("key").and_then(FieldValue::as_text), Some("PROJ-1"));
    assert_eq!(second.get("key").and_then(FieldValue::as_text), Some("PROJ-2"));

    let text = String::from_utf8(serialize_results(&results).unwrap()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 2);
    assert_eq!(json[1]["key"], "PROJ-2");
}

#[test]
fn test_single_statement_serializes_unwrapped() {
    let backend = setup_backend();
    let results = run(&backend, project_defaults(), "count()").unwrap();

    let text = String::from_utf8(serialize_results(&results).unwrap()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json, serde_json::json!({"count": 5}));
}

#[test]
fn test_batch_fails_fast_with_index() {
    let backend = setup_backend();
    let err = run(
        &backend,
        ScopeDefaults::default(),
        "get(PROJ-1); get(PROJ-404); get(PROJ-2)",
    )
    .unwrap_err();

    assert!(matches!(
        &err,
        QueryError::Statement { index: 1, operation, .. } if operation == "get"
    ));

    // the third statement never ran
    let fetched: Vec<_> = backend
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            BackendCall::FetchOne { key, .. } => Some(key),
            _ => None,
        })
        .collect();
    assert_eq!(fetched, vec!["PROJ-1", "PROJ-404"]);
}
