//! In-memory backend for testing.
//!
//! Holds issues, projects and boards in RAM and records every request, so
//! tests can assert on which backend fields and filters the executor asked
//! for. Clones share the same data.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::types::{Board, Issue, Project};
use super::{IssueBackend, IssueFilter};
use crate::errors::BackendError;

/// One recorded call against the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    FetchOne { key: String, fields: Vec<String> },
    FetchMany { filter: IssueFilter, fields: Vec<String> },
    RawQuery { jql: String, fields: Vec<String> },
    Project { key: String },
    Board { id: u64 },
}

#[derive(Clone, Default)]
pub struct InMemoryBackend {
    issues: Rc<RefCell<Vec<Issue>>>,
    projects: Rc<RefCell<HashMap<String, Project>>>,
    boards: Rc<RefCell<HashMap<u64, Board>>>,
    raw_queries: Rc<RefCell<HashMap<String, Vec<String>>>>,
    calls: Rc<RefCell<Vec<BackendCall>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_issue(&self, issue: Issue) {
        self.issues.borrow_mut().push(issue);
    }

    pub fn add_project(&self, project: Project) {
        self.projects
            .borrow_mut()
            .insert(project.key.clone(), project);
    }

    pub fn add_board(&self, board: Board) {
        self.boards.borrow_mut().insert(board.id, board);
    }

    /// Register the issue keys a raw query should return, in order.
    pub fn add_raw_query(&self, jql: &str, keys: &[&str]) {
        self.raw_queries.borrow_mut().insert(
            jql.to_string(),
            keys.iter().map(|k| k.to_string()).collect(),
        );
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.borrow().clone()
    }

    /// Fields requested by the most recent issue fetch of any kind.
    pub fn last_requested_fields(&self) -> Option<Vec<String>> {
        self.calls.borrow().iter().rev().find_map(|call| match call {
            BackendCall::FetchOne { fields, .. }
            | BackendCall::FetchMany { fields, .. }
            | BackendCall::RawQuery { fields, .. } => Some(fields.clone()),
            _ => None,
        })
    }

    fn record(&self, call: BackendCall) {
        self.calls.borrow_mut().push(call);
    }
}

fn matches_name(actual: Option<&str>, wanted: &Option<String>) -> bool {
    match wanted {
        None => true,
        Some(w) => actual.is_some_and(|a| a.eq_ignore_ascii_case(w)),
    }
}

impl IssueBackend for InMemoryBackend {
    fn fetch_one(&self, key: &str, fields: &[String]) -> Result<Issue, BackendError> {
        self.record(BackendCall::FetchOne {
            key: key.to_string(),
            fields: fields.to_vec(),
        });
        self.issues
            .borrow()
            .iter()
            .find(|i| i.key == key)
            .cloned()
            .ok_or_else(|| BackendError::NotFound {
                resource: format!("issue {}", key),
            })
    }

    fn fetch_many(
        &self,
        filter: &IssueFilter,
        fields: &[String],
    ) -> Result<Vec<Issue>, BackendError> {
        self.record(BackendCall::FetchMany {
            filter: filter.clone(),
            fields: fields.to_vec(),
        });
        Ok(self
            .issues
            .borrow()
            .iter()
            .filter(|i| matches_name(i.fields.project_key(), &filter.project))
            .filter(|i| matches_name(i.fields.type_name(), &filter.issue_type))
            .filter(|i| matches_name(i.fields.status_name(), &filter.status))
            .cloned()
            .collect())
    }

    fn fetch_by_raw_query(
        &self,
        jql: &str,
        fields: &[String],
    ) -> Result<Vec<Issue>, BackendError> {
        self.record(BackendCall::RawQuery {
            jql: jql.to_string(),
            fields: fields.to_vec(),
        });
        let keys = self
            .raw_queries
            .borrow()
            .get(jql)
            .cloned()
            .ok_or_else(|| BackendError::Api {
                status: 400,
                messages: vec![format!("Error in the JQL Query: {}", jql)],
            })?;
        let issues = self.issues.borrow();
        Ok(keys
            .iter()
            .filter_map(|k| issues.iter().find(|i| &i.key == k).cloned())
            .collect())
    }

    fn fetch_project(&self, key: &str) -> Result<Project, BackendError> {
        self.record(BackendCall::Project {
            key: key.to_string(),
        });
        self.projects
            .borrow()
            .get(key)
            .cloned()
            .ok_or_else(|| BackendError::NotFound {
                resource: format!("project {}", key),
            })
    }

    fn fetch_board(&self, id: u64) -> Result<Board, BackendError> {
        self.record(BackendCall::Board { id });
        self.boards
            .borrow()
            .get(&id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound {
                resource: format!("board {}", id),
            })
    }
}
