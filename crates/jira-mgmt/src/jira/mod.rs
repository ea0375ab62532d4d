//! Tracking-service backend abstraction.
//!
//! The query executor talks to the service only through [`IssueBackend`], so
//! the HTTP client can be swapped for the in-memory backend in tests.

pub mod client;
pub mod memory;
pub mod types;

pub use client::{ClientConfig, JiraClient};
pub use memory::InMemoryBackend;
pub use types::{AuthType, Board, InstanceType, Issue, IssueFields, Project};

use crate::errors::BackendError;

/// Server-side filter for multi-issue fetches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueFilter {
    pub project: Option<String>,
    pub issue_type: Option<String>,
    pub status: Option<String>,
}

impl IssueFilter {
    pub fn for_project(project: impl Into<String>) -> Self {
        Self {
            project: Some(project.into()),
            ..Self::default()
        }
    }

    /// Compile to a JQL conjunction.
    ///
    /// ```
    /// use jira_mgmt::jira::IssueFilter;
    ///
    /// let filter = IssueFilter {
    ///     project: Some("PROJ".into()),
    ///     issue_type: Some("Epic".into()),
    ///     status: None,
    /// };
    /// assert_eq!(filter.to_jql(), r#"project = PROJ AND issuetype = "Epic""#);
    /// ```
    pub fn to_jql(&self) -> String {
        let mut clauses = Vec::new();
        if let Some(project) = &self.project {
            clauses.push(format!("project = {}", project));
        }
        if let Some(issue_type) = &self.issue_type {
            clauses.push(format!("issuetype = {}", quote_jql(issue_type)));
        }
        if let Some(status) = &self.status {
            clauses.push(format!("status = {}", quote_jql(status)));
        }
        clauses.join(" AND ")
    }
}

fn quote_jql(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Read access to the tracking service.
///
/// `fields` are backend field identifiers; an empty slice lets the service
/// pick its defaults. Multi-issue fetches must drain every page before
/// returning.
pub trait IssueBackend {
    /// Fetch one issue by key.
    fn fetch_one(&self, key: &str, fields: &[String]) -> Result<Issue, BackendError>;

    /// Fetch every issue matching `filter`.
    fn fetch_many(&self, filter: &IssueFilter, fields: &[String])
        -> Result<Vec<Issue>, BackendError>;

    /// Fetch every issue matching a raw backend query.
    fn fetch_by_raw_query(&self, jql: &str, fields: &[String])
        -> Result<Vec<Issue>, BackendError>;

    fn fetch_project(&self, key: &str) -> Result<Project, BackendError>;

    fn fetch_board(&self, id: u64) -> Result<Board, BackendError>;
}

/// Backend for queries that never read remote data. Every fetch fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineBackend;

impl OfflineBackend {
    fn unavailable() -> BackendError {
        BackendError::Configuration("no instance is available for this query".to_string())
    }
}

impl IssueBackend for OfflineBackend {
    fn fetch_one(&self, _key: &str, _fields: &[String]) -> Result<Issue, BackendError> {
        Err(Self::unavailable())
    }

    fn fetch_many(
        &self,
        _filter: &IssueFilter,
        _fields: &[String],
    ) -> Result<Vec<Issue>, BackendError> {
        Err(Self::unavailable())
    }

    fn fetch_by_raw_query(
        &self,
        _jql: &str,
        _fields: &[String],
    ) -> Result<Vec<Issue>, BackendError> {
        Err(Self::unavailable())
    }

    fn fetch_project(&self, _key: &str) -> Result<Project, BackendError> {
        Err(Self::unavailable())
    }

    fn fetch_board(&self, _id: u64) -> Result<Board, BackendError> {
        Err(Self::unavailable())
    }
}
