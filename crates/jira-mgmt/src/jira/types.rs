//! REST resource types for the tracking service.
//!
//! Only the fields the query layer reads are modelled. Everything is
//! `#[serde(default)]` because the client asks for narrow field sets and the
//! service omits whatever was not requested.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Deployment flavour of the remote instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InstanceType {
    /// Hosted cloud site: REST v3, cursor-paginated search.
    #[default]
    Cloud,
    /// Server / Data Center: REST v2, offset-paginated search.
    Server,
}

/// Authentication scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    /// Email + API token.
    Basic,
    /// Personal access token.
    Bearer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Issue {
    pub id: String,
    pub key: String,
    pub fields: IssueFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IssueFields {
    pub summary: Option<String>,
    /// Plain string on v2, rich-text document on v3.
    pub description: Option<serde_json::Value>,
    #[serde(rename = "issuetype")]
    pub issue_type: Option<IssueType>,
    pub project: Option<Project>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub assignee: Option<User>,
    pub reporter: Option<User>,
    pub labels: Vec<String>,
    pub parent: Option<Box<Issue>>,
    pub subtasks: Vec<Issue>,
    pub created: Option<String>,
    pub updated: Option<String>,
}

impl IssueFields {
    /// Description flattened to plain text.
    pub fn description_text(&self) -> Option<String> {
        match self.description.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => match serde_json::from_value::<AdfNode>(other.clone()) {
                Ok(doc) => Some(doc.plain_text()),
                Err(_) => Some(other.to_string()),
            },
        }
    }

    pub fn status_name(&self) -> Option<&str> {
        self.status.as_ref().map(|s| s.name.as_str())
    }

    pub fn type_name(&self) -> Option<&str> {
        self.issue_type
            .as_ref()
            .map(|t| t.name.as_str())
            .filter(|n| !n.is_empty())
    }

    pub fn priority_name(&self) -> Option<&str> {
        self.priority.as_ref().map(|p| p.name.as_str())
    }

    pub fn assignee_name(&self) -> Option<&str> {
        self.assignee.as_ref().map(|u| u.display_name.as_str())
    }

    pub fn reporter_name(&self) -> Option<&str> {
        self.reporter.as_ref().map(|u| u.display_name.as_str())
    }

    pub fn project_key(&self) -> Option<&str> {
        self.project.as_ref().map(|p| p.key.as_str())
    }
}

/// Node of the rich-text document format. The document root is itself a node
/// of type `doc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AdfNode {
    #[serde(rename = "type")]
    pub node_type: String,
    pub text: Option<String>,
    pub content: Vec<AdfNode>,
}

impl AdfNode {
    /// Concatenated text; paragraphs, headings and list items end in a newline.
    pub fn plain_text(&self) -> String {
        let mut buf = String::new();
        self.collect_text(&mut buf);
        buf
    }

    fn collect_text(&self, buf: &mut String) {
        if let Some(text) = &self.text {
            buf.push_str(text);
        }
        for child in &self.content {
            child.collect_text(buf);
        }
        if matches!(
            self.node_type.as_str(),
            "paragraph" | "heading" | "listItem"
        ) {
            buf.push('\n');
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IssueType {
    pub id: String,
    pub name: String,
    pub subtask: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Status {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Priority {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct User {
    pub account_id: String,
    pub display_name: String,
    pub email_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub key: String,
    pub name: String,
    pub project_type_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Board {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub board_type: String,
}

/// Body of `POST /rest/api/3/search/jql`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorSearchRequest<'a> {
    pub jql: &'a str,
    pub max_results: usize,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub fields: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<&'a str>,
}

/// Body of `POST /rest/api/2/search`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OffsetSearchRequest<'a> {
    pub jql: &'a str,
    pub max_results: usize,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub fields: &'a [String],
    pub start_at: usize,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct CursorSearchResponse {
    pub issues: Vec<Issue>,
    pub next_page_token: Option<String>,
    pub is_last: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct OffsetSearchResponse {
    pub start_at: usize,
    pub max_results: usize,
    pub total: usize,
    pub issues: Vec<Issue>,
}

/// Error body returned by the REST API.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiErrorBody {
    pub error_messages: Vec<String>,
    pub errors: BTreeMap<String, String>,
}

impl ApiErrorBody {
    /// All messages, field errors rendered as `field: message`.
    pub fn messages(&self) -> Vec<String> {
        self.error_messages
            .iter()
            .cloned()
            .chain(self.errors.iter().map(|(f, m)| format!("{}: {}", f, m)))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerInfo {
    pub deployment_type: String,
}
