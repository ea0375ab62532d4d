//! Error taxonomy and actionable error formatting.
//!
//! [`QueryError`] covers everything that can go wrong between a raw query
//! string and its results. [`BackendError`] is what the tracking-service
//! client reports. [`ActionableError`] wraps setup problems with possible
//! causes and remediation steps for a human reader.

use std::fmt;
use thiserror::Error;

/// Errors reported by an [`IssueBackend`](crate::jira::IssueBackend).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BackendError {
    /// The requested resource does not exist (HTTP 404).
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// The API answered with a non-success status.
    #[error("API error (HTTP {status}): {}", .messages.join("; "))]
    Api { status: u16, messages: Vec<String> },

    /// The request never produced a response.
    #[error("request failed: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The client could not be constructed from the given settings.
    #[error("client configuration: {0}")]
    Configuration(String),
}

/// Errors produced while parsing or executing a query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Malformed query text. Carries the offending lexeme and its byte offset.
    #[error("syntax error at position {position} near {}: {message}", display_lexeme(.lexeme))]
    Syntax {
        message: String,
        position: usize,
        lexeme: String,
    },

    /// Arguments are missing, malformed or unresolvable.
    #[error("{operation}: {message}")]
    Validation {
        operation: String,
        argument: Option<String>,
        message: String,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Broken internal invariant; not actionable by the caller.
    #[error("internal error: {0}")]
    Internal(String),

    /// A statement of a batch failed; wraps the underlying error.
    #[error("statement {index} ({operation}) failed: {source}")]
    Statement {
        operation: String,
        index: usize,
        #[source]
        source: Box<QueryError>,
    },
}

fn display_lexeme(lexeme: &str) -> String {
    if lexeme.is_empty() {
        "end of input".to_string()
    } else {
        format!("'{}'", lexeme)
    }
}

impl QueryError {
    pub fn syntax(message: impl Into<String>, position: usize, lexeme: impl Into<String>) -> Self {
        QueryError::Syntax {
            message: message.into(),
            position,
            lexeme: lexeme.into(),
        }
    }

    pub fn validation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        QueryError::Validation {
            operation: operation.into(),
            argument: None,
            message: message.into(),
        }
    }

    /// Validation error attributed to a specific argument.
    pub fn invalid_argument(
        operation: impl Into<String>,
        argument: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        QueryError::Validation {
            operation: operation.into(),
            argument: Some(argument.into()),
            message: message.into(),
        }
    }

    /// Innermost error, looking through batch wrappers.
    pub fn root(&self) -> &QueryError {
        match self {
            QueryError::Statement { source, .. } => source.root(),
            other => other,
        }
    }
}

/// An error with diagnostic context and remediation steps.
///
/// # Example
///
/// ```
/// use jira_mgmt::errors::ActionableError;
///
/// let error = ActionableError::new("Jira instance URL is not configured")
///     .with_cause("jira-mgmt has not been set up on this machine")
///     .with_remedy("jira-mgmt config set-instance https://example.atlassian.net");
///
/// eprintln!("{}", error);
/// ```
#[derive(Debug, Clone)]
pub struct ActionableError {
    error: String,
    causes: Vec<String>,
    remediation: Vec<String>,
}

impl ActionableError {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            causes: Vec::new(),
            remediation: Vec::new(),
        }
    }

    /// Add a possible cause (diagnostic hint).
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    /// Add a remediation step.
    pub fn with_remedy(mut self, remedy: impl Into<String>) -> Self {
        self.remediation.push(remedy.into());
        self
    }

    pub fn causes(&self) -> &[String] {
        &self.causes
    }

    pub fn remedies(&self) -> &[String] {
        &self.remediation
    }

    pub fn message(&self) -> &str {
        &self.error
    }

    pub fn to_error_message(&self) -> String {
        let mut msg = format!("{}\n", self.error);

        if !self.causes.is_empty() {
            msg.push_str("\nPossible causes:\n");
            for cause in &self.causes {
                msg.push_str(&format!("  • {}\n", cause));
            }
        }

        if !self.remediation.is_empty() {
            msg.push_str("\nTo fix:\n");
            for remedy in &self.remediation {
                msg.push_str(&format!("  • {}\n", remedy));
            }
        }

        msg
    }
}

impl fmt::Display for ActionableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_error_message())
    }
}

impl std::error::Error for ActionableError {}

pub fn instance_not_configured() -> ActionableError {
    ActionableError::new("Jira instance URL is not configured")
        .with_cause("jira-mgmt has not been set up on this machine")
        .with_cause("The config file path points somewhere unexpected")
        .with_remedy("Set the instance: jira-mgmt config set-instance https://<site>.atlassian.net --email <you@example.com>")
        .with_remedy("Inspect the active config: jira-mgmt config show")
}

pub fn token_missing(var: &str) -> ActionableError {
    ActionableError::new(format!("API token not found in ${}", var))
        .with_cause("The token environment variable is not exported in this shell")
        .with_remedy(format!("export {}=<api-token>", var))
        .with_remedy("Cloud tokens are created at https://id.atlassian.com/manage-profile/security/api-tokens")
}

pub fn instance_unreachable(base_url: &str, detail: &str) -> ActionableError {
    ActionableError::new(format!("Could not reach {}", base_url))
        .with_cause(detail.to_string())
        .with_cause("The network or corporate VPN may be down")
        .with_remedy("Check connectivity to the instance in a browser")
        .with_remedy("Verify the instance URL: jira-mgmt config show")
}
