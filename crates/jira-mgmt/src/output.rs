//! Result serialization, JSON error envelope and exit codes.
//!
//! Query results always go to stdout as JSON. Errors go to stderr, either as
//! plain text or, with `--json-errors`, as a [`JsonError`] envelope.

use chrono::Utc;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::io::{self, Write};

use crate::errors::{ActionableError, BackendError, QueryError};
use crate::value::FieldValue;

/// Version of the JSON error envelope
const OUTPUT_VERSION: &str = "0.1.0";

/// Render one result per statement.
///
/// A single result is emitted on its own; several results become a JSON
/// array in statement order. Both are indented.
///
/// ```
/// use jira_mgmt::output::serialize_results;
/// use jira_mgmt::value::{FieldValue, Record};
///
/// let one = vec![FieldValue::from(Record::new().with("count", 3usize))];
/// let text = String::from_utf8(serialize_results(&one).unwrap()).unwrap();
/// assert!(text.starts_with('{'));
/// ```
pub fn serialize_results(results: &[FieldValue]) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = match results {
        [single] => serde_json::to_vec_pretty(single)?,
        many => serde_json::to_vec_pretty(many)?,
    };
    buf.push(b'\n');
    Ok(buf)
}

/// Write to stdout, exiting quietly when the reader has gone away.
pub fn write_stdout(bytes: &[u8]) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    match stdout.write_all(bytes).and_then(|_| stdout.flush()) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => std::process::exit(0),
        Err(e) => Err(e),
    }
}

// ============================================================================
// JSON Error Envelope
// ============================================================================

#[derive(Debug, Serialize)]
pub struct JsonError {
    pub success: bool,
    pub error: ErrorDetail,
    pub metadata: Metadata,
}

impl JsonError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
                suggestions: Vec::new(),
            },
            metadata: Metadata::new(command),
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.error.details = Some(details);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.error.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.error.suggestions.extend(suggestions);
        self
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn exit_code(&self) -> ExitCode {
        ErrorCode::to_exit_code(&self.error.code)
    }

    /// Envelope for a query failure, with batch position in `details`.
    pub fn from_query_error(err: &QueryError, command: impl Into<String>) -> Self {
        let mut details = serde_json::Map::new();
        if let QueryError::Statement {
            operation, index, ..
        } = err
        {
            details.insert("operation".into(), operation.clone().into());
            details.insert("statement_index".into(), (*index).into());
        }

        let root = err.root();
        let code = ErrorCode::for_query_error(root);
        match root {
            QueryError::Syntax {
                position, lexeme, ..
            } => {
                details.insert("position".into(), (*position).into());
                details.insert("lexeme".into(), lexeme.clone().into());
            }
            QueryError::Validation {
                operation,
                argument,
                ..
            } => {
                details.insert("operation".into(), operation.clone().into());
                if let Some(argument) = argument {
                    details.insert("argument".into(), argument.clone().into());
                }
            }
            QueryError::Backend(BackendError::Api { status, .. }) => {
                details.insert("status".into(), (*status).into());
            }
            _ => {}
        }

        let mut out = Self::new(code, err.to_string(), command);
        if !details.is_empty() {
            out = out.with_details(Value::Object(details));
        }
        match code {
            ErrorCode::SYNTAX_ERROR => {
                out.with_suggestion("Run 'jira-mgmt schema' to list operations and fields")
            }
            ErrorCode::NOT_FOUND => {
                out.with_suggestion("Check the key or ID; it may have been moved or deleted")
            }
            _ => out,
        }
    }

    pub fn from_actionable(err: &ActionableError, command: impl Into<String>) -> Self {
        Self::new(ErrorCode::CONFIG_ERROR, err.message(), command)
            .with_suggestions(err.remedies().to_vec())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Error code (e.g. "SYNTAX_ERROR", "NOT_FOUND")
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct Metadata {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: chrono::DateTime<Utc>,
    pub version: String,
    pub command: String,
}

impl Metadata {
    fn new(command: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            version: OUTPUT_VERSION.to_string(),
            command: command.into(),
        }
    }
}

fn serialize_timestamp<S>(dt: &chrono::DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&dt.to_rfc3339())
}

// ============================================================================
// Exit Codes
// ============================================================================

/// Process exit codes.
///
/// ```rust
/// use jira_mgmt::output::ExitCode;
///
/// assert_eq!(ExitCode::InvalidArgument.code(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// Generic error (1)
    GenericError = 1,

    /// Query syntax error or bad command-line usage (2)
    InvalidArgument = 2,

    /// Issue, project or board not found (3)
    NotFound = 3,

    /// Missing or malformed operation argument (4)
    ValidationFailed = 4,

    /// Tracking service unreachable or returned an error (10)
    ExternalError = 10,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Success => "Command succeeded",
            ExitCode::GenericError => "Generic error occurred",
            ExitCode::InvalidArgument => "Query syntax error or invalid usage",
            ExitCode::NotFound => "Issue, project or board not found",
            ExitCode::ValidationFailed => "Invalid or missing operation argument",
            ExitCode::ExternalError => "Tracking service unreachable or returned an error",
        }
    }

    pub const ALL: [ExitCode; 6] = [
        ExitCode::Success,
        ExitCode::GenericError,
        ExitCode::InvalidArgument,
        ExitCode::NotFound,
        ExitCode::ValidationFailed,
        ExitCode::ExternalError,
    ];
}

/// Error code strings used in the JSON envelope
pub struct ErrorCode;

impl ErrorCode {
    pub const SYNTAX_ERROR: &'static str = "SYNTAX_ERROR";
    pub const VALIDATION_FAILED: &'static str = "VALIDATION_FAILED";
    pub const NOT_FOUND: &'static str = "NOT_FOUND";
    pub const API_ERROR: &'static str = "API_ERROR";
    pub const NETWORK_ERROR: &'static str = "NETWORK_ERROR";
    pub const CONFIG_ERROR: &'static str = "CONFIG_ERROR";
    pub const INTERNAL_ERROR: &'static str = "INTERNAL_ERROR";

    pub fn to_exit_code(code: &str) -> ExitCode {
        match code {
            Self::SYNTAX_ERROR => ExitCode::InvalidArgument,
            Self::VALIDATION_FAILED => ExitCode::ValidationFailed,
            Self::NOT_FOUND => ExitCode::NotFound,
            Self::API_ERROR | Self::NETWORK_ERROR => ExitCode::ExternalError,
            _ => ExitCode::GenericError,
        }
    }

    /// Code for the innermost error of a query failure.
    pub fn for_query_error(err: &QueryError) -> &'static str {
        match err.root() {
            QueryError::Syntax { .. } => Self::SYNTAX_ERROR,
            QueryError::Validation { .. } => Self::VALIDATION_FAILED,
            QueryError::Backend(BackendError::NotFound { .. }) => Self::NOT_FOUND,
            QueryError::Backend(BackendError::Api { .. })
            | QueryError::Backend(BackendError::Decode(_)) => Self::API_ERROR,
            QueryError::Backend(BackendError::Transport(_)) => Self::NETWORK_ERROR,
            QueryError::Backend(BackendError::Configuration(_)) => Self::CONFIG_ERROR,
            QueryError::Internal(_) | QueryError::Statement { .. } => Self::INTERNAL_ERROR,
        }
    }
}
