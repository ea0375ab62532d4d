//! HTTP client for the tracking service REST API.
//!
//! Retries 429 and 5xx responses with exponential backoff, never retries 4xx,
//! and drains both pagination styles (cursor on cloud, offset on server)
//! before returning multi-issue results.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::types::{
    ApiErrorBody, AuthType, Board, CursorSearchRequest, CursorSearchResponse, InstanceType,
    Issue, OffsetSearchRequest, OffsetSearchResponse, Project, ServerInfo,
};
use super::{IssueBackend, IssueFilter};
use crate::errors::BackendError;

const API_V3: &str = "/rest/api/3";
const API_V2: &str = "/rest/api/2";
const AGILE: &str = "/rest/agile/1.0";

const MAX_RETRIES: u32 = 3;
const PAGE_SIZE: usize = 100;
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Connection settings for [`JiraClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub email: Option<String>,
    pub token: String,
    pub instance_type: InstanceType,
    /// Inferred from `email` when unset: basic with an email, bearer without.
    pub auth_type: Option<AuthType>,
    pub timeout: Duration,
}

/// Blocking REST client.
pub struct JiraClient {
    base_url: String,
    auth_header: String,
    instance_type: InstanceType,
    agent: ureq::Agent,
}

enum Method {
    Get,
    Post,
}

impl Method {
    fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl JiraClient {
    pub fn new(config: ClientConfig) -> Result<Self, BackendError> {
        if config.base_url.trim().is_empty() {
            return Err(BackendError::Configuration(
                "base URL is required".to_string(),
            ));
        }
        if config.token.is_empty() {
            return Err(BackendError::Configuration("token is required".to_string()));
        }

        let auth_header = build_auth_header(
            config.auth_type,
            config.email.as_deref(),
            &config.token,
        )?;

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_header,
            instance_type: config.instance_type,
            agent,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn instance_type(&self) -> InstanceType {
        self.instance_type
    }

    /// Query `serverInfo` and switch API flavour accordingly. Any failure is
    /// treated as a cloud instance.
    pub fn detect_instance_type(&mut self) -> InstanceType {
        let detected = match self.get_json::<ServerInfo>(&format!("{}/serverInfo", API_V2), &[])
        {
            Ok(info) if info.deployment_type != "Cloud" => InstanceType::Server,
            _ => InstanceType::Cloud,
        };
        info!(?detected, "detected instance type");
        self.instance_type = detected;
        detected
    }

    fn api_path(&self, segments: &[&str]) -> String {
        let base = match self.instance_type {
            InstanceType::Cloud => API_V3,
            InstanceType::Server => API_V2,
        };
        let encoded: Vec<_> = segments.iter().map(|s| urlencoding::encode(s)).collect();
        format!("{}/{}", base, encoded.join("/"))
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, BackendError> {
        let body = self.send(Method::Get, path, query, None::<&()>)?;
        decode(&body)
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        let body = self.send(Method::Post, path, &[], Some(body))?;
        decode(&body)
    }

    fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<String, BackendError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;

        loop {
            debug!(method = method.as_str(), path, attempt, "sending request");

            let result = match method {
                Method::Get => {
                    let mut request = self
                        .agent
                        .get(&url)
                        .header("Authorization", self.auth_header.as_str())
                        .header("Accept", "application/json");
                    for (key, value) in query {
                        request = request.query(*key, value);
                    }
                    request.call()
                }
                Method::Post => {
                    let request = self
                        .agent
                        .post(&url)
                        .header("Authorization", self.auth_header.as_str())
                        .header("Accept", "application/json");
                    match body {
                        Some(body) => request.send_json(body),
                        None => request.send_empty(),
                    }
                }
            };

            match result {
                Ok(mut response) => {
                    let status = response.status().as_u16();
                    let text = response
                        .body_mut()
                        .read_to_string()
                        .map_err(|e| BackendError::Transport(e.to_string()))?;
                    debug!(path, status, bytes = text.len(), "received response");

                    if (200..300).contains(&status) {
                        return Ok(text);
                    }

                    let error = error_from_response(status, &text, path);
                    if is_retryable_status(status) && attempt < MAX_RETRIES {
                        warn!(path, status, attempt, "retrying after error response");
                        std::thread::sleep(backoff(attempt));
                        attempt += 1;
                        continue;
                    }
                    return Err(error);
                }
                Err(e) => {
                    debug!(path, error = %e, "request failed");
                    return Err(transport_error(&self.base_url, &e));
                }
            }
        }
    }

    fn search_all(&self, jql: &str, fields: &[String]) -> Result<Vec<Issue>, BackendError> {
        let issues = match self.instance_type {
            InstanceType::Cloud => drain_cursor_pages(|token| {
                let request = CursorSearchRequest {
                    jql,
                    max_results: PAGE_SIZE,
                    fields,
                    next_page_token: token,
                };
                self.post_json(&format!("{}/search/jql", API_V3), &request)
            })?,
            InstanceType::Server => drain_offset_pages(|start_at| {
                let request = OffsetSearchRequest {
                    jql,
                    max_results: PAGE_SIZE,
                    fields,
                    start_at,
                };
                self.post_json(&format!("{}/search", API_V2), &request)
            })?,
        };
        info!(jql, count = issues.len(), "search complete");
        Ok(issues)
    }
}

impl IssueBackend for JiraClient {
    fn fetch_one(&self, key: &str, fields: &[String]) -> Result<Issue, BackendError> {
        let mut query = Vec::new();
        if !fields.is_empty() {
            query.push(("fields", fields.join(",")));
        }
        self.get_json(&self.api_path(&["issue", key]), &query)
    }

    fn fetch_many(
        &self,
        filter: &IssueFilter,
        fields: &[String],
    ) -> Result<Vec<Issue>, BackendError> {
        self.search_all(&filter.to_jql(), fields)
    }

    fn fetch_by_raw_query(
        &self,
        jql: &str,
        fields: &[String],
    ) -> Result<Vec<Issue>, BackendError> {
        self.search_all(jql, fields)
    }

    fn fetch_project(&self, key: &str) -> Result<Project, BackendError> {
        self.get_json(&self.api_path(&["project", key]), &[])
    }

    fn fetch_board(&self, id: u64) -> Result<Board, BackendError> {
        self.get_json(&format!("{}/board/{}", AGILE, id), &[])
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, BackendError> {
    serde_json::from_str(body).map_err(|e| BackendError::Decode(e.to_string()))
}

/// Build the `Authorization` header value.
pub fn build_auth_header(
    auth_type: Option<AuthType>,
    email: Option<&str>,
    token: &str,
) -> Result<String, BackendError> {
    let email = email.filter(|e| !e.is_empty());
    let auth_type = auth_type.unwrap_or(if email.is_some() {
        AuthType::Basic
    } else {
        AuthType::Bearer
    });

    match auth_type {
        AuthType::Bearer => Ok(format!("Bearer {}", token)),
        AuthType::Basic => {
            let email = email.ok_or_else(|| {
                BackendError::Configuration("email is required for basic auth".to_string())
            })?;
            let credentials = format!("{}:{}", email, token);
            Ok(format!("Basic {}", STANDARD.encode(credentials)))
        }
    }
}

/// Exponential backoff: 1s, 2s, 4s, ... capped at 60s.
pub fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(6)).min(MAX_BACKOFF)
}

/// Transport failures are never retried. Unreachable hosts get the
/// connectivity hint.
fn transport_error(base_url: &str, error: &ureq::Error) -> BackendError {
    match error {
        ureq::Error::Io(_)
        | ureq::Error::Timeout(_)
        | ureq::Error::HostNotFound
        | ureq::Error::ConnectionFailed => BackendError::Transport(format!(
            "could not reach {} ({}); check the network connection or VPN",
            base_url, error
        )),
        other => BackendError::Transport(other.to_string()),
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || status >= 500
}

fn error_from_response(status: u16, body: &str, path: &str) -> BackendError {
    if status == 404 {
        return BackendError::NotFound {
            resource: path.to_string(),
        };
    }
    let mut messages = serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.messages())
        .unwrap_or_default();
    if messages.is_empty() {
        messages.push(if body.trim().is_empty() {
            format!("HTTP {}", status)
        } else {
            body.trim().to_string()
        });
    }
    BackendError::Api { status, messages }
}

/// Follow `nextPageToken` until the service reports the last page.
pub fn drain_cursor_pages<F>(mut fetch: F) -> Result<Vec<Issue>, BackendError>
where
    F: FnMut(Option<&str>) -> Result<CursorSearchResponse, BackendError>,
{
    let mut all = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = fetch(token.as_deref())?;
        all.extend(page.issues);
        match page.next_page_token {
            Some(next) if !page.is_last && !next.is_empty() => token = Some(next),
            _ => break,
        }
    }
    Ok(all)
}

/// Advance `startAt` until `total` is reached or a page comes back empty.
pub fn drain_offset_pages<F>(mut fetch: F) -> Result<Vec<Issue>, BackendError>
where
    F: FnMut(usize) -> Result<OffsetSearchResponse, BackendError>,
{
    let mut all = Vec::new();
    let mut start_at = 0;
    loop {
        let page = fetch(start_at)?;
        let received = page.issues.len();
        let is_last = page.start_at + received >= page.total;
        all.extend(page.issues);
        if is_last || received == 0 {
            break;
        }
        start_at += received;
    }
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(key: &str) -> Issue {
        Issue {
            key: key.to_string(),
            ..Issue::default()
        }
    }

    #[test]
    fn test_basic_auth_header() {
        let header = build_auth_header(None, Some("me@example.com"), "secret").unwrap();
        assert_eq!(
            header,
            format!("Basic {}", STANDARD.encode("me@example.com:secret"))
        );
    }

    #[test]
    fn test_bearer_when_no_email() {
        let header = build_auth_header(None, None, "pat").unwrap();
        assert_eq!(header, "Bearer pat");
    }

    #[test]
    fn test_basic_without_email_fails() {
        let result = build_auth_header(Some(AuthType::Basic), None, "secret");
        assert!(matches!(result, Err(BackendError::Configuration(_))));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        assert_eq!(backoff(0), Duration::from_secs(1));
        assert_eq!(backoff(1), Duration::from_secs(2));
        assert_eq!(backoff(2), Duration::from_secs(4));
        assert_eq!(backoff(10), Duration::from_secs(60));
    }

    #[test]
    fn test_error_from_response_not_found() {
        let err = error_from_response(404, "", "/rest/api/3/issue/X-1");
        assert!(matches!(err, BackendError::NotFound { .. }));
    }

    #[test]
    fn test_error_from_response_parses_body() {
        let err = error_from_response(
            400,
            r#"{"errorMessages":["The value 'X' does not exist"]}"#,
            "/search",
        );
        assert_eq!(
            err,
            BackendError::Api {
                status: 400,
                messages: vec!["The value 'X' does not exist".to_string()],
            }
        );
    }

    #[test]
    fn test_error_from_response_unparseable_body() {
        let err = error_from_response(502, "", "/search");
        assert_eq!(
            err,
            BackendError::Api {
                status: 502,
                messages: vec!["HTTP 502".to_string()],
            }
        );
    }

    #[test]
    fn test_drain_cursor_pages_follows_tokens() {
        let mut calls = Vec::new();
        let issues = drain_cursor_pages(|token| {
            calls.push(token.map(str::to_string));
            Ok(match token {
                None => CursorSearchResponse {
                    issues: vec![issue("A-1"), issue("A-2")],
                    next_page_token: Some("t1".to_string()),
                    is_last: false,
                },
                Some("t1") => CursorSearchResponse {
                    issues: vec![issue("A-3")],
                    next_page_token: None,
                    is_last: true,
                },
                Some(other) => panic!("unexpected token {}", other),
            })
        })
        .unwrap();

        assert_eq!(issues.len(), 3);
        assert_eq!(calls, vec![None, Some("t1".to_string())]);
    }

    #[test]
    fn test_drain_offset_pages_advances_start() {
        let mut starts = Vec::new();
        let issues = drain_offset_pages(|start_at| {
            starts.push(start_at);
            let keys: Vec<Issue> = match start_at {
                0 => vec![issue("A-1"), issue("A-2")],
                2 => vec![issue("A-3")],
                _ => vec![],
            };
            Ok(OffsetSearchResponse {
                start_at,
                max_results: 2,
                total: 3,
                issues: keys,
            })
        })
        .unwrap();

        assert_eq!(issues.len(), 3);
        assert_eq!(starts, vec![0, 2]);
    }

    #[test]
    fn test_drain_offset_pages_stops_on_empty_page() {
        let issues = drain_offset_pages(|start_at| {
            Ok(OffsetSearchResponse {
                start_at,
                max_results: 100,
                total: 500,
                issues: vec![],
            })
        })
        .unwrap();
        assert!(issues.is_empty());
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = JiraClient::new(ClientConfig {
            base_url: "https://example.atlassian.net/".to_string(),
            email: Some("me@example.com".to_string()),
            token: "t".to_string(),
            instance_type: InstanceType::Server,
            auth_type: None,
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        assert_eq!(client.base_url(), "https://example.atlassian.net");
        assert_eq!(client.api_path(&["issue", "A-1"]), "/rest/api/2/issue/A-1");
    }

    #[test]
    fn test_api_path_encodes_segments() {
        let client = JiraClient::new(ClientConfig {
            base_url: "https://example.atlassian.net".to_string(),
            email: None,
            token: "t".to_string(),
            instance_type: InstanceType::Cloud,
            auth_type: None,
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        assert_eq!(
            client.api_path(&["issue", "../../2/myself"]),
            "/rest/api/3/issue/..%2F..%2F2%2Fmyself"
        );
        assert_eq!(client.api_path(&["issue", "PROJ-12"]), "/rest/api/3/issue/PROJ-12");
    }

    #[test]
    fn test_unreachable_errors_carry_hint() {
        let refused = ureq::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "Connection refused",
        ));
        for error in [refused, ureq::Error::HostNotFound, ureq::Error::ConnectionFailed] {
            match transport_error("http://jira.local", &error) {
                BackendError::Transport(msg) => {
                    assert!(msg.contains("could not reach http://jira.local"), "{}", msg)
                }
                other => panic!("unexpected {:?}", other),
            }
        }

        let other = transport_error("http://jira.local", &ureq::Error::BadUri("x".to_string()));
        assert!(matches!(other, BackendError::Transport(msg) if !msg.contains("could not reach")));
    }

    #[test]
    fn test_refused_connection_fails_without_retry() {
        let client = JiraClient::new(ClientConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            email: None,
            token: "t".to_string(),
            instance_type: InstanceType::Cloud,
            auth_type: None,
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        let started = std::time::Instant::now();
        let err = client.fetch_one("A-1", &[]).unwrap_err();

        assert!(matches!(err, BackendError::Transport(_)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_client_requires_token() {
        let result = JiraClient::new(ClientConfig {
            base_url: "https://example.atlassian.net".to_string(),
            email: None,
            token: String::new(),
            instance_type: InstanceType::Cloud,
            auth_type: None,
            timeout: Duration::from_secs(5),
        });
        assert!(result.is_err());
    }
}
