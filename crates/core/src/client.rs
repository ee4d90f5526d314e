use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH,
};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::cache::{CachedResponse, HttpCache};
use crate::json::to_pretty_string;
use crate::model::{Party, QuestContent, ScoreDirection, Task, User, UserState};

pub const DEFAULT_BASE_URL: &str = "https://habitica.com/api/v3";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const API_USER_HEADER: &str = "x-api-user";
const API_KEY_HEADER: &str = "x-api-key";
const CLIENT_HEADER: &str = "x-client";

/// API key pair identifying the account every request acts as.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_user: String,
    pub api_key: String,
}

impl Credentials {
    pub fn new(api_user: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { api_user: api_user.into(), api_key: api_key.into() }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_user", &self.api_user)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Everything fixed at client construction.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub credentials: Credentials,
    pub user_agent: String,
    /// Value for the `x-client` header the service asks third-party tools
    /// to send.
    pub client_id: Option<String>,
    /// Response cache directory; `None` disables caching.
    pub cache_dir: Option<PathBuf>,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url should parse"),
            credentials,
            user_agent: default_user_agent(),
            client_id: None,
            cache_dir: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_client_id(mut self, client_id: Option<String>) -> Self {
        self.client_id = client_id;
        self
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(cache_dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub fn default_user_agent() -> String {
    format!(
        "habits/{} ({}) reqwest",
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_REPOSITORY")
    )
}

#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("invalid value for header `{name}`")]
    InvalidHeader {
        name: &'static str,
        #[source]
        source: InvalidHeaderValue,
    },

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// How a failed request is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 4xx: the request was at fault (unknown task, bad credentials).
    Client,
    /// 5xx: the service was at fault.
    Server,
    /// Any other non-success status.
    UnknownStatus,
    /// Success status, but the body was not the expected JSON.
    MalformedResponse,
    /// No response at all (DNS, refused connection, timeout).
    Transport,
}

impl ErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            400..=499 => Self::Client,
            500..=599 => Self::Server,
            _ => Self::UnknownStatus,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Client => "Client",
            Self::Server => "Server",
            Self::UnknownStatus => "Unknown",
            Self::MalformedResponse => "Malformed Response",
            Self::Transport => "Transport",
        }
    }
}

/// Response body kept for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorBody {
    Json(Value),
    Text(String),
}

impl ErrorBody {
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str(raw) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(raw.to_string()),
        }
    }

    pub fn render(&self) -> String {
        match self {
            Self::Json(value) => to_pretty_string(value),
            Self::Text(text) => text.clone(),
        }
    }
}

#[derive(Debug)]
pub struct RequestError {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub reason: String,
    pub url: String,
    pub body: Option<ErrorBody>,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl RequestError {
    pub fn from_status(status: StatusCode, url: impl Into<String>, raw_body: &str) -> Self {
        Self {
            kind: ErrorKind::from_status(status.as_u16()),
            status: Some(status.as_u16()),
            reason: status.canonical_reason().unwrap_or("").to_string(),
            url: url.into(),
            body: Some(ErrorBody::parse(raw_body)),
            source: None,
        }
    }

    pub fn malformed(
        url: impl Into<String>,
        reason: impl Into<String>,
        raw_body: Option<&str>,
        source: Option<serde_json::Error>,
    ) -> Self {
        Self {
            kind: ErrorKind::MalformedResponse,
            status: None,
            reason: reason.into(),
            url: url.into(),
            body: raw_body.map(|raw| ErrorBody::Text(raw.to_string())),
            source: source.map(|error| Box::new(error) as Box<dyn StdError + Send + Sync>),
        }
    }

    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self {
            kind: ErrorKind::Transport,
            status: None,
            reason: source.to_string(),
            url: url.into(),
            body: None,
            source: Some(Box::new(source)),
        }
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(status) = self.status {
            write!(f, "{status} ")?;
        }
        write!(f, "{} Error: {} for URL: {}", self.kind.label(), self.reason, self.url)
    }
}

impl StdError for RequestError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_deref().map(|error| error as &(dyn StdError + 'static))
    }
}

/// Client for the Habitica v3 API.
///
/// Every call is fail-fast: the first non-success status, transport
/// failure or unparseable body is returned as a [`RequestError`] and
/// nothing is retried.
#[derive(Debug)]
pub struct HabiticaClient {
    http: reqwest::Client,
    base_url: Url,
    api_user: String,
    cache: Option<HttpCache>,
}

impl HabiticaClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientBuildError> {
        let mut headers = HeaderMap::new();
        insert_header(&mut headers, API_USER_HEADER, &config.credentials.api_user, false)?;
        insert_header(&mut headers, API_KEY_HEADER, &config.credentials.api_key, true)?;
        if let Some(client_id) = &config.client_id {
            insert_header(&mut headers, CLIENT_HEADER, client_id, false)?;
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()?;

        let cache = config.cache_dir.as_ref().and_then(|dir| match HttpCache::open(dir) {
            Ok(cache) => Some(cache),
            Err(error) => {
                warn!(dir = %dir.display(), %error, "response cache unavailable; continuing without it");
                None
            }
        });

        Ok(Self { http, base_url: config.base_url, api_user: config.credentials.api_user, cache })
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path.trim_start_matches('/'))
    }

    pub async fn get(&self, path: &str) -> Result<Value, RequestError> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str) -> Result<Value, RequestError> {
        self.request(Method::POST, path, None).await
    }

    /// Issue one request and return its JSON body.
    ///
    /// GETs go through the response cache when one is configured; other
    /// methods always hit the network.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, RequestError> {
        let url = self.url_for(path);
        let cache = self.cache.as_ref().filter(|_| method == Method::GET);
        let cache_key = cache.map(|_| HttpCache::key(&url, &self.api_user));
        let cached = match (cache, &cache_key) {
            (Some(cache), Some(key)) => cache.load(key),
            _ => None,
        };

        if let Some(entry) = cached.as_ref().filter(|entry| entry.is_fresh(Utc::now())) {
            debug!(%url, "serving fresh cached response");
            return parse_body(&url, &entry.body);
        }

        let mut builder = self.http.request(method.clone(), &url);
        if let Some(entry) = &cached {
            if let Some(etag) = &entry.etag {
                builder = builder.header(IF_NONE_MATCH, etag);
            }
            if let Some(last_modified) = &entry.last_modified {
                builder = builder.header(IF_MODIFIED_SINCE, last_modified);
            }
        }
        builder = match body {
            Some(body) => builder.json(body),
            None if method != Method::GET => builder.body(""),
            None => builder,
        };

        debug!(%method, %url, conditional = cached.is_some(), "sending request");
        let response = builder.send().await.map_err(|error| RequestError::transport(&url, error))?;
        let status = response.status();
        let headers = response.headers().clone();

        if status == StatusCode::NOT_MODIFIED {
            if let (Some(mut entry), Some(cache), Some(key)) = (cached, cache, &cache_key) {
                debug!(%url, "cached response revalidated");
                entry.refresh(&headers, Utc::now());
                cache.store(key, &entry);
                return parse_body(&url, &entry.body);
            }
        }

        let text = response.text().await.map_err(|error| RequestError::transport(&url, error))?;
        if !status.is_success() {
            debug!(%url, status = status.as_u16(), "request failed");
            return Err(RequestError::from_status(status, url, &text));
        }

        let value = parse_body(&url, &text)?;
        if let (Some(cache), Some(key)) = (cache, &cache_key) {
            let entry = (status == StatusCode::OK)
                .then(|| CachedResponse::from_response(&url, &headers, text, Utc::now()))
                .flatten();
            match entry {
                Some(entry) => cache.store(key, &entry),
                None => cache.remove(key),
            }
        }
        Ok(value)
    }

    /// GET `path` and decode the `data` member of the response envelope.
    pub async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<T, RequestError> {
        let value = self.get(path).await?;
        decode_data(self.url_for(path), value)
    }

    pub async fn user_state(&self) -> Result<UserState, RequestError> {
        self.get_data("/user").await
    }

    pub async fn user(&self) -> Result<User, RequestError> {
        self.get_data("/user").await
    }

    pub async fn tasks(&self) -> Result<Vec<Task>, RequestError> {
        self.get_data("/tasks/user").await
    }

    pub async fn party(&self) -> Result<Party, RequestError> {
        self.get_data("/groups/party").await
    }

    /// Look up one quest definition in the game content catalogue.
    pub async fn quest_content(&self, key: &str) -> Result<Option<QuestContent>, RequestError> {
        let url = self.url_for("/content");
        let mut quests: serde_json::Map<String, Value> = self.get_data("/content").await.and_then(
            |content: Value| match content.get("quests") {
                Some(Value::Object(quests)) => Ok(quests.clone()),
                _ => Err(RequestError::malformed(&url, "content has no `quests` object", None, None)),
            },
        )?;
        quests
            .remove(key)
            .map(|quest| {
                serde_json::from_value(quest).map_err(|error| {
                    RequestError::malformed(&url, format!("quest `{key}`: {error}"), None, Some(error))
                })
            })
            .transpose()
    }

    /// Apply today's reset on the service. Not idempotent.
    pub async fn run_cron(&self) -> Result<Value, RequestError> {
        self.post("/cron").await
    }

    pub async fn score_task(
        &self,
        task_id: &str,
        direction: ScoreDirection,
    ) -> Result<Value, RequestError> {
        self.post(&format!("/tasks/{task_id}/score/{direction}")).await
    }
}

fn insert_header(
    headers: &mut HeaderMap,
    name: &'static str,
    value: &str,
    sensitive: bool,
) -> Result<(), ClientBuildError> {
    let mut value = HeaderValue::from_str(value)
        .map_err(|source| ClientBuildError::InvalidHeader { name, source })?;
    value.set_sensitive(sensitive);
    headers.insert(HeaderName::from_static(name), value);
    Ok(())
}

fn parse_body(url: &str, raw: &str) -> Result<Value, RequestError> {
    serde_json::from_str(raw).map_err(|error| {
        RequestError::malformed(url, format!("response is not JSON: {error}"), Some(raw), Some(error))
    })
}

fn decode_data<T: DeserializeOwned>(url: String, value: Value) -> Result<T, RequestError> {
    let data = match value {
        Value::Object(mut envelope) => envelope.remove("data"),
        _ => None,
    }
    .ok_or_else(|| RequestError::malformed(&url, "response has no `data` member", None, None))?;

    serde_json::from_value(data).map_err(|error| {
        RequestError::malformed(&url, format!("unexpected `data` shape: {error}"), None, Some(error))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_status_ranges() {
        assert_eq!(ErrorKind::from_status(400), ErrorKind::Client);
        assert_eq!(ErrorKind::from_status(404), ErrorKind::Client);
        assert_eq!(ErrorKind::from_status(499), ErrorKind::Client);
        assert_eq!(ErrorKind::from_status(500), ErrorKind::Server);
        assert_eq!(ErrorKind::from_status(599), ErrorKind::Server);
        assert_eq!(ErrorKind::from_status(304), ErrorKind::UnknownStatus);
        assert_eq!(ErrorKind::from_status(600), ErrorKind::UnknownStatus);
    }

    #[test]
    fn status_error_display_names_kind_reason_and_url() {
        let error = RequestError::from_status(
            StatusCode::NOT_FOUND,
            "https://habitica.com/api/v3/user",
            "{\"error\":\"NotFound\"}",
        );
        assert_eq!(
            error.to_string(),
            "404 Client Error: Not Found for URL: https://habitica.com/api/v3/user"
        );
        assert_eq!(error.body, Some(ErrorBody::Json(json!({"error": "NotFound"}))));
    }

    #[test]
    fn non_json_error_body_is_kept_as_text() {
        let error = RequestError::from_status(
            StatusCode::BAD_GATEWAY,
            "https://habitica.com/api/v3/cron",
            "<html>bad gateway</html>",
        );
        assert_eq!(error.kind, ErrorKind::Server);
        assert_eq!(error.body, Some(ErrorBody::Text("<html>bad gateway</html>".into())));
        assert_eq!(error.body.unwrap().render(), "<html>bad gateway</html>");
    }

    #[test]
    fn decode_data_requires_envelope() {
        let error = decode_data::<UserState>("u".into(), json!({"success": true}))
            .expect_err("missing data should fail");
        assert_eq!(error.kind, ErrorKind::MalformedResponse);

        let error = decode_data::<UserState>("u".into(), json!({"data": {"needsCron": true}}))
            .expect_err("missing lastCron should fail");
        assert_eq!(error.kind, ErrorKind::MalformedResponse);
        assert!(error.source().is_some());
    }

    #[test]
    fn credentials_debug_hides_key() {
        let rendered = format!("{:?}", Credentials::new("user-1", "secret-key"));
        assert!(rendered.contains("user-1"));
        assert!(!rendered.contains("secret-key"));
    }

    #[test]
    fn url_for_joins_without_double_slashes() {
        let config = ClientConfig::new(Credentials::new("u", "k"))
            .with_base_url(Url::parse("https://example.test/api/v3/").unwrap());
        let client = HabiticaClient::new(config).unwrap();
        assert_eq!(client.url_for("/tasks/user"), "https://example.test/api/v3/tasks/user");
        assert_eq!(client.url_for("cron"), "https://example.test/api/v3/cron");
    }

    #[test]
    fn rejects_credentials_that_cannot_be_headers() {
        let config = ClientConfig::new(Credentials::new("user\n1", "k"));
        let error = HabiticaClient::new(config).expect_err("newline is not a valid header value");
        assert!(matches!(error, ClientBuildError::InvalidHeader { name: "x-api-user", .. }));
    }
}
