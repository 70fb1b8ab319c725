//! # REST Transport
//!
//! The store's single external collaborator: something that can send a
//! JSON request to the backend and hand back the decoded JSON body.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Transport Flow                                  │
//! │                                                                         │
//! │  ModelFacade::get(filter)                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiRequest { GET, "/booking", [("where", ..), ("sort_by", ..)] }       │
//! │       │                                                                 │
//! │       ▼  Transport::send                                                │
//! │  ┌──────────────────┐        ┌──────────────────┐                       │
//! │  │  HttpTransport   │ ─────► │  REST backend    │                       │
//! │  │  (reqwest)       │ ◄───── │  { results: .. } │                       │
//! │  └──────────────────┘        └──────────────────┘                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Ok(Value)  or  Err(StoreError::{Http, Network, InvalidResponse})       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no retry and no request deduplication at this layer. Timeouts
//! are the HTTP client's, taken from configuration.

use std::future::Future;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::Value;
use tracing::{debug, error, warn};
use url::Url;
use uuid::Uuid;

use atrium_core::{format_search, Filter, StoreError, StoreResult};

use crate::config::ApiSettings;
use crate::error::{request_error, ClientError, ClientResult};

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// =============================================================================
// Requests
// =============================================================================

/// HTTP verbs the store uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiMethod {
    Get,
    Post,
    Patch,
}

impl std::fmt::Display for ApiMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiMethod::Get => write!(f, "GET"),
            ApiMethod::Post => write!(f, "POST"),
            ApiMethod::Patch => write!(f, "PATCH"),
        }
    }
}

/// One REST call, independent of any HTTP library.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: ApiMethod,
    /// Path relative to the API base URL, e.g. `/booking/b1`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    fn new(method: ApiMethod, path: impl Into<String>) -> Self {
        ApiRequest {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(ApiMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(ApiMethod::Post, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(ApiMethod::Patch, path)
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Bytes escaped inside one path segment: the URL path set plus `/` and
/// `%`, so a segment can never add segments, a query or a fragment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'%');

/// Joins raw segments into a request path, percent-encoding each one.
///
/// `resource_path(["booking", "a/b"])` is `/booking/a%2Fb`. Dot segments
/// are passed through; callers reject them before building a path.
pub fn resource_path<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    segments.into_iter().fold(String::new(), |mut path, segment| {
        path.push('/');
        path.extend(utf8_percent_encode(segment.as_ref(), SEGMENT));
        path
    })
}

/// Serializes a filter into query parameters.
///
/// The `where` clause is encoded separately by [`format_search`]; the
/// remaining fields follow in a fixed order.
pub fn filter_query(filter: &Filter) -> Vec<(String, String)> {
    let mut query = Vec::new();

    if let Some(clause) = &filter.where_clause {
        query.push(("where".to_string(), format_search(clause)));
    }
    if let Some(sort_by) = &filter.sort_by {
        query.push(("sort_by".to_string(), sort_by.clone()));
    }
    if let Some(limit) = filter.limit {
        query.push(("limit".to_string(), limit.to_string()));
    }
    if let Some(page) = filter.page {
        query.push(("page".to_string(), page.to_string()));
    }

    query
}

// =============================================================================
// Transport Trait
// =============================================================================

/// Sends API requests and returns the decoded JSON response body.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: ApiRequest) -> impl Future<Output = StoreResult<Value>> + Send;
}

// =============================================================================
// HTTP Transport
// =============================================================================

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::from(&ApiSettings::default())
    }
}

impl From<&ApiSettings> for TransportConfig {
    fn from(api: &ApiSettings) -> Self {
        TransportConfig {
            base_url: api.base_url.clone(),
            token: api.token.clone(),
            timeout: api.timeout(),
            connect_timeout: api.connect_timeout(),
        }
    }
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpTransport {
    pub fn new(config: TransportConfig) -> ClientResult<Self> {
        let mut base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(config.base_url));
        }
        // Url::join replaces the last segment unless the base ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(HttpTransport {
            http,
            base_url,
            token: config.token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves a request path against the base URL.
    ///
    /// The result must stay below the base path and carry no query or
    /// fragment of its own; query parameters travel in `ApiRequest::query`.
    fn endpoint(&self, path: &str) -> StoreResult<Url> {
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| StoreError::InvalidResponse(format!("bad request path {}: {}", path, e)))?;

        if !url.path().starts_with(self.base_url.path())
            || url.query().is_some()
            || url.fragment().is_some()
        {
            return Err(StoreError::InvalidResponse(format!(
                "request path {} leaves the API base",
                path
            )));
        }
        Ok(url)
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> StoreResult<Value> {
        let url = self.endpoint(&request.path)?;
        let request_id = Uuid::new_v4();

        let mut builder = match request.method {
            ApiMethod::Get => self.http.get(url),
            ApiMethod::Post => self.http.post(url),
            ApiMethod::Patch => self.http.patch(url),
        };
        builder = builder.header(REQUEST_ID_HEADER, request_id.to_string());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(%request_id, method = %request.method, path = %request.path, "Sending request");

        let response = builder.send().await.map_err(|e| {
            error!(%request_id, path = %request.path, error = %e, "Request failed");
            request_error(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            warn!(%request_id, status = status.as_u16(), path = %request.path, "Backend returned an error");
            return Err(StoreError::Http {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| StoreError::InvalidResponse(format!("undecodable body: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_core::Operator;
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, patch};
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/api", addr)
    }

    fn transport(base_url: String) -> HttpTransport {
        HttpTransport::new(TransportConfig {
            base_url,
            token: Some("secret".into()),
            ..TransportConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_filter_query() {
        let filter = Filter::new()
            .where_eq("status", "open")
            .where_op("start", Operator::Gte, 10)
            .sort_by("-created")
            .limit(20)
            .page(2);

        assert_eq!(
            filter_query(&filter),
            vec![
                (
                    "where".to_string(),
                    r#"{"start":{"$gte":10},"status":"open"}"#.to_string()
                ),
                ("sort_by".to_string(), "-created".to_string()),
                ("limit".to_string(), "20".to_string()),
                ("page".to_string(), "2".to_string()),
            ]
        );
        assert!(filter_query(&Filter::new()).is_empty());
    }

    #[test]
    fn test_base_url_keeps_its_path() {
        let transport = transport("https://api.example/v1".into());
        assert_eq!(transport.base_url().as_str(), "https://api.example/v1/");
        assert_eq!(
            transport.endpoint("/booking/b1").unwrap().as_str(),
            "https://api.example/v1/booking/b1"
        );
    }

    #[test]
    fn test_resource_path_escapes_each_segment() {
        assert_eq!(resource_path(["booking"]), "/booking");
        assert_eq!(resource_path(["booking", "a/b"]), "/booking/a%2Fb");
        assert_eq!(resource_path(["booking", "x?y"]), "/booking/x%3Fy");
        assert_eq!(resource_path(["booking", "x#y"]), "/booking/x%23y");
        assert_eq!(resource_path(["booking", "50%"]), "/booking/50%25");
        assert_eq!(
            resource_path(["bookings", "b 1", "check-in"]),
            "/bookings/b%201/check-in"
        );
    }

    #[test]
    fn test_escaped_ids_stay_inside_their_model() {
        let transport = transport("https://api.example/v1".into());

        let url = transport
            .endpoint(&resource_path(["booking", "a?b=c"]))
            .unwrap();
        assert_eq!(url.as_str(), "https://api.example/v1/booking/a%3Fb=c");
        assert_eq!(url.query(), None);

        let url = transport
            .endpoint(&resource_path(["booking", "../user/u1"]))
            .unwrap();
        assert_eq!(url.as_str(), "https://api.example/v1/booking/..%2Fuser%2Fu1");
    }

    #[test]
    fn test_endpoint_rejects_paths_leaving_the_base() {
        let transport = transport("https://api.example/v1".into());

        assert!(transport.endpoint("/booking/../../admin").is_err());
        assert!(transport.endpoint("/booking/a?b=c").is_err());
        assert!(transport.endpoint("/booking/x#y").is_err());
    }

    #[test]
    fn test_rejects_non_base_url() {
        let result = HttpTransport::new(TransportConfig {
            base_url: "mailto:ops@example.com".into(),
            ..TransportConfig::default()
        });
        assert!(matches!(result, Err(ClientError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_get_sends_query_and_auth() {
        let app = Router::new().route(
            "/api/booking",
            get(
                |Query(params): Query<HashMap<String, String>>, headers: HeaderMap| async move {
                    Json(json!({
                        "results": [{ "_id": "b1" }],
                        "where": params.get("where"),
                        "sort_by": params.get("sort_by"),
                        "auth": headers.get("authorization").and_then(|v| v.to_str().ok()),
                        "has_request_id": headers.contains_key(REQUEST_ID_HEADER),
                    }))
                },
            ),
        );
        let transport = transport(serve(app).await);

        let filter = Filter::new().where_eq("status", "open").sort_by("-created");
        let body = transport
            .send(ApiRequest::get("/booking").with_query(filter_query(&filter)))
            .await
            .unwrap();

        assert_eq!(body["results"], json!([{ "_id": "b1" }]));
        assert_eq!(body["where"], json!(r#"{"status":"open"}"#));
        assert_eq!(body["sort_by"], json!("-created"));
        assert_eq!(body["auth"], json!("Bearer secret"));
        assert_eq!(body["has_request_id"], json!(true));
    }

    #[tokio::test]
    async fn test_patch_sends_json_body() {
        let app = Router::new().route(
            "/api/booking/{id}",
            patch(|Path(id): Path<String>, Json(body): Json<Value>| async move {
                Json(json!({ "results": { "_id": id, "status": body["status"] } }))
            }),
        );
        let transport = transport(serve(app).await);

        let body = transport
            .send(ApiRequest::patch("/booking/b7").with_body(json!({ "status": "closed" })))
            .await
            .unwrap();

        assert_eq!(body["results"], json!({ "_id": "b7", "status": "closed" }));
    }

    #[tokio::test]
    async fn test_escaped_id_arrives_as_one_segment() {
        let app = Router::new().route(
            "/api/booking/{id}",
            get(
                |Path(id): Path<String>, Query(params): Query<HashMap<String, String>>| async move {
                    Json(json!({ "results": { "_id": id }, "params": params.len() }))
                },
            ),
        );
        let transport = transport(serve(app).await);

        let body = transport
            .send(ApiRequest::get(resource_path(["booking", "a/b?c=d"])))
            .await
            .unwrap();

        assert_eq!(body["results"], json!({ "_id": "a/b?c=d" }));
        assert_eq!(body["params"], json!(0));
    }

    #[tokio::test]
    async fn test_non_success_status_is_http_error() {
        let app = Router::new().route(
            "/api/booking",
            get(|| async { (StatusCode::FORBIDDEN, "not yours") }),
        );
        let transport = transport(serve(app).await);

        let err = transport.send(ApiRequest::get("/booking")).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::Http {
                status: 403,
                message: "not yours".into()
            }
        );
    }

    #[tokio::test]
    async fn test_non_json_body_is_invalid_response() {
        let app = Router::new().route("/api/booking", get(|| async { "plain text" }));
        let transport = transport(serve(app).await);

        let err = transport.send(ApiRequest::get("/booking")).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = transport(format!("http://{}", addr));
        let err = transport.send(ApiRequest::get("/booking")).await.unwrap_err();
        assert!(matches!(err, StoreError::Network(_)));
        assert!(err.is_retryable());
    }
}
