//! services/client/src/adapters/appwrite/mod.rs
//!
//! The Appwrite adapter: one HTTP client that implements the `AccountService`,
//! `DatabaseService` and `StorageService` ports from the `core` crate against
//! the Appwrite REST API.

mod account;
mod database;
mod storage;

pub use storage::CHUNK_SIZE;

use crate::config::AppwriteConfig;
use reqwest::{
    header::{self, HeaderMap, HeaderName, HeaderValue},
    Client, Method, RequestBuilder, Response, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize};
use sora_core::domain::{Query, SessionToken};
use sora_core::ports::{PortError, PortResult};
use std::sync::Arc;
use tracing::warn;
use url::Url;

/// Asks the backend to mint the id of a new resource.
pub const UNIQUE_ID: &str = "unique()";

const RESPONSE_FORMAT: &str = "1.5.0";

pub(crate) const PROJECT_HEADER: HeaderName = HeaderName::from_static("x-appwrite-project");
pub(crate) const SESSION_HEADER: HeaderName = HeaderName::from_static("x-appwrite-session");
pub(crate) const UPLOAD_ID_HEADER: HeaderName = HeaderName::from_static("x-appwrite-id");
pub(crate) const FALLBACK_COOKIES_HEADER: HeaderName =
    HeaderName::from_static("x-fallback-cookies");
const RESPONSE_FORMAT_HEADER: HeaderName =
    HeaderName::from_static("x-appwrite-response-format");

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the backend ports using the Appwrite REST API.
#[derive(Clone)]
pub struct AppwriteAdapter {
    http: Client,
    config: Arc<AppwriteConfig>,
}

impl AppwriteAdapter {
    /// Creates a new `AppwriteAdapter` with the project headers preset.
    pub fn new(config: AppwriteConfig) -> PortResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(PROJECT_HEADER, header_value(&config.project_id)?);
        headers.insert(
            RESPONSE_FORMAT_HEADER,
            HeaderValue::from_static(RESPONSE_FORMAT),
        );
        headers.insert(
            header::ORIGIN,
            header_value(&format!(
                "appwrite-{}://{}",
                config.platform_os, config.platform
            ))?,
        );

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| PortError::Unexpected(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &AppwriteConfig {
        &self.config
    }

    /// Appends path segments to the endpoint. Segments are percent-encoded.
    fn url(&self, segments: &[&str]) -> PortResult<Url> {
        let mut url = self.config.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| PortError::Unexpected("Endpoint cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// A URL that is handed to the UI as-is, so it carries the project id itself.
    fn public_url(&self, segments: &[&str], params: &[(&str, String)]) -> PortResult<String> {
        let mut url = self.url(segments)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("project", &self.config.project_id);
        }
        Ok(url.to_string())
    }

    fn request(&self, method: Method, url: Url, token: Option<&SessionToken>) -> RequestBuilder {
        let request = self.http.request(method, url);
        match token {
            Some(token) => request.header(SESSION_HEADER, token.expose()),
            None => request,
        }
    }

    /// Sends the request and turns any non-2xx answer into a `PortError`.
    async fn execute(&self, request: RequestBuilder) -> PortResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Request failed: {}", e)))?;

        if response.status().is_success() {
            return Ok(response);
        }
        Err(error_from_response(response).await)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> PortResult<T> {
        let response = self.execute(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to parse response: {}", e)))
    }
}

fn header_value(value: &str) -> PortResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| PortError::Unexpected(format!("Invalid header value '{}': {}", value, e)))
}

//=========================================================================================
// Error Mapping
//=========================================================================================

/// The error body Appwrite sends with every failed request.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

async fn error_from_response(response: Response) -> PortError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let (message, kind) = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(parsed) => (parsed.message, parsed.kind),
        Err(_) => (body, None),
    };
    warn!(
        "Appwrite rejected request ({}, {}): {}",
        status,
        kind.as_deref().unwrap_or("unknown"),
        message
    );

    map_status(status, message)
}

/// Maps an HTTP status onto the port error taxonomy.
pub fn map_status(status: StatusCode, message: String) -> PortError {
    match status {
        StatusCode::UNAUTHORIZED => PortError::Unauthorized,
        StatusCode::NOT_FOUND => PortError::NotFound(message),
        StatusCode::CONFLICT => PortError::Conflict(message),
        _ => PortError::Unexpected(format!("{}: {}", status, message)),
    }
}

//=========================================================================================
// Query Encoding
//=========================================================================================

/// Encodes a query clause the way Appwrite expects it in `queries[]`.
pub fn encode_query(query: &Query) -> String {
    let value = match query {
        Query::Equal { attribute, value } => serde_json::json!({
            "method": "equal",
            "attribute": attribute,
            "values": [value],
        }),
        Query::Search { attribute, value } => serde_json::json!({
            "method": "search",
            "attribute": attribute,
            "values": [value],
        }),
        Query::OrderDesc(attribute) => serde_json::json!({
            "method": "orderDesc",
            "attribute": attribute,
        }),
        Query::OrderAsc(attribute) => serde_json::json!({
            "method": "orderAsc",
            "attribute": attribute,
        }),
        Query::Limit(limit) => serde_json::json!({
            "method": "limit",
            "values": [limit],
        }),
    };
    value.to_string()
}
