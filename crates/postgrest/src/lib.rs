//! PostgREST table client for FridgeFriend
//!
//! A small builder over the hosted REST endpoint (`{url}/rest/v1/{table}`)
//! covering the operations the application needs:
//!
//! - Query API (`select`, `insert`, `update`, `upsert`, `delete`)
//! - Filtering (`eq`, `gte`, `in_list`, ...)
//! - Ordering and limits
//! - Embedded resources through the `select` column list

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;

/// Error body returned by PostgREST
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PostgrestApiErrorDetails {
    pub code: Option<String>,
    pub message: Option<String>,
    pub details: Option<String>,
    pub hint: Option<String>,
}

impl fmt::Display for PostgrestApiErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(code) = &self.code {
            parts.push(format!("Code: {}", code));
        }
        if let Some(message) = &self.message {
            parts.push(format!("Message: {}", message));
        }
        if let Some(details) = &self.details {
            parts.push(format!("Details: {}", details));
        }
        if let Some(hint) = &self.hint {
            parts.push(format!("Hint: {}", hint));
        }
        write!(f, "{}", parts.join(", "))
    }
}

#[derive(Error, Debug)]
pub enum PostgrestError {
    #[error("API error: {details} (Status: {status})")]
    ApiError {
        details: PostgrestApiErrorDetails,
        status: reqwest::StatusCode,
    },

    #[error("API error (unparsed): {message} (Status: {status})")]
    UnparsedApiError {
        message: String,
        status: reqwest::StatusCode,
    },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

impl PostgrestError {
    /// HTTP status of an API rejection, if this error came from one
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Self::ApiError { status, .. } | Self::UnparsedApiError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Sort direction for `order`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

/// Request builder for one table
///
/// Filters are kept as an ordered list so the same column may carry more
/// than one condition (`created_at=gte.X&created_at=lte.Y`).
#[derive(Debug, Clone)]
pub struct PostgrestClient {
    base_url: String,
    api_key: String,
    table: String,
    http_client: Client,
    headers: HeaderMap,
    query_params: Vec<(String, String)>,
}

impl PostgrestClient {
    /// Creates a client for `table`. Requests are authorised with the
    /// API key until `with_auth` supplies a user token.
    pub fn new(base_url: &str, api_key: &str, table: &str, http_client: Client) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            table: table.to_string(),
            http_client,
            headers,
            query_params: Vec::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Result<Self, PostgrestError> {
        let header_value = HeaderValue::from_str(value).map_err(|_| {
            PostgrestError::InvalidParameters(format!("Invalid header value: {}", value))
        })?;
        let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
            PostgrestError::InvalidParameters(format!("Invalid header name: {}", key))
        })?;

        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    /// Sets the bearer token used for row-level security
    pub fn with_auth(self, token: &str) -> Result<Self, PostgrestError> {
        self.with_header("Authorization", &format!("Bearer {}", token))
    }

    /// Column list, including embedded resources such as `household_id,households(name)`
    pub fn select(self, columns: &str) -> Self {
        self.set_param("select", columns.to_string())
    }

    pub fn eq(self, column: &str, value: &str) -> Self {
        self.push_param(column, format!("eq.{}", value))
    }

    pub fn gte(self, column: &str, value: &str) -> Self {
        self.push_param(column, format!("gte.{}", value))
    }

    pub fn lte(self, column: &str, value: &str) -> Self {
        self.push_param(column, format!("lte.{}", value))
    }

    /// `IN` filter. Values containing reserved characters are double-quoted.
    pub fn in_list<S: AsRef<str>>(self, column: &str, values: &[S]) -> Self {
        let value_list = values
            .iter()
            .map(|v| quote_list_value(v.as_ref()))
            .collect::<Vec<_>>()
            .join(",");
        self.push_param(column, format!("in.({})", value_list))
    }

    pub fn order(self, column: &str, order: SortOrder) -> Self {
        self.set_param("order", format!("{}.{}", column, order.as_str()))
    }

    pub fn limit(self, count: usize) -> Self {
        self.set_param("limit", count.to_string())
    }

    /// Conflict target for `upsert`
    pub fn on_conflict(self, columns: &str) -> Self {
        self.set_param("on_conflict", columns.to_string())
    }

    /// Runs a GET and decodes the row array
    pub async fn execute<T: DeserializeOwned>(&self) -> Result<Vec<T>, PostgrestError> {
        let body = self.send(Method::GET, None, None).await?;
        decode_rows(&body)
    }

    /// First row of the result, or `None` when the query matched nothing
    pub async fn maybe_single<T: DeserializeOwned>(&self) -> Result<Option<T>, PostgrestError> {
        let rows: Vec<T> = self.clone().limit(1).execute().await?;
        Ok(rows.into_iter().next())
    }

    /// POST, returning the inserted rows
    pub async fn insert<T: Serialize, R: DeserializeOwned>(
        &self,
        values: &T,
    ) -> Result<Vec<R>, PostgrestError> {
        let payload = serde_json::to_value(values)?;
        let body = self
            .send(Method::POST, Some(&payload), Some("return=representation"))
            .await?;
        decode_rows(&body)
    }

    /// POST with merge-duplicates resolution; pair with `on_conflict`
    pub async fn upsert<T: Serialize, R: DeserializeOwned>(
        &self,
        values: &T,
    ) -> Result<Vec<R>, PostgrestError> {
        let payload = serde_json::to_value(values)?;
        let body = self
            .send(
                Method::POST,
                Some(&payload),
                Some("resolution=merge-duplicates,return=representation"),
            )
            .await?;
        decode_rows(&body)
    }

    /// PATCH every row matched by the filters, returning the updated rows
    pub async fn update<T: Serialize, R: DeserializeOwned>(
        &self,
        values: &T,
    ) -> Result<Vec<R>, PostgrestError> {
        self.require_filter("update")?;
        let payload = serde_json::to_value(values)?;
        let body = self
            .send(Method::PATCH, Some(&payload), Some("return=representation"))
            .await?;
        decode_rows(&body)
    }

    /// DELETE every row matched by the filters, returning the removed rows
    pub async fn delete<R: DeserializeOwned>(&self) -> Result<Vec<R>, PostgrestError> {
        self.require_filter("delete")?;
        let body = self
            .send(Method::DELETE, None, Some("return=representation"))
            .await?;
        decode_rows(&body)
    }

    fn set_param(mut self, key: &str, value: String) -> Self {
        self.query_params.retain(|(k, _)| k != key);
        self.query_params.push((key.to_string(), value));
        self
    }

    fn push_param(mut self, column: &str, value: String) -> Self {
        self.query_params.push((column.to_string(), value));
        self
    }

    // An unfiltered PATCH/DELETE would hit the whole table.
    fn require_filter(&self, operation: &str) -> Result<(), PostgrestError> {
        let reserved = ["select", "order", "limit", "offset", "on_conflict"];
        if self
            .query_params
            .iter()
            .any(|(k, _)| !reserved.contains(&k.as_str()))
        {
            Ok(())
        } else {
            Err(PostgrestError::InvalidParameters(format!(
                "{} on {} requires at least one filter",
                operation, self.table
            )))
        }
    }

    fn build_url(&self) -> Result<Url, PostgrestError> {
        let mut url = Url::parse(&format!("{}/rest/v1/{}", self.base_url, self.table))?;
        if !self.query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query_params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        payload: Option<&serde_json::Value>,
        prefer: Option<&'static str>,
    ) -> Result<String, PostgrestError> {
        let url = self.build_url()?;
        log::debug!("{} {}", method, url);

        let mut headers = self.headers.clone();
        if let Some(prefer) = prefer {
            headers.insert(
                HeaderName::from_static("prefer"),
                HeaderValue::from_static(prefer),
            );
        }

        let mut request = self
            .http_client
            .request(method, url)
            .header("apikey", &self.api_key)
            .headers(headers);
        if !self.headers.contains_key(reqwest::header::AUTHORIZATION) {
            request = request.bearer_auth(&self.api_key);
        }
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read response body".to_string());

        if !status.is_success() {
            log::warn!("{} rejected with {}: {}", self.table, status, body);
            return Err(match serde_json::from_str::<PostgrestApiErrorDetails>(&body) {
                Ok(details) => PostgrestError::ApiError { details, status },
                Err(_) => PostgrestError::UnparsedApiError {
                    message: body,
                    status,
                },
            });
        }

        Ok(body)
    }
}

// 204 No Content and `return=minimal` both yield an empty body.
fn decode_rows<R: DeserializeOwned>(body: &str) -> Result<Vec<R>, PostgrestError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(body).map_err(|e| PostgrestError::DeserializationError(e.to_string()))
}

fn quote_list_value(value: &str) -> String {
    if value.contains([',', '(', ')', '"', ' ']) {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}
