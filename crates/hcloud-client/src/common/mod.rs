//! Common utilities for the Hetzner Cloud API client
//!
//! Provides the authenticated HTTP wrapper, pagination and error decoding
//! shared by every resource.

pub mod selector;

use crate::error::{ErrorCode, HCloudError};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Page size requested from list endpoints (API maximum)
const PER_PAGE: &str = "50";

/// `{"error": {...}}` envelope returned by the API on failure
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    #[serde(default)]
    message: String,
}

/// HTTP client wrapper with bearer token authentication
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: String, token: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from a path
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Turn a non-success response into a classified [`HCloudError`]
    ///
    /// The API normally answers with an `{"error": {"code", "message"}}` body.
    /// When it does not (proxies, gateways), the HTTP status decides the code.
    async fn error_from_response(method: &str, path: &str, response: Response) -> HCloudError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) {
            return HCloudError::api(
                ErrorCode::from(envelope.error.code.as_str()),
                envelope.error.message,
            );
        }

        let code = match status {
            StatusCode::NOT_FOUND => ErrorCode::NotFound,
            StatusCode::TOO_MANY_REQUESTS => ErrorCode::RateLimitExceeded,
            StatusCode::UNAUTHORIZED => ErrorCode::Unauthorized,
            StatusCode::FORBIDDEN => ErrorCode::Forbidden,
            StatusCode::CONFLICT => ErrorCode::Conflict,
            other => ErrorCode::Other(other.as_u16().to_string()),
        };
        HCloudError::api(code, format!("{method} {path} failed: {status} - {body}"))
    }

    /// Fetch every page of a list endpoint
    ///
    /// `key` is the name of the array in the response body (`networks`,
    /// `load_balancers`, ...).
    pub async fn fetch_all_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        filters: &[(&str, &str)],
        key: &str,
    ) -> Result<Vec<T>, HCloudError> {
        let mut all_results = Vec::new();
        let mut page = String::from("1");

        loop {
            let mut params: Vec<(&str, &str)> = filters.to_vec();
            params.push(("page", &page));
            params.push(("per_page", PER_PAGE));
            let page_path = format!("{}?{}", path, self.build_query_string(&params));

            let body: serde_json::Value = self.get(&page_path).await?;
            let items = body.get(key).cloned().ok_or_else(|| {
                HCloudError::InvalidRequest(format!("response of {path} has no '{key}' field"))
            })?;
            let items: Vec<T> = serde_json::from_value(items)?;
            all_results.extend(items);

            match body
                .pointer("/meta/pagination/next_page")
                .and_then(serde_json::Value::as_u64)
            {
                Some(next) => page = next.to_string(),
                None => break,
            }
        }

        Ok(all_results)
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, HCloudError> {
        let url = self.build_url(path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response("GET", path, response).await);
        }

        Ok(response.json().await?)
    }

    /// Make a POST request
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, HCloudError> {
        let url = self.build_url(path);
        debug!("POST {} with body: {}", url, body);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response("POST", path, response).await);
        }

        Ok(response.json().await?)
    }

    /// Make a PUT request
    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, HCloudError> {
        let url = self.build_url(path);
        debug!("PUT {} with body: {}", url, body);

        let response = self
            .client
            .put(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response("PUT", path, response).await);
        }

        Ok(response.json().await?)
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> Result<(), HCloudError> {
        let url = self.build_url(path);
        debug!("DELETE {}", url);

        let response = self
            .client
            .delete(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response("DELETE", path, response).await);
        }

        Ok(())
    }

    /// Build query string from filters
    pub fn build_query_string(&self, filters: &[(&str, &str)]) -> String {
        filters
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}
