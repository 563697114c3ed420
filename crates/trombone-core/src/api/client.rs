//! HTTP client factory.
//!
//! `ApiClient` issues JSON requests against `base_url + path` and reports
//! transport, status and decode failures as distinct `ApiError` variants.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;

use super::ApiError;
use crate::config::ClientConfig;

/// Structured response with the decoded payload.
#[derive(Debug, Clone)]
pub struct ApiResponse<T = Value> {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub data: T,
}

impl ApiResponse<Value> {
    /// Decode the payload into a concrete type.
    pub fn json<T: DeserializeOwned>(self) -> Result<ApiResponse<T>, ApiError> {
        Ok(ApiResponse {
            status: self.status,
            headers: self.headers,
            data: serde_json::from_value(self.data)?,
        })
    }
}

/// API client bound to one base address.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    config: ClientConfig,
}

impl ApiClient {
    /// Create a new API client from the given configuration
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        Self::validate_base_url(&config.base_url)?;
        let headers = Self::default_headers(&config)?;

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ApiError::InvalidConfig(format!("Failed to build HTTP client: {}", e)))?;

        debug!(base_url = %config.base_url, "API client created");
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn validate_base_url(base_url: &str) -> Result<(), ApiError> {
        if base_url.is_empty() {
            return Ok(());
        }
        let url = Url::parse(base_url)
            .map_err(|e| ApiError::InvalidConfig(format!("Invalid base URL {}: {}", base_url, e)))?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(ApiError::InvalidConfig(format!(
                "Unsupported base URL scheme: {}",
                scheme
            ))),
        }
    }

    fn default_headers(config: &ClientConfig) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ApiError::InvalidConfig(format!("Invalid header name: {}", name)))?;
            let header_value = HeaderValue::from_str(value).map_err(|_| {
                ApiError::InvalidConfig(format!("Invalid value for header {}", name))
            })?;
            headers.insert(header_name, header_value);
        }
        Ok(headers)
    }

    /// `scheme://...` or protocol-relative `//host/...`
    fn is_absolute_url(path: &str) -> bool {
        if path.starts_with("//") {
            return true;
        }
        match path.split_once("://") {
            Some((scheme, _)) => {
                let mut chars = scheme.chars();
                chars.next().is_some_and(|c| c.is_ascii_alphabetic())
                    && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
            }
            None => false,
        }
    }

    /// Resolve a request path against the base address.
    pub fn url(&self, path: &str) -> Result<String, ApiError> {
        if Self::is_absolute_url(path) {
            return Ok(path.to_string());
        }

        let base = self.config.base_url.as_str();
        if base.is_empty() {
            return Err(ApiError::InvalidConfig(format!(
                "Relative path {} needs a base URL",
                path
            )));
        }
        if path.is_empty() {
            return Ok(base.to_string());
        }

        Ok(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        ))
    }

    fn decode_body(text: &str) -> Result<Value, ApiError> {
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(text)?)
    }

    /// Issue a request with an optional JSON body
    pub async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<ApiResponse, ApiError> {
        let url = self.url(path)?;
        debug!(method = %method, url = %url, "Sending request");

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;
        debug!(status = %status, url = %url, "Response received");

        if !status.is_success() {
            return Err(ApiError::from_status(status, &text));
        }

        Ok(ApiResponse {
            status,
            headers,
            data: Self::decode_body(&text)?,
        })
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request::<Value>(Method::GET, path, None).await
    }

    /// GET and decode the payload into `T`
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        Ok(self.get(path).await?.json()?.data)
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, ApiError> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, ApiError> {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn patch<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, ApiError> {
        self.request(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request::<Value>(Method::DELETE, path, None).await
    }
}
