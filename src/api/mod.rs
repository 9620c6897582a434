pub mod account;
pub mod error;
pub mod polish;

pub use account::{AuthState, HistoryItem, NewTemplate, Template, Tier, TokenResponse, Usage};
pub use error::{ApiError, Failure, FailureKind, LimitKind};
pub use polish::{merge_honorific_tones, normalize_outputs, PolishBody, RewriteRequest};

use crate::settings::{trim_base_url, Preferences};
use log::{debug, error};
use reqwest::cookie::Jar;
use reqwest::{Method, RequestBuilder};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub const CLIENT_HEADER: &str = "X-Lex-Client";
pub const CLIENT_ID: &str = "chrome-ext-v1";
pub const REQUEST_TIMEOUT_SECS: u64 = 20;

/// HTTP client for the Lexinoa server.
///
/// With a stored access token every call carries `Authorization: Bearer` and goes out
/// without cookies, so the server never prefers a stale cookie identity over the
/// token. Without a token the shared cookie jar is sent instead.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    bearer_http: reqwest::Client,
    cookie_http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, ApiError> {
        Self::with_options(
            base_url,
            token,
            Arc::new(Jar::default()),
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn from_preferences(prefs: &Preferences, jar: Arc<Jar>) -> Result<Self, ApiError> {
        Self::with_options(
            prefs.base_url(),
            prefs.access_token().map(str::to_string),
            jar,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn with_options(
        base_url: impl Into<String>,
        token: Option<String>,
        jar: Arc<Jar>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let bearer_http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;
        let cookie_http = reqwest::Client::builder()
            .timeout(timeout)
            .cookie_provider(jar)
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;

        Ok(Self {
            base_url: trim_base_url(&base_url.into()).to_string(),
            token: token.filter(|t| !t.is_empty()),
            bearer_http,
            cookie_http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        let builder = match &self.token {
            Some(token) => self
                .bearer_http
                .request(method, url)
                .bearer_auth(token),
            None => self.cookie_http.request(method, url),
        };
        builder
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(CLIENT_HEADER, CLIENT_ID)
    }

    /// Sends the request and returns the parsed JSON body. Bodies that are not JSON
    /// read as `{}`; non-2xx statuses become [`ApiError::Http`].
    async fn send(&self, builder: RequestBuilder) -> Result<Value, ApiError> {
        let response = builder.send().await.map_err(|e| {
            error!("Lexinoa API request failed: {}", e);
            ApiError::from_transport(e)
        })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<Value>(&text).unwrap_or_else(|_| Value::Object(Default::default()));

        debug!("Lexinoa API response status: {}", status);

        if !status.is_success() {
            error!("Lexinoa API error: status={}, body={}", status, text);
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }

    pub(crate) async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        self.send(self.request(Method::GET, path)).await
    }

    pub(crate) async fn post_json<B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Value, ApiError> {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        self.send(self.request(Method::DELETE, path)).await
    }
}
