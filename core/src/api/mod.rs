//! Typed client for the remote API.
//!
//! One method per endpoint, grouped by resource in the submodules. Every
//! method builds its query and body from typed arguments, sends the request
//! through [`HttpClient`] with the bearer token, and extracts the documented
//! top-level key from the response.

mod auth;
mod configs;
mod envelope;
mod environments;
mod logs;
pub mod models;
mod projects;
mod secrets;
mod tokens;
mod workplace;

pub use auth::AUTH_POLL_INTERVAL;
pub use auth::AUTH_POLL_TIMEOUT;
pub use envelope::extract;
pub use secrets::Download;
pub use secrets::DownloadOptions;
pub use secrets::parse_download_json;
pub use tokens::TokenRef;

use serde::de::DeserializeOwned;

use crate::error::ApiResult;
use crate::http_client::ApiRequest;
use crate::http_client::ApiResponse;
use crate::http_client::HttpClient;

/// Default page size for paginated list endpoints.
pub const DEFAULT_PER_PAGE: u32 = 20;

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: HttpClient,
    token: String,
}

impl ApiClient {
    pub fn new(http: HttpClient, token: impl Into<String>) -> Self {
        Self {
            http,
            token: token.into(),
        }
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    async fn send(&self, request: ApiRequest) -> ApiResult<ApiResponse> {
        let request = request.bearer(&self.token)?;
        self.http.send(request).await
    }

    /// Sends `request` and extracts `key` from the response body.
    async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest, key: &str) -> ApiResult<T> {
        let response = self.send(request).await?;
        extract(&response.body, key)
    }
}
