use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use reqwest::header::USER_AGENT;

use crate::error::ApiError;
use crate::error::ApiErrorKind;

/// Value of the `client-sdk` header.
pub const CLIENT_SDK: &str = "doppler-cli";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport settings that come from the resolved configuration.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// `None` disables the timeout entirely.
    pub timeout: Option<Duration>,
    pub verify_tls: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
            verify_tls: true,
        }
    }
}

pub fn user_agent() -> String {
    format!(
        "{CLIENT_SDK}/{} ({}; {})",
        crate::VERSION,
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Headers sent on every request unless the request overrides them.
pub fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("client-sdk", HeaderValue::from_static(CLIENT_SDK));
    headers.insert(
        "client-version",
        HeaderValue::from_static(crate::VERSION),
    );
    if let Ok(agent) = HeaderValue::from_str(&user_agent()) {
        headers.insert(USER_AGENT, agent);
    }
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

pub fn create_client(options: &ClientOptions) -> Result<reqwest::Client, ApiError> {
    let mut builder = reqwest::Client::builder().default_headers(default_headers());
    if let Some(timeout) = options.timeout {
        builder = builder.timeout(timeout);
    }
    if !options.verify_tls {
        tracing::debug!("TLS certificate verification disabled");
        builder = builder.danger_accept_invalid_certs(true);
    }
    builder.build().map_err(|err| {
        ApiError::new(ApiErrorKind::Config, "Unable to build HTTP client").with_cause(err)
    })
}
