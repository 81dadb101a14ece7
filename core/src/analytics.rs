//! Anonymous command usage events.

use std::time::Duration;

use serde::Serialize;

use crate::default_client::ClientOptions;
use crate::error::ApiResult;
use crate::http_client::ApiRequest;
use crate::http_client::HttpClient;
use crate::retry::RetryPolicy;

pub const ANALYTICS_PATH: &str = "/v1/analytics";
pub const ANALYTICS_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandEvent {
    pub command: String,
    pub version: String,
}

impl CommandEvent {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            version: crate::VERSION.to_string(),
        }
    }
}

async fn post_event(api_host: &str, verify_tls: bool, event: &CommandEvent) -> ApiResult<()> {
    let options = ClientOptions {
        timeout: Some(ANALYTICS_TIMEOUT),
        verify_tls,
    };
    let client = HttpClient::new(api_host, &options)?.with_policy(RetryPolicy::once());
    client.send(ApiRequest::post(ANALYTICS_PATH).json(event)?).await?;
    Ok(())
}

/// Posts `event` once. Failures are only logged.
pub async fn send_event(api_host: &str, verify_tls: bool, event: CommandEvent) {
    if let Err(err) = post_event(api_host, verify_tls, &event).await {
        tracing::debug!("unable to send analytics event for {}: {err}", event.command);
    }
}
