//! Request pipeline shared by every API operation.
//!
//! Builds the URL and headers, hands each attempt to the retry engine and
//! classifies the outcome:
//!
//! - 2xx is success.
//! - 1xx, 429 and 5xx are retryable.
//! - Any other status is terminal; the body is parsed as
//!   `{messages: [string], success: bool}` and the joined messages become
//!   the error text.
//! - Transport failures are retryable only when the cause is a timeout.

use std::ops::ControlFlow;

use bytes::Bytes;
use futures::StreamExt;
use reqwest::Method;
use reqwest::RequestBuilder;
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use reqwest::header::ETAG;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::default_client::ClientOptions;
use crate::default_client::create_client;
use crate::error::ApiError;
use crate::error::ApiErrorKind;
use crate::error::ApiResult;
use crate::retry::AttemptError;
use crate::retry::RetryError;
use crate::retry::RetryPolicy;
use crate::retry::retry;

/// How a response status is treated by the retry engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Retryable,
    Terminal,
}

pub fn classify_status(status: StatusCode) -> StatusClass {
    let code = status.as_u16();
    match code {
        200..=299 => StatusClass::Success,
        100..=199 | 429 | 500..=599 => StatusClass::Retryable,
        _ => StatusClass::Terminal,
    }
}

/// Error body returned by the API for failed requests.
#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    messages: Vec<String>,
    #[serde(default)]
    #[allow(dead_code)]
    success: bool,
}

/// One outgoing request, independent of any host.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    /// Treat `304 Not Modified` as a successful response.
    pub allow_not_modified: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            allow_not_modified: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    /// Adds the parameter only when `value` is non-empty.
    pub fn query_opt(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) if !value.is_empty() => self.query(key, value),
            _ => self,
        }
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> ApiResult<Self> {
        let bytes = serde_json::to_vec(body).map_err(|err| {
            ApiError::protocol("Unable to serialize request body").with_cause(err)
        })?;
        self.body = Some(bytes);
        Ok(self)
    }

    pub fn bearer(self, token: &str) -> ApiResult<Self> {
        self.header(AUTHORIZATION.as_str(), &format!("Bearer {token}"))
    }

    pub fn header(mut self, name: &str, value: &str) -> ApiResult<Self> {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
            ApiError::user_input(format!("Invalid header name {name}")).with_cause(err)
        })?;
        let value = HeaderValue::from_str(value).map_err(|err| {
            ApiError::user_input(format!("Invalid value for header {name}")).with_cause(err)
        })?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn allow_not_modified(mut self) -> Self {
        self.allow_not_modified = true;
        self
    }
}

/// A fully read response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn is_not_modified(&self) -> bool {
        self.status == StatusCode::NOT_MODIFIED
    }

    pub fn etag(&self) -> Option<String> {
        self.headers
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }

    pub fn json<T: DeserializeOwned>(&self) -> ApiResult<T> {
        serde_json::from_slice(&self.body).map_err(|err| {
            ApiError::protocol(format!(
                "Unable to parse API response as {}",
                std::any::type_name::<T>()
            ))
            .with_cause(err)
            .with_code(self.status.as_u16())
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// One `event: ...` / `data: ...` frame from a server-sent-events stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerEvent {
    pub event: String,
    pub data: String,
}

/// HTTP transport bound to one API host.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    stream_client: reqwest::Client,
    host: Url,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl HttpClient {
    pub fn new(api_host: &str, options: &ClientOptions) -> ApiResult<Self> {
        let client = create_client(options)?;
        let stream_client = create_client(&ClientOptions {
            timeout: None,
            verify_tls: options.verify_tls,
        })?;
        Ok(Self {
            client,
            stream_client,
            host: parse_host(api_host)?,
            policy: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn host(&self) -> &Url {
        &self.host
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Builds the absolute URL for `request`, merging its query parameters.
    pub fn url_for(&self, request: &ApiRequest) -> ApiResult<Url> {
        let mut url = self.host.join(&request.path).map_err(|err| {
            ApiError::new(
                ApiErrorKind::Config,
                format!("Invalid request path {}", request.path),
            )
            .with_cause(err)
        })?;
        merge_query(&mut url, &request.query);
        Ok(url)
    }

    /// Sends `request` under the retry policy and reads the full body.
    pub async fn send(&self, request: ApiRequest) -> ApiResult<ApiResponse> {
        let url = self.url_for(&request)?;
        tracing::debug!("{} {}", request.method, url.path());

        let outcome = retry(&self.policy, &self.cancel, |attempt| {
            let builder = self.builder(&self.client, &request, &url);
            let allow_not_modified = request.allow_not_modified;
            let path = url.path().to_string();
            async move {
                tracing::debug!("attempt {attempt} for {path}");
                let response = connect(builder, allow_not_modified).await?;
                read_response(response).await
            }
        })
        .await;

        outcome.map_err(surface_retry_error)
    }

    /// Opens a server-sent-events stream and dispatches each frame.
    ///
    /// The initial connection is retried like any request; once the stream
    /// is open, a disconnect ends the call and reconnecting is up to the
    /// caller. Returning `ControlFlow::Break` from `handler` closes the
    /// stream.
    pub async fn stream_events<F>(&self, request: ApiRequest, mut handler: F) -> ApiResult<()>
    where
        F: FnMut(ServerEvent) -> ControlFlow<()>,
    {
        let request = request.header("accept", "text/event-stream")?;
        let url = self.url_for(&request)?;
        tracing::debug!("{} {} (stream)", request.method, url.path());

        let response = retry(&self.policy, &self.cancel, |_| {
            let builder = self.builder(&self.stream_client, &request, &url);
            async move { connect(builder, false).await }
        })
        .await
        .map_err(surface_retry_error)?;

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        loop {
            let chunk = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                chunk = stream.next() => chunk,
            };
            let Some(chunk) = chunk else {
                return Ok(());
            };
            let chunk = chunk.map_err(|err| {
                ApiError::new(ApiErrorKind::NetworkTerminal, "Event stream interrupted")
                    .with_cause(err)
            })?;
            buffer.extend_from_slice(&chunk);

            while let Some(block) = extract_event(&mut buffer) {
                if let Some(event) = parse_event(&block)
                    && handler(event).is_break()
                {
                    return Ok(());
                }
            }
        }
    }

    fn builder(&self, client: &reqwest::Client, request: &ApiRequest, url: &Url) -> RequestBuilder {
        let mut builder = client
            .request(request.method.clone(), url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        builder
    }
}

async fn connect(
    builder: RequestBuilder,
    allow_not_modified: bool,
) -> Result<reqwest::Response, AttemptError<ApiError>> {
    let response = builder.send().await.map_err(transport_error)?;
    let status = response.status();
    if allow_not_modified && status == StatusCode::NOT_MODIFIED {
        return Ok(response);
    }

    match classify_status(status) {
        StatusClass::Success => Ok(response),
        class => {
            let body = response.bytes().await.unwrap_or_default();
            let mut err = error_from_body(status, &body);
            if class == StatusClass::Retryable {
                err.kind = ApiErrorKind::NetworkRetryable;
                Err(AttemptError::Retryable(err))
            } else {
                Err(AttemptError::Stop(err))
            }
        }
    }
}

async fn read_response(
    response: reqwest::Response,
) -> Result<ApiResponse, AttemptError<ApiError>> {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await.map_err(transport_error)?;
    Ok(ApiResponse {
        status,
        headers,
        body,
    })
}

fn transport_error(err: reqwest::Error) -> AttemptError<ApiError> {
    if err.is_timeout() {
        AttemptError::Retryable(
            ApiError::new(ApiErrorKind::NetworkRetryable, "Request timed out").with_cause(err),
        )
    } else {
        let message = match err.url() {
            Some(url) => format!(
                "Unable to reach {}",
                url.host_str().unwrap_or_else(|| url.as_str())
            ),
            None => "Unable to complete request".to_string(),
        };
        AttemptError::Stop(ApiError::new(ApiErrorKind::NetworkTerminal, message).with_cause(err))
    }
}

/// Builds the error for a non-success response from its body.
pub fn error_from_body(status: StatusCode, body: &[u8]) -> ApiError {
    let envelope = serde_json::from_slice::<ErrorEnvelope>(body).ok();
    match envelope {
        Some(envelope) if !envelope.messages.is_empty() => {
            ApiError::new(ApiErrorKind::Semantic, envelope.messages.join("\n"))
                .with_code(status.as_u16())
        }
        _ => ApiError::new(
            ApiErrorKind::NetworkTerminal,
            format!("Request failed with HTTP {status}"),
        )
        .with_code(status.as_u16()),
    }
}

fn surface_retry_error(err: RetryError<ApiError>) -> ApiError {
    match err {
        RetryError::Stopped(err) => err,
        RetryError::Exhausted { attempts, mut last } => {
            tracing::debug!("giving up after {attempts} attempts: {last}");
            last.kind = ApiErrorKind::NetworkTerminal;
            last
        }
        RetryError::Cancelled => ApiError::new(ApiErrorKind::Cancelled, "Request cancelled"),
    }
}

fn parse_host(api_host: &str) -> ApiResult<Url> {
    let trimmed = api_host.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    Url::parse(&with_scheme).map_err(|err| {
        ApiError::new(ApiErrorKind::Config, format!("Invalid API host {api_host}")).with_cause(err)
    })
}

/// Appends `query` to `url`, skipping keys the URL already carries.
pub fn merge_query(url: &mut Url, query: &[(String, String)]) {
    if query.is_empty() {
        return;
    }
    let existing: Vec<String> = url.query_pairs().map(|(key, _)| key.into_owned()).collect();
    let mut pairs = url.query_pairs_mut();
    for (key, value) in query {
        if !existing.iter().any(|k| k == key) {
            pairs.append_pair(key, value);
        }
    }
}

/// Splits the next complete frame (terminated by a blank line) off `buffer`.
/// Removes the first complete frame from `buffer` and decodes it.
///
/// Frames are split on raw bytes so a character spanning two network
/// chunks is only decoded once both halves have arrived.
fn extract_event(buffer: &mut Vec<u8>) -> Option<String> {
    let (pos, separator_len) = [b"\r\n\r\n".as_slice(), b"\n\n".as_slice()]
        .into_iter()
        .filter_map(|separator| {
            buffer
                .windows(separator.len())
                .position(|window| window == separator)
                .map(|pos| (pos, separator.len()))
        })
        .min_by_key(|(pos, _)| *pos)?;
    let block = String::from_utf8_lossy(&buffer[..pos]).replace("\r\n", "\n");
    buffer.drain(..pos + separator_len);
    Some(block)
}

fn parse_event(block: &str) -> Option<ServerEvent> {
    let mut event = ServerEvent::default();
    let mut data_lines: Vec<&str> = Vec::new();

    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event.event = value.to_string(),
            "data" => data_lines.push(value),
            _ => {}
        }
    }

    event.data = data_lines.join("\n");
    if event.event.is_empty() && event.data.is_empty() {
        None
    } else {
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn status_classes() {
        assert_eq!(classify_status(StatusCode::OK), StatusClass::Success);
        assert_eq!(classify_status(StatusCode::NO_CONTENT), StatusClass::Success);
        assert_eq!(classify_status(StatusCode::CONTINUE), StatusClass::Retryable);
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            StatusClass::Retryable
        );
        assert_eq!(classify_status(StatusCode::BAD_GATEWAY), StatusClass::Retryable);
        assert_eq!(classify_status(StatusCode::NOT_FOUND), StatusClass::Terminal);
        assert_eq!(classify_status(StatusCode::UNAUTHORIZED), StatusClass::Terminal);
        assert_eq!(classify_status(StatusCode::NOT_MODIFIED), StatusClass::Terminal);
    }

    #[test]
    fn query_merge_keeps_existing_keys() {
        let mut url = Url::parse("https://api.example.com/v3/configs?project=a").unwrap();
        merge_query(
            &mut url,
            &[
                ("project".to_string(), "b".to_string()),
                ("config".to_string(), "dev".to_string()),
            ],
        );
        assert_eq!(url.query(), Some("project=a&config=dev"));
    }

    #[test]
    fn error_envelope_messages_are_joined() {
        let body = br#"{"messages":["Invalid token","Try logging in"],"success":false}"#;
        let err = error_from_body(StatusCode::UNAUTHORIZED, body);
        assert_eq!(err.to_string(), "Invalid token\nTry logging in");
        assert_eq!(err.code, Some(401));
        assert_eq!(err.kind, ApiErrorKind::Semantic);
    }

    #[test]
    fn non_json_error_body_falls_back_to_status() {
        let err = error_from_body(StatusCode::FORBIDDEN, b"<html>nope</html>");
        assert!(err.to_string().contains("403"), "{err}");
        assert_eq!(err.kind, ApiErrorKind::NetworkTerminal);
    }

    #[test]
    fn host_without_scheme_defaults_to_https() {
        assert_eq!(
            parse_host("api.example.com").unwrap().as_str(),
            "https://api.example.com/"
        );
        assert!(parse_host("http://[::1").is_err());
    }

    #[test]
    fn extract_event_splits_on_blank_line() {
        let mut buffer = b"event: ping\ndata: {}\n\nevent: sec".to_vec();
        assert_eq!(
            extract_event(&mut buffer).as_deref(),
            Some("event: ping\ndata: {}")
        );
        assert_eq!(buffer, b"event: sec");
        assert!(extract_event(&mut buffer).is_none());

        let mut buffer = b"event: ping\r\ndata: 1\r\n\r\n".to_vec();
        assert_eq!(
            extract_event(&mut buffer).as_deref(),
            Some("event: ping\ndata: 1")
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn code_point_split_across_chunks_decodes_once_complete() {
        let mut buffer = b"data: caf\xc3".to_vec();
        assert!(extract_event(&mut buffer).is_none());
        buffer.extend_from_slice(b"\xa9\n\n");
        let block = extract_event(&mut buffer).unwrap();
        assert_eq!(parse_event(&block).unwrap().data, "café");
    }

    #[test]
    fn parse_event_joins_data_lines_and_skips_comments() {
        let event = parse_event(": keepalive\nevent: secrets.update\ndata: a\ndata: b").unwrap();
        assert_eq!(
            event,
            ServerEvent {
                event: "secrets.update".to_string(),
                data: "a\nb".to_string(),
            }
        );
        assert!(parse_event(": only a comment").is_none());
    }
}
