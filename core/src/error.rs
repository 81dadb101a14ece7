//! Uniform error returned by the HTTP transport and the typed API client.

use std::fmt;

/// Boxed cause carried by [`ApiError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Broad classification used for exit handling and for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Invalid host, header, or client construction.
    Config,
    /// Timeout, 429, 5xx, 1xx. Only seen once the retry budget is spent.
    NetworkRetryable,
    /// Non-timeout transport failure or a 4xx response.
    NetworkTerminal,
    /// Response body did not have the expected shape.
    Protocol,
    /// The API answered `{success: false, messages: [...]}`.
    Semantic,
    /// Caller supplied an unusable argument.
    UserInput,
    /// Ctrl-C arrived while a request was waiting to retry.
    Cancelled,
}

/// Error surfaced by every remote operation.
///
/// Carries a human-facing message, the wrapped cause and, when a response
/// was received, its HTTP status code.
#[derive(Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
    pub code: Option<u16>,
    pub cause: Option<BoxError>,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            cause: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_cause(mut self, cause: impl Into<BoxError>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Protocol, message)
    }

    pub fn user_input(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::UserInput, message)
    }

    /// True when neither a message nor a cause is present.
    pub fn is_nil(&self) -> bool {
        self.message.is_empty() && self.cause.is_none()
    }

    /// Transport-level failures: the request never produced a usable answer.
    ///
    /// The run pipeline falls back to its cache on these.
    pub fn is_transport(&self) -> bool {
        match self.kind {
            ApiErrorKind::NetworkRetryable => true,
            ApiErrorKind::NetworkTerminal => match self.code {
                None => true,
                Some(code) => code == 429 || code >= 500,
            },
            _ => false,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, &self.cause) {
            (message, _) if !message.is_empty() => f.write_str(message),
            (_, Some(cause)) => write!(f, "{cause}"),
            _ => f.write_str("unknown error"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
