//! Root of the `doppler-core` library.

// Prevent accidental direct writes to stdout/stderr in library code. All
// user-visible output goes through the CLI printers or the tracing stack.
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod analytics;
pub mod api;
pub mod atomic_write;
pub mod config;
pub mod crypto;
pub mod default_client;
pub mod editor;
pub mod error;
pub mod exec_env;
pub mod fallback;
pub mod http_client;
pub mod retry;
pub mod run;

pub use error::ApiError;
pub use error::ApiErrorKind;
pub use error::ApiResult;
pub use http_client::HttpClient;

/// Version reported in the `client-version` header and by `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
