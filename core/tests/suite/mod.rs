use std::time::Duration;

use doppler_core::default_client::ClientOptions;
use doppler_core::HttpClient;
use doppler_core::api::ApiClient;
use doppler_core::retry::RetryPolicy;
use wiremock::MockServer;

mod auth;
mod run_fallback;
mod secrets;
mod transport;

pub const TOKEN: &str = "dp.st.dev.test";

/// A client pointed at `server` that retries without meaningful sleeps.
pub fn api_client(server: &MockServer) -> ApiClient {
    client_for(&server.uri())
}

/// A client whose host refuses connections.
pub fn offline_client() -> ApiClient {
    client_for(&closed_port_uri())
}

fn client_for(uri: &str) -> ApiClient {
    let http = HttpClient::new(uri, &ClientOptions::default())
        .unwrap()
        .with_policy(RetryPolicy::default().with_initial_sleep(Duration::from_millis(1)));
    ApiClient::new(http, TOKEN)
}

/// Base URL of a local port nothing listens on.
pub fn closed_port_uri() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

pub fn secret_json(value: &str) -> serde_json::Value {
    serde_json::json!({
        "raw": value,
        "computed": value,
        "rawVisibility": "masked",
        "computedVisibility": "masked",
    })
}
