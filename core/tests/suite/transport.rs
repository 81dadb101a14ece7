use std::time::Duration;

use doppler_core::ApiErrorKind;
use doppler_core::HttpClient;
use doppler_core::default_client::ClientOptions;
use doppler_core::http_client::ApiRequest;
use doppler_core::retry::RetryPolicy;
use pretty_assertions::assert_eq;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::header;
use wiremock::matchers::header_regex;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::query_param;

use super::closed_port_uri;

fn fast_client(server: &MockServer, options: &ClientOptions) -> HttpClient {
    HttpClient::new(&server.uri(), options)
        .unwrap()
        .with_policy(RetryPolicy::default().with_initial_sleep(Duration::from_millis(1)))
}

#[tokio::test]
async fn every_request_identifies_the_client() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/workplace"))
        .and(header("client-sdk", "doppler-cli"))
        .and(header("client-version", doppler_core::VERSION))
        .and(header_regex("user-agent", doppler_core::VERSION))
        .and(header("accept", "application/json"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let client = fast_client(&server, &ClientOptions::default());
    let response = client.send(ApiRequest::get("/v3/workplace")).await.unwrap();
    assert_eq!(response.status.as_u16(), 200);
}

#[tokio::test]
async fn retryable_status_exhausts_five_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/projects"))
        .respond_with(ResponseTemplate::new(503))
        .expect(5)
        .mount(&server)
        .await;

    let client = fast_client(&server, &ClientOptions::default());
    let err = client.send(ApiRequest::get("/v3/projects")).await.unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::NetworkTerminal);
    assert_eq!(err.code, Some(503));
    assert!(err.is_transport());
}

#[tokio::test]
async fn terminal_status_is_not_retried_and_joins_messages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/projects/project"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "messages": ["Could not find requested project", "Check the slug"],
            "success": false,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = fast_client(&server, &ClientOptions::default());
    let err = client
        .send(ApiRequest::get("/v3/projects/project"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::Semantic);
    assert_eq!(err.code, Some(404));
    assert_eq!(
        err.message,
        "Could not find requested project\nCheck the slug"
    );
    assert!(!err.is_transport());
}

#[tokio::test]
async fn timeouts_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/me"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/me"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let options = ClientOptions {
        timeout: Some(Duration::from_millis(200)),
        verify_tls: true,
    };
    let client = fast_client(&server, &options);
    let response = client.send(ApiRequest::get("/v3/me")).await.unwrap();
    assert_eq!(response.text(), "{}");
}

#[tokio::test]
async fn unreachable_host_is_terminal_transport_error() {
    let client = HttpClient::new(&closed_port_uri(), &ClientOptions::default())
        .unwrap()
        .with_policy(RetryPolicy::default().with_initial_sleep(Duration::from_millis(1)));

    let err = client.send(ApiRequest::get("/v3/me")).await.unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::NetworkTerminal);
    assert_eq!(err.code, None);
    assert!(err.is_transport());
}

#[tokio::test]
async fn query_parameters_merge_without_duplicates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/configs"))
        .and(query_param("project", "backend"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let client = fast_client(&server, &ClientOptions::default());
    let request = ApiRequest::get("/v3/configs?project=backend")
        .query("project", "ignored")
        .query("page", "2");
    client.send(request).await.unwrap();

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].url.query(), Some("project=backend&page=2"));
}

#[tokio::test]
async fn cancellation_stops_between_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/me"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let cancel = tokio_util::sync::CancellationToken::new();
    let client = HttpClient::new(&server.uri(), &ClientOptions::default())
        .unwrap()
        .with_policy(RetryPolicy::default().with_initial_sleep(Duration::from_secs(30)))
        .with_cancellation(cancel.clone());
    cancel.cancel();

    let err = client.send(ApiRequest::get("/v3/me")).await.unwrap_err();
    assert_eq!(err.kind, ApiErrorKind::Cancelled);
}
