use std::time::Duration;

use doppler_core::api::TokenRef;
use doppler_core::api::models::HostInfo;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::body_json;
use wiremock::matchers::body_partial_json;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;

use super::TOKEN;
use super::api_client;

#[tokio::test]
async fn login_flow_polls_until_authorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/auth/cli/generate/2"))
        .and(body_partial_json(json!({ "os": std::env::consts::OS })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "ABCD-EFGH",
            "polling_code": "poll-123",
            "auth_url": "https://dashboard.example.com/workplace/auth/cli",
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v3/auth/cli/authorize"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "messages": ["Authorization pending"],
            "success": false,
        })))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v3/auth/cli/authorize"))
        .and(body_partial_json(json!({ "code": "poll-123" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "token": "dp.ct.issued",
            "name": "laptop",
            "dashboard_url": "https://dashboard.example.com",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = api_client(&server);
    let code = client.generate_auth_code(&HostInfo::current()).await.unwrap();
    assert_eq!(code.code, "ABCD-EFGH");

    let token = client
        .poll_auth_token(&code.polling_code, Duration::from_millis(5), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(token.token, "dp.ct.issued");
    assert_eq!(token.dashboard_url.as_deref(), Some("https://dashboard.example.com"));
}

#[tokio::test]
async fn polling_gives_up_after_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/auth/cli/authorize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": false })))
        .mount(&server)
        .await;

    let err = api_client(&server)
        .poll_auth_token("poll", Duration::from_millis(5), Duration::from_millis(30))
        .await
        .unwrap_err();
    assert!(err.message.contains("Timed out"), "{err}");
}

#[tokio::test]
async fn me_accepts_envelope_and_bare_object() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/me"))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "slug": "tok-1",
            "name": "ci",
            "type": "service_token",
            "workplace": { "slug": "acme", "name": "Acme" },
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "me": { "slug": "tok-2", "name": "cli" },
            "success": true,
        })))
        .mount(&server)
        .await;

    let client = api_client(&server);
    let bare = client.me().await.unwrap();
    assert_eq!(bare.slug, "tok-1");
    assert_eq!(bare.token_type, "service_token");
    assert_eq!(bare.workplace.name, "Acme");

    let wrapped = client.me().await.unwrap();
    assert_eq!(wrapped.slug, "tok-2");
}

#[tokio::test]
async fn roll_and_revoke_send_the_current_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/auth/cli/roll"))
        .and(body_json(json!({ "token": TOKEN })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "dp.ct.rolled" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v3/auth/cli/revoke"))
        .and(body_json(json!({ "token": TOKEN })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let client = api_client(&server);
    assert_eq!(client.roll_auth_token().await.unwrap(), "dp.ct.rolled");
    client.revoke_auth_token().await.unwrap();
}

#[tokio::test]
async fn service_tokens_revoke_by_slug_or_value() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v3/configs/config/tokens/token"))
        .and(body_partial_json(json!({ "slug": "tok-slug" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v3/configs/config/tokens/token"))
        .and(body_partial_json(json!({ "token": "dp.st.raw" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let client = api_client(&server);
    client
        .revoke_service_token("p", "c", &TokenRef::Slug("tok-slug".to_string()))
        .await
        .unwrap();
    client
        .revoke_service_token("p", "c", &TokenRef::Value("dp.st.raw".to_string()))
        .await
        .unwrap();
}
