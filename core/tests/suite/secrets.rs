use std::collections::BTreeMap;
use std::ops::ControlFlow;

use doppler_core::api::DownloadOptions;
use doppler_core::api::models::ChangeRequest;
use doppler_core::api::models::SecretsUpdate;
use doppler_core::api::models::Visibility;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::body_json;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::query_param;

use super::TOKEN;
use super::api_client;
use super::secret_json;

#[tokio::test]
async fn retry_then_success_returns_secrets_after_three_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/configs/config/secrets"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/configs/config/secrets"))
        .and(query_param("project", "backend"))
        .and(query_param("config", "dev"))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "secrets": { "A": secret_json("a") },
            "success": true,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = api_client(&server);
    let secrets = client.get_secrets("backend", "dev", &[]).await.unwrap();

    let values: BTreeMap<&str, &str> = secrets
        .iter()
        .map(|(name, secret)| (name.as_str(), secret.computed.as_deref().unwrap_or_default()))
        .collect();
    assert_eq!(values, BTreeMap::from([("A", "a")]));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn restricted_values_are_absent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/configs/config/secrets"))
        .and(query_param("secrets", "HIDDEN,OPEN"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "secrets": {
                "HIDDEN": {
                    "raw": "x",
                    "computed": "x",
                    "rawVisibility": "restricted",
                    "computedVisibility": "restricted",
                },
                "OPEN": secret_json("o"),
            }
        })))
        .mount(&server)
        .await;

    let client = api_client(&server);
    let names = vec!["HIDDEN".to_string(), "OPEN".to_string()];
    let secrets = client.get_secrets("p", "c", &names).await.unwrap();
    assert_eq!(secrets["HIDDEN"].raw, None);
    assert_eq!(secrets["HIDDEN"].computed_visibility, Visibility::Restricted);
    assert_eq!(secrets["OPEN"].raw.as_deref(), Some("o"));
}

#[tokio::test]
async fn change_requests_are_sent_in_camel_case() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/configs/config/secrets"))
        .and(body_json(json!({
            "project": "p",
            "config": "c",
            "change_requests": [
                { "name": "NEW", "value": "1" },
                { "name": "OLD", "originalName": "OLD", "shouldDelete": true },
            ],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "secrets": { "NEW": secret_json("1") }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = api_client(&server);
    let update = SecretsUpdate::ChangeRequests(vec![
        ChangeRequest::create("NEW", "1"),
        ChangeRequest::delete("OLD"),
    ]);
    let secrets = client.set_secrets("p", "c", &update).await.unwrap();
    assert_eq!(secrets.keys().collect::<Vec<_>>(), vec!["NEW"]);
}

#[tokio::test]
async fn download_honours_etag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/configs/config/secrets/download"))
        .and(header("if-none-match", "\"v1\""))
        .respond_with(ResponseTemplate::new(304))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/configs/config/secrets/download"))
        .and(query_param("format", "json"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("etag", "\"v1\"")
                .set_body_string(r#"{"X":"1"}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = api_client(&server);
    let fresh = client
        .download_secrets("p", "c", &DownloadOptions::default())
        .await
        .unwrap();
    assert!(!fresh.not_modified);
    assert_eq!(fresh.etag.as_deref(), Some("\"v1\""));
    assert_eq!(&fresh.body[..], br#"{"X":"1"}"#);

    let cached = client
        .download_secrets(
            "p",
            "c",
            &DownloadOptions {
                etag: fresh.etag.clone(),
                ..DownloadOptions::default()
            },
        )
        .await
        .unwrap();
    assert!(cached.not_modified);
    assert!(cached.body.is_empty());
}

#[tokio::test]
async fn missing_envelope_key_names_the_expected_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/configs/config/secrets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .mount(&server)
        .await;

    let client = api_client(&server);
    let err = client.get_secrets("p", "c", &[]).await.unwrap_err();
    assert_eq!(err.kind, doppler_core::ApiErrorKind::Protocol);
    assert!(err.message.contains("secrets"), "{}", err.message);
}

#[tokio::test]
async fn watch_dispatches_events_until_handler_breaks() {
    let server = MockServer::start().await;
    let body = concat!(
        ": keep-alive\n\n",
        "event: connected\ndata: {}\n\n",
        "event: secrets.update\ndata: {\"config\":\"dev\"}\n\n",
        "event: ignored\ndata: never\n\n",
    );
    Mock::given(method("GET"))
        .and(path("/v3/configs/config/secrets/watch"))
        .and(header("accept", "text/event-stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let client = api_client(&server);
    let mut seen = Vec::new();
    client
        .watch_secrets("p", "dev", |event| {
            seen.push((event.event.clone(), event.data.clone()));
            if event.event == "secrets.update" {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await
        .unwrap();
    assert_eq!(
        seen,
        vec![
            ("connected".to_string(), "{}".to_string()),
            ("secrets.update".to_string(), "{\"config\":\"dev\"}".to_string()),
        ]
    );
}
