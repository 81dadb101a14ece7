use std::collections::BTreeMap;
use std::path::Path;

use doppler_core::fallback::FallbackStore;
use doppler_core::run::ChildCommand;
use doppler_core::run::ExecOptions;
use doppler_core::run::FallbackSettings;
use doppler_core::run::FetchOptions;
use doppler_core::run::RunError;
use doppler_core::run::SecretsSource;
use doppler_core::run::fetch_secrets;
use pretty_assertions::assert_eq;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;

use super::TOKEN;
use super::api_client;
use super::offline_client;

const DOWNLOAD: &str = "/v3/configs/config/secrets/download";

fn options(dir: &Path) -> FetchOptions {
    FetchOptions {
        project: "backend".to_string(),
        config: "dev".to_string(),
        name_transformer: None,
        only_secrets: Vec::new(),
        fallback: Some(FallbackSettings {
            path: dir.join("fb"),
            metadata_dir: dir.join("meta"),
            passphrase: None,
            readonly: false,
            only: false,
            exit_on_write_failure: true,
        }),
        use_cache: true,
    }
}

fn store_for(options: &FetchOptions) -> FallbackStore {
    let settings = options.fallback.clone().unwrap();
    FallbackStore::new(
        &options.identity(TOKEN),
        settings.path,
        settings.metadata_dir,
        settings.passphrase,
    )
}

async fn mount_download(server: &MockServer, body: &str, etag: &str) {
    Mock::given(method("GET"))
        .and(path(DOWNLOAD))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("etag", etag)
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn fallback_recovers_after_network_partition() {
    let dir = tempfile::tempdir().unwrap();
    let options = options(dir.path());

    let server = MockServer::start().await;
    mount_download(&server, r#"{"X":"1"}"#, "\"e1\"").await;
    let client = api_client(&server);

    let first = fetch_secrets(&client, &options).await.unwrap();
    assert_eq!(first.source, SecretsSource::Api);
    assert!(dir.path().join("fb").exists());
    let cached = store_for(&options).read().unwrap().unwrap();
    assert_eq!(cached, BTreeMap::from([("X".to_string(), "1".to_string())]));

    let second = fetch_secrets(&offline_client(), &options).await.unwrap();
    assert_eq!(second.source, SecretsSource::Fallback);
    assert_eq!(second.secrets, first.secrets);
}

#[tokio::test]
async fn not_modified_reads_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let options = options(dir.path());

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOWNLOAD))
        .and(header("if-none-match", "\"e1\""))
        .respond_with(ResponseTemplate::new(304))
        .expect(1)
        .mount(&server)
        .await;
    mount_download(&server, r#"{"X":"1"}"#, "\"e1\"").await;
    let client = api_client(&server);

    fetch_secrets(&client, &options).await.unwrap();
    let again = fetch_secrets(&client, &options).await.unwrap();
    assert_eq!(again.source, SecretsSource::NotModified);
    assert_eq!(again.secrets["X"], "1");

    let uncached = FetchOptions {
        use_cache: false,
        ..options.clone()
    };
    let fresh = fetch_secrets(&client, &uncached).await.unwrap();
    assert_eq!(fresh.source, SecretsSource::Api);
}

#[tokio::test]
async fn redownload_after_not_modified_still_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let options = options(dir.path());
    store_for(&options)
        .write(br#"{"X":"1"}"#, Some("\"e1\""))
        .unwrap();
    // The sidecar still advertises the ETag but the payload no longer decrypts.
    std::fs::write(dir.path().join("fb"), "not an envelope").unwrap();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOWNLOAD))
        .and(header("if-none-match", "\"e1\""))
        .respond_with(ResponseTemplate::new(304))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DOWNLOAD))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = fetch_secrets(&api_client(&server), &options)
        .await
        .unwrap_err();
    // The fallback file was consulted instead of surfacing the 503.
    assert!(matches!(err, RunError::Fallback(_)), "{err}");
    assert!(server.received_requests().await.unwrap().len() > 1);
}

#[tokio::test]
async fn semantic_errors_do_not_fall_back() {
    let dir = tempfile::tempdir().unwrap();
    let options = options(dir.path());
    store_for(&options).write(br#"{"X":"1"}"#, None).unwrap();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DOWNLOAD))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "messages": ["Invalid Service token"],
            "success": false,
        })))
        .mount(&server)
        .await;

    let err = fetch_secrets(&api_client(&server), &options)
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::Api(_)), "{err}");
    assert_eq!(err.to_string(), "Invalid Service token");
}

#[tokio::test]
async fn missing_cache_reports_original_failure() {
    let dir = tempfile::tempdir().unwrap();
    let options = options(dir.path());
    let err = fetch_secrets(&offline_client(), &options).await.unwrap_err();
    assert!(matches!(err, RunError::FallbackMissing { .. }), "{err}");
}

#[tokio::test]
async fn fallback_only_skips_the_network_and_readonly_never_writes() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = options(dir.path());

    let server = MockServer::start().await;
    mount_download(&server, r#"{"X":"2"}"#, "\"e2\"").await;
    let client = api_client(&server);

    if let Some(settings) = options.fallback.as_mut() {
        settings.readonly = true;
    }
    let fetched = fetch_secrets(&client, &options).await.unwrap();
    assert_eq!(fetched.source, SecretsSource::Api);
    assert!(!dir.path().join("fb").exists());

    store_for(&options).write(br#"{"X":"cached"}"#, None).unwrap();
    if let Some(settings) = options.fallback.as_mut() {
        settings.only = true;
    }
    let requests_before = server.received_requests().await.unwrap().len();
    let fetched = fetch_secrets(&client, &options).await.unwrap();
    assert_eq!(fetched.source, SecretsSource::Fallback);
    assert_eq!(fetched.secrets["X"], "cached");
    assert_eq!(server.received_requests().await.unwrap().len(), requests_before);
}

#[cfg(unix)]
#[tokio::test]
async fn run_injects_secrets_but_keeps_protected_names() {
    let dir = tempfile::tempdir().unwrap();
    let options = options(dir.path());
    let out = dir.path().join("out");

    let server = MockServer::start().await;
    mount_download(
        &server,
        r#"{"GREETING":"hello","PATH":"/evil","HOME":"/evil","LD_PRELOAD":"x.so"}"#,
        "\"e1\"",
    )
    .await;

    let script = format!(
        "printf '%s|%s|%s' \"$GREETING\" \"$PATH\" \"$HOME\" > '{}'",
        out.display()
    );
    let exec = ExecOptions {
        command: ChildCommand::Argv(vec!["/bin/sh".to_string(), "-c".to_string(), script]),
        preserve_env: false,
        warn_dangerous: true,
    };
    let code = doppler_core::run::run(&api_client(&server), &options, &exec)
        .await
        .unwrap();
    assert_eq!(code, 0);

    let written = std::fs::read_to_string(&out).unwrap();
    let parts: Vec<&str> = written.split('|').collect();
    assert_eq!(parts[0], "hello");
    assert_ne!(parts[1], "/evil");
    assert_ne!(parts[2], "/evil");
}
