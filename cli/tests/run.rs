#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use anyhow::Result;
use common::TOKEN;
use common::TestHome;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::query_param;

#[test]
fn no_fallback_and_fallback_only_conflict() -> Result<()> {
    let home = TestHome::new()?;
    home.doppler()?
        .args(["--token", TOKEN, "-p", "backend", "-c", "dev"])
        .args(["run", "--no-fallback", "--fallback-only", "--", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot be combined"));
    Ok(())
}

#[test]
fn missing_token_is_reported_as_json() -> Result<()> {
    let home = TestHome::new()?;
    let output = home
        .doppler()?
        .args(["--json", "-p", "backend", "-c", "dev", "run", "--", "true"])
        .output()?;
    assert_eq!(output.status.code(), Some(1));
    let body: serde_json::Value = serde_json::from_slice(&output.stderr)?;
    assert!(
        body["error"].as_str().unwrap().contains("token"),
        "{body}"
    );
    Ok(())
}

#[test]
fn fallback_only_without_cache_fails() -> Result<()> {
    let home = TestHome::new()?;
    home.doppler()?
        .args(["--token", TOKEN, "-p", "backend", "-c", "dev"])
        .args(["run", "--fallback-only", "--", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Doppler Error"));
    Ok(())
}

async fn download_server(secrets: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/configs/config/secrets/download"))
        .and(query_param("project", "backend"))
        .and(query_param("config", "dev"))
        .and(query_param("format", "json"))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("etag", "\"v1\"")
                .set_body_json(secrets),
        )
        .mount(&server)
        .await;
    server
}

#[tokio::test(flavor = "multi_thread")]
async fn child_sees_secrets_and_its_exit_code_passes_through() -> Result<()> {
    let server = download_server(serde_json::json!({ "GREETING": "hello", "HOME": "/nope" })).await;
    let home = TestHome::new()?;
    let mut cmd = home.doppler()?;
    cmd.args(["--token", TOKEN, "-p", "backend", "-c", "dev", "--api-host"])
        .arg(server.uri())
        .args(["run", "--", "sh", "-c", "printf '%s' \"$GREETING\"; exit 3"]);

    let output = tokio::task::spawn_blocking(move || cmd.output()).await??;
    assert_eq!(output.status.code(), Some(3));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hello");
    // A child's failure is not reported as a CLI error.
    assert!(
        !String::from_utf8_lossy(&output.stderr).contains("Doppler Error"),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let fallback_dir = home.dir.path().join("fallback");
    let cached = std::fs::read_dir(&fallback_dir)?
        .filter_map(|entry| entry.ok())
        .any(|entry| entry.file_name().to_string_lossy().starts_with(".run-"));
    assert!(cached, "no fallback file in {}", fallback_dir.display());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn protected_prompt_survives_and_dangerous_names_warn() -> Result<()> {
    let server = download_server(serde_json::json!({
        "GREETING": "hi",
        "PS1": "pwned> ",
        "LD_PRELOAD": ""
    }))
    .await;
    let home = TestHome::new()?;
    let run_child = |home: &TestHome| -> Result<assert_cmd::Command> {
        let mut cmd = home.doppler()?;
        cmd.env("PS1", "parent$ ")
            .args(["--token", TOKEN, "-p", "backend", "-c", "dev", "--api-host"])
            .arg(server.uri())
            .args(["run", "--", "sh", "-c", "printf '%s' \"$PS1\""]);
        Ok(cmd)
    };

    let mut cmd = run_child(&home)?;
    let output = tokio::task::spawn_blocking(move || cmd.output()).await??;
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    assert!(output.status.success(), "{stderr}");
    assert_eq!(String::from_utf8_lossy(&output.stdout), "parent$ ");
    assert!(stderr.contains("Secret LD_PRELOAD can alter"), "{stderr}");

    home.doppler()?
        .args(["configure", "flags", "disable", "env-warning"])
        .assert()
        .success();
    let mut cmd = run_child(&home)?;
    let output = tokio::task::spawn_blocking(move || cmd.output()).await??;
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    assert!(output.status.success(), "{stderr}");
    assert!(!stderr.contains("LD_PRELOAD"), "{stderr}");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn cached_secrets_survive_an_outage() -> Result<()> {
    let server = download_server(serde_json::json!({ "GREETING": "cached" })).await;
    let home = TestHome::new()?;

    let mut warm = home.doppler()?;
    warm.args(["--token", TOKEN, "-p", "backend", "-c", "dev", "--api-host"])
        .arg(server.uri())
        .args(["run", "--", "true"]);
    let output = tokio::task::spawn_blocking(move || warm.output()).await??;
    assert!(output.status.success());

    // Nothing listens on the port once the placeholder listener is dropped.
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let offline_host = format!("http://127.0.0.1:{}", listener.local_addr()?.port());
    drop(listener);

    let mut offline = home.doppler()?;
    offline
        .args(["--token", TOKEN, "-p", "backend", "-c", "dev", "--attempts", "1", "--api-host"])
        .arg(&offline_host)
        .args(["run", "--command", "printf '%s' \"$GREETING\""]);
    let output = tokio::task::spawn_blocking(move || offline.output()).await??;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "cached");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn secrets_list_as_json() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/configs/config/secrets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "secrets": {
                "API_KEY": {
                    "raw": "abc",
                    "computed": "abc",
                    "rawVisibility": "masked",
                    "computedVisibility": "masked"
                }
            }
        })))
        .mount(&server)
        .await;

    let home = TestHome::new()?;
    let mut cmd = home.doppler()?;
    cmd.args(["--json", "--token", TOKEN, "-p", "backend", "-c", "dev", "--api-host"])
        .arg(server.uri())
        .arg("secrets");
    let output = tokio::task::spawn_blocking(move || cmd.output()).await??;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let body: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(body["API_KEY"]["computed"], "abc");
    Ok(())
}
