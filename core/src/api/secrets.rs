use std::collections::BTreeMap;
use std::ops::ControlFlow;

use bytes::Bytes;
use serde::Serialize;
use serde_json::json;

use super::ApiClient;
use super::extract;
use super::models::ChangeRequest;
use super::models::SecretNote;
use super::models::SecretsMap;
use super::models::SecretsUpdate;
use super::models::WireSecret;
use crate::error::ApiError;
use crate::error::ApiResult;
use crate::http_client::ApiRequest;
use crate::http_client::ServerEvent;

/// Parameters of the download endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    pub format: String,
    pub name_transformer: Option<String>,
    /// Restrict the download to these names; empty means all.
    pub secrets: Vec<String>,
    /// Sent as `If-None-Match`; a matching server answers 304.
    pub etag: Option<String>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
            name_transformer: None,
            secrets: Vec::new(),
            etag: None,
        }
    }
}

/// Raw body of a download along with its cache validator.
#[derive(Debug, Clone)]
pub struct Download {
    pub body: Bytes,
    pub etag: Option<String>,
    /// The server confirmed the caller's ETag; `body` is empty.
    pub not_modified: bool,
}

#[derive(Serialize)]
struct SetSecretsBody<'a> {
    project: &'a str,
    config: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    secrets: Option<&'a BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    change_requests: Option<&'a [ChangeRequest]>,
}

fn into_secrets(wire: BTreeMap<String, WireSecret>) -> SecretsMap {
    wire.into_iter()
        .map(|(name, secret)| (name.clone(), secret.into_secret(name)))
        .collect()
}

/// Parses a `format=json` download into a flat name to value map.
pub fn parse_download_json(body: &[u8]) -> ApiResult<BTreeMap<String, String>> {
    serde_json::from_slice(body).map_err(|err| {
        ApiError::protocol(format!(
            "Unable to parse downloaded secrets as {}",
            std::any::type_name::<BTreeMap<String, String>>()
        ))
        .with_cause(err)
    })
}

impl ApiClient {
    /// Lists secrets, optionally narrowed to `names`.
    pub async fn get_secrets(
        &self,
        project: &str,
        config: &str,
        names: &[String],
    ) -> ApiResult<SecretsMap> {
        let mut request = ApiRequest::get("/v3/configs/config/secrets")
            .query("project", project)
            .query("config", config);
        if !names.is_empty() {
            request = request.query("secrets", names.join(","));
        }
        let response = self.send(request).await?;
        extract_secrets(&response.body)
    }

    pub async fn get_secret_names(&self, project: &str, config: &str) -> ApiResult<Vec<String>> {
        let request = ApiRequest::get("/v3/configs/config/secrets/names")
            .query("project", project)
            .query("config", config);
        self.fetch(request, "names").await
    }

    /// Writes secrets and returns the resulting full set.
    pub async fn set_secrets(
        &self,
        project: &str,
        config: &str,
        update: &SecretsUpdate,
    ) -> ApiResult<SecretsMap> {
        let body = match update {
            SecretsUpdate::Values(values) => SetSecretsBody {
                project,
                config,
                secrets: Some(values),
                change_requests: None,
            },
            SecretsUpdate::ChangeRequests(changes) => SetSecretsBody {
                project,
                config,
                secrets: None,
                change_requests: Some(changes),
            },
        };
        let request = ApiRequest::post("/v3/configs/config/secrets").json(&body)?;
        let response = self.send(request).await?;
        extract_secrets(&response.body)
    }

    pub async fn set_secret_note(
        &self,
        project: &str,
        config: &str,
        secret: &str,
        note: &str,
    ) -> ApiResult<SecretNote> {
        let request = ApiRequest::post("/v3/configs/config/secrets/note").json(&json!({
            "project": project,
            "config": config,
            "secret": secret,
            "note": note,
        }))?;
        let response = self.send(request).await?;
        response.json()
    }

    pub async fn download_secrets(
        &self,
        project: &str,
        config: &str,
        options: &DownloadOptions,
    ) -> ApiResult<Download> {
        let mut request = ApiRequest::get("/v3/configs/config/secrets/download")
            .query("project", project)
            .query("config", config)
            .query("format", options.format.as_str())
            .query_opt("name_transformer", options.name_transformer.as_deref());
        if !options.secrets.is_empty() {
            request = request.query("secrets", options.secrets.join(","));
        }
        if let Some(etag) = options.etag.as_deref() {
            request = request.header("if-none-match", etag)?.allow_not_modified();
        }

        let response = self.send(request).await?;
        let not_modified = response.is_not_modified();
        Ok(Download {
            etag: response.etag(),
            body: if not_modified { Bytes::new() } else { response.body },
            not_modified,
        })
    }

    /// Uploads a secrets file (env, json or yaml content) and returns the
    /// resulting full set.
    pub async fn upload_secrets(&self, project: &str, config: &str, file: &str) -> ApiResult<SecretsMap> {
        let request = ApiRequest::post("/v3/configs/config/secrets/upload").json(&json!({
            "project": project,
            "config": config,
            "file": file,
        }))?;
        let response = self.send(request).await?;
        extract_secrets(&response.body)
    }

    /// Streams change notifications for a config until `handler` breaks or
    /// the server closes the connection.
    pub async fn watch_secrets<F>(&self, project: &str, config: &str, handler: F) -> ApiResult<()>
    where
        F: FnMut(ServerEvent) -> ControlFlow<()>,
    {
        let request = ApiRequest::get("/v3/configs/config/secrets/watch")
            .query("project", project)
            .query("config", config)
            .bearer(&self.token)?;
        self.http.stream_events(request, handler).await
    }
}

fn extract_secrets(body: &[u8]) -> ApiResult<SecretsMap> {
    extract::<BTreeMap<String, WireSecret>>(body, "secrets").map(into_secrets)
}
