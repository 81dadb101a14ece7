use std::time::Duration;
use std::time::Instant;

use serde::Deserialize;
use serde_json::json;

use super::ApiClient;
use super::models::AuthCode;
use super::models::AuthToken;
use super::models::HostInfo;
use super::models::OidcToken;
use super::models::TokenInfo;
use crate::error::ApiError;
use crate::error::ApiErrorKind;
use crate::error::ApiResult;
use crate::http_client::ApiRequest;

/// Fixed sleep between `authorize` polls.
pub const AUTH_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Upper bound on how long `login` waits for the browser step.
pub const AUTH_POLL_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Deserialize)]
struct AuthorizeResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    dashboard_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RolledToken {
    token: String,
}

impl ApiClient {
    /// Starts the browser login flow. Needs no token.
    pub async fn generate_auth_code(&self, host: &HostInfo) -> ApiResult<AuthCode> {
        let request = ApiRequest::post("/v3/auth/cli/generate/2").json(host)?;
        self.http.send(request).await?.json()
    }

    /// One `authorize` call. `None` means the user has not finished yet.
    pub async fn get_auth_token(&self, polling_code: &str) -> ApiResult<Option<AuthToken>> {
        let host = HostInfo::current();
        let request = ApiRequest::post("/v3/auth/cli/authorize").json(&json!({
            "code": polling_code,
            "hostname": host.hostname,
            "os": host.os,
            "arch": host.arch,
        }))?;
        let response: AuthorizeResponse = self.http.send(request).await?.json()?;
        match (response.success, response.token) {
            (Some(false), _) | (_, None) => Ok(None),
            (_, Some(token)) => Ok(Some(AuthToken {
                token,
                name: response.name,
                dashboard_url: response.dashboard_url,
            })),
        }
    }

    /// Long-polls `authorize` every `interval` until a token is issued.
    ///
    /// A `409 Conflict` answer is the server's way of saying "still pending".
    pub async fn poll_auth_token(
        &self,
        polling_code: &str,
        interval: Duration,
        timeout: Duration,
    ) -> ApiResult<AuthToken> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.get_auth_token(polling_code).await {
                Ok(Some(token)) => return Ok(token),
                Ok(None) => {}
                Err(err) if err.code == Some(409) => {}
                Err(err) => return Err(err),
            }
            if Instant::now() >= deadline {
                return Err(ApiError::new(
                    ApiErrorKind::Semantic,
                    "Timed out waiting for login to be authorized",
                ));
            }
            tracing::debug!("authorization pending, polling again in {interval:?}");
            tokio::select! {
                _ = self.http.cancellation().cancelled() => {
                    return Err(ApiError::new(ApiErrorKind::Cancelled, "Login cancelled"));
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// Exchanges the current token for a new one and invalidates the old.
    pub async fn roll_auth_token(&self) -> ApiResult<String> {
        let request = ApiRequest::post("/v3/auth/cli/roll").json(&json!({ "token": self.token }))?;
        let rolled: RolledToken = self.send(request).await?.json()?;
        Ok(rolled.token)
    }

    pub async fn revoke_auth_token(&self) -> ApiResult<()> {
        let request =
            ApiRequest::post("/v3/auth/cli/revoke").json(&json!({ "token": self.token }))?;
        self.send(request).await?;
        Ok(())
    }

    /// Exchanges an identity provider token for an API token.
    pub async fn oidc_login(&self, identity: &str, oidc_token: &str) -> ApiResult<OidcToken> {
        let request = ApiRequest::post("/v3/auth/oidc").json(&json!({
            "identity": identity,
            "token": oidc_token,
        }))?;
        self.http.send(request).await?.json()
    }

    pub async fn oidc_revoke(&self) -> ApiResult<()> {
        let request = ApiRequest::post("/v3/auth/revoke").json(&json!({ "token": self.token }))?;
        self.send(request).await?;
        Ok(())
    }

    /// Identity of the current token. Accepts both a `me` envelope and a
    /// bare object.
    pub async fn me(&self) -> ApiResult<TokenInfo> {
        let response = self.send(ApiRequest::get("/v3/me")).await?;
        match super::extract::<TokenInfo>(&response.body, "me") {
            Ok(info) => Ok(info),
            Err(_) => response.json(),
        }
    }
}
