use serde_json::json;

use super::ApiClient;
use super::models::ServiceToken;
use crate::error::ApiResult;
use crate::http_client::ApiRequest;

/// How a service token is identified when revoking it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRef {
    Slug(String),
    /// The raw token value. Revocation still happens online.
    Value(String),
}

impl ApiClient {
    pub async fn list_service_tokens(&self, project: &str, config: &str) -> ApiResult<Vec<ServiceToken>> {
        let request = ApiRequest::get("/v3/configs/config/tokens")
            .query("project", project)
            .query("config", config);
        self.fetch(request, "tokens").await
    }

    /// Creates a token; the response is the only time its key is returned.
    pub async fn create_service_token(
        &self,
        project: &str,
        config: &str,
        name: &str,
        expire_at: Option<&str>,
        access: &str,
    ) -> ApiResult<ServiceToken> {
        let mut body = json!({
            "project": project,
            "config": config,
            "name": name,
            "access": access,
        });
        if let Some(expire_at) = expire_at {
            body["expire_at"] = json!(expire_at);
        }
        let request = ApiRequest::post("/v3/configs/config/tokens").json(&body)?;
        self.fetch(request, "token").await
    }

    pub async fn revoke_service_token(&self, project: &str, config: &str, token: &TokenRef) -> ApiResult<()> {
        let mut body = json!({ "project": project, "config": config });
        match token {
            TokenRef::Slug(slug) => body["slug"] = json!(slug),
            TokenRef::Value(value) => body["token"] = json!(value),
        }
        let request = ApiRequest::delete("/v3/configs/config/tokens/token").json(&body)?;
        self.send(request).await?;
        Ok(())
    }
}
