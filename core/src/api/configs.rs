use serde_json::json;

use super::ApiClient;
use super::models::Config;
use crate::error::ApiResult;
use crate::http_client::ApiRequest;

impl ApiClient {
    /// Lists configs of `project`, optionally narrowed to one environment.
    pub async fn list_configs(
        &self,
        project: &str,
        environment: Option<&str>,
    ) -> ApiResult<Vec<Config>> {
        let request = ApiRequest::get("/v3/configs")
            .query("project", project)
            .query_opt("environment", environment);
        self.fetch(request, "configs").await
    }

    pub async fn get_config(&self, project: &str, config: &str) -> ApiResult<Config> {
        let request = ApiRequest::get("/v3/configs/config")
            .query("project", project)
            .query("config", config);
        self.fetch(request, "config").await
    }

    pub async fn create_config(
        &self,
        project: &str,
        environment: &str,
        name: &str,
    ) -> ApiResult<Config> {
        let request = ApiRequest::post("/v3/configs").json(&json!({
            "project": project,
            "environment": environment,
            "name": name,
        }))?;
        self.fetch(request, "config").await
    }

    /// Renames a branch config.
    pub async fn update_config(&self, project: &str, config: &str, name: &str) -> ApiResult<Config> {
        let request = ApiRequest::post("/v3/configs/config").json(&json!({
            "project": project,
            "config": config,
            "name": name,
        }))?;
        self.fetch(request, "config").await
    }

    pub async fn delete_config(&self, project: &str, config: &str) -> ApiResult<()> {
        let request = ApiRequest::delete("/v3/configs/config").json(&json!({
            "project": project,
            "config": config,
        }))?;
        self.send(request).await?;
        Ok(())
    }

    pub async fn lock_config(&self, project: &str, config: &str) -> ApiResult<Config> {
        self.config_action("/v3/configs/config/lock", project, config)
            .await
    }

    pub async fn unlock_config(&self, project: &str, config: &str) -> ApiResult<Config> {
        self.config_action("/v3/configs/config/unlock", project, config)
            .await
    }

    pub async fn clone_config(&self, project: &str, config: &str, name: &str) -> ApiResult<Config> {
        let request = ApiRequest::post("/v3/configs/config/clone").json(&json!({
            "project": project,
            "config": config,
            "name": name,
        }))?;
        self.fetch(request, "config").await
    }

    async fn config_action(&self, path: &str, project: &str, config: &str) -> ApiResult<Config> {
        let request = ApiRequest::post(path).json(&json!({
            "project": project,
            "config": config,
        }))?;
        self.fetch(request, "config").await
    }
}
