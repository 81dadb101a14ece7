use super::ApiClient;
use super::models::ActivityLog;
use super::models::ConfigLog;
use crate::error::ApiResult;
use crate::http_client::ApiRequest;

impl ApiClient {
    pub async fn list_config_logs(
        &self,
        project: &str,
        config: &str,
        page: u32,
        per_page: u32,
    ) -> ApiResult<Vec<ConfigLog>> {
        let request = ApiRequest::get("/v3/configs/config/logs")
            .query("project", project)
            .query("config", config)
            .query("page", page.to_string())
            .query("per_page", per_page.to_string());
        self.fetch(request, "logs").await
    }

    pub async fn get_config_log(&self, project: &str, config: &str, log: &str) -> ApiResult<ConfigLog> {
        let request = ApiRequest::get("/v3/configs/config/logs/log")
            .query("project", project)
            .query("config", config)
            .query("log", log);
        self.fetch(request, "log").await
    }

    /// Restores the config to the state recorded by `log`.
    pub async fn rollback_config_log(
        &self,
        project: &str,
        config: &str,
        log: &str,
    ) -> ApiResult<ConfigLog> {
        let request = ApiRequest::post("/v3/configs/config/logs/log/rollback")
            .query("project", project)
            .query("config", config)
            .query("log", log);
        self.fetch(request, "log").await
    }

    pub async fn list_activity_logs(&self, page: u32, per_page: u32) -> ApiResult<Vec<ActivityLog>> {
        let request = ApiRequest::get("/v3/logs")
            .query("page", page.to_string())
            .query("per_page", per_page.to_string());
        self.fetch(request, "logs").await
    }

    pub async fn get_activity_log(&self, log: &str) -> ApiResult<ActivityLog> {
        let request = ApiRequest::get("/v3/logs/log").query("log", log);
        self.fetch(request, "log").await
    }
}
