use serde_json::json;

use super::ApiClient;
use super::models::Project;
use super::models::Workplace;
use crate::error::ApiResult;
use crate::http_client::ApiRequest;

impl ApiClient {
    pub async fn get_workplace(&self) -> ApiResult<Workplace> {
        self.fetch(ApiRequest::get("/v3/workplace"), "workplace").await
    }

    /// Creates the projects described by a template document.
    pub async fn import_template(&self, template: &str) -> ApiResult<Vec<Project>> {
        let request =
            ApiRequest::post("/v3/workplace/template/import").json(&json!({ "template": template }))?;
        self.fetch(request, "projects").await
    }
}
