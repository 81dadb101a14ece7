use serde_json::json;

use super::ApiClient;
use super::models::Project;
use crate::error::ApiResult;
use crate::http_client::ApiRequest;

impl ApiClient {
    pub async fn list_projects(&self, page: u32, per_page: u32) -> ApiResult<Vec<Project>> {
        let request = ApiRequest::get("/v3/projects")
            .query("page", page.to_string())
            .query("per_page", per_page.to_string());
        self.fetch(request, "projects").await
    }

    pub async fn get_project(&self, project: &str) -> ApiResult<Project> {
        let request = ApiRequest::get("/v3/projects/project").query("project", project);
        self.fetch(request, "project").await
    }

    pub async fn create_project(&self, name: &str, description: &str) -> ApiResult<Project> {
        let request = ApiRequest::post("/v3/projects").json(&json!({
            "name": name,
            "description": description,
        }))?;
        self.fetch(request, "project").await
    }

    pub async fn update_project(
        &self,
        project: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> ApiResult<Project> {
        let mut body = json!({ "project": project });
        if let Some(name) = name {
            body["name"] = json!(name);
        }
        if let Some(description) = description {
            body["description"] = json!(description);
        }
        let request = ApiRequest::post("/v3/projects/project").json(&body)?;
        self.fetch(request, "project").await
    }

    pub async fn delete_project(&self, project: &str) -> ApiResult<()> {
        let request = ApiRequest::delete("/v3/projects/project").json(&json!({ "project": project }))?;
        self.send(request).await?;
        Ok(())
    }
}
