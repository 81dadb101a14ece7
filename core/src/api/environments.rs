use serde_json::json;

use super::ApiClient;
use super::models::Environment;
use crate::error::ApiError;
use crate::error::ApiResult;
use crate::http_client::ApiRequest;

impl ApiClient {
    pub async fn list_environments(&self, project: &str) -> ApiResult<Vec<Environment>> {
        let request = ApiRequest::get("/v3/environments").query("project", project);
        self.fetch(request, "environments").await
    }

    pub async fn get_environment(&self, project: &str, environment: &str) -> ApiResult<Environment> {
        let request = ApiRequest::get("/v3/environments/environment")
            .query("project", project)
            .query("environment", environment);
        self.fetch(request, "environment").await
    }

    pub async fn create_environment(
        &self,
        project: &str,
        name: &str,
        slug: &str,
    ) -> ApiResult<Environment> {
        let request = ApiRequest::post("/v3/environments")
            .query("project", project)
            .json(&json!({ "name": name, "slug": slug }))?;
        self.fetch(request, "environment").await
    }

    pub async fn delete_environment(&self, project: &str, environment: &str) -> ApiResult<()> {
        let request = ApiRequest::delete("/v3/environments/environment")
            .query("project", project)
            .query("environment", environment);
        self.send(request).await?;
        Ok(())
    }

    pub async fn rename_environment(
        &self,
        project: &str,
        environment: &str,
        name: Option<&str>,
        slug: Option<&str>,
    ) -> ApiResult<Environment> {
        if name.is_none() && slug.is_none() {
            return Err(ApiError::user_input(
                "A new name or slug is required to rename an environment",
            ));
        }
        let mut body = json!({});
        if let Some(name) = name {
            body["name"] = json!(name);
        }
        if let Some(slug) = slug {
            body["slug"] = json!(slug);
        }
        let request = ApiRequest::put("/v3/environments/environment")
            .query("project", project)
            .query("environment", environment)
            .json(&body)?;
        self.fetch(request, "environment").await
    }
}
