// Cloud Build triggers and builds, used to deploy DAGs into the environment

use serde_json::json;
use tracing::info;
use url::Url;

use super::errors::Result;
use super::types::{Build, BuildOperation, BuildStatus, ListBuildsResponse, ListTriggersResponse};
use crate::config::AutopilotConfig;
use crate::http::{endpoint, GcpHttpClient};

#[derive(Debug, Clone)]
pub struct CloudBuildApi {
    http: GcpHttpClient,
    base_url: String,
    project: String,
}

impl CloudBuildApi {
    pub fn new(http: GcpHttpClient, config: &AutopilotConfig) -> Self {
        Self {
            http,
            base_url: config.gcp.cloud_build_url.clone(),
            project: config.gcp.project_id.clone(),
        }
    }

    fn url(&self, tail: &[&str]) -> Result<Url> {
        let mut segments = vec!["projects", self.project.as_str()];
        segments.extend_from_slice(tail);
        endpoint(&self.base_url, &segments)
    }

    /// Id of the trigger with this name, if one exists
    pub async fn find_trigger(&self, name: &str) -> Result<Option<String>> {
        let mut page_token: Option<String> = None;
        loop {
            let url = self.url(&["triggers"])?;
            let page: ListTriggersResponse = match &page_token {
                Some(token) => self.http.get_with_query(url, &[("pageToken", token)]).await?,
                None => self.http.get(url).await?,
            };
            if let Some(trigger) = page.triggers.into_iter().find(|t| t.name == name) {
                return Ok(Some(trigger.id));
            }
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => return Ok(None),
            }
        }
    }

    /// Run a trigger against a branch. Returns the id of the started build when
    /// the operation metadata carries one.
    pub async fn run_trigger(&self, trigger_id: &str, branch: &str) -> Result<Option<String>> {
        let action = format!("{trigger_id}:run");
        let url = self.url(&["triggers", action.as_str()])?;
        info!(trigger_id, branch, "Running Cloud Build trigger");

        let operation: BuildOperation = self.http.post(url, &json!({ "branchName": branch })).await?;
        Ok(operation.metadata.and_then(|m| m.build).map(|b| b.id))
    }

    pub async fn get_build(&self, build_id: &str) -> Result<Build> {
        self.http.get(self.url(&["builds", build_id])?).await
    }

    /// Status of the newest build started by the trigger
    pub async fn latest_build_status(&self, trigger_id: &str) -> Result<Option<BuildStatus>> {
        // Builds are listed newest first
        let builds: ListBuildsResponse = self.http.get(self.url(&["builds"])?).await?;
        Ok(builds
            .builds
            .into_iter()
            .find(|b| b.build_trigger_id.as_deref() == Some(trigger_id))
            .map(|b| b.status))
    }
}
