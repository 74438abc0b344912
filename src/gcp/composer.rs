// Cloud Composer environments API (v1beta1)

use serde_json::{json, Value};
use tracing::{debug, info};
use url::Url;

use super::errors::Result;
use super::types::{Environment, ListEnvironmentsResponse};
use crate::config::AutopilotConfig;
use crate::http::{endpoint, GcpHttpClient};

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

#[derive(Debug, Clone)]
pub struct ComposerApi {
    http: GcpHttpClient,
    base_url: String,
    project: String,
    location: String,
}

impl ComposerApi {
    pub fn new(http: GcpHttpClient, config: &AutopilotConfig) -> Self {
        Self {
            http,
            base_url: config.gcp.composer_url.clone(),
            project: config.gcp.project_id.clone(),
            location: config.gcp.location.clone(),
        }
    }

    fn environments_url(&self) -> Result<Url> {
        endpoint(
            &self.base_url,
            &["projects", self.project.as_str(), "locations", self.location.as_str(), "environments"],
        )
    }

    fn environment_url(&self, name: &str) -> Result<Url> {
        endpoint(
            &self.base_url,
            &["projects", self.project.as_str(), "locations", self.location.as_str(), "environments", name],
        )
    }

    pub fn resource_name(&self, name: &str) -> String {
        format!(
            "projects/{}/locations/{}/environments/{}",
            self.project, self.location, name
        )
    }

    pub async fn list_environments(&self) -> Result<Vec<Environment>> {
        let mut environments = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = self.environments_url()?;
            let page: ListEnvironmentsResponse = match &page_token {
                Some(token) => self.http.get_with_query(url, &[("pageToken", token)]).await?,
                None => self.http.get(url).await?,
            };
            environments.extend(page.environments);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(count = environments.len(), "Listed Composer environments");
        Ok(environments)
    }

    /// True when an environment with exactly this short name is listed, in any state
    pub async fn environment_exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .list_environments()
            .await?
            .iter()
            .any(|env| env.short_name() == name))
    }

    pub async fn get_environment(&self, name: &str) -> Result<Environment> {
        self.http.get(self.environment_url(name)?).await
    }

    /// Start creating the environment; completion is observed by polling
    pub async fn create_environment(&self, body: &Value) -> Result<()> {
        info!(environment = %body["name"], "Creating Composer environment");
        let _operation: Value = self.http.post(self.environments_url()?, body).await?;
        Ok(())
    }

    pub async fn update_pypi_packages(&self, name: &str, body: &Value) -> Result<()> {
        let mut url = self.environment_url(name)?;
        url.query_pairs_mut()
            .append_pair("updateMask", "config.softwareConfig.pypiPackages");
        info!(environment = name, "Updating PyPI packages");
        let _operation: Value = self.http.patch(url, body).await?;
        Ok(())
    }

    pub async fn delete_environment(&self, name: &str) -> Result<()> {
        info!(environment = name, "Deleting Composer environment");
        self.http.delete(self.environment_url(name)?).await
    }
}

/// Request body for a new environment, shaped from configuration
pub fn environment_body(config: &AutopilotConfig) -> Value {
    let gcp = &config.gcp;
    let composer = &config.composer;

    let mut env_variables = composer.env_variables.clone();
    env_variables.insert("PROJECT_ID".to_string(), gcp.project_id.clone());
    if let Some(webhook) = &config.notify.webhook_url {
        env_variables.insert("WEBHOOK_URL".to_string(), webhook.clone());
    }

    json!({
        "name": format!(
            "projects/{}/locations/{}/environments/{}",
            gcp.project_id, gcp.location, gcp.environment_name
        ),
        "config": {
            "nodeCount": composer.node_count,
            "softwareConfig": {
                "imageVersion": composer.image_version,
                "pythonVersion": composer.python_version,
                "envVariables": env_variables,
            },
            "nodeConfig": {
                "location": format!("projects/{}/zones/{}", gcp.project_id, gcp.zone),
                "machineType": format!(
                    "projects/{}/zones/{}/machineTypes/{}",
                    gcp.project_id, gcp.zone, composer.machine_type
                ),
                "network": format!("projects/{}/global/networks/default", gcp.project_id),
                "diskSizeGb": composer.disk_size_gb,
                "oauthScopes": [CLOUD_PLATFORM_SCOPE],
            }
        }
    })
}

/// PATCH body installing the configured PyPI packages
pub fn pypi_body(config: &AutopilotConfig) -> Value {
    json!({
        "config": {
            "softwareConfig": {
                "pypiPackages": config.composer.pypi_packages,
            }
        }
    })
}
