// Compute Engine: the polling instance and Composer's leftover disks

use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use super::errors::Result;
use super::types::{ComputeList, Disk, Image, Instance};
use crate::config::AutopilotConfig;
use crate::http::{endpoint, GcpHttpClient};

#[derive(Debug, Clone)]
pub struct ComputeApi {
    http: GcpHttpClient,
    base_url: String,
    project: String,
    zone: String,
}

impl ComputeApi {
    pub fn new(http: GcpHttpClient, config: &AutopilotConfig) -> Self {
        Self {
            http,
            base_url: config.gcp.compute_url.clone(),
            project: config.gcp.project_id.clone(),
            zone: config.gcp.zone.clone(),
        }
    }

    fn zonal(&self, tail: &[&str]) -> Result<Url> {
        let mut segments = vec!["projects", self.project.as_str(), "zones", self.zone.as_str()];
        segments.extend_from_slice(tail);
        endpoint(&self.base_url, &segments)
    }

    async fn list_all<T: serde::de::DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let url = self.zonal(&[collection])?;
            let page: ComputeList<T> = match &page_token {
                Some(token) => self.http.get_with_query(url, &[("pageToken", token)]).await?,
                None => self.http.get(url).await?,
            };
            items.extend(page.items);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => return Ok(items),
            }
        }
    }

    /// Newest non-deprecated image in a public image family
    pub async fn image_from_family(&self, project: &str, family: &str) -> Result<Image> {
        let url = endpoint(
            &self.base_url,
            &["projects", project, "global", "images", "family", family],
        )?;
        self.http.get(url).await
    }

    pub async fn insert_instance(&self, body: &Value) -> Result<()> {
        info!(instance = %body["name"], zone = %self.zone, "Inserting instance");
        let _operation: Value = self.http.post(self.zonal(&["instances"])?, body).await?;
        Ok(())
    }

    pub async fn list_instances(&self) -> Result<Vec<Instance>> {
        self.list_all("instances").await
    }

    pub async fn delete_instance(&self, name: &str) -> Result<()> {
        info!(instance = name, "Deleting instance");
        self.http.delete(self.zonal(&["instances", name])?).await
    }

    /// Delete the named instance if it exists. Returns whether a delete was issued.
    pub async fn delete_instance_if_present(&self, name: &str) -> Result<bool> {
        let present = self.list_instances().await?.iter().any(|i| i.name == name);
        if !present {
            debug!(instance = name, "Instance not found, nothing to delete");
            return Ok(false);
        }
        self.delete_instance(name).await?;
        Ok(true)
    }

    pub async fn list_disks(&self) -> Result<Vec<Disk>> {
        self.list_all("disks").await
    }

    pub async fn delete_disk(&self, name: &str) -> Result<()> {
        info!(disk = name, "Deleting disk");
        self.http.delete(self.zonal(&["disks", name])?).await
    }
}
