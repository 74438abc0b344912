// Cloud Storage: the DAG bucket Composer leaves behind on delete

use tracing::{debug, info};

use super::errors::Result;
use super::types::{Bucket, StorageList, StorageObject};
use crate::config::AutopilotConfig;
use crate::http::{endpoint, GcpHttpClient};

#[derive(Debug, Clone)]
pub struct StorageApi {
    http: GcpHttpClient,
    base_url: String,
    project: String,
}

impl StorageApi {
    pub fn new(http: GcpHttpClient, config: &AutopilotConfig) -> Self {
        Self {
            http,
            base_url: config.gcp.storage_url.clone(),
            project: config.gcp.project_id.clone(),
        }
    }

    pub async fn list_buckets(&self) -> Result<Vec<Bucket>> {
        let mut buckets = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let url = endpoint(&self.base_url, &["b"])?;
            let mut query = vec![("project", self.project.clone())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }
            let page: StorageList<Bucket> = self.http.get_with_query(url, &query).await?;
            buckets.extend(page.items);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => return Ok(buckets),
            }
        }
    }

    pub async fn list_objects(&self, bucket: &str) -> Result<Vec<StorageObject>> {
        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let url = endpoint(&self.base_url, &["b", bucket, "o"])?;
            let page: StorageList<StorageObject> = match &page_token {
                Some(token) => self.http.get_with_query(url, &[("pageToken", token)]).await?,
                None => self.http.get(url).await?,
            };
            objects.extend(page.items);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => return Ok(objects),
            }
        }
    }

    pub async fn delete_object(&self, bucket: &str, object: &str) -> Result<()> {
        self.http
            .delete(endpoint(&self.base_url, &["b", bucket, "o", object])?)
            .await
    }

    /// Buckets must be empty before they can be deleted
    pub async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.http.delete(endpoint(&self.base_url, &["b", bucket])?).await
    }

    /// Empty and delete every bucket whose `label` equals `value`.
    /// Returns the names of the deleted buckets.
    pub async fn purge_labelled_buckets(&self, label: &str, value: &str) -> Result<Vec<String>> {
        let targets: Vec<Bucket> = self
            .list_buckets()
            .await?
            .into_iter()
            .filter(|b| b.labels.get(label).map(String::as_str) == Some(value))
            .collect();

        let mut deleted = Vec::with_capacity(targets.len());
        for bucket in targets {
            let objects = self.list_objects(&bucket.name).await?;
            debug!(bucket = %bucket.name, objects = objects.len(), "Emptying bucket");
            for object in objects {
                self.delete_object(&bucket.name, &object.name).await?;
            }
            self.delete_bucket(&bucket.name).await?;
            info!(bucket = %bucket.name, "Deleted bucket");
            deleted.push(bucket.name);
        }
        Ok(deleted)
    }
}
