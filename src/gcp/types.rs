// Partial views of the Google Cloud resources the workflow reads.
// Only the fields we act on are modelled; everything else is ignored.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Lifecycle state of a Composer environment
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum EnvironmentState {
    Creating,
    Running,
    Updating,
    Deleting,
    Error,
    Unspecified,
    Unknown(String),
}

impl From<&str> for EnvironmentState {
    fn from(state: &str) -> Self {
        match state {
            "CREATING" => EnvironmentState::Creating,
            "RUNNING" => EnvironmentState::Running,
            "UPDATING" => EnvironmentState::Updating,
            "DELETING" => EnvironmentState::Deleting,
            "ERROR" => EnvironmentState::Error,
            "STATE_UNSPECIFIED" => EnvironmentState::Unspecified,
            other => EnvironmentState::Unknown(other.to_string()),
        }
    }
}

impl From<String> for EnvironmentState {
    fn from(state: String) -> Self {
        EnvironmentState::from(state.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// Full resource name: projects/{p}/locations/{l}/environments/{name}
    pub name: String,
    pub state: Option<EnvironmentState>,
    #[serde(default)]
    pub config: Option<EnvironmentConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentConfig {
    pub airflow_uri: Option<String>,
    pub dag_gcs_prefix: Option<String>,
    #[serde(default)]
    pub software_config: Option<SoftwareConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftwareConfig {
    pub image_version: Option<String>,
    pub pypi_packages: Option<BTreeMap<String, String>>,
}

impl Environment {
    /// Short environment name, the last segment of the resource name
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    pub fn is_running(&self) -> bool {
        self.state == Some(EnvironmentState::Running)
    }

    pub fn airflow_uri(&self) -> Option<&str> {
        self.config.as_ref()?.airflow_uri.as_deref()
    }

    pub fn has_pypi_packages(&self) -> bool {
        self.config
            .as_ref()
            .and_then(|c| c.software_config.as_ref())
            .is_some_and(|s| s.pypi_packages.is_some())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEnvironmentsResponse {
    #[serde(default)]
    pub environments: Vec<Environment>,
    pub next_page_token: Option<String>,
}

/// Cloud Build status values
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum BuildStatus {
    Pending,
    Queued,
    Working,
    Success,
    Failure,
    InternalError,
    Timeout,
    Cancelled,
    Expired,
    Unknown(String),
}

impl From<&str> for BuildStatus {
    fn from(status: &str) -> Self {
        match status {
            "PENDING" => BuildStatus::Pending,
            "QUEUED" => BuildStatus::Queued,
            "WORKING" => BuildStatus::Working,
            "SUCCESS" => BuildStatus::Success,
            "FAILURE" => BuildStatus::Failure,
            "INTERNAL_ERROR" => BuildStatus::InternalError,
            "TIMEOUT" => BuildStatus::Timeout,
            "CANCELLED" => BuildStatus::Cancelled,
            "EXPIRED" => BuildStatus::Expired,
            other => BuildStatus::Unknown(other.to_string()),
        }
    }
}

impl From<String> for BuildStatus {
    fn from(status: String) -> Self {
        BuildStatus::from(status.as_str())
    }
}

impl BuildStatus {
    /// Finished without success; waiting longer will not change the outcome
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            BuildStatus::Failure
                | BuildStatus::InternalError
                | BuildStatus::Timeout
                | BuildStatus::Cancelled
                | BuildStatus::Expired
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildTrigger {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTriggersResponse {
    #[serde(default)]
    pub triggers: Vec<BuildTrigger>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub id: String,
    pub build_trigger_id: Option<String>,
    pub status: BuildStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBuildsResponse {
    #[serde(default)]
    pub builds: Vec<Build>,
}

/// Long-running operation returned by `triggers/{id}:run`
#[derive(Debug, Default, Deserialize)]
pub struct BuildOperation {
    pub metadata: Option<BuildOperationMetadata>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BuildOperationMetadata {
    pub build: Option<Build>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub name: String,
    pub self_link: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Instance {
    pub id: Option<String>,
    pub name: String,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Disk {
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Instances the disk is attached to; absent when unattached
    pub users: Option<Vec<String>>,
}

impl Disk {
    pub fn is_unattached(&self) -> bool {
        self.users.as_ref().map_or(true, |users| users.is_empty())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeList<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Bucket {
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageObject {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageList<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

/// Airflow experimental API: one DAG run
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DagRun {
    pub dag_id: Option<String>,
    pub state: String,
    pub run_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatestRun {
    pub dag_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LatestRunsResponse {
    #[serde(default)]
    pub items: Vec<LatestRun>,
}
