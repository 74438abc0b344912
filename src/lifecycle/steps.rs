// Step predicates. Each returns Ok(true) once its work is done and Ok(false)
// while the environment is not ready for it yet.

use tracing::{debug, info};

use super::{Lifecycle, OperationError};
use crate::airflow::AirflowClient;
use crate::gcp::composer::{environment_body, pypi_body};
use crate::gcp::types::{BuildStatus, Environment};
use crate::polling::wait_for_state;

impl Lifecycle {
    pub async fn exists(&self) -> Result<bool, OperationError> {
        Ok(self
            .services
            .composer
            .environment_exists(self.environment_name())
            .await?)
    }

    pub async fn environment(&self) -> Result<Environment, OperationError> {
        Ok(self
            .services
            .composer
            .get_environment(self.environment_name())
            .await?)
    }

    /// Request creation unless already listed, then wait until the environment is listed
    pub async fn create_environment(&self) -> Result<(), OperationError> {
        if !self.exists().await? {
            self.services
                .composer
                .create_environment(&environment_body(&self.config))
                .await?;
        }
        wait_for_state(self.config.polling.interval(), || self.exists()).await
    }

    /// Install PyPI packages once the environment is RUNNING
    pub async fn update_pypi(&self) -> Result<bool, OperationError> {
        let environment = self.environment().await?;
        if !environment.is_running() {
            debug!(state = ?environment.state, "Waiting for RUNNING before PyPI update");
            return Ok(false);
        }
        self.services
            .composer
            .update_pypi_packages(self.environment_name(), &pypi_body(&self.config))
            .await?;
        Ok(true)
    }

    /// Run the DAG upload trigger once the PyPI update has landed
    pub async fn upload_dags(&self) -> Result<bool, OperationError> {
        let environment = self.environment().await?;
        if !(environment.is_running() && environment.has_pypi_packages()) {
            debug!(state = ?environment.state, "Waiting for PyPI update before DAG upload");
            return Ok(false);
        }

        let trigger_id = self.upload_trigger_id().await?;
        let build = self
            .services
            .cloud_build
            .run_trigger(&trigger_id, &self.config.deploy.branch_name)
            .await?;
        if let Some(build_id) = build {
            info!(build_id = %build_id, "DAG upload build started");
            let _ = self.deploy_build.set(build_id);
        }
        Ok(true)
    }

    /// Start `dag_id` once the DAG upload build has succeeded
    pub async fn run_dag(&self, dag_id: &str) -> Result<bool, OperationError> {
        match self.deploy_status().await? {
            Some((_, BuildStatus::Success)) => {}
            Some((build, status)) if status.is_failed() => {
                return Err(OperationError::DeployFailed { build, status });
            }
            other => {
                debug!(status = ?other, "Waiting for DAG upload build");
                return Ok(false);
            }
        }

        let environment = self.environment().await?;
        let airflow = self.airflow(&environment).await?;
        airflow.trigger_dag_run(dag_id).await?;
        Ok(true)
    }

    /// Delete the environment and its bucket once no DAG is running
    pub async fn delete_when_idle(&self) -> Result<bool, OperationError> {
        let environment = self.environment().await?;
        if environment.airflow_uri().is_some() {
            let airflow = self.airflow(&environment).await?;
            if airflow.has_running_dag().await? {
                info!("DAG runs still in progress, postponing delete");
                return Ok(false);
            }
        }

        self.services
            .composer
            .delete_environment(self.environment_name())
            .await?;
        let buckets = self
            .services
            .storage
            .purge_labelled_buckets(&self.config.gcp.target_label, self.environment_name())
            .await?;
        debug!(?buckets, "Purged environment buckets");
        Ok(true)
    }

    /// Delete the environment's unattached disks once the environment is gone
    pub async fn delete_leftover_disks(&self) -> Result<bool, OperationError> {
        if self.exists().await? {
            debug!("Environment still listed, disks are not released yet");
            return Ok(false);
        }

        let label = &self.config.gcp.target_label;
        let leftovers: Vec<String> = self
            .services
            .compute
            .list_disks()
            .await?
            .into_iter()
            .filter(|d| d.labels.get(label).map(String::as_str) == Some(self.environment_name()))
            .filter(|d| d.is_unattached())
            .map(|d| d.name)
            .collect();

        for disk in &leftovers {
            self.services.compute.delete_disk(disk).await?;
        }
        Ok(true)
    }

    async fn upload_trigger_id(&self) -> Result<String, OperationError> {
        let name = &self.config.deploy.upload_trigger_name;
        self.services
            .cloud_build
            .find_trigger(name)
            .await?
            .ok_or_else(|| OperationError::TriggerNotFound(name.clone()))
    }

    /// Status of the DAG upload build: the one this process started, or else the
    /// newest build of the upload trigger
    async fn deploy_status(&self) -> Result<Option<(String, BuildStatus)>, OperationError> {
        if let Some(build_id) = self.deploy_build.get() {
            let build = self.services.cloud_build.get_build(build_id).await?;
            return Ok(Some((build.id, build.status)));
        }

        let trigger_id = self.upload_trigger_id().await?;
        let status = self
            .services
            .cloud_build
            .latest_build_status(&trigger_id)
            .await?;
        Ok(status.map(|s| (format!("latest of trigger {trigger_id}"), s)))
    }

    async fn airflow(&self, environment: &Environment) -> Result<AirflowClient, OperationError> {
        let uri = environment
            .airflow_uri()
            .ok_or_else(|| OperationError::NoAirflowUri(self.environment_name().to_string()))?;
        Ok(AirflowClient::connect(
            uri,
            self.services.tokens.clone(),
            self.config.http.request_timeout(),
        )
        .await?)
    }
}
