use tracing::{error, info, warn, Instrument};

use super::{Lifecycle, Operation, OperationError};
use crate::observability::{api_metrics, OperationTimer};
use crate::polling::{wait_for_state, with_deadline};
use crate::telemetry::{create_operation_span, generate_correlation_id};

pub const TIMEOUT_STATUS: &str = "one time composer operation timeout!";

impl Lifecycle {
    /// Worker entry point: run the sequence under the deadline, report failures,
    /// then remove the polling instance whatever the outcome
    pub async fn run_worker(&self, operation: Operation) -> Result<(), OperationError> {
        let correlation_id = generate_correlation_id();
        let span = create_operation_span(operation.as_str(), self.environment_name(), &correlation_id);

        async {
            info!("Starting operation");
            let limit = self.config.polling.max_duration();
            let outcome = with_deadline(limit, self.run(operation)).await;

            match &outcome {
                Ok(()) => info!("Operation finished"),
                Err(e) if e.is_timeout() => {
                    error!(error = %e, "Operation timed out");
                    self.notify(TIMEOUT_STATUS).await;
                }
                Err(e) => {
                    error!(error = %e, "Operation failed");
                    self.notify(&e.to_string()).await;
                }
            }

            self.cleanup_polling_instance().await;
            api_metrics().log_stats();
            outcome
        }
        .instrument(span)
        .await
    }

    /// Worker entry point for a run that cannot start (bad configuration): report the
    /// reason, then remove the polling instance when its project and zone are known
    pub async fn abandon_worker(&self, reason: &str) {
        error!(reason, "Operation could not start");
        self.notify(reason).await;

        let gcp = &self.config.gcp;
        if gcp.project_id.trim().is_empty() || gcp.zone.trim().is_empty() {
            warn!("Project or zone unknown, polling instance left in place");
            return;
        }
        self.cleanup_polling_instance().await;
    }

    /// Run one sequence without deadline or cleanup
    pub async fn run(&self, operation: Operation) -> Result<(), OperationError> {
        match operation {
            Operation::Create => self.create().await,
            Operation::Delete => self.teardown().await,
            Operation::RunOnce => self.run_once().await,
        }
    }

    /// Create the environment, install PyPI packages, upload DAGs
    pub async fn create(&self) -> Result<(), OperationError> {
        self.require(&self.config.deploy.upload_trigger_name, "deploy.upload_trigger_name")?;
        if self.exists().await? {
            return Err(OperationError::AlreadyExists(self.environment_name().to_string()));
        }
        let interval = self.config.polling.interval();

        let timer = OperationTimer::new("create composer");
        self.create_environment().await?;
        timer.finish();
        self.notify("create composer").await;

        let timer = OperationTimer::new("update composer PyPI");
        wait_for_state(interval, || self.update_pypi()).await?;
        timer.finish();
        self.notify("update composer PyPI").await;

        let timer = OperationTimer::new("upload dags");
        wait_for_state(interval, || self.upload_dags()).await?;
        timer.finish();
        self.notify("upload dags").await;
        Ok(())
    }

    /// Delete the environment once idle, then its leftover disks
    pub async fn teardown(&self) -> Result<(), OperationError> {
        if !self.exists().await? {
            return Err(OperationError::NotFound(self.environment_name().to_string()));
        }
        let interval = self.config.polling.interval();

        let timer = OperationTimer::new("delete composer");
        wait_for_state(interval, || self.delete_when_idle()).await?;
        timer.finish();
        self.notify("delete composer").await;

        let timer = OperationTimer::new("delete Composer disk not in use");
        wait_for_state(interval, || self.delete_leftover_disks()).await?;
        timer.finish();
        self.notify("delete Composer disk not in use").await;
        Ok(())
    }

    /// Create, run the configured DAG once, delete
    pub async fn run_once(&self) -> Result<(), OperationError> {
        let dag = self.config.deploy.dag_name_to_run.as_str();
        self.require(dag, "deploy.dag_name_to_run")?;

        self.create().await?;

        let timer = OperationTimer::new("run dag");
        wait_for_state(self.config.polling.interval(), || self.run_dag(dag)).await?;
        timer.finish();
        self.notify("run dag").await;

        self.teardown().await
    }

    async fn cleanup_polling_instance(&self) {
        if !self.config.polling.delete_polling_instance {
            return;
        }
        let name = &self.config.gcp.polling_instance_name;
        match self.services.compute.delete_instance_if_present(name).await {
            Ok(true) => self.notify("delete polling instance").await,
            Ok(false) => {}
            Err(e) => warn!(instance = %name, error = %e, "Failed to delete polling instance"),
        }
    }

    fn require(&self, value: &str, key: &str) -> Result<(), OperationError> {
        if value.trim().is_empty() {
            return Err(OperationError::Config(format!("{key} is not set")));
        }
        Ok(())
    }
}
