use std::time::Duration;
use thiserror::Error;

use crate::gcp::errors::CloudError;
use crate::gcp::types::BuildStatus;

/// Why a lifecycle operation stopped
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("Composer environment '{0}' already exists!")]
    AlreadyExists(String),

    #[error("Composer environment '{0}' does not exist!")]
    NotFound(String),

    #[error("Cloud Build trigger '{0}' not found")]
    TriggerNotFound(String),

    #[error("DAG upload build {build} finished with status {status:?}")]
    DeployFailed { build: String, status: BuildStatus },

    #[error("Composer environment '{0}' has no Airflow web server URI")]
    NoAirflowUri(String),

    #[error("one time composer operation timed out after {limit:?}")]
    Timeout { limit: Duration },

    #[error("unknown operation '{0}' (expected create, delete or run_once)")]
    InvalidOperation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Cloud(#[from] CloudError),
}

impl OperationError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, OperationError::Timeout { .. })
    }
}
