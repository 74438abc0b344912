//! Create / delete / run-once sequences for one Composer environment.
//!
//! Every step is a predicate polled until it reports done; the runner bounds the whole
//! sequence with a deadline and always cleans up the polling instance afterwards.

pub mod errors;
mod runner;
mod steps;

pub use errors::OperationError;
pub use runner::TIMEOUT_STATUS;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use crate::config::AutopilotConfig;
use crate::gcp::{CloudBuildApi, CloudError, ComposerApi, ComputeApi, StorageApi};
use crate::http::{GcpHttpClient, MetadataTokenProvider, StaticTokenProvider, TokenProvider};
use crate::notify::{Notifier, SlackNotifier};

/// Operation code carried by the trigger message and passed to the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Delete,
    RunOnce,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Delete => "delete",
            Operation::RunOnce => "run_once",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = OperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "create" => Ok(Operation::Create),
            "delete" => Ok(Operation::Delete),
            "run_once" | "run-once" => Ok(Operation::RunOnce),
            other => Err(OperationError::InvalidOperation(other.to_string())),
        }
    }
}

/// API clients shared by the lifecycle steps and the launcher
#[derive(Clone)]
pub struct Services {
    pub composer: ComposerApi,
    pub cloud_build: CloudBuildApi,
    pub compute: ComputeApi,
    pub storage: StorageApi,
    pub tokens: Arc<dyn TokenProvider>,
    pub notifier: Arc<dyn Notifier>,
}

impl Services {
    /// Metadata-server credentials unless a static token is configured; Slack notifications
    pub fn from_config(config: &AutopilotConfig) -> Result<Self, CloudError> {
        let tokens: Arc<dyn TokenProvider> = match &config.gcp.access_token {
            Some(token) if !token.is_empty() => Arc::new(StaticTokenProvider::new(token.clone())),
            _ => Arc::new(MetadataTokenProvider::new(config.gcp.metadata_url.clone())),
        };
        Self::with_parts(config, tokens, Arc::new(SlackNotifier::new(config)))
    }

    pub fn with_parts(
        config: &AutopilotConfig,
        tokens: Arc<dyn TokenProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, CloudError> {
        let http = GcpHttpClient::new(&config.http, Arc::clone(&tokens))?;
        Ok(Self {
            composer: ComposerApi::new(http.clone(), config),
            cloud_build: CloudBuildApi::new(http.clone(), config),
            compute: ComputeApi::new(http.clone(), config),
            storage: StorageApi::new(http, config),
            tokens,
            notifier,
        })
    }
}

/// One environment's lifecycle, driven by configuration
pub struct Lifecycle {
    config: AutopilotConfig,
    services: Services,
    /// Build started by the DAG upload step in this process
    deploy_build: OnceLock<String>,
}

impl Lifecycle {
    pub fn new(config: AutopilotConfig, services: Services) -> Self {
        Self {
            config,
            services,
            deploy_build: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &AutopilotConfig {
        &self.config
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    fn environment_name(&self) -> &str {
        &self.config.gcp.environment_name
    }

    async fn notify(&self, status: &str) {
        self.services.notifier.notify(status).await;
    }
}
