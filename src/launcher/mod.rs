//! Message-triggered side: decode the operation from a Pub/Sub message and start a
//! short-lived polling instance that runs the worker outside the trigger's time limits.

pub mod instance;
pub mod message;
pub mod server;

pub use instance::{polling_instance_body, ContainerDeclaration};
pub use message::{decode_operation, MessageError, PubSubPushEnvelope};

use tracing::info;

use crate::config::AutopilotConfig;
use crate::gcp::{CloudError, ComputeApi};
use crate::lifecycle::Operation;
use instance::{COS_IMAGE_FAMILY, COS_IMAGE_PROJECT};

#[derive(Debug, Clone)]
pub struct Launcher {
    config: AutopilotConfig,
    compute: ComputeApi,
}

impl Launcher {
    pub fn new(config: AutopilotConfig, compute: ComputeApi) -> Self {
        Self { config, compute }
    }

    /// Insert the polling instance that will run `worker <operation>`
    pub async fn launch(&self, operation: Operation) -> Result<(), LaunchError> {
        let image = self
            .compute
            .image_from_family(COS_IMAGE_PROJECT, COS_IMAGE_FAMILY)
            .await?;
        let body = polling_instance_body(&self.config, &image, operation)?;

        self.compute.insert_instance(&body).await?;
        info!(
            operation = %operation,
            instance = %self.config.gcp.polling_instance_name,
            image = %image.name,
            "Polling instance launched"
        );
        Ok(())
    }

    /// Decode a base64 message payload and launch for it
    pub async fn launch_from_data(&self, data: &str) -> Result<Operation, LaunchError> {
        let operation = decode_operation(data)?;
        self.launch(operation).await?;
        Ok(operation)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error("container declaration: {0}")]
    Declaration(#[from] serde_yaml::Error),
}
