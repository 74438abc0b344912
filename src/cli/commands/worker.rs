use anyhow::{anyhow, Result};

use super::Command;
use crate::config::AutopilotConfig;
use crate::lifecycle::{Lifecycle, Operation, Services};

pub struct WorkerCommand {
    config: AutopilotConfig,
    operation: Operation,
    load_error: Option<String>,
}

impl WorkerCommand {
    pub fn new(mut config: AutopilotConfig, operation: Operation, keep_instance: bool) -> Self {
        if keep_instance {
            config.polling.delete_polling_instance = false;
        }
        Self {
            config,
            operation,
            load_error: None,
        }
    }

    /// Worker whose configuration failed to load; `fallback` carries whatever the
    /// deployment variables still provide
    pub fn with_load_error(
        fallback: AutopilotConfig,
        operation: Operation,
        keep_instance: bool,
        error: &anyhow::Error,
    ) -> Self {
        let mut command = Self::new(fallback, operation, keep_instance);
        command.load_error = Some(format!("configuration could not be loaded: {error:#}"));
        command
    }
}

impl Command for WorkerCommand {
    async fn execute(&self) -> Result<()> {
        let startup = match &self.load_error {
            Some(reason) => Err(anyhow!(reason.clone())),
            None => self.config.validate(),
        };

        let services = Services::from_config(&self.config)?;
        let lifecycle = Lifecycle::new(self.config.clone(), services);

        // The polling instance runs with restartPolicy Never; it must not outlive a
        // worker that never got going
        if let Err(e) = startup {
            lifecycle.abandon_worker(&format!("{e:#}")).await;
            return Err(e);
        }

        lifecycle.run_worker(self.operation).await?;
        Ok(())
    }
}
