use anyhow::Result;

use super::{build_lifecycle, Command};
use crate::config::AutopilotConfig;
use crate::launcher::{decode_operation, Launcher};
use crate::lifecycle::Operation;

pub struct DispatchCommand {
    config: AutopilotConfig,
    operation: Option<Operation>,
    message: Option<String>,
}

impl DispatchCommand {
    pub fn new(config: AutopilotConfig, operation: Option<Operation>, message: Option<String>) -> Self {
        Self { config, operation, message }
    }

    fn resolve_operation(&self) -> Result<Operation> {
        match (self.operation, &self.message) {
            (Some(operation), _) => Ok(operation),
            (None, Some(data)) => Ok(decode_operation(data)?),
            (None, None) => anyhow::bail!("an operation or --message is required"),
        }
    }
}

impl Command for DispatchCommand {
    async fn execute(&self) -> Result<()> {
        let operation = self.resolve_operation()?;
        let lifecycle = build_lifecycle(self.config.clone())?;
        let launcher = Launcher::new(self.config.clone(), lifecycle.services().compute.clone());

        launcher.launch(operation).await?;
        println!(
            "✅ Polling instance {} launched for '{}'",
            self.config.gcp.polling_instance_name, operation
        );
        Ok(())
    }
}
