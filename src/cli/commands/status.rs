use anyhow::Result;

use super::{build_lifecycle, Command};
use crate::config::AutopilotConfig;

pub struct StatusCommand {
    config: AutopilotConfig,
}

impl StatusCommand {
    pub fn new(config: AutopilotConfig) -> Self {
        Self { config }
    }
}

impl Command for StatusCommand {
    async fn execute(&self) -> Result<()> {
        let lifecycle = build_lifecycle(self.config.clone())?;
        let composer = &lifecycle.services().composer;
        let name = &self.config.gcp.environment_name;

        println!("🎼 COMPOSER ENVIRONMENT STATUS");
        println!("==============================");
        println!("   📋 Project:     {}", self.config.gcp.project_id);
        println!("   📍 Location:    {}", self.config.gcp.location);
        println!("   🏷️  Environment: {}", composer.resource_name(name));
        println!();

        if !lifecycle.exists().await? {
            println!("⚪ Not found");
            return Ok(());
        }

        let environment = lifecycle.environment().await?;
        let state = environment
            .state
            .as_ref()
            .map(|s| format!("{s:?}"))
            .unwrap_or_else(|| "unknown".to_string());
        if environment.is_running() {
            println!("🟢 State: {state}");
        } else {
            println!("🟡 State: {state}");
        }
        if let Some(uri) = environment.airflow_uri() {
            println!("   🌐 Airflow: {uri}");
        }
        println!(
            "   📦 PyPI packages installed: {}",
            if environment.has_pypi_packages() { "yes" } else { "no" }
        );
        Ok(())
    }
}
