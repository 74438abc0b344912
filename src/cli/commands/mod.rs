use anyhow::Result;

use crate::config::AutopilotConfig;
use crate::lifecycle::{Lifecycle, Services};

pub mod dispatch;
pub mod serve;
pub mod show_config;
pub mod status;
pub mod worker;

#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(&self) -> Result<()>;
}

/// Validate configuration and wire up the API clients
pub fn build_lifecycle(config: AutopilotConfig) -> Result<Lifecycle> {
    config.validate()?;
    let services = Services::from_config(&config)?;
    Ok(Lifecycle::new(config, services))
}

pub async fn show_usage() -> Result<()> {
    println!("🎼 Composer Autopilot - Cloud Composer lifecycle automation");
    println!();
    println!("Commands:");
    println!("  🚀 composer-autopilot dispatch run_once   # Launch a polling instance");
    println!("  🛠️  composer-autopilot worker create       # Run a sequence here");
    println!("  📡 composer-autopilot serve                # Pub/Sub push endpoint");
    println!("  📊 composer-autopilot status               # Environment state");
    println!("  ⚙️  composer-autopilot show-config          # Effective settings");
    println!();
    println!("Settings come from composer-autopilot.toml, COMPOSER_AUTOPILOT__* variables,");
    println!("and the flat PROJECT_ID / LOCATION / ZONE / ENVIRONMENT_NAME variables.");
    Ok(())
}
