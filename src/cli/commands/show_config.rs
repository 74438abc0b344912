use anyhow::Result;

use super::Command;
use crate::config::AutopilotConfig;

pub struct ShowConfigCommand {
    config: AutopilotConfig,
}

impl ShowConfigCommand {
    pub fn new(config: AutopilotConfig) -> Self {
        Self { config }
    }
}

impl Command for ShowConfigCommand {
    async fn execute(&self) -> Result<()> {
        let mut shown = self.config.clone();
        if shown.gcp.access_token.is_some() {
            shown.gcp.access_token = Some("<redacted>".to_string());
        }
        print!("{}", shown.to_toml()?);
        Ok(())
    }
}
