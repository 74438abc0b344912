use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;

use super::{build_lifecycle, Command};
use crate::config::AutopilotConfig;
use crate::launcher::{server, Launcher};

pub struct ServeCommand {
    config: AutopilotConfig,
    addr: Option<SocketAddr>,
}

impl ServeCommand {
    pub fn new(config: AutopilotConfig, addr: Option<SocketAddr>) -> Self {
        Self { config, addr }
    }

    fn listen_addr(&self) -> Result<SocketAddr> {
        if let Some(addr) = self.addr {
            return Ok(addr);
        }
        let port: u16 = match std::env::var("PORT") {
            Ok(port) => port.parse().context("PORT is not a valid port number")?,
            Err(_) => 8080,
        };
        Ok(SocketAddr::from(([0, 0, 0, 0], port)))
    }
}

impl Command for ServeCommand {
    async fn execute(&self) -> Result<()> {
        let addr = self.listen_addr()?;
        let lifecycle = build_lifecycle(self.config.clone())?;
        let launcher = Arc::new(Launcher::new(
            self.config.clone(),
            lifecycle.services().compute.clone(),
        ));
        server::serve(launcher, addr).await?;
        Ok(())
    }
}
