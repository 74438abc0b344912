use anyhow::Result;
use clap::Parser;

use composer_autopilot::cli::commands::{
    dispatch::DispatchCommand, serve::ServeCommand, show_config::ShowConfigCommand, show_usage,
    status::StatusCommand, worker::WorkerCommand, Command,
};
use composer_autopilot::cli::{Cli, Commands};
use composer_autopilot::config::AutopilotConfig;
use composer_autopilot::telemetry::init_telemetry;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return tokio::runtime::Runtime::new()?.block_on(show_usage());
    };

    let env_loaded = AutopilotConfig::load_env_file()?;
    let loaded = AutopilotConfig::load(cli.config.as_deref());

    // A worker still reports and removes its polling instance when the layered
    // configuration is unusable
    let (config, load_error) = match (loaded, &command) {
        (Ok(config), _) => (config, None),
        (Err(e), Commands::Worker { .. }) => (AutopilotConfig::from_deployment_variables(), Some(e)),
        (Err(e), _) => return Err(e),
    };
    init_telemetry(&config.observability)?;
    if env_loaded {
        tracing::info!("Loaded environment variables from .env file");
    }

    tokio::runtime::Runtime::new()?.block_on(async {
        match command {
            Commands::Worker { operation, keep_instance } => match load_error {
                Some(e) => {
                    WorkerCommand::with_load_error(config, operation, keep_instance, &e)
                        .execute()
                        .await
                }
                None => WorkerCommand::new(config, operation, keep_instance).execute().await,
            },
            Commands::Dispatch { operation, message } => {
                DispatchCommand::new(config, operation, message).execute().await
            }
            Commands::Serve { addr } => ServeCommand::new(config, addr).execute().await,
            Commands::Status => StatusCommand::new(config).execute().await,
            Commands::ShowConfig => ShowConfigCommand::new(config).execute().await,
        }
    })
}
