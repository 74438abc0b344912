use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::lifecycle::Operation;

pub mod commands;

#[derive(Parser)]
#[command(name = "composer-autopilot")]
#[command(about = "Create, run once and tear down Cloud Composer environments")]
#[command(long_about = "Composer Autopilot drives a Cloud Composer environment through create, \
                       run-once and delete sequences, polling Google Cloud until each step lands and \
                       reporting milestones to a Slack webhook. A Pub/Sub message starts a short-lived \
                       polling instance that runs the worker.")]
pub struct Cli {
    /// Configuration file (defaults to ./composer-autopilot.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an operation to completion (entry point of the polling instance)
    Worker {
        /// create, delete or run_once
        #[arg(value_parser = parse_operation)]
        operation: Operation,
        /// Leave the polling instance running afterwards
        #[arg(long, help = "Do not delete the polling instance when finished")]
        keep_instance: bool,
    },
    /// Launch a polling instance for an operation, as the Pub/Sub trigger does
    Dispatch {
        /// create, delete or run_once
        #[arg(value_parser = parse_operation, required_unless_present = "message", conflicts_with = "message")]
        operation: Option<Operation>,
        /// Base64 message data, exactly as published to the topic
        #[arg(long, help = "Decode the operation from base64 Pub/Sub message data")]
        message: Option<String>,
    },
    /// Serve the Pub/Sub push endpoint
    Serve {
        /// Listen address; PORT is honoured when not given
        #[arg(long, help = "Address to bind, e.g. 0.0.0.0:8080")]
        addr: Option<SocketAddr>,
    },
    /// Show whether the environment exists and its current state
    Status,
    /// Print the effective configuration as TOML
    ShowConfig,
}

fn parse_operation(value: &str) -> Result<Operation, String> {
    value.parse::<Operation>().map_err(|e| e.to_string())
}
