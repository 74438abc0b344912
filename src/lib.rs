// Composer Autopilot Library - Cloud Composer lifecycle automation
// This exposes the core components for testing and integration

pub mod airflow;
pub mod cli;
pub mod config;
pub mod gcp;
pub mod http;
pub mod launcher;
pub mod lifecycle;
pub mod notify;
pub mod observability;
pub mod polling;
pub mod telemetry;

// Re-export key types for easy access
pub use airflow::AirflowClient;
pub use config::AutopilotConfig;
pub use gcp::{CloudBuildApi, CloudError, ComposerApi, ComputeApi, StorageApi};
pub use http::{GcpHttpClient, MetadataTokenProvider, StaticTokenProvider, TokenProvider};
pub use launcher::{LaunchError, Launcher};
pub use lifecycle::{Lifecycle, Operation, OperationError, Services};
pub use notify::{Notifier, SlackNotifier};
pub use observability::{api_metrics, OperationTimer};
pub use telemetry::{create_operation_span, generate_correlation_id, init_telemetry};
