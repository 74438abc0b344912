use anyhow::{bail, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "composer-autopilot.toml";

/// Upper bound for `polling.max_hours` (one week)
pub const MAX_DEADLINE_HOURS: f64 = 168.0;

/// Main configuration structure for Composer Autopilot.
/// Every section falls back to its defaults, so a partial file or a layer that
/// drops empty tables still deserializes.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AutopilotConfig {
    /// Google Cloud project and resource naming
    pub gcp: GcpConfig,
    /// Shape of the Composer environment to create
    pub composer: ComposerConfig,
    /// DAG deployment and run settings
    pub deploy: DeployConfig,
    /// Poll loop and overall deadline
    pub polling: PollingConfig,
    /// Chat webhook notifications
    pub notify: NotifyConfig,
    /// HTTP client behaviour
    pub http: HttpConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GcpConfig {
    pub project_id: String,
    /// Composer region, e.g. asia-northeast1
    pub location: String,
    /// Compute zone for nodes, disks and the polling instance
    pub zone: String,
    pub environment_name: String,
    pub polling_instance_name: String,
    /// Label Composer puts on the buckets and disks it owns
    pub target_label: String,
    /// Worker image; derived from the project when unset
    pub container_image: Option<String>,
    /// Static bearer token, bypasses the metadata server
    pub access_token: Option<String>,
    pub composer_url: String,
    pub cloud_build_url: String,
    pub compute_url: String,
    pub storage_url: String,
    pub metadata_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ComposerConfig {
    pub node_count: u32,
    pub image_version: String,
    pub python_version: String,
    pub machine_type: String,
    pub disk_size_gb: u32,
    /// PyPI packages installed after creation (name -> version spec)
    pub pypi_packages: BTreeMap<String, String>,
    /// Extra Airflow environment variables, on top of PROJECT_ID and WEBHOOK_URL
    pub env_variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Cloud Build trigger that uploads DAGs into the environment bucket
    pub upload_trigger_name: String,
    pub branch_name: String,
    /// DAG started by the run_once operation
    pub dag_name_to_run: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_seconds: u64,
    /// Deadline for a whole operation; fractions allowed
    pub max_hours: f64,
    /// Delete the polling instance once the worker finishes
    pub delete_polling_instance: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
    pub title: String,
    pub color: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    pub request_timeout_seconds: u64,
    /// Retries for transient failures (5xx, 429, connection errors) on idempotent requests
    pub max_retries: u32,
    pub requests_per_second: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// Emit JSON lines (Cloud Logging picks up the fields)
    pub json: bool,
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            location: String::new(),
            zone: String::new(),
            environment_name: String::new(),
            polling_instance_name: "composer-polling".to_string(),
            target_label: "goog-composer-environment".to_string(),
            container_image: None,
            access_token: None,
            composer_url: "https://composer.googleapis.com/v1beta1".to_string(),
            cloud_build_url: "https://cloudbuild.googleapis.com/v1".to_string(),
            compute_url: "https://compute.googleapis.com/compute/v1".to_string(),
            storage_url: "https://storage.googleapis.com/storage/v1".to_string(),
            metadata_url: "http://metadata.google.internal/computeMetadata/v1".to_string(),
        }
    }
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            node_count: 3,
            image_version: "composer-1.8.3-airflow-1.10.2".to_string(),
            python_version: "3".to_string(),
            machine_type: "n1-standard-4".to_string(),
            disk_size_gb: 100,
            pypi_packages: BTreeMap::from([("slackweb".to_string(), "==1.0.5".to_string())]),
            env_variables: BTreeMap::new(),
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            upload_trigger_name: String::new(),
            branch_name: "master".to_string(),
            dag_name_to_run: String::new(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            max_hours: 3.0,
            delete_polling_instance: true,
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            title: "Manipulate composer automatically".to_string(),
            color: "#36a64f".to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 30,
            max_retries: 3,
            requests_per_second: 5,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: true,
        }
    }
}

/// Flat variables set on the deployed function and on the worker container.
/// Each maps onto one nested setting and wins over file values.
const LEGACY_VARIABLES: &[&str] = &[
    "GCP_PROJECT",
    "PROJECT_ID",
    "LOCATION",
    "ZONE",
    "ENVIRONMENT_NAME",
    "UPLOAD_TRIGGER_NAME",
    "DAG_NAME_TO_RUN",
    "BRANCH_NAME",
    "POLLING_INSTANCE_NAME",
    "WEBHOOK_URL",
];

impl AutopilotConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (explicit path, or composer-autopilot.toml if present)
    /// 3. Environment variables (prefixed with COMPOSER_AUTOPILOT__)
    /// 4. Flat deployment variables (PROJECT_ID, ZONE, WEBHOOK_URL, ...)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, None, |key| std::env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with the environment supplied by the caller.
    /// `env` replaces the process environment for the prefixed source when given.
    pub fn load_with<F>(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
        lookup: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path).required(true));
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE));
            }
            None => {}
        }

        builder = builder.add_source(
            Environment::with_prefix("COMPOSER_AUTOPILOT")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let mut config: AutopilotConfig = builder.build()?.try_deserialize()?;
        config.apply_legacy_variables(lookup);
        Ok(config)
    }

    /// Defaults plus the flat deployment variables only. Used by the worker when the
    /// layered load fails, so it can still report and clean up.
    pub fn from_deployment_variables() -> Self {
        let mut config = Self::default();
        config.apply_legacy_variables(|key| std::env::var(key).ok());
        config
    }

    fn apply_legacy_variables<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for name in LEGACY_VARIABLES {
            let Some(value) = lookup(name).filter(|v| !v.is_empty()) else {
                continue;
            };
            match *name {
                "GCP_PROJECT" | "PROJECT_ID" => self.gcp.project_id = value,
                "LOCATION" => self.gcp.location = value,
                "ZONE" => self.gcp.zone = value,
                "ENVIRONMENT_NAME" => self.gcp.environment_name = value,
                "POLLING_INSTANCE_NAME" => self.gcp.polling_instance_name = value,
                "UPLOAD_TRIGGER_NAME" => self.deploy.upload_trigger_name = value,
                "DAG_NAME_TO_RUN" => self.deploy.dag_name_to_run = value,
                "BRANCH_NAME" => self.deploy.branch_name = value,
                "WEBHOOK_URL" => self.notify.webhook_url = Some(value),
                _ => {}
            }
        }
    }

    /// Check the settings every command relies on
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("gcp.project_id", &self.gcp.project_id),
            ("gcp.location", &self.gcp.location),
            ("gcp.zone", &self.gcp.zone),
            ("gcp.environment_name", &self.gcp.environment_name),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(key, _)| *key)
            .collect();
        if !missing.is_empty() {
            bail!("missing required settings: {}", missing.join(", "));
        }
        if self.polling.interval_seconds == 0 {
            bail!("polling.interval_seconds must be greater than zero");
        }
        if !self.polling.max_hours.is_finite() || self.polling.max_hours <= 0.0 {
            bail!("polling.max_hours must be greater than zero");
        }
        if self.polling.max_hours > MAX_DEADLINE_HOURS {
            bail!("polling.max_hours must be at most {MAX_DEADLINE_HOURS}");
        }
        Ok(())
    }

    /// Image the polling instance runs
    pub fn container_image(&self) -> String {
        self.gcp
            .container_image
            .clone()
            .unwrap_or_else(|| format!("asia.gcr.io/{}/manipulate-composer", self.gcp.project_id))
    }

    /// Render the effective configuration
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load .env file if it exists. Returns whether one was loaded; runs before
    /// logging is set up, so the caller reports it.
    pub fn load_env_file() -> Result<bool> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            return Ok(true);
        }
        Ok(false)
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// Whole-operation deadline. Out-of-range values (rejected by `validate`) saturate
    /// to the longest allowed deadline instead of panicking.
    pub fn max_duration(&self) -> Duration {
        let longest = Duration::from_secs_f64(MAX_DEADLINE_HOURS * 60.0 * 60.0);
        Duration::try_from_secs_f64(self.max_hours * 60.0 * 60.0)
            .map_or(longest, |limit| limit.min(longest))
    }
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}
