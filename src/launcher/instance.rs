// Polling instance definition: a Container-Optimized OS VM whose
// gce-container-declaration runs the worker once with the operation as argument.

use serde::Serialize;
use serde_json::{json, Value};

use crate::config::AutopilotConfig;
use crate::gcp::types::Image;
use crate::lifecycle::Operation;

pub const COS_IMAGE_PROJECT: &str = "cos-cloud";
pub const COS_IMAGE_FAMILY: &str = "cos-stable";
const MACHINE_TYPE: &str = "f1-micro";
const CONTAINER_NAME: &str = "test";

#[derive(Debug, Serialize)]
pub struct ContainerDeclaration {
    pub spec: PodSpec,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    pub containers: Vec<Container>,
    pub restart_policy: String,
}

#[derive(Debug, Serialize)]
pub struct Container {
    pub name: String,
    pub args: Vec<String>,
    pub image: String,
    pub env: Vec<EnvVar>,
    pub stdin: bool,
    pub tty: bool,
}

#[derive(Debug, Serialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl ContainerDeclaration {
    /// Worker container for `operation`, carrying the settings the worker reads back
    pub fn for_operation(config: &AutopilotConfig, operation: Operation) -> Self {
        let webhook = config.notify.webhook_url.clone().unwrap_or_default();
        let env = [
            ("PROJECT_ID", config.gcp.project_id.as_str()),
            ("LOCATION", config.gcp.location.as_str()),
            ("ZONE", config.gcp.zone.as_str()),
            ("ENVIRONMENT_NAME", config.gcp.environment_name.as_str()),
            ("UPLOAD_TRIGGER_NAME", config.deploy.upload_trigger_name.as_str()),
            ("DAG_NAME_TO_RUN", config.deploy.dag_name_to_run.as_str()),
            ("BRANCH_NAME", config.deploy.branch_name.as_str()),
            ("WEBHOOK_URL", webhook.as_str()),
            ("POLLING_INSTANCE_NAME", config.gcp.polling_instance_name.as_str()),
        ]
        .into_iter()
        .map(|(name, value)| EnvVar {
            name: name.to_string(),
            value: value.to_string(),
        })
        .collect();

        Self {
            spec: PodSpec {
                containers: vec![Container {
                    name: CONTAINER_NAME.to_string(),
                    args: vec!["worker".to_string(), operation.as_str().to_string()],
                    image: config.container_image(),
                    env,
                    stdin: false,
                    tty: false,
                }],
                restart_policy: "Never".to_string(),
            },
        }
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// `instances.insert` body for the polling instance
pub fn polling_instance_body(
    config: &AutopilotConfig,
    image: &Image,
    operation: Operation,
) -> Result<Value, serde_yaml::Error> {
    let declaration = ContainerDeclaration::for_operation(config, operation).to_yaml()?;

    Ok(json!({
        "name": config.gcp.polling_instance_name,
        "machineType": format!("zones/{}/machineTypes/{}", config.gcp.zone, MACHINE_TYPE),
        "disks": [{
            "boot": true,
            "autoDelete": true,
            "initializeParams": { "sourceImage": image.self_link }
        }],
        "networkInterfaces": [{
            "network": "global/networks/default",
            "accessConfigs": [{ "type": "ONE_TO_ONE_NAT", "name": "External NAT" }]
        }],
        "canIpForward": false,
        "displayDevice": { "enableDisplay": false },
        "labels": { "container-vm": image.name },
        "serviceAccounts": [{
            "email": "default",
            "scopes": ["https://www.googleapis.com/auth/cloud-platform"]
        }],
        "metadata": {
            "items": [
                { "key": "gce-container-declaration", "value": declaration },
                { "key": "google-logging-enabled", "value": "true" }
            ]
        }
    }))
}
