use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::AutopilotConfig;

/// Milestone notifications. Delivery failures are logged, never returned:
/// a dead webhook must not stop a teardown.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, status: &str);
}

#[derive(Debug, Serialize)]
struct SlackMessage<'a> {
    attachments: [Attachment<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Attachment<'a> {
    color: &'a str,
    title: &'a str,
    fields: [Field<'a>; 2],
    ts: i64,
}

#[derive(Debug, Serialize)]
struct Field<'a> {
    title: &'a str,
    value: &'a str,
}

/// Posts Slack attachments to an incoming webhook
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    http: reqwest::Client,
    webhook_url: Option<String>,
    project: String,
    title: String,
    color: String,
}

impl SlackNotifier {
    pub fn new(config: &AutopilotConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook_url: config.notify.webhook_url.clone().filter(|u| !u.is_empty()),
            project: config.gcp.project_id.clone(),
            title: config.notify.title.clone(),
            color: config.notify.color.clone(),
        }
    }

    fn message<'a>(&'a self, status: &'a str) -> SlackMessage<'a> {
        SlackMessage {
            attachments: [Attachment {
                color: &self.color,
                title: &self.title,
                fields: [
                    Field { title: "Project", value: &self.project },
                    Field { title: "status", value: status },
                ],
                ts: chrono::Utc::now().timestamp(),
            }],
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, status: &str) {
        info!(status, "Milestone");

        let Some(url) = &self.webhook_url else {
            return;
        };

        match self.http.post(url).json(&self.message(status)).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => warn!(status = %response.status(), "Webhook rejected notification"),
            Err(e) => warn!(error = %e, "Failed to deliver notification"),
        }
    }
}
