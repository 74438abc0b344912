//! Command structs driven end to end against mocked Google Cloud APIs

mod common;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use common::CloudMock;
use composer_autopilot::cli::commands::{
    dispatch::DispatchCommand, status::StatusCommand, worker::WorkerCommand, Command,
};
use composer_autopilot::config::AutopilotConfig;
use composer_autopilot::lifecycle::Operation;

/// Configuration a command builds its own services from: static token, webhook on the mock
fn command_config(mock: &CloudMock) -> AutopilotConfig {
    let mut config = mock.config.clone();
    config.gcp.access_token = Some("test-token".into());
    config.notify.webhook_url = Some(format!("{}/webhook", mock.server.uri()));
    config
}

async fn mock_webhook(mock: &CloudMock, status: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .and(body_partial_json(json!({
            "attachments": [{ "fields": [{ "title": "Project" }, { "value": status }] }]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(expected_calls)
        .mount(&mock.server)
        .await;
}

#[tokio::test]
async fn test_status_reports_running_environment() {
    let mock = CloudMock::start().await;
    mock.mock_environment_listing(0, None).await;
    mock.mock_environment_states(vec![mock.environment_json("RUNNING", true)]).await;

    StatusCommand::new(command_config(&mock)).execute().await.unwrap();
}

#[tokio::test]
async fn test_status_of_missing_environment_succeeds() {
    let mock = CloudMock::start().await;
    mock.mock_no_environments().await;

    StatusCommand::new(command_config(&mock)).execute().await.unwrap();
}

#[tokio::test]
async fn test_status_rejects_incomplete_configuration() {
    let mock = CloudMock::start().await;
    let mut config = command_config(&mock);
    config.gcp.location = String::new();

    let err = StatusCommand::new(config).execute().await.unwrap_err();

    assert!(err.to_string().contains("gcp.location"));
}

#[tokio::test]
async fn test_dispatch_launches_named_operation() {
    let mock = CloudMock::start().await;
    mock.mock_cos_image().await;
    mock.mock_insert_polling_instance(200, 1).await;

    DispatchCommand::new(command_config(&mock), Some(Operation::Create), None)
        .execute()
        .await
        .unwrap();
}

#[tokio::test]
async fn test_dispatch_decodes_message_data() {
    let mock = CloudMock::start().await;
    mock.mock_cos_image().await;
    mock.mock_insert_polling_instance(200, 1).await;

    DispatchCommand::new(command_config(&mock), None, Some(STANDARD.encode("run_once")))
        .execute()
        .await
        .unwrap();
}

#[tokio::test]
async fn test_dispatch_rejects_bad_message_without_launching() {
    let mock = CloudMock::start().await;
    mock.mock_insert_polling_instance(200, 0).await;

    let result = DispatchCommand::new(command_config(&mock), None, Some(STANDARD.encode("restart")))
        .execute()
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_worker_with_invalid_configuration_cleans_up() {
    let mock = CloudMock::start().await;
    let mut config = command_config(&mock);
    config.gcp.environment_name = String::new();
    mock_webhook(&mock, "missing required settings: gcp.environment_name", 1).await;
    mock_webhook(&mock, "delete polling instance", 1).await;
    mock.mock_polling_instance(true, 1).await;
    mock.mock_create_environment(0).await;

    let err = WorkerCommand::new(config, Operation::Create, false)
        .execute()
        .await
        .unwrap_err();

    assert!(err.to_string().contains("gcp.environment_name"));
}

#[tokio::test]
async fn test_worker_with_unloadable_configuration_cleans_up() {
    let mock = CloudMock::start().await;
    let load_error = anyhow::anyhow!("invalid type: string \"soon\", expected f64");
    mock_webhook(
        &mock,
        "configuration could not be loaded: invalid type: string \"soon\", expected f64",
        1,
    )
    .await;
    mock_webhook(&mock, "delete polling instance", 1).await;
    mock.mock_polling_instance(true, 1).await;
    mock.mock_create_environment(0).await;

    let err = WorkerCommand::with_load_error(command_config(&mock), Operation::Create, false, &load_error)
        .execute()
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("configuration could not be loaded"));
}

#[tokio::test]
async fn test_worker_keep_instance_skips_cleanup_on_failure() {
    let mock = CloudMock::start().await;
    let mut config = command_config(&mock);
    config.gcp.environment_name = String::new();
    mock.mock_polling_instance(true, 0).await;

    let result = WorkerCommand::new(config, Operation::Delete, true).execute().await;

    assert!(result.is_err());
}
