//! Airflow experimental API behind IAP, against a mocked webserver

mod common;

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use common::{CloudMock, CLIENT_ID, DAG};
use composer_autopilot::airflow::{discover_client_id, AirflowClient};
use composer_autopilot::gcp::CloudError;
use composer_autopilot::http::StaticTokenProvider;

async fn connect(mock: &CloudMock) -> AirflowClient {
    AirflowClient::connect(
        &mock.airflow_uri(),
        Arc::new(StaticTokenProvider::new("id-token")),
        Duration::from_secs(5),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_client_id_read_from_iap_redirect() {
    let mock = CloudMock::start().await;
    mock.mock_airflow(&[]).await;

    let client = connect(&mock).await;

    assert_eq!(client.client_id(), CLIENT_ID);
}

#[tokio::test]
async fn test_missing_redirect_is_an_error() {
    let mock = CloudMock::start().await;
    Mock::given(method("GET"))
        .and(path("/airflow"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&mock.server)
        .await;

    let http = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let result = discover_client_id(&http, &mock.airflow_uri()).await;

    assert!(matches!(result, Err(CloudError::MissingResource(_))));
}

#[tokio::test]
async fn test_running_dag_detected() {
    let mock = CloudMock::start().await;
    mock.mock_airflow(&[DAG]).await;

    assert!(connect(&mock).await.has_running_dag().await.unwrap());
}

#[tokio::test]
async fn test_monitoring_dag_ignored() {
    let mock = CloudMock::start().await;
    // airflow_monitoring always reports running
    mock.mock_airflow(&[]).await;

    assert!(!connect(&mock).await.has_running_dag().await.unwrap());
}

#[tokio::test]
async fn test_trigger_sends_identity_token_and_empty_conf() {
    let mock = CloudMock::start().await;
    mock.mock_airflow(&[]).await;
    Mock::given(method("POST"))
        .and(path(format!("/airflow/api/experimental/dags/{DAG}/dag_runs")))
        .and(header("authorization", "Bearer id-token"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Created" })))
        .expect(1)
        .mount(&mock.server)
        .await;

    connect(&mock).await.trigger_dag_run(DAG).await.unwrap();
}

#[tokio::test]
async fn test_trigger_error_surfaces_status() {
    let mock = CloudMock::start().await;
    mock.mock_airflow(&[]).await;
    Mock::given(method("POST"))
        .and(path("/airflow/api/experimental/dags/missing/dag_runs"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "Dag id missing not found" })))
        .mount(&mock.server)
        .await;

    let err = connect(&mock).await.trigger_dag_run("missing").await.unwrap_err();

    assert_eq!(err.status(), Some(404));
}
