//! Google Cloud mock infrastructure for integration tests
//!
//! One wiremock server stands in for Composer, Cloud Build, Compute Engine, Cloud
//! Storage, the Airflow webserver and the Slack webhook, each under its own path prefix.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use composer_autopilot::config::AutopilotConfig;
use composer_autopilot::http::StaticTokenProvider;
use composer_autopilot::lifecycle::{Lifecycle, Services};
use composer_autopilot::notify::Notifier;

pub const PROJECT: &str = "proj";
pub const LOCATION: &str = "asia-northeast1";
pub const ZONE: &str = "asia-northeast1-a";
pub const ENVIRONMENT: &str = "nightly";
pub const TRIGGER_NAME: &str = "upload-dags";
pub const TRIGGER_ID: &str = "trigger-1";
pub const DAG: &str = "sample_dag";
pub const CLIENT_ID: &str = "iap-client.apps.googleusercontent.com";

/// Collects milestone statuses instead of posting them
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    statuses: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, status: &str) {
        self.statuses.lock().unwrap().push(status.to_string());
    }
}

pub struct CloudMock {
    pub server: MockServer,
    pub config: AutopilotConfig,
    pub notifier: Arc<RecordingNotifier>,
}

impl CloudMock {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let uri = server.uri();

        let mut config = AutopilotConfig::default();
        config.gcp.project_id = PROJECT.into();
        config.gcp.location = LOCATION.into();
        config.gcp.zone = ZONE.into();
        config.gcp.environment_name = ENVIRONMENT.into();
        config.gcp.composer_url = format!("{uri}/composer/v1beta1");
        config.gcp.cloud_build_url = format!("{uri}/cloudbuild/v1");
        config.gcp.compute_url = format!("{uri}/compute/v1");
        config.gcp.storage_url = format!("{uri}/storage/v1");
        config.gcp.metadata_url = format!("{uri}/metadata");
        config.deploy.upload_trigger_name = TRIGGER_NAME.into();
        config.deploy.dag_name_to_run = DAG.into();
        config.polling.interval_seconds = 1;
        config.polling.max_hours = 1.0;
        config.http.max_retries = 0;
        config.http.requests_per_second = 1000;
        config.http.request_timeout_seconds = 5;

        Self {
            server,
            config,
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        let services = Services::with_parts(
            &self.config,
            Arc::new(StaticTokenProvider::new("test-token")),
            self.notifier.clone(),
        )
        .unwrap();
        Lifecycle::new(self.config.clone(), services)
    }

    pub fn airflow_uri(&self) -> String {
        format!("{}/airflow", self.server.uri())
    }

    fn environments_path() -> String {
        format!("/composer/v1beta1/projects/{PROJECT}/locations/{LOCATION}/environments")
    }

    fn environment_path() -> String {
        format!("{}/{ENVIRONMENT}", Self::environments_path())
    }

    fn zonal_path(tail: &str) -> String {
        format!("/compute/v1/projects/{PROJECT}/zones/{ZONE}/{tail}")
    }

    /// Environment resource in `state`, optionally with PyPI packages applied
    pub fn environment_json(&self, state: &str, with_pypi: bool) -> Value {
        let mut software = json!({ "imageVersion": "composer-1.8.3-airflow-1.10.2" });
        if with_pypi {
            software["pypiPackages"] = json!({ "slackweb": "==1.0.5" });
        }
        json!({
            "name": format!("projects/{PROJECT}/locations/{LOCATION}/environments/{ENVIRONMENT}"),
            "state": state,
            "config": {
                "airflowUri": self.airflow_uri(),
                "softwareConfig": software
            }
        })
    }

    /// Environment list: empty for the first `absent_for` calls, then `listed` for
    /// `listed_for` calls (forever when `None`), then empty again
    pub async fn mock_environment_listing(&self, absent_for: u64, listed_for: Option<u64>) {
        if absent_for > 0 {
            Mock::given(method("GET"))
                .and(path(Self::environments_path()))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
                .up_to_n_times(absent_for)
                .mount(&self.server)
                .await;
        }

        let listed = json!({ "environments": [self.environment_json("RUNNING", true)] });
        let mock = Mock::given(method("GET"))
            .and(path(Self::environments_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(listed));
        match listed_for {
            Some(n) => {
                mock.up_to_n_times(n).mount(&self.server).await;
                Mock::given(method("GET"))
                    .and(path(Self::environments_path()))
                    .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
                    .mount(&self.server)
                    .await;
            }
            None => mock.mount(&self.server).await,
        }
    }

    pub async fn mock_no_environments(&self) {
        Mock::given(method("GET"))
            .and(path(Self::environments_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&self.server)
            .await;
    }

    /// GET environment: each body in `sequence` once, the last one forever
    pub async fn mock_environment_states(&self, sequence: Vec<Value>) {
        let count = sequence.len();
        for (i, body) in sequence.into_iter().enumerate() {
            let mock = Mock::given(method("GET"))
                .and(path(Self::environment_path()))
                .respond_with(ResponseTemplate::new(200).set_body_json(body));
            if i + 1 < count {
                mock.up_to_n_times(1).mount(&self.server).await;
            } else {
                mock.mount(&self.server).await;
            }
        }
    }

    pub async fn mock_create_environment(&self, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path(Self::environments_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "operations/create" })))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    pub async fn mock_update_pypi(&self, expected_calls: u64) {
        Mock::given(method("PATCH"))
            .and(path(Self::environment_path()))
            .and(query_param("updateMask", "config.softwareConfig.pypiPackages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "operations/update" })))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    pub async fn mock_delete_environment(&self, expected_calls: u64) {
        Mock::given(method("DELETE"))
            .and(path(Self::environment_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "operations/delete" })))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    pub async fn mock_upload_trigger(&self, build_id: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/cloudbuild/v1/projects/{PROJECT}/triggers")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "triggers": [
                    { "id": "other", "name": "lint" },
                    { "id": TRIGGER_ID, "name": TRIGGER_NAME }
                ]
            })))
            .mount(&self.server)
            .await;

        Mock::given(method("POST"))
            .and(path(format!("/cloudbuild/v1/projects/{PROJECT}/triggers/{TRIGGER_ID}:run")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operations/build/run",
                "metadata": { "build": { "id": build_id, "status": "QUEUED" } }
            })))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// GET build: each status once, the last one forever
    pub async fn mock_build_statuses(&self, build_id: &str, statuses: &[&str]) {
        for (i, status) in statuses.iter().enumerate() {
            let mock = Mock::given(method("GET"))
                .and(path(format!("/cloudbuild/v1/projects/{PROJECT}/builds/{build_id}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "id": build_id,
                    "buildTriggerId": TRIGGER_ID,
                    "status": status
                })));
            if i + 1 < statuses.len() {
                mock.up_to_n_times(1).mount(&self.server).await;
            } else {
                mock.mount(&self.server).await;
            }
        }
    }

    /// IAP redirect plus the experimental API
    pub async fn mock_airflow(&self, running_dags: &[&str]) {
        Mock::given(method("GET"))
            .and(path("/airflow"))
            .respond_with(ResponseTemplate::new(302).insert_header(
                "location",
                format!(
                    "https://accounts.google.com/o/oauth2/v2/auth?client_id={CLIENT_ID}&response_type=code"
                ),
            ))
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path("/airflow/api/experimental/latest_runs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    { "dag_id": "airflow_monitoring" },
                    { "dag_id": DAG }
                ]
            })))
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path("/airflow/api/experimental/dags/airflow_monitoring/dag_runs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "dag_id": "airflow_monitoring", "state": "running" }
            ])))
            .mount(&self.server)
            .await;

        let state = if running_dags.contains(&DAG) { "running" } else { "success" };
        Mock::given(method("GET"))
            .and(path(format!("/airflow/api/experimental/dags/{DAG}/dag_runs")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "dag_id": DAG, "state": state },
                { "dag_id": DAG, "state": "failed" }
            ])))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_trigger_dag(&self, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path(format!("/airflow/api/experimental/dags/{DAG}/dag_runs")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Created" })))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    /// One labelled bucket holding one object
    pub async fn mock_environment_bucket(&self) {
        let bucket = format!("{LOCATION}-{ENVIRONMENT}-bucket");
        Mock::given(method("GET"))
            .and(path("/storage/v1/b"))
            .and(query_param("project", PROJECT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    { "name": bucket, "labels": { "goog-composer-environment": ENVIRONMENT } },
                    { "name": "unrelated", "labels": {} }
                ]
            })))
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("/storage/v1/b/{bucket}/o")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{ "name": "dags/sample.py" }]
            })))
            .mount(&self.server)
            .await;

        Mock::given(method("DELETE"))
            .and(path(format!("/storage/v1/b/{bucket}/o/dags%2Fsample.py")))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&self.server)
            .await;

        Mock::given(method("DELETE"))
            .and(path(format!("/storage/v1/b/{bucket}")))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&self.server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/storage/v1/b/unrelated"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&self.server)
            .await;
    }

    /// Two leftover disks of this environment, one attached disk, one foreign disk
    pub async fn mock_disks(&self) {
        Mock::given(method("GET"))
            .and(path(Self::zonal_path("disks")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    { "name": "gke-nightly-1", "labels": { "goog-composer-environment": ENVIRONMENT } },
                    { "name": "gke-nightly-2", "labels": { "goog-composer-environment": ENVIRONMENT }, "users": [] },
                    { "name": "gke-nightly-attached", "labels": { "goog-composer-environment": ENVIRONMENT },
                      "users": ["projects/proj/zones/asia-northeast1-a/instances/node"] },
                    { "name": "gke-other", "labels": { "goog-composer-environment": "other" } }
                ]
            })))
            .mount(&self.server)
            .await;

        for (disk, calls) in [
            ("gke-nightly-1", 1),
            ("gke-nightly-2", 1),
            ("gke-nightly-attached", 0),
            ("gke-other", 0),
        ] {
            Mock::given(method("DELETE"))
                .and(path(Self::zonal_path(&format!("disks/{disk}"))))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "operation-disk" })))
                .expect(calls)
                .mount(&self.server)
                .await;
        }
    }

    pub async fn mock_polling_instance(&self, present: bool, expected_deletes: u64) {
        let items = if present {
            json!([{ "name": "composer-polling", "status": "RUNNING" }])
        } else {
            json!([])
        };
        Mock::given(method("GET"))
            .and(path(Self::zonal_path("instances")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": items })))
            .mount(&self.server)
            .await;

        Mock::given(method("DELETE"))
            .and(path(Self::zonal_path("instances/composer-polling")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "operation-instance" })))
            .expect(expected_deletes)
            .mount(&self.server)
            .await;
    }

    pub async fn mock_cos_image(&self) {
        Mock::given(method("GET"))
            .and(path("/compute/v1/projects/cos-cloud/global/images/family/cos-stable"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "cos-stable-109",
                "selfLink": "https://www.googleapis.com/compute/v1/projects/cos-cloud/global/images/cos-stable-109"
            })))
            .mount(&self.server)
            .await;
    }

    /// Polling instance insert answering `status`
    pub async fn mock_insert_polling_instance(&self, status: u16, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path(Self::zonal_path("instances")))
            .and(body_partial_json(json!({
                "name": "composer-polling",
                "labels": { "container-vm": "cos-stable-109" }
            })))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "name": "operation-insert" })))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }
}
