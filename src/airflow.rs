//! Airflow experimental REST API behind Identity-Aware Proxy.
//!
//! The webserver URI redirects unauthenticated requests to Google's OAuth page; the
//! `client_id` in that redirect is the audience for the OIDC token every API call needs.

use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::gcp::errors::{CloudError, Result};
use crate::gcp::types::{DagRun, LatestRunsResponse};
use crate::http::{error_for_response, TokenProvider};

/// Airflow's own heartbeat DAG; always present, never blocks teardown
pub const MONITORING_DAG: &str = "airflow_monitoring";

#[derive(Clone)]
pub struct AirflowClient {
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    airflow_uri: String,
    client_id: String,
}

impl std::fmt::Debug for AirflowClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AirflowClient")
            .field("airflow_uri", &self.airflow_uri)
            .field("client_id", &self.client_id)
            .finish()
    }
}

impl AirflowClient {
    /// Discover the IAP client id for `airflow_uri` and build a client for it
    pub async fn connect(
        airflow_uri: &str,
        tokens: Arc<dyn TokenProvider>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(Policy::none())
            .timeout(timeout)
            .build()?;
        let client_id = discover_client_id(&http, airflow_uri).await?;
        debug!(airflow_uri, client_id = %client_id, "Discovered IAP client id");

        Ok(Self {
            http,
            tokens,
            airflow_uri: airflow_uri.trim_end_matches('/').to_string(),
            client_id,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn api_url(&self, tail: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.airflow_uri)?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| CloudError::InvalidUrl(self.airflow_uri.clone()))?;
            path.pop_if_empty().extend(["api", "experimental"]).extend(tail);
        }
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let token = self.tokens.identity_token(&self.client_id).await?;
        let response = self.http.get(url).bearer_auth(token).send().await?;
        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }
        Ok(response.json().await?)
    }

    /// Start a run of `dag_id` with an empty conf
    pub async fn trigger_dag_run(&self, dag_id: &str) -> Result<()> {
        let url = self.api_url(&["dags", dag_id, "dag_runs"])?;
        let token = self.tokens.identity_token(&self.client_id).await?;
        info!(dag_id, "Triggering DAG run");

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&json!({}))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }
        Ok(())
    }

    pub async fn latest_runs(&self) -> Result<LatestRunsResponse> {
        self.get(self.api_url(&["latest_runs"])?).await
    }

    pub async fn dag_runs(&self, dag_id: &str) -> Result<Vec<DagRun>> {
        self.get(self.api_url(&["dags", dag_id, "dag_runs"])?).await
    }

    /// True while any DAG other than the monitoring DAG has its newest run in `running`
    pub async fn has_running_dag(&self) -> Result<bool> {
        let latest = self.latest_runs().await?;
        for run in latest.items.iter().filter(|r| r.dag_id != MONITORING_DAG) {
            let runs = self.dag_runs(&run.dag_id).await?;
            if runs.first().is_some_and(|r| r.state == "running") {
                debug!(dag_id = %run.dag_id, "DAG still running");
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Read the OAuth `client_id` out of the IAP redirect for `airflow_uri`
pub async fn discover_client_id(http: &reqwest::Client, airflow_uri: &str) -> Result<String> {
    let response = http.get(airflow_uri).send().await?;
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            CloudError::MissingResource(format!(
                "{airflow_uri} answered {} without an IAP redirect",
                response.status()
            ))
        })?;

    let redirect = Url::parse(location)?;
    redirect
        .query_pairs()
        .find(|(key, _)| key == "client_id")
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| CloudError::MissingResource(format!("client_id in redirect {location}")))
}
