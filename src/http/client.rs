use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::auth::TokenProvider;
use crate::config::HttpConfig;
use crate::gcp::errors::{CloudError, Result};
use crate::observability::api_metrics;

/// Authenticated, rate-limited client for Google Cloud REST APIs.
/// Transient failures (5xx, 429, connection errors) of idempotent requests (GET, PATCH
/// with an update mask, DELETE) are retried with exponential backoff. POSTs start
/// long-running work (create, trigger run, instance insert) and are sent exactly once.
#[derive(Clone)]
pub struct GcpHttpClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: ClientWithMiddleware,
    /// Same connection pool, no retry middleware
    once: ClientWithMiddleware,
    tokens: Arc<dyn TokenProvider>,
    rate_limiter: DefaultDirectRateLimiter,
    timeout: Duration,
}

impl std::fmt::Debug for GcpHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcpHttpClient")
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

impl GcpHttpClient {
    pub fn new(settings: &HttpConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(settings.max_retries);
        let client = reqwest::Client::builder().build()?;
        let http = ClientBuilder::new(client.clone())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        let once = ClientBuilder::new(client).build();

        let per_second = NonZeroU32::new(settings.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(per_second));

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                once,
                tokens,
                rate_limiter,
                timeout: settings.request_timeout(),
            }),
        })
    }

    pub fn tokens(&self) -> Arc<dyn TokenProvider> {
        Arc::clone(&self.inner.tokens)
    }

    pub async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let request = self.inner.http.get(url.clone());
        self.send_json(request, &url).await
    }

    pub async fn get_with_query<T, Q>(&self, url: Url, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let request = self.inner.http.get(url.clone()).query(query);
        self.send_json(request, &url).await
    }

    pub async fn post<T, B>(&self, url: Url, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = self.inner.once.post(url.clone()).json(body);
        self.send_json(request, &url).await
    }

    pub async fn patch<T, B>(&self, url: Url, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = self.inner.http.patch(url.clone()).json(body);
        self.send_json(request, &url).await
    }

    /// DELETE; the body (empty or a long-running operation) is discarded
    pub async fn delete(&self, url: Url) -> Result<()> {
        let request = self.inner.http.delete(url.clone());
        self.send(request, &url).await?;
        Ok(())
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, url: &Url) -> Result<T> {
        let response = self.send(request, url).await?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            // Some endpoints answer 200 with no body; treat it as an empty object
            return Ok(serde_json::from_slice(b"{}")?);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn send(&self, request: RequestBuilder, url: &Url) -> Result<reqwest::Response> {
        if self.inner.rate_limiter.check().is_err() {
            api_metrics().record_throttled();
            self.inner
                .rate_limiter
                .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
                .await;
        }

        let token = self.inner.tokens.access_token().await?;
        api_metrics().record_request();
        debug!(url = %url, "Google API request");

        let response = request
            .bearer_auth(token)
            .timeout(self.inner.timeout)
            .send()
            .await
            .inspect_err(|_| api_metrics().record_error(None))?;

        if !response.status().is_success() {
            let err = error_for_response(response).await;
            api_metrics().record_error(err.status());
            return Err(err);
        }
        Ok(response)
    }
}

/// Turn a non-success response into [`CloudError::Api`], pulling the message out of
/// Google's `{"error": {"message": ...}}` envelope when there is one
pub async fn error_for_response(response: reqwest::Response) -> CloudError {
    let status = response.status().as_u16();
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();

    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());

    CloudError::Api { status, url, message }
}

/// Append path segments to a base URL, percent-encoding each one
pub fn endpoint(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base)?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| CloudError::InvalidUrl(format!("{base} cannot be a base URL")))?;
        path.pop_if_empty().extend(segments);
    }
    Ok(url)
}
