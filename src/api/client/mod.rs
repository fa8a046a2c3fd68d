//! Reqwest implementation of [`CommerceApi`].
//!
//! - `transport`: client construction and response decoding.
//! - `retry`: bounded retry with `Retry-After` support.

pub(crate) mod retry;
pub(crate) mod transport;

use super::types::{Created, CustomerCreate, ListResource, Organization, ProductCreate};
use super::CommerceApi;
use crate::auth::{ExposeSecret, SecretString, Server};
use crate::error::ApiError;
use async_trait::async_trait;
use retry::RetryPolicy;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Client for the commerce API of one environment.
pub struct PolarClient {
    http: reqwest::Client,
    base_url: String,
    token: SecretString,
    retry_policy: RetryPolicy,
}

impl PolarClient {
    /// Build a client for `server` authenticated with `token`.
    pub fn new(server: Server, token: SecretString, timeout: Duration) -> Self {
        Self::with_base_url(server.api_base_url(), token, timeout)
    }

    pub fn with_base_url(base_url: &str, token: SecretString, timeout: Duration) -> Self {
        Self::new_with_retry_policy(base_url, token, timeout, RetryPolicy::default())
    }

    fn new_with_retry_policy(
        base_url: &str,
        token: SecretString,
        timeout: Duration,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            http: transport::build_http_client(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            retry_policy,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send_with_retries<T, F>(&self, path: &str, build: F) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        F: Fn(&reqwest::Client, String) -> reqwest::RequestBuilder,
    {
        let url = format!("{}{path}", self.base_url);
        let mut attempt: u32 = 0;
        loop {
            debug!(%url, attempt, "commerce api request");
            let request = build(&self.http, url.clone()).bearer_auth(self.token.expose_secret());
            let result = match request.send().await {
                Ok(response) => transport::read_json::<T>(response).await,
                Err(err) => Err(ApiError::from(err)),
            };
            match result {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !self.retry_policy.should_retry(&err, attempt) {
                        return Err(err);
                    }
                    let delay = self.retry_policy.retry_delay_for(attempt, &err);
                    debug!(%url, ?delay, error = %err, "retrying commerce api request");
                    attempt = attempt.saturating_add(1);
                    sleep(delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl CommerceApi for PolarClient {
    async fn create_customer(&self, customer: &CustomerCreate) -> Result<Created, ApiError> {
        self.send_with_retries("/v1/customers/", |http, url| http.post(url).json(customer))
            .await
    }

    async fn create_product(&self, product: &ProductCreate) -> Result<Created, ApiError> {
        self.send_with_retries("/v1/products/", |http, url| http.post(url).json(product))
            .await
    }

    async fn list_organizations(&self) -> Result<Vec<Organization>, ApiError> {
        let page: ListResource<Organization> = self
            .send_with_retries("/v1/organizations/?page=1&limit=100", |http, url| {
                http.get(url)
            })
            .await?;
        Ok(page.items)
    }
}
