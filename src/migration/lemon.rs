//! Lemon Squeezy JSON:API client.
//!
//! Every list endpoint is paged (`page[number]`, `page[size]`) and reports
//! `meta.page.lastPage`. Pages after the first are fetched in small
//! concurrent batches with a pause in between to stay under rate limits.

use async_trait::async_trait;
use futures_util::future::try_join_all;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::api::{build_http_client, read_json, CustomerCreate, ProductCreate, RetryPolicy};
use crate::auth::{ExposeSecret, SecretString};
use crate::error::ApiError;

use super::transform::{customer_from_lemon, product_from_variant};
use super::{BillingSource, Store};

pub const LEMON_SQUEEZY_API_URL: &str = "https://api.lemonsqueezy.com/v1";
const PAGE_SIZE: u32 = 50;
const JSON_API_MEDIA_TYPE: &str = "application/vnd.api+json";

// ---------------------------------------------------------------------------
// JSON:API documents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Resource<A> {
    pub id: String,
    pub attributes: A,
}

#[derive(Debug, Deserialize)]
struct ListDocument<A> {
    #[serde(default = "Vec::new")]
    data: Vec<Resource<A>>,
    meta: Option<ListMeta>,
}

#[derive(Debug, Deserialize)]
struct ListMeta {
    page: PageMeta,
}

#[derive(Debug, Deserialize)]
struct PageMeta {
    #[serde(rename = "lastPage")]
    last_page: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreAttributes {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerAttributes {
    pub name: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductAttributes {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariantAttributes {
    pub name: String,
    pub description: Option<String>,
    /// Price in cents.
    pub price: i64,
    #[serde(default)]
    pub pay_what_you_want: bool,
    pub min_price: Option<i64>,
    pub suggested_price: Option<i64>,
    pub interval: Option<String>,
}

// ---------------------------------------------------------------------------
// Paging
// ---------------------------------------------------------------------------

/// One fetched page plus the total page count it reported.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub last_page: u32,
}

/// Batching and retry knobs for [`fetch_all_pages`].
#[derive(Debug, Clone, Copy)]
pub struct PagingOptions {
    /// Pages fetched concurrently after the first one.
    pub batch_size: usize,
    /// Pause between batches (not after the last).
    pub batch_delay: Duration,
    /// Per-page retry policy.
    pub retry: RetryPolicy,
}

impl Default for PagingOptions {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_delay: Duration::from_millis(250),
            // Five retries after the first attempt: 1s, 2s, 4s, 8s, 16s.
            retry: RetryPolicy {
                max_attempts: 6,
                initial_backoff: Duration::from_secs(1),
                max_backoff: Duration::from_secs(16),
            },
        }
    }
}

/// Fetch every page of a paged listing.
///
/// Page 1 is fetched first to learn `last_page`; the remaining pages are
/// fetched `batch_size` at a time. Results keep page order.
pub async fn fetch_all_pages<T, F, Fut>(
    options: PagingOptions,
    fetch: F,
) -> Result<Vec<T>, ApiError>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
{
    let fetch = &fetch;
    let first = with_retry(&options.retry, || fetch(1)).await?;
    let mut items = first.items;
    if first.last_page <= 1 {
        return Ok(items);
    }

    let remaining: Vec<u32> = (2..=first.last_page).collect();
    let batches: Vec<&[u32]> = remaining.chunks(options.batch_size.max(1)).collect();
    for (index, batch) in batches.iter().enumerate() {
        let pages = try_join_all(
            batch
                .iter()
                .map(|&number| with_retry(&options.retry, move || fetch(number))),
        )
        .await?;
        for page in pages {
            items.extend(page.items);
        }
        if index + 1 < batches.len() {
            sleep(options.batch_delay).await;
        }
    }
    Ok(items)
}

async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut call: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !policy.should_retry(&err, attempt) {
                    return Err(err);
                }
                let delay = policy.retry_delay_for(attempt, &err);
                debug!(attempt, ?delay, error = %err, "retrying billing api page");
                attempt = attempt.saturating_add(1);
                sleep(delay).await;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Read-only Lemon Squeezy client authenticated with a store API key.
pub struct LemonSqueezyClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    paging: PagingOptions,
}

impl LemonSqueezyClient {
    pub fn new(api_key: SecretString, timeout: Duration) -> Self {
        Self::with_base_url(LEMON_SQUEEZY_API_URL, api_key, timeout)
    }

    pub fn with_base_url(base_url: &str, api_key: SecretString, timeout: Duration) -> Self {
        Self {
            http: build_http_client(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            paging: PagingOptions::default(),
        }
    }

    pub fn with_paging(mut self, paging: PagingOptions) -> Self {
        self.paging = paging;
        self
    }

    async fn list_page<A: DeserializeOwned>(
        &self,
        path: &str,
        filter: Option<(&str, &str)>,
        number: u32,
    ) -> Result<Page<Resource<A>>, ApiError> {
        let mut query = vec![
            ("page[number]".to_string(), number.to_string()),
            ("page[size]".to_string(), PAGE_SIZE.to_string()),
        ];
        if let Some((key, value)) = filter {
            query.push((format!("filter[{key}]"), value.to_string()));
        }
        let url = format!("{}{path}", self.base_url);
        debug!(%url, page = number, "billing api request");
        let response = self
            .http
            .get(&url)
            .query(&query)
            .header(reqwest::header::ACCEPT, JSON_API_MEDIA_TYPE)
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await?;
        let document: ListDocument<A> = read_json(response).await?;
        Ok(Page {
            items: document.data,
            last_page: document.meta.map(|m| m.page.last_page).unwrap_or(1),
        })
    }

    async fn list_all<A: DeserializeOwned>(
        &self,
        path: &str,
        filter: Option<(&str, &str)>,
    ) -> Result<Vec<Resource<A>>, ApiError> {
        fetch_all_pages(self.paging, move |number| {
            self.list_page::<A>(path, filter, number)
        })
        .await
    }

    async fn variants(
        &self,
        product_id: &str,
    ) -> Result<Vec<Resource<VariantAttributes>>, ApiError> {
        self.list_all("/variants", Some(("product_id", product_id)))
            .await
    }
}

#[async_trait]
impl BillingSource for LemonSqueezyClient {
    fn name(&self) -> &'static str {
        "Lemon Squeezy"
    }

    async fn stores(&self) -> Result<Vec<Store>, ApiError> {
        let stores = self.list_all::<StoreAttributes>("/stores", None).await?;
        Ok(stores
            .into_iter()
            .map(|store| Store {
                id: store.id,
                name: store.attributes.name,
            })
            .collect())
    }

    async fn customers(&self, store_id: &str) -> Result<Vec<CustomerCreate>, ApiError> {
        let customers = self
            .list_all::<CustomerAttributes>("/customers", Some(("store_id", store_id)))
            .await?;
        Ok(customers
            .iter()
            .filter_map(|customer| customer_from_lemon(&customer.attributes))
            .collect())
    }

    async fn products(&self, store_id: &str) -> Result<Vec<ProductCreate>, ApiError> {
        let products = self
            .list_all::<ProductAttributes>("/products", Some(("store_id", store_id)))
            .await?;
        debug!(count = products.len(), "listed billing products");

        let mut created = Vec::new();
        for batch in products.chunks(self.paging.batch_size.max(1)) {
            let groups =
                try_join_all(batch.iter().map(|product| self.variants(&product.id))).await?;
            for variant in groups.iter().flatten() {
                created.push(product_from_variant(&variant.attributes));
            }
        }
        Ok(created)
    }
}
