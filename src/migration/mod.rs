//! Migration of products and customers from a billing platform.
//!
//! A [`BillingSource`] lists records already mapped onto create payloads;
//! [`migrate_records`] pushes them through a [`CommerceApi`] with a bounded
//! worker pool. One failing record never aborts the batch.

pub mod lemon;
pub mod transform;

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::api::{CommerceApi, CustomerCreate, ProductCreate};
use crate::error::{ApiError, MigrationError};

pub use lemon::LemonSqueezyClient;

/// A store on the billing platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Store {
    pub id: String,
    pub name: String,
}

/// Read side of a migration.
#[async_trait]
pub trait BillingSource: Send + Sync {
    /// Human-readable platform name.
    fn name(&self) -> &'static str;
    async fn stores(&self) -> Result<Vec<Store>, ApiError>;
    async fn customers(&self, store_id: &str) -> Result<Vec<CustomerCreate>, ApiError>;
    async fn products(&self, store_id: &str) -> Result<Vec<ProductCreate>, ApiError>;
}

/// Billing platforms offered by `polar migrate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    LemonSqueezy,
    Paddle,
    Stripe,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::LemonSqueezy, Provider::Paddle, Provider::Stripe];

    pub fn title(self) -> &'static str {
        match self {
            Self::LemonSqueezy => "Lemon Squeezy",
            Self::Paddle => "Paddle",
            Self::Stripe => "Stripe",
        }
    }

    pub fn is_supported(self) -> bool {
        matches!(self, Self::LemonSqueezy)
    }
}

impl FromStr for Provider {
    type Err = MigrationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lemon-squeezy" | "lemonsqueezy" | "lemon" => Ok(Self::LemonSqueezy),
            "paddle" => Ok(Self::Paddle),
            "stripe" => Ok(Self::Stripe),
            other => Err(MigrationError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// Record kinds that can be migrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Products,
    Customers,
}

impl Entity {
    pub const ALL: [Entity; 2] = [Entity::Products, Entity::Customers];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Customers => "customers",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Products => "Products",
            Self::Customers => "Customers",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One create call to issue against the commerce API.
#[derive(Debug, Clone)]
pub enum MigrationRecord {
    Customer(CustomerCreate),
    Product(ProductCreate),
}

impl MigrationRecord {
    /// Short identifier for reports (email or product name).
    pub fn label(&self) -> &str {
        match self {
            Self::Customer(customer) => &customer.email,
            Self::Product(product) => &product.name,
        }
    }

    async fn create(&self, api: &dyn CommerceApi) -> Result<String, ApiError> {
        let created = match self {
            Self::Customer(customer) => api.create_customer(customer).await?,
            Self::Product(product) => api.create_product(product).await?,
        };
        Ok(created.id)
    }
}

/// A record the commerce API refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRecord {
    pub label: String,
    pub error: String,
}

/// Outcome of one migrated batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Ids of the created records.
    pub created: Vec<String>,
    pub failed: Vec<FailedRecord>,
}

impl MigrationReport {
    pub fn total(&self) -> usize {
        self.created.len() + self.failed.len()
    }
}

/// Create every record with at most `concurrency` calls in flight.
pub async fn migrate_records(
    api: Arc<dyn CommerceApi>,
    records: Vec<MigrationRecord>,
    concurrency: usize,
) -> MigrationReport {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let report = Arc::new(Mutex::new(MigrationReport::default()));
    let mut handles = Vec::with_capacity(records.len());

    for record in records {
        let sem = Arc::clone(&semaphore);
        let api = Arc::clone(&api);
        let report = Arc::clone(&report);

        handles.push(tokio::spawn(async move {
            let _permit = sem.acquire().await;
            let result = record.create(api.as_ref()).await;
            let mut report = report.lock().unwrap_or_else(|p| p.into_inner());
            match result {
                Ok(id) => {
                    debug!(record = record.label(), %id, "record created");
                    report.created.push(id);
                }
                Err(err) => {
                    warn!(record = record.label(), error = %err, "record failed");
                    report.failed.push(FailedRecord {
                        label: record.label().to_string(),
                        error: err.to_string(),
                    });
                }
            }
        }));
    }

    for handle in handles {
        if let Err(err) = handle.await {
            warn!(error = %err, "migration worker aborted");
        }
    }

    let report = report.lock().unwrap_or_else(|p| p.into_inner()).clone();
    report
}

/// List and migrate each selected entity kind from one store, in order.
pub async fn run_migration(
    source: &dyn BillingSource,
    api: Arc<dyn CommerceApi>,
    store_id: &str,
    entities: &[Entity],
    concurrency: usize,
) -> Result<Vec<(Entity, MigrationReport)>, MigrationError> {
    let mut reports = Vec::with_capacity(entities.len());
    for &entity in entities {
        let records: Vec<MigrationRecord> = match entity {
            Entity::Products => source
                .products(store_id)
                .await
                .map_err(|source| MigrationError::Source {
                    entity: entity.as_str(),
                    source,
                })?
                .into_iter()
                .map(MigrationRecord::Product)
                .collect(),
            Entity::Customers => source
                .customers(store_id)
                .await
                .map_err(|source| MigrationError::Source {
                    entity: entity.as_str(),
                    source,
                })?
                .into_iter()
                .map(MigrationRecord::Customer)
                .collect(),
        };
        info!(%entity, count = records.len(), source = source.name(), "migrating records");
        let report = migrate_records(Arc::clone(&api), records, concurrency).await;
        info!(
            %entity,
            created = report.created.len(),
            failed = report.failed.len(),
            "migration batch finished"
        );
        reports.push((entity, report));
    }
    Ok(reports)
}
