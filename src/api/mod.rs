//! Commerce API access.
//!
//! - `types`: wire bodies for customers, products and organizations
//! - `client`: reqwest implementation with retry and bearer auth

use crate::error::ApiError;
use async_trait::async_trait;

mod client;
mod types;

pub use client::retry::RetryPolicy;
pub(crate) use client::transport::{build_http_client, read_json};
pub use client::PolarClient;
pub use types::{
    BillingAddress, Created, CustomerCreate, Organization, ProductCreate, ProductPrice,
    RecurringInterval,
};

/// Narrow commerce API interface used by migration and login.
///
/// Tests substitute an in-memory implementation; the production path uses
/// [`PolarClient`].
#[async_trait]
pub trait CommerceApi: Send + Sync {
    async fn create_customer(&self, customer: &CustomerCreate) -> Result<Created, ApiError>;
    async fn create_product(&self, product: &ProductCreate) -> Result<Created, ApiError>;
    async fn list_organizations(&self) -> Result<Vec<Organization>, ApiError>;
}
