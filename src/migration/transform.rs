//! Mapping of billing-platform records onto commerce API create payloads.

use tracing::warn;

use crate::api::{BillingAddress, CustomerCreate, ProductCreate, ProductPrice, RecurringInterval};

use super::lemon::{CustomerAttributes, VariantAttributes};

/// Currency attached to every migrated price.
pub const PRICE_CURRENCY: &str = "usd";
/// Smallest pay-what-you-want minimum accepted by the commerce API, in cents.
pub const MIN_CUSTOM_AMOUNT: u64 = 50;

/// Map one customer. Records without an email cannot be created and are
/// skipped.
pub fn customer_from_lemon(attrs: &CustomerAttributes) -> Option<CustomerCreate> {
    let email = attrs.email.as_deref().map(str::trim).unwrap_or_default();
    if email.is_empty() {
        warn!(name = ?attrs.name, "skipping customer without email");
        return None;
    }
    let billing_address = non_blank(attrs.country.as_deref()).map(|country| BillingAddress {
        country: country.to_string(),
        city: non_blank(attrs.city.as_deref()).map(str::to_string),
        state: non_blank(attrs.region.as_deref()).map(str::to_string),
    });
    Some(CustomerCreate {
        email: email.to_string(),
        name: non_blank(attrs.name.as_deref()).map(str::to_string),
        billing_address,
    })
}

pub fn product_from_variant(attrs: &VariantAttributes) -> ProductCreate {
    ProductCreate {
        name: attrs.name.clone(),
        description: non_blank(attrs.description.as_deref()).map(str::to_string),
        recurring_interval: interval_from_lemon(attrs.interval.as_deref()),
        prices: vec![price_from_variant(attrs)],
    }
}

/// Lemon Squeezy also bills daily and weekly; those become one-time products.
pub fn interval_from_lemon(interval: Option<&str>) -> Option<RecurringInterval> {
    match interval {
        Some("month") => Some(RecurringInterval::Month),
        Some("year") => Some(RecurringInterval::Year),
        _ => None,
    }
}

pub fn price_from_variant(attrs: &VariantAttributes) -> ProductPrice {
    if attrs.price > 0 {
        return ProductPrice::Fixed {
            price_amount: attrs.price.unsigned_abs(),
            price_currency: PRICE_CURRENCY.to_string(),
        };
    }
    if attrs.pay_what_you_want {
        let minimum = u64::try_from(attrs.min_price.unwrap_or(0)).unwrap_or(0);
        let preset = attrs
            .suggested_price
            .and_then(|amount| u64::try_from(amount).ok())
            .filter(|amount| *amount > 0);
        return ProductPrice::Custom {
            price_currency: PRICE_CURRENCY.to_string(),
            minimum_amount: minimum.max(MIN_CUSTOM_AMOUNT),
            preset_amount: preset,
        };
    }
    ProductPrice::Free
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
