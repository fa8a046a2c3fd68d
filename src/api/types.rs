//! Request/response bodies for the commerce API.
//!
//! Field names follow the API's snake_case wire format.

use serde::{Deserialize, Serialize};

/// Payload for `POST /v1/customers/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerCreate {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<BillingAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingAddress {
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Payload for `POST /v1/products/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `None` is a one-time product; serialized as `null`.
    pub recurring_interval: Option<RecurringInterval>,
    pub prices: Vec<ProductPrice>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurringInterval {
    Month,
    Year,
}

/// One price in a product create payload, tagged by `amount_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "amount_type", rename_all = "lowercase")]
pub enum ProductPrice {
    Fixed {
        price_amount: u64,
        price_currency: String,
    },
    Custom {
        price_currency: String,
        minimum_amount: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        preset_amount: Option<u64>,
    },
    Free,
}

/// Subset of an organization record used for login selection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub slug: String,
}

/// Paged list envelope (`{"items": [...], "pagination": {...}}`).
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ListResource<T> {
    pub(crate) items: Vec<T>,
}

/// Identifier returned by create endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Created {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn price_variants_serialize_with_amount_type_tag() {
        let fixed = ProductPrice::Fixed {
            price_amount: 1500,
            price_currency: "usd".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&fixed).unwrap(),
            json!({"amount_type": "fixed", "price_amount": 1500, "price_currency": "usd"})
        );
        assert_eq!(
            serde_json::to_value(ProductPrice::Free).unwrap(),
            json!({"amount_type": "free"})
        );
    }

    #[test]
    fn one_time_product_serializes_null_interval() {
        let product = ProductCreate {
            name: "Ebook".to_string(),
            description: None,
            recurring_interval: None,
            prices: vec![ProductPrice::Free],
        };
        let value = serde_json::to_value(&product).unwrap();
        assert_eq!(value["recurring_interval"], serde_json::Value::Null);
        assert!(value.get("description").is_none());
    }

    #[test]
    fn customer_without_address_omits_it() {
        let customer = CustomerCreate {
            email: "a@example.com".to_string(),
            name: Some("Ada".to_string()),
            billing_address: None,
        };
        assert_eq!(
            serde_json::to_value(&customer).unwrap(),
            json!({"email": "a@example.com", "name": "Ada"})
        );
    }
}
