//! Meta commerce catalog adapter.
//!
//! Products live in the WhatsApp Business catalog and are fetched by
//! retailer id. The Graph API answers in more than one shape (a direct
//! product object, or a `{data: [...]}` list whose entries may be partial),
//! and price strings arrive with currency prefixes/suffixes and thousands
//! separators. All of that is normalized here so the rest of the system
//! only ever sees a parsed `Product`.

use crate::errors::ServiceError;
use async_trait::async_trait;
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, instrument, warn};

const PRODUCT_FIELDS: &str =
    "id,retailer_id,name,description,price,currency,image_url,availability,category";

static PRICE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?i:NGN|USD|EUR|GBP)\s*").expect("valid regex"));
static PRICE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(?i:NGN|USD|EUR|GBP)\s*$").expect("valid regex"));

/// Catalog availability flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    #[serde(rename = "in stock")]
    InStock,
    #[serde(rename = "out of stock")]
    OutOfStock,
    #[serde(rename = "preorder")]
    Preorder,
}

impl Availability {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("out of stock") => Self::OutOfStock,
            Some("preorder") => Self::Preorder,
            // The catalog omits the field for purchasable products
            _ => Self::InStock,
        }
    }

    pub fn is_purchasable(self) -> bool {
        !matches!(self, Self::OutOfStock)
    }
}

/// A catalog product after normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub retailer_id: String,
    pub name: String,
    pub description: Option<String>,
    /// Unit price, already stripped of currency markers and separators
    pub price: Decimal,
    pub currency: String,
    pub image_url: Option<String>,
    pub availability: Availability,
    pub category: Option<String>,
}

/// Strips currency prefixes/suffixes and thousands separators, then parses.
/// Fails on anything that does not come out as a positive decimal.
pub fn normalize_price(raw: &str, retailer_id: &str) -> Result<Decimal, ServiceError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidInput(format!(
            "Product {} has an empty price",
            retailer_id
        )));
    }

    let stripped = PRICE_PREFIX.replace(trimmed, "");
    let stripped = PRICE_SUFFIX.replace(&stripped, "");
    let cleaned = stripped.replace(',', "");

    let price = Decimal::from_str(&cleaned).map_err(|_| {
        ServiceError::InvalidInput(format!(
            "Product {} has an unparseable price: {:?}",
            retailer_id, raw
        ))
    })?;

    if price <= Decimal::ZERO {
        return Err(ServiceError::InvalidInput(format!(
            "Product {} has a non-positive price: {:?}",
            retailer_id, raw
        )));
    }

    Ok(price)
}

/// Builds a `Product` from a Graph API product object.
fn parse_product(value: &Value, retailer_id: &str) -> Result<Product, ServiceError> {
    let raw_price = value
        .get("price")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ServiceError::InvalidInput(format!("Product {} has no price field", retailer_id))
        })?;
    let price = normalize_price(raw_price, retailer_id)?;

    let str_field = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);

    Ok(Product {
        id: str_field("id").unwrap_or_else(|| retailer_id.to_string()),
        retailer_id: str_field("retailer_id").unwrap_or_else(|| retailer_id.to_string()),
        name: str_field("name").unwrap_or_else(|| "Unknown Product".to_string()),
        description: str_field("description"),
        price,
        currency: str_field("currency").unwrap_or_else(|| "NGN".to_string()),
        image_url: str_field("image_url"),
        availability: Availability::parse(value.get("availability").and_then(Value::as_str)),
        category: str_field("category"),
    })
}

#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Fetches one product; `Ok(None)` when the catalog does not know the id.
    async fn get_product(&self, retailer_id: &str) -> Result<Option<Product>, ServiceError>;

    /// Parallel fetch; ids that fail or resolve to nothing are simply
    /// absent from the returned map.
    async fn get_products(
        &self,
        retailer_ids: &[String],
    ) -> Result<HashMap<String, Product>, ServiceError>;

    /// Lists catalog products with valid prices, for the browse UI.
    async fn list_products(&self) -> Result<Vec<Product>, ServiceError>;
}

pub struct MetaCatalogClient {
    http: reqwest::Client,
    api_url: String,
    access_token: String,
    catalog_id: Option<String>,
}

impl MetaCatalogClient {
    pub fn new(
        http: reqwest::Client,
        api_url: String,
        access_token: String,
        catalog_id: Option<String>,
    ) -> Self {
        Self {
            http,
            api_url,
            access_token,
            catalog_id,
        }
    }

    async fn fetch_json(&self, url: &str) -> Result<reqwest::Response, ServiceError> {
        self.http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("catalog request: {}", e)))
    }

    /// Some list responses carry only the product id; the full record has
    /// to be re-fetched by that id.
    async fn fetch_product_by_id(
        &self,
        product_id: &str,
        retailer_id: &str,
    ) -> Result<Product, ServiceError> {
        let url = format!(
            "{}/{}?fields={}",
            self.api_url, product_id, PRODUCT_FIELDS
        );
        let response = self.fetch_json(&url).await?;
        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "catalog detail fetch for {} failed with status {}",
                retailer_id,
                response.status()
            )));
        }
        let value: Value = response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("catalog detail body: {}", e)))?;
        parse_product(&value, retailer_id)
    }
}

#[async_trait]
impl CatalogApi for MetaCatalogClient {
    #[instrument(skip(self))]
    async fn get_product(&self, retailer_id: &str) -> Result<Option<Product>, ServiceError> {
        let Some(catalog_id) = &self.catalog_id else {
            warn!("Catalog id is not configured; cannot fetch product details");
            return Ok(None);
        };

        let url = format!(
            "{}/{}/products/{}?fields={}",
            self.api_url, catalog_id, retailer_id, PRODUCT_FIELDS
        );
        let response = self.fetch_json(&url).await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            warn!(%retailer_id, "Product not found in catalog");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "catalog fetch for {} failed with status {}",
                retailer_id,
                response.status()
            )));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("catalog body: {}", e)))?;
        debug!(%retailer_id, "Catalog response received");

        // Direct object or a list wrapper, depending on the API path taken
        if let Some(entries) = value.get("data").and_then(Value::as_array) {
            let Some(entry) = entries.iter().find(|item| {
                item.get("retailer_id").and_then(Value::as_str) == Some(retailer_id)
            }) else {
                warn!(%retailer_id, "Product missing from catalog list response");
                return Ok(None);
            };

            let has_inline_data = entry.get("price").and_then(Value::as_str).is_some()
                && entry.get("name").and_then(Value::as_str).is_some();
            if has_inline_data {
                return parse_product(entry, retailer_id).map(Some);
            }

            if let Some(product_id) = entry.get("id").and_then(Value::as_str) {
                return self
                    .fetch_product_by_id(product_id, retailer_id)
                    .await
                    .map(Some);
            }

            warn!(%retailer_id, "Catalog list entry missing both inline data and id");
            return Ok(None);
        }

        if value.get("id").is_some() || value.get("retailer_id").is_some() {
            return parse_product(&value, retailer_id).map(Some);
        }

        Err(ServiceError::ExternalServiceError(format!(
            "unexpected catalog response shape for {}",
            retailer_id
        )))
    }

    #[instrument(skip(self, retailer_ids), fields(count = retailer_ids.len()))]
    async fn get_products(
        &self,
        retailer_ids: &[String],
    ) -> Result<HashMap<String, Product>, ServiceError> {
        let lookups = retailer_ids.iter().map(|retailer_id| async move {
            match self.get_product(retailer_id).await {
                Ok(Some(product)) => Some((retailer_id.clone(), product)),
                Ok(None) => None,
                Err(e) => {
                    warn!(%retailer_id, "Failed to fetch product: {}", e);
                    None
                }
            }
        });

        Ok(join_all(lookups).await.into_iter().flatten().collect())
    }

    #[instrument(skip(self))]
    async fn list_products(&self) -> Result<Vec<Product>, ServiceError> {
        let Some(catalog_id) = &self.catalog_id else {
            return Ok(Vec::new());
        };

        let url = format!(
            "{}/{}/products?fields={}&limit=30",
            self.api_url, catalog_id, PRODUCT_FIELDS
        );
        let response = self.fetch_json(&url).await?;
        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "catalog listing failed with status {}",
                response.status()
            )));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("catalog listing body: {}", e)))?;

        let mut products = Vec::new();
        for entry in value
            .get("data")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            let retailer_id = entry
                .get("retailer_id")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if retailer_id.is_empty() {
                continue;
            }
            match parse_product(entry, retailer_id) {
                Ok(product) => products.push(product),
                Err(e) => warn!(%retailer_id, "Skipping catalog entry: {}", e),
            }
        }

        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn normalize_price_strips_currency_prefix() {
        assert_eq!(normalize_price("NGN 1,500.00", "p1").unwrap(), dec!(1500.00));
        assert_eq!(normalize_price("ngn2500", "p1").unwrap(), dec!(2500));
    }

    #[test]
    fn normalize_price_strips_currency_suffix() {
        assert_eq!(normalize_price("1500 NGN", "p1").unwrap(), dec!(1500));
        assert_eq!(normalize_price("12.50 usd", "p1").unwrap(), dec!(12.50));
    }

    #[test]
    fn normalize_price_strips_thousands_separators() {
        assert_eq!(
            normalize_price("1,234,567.89", "p1").unwrap(),
            dec!(1234567.89)
        );
    }

    #[test]
    fn normalize_price_rejects_empty_and_garbage() {
        assert!(normalize_price("", "p1").is_err());
        assert!(normalize_price("   ", "p1").is_err());
        assert!(normalize_price("free", "p1").is_err());
    }

    #[test]
    fn normalize_price_rejects_non_positive() {
        assert!(normalize_price("0", "p1").is_err());
        assert!(normalize_price("0.00", "p1").is_err());
        assert!(normalize_price("-25", "p1").is_err());
    }

    #[test]
    fn parse_product_fills_defaults() {
        let value = json!({
            "price": "NGN 900",
        });
        let product = parse_product(&value, "sku-9").unwrap();
        assert_eq!(product.retailer_id, "sku-9");
        assert_eq!(product.name, "Unknown Product");
        assert_eq!(product.currency, "NGN");
        assert_eq!(product.price, dec!(900));
        assert_eq!(product.availability, Availability::InStock);
    }

    #[test]
    fn parse_product_reads_full_record() {
        let value = json!({
            "id": "1234",
            "retailer_id": "sku-1",
            "name": "Bag of Rice",
            "description": "50kg",
            "price": "NGN 85,000.00",
            "currency": "NGN",
            "image_url": "https://cdn.example.com/rice.jpg",
            "availability": "out of stock",
            "category": "groceries"
        });
        let product = parse_product(&value, "sku-1").unwrap();
        assert_eq!(product.name, "Bag of Rice");
        assert_eq!(product.price, dec!(85000.00));
        assert_eq!(product.availability, Availability::OutOfStock);
        assert!(!product.availability.is_purchasable());
    }

    #[test]
    fn parse_product_rejects_missing_price() {
        let value = json!({"name": "No price"});
        assert!(parse_product(&value, "sku-2").is_err());
    }

    #[test]
    fn availability_defaults_to_in_stock() {
        assert_eq!(Availability::parse(None), Availability::InStock);
        assert_eq!(Availability::parse(Some("weird")), Availability::InStock);
        assert_eq!(
            Availability::parse(Some("preorder")),
            Availability::Preorder
        );
        assert!(Availability::Preorder.is_purchasable());
    }
}
