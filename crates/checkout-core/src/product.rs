//! Product Model
//!
//! Store product identifiers, display snapshots, and the session catalog
//! that classifies SKUs into subscription and consumable classes.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Store-assigned product identifier (SKU)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Purchase classification
///
/// Subscriptions are recurring entitlements finalized without being marked
/// consumed; consumables must be marked consumed before they can be bought
/// again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseKind {
    Subscription,
    Consumable,
}

impl PurchaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseKind::Subscription => "subscription",
            PurchaseKind::Consumable => "consumable",
        }
    }
}

/// Display snapshot of a store product
///
/// Fetched once per session from the store catalog and never persisted.
/// `price` is localized display data, never used for arithmetic.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    /// Store SKU
    pub product_id: ProductId,

    /// Localized title
    pub title: String,

    /// Localized description
    pub description: String,

    /// Pre-formatted localized price string (e.g. "$4.99")
    pub display_price: String,

    /// Numeric price in the local currency
    pub price: f64,

    /// ISO currency code
    pub currency: String,
}

/// Session catalog of purchasable products
///
/// Holds the configured SKU lists for both purchase classes plus whatever
/// display metadata the store returned for them. Classification follows the
/// configured lists, not the fetched metadata, so a SKU the store failed to
/// describe still finalizes correctly.
#[derive(Clone, Debug, Default)]
pub struct ProductCatalog {
    subscription_skus: HashSet<ProductId>,
    products: Vec<Product>,
}

impl ProductCatalog {
    pub fn new(subscription_skus: impl IntoIterator<Item = ProductId>) -> Self {
        Self {
            subscription_skus: subscription_skus.into_iter().collect(),
            products: Vec::new(),
        }
    }

    /// Record display metadata fetched from the store
    pub fn add_products(&mut self, products: Vec<Product>) {
        self.products.extend(products);
    }

    /// A SKU on the subscription list is a subscription; everything else
    /// is treated as consumable.
    pub fn is_subscription(&self, sku: &ProductId) -> bool {
        self.subscription_skus.contains(sku)
    }

    pub fn kind_of(&self, sku: &ProductId) -> PurchaseKind {
        if self.is_subscription(sku) {
            PurchaseKind::Subscription
        } else {
            PurchaseKind::Consumable
        }
    }

    /// Display snapshot for a SKU, if the store returned one
    pub fn product(&self, sku: &ProductId) -> Option<&Product> {
        self.products.iter().find(|p| &p.product_id == sku)
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }
}
