//! Store Connection Manager
//!
//! Owns the native purchase channel for the process lifetime and the
//! session product catalog loaded at connection-open.

use std::sync::{Arc, RwLock};

use checkout_core::{ProductCatalog, ProductId, PurchaseKind, Result};

use crate::transport::StoreTransport;

/// Connection to the native store plus the session catalog
///
/// `Some(catalog)` doubles as the ready flag: purchase entry points fail
/// fast while it is `None`.
pub struct StoreConnection {
    transport: Arc<dyn StoreTransport>,
    catalog: RwLock<Option<ProductCatalog>>,
}

impl StoreConnection {
    pub fn new(transport: Arc<dyn StoreTransport>) -> Self {
        Self {
            transport,
            catalog: RwLock::new(None),
        }
    }

    /// Open the purchase channel and load the catalog for both product
    /// classes. Idempotent if already open. Either SKU list may be empty;
    /// no store fetch is issued for an empty class.
    pub async fn open(
        &self,
        subscription_skus: &[ProductId],
        consumable_skus: &[ProductId],
    ) -> Result<()> {
        if self.is_ready() {
            tracing::debug!("store connection already open");
            return Ok(());
        }

        self.transport.open().await?;

        let mut catalog = ProductCatalog::new(subscription_skus.iter().cloned());
        if !subscription_skus.is_empty() {
            let products = self
                .transport
                .fetch_products(subscription_skus, PurchaseKind::Subscription)
                .await?;
            catalog.add_products(products);
        }
        if !consumable_skus.is_empty() {
            let products = self
                .transport
                .fetch_products(consumable_skus, PurchaseKind::Consumable)
                .await?;
            catalog.add_products(products);
        }

        tracing::info!(
            subscriptions = subscription_skus.len(),
            consumables = consumable_skus.len(),
            fetched = catalog.products().len(),
            "store connection open"
        );

        *self.catalog.write().unwrap() = Some(catalog);
        Ok(())
    }

    /// Release the purchase channel and discard the session catalog
    pub async fn close(&self) -> Result<()> {
        self.catalog.write().unwrap().take();
        self.transport.close().await
    }

    pub fn is_ready(&self) -> bool {
        self.catalog.read().unwrap().is_some()
    }

    /// Classification follows the configured subscription SKU list; a
    /// not-ready connection classifies nothing as a subscription.
    pub fn is_subscription(&self, sku: &ProductId) -> bool {
        self.catalog
            .read()
            .unwrap()
            .as_ref()
            .is_some_and(|c| c.is_subscription(sku))
    }

    /// Snapshot of the session catalog, if open
    pub fn catalog(&self) -> Option<ProductCatalog> {
        self.catalog.read().unwrap().clone()
    }
}
