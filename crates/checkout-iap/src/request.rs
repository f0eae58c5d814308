//! Platform Purchase Request Builders
//!
//! The native stores take different request shapes for the same purchase
//! (StoreKit wants a single SKU and quantity, Play Billing wants a SKU list
//! and product type). Each platform gets its own builder behind a common
//! trait so adding a platform is additive rather than another inline
//! conditional in the coordinator.

use checkout_core::{Platform, ProductId, PurchaseKind};
use serde::{Deserialize, Serialize};

/// iOS (StoreKit) purchase request shape
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IosPurchaseParams {
    pub sku: ProductId,
    pub quantity: u32,
}

/// Android (Play Billing) purchase request shape
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AndroidPurchaseParams {
    pub sku_list: Vec<ProductId>,
    pub kind: PurchaseKind,
}

/// Platform-specific purchase request
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseParams {
    Ios(IosPurchaseParams),
    Android(AndroidPurchaseParams),
}

impl PurchaseParams {
    /// SKU the request was built for. `None` only for a deserialized
    /// Android request with an empty SKU list; the in-tree builders
    /// always produce one SKU.
    pub fn sku(&self) -> Option<&ProductId> {
        match self {
            PurchaseParams::Ios(p) => Some(&p.sku),
            PurchaseParams::Android(p) => p.sku_list.first(),
        }
    }
}

/// Builder for a platform's purchase request shape
pub trait PurchaseRequestBuilder: Send + Sync {
    fn build(&self, sku: &ProductId, kind: PurchaseKind) -> PurchaseParams;
}

/// StoreKit request builder
pub struct IosRequestBuilder;

impl PurchaseRequestBuilder for IosRequestBuilder {
    fn build(&self, sku: &ProductId, _kind: PurchaseKind) -> PurchaseParams {
        PurchaseParams::Ios(IosPurchaseParams {
            sku: sku.clone(),
            quantity: 1,
        })
    }
}

/// Play Billing request builder
pub struct AndroidRequestBuilder;

impl PurchaseRequestBuilder for AndroidRequestBuilder {
    fn build(&self, sku: &ProductId, kind: PurchaseKind) -> PurchaseParams {
        PurchaseParams::Android(AndroidPurchaseParams {
            sku_list: vec![sku.clone()],
            kind,
        })
    }
}

/// Builder for the given platform
pub fn builder_for(platform: Platform) -> Box<dyn PurchaseRequestBuilder> {
    match platform {
        Platform::Ios => Box::new(IosRequestBuilder),
        Platform::Android => Box::new(AndroidRequestBuilder),
    }
}
