//! Store Transport Abstraction
//!
//! Seam to the native purchase machinery: connection lifecycle, catalog
//! fetches, purchase requests, transaction acknowledgement, and the two
//! event streams the store emits (purchase delivered, purchase failed).
//! The store owns redelivery across process restarts; this engine only
//! reconciles events for requests it issued in the current session.

mod mock;

pub use mock::MockStoreTransport;

use async_trait::async_trait;
use checkout_core::{Product, ProductId, PurchaseKind, Result};
use tokio::sync::mpsc;

use crate::request::PurchaseParams;

/// Raw proof-of-purchase, platform tagged
///
/// iOS delivers a signed receipt blob, Android a purchase token. The
/// verification request carries exactly one of the two.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Receipt {
    Ios(String),
    Android(String),
}

/// Store error classification
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreErrorCode {
    /// User backed out of the purchase dialog
    UserCancelled,

    /// Store service unreachable
    ServiceUnavailable,

    /// SKU unknown to the store
    ItemUnavailable,

    /// Anything else
    Unknown,
}

/// A completed purchase delivered by the store
///
/// Ephemeral: not retried by this engine. Duplicates and stale
/// redeliveries are expected traffic.
#[derive(Clone, Debug)]
pub struct PurchaseUpdate {
    pub product_id: ProductId,
    pub transaction_id: String,
    pub receipt: Option<Receipt>,
}

/// A purchase failure delivered by the store
#[derive(Clone, Debug)]
pub struct PurchaseFailure {
    pub product_id: Option<ProductId>,
    pub code: StoreErrorCode,
    pub message: String,
}

/// Event emitted by the store transport
#[derive(Clone, Debug)]
pub enum StoreEvent {
    Purchase(PurchaseUpdate),
    Failure(PurchaseFailure),
}

/// Native store transport
///
/// Implement this to back the engine with a real store bridge. The
/// in-tree [`MockStoreTransport`] backs tests and demos.
#[async_trait]
pub trait StoreTransport: Send + Sync {
    /// Establish the purchase channel
    async fn open(&self) -> Result<()>;

    /// Release the purchase channel
    async fn close(&self) -> Result<()>;

    /// Fetch display metadata for the given SKUs of one purchase class.
    /// The store APIs for recurring and one-time products are distinct.
    async fn fetch_products(&self, skus: &[ProductId], kind: PurchaseKind)
    -> Result<Vec<Product>>;

    /// Present the native purchase dialog
    async fn request_purchase(&self, params: &PurchaseParams) -> Result<()>;

    /// Acknowledge a purchase with the store. Only legal after the
    /// backend has verified the receipt.
    async fn finish_transaction(&self, transaction_id: &str, is_consumable: bool) -> Result<()>;

    /// Subscribe to the store's event streams
    fn subscribe(&self) -> mpsc::UnboundedReceiver<StoreEvent>;
}
