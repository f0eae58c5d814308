//! # checkout-iap
//!
//! Native app-store purchase reconciliation engine.
//!
//! A native purchase delivers its outcome through asynchronous, unordered,
//! possibly-duplicated callback events. This crate turns that into a single
//! deterministic, idempotent [`CheckoutResult`](checkout_core::CheckoutResult)
//! the caller can await like a normal call.
//!
//! ```text
//! ┌────────┐  purchase_*()   ┌─────────────┐  request   ┌────────────┐
//! │ Caller │───────────────▶│ CheckoutEngine│──────────▶│ StoreTransport│
//! └────────┘   awaits slot   └──────┬──────┘            └──────┬─────┘
//!      ▲                            │ begin()                  │ events
//!      │                     ┌──────▼──────┐           ┌──────▼─────┐
//!      │      resolve        │CorrelationSlot│◀─claim──│ EventBridge │
//!      └─────────────────────┴─────────────┘           └──────┬─────┘
//!                                                             │ verify, then
//!                                                             ▼ finalize
//!                                                     ┌──────────────┐
//!                                                     │ReceiptVerifier│
//!                                                     └──────────────┘
//! ```
//!
//! Core invariants:
//!
//! - **Single-flight**: at most one purchase in flight engine-wide; a second
//!   request is rejected before any store interaction.
//! - **Exactly-once resolution**: duplicate and late store events are no-ops
//!   once a purchase has resolved (by event, error, or timeout).
//! - **Verify before finalize**: `finish_transaction` is only ever called
//!   after the backend verified the receipt, so a crash can never leave a
//!   charged user without their recorded entitlement.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_iap::{CheckoutConfig, CheckoutEngine, HttpReceiptVerifier};
//! use checkout_core::Platform;
//! use std::sync::Arc;
//!
//! let engine = CheckoutEngine::new(
//!     transport, // your StoreTransport bridge
//!     Arc::new(HttpReceiptVerifier::from_env()?),
//!     CheckoutConfig::new(Platform::Ios),
//! );
//! engine.connect(&["pro_monthly".into()], &["tip_5".into()]).await?;
//!
//! let result = engine.purchase_consumable("tip_5").await;
//! ```

mod bridge;
mod connection;
mod engine;
mod request;
mod slot;
mod transport;
mod verify;

pub use connection::StoreConnection;
pub use engine::{CheckoutConfig, CheckoutEngine};
pub use request::{
    AndroidPurchaseParams, AndroidRequestBuilder, IosPurchaseParams, IosRequestBuilder,
    PurchaseParams, PurchaseRequestBuilder, builder_for,
};
pub use transport::{
    MockStoreTransport, PurchaseFailure, PurchaseUpdate, Receipt, StoreErrorCode, StoreEvent,
    StoreTransport,
};
pub use verify::{HttpReceiptVerifier, ReceiptVerifier, VerifyRequest, VerifyResponse};
