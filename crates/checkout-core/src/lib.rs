//! # checkout-core
//!
//! Shared checkout types for rust-checkout.
//!
//! Every checkout backend (the native app-store engine in `checkout-iap`
//! and any browser-redirect web checkout) produces the same
//! [`CheckoutResult`] tagged union, so calling code never branches on
//! payment-backend identity.
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐
//! │  checkout-iap │────▶│                   │
//! │ (native store)│     │  CheckoutResult   │────▶ UI
//! ├──────────────┤     │ success | failed  │
//! │ web checkout  │────▶│ cancelled|pending │
//! │ (redirect)    │     └───────────────────┘
//! └──────────────┘
//! ```

mod error;
mod platform;
mod product;
mod result;

pub use error::{CheckoutError, Result};
pub use platform::Platform;
pub use product::{Product, ProductCatalog, ProductId, PurchaseKind};
pub use result::{CheckoutMetadata, CheckoutResult, CheckoutStatus};
