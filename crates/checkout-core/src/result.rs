//! Checkout Result Contract
//!
//! The single outcome shape every checkout backend produces, native store
//! engine and browser-redirect web checkout alike, so UI code never
//! branches on payment-backend identity.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Terminal status of a checkout attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutStatus {
    /// Purchase verified and acknowledged
    Success,

    /// Purchase did not complete
    Failed,

    /// User backed out of the store dialog
    Cancelled,

    /// No terminal event arrived in time; the purchase may still
    /// complete out-of-band
    Pending,
}

/// Metadata attached to a resolved checkout
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CheckoutMetadata {
    /// Product classification as reported by the verification backend
    #[serde(rename = "productType", skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,

    /// Extra key-value metadata
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Outcome of a checkout attempt
///
/// Never partially constructed: a result is either fully resolved or the
/// caller is still waiting.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutResult {
    /// Terminal status
    pub status: CheckoutStatus,

    /// User-facing message (failures, cancellations, pending)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Extra outcome metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CheckoutMetadata>,
}

impl CheckoutResult {
    /// Successful purchase with no metadata
    pub fn success() -> Self {
        Self {
            status: CheckoutStatus::Success,
            message: None,
            metadata: None,
        }
    }

    /// Successful purchase carrying the verified product classification
    pub fn success_with_product_type(product_type: Option<String>) -> Self {
        Self {
            status: CheckoutStatus::Success,
            message: None,
            metadata: Some(CheckoutMetadata {
                product_type,
                extra: HashMap::new(),
            }),
        }
    }

    /// Failed purchase with a user-facing message
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: CheckoutStatus::Failed,
            message: Some(message.into()),
            metadata: None,
        }
    }

    /// User-cancelled purchase
    pub fn cancelled() -> Self {
        Self {
            status: CheckoutStatus::Cancelled,
            message: None,
            metadata: None,
        }
    }

    /// Outcome unknown within the wait window
    pub fn pending(message: impl Into<String>) -> Self {
        Self {
            status: CheckoutStatus::Pending,
            message: Some(message.into()),
            metadata: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CheckoutStatus::Success
    }

    /// Product classification from metadata, if present
    pub fn product_type(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.product_type.as_deref())
    }
}
