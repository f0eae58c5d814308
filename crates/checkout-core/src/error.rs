//! Checkout Error Types

use thiserror::Error;

/// Result type alias for checkout operations
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Checkout-related errors
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// Store connection never opened or still initializing
    #[error("Store not ready: {0}")]
    NotReady(String),

    /// A purchase is already in flight (single-flight rejection)
    #[error("Purchase already in progress for {0}")]
    PurchaseInProgress(String),

    /// The native store rejected or failed a call
    #[error("Store error: {0}")]
    Store(String),

    /// Purchase event arrived without usable receipt data
    #[error("Receipt missing for transaction {0}")]
    MissingReceipt(String),

    /// The verification backend rejected the receipt
    #[error("Verification rejected: {0}")]
    VerificationRejected(String),

    /// The verification round trip itself failed (network, decode)
    #[error("Verification transport error: {0}")]
    VerificationTransport(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl CheckoutError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::Store(_) | CheckoutError::VerificationTransport(_)
        )
    }

    /// Convert to a user-friendly message
    ///
    /// Raw store and backend error text is never surfaced to end users,
    /// only logged.
    pub fn user_message(&self) -> String {
        match self {
            CheckoutError::NotReady(_) => "the store is not ready".into(),
            CheckoutError::PurchaseInProgress(_) => "a purchase is already in progress".into(),
            CheckoutError::Store(_) => "the purchase could not be started".into(),
            CheckoutError::MissingReceipt(_) => "the purchase receipt was missing".into(),
            CheckoutError::VerificationRejected(_) | CheckoutError::VerificationTransport(_) => {
                "the purchase could not be verified".into()
            }
            CheckoutError::Config(_) => "checkout is not configured".into(),
            _ => "the purchase failed".into(),
        }
    }
}

impl From<anyhow::Error> for CheckoutError {
    fn from(err: anyhow::Error) -> Self {
        CheckoutError::Other(err.to_string())
    }
}
