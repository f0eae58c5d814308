//! Receipt Verification Client
//!
//! One round trip to the backend: send the raw receipt or purchase token,
//! get back a verified/not-verified verdict plus product classification.
//! The engine never acknowledges a purchase with the store until this
//! verdict is a success: the backend must durably record the entitlement
//! before the store is told the purchase is consumed.

use async_trait::async_trait;
use checkout_core::{CheckoutError, Platform, ProductId, Result};
use serde::{Deserialize, Serialize};

use crate::transport::{PurchaseUpdate, Receipt};

/// Verification request wire shape
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub platform: Platform,
    pub product_id: ProductId,
    pub transaction_id: String,

    /// iOS receipt blob
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,

    /// Android purchase token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_token: Option<String>,
}

impl VerifyRequest {
    /// Build from a delivered purchase event and its receipt
    pub fn from_update(platform: Platform, update: &PurchaseUpdate, receipt: &Receipt) -> Self {
        let (ios_receipt, purchase_token) = match receipt {
            Receipt::Ios(blob) => (Some(blob.clone()), None),
            Receipt::Android(token) => (None, Some(token.clone())),
        };
        Self {
            platform,
            product_id: update.product_id.clone(),
            transaction_id: update.transaction_id.clone(),
            receipt: ios_receipt,
            purchase_token,
        }
    }
}

/// Verification response wire shape
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,

    #[serde(default)]
    pub product_type: Option<String>,
}

/// Backend receipt verifier
#[async_trait]
pub trait ReceiptVerifier: Send + Sync {
    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse>;
}

/// HTTP receipt verifier posting to the backend verification endpoint
pub struct HttpReceiptVerifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpReceiptVerifier {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var("CHECKOUT_VERIFY_URL")
            .map_err(|_| CheckoutError::Config("CHECKOUT_VERIFY_URL not set".into()))?;
        Ok(Self::new(endpoint))
    }

    /// Use a preconfigured reqwest client (custom timeouts, proxies)
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ReceiptVerifier for HttpReceiptVerifier {
    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| CheckoutError::VerificationTransport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CheckoutError::VerificationTransport(format!(
                "verification endpoint returned {}",
                response.status()
            )));
        }

        response
            .json::<VerifyResponse>()
            .await
            .map_err(|e| CheckoutError::VerificationTransport(e.to_string()))
    }
}
