//! Purchase Event Bridge
//!
//! Consumes the store's event streams for the lifetime of the connection
//! and correlates each event to the in-flight purchase, if any. Claiming
//! the correlation record before doing anything else is what makes
//! resolution exactly-once: duplicates and late redeliveries find an
//! empty slot and are dropped as expected traffic.

use std::sync::Arc;

use checkout_core::{CheckoutResult, Platform};
use tokio::sync::mpsc;

use crate::connection::StoreConnection;
use crate::slot::CorrelationSlot;
use crate::transport::{PurchaseFailure, PurchaseUpdate, StoreErrorCode, StoreEvent, StoreTransport};
use crate::verify::{ReceiptVerifier, VerifyRequest};

/// Bridges store events to the caller waiting on the correlation slot
pub struct EventBridge {
    platform: Platform,
    slot: Arc<CorrelationSlot>,
    connection: Arc<StoreConnection>,
    transport: Arc<dyn StoreTransport>,
    verifier: Arc<dyn ReceiptVerifier>,
}

impl EventBridge {
    pub fn new(
        platform: Platform,
        slot: Arc<CorrelationSlot>,
        connection: Arc<StoreConnection>,
        transport: Arc<dyn StoreTransport>,
        verifier: Arc<dyn ReceiptVerifier>,
    ) -> Self {
        Self {
            platform,
            slot,
            connection,
            transport,
            verifier,
        }
    }

    /// Event loop; runs until the transport drops its sender
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<StoreEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                StoreEvent::Purchase(update) => self.on_purchase(update).await,
                StoreEvent::Failure(failure) => self.on_failure(failure),
            }
        }
        tracing::debug!("store event stream closed");
    }

    async fn on_purchase(&self, update: PurchaseUpdate) {
        // Claim-or-ignore: no active record, or a record for a different
        // SKU, means this event is not ours (stale redelivery, cross-talk).
        let Some(record) = self.slot.claim(&update.product_id) else {
            tracing::trace!(
                product_id = %update.product_id,
                transaction_id = %update.transaction_id,
                "ignoring purchase event with no matching in-flight request"
            );
            return;
        };

        let Some(receipt) = update.receipt.as_ref() else {
            tracing::warn!(
                product_id = %update.product_id,
                transaction_id = %update.transaction_id,
                "purchase event carried no receipt"
            );
            record.resolve(CheckoutResult::failed("the purchase receipt was missing"));
            return;
        };

        let request = VerifyRequest::from_update(self.platform, &update, receipt);
        match self.verifier.verify(&request).await {
            Ok(response) if response.success => {
                let is_consumable = !self.connection.is_subscription(&update.product_id);
                if let Err(e) = self
                    .transport
                    .finish_transaction(&update.transaction_id, is_consumable)
                    .await
                {
                    // Entitlement is already recorded server-side; the
                    // store will re-present the un-acknowledged purchase.
                    tracing::warn!(
                        transaction_id = %update.transaction_id,
                        error = %e,
                        "finish_transaction failed after verified purchase"
                    );
                }
                let elapsed_ms = (chrono::Utc::now() - record.created_at()).num_milliseconds();
                tracing::info!(
                    product_id = %update.product_id,
                    transaction_id = %update.transaction_id,
                    kind = record.kind().as_str(),
                    is_consumable,
                    product_type = ?response.product_type,
                    elapsed_ms,
                    "purchase verified and finalized"
                );
                record.resolve(CheckoutResult::success_with_product_type(
                    response.product_type,
                ));
            }
            Ok(_) => {
                // Rejected: leave the store purchase un-acknowledged so
                // the platform can re-present it for retry/refund.
                tracing::warn!(
                    product_id = %update.product_id,
                    transaction_id = %update.transaction_id,
                    "backend rejected receipt"
                );
                record.resolve(CheckoutResult::failed("the purchase could not be verified"));
            }
            Err(e) => {
                tracing::warn!(
                    product_id = %update.product_id,
                    transaction_id = %update.transaction_id,
                    error = %e,
                    "receipt verification failed"
                );
                record.resolve(CheckoutResult::failed(e.user_message()));
            }
        }
    }

    fn on_failure(&self, failure: PurchaseFailure) {
        let Some(record) = self.slot.claim_any() else {
            tracing::trace!(
                code = ?failure.code,
                "ignoring store error with no in-flight request"
            );
            return;
        };

        if failure.code == StoreErrorCode::UserCancelled {
            tracing::info!(product_id = %record.product_id(), "purchase cancelled by user");
            record.resolve(CheckoutResult::cancelled());
        } else {
            // Raw store error text is logged, never surfaced.
            tracing::warn!(
                product_id = %record.product_id(),
                code = ?failure.code,
                store_message = %failure.message,
                "store reported purchase failure"
            );
            record.resolve(CheckoutResult::failed("the purchase failed"));
        }
    }
}
