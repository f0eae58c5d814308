//! Purchase Request Coordinator
//!
//! Public entry points for native purchases. Enforces single-flight
//! discipline through the correlation slot, starts the native purchase
//! dialog, and owns the timeout policy. Every path out of a purchase call
//! terminates in a [`CheckoutResult`]; nothing here returns an error to
//! the caller.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use checkout_core::{CheckoutResult, Platform, ProductCatalog, ProductId, PurchaseKind};
use tokio::task::JoinHandle;

use crate::bridge::EventBridge;
use crate::connection::StoreConnection;
use crate::request::{PurchaseRequestBuilder, builder_for};
use crate::slot::CorrelationSlot;
use crate::transport::StoreTransport;
use crate::verify::ReceiptVerifier;

const MSG_IN_PROGRESS: &str = "a purchase is already in progress";
const MSG_NOT_READY: &str = "the store is not ready";
const MSG_PENDING: &str =
    "your purchase is being processed; you will be notified when it completes";

/// Engine configuration
#[derive(Clone, Debug)]
pub struct CheckoutConfig {
    /// Which native store we are talking to
    pub platform: Platform,

    /// How long a purchase may wait for a terminal store event before
    /// resolving `pending`
    pub purchase_timeout: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            platform: Platform::Ios,
            purchase_timeout: Duration::from_secs(120),
        }
    }
}

impl CheckoutConfig {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            ..Default::default()
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Self {
        let platform = match std::env::var("CHECKOUT_PLATFORM").as_deref() {
            Ok("android") => Platform::Android,
            _ => Platform::Ios,
        };
        let purchase_timeout = std::env::var("CHECKOUT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map_or(Duration::from_secs(120), Duration::from_secs);

        Self {
            platform,
            purchase_timeout,
        }
    }
}

/// Native purchase reconciliation engine
///
/// Turns the store's asynchronous, unordered, possibly-duplicated
/// callback events into one deterministic result per purchase request.
pub struct CheckoutEngine {
    config: CheckoutConfig,
    transport: Arc<dyn StoreTransport>,
    connection: Arc<StoreConnection>,
    slot: Arc<CorrelationSlot>,
    builder: Box<dyn PurchaseRequestBuilder>,
    bridge: Mutex<Option<JoinHandle<()>>>,
    verifier: Arc<dyn ReceiptVerifier>,
}

impl CheckoutEngine {
    pub fn new(
        transport: Arc<dyn StoreTransport>,
        verifier: Arc<dyn ReceiptVerifier>,
        config: CheckoutConfig,
    ) -> Self {
        let connection = Arc::new(StoreConnection::new(transport.clone()));
        Self {
            builder: builder_for(config.platform),
            config,
            transport,
            connection,
            slot: Arc::new(CorrelationSlot::new()),
            bridge: Mutex::new(None),
            verifier,
        }
    }

    /// Open the store connection, load the catalog for both product
    /// classes, and start the event bridge. Idempotent if already
    /// connected. Failure is non-fatal: the engine stays "not ready" and
    /// purchase calls fail fast instead of panicking or throwing.
    pub async fn connect(
        &self,
        subscription_skus: &[ProductId],
        consumable_skus: &[ProductId],
    ) -> checkout_core::Result<()> {
        self.connection
            .open(subscription_skus, consumable_skus)
            .await?;

        let mut bridge = self.bridge.lock().unwrap();
        if bridge.is_none() {
            let events = self.transport.subscribe();
            let task = EventBridge::new(
                self.config.platform,
                self.slot.clone(),
                self.connection.clone(),
                self.transport.clone(),
                self.verifier.clone(),
            );
            *bridge = Some(tokio::spawn(task.run(events)));
        }
        Ok(())
    }

    /// Tear down at process exit: stop the bridge, fail any purchase
    /// still waiting, release the store channel.
    pub async fn disconnect(&self) -> checkout_core::Result<()> {
        if let Some(task) = self.bridge.lock().unwrap().take() {
            task.abort();
        }
        if let Some(record) = self.slot.claim_any() {
            record.resolve(CheckoutResult::failed("the store connection was closed"));
        }
        self.connection.close().await
    }

    pub fn is_ready(&self) -> bool {
        self.connection.is_ready()
    }

    /// Session catalog snapshot for display purposes
    pub fn catalog(&self) -> Option<ProductCatalog> {
        self.connection.catalog()
    }

    /// Purchase a recurring entitlement
    pub async fn purchase_subscription(&self, sku: impl Into<ProductId>) -> CheckoutResult {
        self.purchase(sku.into(), PurchaseKind::Subscription).await
    }

    /// Purchase a one-time consumable
    pub async fn purchase_consumable(&self, sku: impl Into<ProductId>) -> CheckoutResult {
        self.purchase(sku.into(), PurchaseKind::Consumable).await
    }

    async fn purchase(&self, sku: ProductId, kind: PurchaseKind) -> CheckoutResult {
        // No queueing, no stacking: a held guard rejects before any store
        // interaction.
        if self.slot.is_in_flight() {
            tracing::warn!(sku = %sku, "purchase rejected: another purchase in flight");
            return CheckoutResult::failed(MSG_IN_PROGRESS);
        }
        if !self.connection.is_ready() {
            tracing::warn!(sku = %sku, "purchase rejected: store not ready");
            return CheckoutResult::failed(MSG_NOT_READY);
        }

        let Some(handle) = self.slot.begin(sku.clone(), kind) else {
            // Lost the race to another caller between check and begin.
            return CheckoutResult::failed(MSG_IN_PROGRESS);
        };

        tracing::info!(sku = %sku, kind = kind.as_str(), "starting native purchase");
        let params = self.builder.build(&sku, kind);
        if let Err(e) = self.transport.request_purchase(&params).await {
            // Synchronous store failure (e.g. malformed SKU): tear the
            // record down before anyone waits on it.
            tracing::warn!(sku = %sku, error = %e, "store rejected purchase request");
            drop(self.slot.claim(&sku));
            return CheckoutResult::failed(e.user_message());
        }

        match tokio::time::timeout(self.config.purchase_timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                // Resolver dropped without sending: engine shut down
                // under us.
                drop(self.slot.claim(&sku));
                CheckoutResult::failed("the store connection was closed")
            }
            Err(_) => {
                // Deliberate non-guess: the store may still complete this
                // purchase out-of-band. Release the slot so later events
                // for it become no-ops and the engine stays usable.
                tracing::warn!(sku = %sku, "no store event within timeout window");
                drop(self.slot.claim(&sku));
                CheckoutResult::pending(MSG_PENDING)
            }
        }
    }
}
