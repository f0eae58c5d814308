//! Mock Store Transport
//!
//! For testing and demo purposes. Records every call, serves fixture
//! products, injects failures, and delivers scripted events to
//! subscribers, either on demand or automatically when a purchase is
//! requested.

use async_trait::async_trait;
use checkout_core::{CheckoutError, Product, ProductId, PurchaseKind, Result};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{PurchaseUpdate, Receipt, StoreEvent, StoreTransport};
use crate::request::PurchaseParams;

/// Mock store transport with scripted event delivery
#[derive(Default)]
pub struct MockStoreTransport {
    products: Mutex<Vec<Product>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<StoreEvent>>>,
    scripted: Mutex<Vec<StoreEvent>>,

    fail_open: AtomicBool,
    fail_request: AtomicBool,

    open_calls: AtomicUsize,
    close_calls: AtomicUsize,
    fetch_calls: Mutex<Vec<(Vec<ProductId>, PurchaseKind)>>,
    requests: Mutex<Vec<PurchaseParams>>,
    finished: Mutex<Vec<(String, bool)>>,
}

impl MockStoreTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with fixture products served by `fetch_products`
    pub fn with_products(products: Vec<Product>) -> Self {
        let transport = Self::new();
        *transport.products.lock().unwrap() = products;
        transport
    }

    /// Make `open` fail (engine should stay "not ready")
    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Make `request_purchase` fail synchronously (e.g. malformed SKU)
    pub fn set_fail_request_purchase(&self, fail: bool) {
        self.fail_request.store(fail, Ordering::SeqCst);
    }

    /// Queue events to be delivered when the next purchase is requested
    pub fn script_on_request(&self, events: Vec<StoreEvent>) {
        self.scripted.lock().unwrap().extend(events);
    }

    /// Deliver an event to every subscriber immediately
    pub fn deliver(&self, event: StoreEvent) {
        let subscribers = self.subscribers.lock().unwrap();
        for tx in subscribers.iter() {
            let _ = tx.send(event.clone());
        }
    }

    /// Deliver a purchase event with a freshly minted transaction id
    pub fn deliver_purchase(&self, sku: impl Into<ProductId>, receipt: Option<Receipt>) -> String {
        let transaction_id = Uuid::new_v4().to_string();
        self.deliver(StoreEvent::Purchase(PurchaseUpdate {
            product_id: sku.into(),
            transaction_id: transaction_id.clone(),
            receipt,
        }));
        transaction_id
    }

    pub fn open_count(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> Vec<(Vec<ProductId>, PurchaseKind)> {
        self.fetch_calls.lock().unwrap().clone()
    }

    pub fn purchase_requests(&self) -> Vec<PurchaseParams> {
        self.requests.lock().unwrap().clone()
    }

    /// `(transaction_id, is_consumable)` pairs acknowledged so far
    pub fn finished_transactions(&self) -> Vec<(String, bool)> {
        self.finished.lock().unwrap().clone()
    }
}

#[async_trait]
impl StoreTransport for MockStoreTransport {
    async fn open(&self) -> Result<()> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(CheckoutError::Store("billing unavailable".into()));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_products(
        &self,
        skus: &[ProductId],
        kind: PurchaseKind,
    ) -> Result<Vec<Product>> {
        self.fetch_calls
            .lock()
            .unwrap()
            .push((skus.to_vec(), kind));
        let products = self.products.lock().unwrap();
        Ok(products
            .iter()
            .filter(|p| skus.contains(&p.product_id))
            .cloned()
            .collect())
    }

    async fn request_purchase(&self, params: &PurchaseParams) -> Result<()> {
        if self.fail_request.load(Ordering::SeqCst) {
            return Err(CheckoutError::Store(format!(
                "invalid sku: {}",
                params.sku().map_or("unknown", ProductId::as_str)
            )));
        }
        self.requests.lock().unwrap().push(params.clone());
        let scripted: Vec<StoreEvent> = self.scripted.lock().unwrap().drain(..).collect();
        for event in scripted {
            self.deliver(event);
        }
        Ok(())
    }

    async fn finish_transaction(&self, transaction_id: &str, is_consumable: bool) -> Result<()> {
        self.finished
            .lock()
            .unwrap()
            .push((transaction_id.to_string(), is_consumable));
        Ok(())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<StoreEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }
}
