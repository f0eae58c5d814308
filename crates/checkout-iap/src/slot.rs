//! Single-Slot Correlation Mailbox
//!
//! Exactly one purchase may be in flight engine-wide. The slot holds the
//! correlation state for that purchase and rejects a second `begin` while
//! occupied, so single-flight is a structural property of this type rather
//! than a convention spread across the coordinator. Occupancy doubles as
//! the in-flight guard.
//!
//! The slot is two-phase: `begin` puts it in the waiting state, and a
//! successful `claim` moves it to processing rather than vacating it. The
//! guard therefore stays held across the verification round trip and is
//! released only when the claim is resolved or torn down, which is the
//! single exit point for every purchase attempt.

use chrono::{DateTime, Utc};
use std::sync::Mutex;
use tokio::sync::oneshot;

use checkout_core::{CheckoutResult, ProductId, PurchaseKind};

/// The in-flight purchase: which SKU we asked for and how to wake the
/// caller that asked.
#[derive(Debug)]
struct CorrelationRecord {
    product_id: ProductId,
    kind: PurchaseKind,
    created_at: DateTime<Utc>,
    resolver: oneshot::Sender<CheckoutResult>,
}

#[derive(Debug, Default)]
enum SlotState {
    #[default]
    Idle,

    /// Request issued, no event claimed yet
    Waiting(CorrelationRecord),

    /// Record claimed for verification; resolution pending
    Processing,
}

/// A record taken out of the slot for resolution
///
/// While this exists the slot reads as in flight, so a concurrent
/// purchase is still rejected during verification. Resolving (or
/// dropping, on teardown paths) vacates the slot.
pub struct ClaimedRecord<'a> {
    slot: &'a CorrelationSlot,
    product_id: ProductId,
    kind: PurchaseKind,
    created_at: DateTime<Utc>,
    resolver: Option<oneshot::Sender<CheckoutResult>>,
}

impl ClaimedRecord<'_> {
    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn kind(&self) -> PurchaseKind {
        self.kind
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Vacate the slot, then wake the original caller. Consumes the
    /// claim, so a purchase can be resolved at most once; if the caller
    /// already gave up (timeout) the send fails and the result is
    /// dropped. Vacating first lets a caller woken by this result start
    /// its next purchase without racing the guard release.
    pub fn resolve(mut self, result: CheckoutResult) {
        self.slot.vacate();
        if let Some(resolver) = self.resolver.take() {
            if resolver.send(result).is_err() {
                tracing::debug!(
                    product_id = %self.product_id,
                    "caller no longer waiting; dropping resolution"
                );
            }
        }
    }
}

impl Drop for ClaimedRecord<'_> {
    fn drop(&mut self) {
        // A claim torn down without resolving (timeout teardown,
        // synchronous store failure) releases the guard here; the caller,
        // if still waiting, is woken by the dropped sender.
        self.slot.vacate();
    }
}

/// Single-slot mailbox with a reject-when-occupied policy
#[derive(Default)]
pub struct CorrelationSlot {
    inner: Mutex<SlotState>,
}

impl CorrelationSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a correlation. Returns the caller's wait handle, or `None`
    /// if a purchase is already in flight (waiting or processing).
    pub fn begin(
        &self,
        product_id: ProductId,
        kind: PurchaseKind,
    ) -> Option<oneshot::Receiver<CheckoutResult>> {
        let mut state = self.inner.lock().unwrap();
        if !matches!(*state, SlotState::Idle) {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        *state = SlotState::Waiting(CorrelationRecord {
            product_id,
            kind,
            created_at: Utc::now(),
            resolver: tx,
        });
        Some(rx)
    }

    /// Claim the record if it matches the given SKU, moving the slot to
    /// processing. A mismatch leaves the record in place: stale
    /// redeliveries for unrelated SKUs must not disturb the active
    /// purchase.
    pub fn claim(&self, product_id: &ProductId) -> Option<ClaimedRecord<'_>> {
        let mut state = self.inner.lock().unwrap();
        if !matches!(&*state, SlotState::Waiting(record) if &record.product_id == product_id) {
            return None;
        }
        let SlotState::Waiting(record) = std::mem::replace(&mut *state, SlotState::Processing)
        else {
            return None;
        };
        Some(self.claimed(record))
    }

    /// Claim the record regardless of SKU (error events, teardown)
    pub fn claim_any(&self) -> Option<ClaimedRecord<'_>> {
        let mut state = self.inner.lock().unwrap();
        if !matches!(*state, SlotState::Waiting(_)) {
            return None;
        }
        let SlotState::Waiting(record) = std::mem::replace(&mut *state, SlotState::Processing)
        else {
            return None;
        };
        Some(self.claimed(record))
    }

    pub fn is_in_flight(&self) -> bool {
        !matches!(*self.inner.lock().unwrap(), SlotState::Idle)
    }

    fn claimed(&self, record: CorrelationRecord) -> ClaimedRecord<'_> {
        ClaimedRecord {
            slot: self,
            product_id: record.product_id,
            kind: record.kind,
            created_at: record.created_at,
            resolver: Some(record.resolver),
        }
    }

    /// Processing -> Idle. A no-op in any other state, so a late drop of
    /// an already-resolved claim cannot clobber a newly begun purchase.
    fn vacate(&self) {
        let mut state = self.inner.lock().unwrap();
        if matches!(*state, SlotState::Processing) {
            *state = SlotState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_core::CheckoutStatus;

    #[test]
    fn test_second_begin_rejected() {
        let slot = CorrelationSlot::new();
        let rx = slot.begin("tip_5".into(), PurchaseKind::Consumable);
        assert!(rx.is_some());
        assert!(
            slot.begin("pro_monthly".into(), PurchaseKind::Subscription)
                .is_none()
        );
    }

    #[test]
    fn test_claim_requires_sku_match() {
        let slot = CorrelationSlot::new();
        let _rx = slot.begin("tip_5".into(), PurchaseKind::Consumable).unwrap();

        assert!(slot.claim(&"other_sku".into()).is_none());
        assert!(slot.is_in_flight());

        assert!(slot.claim(&"tip_5".into()).is_some());
    }

    #[test]
    fn test_slot_stays_in_flight_while_claimed() {
        let slot = CorrelationSlot::new();
        let _rx = slot.begin("tip_5".into(), PurchaseKind::Consumable).unwrap();

        let record = slot.claim(&"tip_5".into()).unwrap();

        // still guarded during processing: no new begin, no double claim
        assert!(slot.is_in_flight());
        assert!(
            slot.begin("pro_monthly".into(), PurchaseKind::Subscription)
                .is_none()
        );
        assert!(slot.claim(&"tip_5".into()).is_none());

        record.resolve(CheckoutResult::success());
        assert!(!slot.is_in_flight());
    }

    #[tokio::test]
    async fn test_resolve_wakes_waiter_once() {
        let slot = CorrelationSlot::new();
        let rx = slot.begin("tip_5".into(), PurchaseKind::Consumable).unwrap();

        let record = slot.claim_any().unwrap();
        record.resolve(CheckoutResult::cancelled());

        let result = rx.await.unwrap();
        assert_eq!(result.status, CheckoutStatus::Cancelled);

        // slot is empty now; a late claim is a no-op
        assert!(slot.claim(&"tip_5".into()).is_none());
        assert!(!slot.is_in_flight());
    }

    #[tokio::test]
    async fn test_dropped_claim_releases_guard_and_wakes_waiter() {
        let slot = CorrelationSlot::new();
        let rx = slot.begin("tip_5".into(), PurchaseKind::Consumable).unwrap();

        drop(slot.claim_any());

        assert!(!slot.is_in_flight());
        assert!(rx.await.is_err());
    }

    #[test]
    fn test_resolve_after_waiter_gone_is_noop() {
        let slot = CorrelationSlot::new();
        let rx = slot.begin("tip_5".into(), PurchaseKind::Consumable).unwrap();
        drop(rx);

        let record = slot.claim_any().unwrap();
        // must not panic
        record.resolve(CheckoutResult::success());
    }
}
