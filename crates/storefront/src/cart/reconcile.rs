//! State transitions of the reconciler.
//!
//! Everything here is synchronous and free of I/O: the async driver in
//! [`super::CartSession`] snapshots the buffer with [`begin_flush`], performs
//! the requests without holding any lock, and feeds the outcomes back through
//! [`apply_flush_result`].

use std::fmt;

use rust_decimal::Decimal;
use tienda_core::{ProductId, Quantity};

use super::CartError;
use super::pending::{PendingEdits, PendingStatus};
use super::store::{Cart, CartStore};

/// Position of a product in the per-edit state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    /// No pending edit; display shows the server quantity.
    Clean,
    /// Edited locally, waiting for a flush.
    Dirty,
    /// Update request in flight.
    Flushing,
    /// Update rejected; the intended quantity stays buffered for retry while
    /// the display shows the server quantity.
    DirtyFailed,
}

/// Cart Store plus Pending-Edit Buffer, owned by one cart session.
#[derive(Debug, Default)]
pub struct CartState {
    pub store: CartStore,
    pub pending: PendingEdits,
}

impl CartState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session with an empty cart and no edits.
    pub fn init(&mut self) {
        self.store.clear();
        self.pending.reset();
    }

    /// End a session (logout or expired token).
    pub fn teardown(&mut self) {
        self.store.clear();
        self.pending.reset();
    }

    #[must_use]
    pub fn edit_state(&self, product_id: &ProductId) -> EditState {
        match self.pending.get(product_id).map(|edit| &edit.status) {
            None => EditState::Clean,
            Some(PendingStatus::Dirty) => EditState::Dirty,
            Some(PendingStatus::Flushing) => EditState::Flushing,
            Some(PendingStatus::Failed { .. }) => EditState::DirtyFailed,
        }
    }

    /// Quantity to render for a product.
    ///
    /// A pending edit wins unless its last flush failed, in which case the
    /// server quantity is shown.
    #[must_use]
    pub fn display_quantity(&self, product_id: &ProductId) -> Option<Quantity> {
        match self.pending.get(product_id) {
            Some(edit) if !matches!(edit.status, PendingStatus::Failed { .. }) => {
                Some(edit.quantity)
            }
            _ => self.store.quantity(product_id),
        }
    }

    /// Quantity the user asked for, even if the backend rejected it.
    #[must_use]
    pub fn intended_quantity(&self, product_id: &ProductId) -> Option<Quantity> {
        self.pending
            .get(product_id)
            .map(|edit| edit.quantity)
            .or_else(|| self.store.quantity(product_id))
    }

    /// Total with display quantities overlaid on the stored lines.
    #[must_use]
    pub fn display_total(&self) -> Decimal {
        self.store
            .items()
            .iter()
            .map(|line| {
                let quantity = self
                    .display_quantity(line.product_id())
                    .unwrap_or(line.quantity);
                line.unit_price * quantity.as_decimal()
            })
            .sum()
    }

    fn product_name(&self, product_id: &ProductId) -> String {
        self.store.cart().line(product_id).map_or_else(
            || product_id.to_string(),
            |line| line.product.name.clone(),
        )
    }

    /// Failures for every edit that is failed or not yet sent, in buffer
    /// order. Edits in flight are not counted.
    #[must_use]
    pub fn unresolved(&self) -> Vec<ItemFailure> {
        self.pending
            .entries()
            .filter_map(|(id, _)| {
                let message = match &self.pending.get(id)?.status {
                    PendingStatus::Failed { message } => message.clone(),
                    PendingStatus::Dirty => "change not saved yet".to_string(),
                    PendingStatus::Flushing => return None,
                };
                Some(ItemFailure {
                    product_id: id.clone(),
                    product_name: self.product_name(id),
                    message,
                })
            })
            .collect()
    }
}

/// Record a local quantity edit.
///
/// No network call is involved. The product must already be in the cart and
/// the quantity must be at least 1; otherwise the buffer is left unchanged.
///
/// # Errors
///
/// Returns [`CartError::UnknownItem`] or [`CartError::InvalidQuantity`].
pub fn apply_pending_edit(
    state: &mut CartState,
    product_id: &ProductId,
    quantity: i64,
) -> Result<EditState, CartError> {
    if state.store.quantity(product_id).is_none() {
        return Err(CartError::UnknownItem(product_id.clone()));
    }
    state
        .pending
        .set(product_id.clone(), quantity)
        .map_err(|source| CartError::InvalidQuantity {
            product_id: product_id.clone(),
            source,
        })?;
    Ok(EditState::Dirty)
}

/// Snapshot the edits to send and mark them in flight.
///
/// Edits already in flight from a concurrent flush are skipped.
pub fn begin_flush(state: &mut CartState) -> Vec<(ProductId, Quantity)> {
    state
        .pending
        .iter_mut()
        .filter(|(_, edit)| edit.status != PendingStatus::Flushing)
        .map(|(id, edit)| {
            edit.status = PendingStatus::Flushing;
            (id.clone(), edit.quantity)
        })
        .collect()
}

/// Result of one per-item update request.
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub product_id: ProductId,
    /// Quantity that was sent.
    pub quantity: Quantity,
    /// `Err` carries the user-facing failure message.
    pub result: Result<(), String>,
}

/// Fold the settled update requests and the refetched cart into the state.
///
/// - A success removes the edit, unless the user changed it again while the
///   request was in flight.
/// - A failure keeps the edit and marks it failed, so the display falls back
///   to the server quantity. A failure for a value the user has since
///   changed again is not reported; the newer value is still buffered.
/// - `refreshed` replaces the store. When the refetch failed, the store gets
///   the successful quantities patched in instead.
/// - Edits for products no longer in the refreshed cart are dropped.
pub fn apply_flush_result(
    state: &mut CartState,
    outcomes: Vec<UpdateOutcome>,
    refreshed: Option<Cart>,
) -> FlushReport {
    let mut report = FlushReport {
        cart_refreshed: refreshed.is_some(),
        ..FlushReport::default()
    };

    for outcome in outcomes {
        let in_flight = state.pending.get(&outcome.product_id).is_some_and(|edit| {
            edit.status == PendingStatus::Flushing && edit.quantity == outcome.quantity
        });

        match outcome.result {
            Ok(()) => {
                if in_flight {
                    state.pending.clear(&outcome.product_id);
                }
                if refreshed.is_none() {
                    let patched = state
                        .store
                        .cart()
                        .with_quantity(&outcome.product_id, outcome.quantity);
                    state.store.replace(patched);
                }
                report.updated.push(outcome.product_id);
            }
            Err(message) => {
                if !in_flight {
                    tracing::debug!(
                        product_id = %outcome.product_id,
                        "Ignoring failure for superseded edit"
                    );
                    continue;
                }
                if let Some(edit) = state.pending.get_mut(&outcome.product_id) {
                    edit.status = PendingStatus::Failed {
                        message: message.clone(),
                    };
                }
                report.failed.push(ItemFailure {
                    product_name: state.product_name(&outcome.product_id),
                    product_id: outcome.product_id,
                    message,
                });
            }
        }
    }

    if let Some(cart) = refreshed {
        let stale: Vec<ProductId> = state
            .pending
            .entries()
            .filter(|(id, _)| cart.line(id).is_none())
            .map(|(id, _)| id.clone())
            .collect();
        for id in stale {
            tracing::debug!(product_id = %id, "Dropping edit for product no longer in cart");
            state.pending.clear(&id);
        }
        state.store.replace(cart);
    }

    report
}

/// An item whose update did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub product_id: ProductId,
    pub product_name: String,
    pub message: String,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.product_name, self.message)
    }
}

/// Coarse result of a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Buffer was empty; no requests were made.
    NothingToFlush,
    Success,
    PartialFailure,
    FullFailure,
}

/// Per-item detail of a flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub updated: Vec<ProductId>,
    pub failed: Vec<ItemFailure>,
    /// Whether the store was replaced with a fresh server cart.
    pub cart_refreshed: bool,
}

impl FlushReport {
    #[must_use]
    pub fn outcome(&self) -> FlushOutcome {
        match (self.updated.is_empty(), self.failed.is_empty()) {
            (true, true) => FlushOutcome::NothingToFlush,
            (_, true) => FlushOutcome::Success,
            (true, false) => FlushOutcome::FullFailure,
            (false, false) => FlushOutcome::PartialFailure,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cart::store::CartLine;
    use tienda_core::ProductSnapshot;

    fn line(id: &str, qty: i64, price: i64) -> CartLine {
        let price = Decimal::from(price);
        CartLine::new(
            ProductSnapshot::new(id, format!("Remera {id}"), price),
            Quantity::new(qty).unwrap(),
            price,
        )
    }

    fn state_with_a_and_b() -> CartState {
        let mut state = CartState::new();
        state
            .store
            .replace(Cart::from_lines([line("a", 2, 10), line("b", 1, 5)]));
        state
    }

    fn ok(id: &str, qty: i64) -> UpdateOutcome {
        UpdateOutcome {
            product_id: ProductId::new(id),
            quantity: Quantity::new(qty).unwrap(),
            result: Ok(()),
        }
    }

    fn failed(id: &str, qty: i64, message: &str) -> UpdateOutcome {
        UpdateOutcome {
            product_id: ProductId::new(id),
            quantity: Quantity::new(qty).unwrap(),
            result: Err(message.to_string()),
        }
    }

    #[test]
    fn test_pending_edit_overlays_display() {
        let mut state = state_with_a_and_b();
        let a = ProductId::new("a");

        assert_eq!(state.edit_state(&a), EditState::Clean);
        assert_eq!(apply_pending_edit(&mut state, &a, 3).unwrap(), EditState::Dirty);

        assert_eq!(state.display_quantity(&a).map(Quantity::get), Some(3));
        assert_eq!(state.display_total(), Decimal::from(35));
        assert_eq!(state.store.total(), Decimal::from(25));
    }

    #[test]
    fn test_invalid_edit_leaves_buffer_unchanged() {
        let mut state = state_with_a_and_b();
        let b = ProductId::new("b");

        let err = apply_pending_edit(&mut state, &b, 0).unwrap_err();
        assert!(matches!(err, CartError::InvalidQuantity { .. }));
        assert!(state.pending.is_empty());

        let err = apply_pending_edit(&mut state, &ProductId::new("zzz"), 2).unwrap_err();
        assert!(matches!(err, CartError::UnknownItem(_)));
        assert!(state.pending.is_empty());
    }

    #[test]
    fn test_flush_success_replaces_store_and_empties_buffer() {
        let mut state = state_with_a_and_b();
        let a = ProductId::new("a");
        apply_pending_edit(&mut state, &a, 3).unwrap();

        let batch = begin_flush(&mut state);
        assert_eq!(batch.len(), 1);
        assert_eq!(state.edit_state(&a), EditState::Flushing);

        let refreshed = Cart::from_lines([line("a", 3, 10), line("b", 1, 5)]);
        let report = apply_flush_result(&mut state, vec![ok("a", 3)], Some(refreshed));

        assert_eq!(report.outcome(), FlushOutcome::Success);
        assert!(state.pending.is_empty());
        assert_eq!(state.store.total(), Decimal::from(35));
        assert_eq!(state.edit_state(&a), EditState::Clean);
    }

    #[test]
    fn test_failed_item_rolls_back_display_and_keeps_intent() {
        let mut state = state_with_a_and_b();
        let a = ProductId::new("a");
        let b = ProductId::new("b");
        apply_pending_edit(&mut state, &a, 3).unwrap();
        apply_pending_edit(&mut state, &b, 4).unwrap();
        begin_flush(&mut state);

        let refreshed = Cart::from_lines([line("a", 3, 10), line("b", 1, 5)]);
        let report = apply_flush_result(
            &mut state,
            vec![ok("a", 3), failed("b", 4, "Stock insuficiente")],
            Some(refreshed),
        );

        assert_eq!(report.outcome(), FlushOutcome::PartialFailure);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].product_name, "Remera b");
        assert_eq!(report.failed[0].to_string(), "Remera b: Stock insuficiente");

        assert_eq!(state.edit_state(&b), EditState::DirtyFailed);
        assert_eq!(state.display_quantity(&b).map(Quantity::get), Some(1));
        assert_eq!(state.intended_quantity(&b).map(Quantity::get), Some(4));
        assert_eq!(state.pending.len(), 1);
    }

    #[test]
    fn test_edit_during_flush_is_preserved() {
        let mut state = state_with_a_and_b();
        let a = ProductId::new("a");
        apply_pending_edit(&mut state, &a, 3).unwrap();
        begin_flush(&mut state);

        apply_pending_edit(&mut state, &a, 7).unwrap();

        let refreshed = Cart::from_lines([line("a", 3, 10), line("b", 1, 5)]);
        apply_flush_result(&mut state, vec![ok("a", 3)], Some(refreshed));

        assert_eq!(state.edit_state(&a), EditState::Dirty);
        assert_eq!(state.display_quantity(&a).map(Quantity::get), Some(7));
    }

    #[test]
    fn test_failure_of_superseded_edit_is_not_reported() {
        let mut state = state_with_a_and_b();
        let a = ProductId::new("a");
        apply_pending_edit(&mut state, &a, 3).unwrap();
        begin_flush(&mut state);

        apply_pending_edit(&mut state, &a, 4).unwrap();

        let refreshed = Cart::from_lines([line("a", 2, 10), line("b", 1, 5)]);
        let report =
            apply_flush_result(&mut state, vec![failed("a", 3, "Stock insuficiente")], Some(refreshed));

        assert!(report.failed.is_empty());
        assert_eq!(state.edit_state(&a), EditState::Dirty);
        assert_eq!(state.display_quantity(&a).map(Quantity::get), Some(4));
    }

    #[test]
    fn test_in_flight_edits_are_not_unresolved() {
        let mut state = state_with_a_and_b();
        apply_pending_edit(&mut state, &ProductId::new("a"), 3).unwrap();
        begin_flush(&mut state);
        assert!(state.unresolved().is_empty());

        apply_pending_edit(&mut state, &ProductId::new("b"), 2).unwrap();
        let unresolved = state.unresolved();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].message, "change not saved yet");
    }

    #[test]
    fn test_concurrent_flush_skips_in_flight_edits() {
        let mut state = state_with_a_and_b();
        apply_pending_edit(&mut state, &ProductId::new("a"), 3).unwrap();
        assert_eq!(begin_flush(&mut state).len(), 1);

        apply_pending_edit(&mut state, &ProductId::new("b"), 2).unwrap();
        let second = begin_flush(&mut state);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].0.as_str(), "b");
    }

    #[test]
    fn test_refetch_failure_patches_successful_items() {
        let mut state = state_with_a_and_b();
        let a = ProductId::new("a");
        apply_pending_edit(&mut state, &a, 3).unwrap();
        begin_flush(&mut state);

        let report = apply_flush_result(&mut state, vec![ok("a", 3)], None);

        assert!(!report.cart_refreshed);
        assert_eq!(state.store.quantity(&a).map(Quantity::get), Some(3));
        assert_eq!(state.store.total(), Decimal::from(35));
    }

    #[test]
    fn test_all_failed_is_full_failure() {
        let mut state = state_with_a_and_b();
        apply_pending_edit(&mut state, &ProductId::new("a"), 3).unwrap();
        begin_flush(&mut state);

        let report = apply_flush_result(&mut state, vec![failed("a", 3, "timeout")], None);
        assert_eq!(report.outcome(), FlushOutcome::FullFailure);
        assert_eq!(state.store.total(), Decimal::from(25));

        let unresolved = state.unresolved();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].message, "timeout");
    }

    #[test]
    fn test_edits_for_vanished_products_are_dropped() {
        let mut state = state_with_a_and_b();
        apply_pending_edit(&mut state, &ProductId::new("b"), 2).unwrap();
        begin_flush(&mut state);

        let refreshed = Cart::from_lines([line("a", 2, 10)]);
        apply_flush_result(&mut state, vec![failed("b", 2, "Producto no encontrado")], Some(refreshed));

        assert!(state.pending.is_empty());
    }

    #[test]
    fn test_empty_report_is_nothing_to_flush() {
        assert_eq!(FlushReport::default().outcome(), FlushOutcome::NothingToFlush);
    }

    #[test]
    fn test_teardown_clears_everything() {
        let mut state = state_with_a_and_b();
        apply_pending_edit(&mut state, &ProductId::new("a"), 3).unwrap();
        state.teardown();
        assert!(state.store.items().is_empty());
        assert!(state.pending.is_empty());
        assert_eq!(state.display_total(), Decimal::ZERO);
    }
}
