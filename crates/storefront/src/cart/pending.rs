//! Pending-Edit Buffer: quantities the user set but the backend has not
//! confirmed yet.

use tienda_core::{ProductId, Quantity, QuantityError};

/// Where a buffered edit is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingStatus {
    /// Set locally, not yet sent.
    Dirty,
    /// Sent in the flush currently in flight.
    Flushing,
    /// Last flush was rejected; kept for retry.
    Failed { message: String },
}

/// A buffered quantity edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEdit {
    pub quantity: Quantity,
    pub status: PendingStatus,
}

/// Insertion-ordered map of product id to desired quantity.
///
/// Last write wins per product. Mutation is synchronous; callers hold the
/// buffer behind the cart state lock.
#[derive(Debug, Clone, Default)]
pub struct PendingEdits {
    entries: Vec<(ProductId, PendingEdit)>,
}

impl PendingEdits {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or overwrite the desired quantity for a product.
    ///
    /// Quantities below 1 are rejected and leave the buffer unchanged. A new
    /// value resets the entry to [`PendingStatus::Dirty`].
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError`] if `quantity` is not a valid cart quantity.
    pub fn set(&mut self, product_id: ProductId, quantity: i64) -> Result<Quantity, QuantityError> {
        let quantity = Quantity::new(quantity)?;
        let edit = PendingEdit {
            quantity,
            status: PendingStatus::Dirty,
        };
        if let Some((_, existing)) = self.entries.iter_mut().find(|(id, _)| *id == product_id) {
            *existing = edit;
        } else {
            self.entries.push((product_id, edit));
        }
        Ok(quantity)
    }

    /// Drop the edit for a product, returning it if there was one.
    pub fn clear(&mut self, product_id: &ProductId) -> Option<PendingEdit> {
        let index = self.entries.iter().position(|(id, _)| id == product_id)?;
        Some(self.entries.remove(index).1)
    }

    /// Drop every edit.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// `(product id, desired quantity)` pairs in insertion order.
    ///
    /// Each call starts a fresh pass over the current contents.
    pub fn entries(&self) -> impl Iterator<Item = (&ProductId, Quantity)> + '_ {
        self.entries.iter().map(|(id, edit)| (id, edit.quantity))
    }

    #[must_use]
    pub fn get(&self, product_id: &ProductId) -> Option<&PendingEdit> {
        self.entries
            .iter()
            .find(|(id, _)| id == product_id)
            .map(|(_, edit)| edit)
    }

    pub(crate) fn get_mut(&mut self, product_id: &ProductId) -> Option<&mut PendingEdit> {
        self.entries
            .iter_mut()
            .find(|(id, _)| id == product_id)
            .map(|(_, edit)| edit)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&ProductId, &mut PendingEdit)> {
        self.entries.iter_mut().map(|(id, edit)| (&*id, edit))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let mut edits = PendingEdits::new();
        edits.set(ProductId::new("a"), 2).unwrap();
        edits.set(ProductId::new("a"), 5).unwrap();

        let entries: Vec<_> = edits.entries().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1.get(), 5);
    }

    #[test]
    fn test_rejects_below_one() {
        let mut edits = PendingEdits::new();
        edits.set(ProductId::new("a"), 2).unwrap();

        assert!(matches!(
            edits.set(ProductId::new("a"), 0),
            Err(QuantityError::BelowOne(0))
        ));
        assert!(edits.set(ProductId::new("b"), -3).is_err());

        assert_eq!(edits.len(), 1);
        assert_eq!(edits.get(&ProductId::new("a")).unwrap().quantity.get(), 2);
    }

    #[test]
    fn test_overwrite_resets_failed_status() {
        let mut edits = PendingEdits::new();
        let id = ProductId::new("a");
        edits.set(id.clone(), 2).unwrap();
        edits.get_mut(&id).unwrap().status = PendingStatus::Failed {
            message: "Stock insuficiente".to_string(),
        };

        edits.set(id.clone(), 1).unwrap();
        assert_eq!(edits.get(&id).unwrap().status, PendingStatus::Dirty);
    }

    #[test]
    fn test_entries_keep_insertion_order_and_restart() {
        let mut edits = PendingEdits::new();
        edits.set(ProductId::new("b"), 1).unwrap();
        edits.set(ProductId::new("a"), 1).unwrap();
        edits.set(ProductId::new("b"), 4).unwrap();

        let first: Vec<_> = edits.entries().map(|(id, _)| id.as_str().to_string()).collect();
        let second: Vec<_> = edits.entries().map(|(id, _)| id.as_str().to_string()).collect();
        assert_eq!(first, vec!["b", "a"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_clear_and_reset() {
        let mut edits = PendingEdits::new();
        edits.set(ProductId::new("a"), 1).unwrap();
        edits.set(ProductId::new("b"), 1).unwrap();

        assert!(edits.clear(&ProductId::new("a")).is_some());
        assert!(edits.clear(&ProductId::new("a")).is_none());
        assert_eq!(edits.len(), 1);

        edits.reset();
        assert!(edits.is_empty());
    }
}
