//! Cart Store: the cart as last synchronized with the backend.

use rust_decimal::Decimal;
use tienda_core::{ProductId, ProductSnapshot, Quantity};

/// One line of the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub product: ProductSnapshot,
    pub quantity: Quantity,
    /// Unit price captured at the last sync.
    pub unit_price: Decimal,
}

impl CartLine {
    #[must_use]
    pub const fn new(product: ProductSnapshot, quantity: Quantity, unit_price: Decimal) -> Self {
        Self {
            product,
            quantity,
            unit_price,
        }
    }

    #[must_use]
    pub const fn product_id(&self) -> &ProductId {
        &self.product.id
    }

    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * self.quantity.as_decimal()
    }
}

/// Cart aggregate.
///
/// Lines are unique by product id and keep the order the backend sent them
/// in. The total is computed whenever the lines change and cannot be set
/// from outside, so it always equals the sum of the line totals.
///
/// Products saved for later travel with the cart but never count towards
/// the total.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    items: Vec<CartLine>,
    total: Decimal,
    saved: Vec<ProductSnapshot>,
}

impl Cart {
    /// Empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a cart from lines, merging duplicate product ids.
    ///
    /// A duplicate keeps the position and snapshot of its first occurrence
    /// and the quantity and price of its last one.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut items: Vec<CartLine> = Vec::new();
        for line in lines {
            if let Some(existing) = items
                .iter_mut()
                .find(|l| l.product_id() == line.product_id())
            {
                tracing::debug!(product_id = %line.product_id(), "Merging duplicate cart line");
                existing.quantity = line.quantity;
                existing.unit_price = line.unit_price;
            } else {
                items.push(line);
            }
        }
        let total = Self::sum(&items);
        Self {
            items,
            total,
            saved: Vec::new(),
        }
    }

    /// Attach the saved-for-later list, dropping duplicate product ids.
    #[must_use]
    pub fn with_saved(mut self, saved: impl IntoIterator<Item = ProductSnapshot>) -> Self {
        self.saved.clear();
        for product in saved {
            if !self.saved.iter().any(|p| p.id == product.id) {
                self.saved.push(product);
            }
        }
        self
    }

    fn sum(items: &[CartLine]) -> Decimal {
        items.iter().map(CartLine::line_total).sum()
    }

    #[must_use]
    pub fn items(&self) -> &[CartLine] {
        &self.items
    }

    #[must_use]
    pub const fn total(&self) -> Decimal {
        self.total
    }

    /// Products saved for later, outside the cart total.
    #[must_use]
    pub fn saved(&self) -> &[ProductSnapshot] {
        &self.saved
    }

    #[must_use]
    pub fn is_saved(&self, product_id: &ProductId) -> bool {
        self.saved.iter().any(|p| &p.id == product_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.items.iter().find(|l| l.product_id() == product_id)
    }

    /// Sum of quantities across lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|l| u64::from(l.quantity.get())).sum()
    }

    /// Copy of this cart with one line's quantity changed.
    ///
    /// Unknown product ids leave the cart as is.
    #[must_use]
    pub fn with_quantity(&self, product_id: &ProductId, quantity: Quantity) -> Self {
        Self::from_lines(self.items.iter().cloned().map(|mut line| {
            if line.product_id() == product_id {
                line.quantity = quantity;
            }
            line
        }))
        .with_saved(self.saved.iter().cloned())
    }

    /// Copy of this cart without one line.
    #[must_use]
    pub fn without(&self, product_id: &ProductId) -> Self {
        Self::from_lines(
            self.items
                .iter()
                .filter(|l| l.product_id() != product_id)
                .cloned(),
        )
        .with_saved(self.saved.iter().cloned())
    }

    /// Copy of this cart with one line moved to the saved-for-later list.
    ///
    /// Unknown product ids leave the cart as is.
    #[must_use]
    pub fn with_line_saved(&self, product_id: &ProductId) -> Self {
        let Some(line) = self.line(product_id) else {
            return self.clone();
        };
        let product = line.product.clone();
        self.without(product_id)
            .with_saved(self.saved.iter().cloned().chain([product]))
    }
}

/// Holder of the current [`Cart`].
///
/// Only ever swapped whole; the reconciler is its single writer.
#[derive(Debug, Default)]
pub struct CartStore {
    cart: Cart,
}

impl CartStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a new cart.
    pub fn replace(&mut self, cart: Cart) {
        self.cart = cart;
    }

    pub fn clear(&mut self) {
        self.cart = Cart::empty();
    }

    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    #[must_use]
    pub fn items(&self) -> &[CartLine] {
        self.cart.items()
    }

    #[must_use]
    pub const fn total(&self) -> Decimal {
        self.cart.total()
    }

    /// Server-confirmed quantity of a product, if it is in the cart.
    #[must_use]
    pub fn quantity(&self, product_id: &ProductId) -> Option<Quantity> {
        self.cart.line(product_id).map(|l| l.quantity)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: &str, qty: i64, price: i64) -> CartLine {
        let price = Decimal::from(price);
        CartLine::new(
            ProductSnapshot::new(id, format!("Remera {id}"), price),
            Quantity::new(qty).unwrap(),
            price,
        )
    }

    fn recomputed(cart: &Cart) -> Decimal {
        cart.items()
            .iter()
            .map(|l| l.unit_price * Decimal::from(l.quantity.get()))
            .sum()
    }

    #[test]
    fn test_total_matches_lines() {
        let cart = Cart::from_lines([line("a", 2, 10), line("b", 1, 5)]);
        assert_eq!(cart.total(), Decimal::from(25));
        assert_eq!(cart.total(), recomputed(&cart));
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn test_duplicate_lines_are_merged() {
        let cart = Cart::from_lines([line("a", 2, 10), line("b", 1, 5), line("a", 4, 10)]);
        assert_eq!(cart.len(), 2);
        assert_eq!(cart.items()[0].product_id().as_str(), "a");
        assert_eq!(cart.items()[0].quantity.get(), 4);
        assert_eq!(cart.total(), recomputed(&cart));
    }

    #[test]
    fn test_with_quantity_and_without_keep_total_consistent() {
        let cart = Cart::from_lines([line("a", 2, 10), line("b", 1, 5)]);
        let a = ProductId::new("a");

        let bumped = cart.with_quantity(&a, Quantity::new(3).unwrap());
        assert_eq!(bumped.total(), Decimal::from(35));
        assert_eq!(bumped.total(), recomputed(&bumped));

        let removed = bumped.without(&a);
        assert_eq!(removed.total(), Decimal::from(5));
        assert!(removed.line(&a).is_none());

        let untouched = cart.with_quantity(&ProductId::new("zzz"), Quantity::ONE);
        assert_eq!(untouched, cart);
    }

    #[test]
    fn test_saved_items_stay_out_of_total() {
        let cart = Cart::from_lines([line("a", 2, 10), line("b", 1, 5)]);
        let b = ProductId::new("b");

        let saved = cart.with_line_saved(&b);
        assert_eq!(saved.total(), Decimal::from(20));
        assert!(saved.line(&b).is_none());
        assert!(saved.is_saved(&b));

        let bumped = saved.with_quantity(&ProductId::new("a"), Quantity::new(3).unwrap());
        assert_eq!(bumped.saved().len(), 1);
        assert_eq!(bumped.total(), recomputed(&bumped));

        assert_eq!(cart.with_line_saved(&ProductId::new("zzz")), cart);
    }

    #[test]
    fn test_store_replace_and_clear() {
        let mut store = CartStore::new();
        assert_eq!(store.total(), Decimal::ZERO);

        store.replace(Cart::from_lines([line("a", 2, 10)]));
        assert_eq!(store.quantity(&ProductId::new("a")).map(Quantity::get), Some(2));
        assert_eq!(store.total(), Decimal::from(20));

        store.clear();
        assert!(store.items().is_empty());
        assert_eq!(store.total(), Decimal::ZERO);
    }
}
