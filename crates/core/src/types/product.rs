//! Denormalized product data carried on cart lines.
//!
//! # On-sale rule
//!
//! A product is on sale when it carries a previous price strictly greater
//! than its current price. The discount percentage is derived from those two
//! prices; a stored percentage is only consulted when no previous price is
//! known, and on its own never marks the product as on sale.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// Product attributes as last fetched with the cart.
///
/// May go stale relative to the catalog; the cart refetch refreshes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    /// Current catalog price.
    pub price: Decimal,
    /// Price before the current promotion, if any.
    pub previous_price: Option<Decimal>,
    /// Discount percentage stored by the backend.
    pub stored_discount: Option<u8>,
    /// First image reference.
    pub image: Option<String>,
}

impl ProductSnapshot {
    /// Create a snapshot with only the fields the cart needs.
    #[must_use]
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            previous_price: None,
            stored_discount: None,
            image: None,
        }
    }

    /// Whether the product is currently discounted.
    #[must_use]
    pub fn is_on_sale(&self) -> bool {
        self.previous_price.is_some_and(|prev| prev > self.price)
    }

    /// Discount percentage to display, rounded to the nearest whole percent.
    #[must_use]
    pub fn discount_percent(&self) -> Option<u8> {
        match self.previous_price {
            Some(prev) if prev > self.price && prev > Decimal::ZERO => {
                let pct = ((prev - self.price) / prev * Decimal::ONE_HUNDRED)
                    .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
                pct.to_u8()
            }
            Some(_) => None,
            None => self.stored_discount.filter(|pct| *pct > 0 && *pct < 100),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shirt(price: i64) -> ProductSnapshot {
        ProductSnapshot::new("p1", "Remera lisa", Decimal::from(price))
    }

    #[test]
    fn test_not_on_sale_without_previous_price() {
        let mut product = shirt(100);
        product.stored_discount = Some(20);
        assert!(!product.is_on_sale());
        assert_eq!(product.discount_percent(), Some(20));
    }

    #[test]
    fn test_on_sale_with_higher_previous_price() {
        let mut product = shirt(75);
        product.previous_price = Some(Decimal::from(100));
        assert!(product.is_on_sale());
        assert_eq!(product.discount_percent(), Some(25));
    }

    #[test]
    fn test_previous_price_not_higher_is_not_a_sale() {
        let mut product = shirt(100);
        product.previous_price = Some(Decimal::from(100));
        product.stored_discount = Some(10);
        assert!(!product.is_on_sale());
        assert_eq!(product.discount_percent(), None);
    }

    #[test]
    fn test_discount_rounds_to_whole_percent() {
        let mut product = shirt(2);
        product.previous_price = Some(Decimal::from(3));
        assert_eq!(product.discount_percent(), Some(33));
    }
}
