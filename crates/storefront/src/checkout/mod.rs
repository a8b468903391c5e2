//! Checkout: turns the cart into an order once every edit is saved.

mod order;

pub use order::{
    CheckoutDetails, Order, OrderRequest, OrderTotals, PaymentMethod, PaymentSetup, PlacedOrder,
    ShippingAddress,
};

use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::instrument;

use crate::api::ApiError;
use crate::cart::{
    CartBackend, CartError, CartSession, ItemFailure, Notification, Notifier, OrderBackend,
};
use crate::error::add_breadcrumb;

/// Reasons checkout refuses or fails.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Some cart edits could not be saved; no order was created.
    #[error("{}", UnresolvedList(.0))]
    UnresolvedItems(Vec<ItemFailure>),

    #[error("The cart is empty")]
    EmptyCart,

    /// Required shipping fields are blank.
    #[error("Missing shipping details: {}", .0.join(", "))]
    InvalidAddress(Vec<&'static str>),

    #[error("Not logged in")]
    NotAuthenticated,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Cart(CartError),
}

impl From<CartError> for CheckoutError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::NotAuthenticated => Self::NotAuthenticated,
            CartError::Api(err) => Self::Api(err),
            other => Self::Cart(other),
        }
    }
}

struct UnresolvedList<'a>(&'a [ItemFailure]);

impl fmt::Display for UnresolvedList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cart item(s) could not be updated: ", self.0.len())?;
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

impl<B, N> CartSession<B, N>
where
    B: CartBackend + OrderBackend,
    N: Notifier,
{
    /// Create an order from the cart.
    ///
    /// Pending edits are flushed first. If any of them is still unsaved
    /// afterwards, no order is created and the error names every affected
    /// item. The totals sent are computed here from the stored cart.
    ///
    /// A payment-provider error in the response does not fail the checkout:
    /// the order exists, the user is notified and
    /// [`PaymentSetup::Failed`] is returned.
    ///
    /// # Errors
    ///
    /// See [`CheckoutError`].
    #[instrument(skip(self, details), fields(payment_method = %details.payment_method))]
    pub async fn checkout(
        &self,
        details: &CheckoutDetails,
        tax_rate: Decimal,
    ) -> Result<PlacedOrder, CheckoutError> {
        self.ensure_authenticated()?;

        let missing = details.address.missing_fields();
        if !missing.is_empty() {
            return Err(CheckoutError::InvalidAddress(missing));
        }

        if self.has_pending_edits() {
            self.flush().await?;
        }

        let subtotal = {
            let state = self.state();
            let unresolved = state.unresolved();
            if !unresolved.is_empty() {
                tracing::warn!(items = unresolved.len(), "Checkout blocked by unsaved cart edits");
                return Err(CheckoutError::UnresolvedItems(unresolved));
            }
            if state.store.cart().is_empty() {
                return Err(CheckoutError::EmptyCart);
            }
            state.store.total()
        };

        let totals = OrderTotals::compute(subtotal, tax_rate);
        let request = OrderRequest::new(details, &totals);
        add_breadcrumb(
            "checkout",
            "Order submitted",
            Some(&[("payment_method", details.payment_method.as_str())]),
        );

        let order = self
            .backend
            .create_order(&request)
            .await
            .map_err(|err| CheckoutError::from(self.backend_failure(err)))?;
        tracing::info!(order_id = %order.id, total = %totals.total, "Order created");

        match &order.payment {
            PaymentSetup::Failed(message) => {
                tracing::warn!(order_id = %order.id, error = %message, "Payment setup failed");
                self.notifier.notify(Notification::PaymentSetupFailed {
                    message: message.clone(),
                });
            }
            PaymentSetup::Missing => {
                tracing::warn!(
                    order_id = %order.id,
                    "No payment redirect returned for online payment"
                );
            }
            PaymentSetup::NotRequired | PaymentSetup::Redirect(_) => {}
        }

        if let Err(err) = self.refresh().await {
            tracing::warn!(error = %err, "Cart refresh after checkout failed");
        }

        Ok(PlacedOrder { order, totals })
    }

    /// Orders of the logged-in user.
    ///
    /// # Errors
    ///
    /// Returns an error if not logged in or the backend call fails.
    #[instrument(skip(self))]
    pub async fn orders(&self) -> Result<Vec<Order>, CheckoutError> {
        self.ensure_authenticated()?;
        self.backend
            .list_orders()
            .await
            .map_err(|err| CheckoutError::from(self.backend_failure(err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tienda_core::ProductId;

    #[test]
    fn test_unresolved_items_names_every_item() {
        let err = CheckoutError::UnresolvedItems(vec![
            ItemFailure {
                product_id: ProductId::new("a"),
                product_name: "Remera Blanca".to_string(),
                message: "Stock insuficiente".to_string(),
            },
            ItemFailure {
                product_id: ProductId::new("b"),
                product_name: "Remera Negra".to_string(),
                message: "timeout".to_string(),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "2 cart item(s) could not be updated: Remera Blanca: Stock insuficiente; Remera Negra: timeout"
        );
    }

    #[test]
    fn test_invalid_address_lists_fields() {
        let err = CheckoutError::InvalidAddress(vec!["city", "phone"]);
        assert_eq!(err.to_string(), "Missing shipping details: city, phone");
    }

    #[test]
    fn test_cart_errors_map_to_checkout_errors() {
        assert!(matches!(
            CheckoutError::from(CartError::NotAuthenticated),
            CheckoutError::NotAuthenticated
        ));
        assert!(matches!(
            CheckoutError::from(CartError::Api(ApiError::Unauthorized)),
            CheckoutError::Api(ApiError::Unauthorized)
        ));
    }
}
