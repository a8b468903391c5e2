//! Backend seams of the cart and checkout.
//!
//! [`crate::api::ApiClient`] implements both traits against the REST
//! backend; tests use in-memory fakes.

use std::future::Future;

use tienda_core::{ProductId, Quantity};

use super::store::Cart;
use crate::api::ApiError;
use crate::checkout::{Order, OrderRequest};

/// Cart operations of the backend.
pub trait CartBackend: Send + Sync {
    /// Fetch the authoritative cart.
    fn fetch_cart(&self) -> impl Future<Output = Result<Cart, ApiError>> + Send;

    /// Add `quantity` units of a product.
    fn add_item(
        &self,
        product_id: &ProductId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Set the quantity of one line.
    fn update_quantity(
        &self,
        product_id: &ProductId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Remove one line.
    fn remove_item(&self, product_id: &ProductId)
    -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Remove every line.
    fn clear_cart(&self) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Move a line to the saved-for-later list.
    fn save_for_later(&self, product_id: &ProductId)
    -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Move a saved product back into the cart with `quantity` units.
    fn move_to_cart(
        &self,
        product_id: &ProductId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// Order operations of the backend.
pub trait OrderBackend: Send + Sync {
    /// Create an order from the server-side cart.
    fn create_order(
        &self,
        request: &OrderRequest,
    ) -> impl Future<Output = Result<Order, ApiError>> + Send;

    /// Orders of the logged-in user, newest first.
    fn list_orders(&self) -> impl Future<Output = Result<Vec<Order>, ApiError>> + Send;
}
