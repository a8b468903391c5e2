//! Client-side cart with optimistic quantity edits.
//!
//! The cart is split in three parts:
//!
//! - [`CartStore`] holds the cart as last confirmed by the backend.
//! - [`PendingEdits`] holds quantities the user changed but that have not
//!   been sent yet. Rendering reads it first, so edits show instantly.
//! - The reconciler ([`CartSession::flush`]) sends one update per buffered
//!   edit, drops the edits that went through, keeps the rejected ones for
//!   retry and replaces the store with a fresh server cart.
//!
//! [`CartSession`] owns all three for one logged-in user and raises
//! [`Notification`]s for everything the user should hear about.

mod backend;
mod notify;
mod pending;
mod reconcile;
mod service;
mod store;

pub use backend::{CartBackend, OrderBackend};
pub use notify::{LogNotifier, Notification, NotificationLevel, Notifier};
pub use pending::{PendingEdit, PendingEdits, PendingStatus};
pub use reconcile::{
    CartState, EditState, FlushOutcome, FlushReport, ItemFailure, UpdateOutcome,
    apply_flush_result, apply_pending_edit, begin_flush,
};
pub use service::CartSession;
pub use store::{Cart, CartLine, CartStore};

use thiserror::Error;
use tienda_core::{ProductId, QuantityError};

use crate::api::ApiError;

/// Errors returned by cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Quantity below 1 (or too large); nothing was recorded or sent.
    #[error("Invalid quantity for {product_id}: {source}")]
    InvalidQuantity {
        product_id: ProductId,
        source: QuantityError,
    },

    /// Quantity edit for a product that is not in the cart.
    #[error("Product {0} is not in the cart")]
    UnknownItem(ProductId),

    /// No user is logged in; no request was sent.
    #[error("Not logged in")]
    NotAuthenticated,

    /// Backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl CartError {
    /// Message suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}
