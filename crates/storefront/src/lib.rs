//! Tienda storefront client library.
//!
//! Client-side cart for the Tienda multi-tenant shop backend: quantity
//! edits render instantly from a local buffer and are reconciled with the
//! backend on flush, before checkout, or in the background.
//!
//! # Example
//!
//! ```rust,ignore
//! use tienda_storefront::{ApiClient, CartSession, LogNotifier, Session, StorefrontConfig};
//!
//! let config = StorefrontConfig::from_env()?;
//! let session = Session::authenticated(token);
//! let client = ApiClient::new(&config, session.clone())?;
//! let cart = CartSession::new(client, LogNotifier, session);
//!
//! cart.refresh().await?;
//! cart.set_pending_quantity(&product_id, 3)?;
//! let report = cart.flush().await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod session;

pub use api::{ApiClient, ApiError};
pub use cart::{
    Cart, CartBackend, CartError, CartLine, CartSession, EditState, FlushOutcome, FlushReport,
    ItemFailure, LogNotifier, Notification, Notifier, OrderBackend,
};
pub use checkout::{CheckoutDetails, CheckoutError, PaymentMethod, PlacedOrder, ShippingAddress};
pub use config::StorefrontConfig;
pub use error::{Error, Result};
pub use session::Session;
