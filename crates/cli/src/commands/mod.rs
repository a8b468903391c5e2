//! Command implementations.
//!
//! Output goes through `tracing` so it lands in the same stream as the
//! library's own logs.

pub mod cart;
pub mod orders;

use tienda_core::{Price, ProductId};
use tienda_storefront::{ApiClient, CartSession, LogNotifier, Session, StorefrontConfig};

/// Cart session backed by the REST client, reporting through the log.
pub type Storefront = CartSession<ApiClient, LogNotifier>;

/// Build the client and a cart session from configuration.
///
/// Without `TIENDA_API_TOKEN` the session is anonymous and every command
/// is refused locally.
///
/// # Errors
///
/// Returns error if the HTTP client fails to build.
pub fn connect(config: &StorefrontConfig) -> tienda_storefront::Result<Storefront> {
    let session = config
        .api_token
        .clone()
        .map_or_else(Session::anonymous, Session::authenticated);
    if !session.is_authenticated() {
        tracing::warn!("TIENDA_API_TOKEN is not set; log in to get a token first");
    }
    let client = ApiClient::new(config, session.clone())?;
    Ok(CartSession::new(client, LogNotifier, session))
}

fn price(config: &StorefrontConfig, amount: rust_decimal::Decimal) -> Price {
    Price::new(amount, config.currency)
}

fn product_id(raw: &str) -> ProductId {
    ProductId::new(raw.trim())
}
