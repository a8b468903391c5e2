//! `tienda cart ...` commands.

use tienda_storefront::{FlushOutcome, StorefrontConfig};

use super::{Storefront, price, product_id};

/// Parse a `PRODUCT_ID=QUANTITY` argument.
///
/// # Errors
///
/// Returns a message if the pair is malformed. Quantity range is checked
/// later by the cart itself.
pub fn parse_edit(raw: &str) -> Result<(String, i64), String> {
    let (id, quantity) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected PRODUCT_ID=QUANTITY, got '{raw}'"))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("missing product id in '{raw}'"));
    }
    let quantity = quantity
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("invalid quantity in '{raw}': {e}"))?;
    Ok((id.to_string(), quantity))
}

/// Log every line and the total.
pub async fn show(cart: &Storefront, config: &StorefrontConfig) -> tienda_storefront::Result<()> {
    cart.refresh().await?;
    log_cart(cart, config);
    Ok(())
}

fn log_cart(cart: &Storefront, config: &StorefrontConfig) {
    let snapshot = cart.cart();
    if snapshot.is_empty() && snapshot.saved().is_empty() {
        tracing::info!("Cart is empty");
        return;
    }

    for line in snapshot.items() {
        let sale = line
            .product
            .discount_percent()
            .filter(|_| line.product.is_on_sale())
            .map(|pct| format!(" (-{pct}%)"))
            .unwrap_or_default();
        tracing::info!(
            product_id = %line.product_id(),
            "{} x{} @ {}{} = {}",
            line.product.name,
            line.quantity,
            price(config, line.unit_price),
            sale,
            price(config, line.unit_price).times(line.quantity),
        );
    }
    tracing::info!(
        items = snapshot.item_count(),
        "Total: {}",
        price(config, snapshot.total())
    );

    for product in snapshot.saved() {
        tracing::info!(
            product_id = %product.id,
            "Saved for later: {} @ {}",
            product.name,
            price(config, product.price),
        );
    }
}

pub async fn add(
    cart: &Storefront,
    config: &StorefrontConfig,
    raw_id: &str,
    quantity: i64,
) -> tienda_storefront::Result<()> {
    cart.refresh().await?;
    cart.add_item(&product_id(raw_id), quantity).await?;
    log_cart(cart, config);
    Ok(())
}

/// Buffer every edit, then flush them together.
///
/// Edits that are rejected locally are logged and skipped; the rest are
/// still saved.
pub async fn set(
    cart: &Storefront,
    config: &StorefrontConfig,
    edits: &[(String, i64)],
) -> tienda_storefront::Result<()> {
    cart.refresh().await?;

    for (raw_id, quantity) in edits {
        if let Err(e) = cart.set_pending_quantity(&product_id(raw_id), *quantity) {
            tracing::warn!(product_id = %raw_id, "Edit skipped: {}", e.user_message());
        }
    }
    tracing::info!("Pending total: {}", price(config, cart.display_total()));

    let report = cart.flush().await?;
    match report.outcome() {
        FlushOutcome::NothingToFlush => tracing::info!("Nothing to save"),
        FlushOutcome::Success => tracing::info!(updated = report.updated.len(), "All changes saved"),
        FlushOutcome::PartialFailure | FlushOutcome::FullFailure => {
            for failure in &report.failed {
                tracing::warn!(product_id = %failure.product_id, "Not saved: {failure}");
            }
        }
    }
    log_cart(cart, config);
    Ok(())
}

pub async fn remove(
    cart: &Storefront,
    config: &StorefrontConfig,
    raw_id: &str,
) -> tienda_storefront::Result<()> {
    cart.refresh().await?;
    cart.remove_item(&product_id(raw_id)).await?;
    log_cart(cart, config);
    Ok(())
}

pub async fn save(
    cart: &Storefront,
    config: &StorefrontConfig,
    raw_id: &str,
) -> tienda_storefront::Result<()> {
    cart.refresh().await?;
    cart.save_for_later(&product_id(raw_id)).await?;
    log_cart(cart, config);
    Ok(())
}

pub async fn restore(
    cart: &Storefront,
    config: &StorefrontConfig,
    raw_id: &str,
    quantity: i64,
) -> tienda_storefront::Result<()> {
    cart.refresh().await?;
    cart.move_to_cart(&product_id(raw_id), quantity).await?;
    log_cart(cart, config);
    Ok(())
}

pub async fn clear(cart: &Storefront) -> tienda_storefront::Result<()> {
    cart.clear_cart().await?;
    tracing::info!("Cart emptied");
    Ok(())
}
