//! `tienda checkout` and `tienda orders`.

use tienda_storefront::checkout::PaymentSetup;
use tienda_storefront::{CheckoutDetails, StorefrontConfig};

use super::{Storefront, price};

/// Flush pending edits and place the order.
pub async fn checkout(
    cart: &Storefront,
    config: &StorefrontConfig,
    details: &CheckoutDetails,
) -> tienda_storefront::Result<()> {
    cart.refresh().await?;
    let placed = cart.checkout(details, config.tax_rate).await?;

    let totals = placed.totals;
    tracing::info!(
        order_id = %placed.order.id,
        "Order placed: subtotal {}, tax {}, total {}",
        price(config, totals.subtotal),
        price(config, totals.tax),
        price(config, totals.total),
    );

    match &placed.order.payment {
        PaymentSetup::Redirect(url) => tracing::info!("Complete payment at {url}"),
        PaymentSetup::NotRequired => {
            tracing::info!("Pay by {} on delivery or transfer", details.payment_method);
        }
        PaymentSetup::Failed(_) | PaymentSetup::Missing => {
            tracing::warn!("Payment link unavailable; the order is saved and can be paid later");
        }
    }
    Ok(())
}

pub async fn list(cart: &Storefront, config: &StorefrontConfig) -> tienda_storefront::Result<()> {
    let orders = cart.orders().await?;
    if orders.is_empty() {
        tracing::info!("No orders yet");
        return Ok(());
    }

    for order in &orders {
        let placed = order
            .created_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let total = order
            .total
            .map(|t| price(config, t).to_string())
            .unwrap_or_default();
        let method = order
            .payment_method
            .map(|m| m.to_string())
            .unwrap_or_default();
        tracing::info!(
            order_id = %order.id,
            "{placed} {} / payment {} {method} {total}",
            order.status,
            order.payment_status,
        );
    }
    Ok(())
}
