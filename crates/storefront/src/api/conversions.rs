//! Conversions from wire types to domain types.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tienda_core::{OrderId, ProductSnapshot, Quantity};
use tracing::warn;

use super::types::{CartLineResponse, CartResponse, OrderResponse, ProductResponse};
use crate::cart::{Cart, CartLine};
use crate::checkout::{Order, PaymentMethod, PaymentSetup};

/// Build the domain cart. The total is recomputed from the lines.
///
/// Lines whose product was deleted or whose quantity is invalid are skipped,
/// as are saved entries without a product.
pub fn convert_cart(cart: CartResponse) -> Cart {
    Cart::from_lines(cart.lines.into_iter().filter_map(convert_cart_line)).with_saved(
        cart.saved
            .into_iter()
            .filter_map(|item| item.product)
            .map(convert_product),
    )
}

fn convert_cart_line(line: CartLineResponse) -> Option<CartLine> {
    let Some(product) = line.product else {
        warn!("Skipping cart line without product");
        return None;
    };

    let quantity = match Quantity::new(line.quantity) {
        Ok(quantity) => quantity,
        Err(e) => {
            warn!(product_id = %product.id, error = %e, "Skipping cart line with invalid quantity");
            return None;
        }
    };

    let unit_price = line
        .unit_price
        .or(product.price)
        .unwrap_or(Decimal::ZERO);

    Some(CartLine::new(convert_product(product), quantity, unit_price))
}

fn convert_product(product: ProductResponse) -> ProductSnapshot {
    let stored_discount = product
        .discount
        .and_then(|d| d.round().to_u8())
        .filter(|d| (1..=99).contains(d));

    ProductSnapshot {
        id: product.id.into(),
        name: product.name,
        price: product.price.unwrap_or(Decimal::ZERO),
        previous_price: product.previous_price,
        stored_discount,
        image: product.images.into_iter().next().map(|img| img.into_url()),
    }
}

pub fn convert_order(order: OrderResponse) -> Order {
    let payment = match (&order.mercadopago, order.payment_method) {
        (Some(mp), _) if mp.has_error() => PaymentSetup::Failed(
            mp.message
                .clone()
                .or_else(|| mp.error.as_ref().and_then(|e| e.as_str()).map(String::from))
                .unwrap_or_else(|| "payment preference could not be created".to_string()),
        ),
        (Some(mp), _) => mp
            .init_point
            .clone()
            .or_else(|| mp.sandbox_init_point.clone())
            .map_or(PaymentSetup::Missing, PaymentSetup::Redirect),
        (None, Some(PaymentMethod::MercadoPago)) => PaymentSetup::Missing,
        (None, _) => PaymentSetup::NotRequired,
    };

    Order {
        id: OrderId::new(order.id),
        created_at: order.created_at,
        status: order.status,
        payment_status: order.payment_status,
        payment_method: order.payment_method,
        subtotal: order.subtotal,
        total: order.total,
        payment,
    }
}
