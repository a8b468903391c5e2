//! Checkout gating, order totals and order history.
//!
//! Run with: cargo test -p tienda-integration-tests

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tienda_integration_tests::{
    Call, FakeBackend, Failure, backend_with_a_and_b, checkout_details, drain, id, logged_in,
};
use tienda_storefront::cart::{CartSession, Notification};
use tienda_storefront::checkout::{PaymentMethod, PaymentSetup};
use tienda_storefront::{CheckoutError, Session};

fn tax_rate() -> Decimal {
    Decimal::new(10, 2)
}

#[tokio::test]
async fn test_checkout_flushes_before_creating_order() {
    let (cart, _rx) = logged_in(backend_with_a_and_b()).await;
    cart.set_pending_quantity(&id("a"), 3).unwrap();

    let placed = cart.checkout(&checkout_details(), tax_rate()).await.unwrap();

    let calls = cart.backend().calls();
    let update_at = calls
        .iter()
        .position(|c| matches!(c, Call::UpdateQuantity(..)))
        .unwrap();
    let order_at = calls.iter().position(|c| *c == Call::CreateOrder).unwrap();
    assert!(update_at < order_at);

    assert_eq!(placed.totals.subtotal, Decimal::from(35));
    assert_eq!(placed.totals.tax, Decimal::new(350, 2));
    assert_eq!(placed.totals.total, Decimal::new(3850, 2));
    assert_eq!(placed.order.payment, PaymentSetup::NotRequired);

    let request = &cart.backend().order_requests()[0];
    assert_eq!(request.subtotal, Decimal::from(35));
    assert_eq!(request.shipping, Decimal::ZERO);
    assert_eq!(request.discount, Decimal::ZERO);
    assert_eq!(request.payment_method, PaymentMethod::Transferencia);
    assert_eq!(request.shipping_address.country, "Argentina");
}

#[tokio::test]
async fn test_checkout_waits_for_background_flush() {
    let backend = backend_with_a_and_b().with_update_delay(Duration::from_millis(200));
    let (cart, _rx) = logged_in(backend).await;
    let cart = Arc::new(cart);

    cart.set_pending_quantity(&id("a"), 3).unwrap();
    let background = cart.spawn_flush();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let placed = cart.checkout(&checkout_details(), tax_rate()).await.unwrap();

    assert_eq!(placed.totals.subtotal, Decimal::from(35));
    assert_eq!(cart.backend().update_calls(), vec![(id("a"), 3)]);
    assert_eq!(cart.backend().order_requests().len(), 1);
    background.await.unwrap();
}

#[tokio::test]
async fn test_residual_failures_abort_checkout() {
    let backend = backend_with_a_and_b();
    backend.fail_updates("a", Failure::Rejected("Stock insuficiente".to_string()));
    backend.fail_updates("b", Failure::Unavailable);
    let (cart, _rx) = logged_in(backend).await;

    cart.set_pending_quantity(&id("a"), 30).unwrap();
    cart.set_pending_quantity(&id("b"), 2).unwrap();

    let err = cart
        .checkout(&checkout_details(), tax_rate())
        .await
        .unwrap_err();

    let CheckoutError::UnresolvedItems(failures) = &err else {
        panic!("expected UnresolvedItems, got {err:?}");
    };
    let names: Vec<_> = failures.iter().map(|f| f.product_name.as_str()).collect();
    assert_eq!(names, vec!["Remera Blanca", "Remera Negra"]);

    let message = err.to_string();
    assert!(message.contains("Remera Blanca: Stock insuficiente"));
    assert!(message.contains("Remera Negra"));

    assert!(!cart.backend().calls().contains(&Call::CreateOrder));
    assert!(cart.has_pending_edits());
}

#[tokio::test]
async fn test_checkout_succeeds_after_retry() {
    let backend = backend_with_a_and_b();
    backend.fail_updates("b", Failure::Unavailable);
    let (cart, _rx) = logged_in(backend).await;
    cart.set_pending_quantity(&id("b"), 2).unwrap();

    assert!(cart.checkout(&checkout_details(), tax_rate()).await.is_err());

    cart.backend().allow_updates("b");
    let placed = cart.checkout(&checkout_details(), tax_rate()).await.unwrap();
    assert_eq!(placed.totals.subtotal, Decimal::from(30));
}

#[tokio::test]
async fn test_empty_cart_is_refused() {
    let (cart, _rx) = logged_in(FakeBackend::new()).await;

    let err = cart
        .checkout(&checkout_details(), tax_rate())
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::EmptyCart));
    assert!(!cart.backend().calls().contains(&Call::CreateOrder));
}

#[tokio::test]
async fn test_incomplete_address_is_refused_before_any_call() {
    let (cart, _rx) = logged_in(backend_with_a_and_b()).await;
    cart.set_pending_quantity(&id("a"), 3).unwrap();
    let calls_before = cart.backend().calls().len();

    let mut details = checkout_details();
    details.address.postal_code = String::new();
    details.address.phone = "   ".to_string();

    let err = cart.checkout(&details, tax_rate()).await.unwrap_err();

    match err {
        CheckoutError::InvalidAddress(fields) => assert_eq!(fields, vec!["postal_code", "phone"]),
        other => panic!("expected InvalidAddress, got {other:?}"),
    }
    assert_eq!(cart.backend().calls().len(), calls_before);
    assert!(cart.has_pending_edits());
}

#[tokio::test]
async fn test_anonymous_checkout_is_refused() {
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let cart = CartSession::new(backend_with_a_and_b(), tx, Session::anonymous());

    let err = cart
        .checkout(&checkout_details(), tax_rate())
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::NotAuthenticated));
    assert!(cart.backend().calls().is_empty());
}

#[tokio::test]
async fn test_mercadopago_redirect_is_returned() {
    let (cart, _rx) = logged_in(backend_with_a_and_b()).await;
    let mut details = checkout_details();
    details.payment_method = PaymentMethod::MercadoPago;

    let placed = cart.checkout(&details, tax_rate()).await.unwrap();

    assert_eq!(
        placed.order.payment.redirect_url(),
        Some("https://mp.example.com/checkout/1")
    );
    // Backend empties the cart once the order exists
    assert!(cart.cart().is_empty());
}

#[tokio::test]
async fn test_payment_setup_failure_still_places_order() {
    let (cart, mut rx) = logged_in(backend_with_a_and_b()).await;
    cart.backend()
        .set_payment_setup(PaymentSetup::Failed("Credenciales inválidas".to_string()));
    let mut details = checkout_details();
    details.payment_method = PaymentMethod::MercadoPago;

    let placed = cart.checkout(&details, tax_rate()).await.unwrap();

    assert_eq!(placed.order.id.as_str(), "order-1");
    assert!(drain(&mut rx).contains(&Notification::PaymentSetupFailed {
        message: "Credenciales inválidas".to_string(),
    }));
}

#[tokio::test]
async fn test_order_rejection_is_surfaced() {
    let (cart, _rx) = logged_in(backend_with_a_and_b()).await;
    cart.backend()
        .fail_orders(Some(Failure::Rejected("Producto sin stock".to_string())));

    let err = cart
        .checkout(&checkout_details(), tax_rate())
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::Api(_)));
    assert!(err.to_string().contains("Producto sin stock"));
    assert_eq!(cart.total(), Decimal::from(25));
}

#[tokio::test]
async fn test_order_history_lists_newest_first() {
    let (cart, _rx) = logged_in(backend_with_a_and_b()).await;
    cart.checkout(&checkout_details(), tax_rate()).await.unwrap();
    cart.add_item(&id("c"), 2).await.unwrap();
    cart.checkout(&checkout_details(), tax_rate()).await.unwrap();

    let orders = cart.orders().await.unwrap();

    let ids: Vec<_> = orders.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["order-2", "order-1"]);
    assert_eq!(orders[1].total, Some(Decimal::new(2750, 2)));
}
