//! Integration tests for the Tienda storefront client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p tienda-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_reconciliation` - Cart store, pending edits and flush
//! - `checkout` - Checkout gating, totals and order history
//!
//! The tests drive a real [`CartSession`] against [`FakeBackend`], an
//! in-memory backend that records every call and can be told to reject
//! individual products.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rust_decimal::Decimal;
use tienda_core::{OrderId, OrderStatus, PaymentStatus, ProductId, ProductSnapshot, Quantity};
use tienda_storefront::cart::{Cart, CartBackend, CartLine, CartSession, Notification, OrderBackend};
use tienda_storefront::checkout::{
    CheckoutDetails, Order, OrderRequest, PaymentMethod, PaymentSetup, ShippingAddress,
};
use tienda_storefront::{ApiError, Session};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// A call received by [`FakeBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FetchCart,
    AddItem(ProductId, u32),
    UpdateQuantity(ProductId, u32),
    RemoveItem(ProductId),
    ClearCart,
    SaveForLater(ProductId),
    MoveToCart(ProductId, u32),
    CreateOrder,
    ListOrders,
}

/// How a fake call should fail.
#[derive(Debug, Clone)]
pub enum Failure {
    /// 4xx with a server message, like a stock check.
    Rejected(String),
    /// 503 from the backend.
    Unavailable,
    /// 401, token expired.
    Unauthorized,
}

impl Failure {
    fn to_error(&self) -> ApiError {
        match self {
            Self::Rejected(message) => ApiError::Api {
                status: 400,
                message: message.clone(),
            },
            Self::Unavailable => ApiError::Api {
                status: 503,
                message: "Service Unavailable".to_string(),
            },
            Self::Unauthorized => ApiError::Unauthorized,
        }
    }
}

#[derive(Debug, Clone)]
struct FakeLine {
    product: ProductSnapshot,
    quantity: u32,
}

#[derive(Debug, Default)]
struct FakeState {
    lines: Vec<FakeLine>,
    saved: Vec<ProductSnapshot>,
    update_failures: HashMap<ProductId, Failure>,
    fetch_failure: Option<Failure>,
    order_failure: Option<Failure>,
    payment_setup: Option<PaymentSetup>,
    calls: Vec<Call>,
    order_requests: Vec<OrderRequest>,
    orders: Vec<Order>,
}

/// In-memory backend holding one user's cart.
#[derive(Debug, Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
    update_delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Put a product in the server cart.
    #[must_use]
    pub fn with_line(self, id: &str, name: &str, unit_price: Decimal, quantity: u32) -> Self {
        self.state().lines.push(FakeLine {
            product: ProductSnapshot::new(id, name, unit_price),
            quantity,
        });
        self
    }

    /// Put a product in the server's saved-for-later list.
    #[must_use]
    pub fn with_saved(self, id: &str, name: &str, unit_price: Decimal) -> Self {
        self.state()
            .saved
            .push(ProductSnapshot::new(id, name, unit_price));
        self
    }

    /// Make every update request wait before answering.
    #[must_use]
    pub fn with_update_delay(mut self, delay: Duration) -> Self {
        self.update_delay = Some(delay);
        self
    }

    /// Make updates for one product fail.
    pub fn fail_updates(&self, id: &str, failure: Failure) {
        self.state()
            .update_failures
            .insert(ProductId::new(id), failure);
    }

    /// Let updates for one product go through again.
    pub fn allow_updates(&self, id: &str) {
        self.state().update_failures.remove(&ProductId::new(id));
    }

    pub fn fail_fetch(&self, failure: Option<Failure>) {
        self.state().fetch_failure = failure;
    }

    pub fn fail_orders(&self, failure: Option<Failure>) {
        self.state().order_failure = failure;
    }

    /// Override the payment hand-off returned with created orders.
    pub fn set_payment_setup(&self, setup: PaymentSetup) {
        self.state().payment_setup = Some(setup);
    }

    /// Every call received, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Update calls only.
    #[must_use]
    pub fn update_calls(&self) -> Vec<(ProductId, u32)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::UpdateQuantity(id, qty) => Some((id, qty)),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn order_requests(&self) -> Vec<OrderRequest> {
        self.state().order_requests.clone()
    }

    /// Quantity the server holds for a product.
    #[must_use]
    pub fn server_quantity(&self, id: &str) -> Option<u32> {
        self.state()
            .lines
            .iter()
            .find(|l| l.product.id.as_str() == id)
            .map(|l| l.quantity)
    }

    /// Most update requests that were in flight at the same time.
    #[must_use]
    pub fn max_concurrent_updates(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.state().calls.push(call);
    }

    /// Whether the server holds a product in the saved-for-later list.
    #[must_use]
    pub fn is_saved(&self, id: &str) -> bool {
        self.state().saved.iter().any(|p| p.id.as_str() == id)
    }

    fn current_cart(state: &FakeState) -> Cart {
        Cart::from_lines(state.lines.iter().filter_map(|line| {
            let quantity = Quantity::new(i64::from(line.quantity)).ok()?;
            Some(CartLine::new(line.product.clone(), quantity, line.product.price))
        }))
        .with_saved(state.saved.iter().cloned())
    }

    fn not_found() -> ApiError {
        ApiError::Api {
            status: 404,
            message: "Producto no encontrado en el carrito".to_string(),
        }
    }
}

impl CartBackend for FakeBackend {
    async fn fetch_cart(&self) -> Result<Cart, ApiError> {
        let mut state = self.state();
        state.calls.push(Call::FetchCart);
        if let Some(failure) = &state.fetch_failure {
            return Err(failure.to_error());
        }
        Ok(Self::current_cart(&state))
    }

    async fn add_item(&self, product_id: &ProductId, quantity: Quantity) -> Result<(), ApiError> {
        self.record(Call::AddItem(product_id.clone(), quantity.get()));
        let mut state = self.state();
        if let Some(line) = state.lines.iter_mut().find(|l| &l.product.id == product_id) {
            line.quantity += quantity.get();
        } else {
            state.lines.push(FakeLine {
                product: ProductSnapshot::new(
                    product_id.clone(),
                    format!("Producto {product_id}"),
                    Decimal::ONE,
                ),
                quantity: quantity.get(),
            });
        }
        Ok(())
    }

    async fn update_quantity(
        &self,
        product_id: &ProductId,
        quantity: Quantity,
    ) -> Result<(), ApiError> {
        self.record(Call::UpdateQuantity(product_id.clone(), quantity.get()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.update_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut state = self.state();
        if let Some(failure) = state.update_failures.get(product_id) {
            return Err(failure.to_error());
        }
        if let Some(line) = state.lines.iter_mut().find(|l| &l.product.id == product_id) {
            line.quantity = quantity.get();
            Ok(())
        } else {
            Err(Self::not_found())
        }
    }

    async fn remove_item(&self, product_id: &ProductId) -> Result<(), ApiError> {
        self.record(Call::RemoveItem(product_id.clone()));
        self.state().lines.retain(|l| &l.product.id != product_id);
        Ok(())
    }

    async fn clear_cart(&self) -> Result<(), ApiError> {
        self.record(Call::ClearCart);
        self.state().lines.clear();
        Ok(())
    }

    async fn save_for_later(&self, product_id: &ProductId) -> Result<(), ApiError> {
        self.record(Call::SaveForLater(product_id.clone()));
        let mut state = self.state();
        let at = state
            .lines
            .iter()
            .position(|l| &l.product.id == product_id)
            .ok_or_else(Self::not_found)?;
        let line = state.lines.remove(at);
        state.saved.push(line.product);
        Ok(())
    }

    async fn move_to_cart(&self, product_id: &ProductId, quantity: Quantity) -> Result<(), ApiError> {
        self.record(Call::MoveToCart(product_id.clone(), quantity.get()));
        let mut state = self.state();
        let at = state
            .saved
            .iter()
            .position(|p| &p.id == product_id)
            .ok_or_else(|| ApiError::Api {
                status: 404,
                message: "Producto no encontrado en guardados".to_string(),
            })?;
        let product = state.saved.remove(at);
        state.lines.push(FakeLine {
            product,
            quantity: quantity.get(),
        });
        Ok(())
    }
}

impl OrderBackend for FakeBackend {
    async fn create_order(&self, request: &OrderRequest) -> Result<Order, ApiError> {
        let mut state = self.state();
        state.calls.push(Call::CreateOrder);
        if let Some(failure) = &state.order_failure {
            return Err(failure.to_error());
        }

        let number = state.orders.len() + 1;
        let payment = state.payment_setup.clone().unwrap_or_else(|| {
            match request.payment_method {
                PaymentMethod::MercadoPago => {
                    PaymentSetup::Redirect(format!("https://mp.example.com/checkout/{number}"))
                }
                PaymentMethod::Transferencia | PaymentMethod::Efectivo => {
                    PaymentSetup::NotRequired
                }
            }
        });
        let order = Order {
            id: OrderId::new(format!("order-{number}")),
            created_at: Some(chrono::Utc::now()),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: Some(request.payment_method),
            subtotal: Some(request.subtotal),
            total: Some(request.total),
            payment,
        };

        state.order_requests.push(request.clone());
        state.orders.push(order.clone());
        state.lines.clear();
        Ok(order)
    }

    async fn list_orders(&self) -> Result<Vec<Order>, ApiError> {
        let mut state = self.state();
        state.calls.push(Call::ListOrders);
        Ok(state.orders.iter().rev().cloned().collect())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Cart session over a fake backend, reporting to a channel.
pub type TestCart = CartSession<FakeBackend, UnboundedSender<Notification>>;

/// Logged-in cart session with the server cart already fetched.
///
/// # Panics
///
/// Panics if the initial fetch fails.
#[allow(clippy::unwrap_used)]
pub async fn logged_in(backend: FakeBackend) -> (TestCart, UnboundedReceiver<Notification>) {
    let (tx, rx) = unbounded_channel();
    let cart = CartSession::new(backend, tx, Session::anonymous());
    cart.login("eyJhbGciOiJIUzI1NiJ9.test.token", Some("user-1"))
        .await
        .unwrap();
    (cart, rx)
}

/// Every notification received so far.
pub fn drain(rx: &mut UnboundedReceiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        out.push(notification);
    }
    out
}

/// Cart with A (2 × 10) and B (1 × 5).
#[must_use]
pub fn backend_with_a_and_b() -> FakeBackend {
    FakeBackend::new()
        .with_line("a", "Remera Blanca", Decimal::from(10), 2)
        .with_line("b", "Remera Negra", Decimal::from(5), 1)
}

#[must_use]
pub fn id(raw: &str) -> ProductId {
    ProductId::new(raw)
}

/// Complete checkout details paying by transfer.
#[must_use]
pub fn checkout_details() -> CheckoutDetails {
    CheckoutDetails {
        address: ShippingAddress {
            name: "Ana Gómez".to_string(),
            street: "Av. Corrientes 1234".to_string(),
            city: "Buenos Aires".to_string(),
            postal_code: "C1043".to_string(),
            phone: "+54 11 5555 0000".to_string(),
            ..ShippingAddress::default()
        },
        payment_method: PaymentMethod::Transferencia,
        notes: None,
    }
}
