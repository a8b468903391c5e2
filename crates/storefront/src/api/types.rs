//! Wire types for the Tienda REST backend.
//!
//! Field names follow the backend's JSON (Spanish, camelCase) via serde
//! renames. These types are private to the client; [`super::conversions`]
//! turns them into domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tienda_core::{OrderStatus, PaymentStatus};

use crate::checkout::PaymentMethod;

// =============================================================================
// Cart
// =============================================================================

/// `GET /api/carrito` response.
///
/// Older deployments send the lines under `items` instead of `productos`.
#[derive(Debug, Deserialize)]
pub struct CartResponse {
    #[serde(rename = "productos", alias = "items", default)]
    pub lines: Vec<CartLineResponse>,
    /// Products saved for later.
    #[serde(rename = "guardados", default)]
    pub saved: Vec<SavedItemResponse>,
}

/// One saved-for-later entry.
#[derive(Debug, Deserialize)]
pub struct SavedItemResponse {
    #[serde(rename = "producto", default)]
    pub product: Option<ProductResponse>,
}

/// One cart line as sent by the backend.
#[derive(Debug, Deserialize)]
pub struct CartLineResponse {
    /// Null when the product was deleted from the catalog.
    #[serde(rename = "producto", default)]
    pub product: Option<ProductResponse>,
    #[serde(rename = "cantidad")]
    pub quantity: i64,
    #[serde(rename = "precioUnitario", default)]
    pub unit_price: Option<Decimal>,
}

/// Product snapshot embedded in a cart line.
#[derive(Debug, Deserialize)]
pub struct ProductResponse {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(rename = "nombre", default)]
    pub name: String,
    #[serde(rename = "precio", default)]
    pub price: Option<Decimal>,
    #[serde(rename = "precioAnterior", default)]
    pub previous_price: Option<Decimal>,
    #[serde(rename = "descuento", default)]
    pub discount: Option<Decimal>,
    #[serde(rename = "imagenes", default)]
    pub images: Vec<ImageResponse>,
}

/// Image reference: either a bare URL or an object with a `url` field.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ImageResponse {
    Url(String),
    Object { url: String },
}

impl ImageResponse {
    pub fn into_url(self) -> String {
        match self {
            Self::Url(url) | Self::Object { url } => url,
        }
    }
}

/// Body for `POST /api/carrito`.
#[derive(Debug, Serialize)]
pub struct AddItemRequest<'a> {
    #[serde(rename = "productoId")]
    pub product_id: &'a str,
    #[serde(rename = "cantidad")]
    pub quantity: u32,
    #[serde(rename = "variante")]
    pub variant: serde_json::Map<String, serde_json::Value>,
}

/// Body for `POST /api/carrito/mover/{id}`.
#[derive(Debug, Serialize)]
pub struct MoveToCartRequest {
    #[serde(rename = "cantidad")]
    pub quantity: u32,
    #[serde(rename = "variante")]
    pub variant: serde_json::Map<String, serde_json::Value>,
}

/// Body carrying only the variant, for `DELETE /api/carrito/{id}` and
/// `POST /api/carrito/guardar/{id}`.
#[derive(Debug, Default, Serialize)]
pub struct VariantRequest {
    #[serde(rename = "variante")]
    pub variant: serde_json::Map<String, serde_json::Value>,
}

/// Body for `PUT /api/carrito/{id}`.
#[derive(Debug, Serialize)]
pub struct UpdateQuantityRequest {
    #[serde(rename = "cantidad")]
    pub quantity: u32,
    #[serde(rename = "variante")]
    pub variant: serde_json::Map<String, serde_json::Value>,
}

// =============================================================================
// Orders
// =============================================================================

/// Order as returned by `POST /api/pedidos` and `GET /api/pedidos/mispedidos`.
#[derive(Debug, Deserialize)]
pub struct OrderResponse {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "estadoPedido", default)]
    pub status: OrderStatus,
    #[serde(rename = "estadoPago", default)]
    pub payment_status: PaymentStatus,
    #[serde(rename = "metodoPago", default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub subtotal: Option<Decimal>,
    #[serde(default)]
    pub total: Option<Decimal>,
    #[serde(default)]
    pub mercadopago: Option<MercadoPagoResponse>,
}

/// Payment preference created by the backend for Mercado Pago orders.
#[derive(Debug, Deserialize)]
pub struct MercadoPagoResponse {
    #[serde(rename = "initPoint", default)]
    pub init_point: Option<String>,
    #[serde(rename = "sandboxInitPoint", default)]
    pub sandbox_init_point: Option<String>,
    /// Either a boolean flag or an error string, depending on backend version.
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl MercadoPagoResponse {
    pub fn has_error(&self) -> bool {
        match &self.error {
            None | Some(serde_json::Value::Null | serde_json::Value::Bool(false)) => false,
            Some(serde_json::Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }
}

/// `GET /api/pedidos/mispedidos` response: a bare list or a wrapped one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OrderListResponse {
    List(Vec<OrderResponse>),
    Wrapped {
        #[serde(rename = "pedidos")]
        orders: Vec<OrderResponse>,
    },
}

impl OrderListResponse {
    pub fn into_orders(self) -> Vec<OrderResponse> {
        match self {
            Self::List(orders) | Self::Wrapped { orders } => orders,
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Error body returned by the backend on rejection.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorResponse {
    pub fn into_message(self) -> Option<String> {
        self.message
            .or(self.error)
            .filter(|m| !m.trim().is_empty())
    }
}
