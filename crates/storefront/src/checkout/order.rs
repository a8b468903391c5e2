//! Order types: shipping details, totals, the create-order body and the
//! created order.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tienda_core::{OrderId, OrderStatus, PaymentStatus};

const DEFAULT_COUNTRY: &str = "Argentina";

fn default_country() -> String {
    DEFAULT_COUNTRY.to_string()
}

/// Where the order ships to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "direccion")]
    pub street: String,
    #[serde(rename = "ciudad")]
    pub city: String,
    #[serde(rename = "codigoPostal")]
    pub postal_code: String,
    #[serde(rename = "pais", default = "default_country")]
    pub country: String,
    #[serde(rename = "telefono")]
    pub phone: String,
}

impl Default for ShippingAddress {
    fn default() -> Self {
        Self {
            name: String::new(),
            street: String::new(),
            city: String::new(),
            postal_code: String::new(),
            country: default_country(),
            phone: String::new(),
        }
    }
}

impl ShippingAddress {
    /// Required fields that are blank.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("name", &self.name),
            ("street", &self.street),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("phone", &self.phone),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
    }
}

/// How the buyer pays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Redirect to Mercado Pago.
    #[default]
    MercadoPago,
    /// Bank transfer.
    Transferencia,
    /// Cash on delivery.
    Efectivo,
}

impl PaymentMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MercadoPago => "mercadopago",
            Self::Transferencia => "transferencia",
            Self::Efectivo => "efectivo",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mercadopago" => Ok(Self::MercadoPago),
            "transferencia" => Ok(Self::Transferencia),
            "efectivo" => Ok(Self::Efectivo),
            other => Err(format!(
                "unknown payment method '{other}' (expected mercadopago, transferencia or efectivo)"
            )),
        }
    }
}

/// Everything the buyer enters at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutDetails {
    pub address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

/// Amounts sent with the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// Totals for a cart subtotal. Tax is rounded to cents; shipping and
    /// discount are not charged client-side.
    #[must_use]
    pub fn compute(subtotal: Decimal, tax_rate: Decimal) -> Self {
        let tax = (subtotal * tax_rate)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let shipping = Decimal::ZERO;
        let discount = Decimal::ZERO;
        Self {
            subtotal,
            tax,
            shipping,
            discount,
            total: subtotal + tax + shipping - discount,
        }
    }
}

/// Body of `POST /api/pedidos`.
///
/// The backend builds the order lines from its own copy of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRequest {
    #[serde(rename = "direccionEnvio")]
    pub shipping_address: ShippingAddress,
    #[serde(rename = "metodoPago")]
    pub payment_method: PaymentMethod,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(rename = "impuestos", with = "rust_decimal::serde::float")]
    pub tax: Decimal,
    #[serde(rename = "costoEnvio", with = "rust_decimal::serde::float")]
    pub shipping: Decimal,
    #[serde(rename = "descuento", with = "rust_decimal::serde::float")]
    pub discount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    #[serde(rename = "notas", skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl OrderRequest {
    #[must_use]
    pub fn new(details: &CheckoutDetails, totals: &OrderTotals) -> Self {
        Self {
            shipping_address: details.address.clone(),
            payment_method: details.payment_method,
            subtotal: totals.subtotal,
            tax: totals.tax,
            shipping: totals.shipping,
            discount: totals.discount,
            total: totals.total,
            notes: details
                .notes
                .as_ref()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
        }
    }
}

/// State of the payment hand-off for a created order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentSetup {
    /// Offline payment method; nothing to redirect to.
    NotRequired,
    /// Send the buyer to this payment page.
    Redirect(String),
    /// The provider rejected the payment preference.
    Failed(String),
    /// Online payment expected but the backend returned no redirect.
    Missing,
}

impl PaymentSetup {
    #[must_use]
    pub fn redirect_url(&self) -> Option<&str> {
        match self {
            Self::Redirect(url) => Some(url),
            _ => None,
        }
    }
}

/// An order as known to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub created_at: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<PaymentMethod>,
    pub subtotal: Option<Decimal>,
    pub total: Option<Decimal>,
    pub payment: PaymentSetup,
}

/// Result of a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOrder {
    pub order: Order,
    /// Amounts that were sent with the order.
    pub totals: OrderTotals,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            name: "Ana Gómez".to_string(),
            street: "Av. Corrientes 1234".to_string(),
            city: "Buenos Aires".to_string(),
            postal_code: "C1043".to_string(),
            phone: "+54 11 5555 0000".to_string(),
            ..ShippingAddress::default()
        }
    }

    #[test]
    fn test_missing_fields() {
        assert!(address().missing_fields().is_empty());

        let blank = ShippingAddress {
            city: "  ".to_string(),
            phone: String::new(),
            ..address()
        };
        assert_eq!(blank.missing_fields(), vec!["city", "phone"]);
    }

    #[test]
    fn test_country_defaults_to_argentina() {
        let json = r#"{"nombre":"a","direccion":"b","ciudad":"c","codigoPostal":"d","telefono":"e"}"#;
        let parsed: ShippingAddress = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.country, "Argentina");
        assert_eq!(ShippingAddress::default().country, "Argentina");
    }

    #[test]
    fn test_totals_round_tax_to_cents() {
        let totals = OrderTotals::compute(Decimal::new(3333, 2), Decimal::new(10, 2));
        assert_eq!(totals.tax, Decimal::new(333, 2));
        assert_eq!(totals.total, Decimal::new(3666, 2));
        assert_eq!(totals.shipping, Decimal::ZERO);
        assert_eq!(totals.discount, Decimal::ZERO);
    }

    #[test]
    fn test_order_request_wire_format() {
        let details = CheckoutDetails {
            address: address(),
            payment_method: PaymentMethod::Transferencia,
            notes: Some("  ".to_string()),
        };
        let totals = OrderTotals::compute(Decimal::from(35), Decimal::new(10, 2));
        let body = serde_json::to_value(OrderRequest::new(&details, &totals)).unwrap();

        assert_eq!(body["metodoPago"], "transferencia");
        assert_eq!(body["direccionEnvio"]["codigoPostal"], "C1043");
        assert_eq!(body["direccionEnvio"]["pais"], "Argentina");
        assert_eq!(body["subtotal"], 35.0);
        assert_eq!(body["impuestos"], 3.5);
        assert_eq!(body["costoEnvio"], 0.0);
        assert_eq!(body["total"], 38.5);
        assert!(body.get("notas").is_none());
    }

    #[test]
    fn test_payment_method_parsing() {
        assert_eq!("MercadoPago".parse::<PaymentMethod>().unwrap(), PaymentMethod::MercadoPago);
        assert_eq!("efectivo".parse::<PaymentMethod>().unwrap(), PaymentMethod::Efectivo);
        assert!("bitcoin".parse::<PaymentMethod>().is_err());
    }
}
