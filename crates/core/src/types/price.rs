//! Type-safe price representation using decimal arithmetic.

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::quantity::Quantity;

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., pesos, not centavos).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Price of `quantity` units at this unit price.
    #[must_use]
    pub fn times(self, quantity: Quantity) -> Self {
        Self::new(self.amount * quantity.as_decimal(), self.currency_code)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:.2} {}",
            self.currency_code.symbol(),
            self.amount,
            self.currency_code.code()
        )
    }
}

/// ISO 4217 currency codes used by the platform's tenants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    COP,
    #[default]
    ARS,
    USD,
}

impl CurrencyCode {
    /// Display symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::COP | Self::ARS | Self::USD => "$",
        }
    }

    /// Three-letter ISO code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::COP => "COP",
            Self::ARS => "ARS",
            Self::USD => "USD",
        }
    }
}

impl FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "COP" => Ok(Self::COP),
            "ARS" => Ok(Self::ARS),
            "USD" => Ok(Self::USD),
            other => Err(format!("unsupported currency '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_times_multiplies_amount() {
        let unit = Price::new(Decimal::new(1050, 2), CurrencyCode::COP);
        let line = unit.times(Quantity::ONE);
        assert_eq!(line.amount, Decimal::new(1050, 2));
    }

    #[test]
    fn test_parse_currency() {
        assert_eq!("ars".parse::<CurrencyCode>(), Ok(CurrencyCode::ARS));
        assert_eq!(" USD ".parse::<CurrencyCode>(), Ok(CurrencyCode::USD));
        assert!("EUR".parse::<CurrencyCode>().is_err());
        assert_eq!(CurrencyCode::default(), CurrencyCode::ARS);
    }

    #[test]
    fn test_display() {
        let price = Price::new(Decimal::new(35, 0), CurrencyCode::ARS);
        assert_eq!(price.to_string(), "$35.00 ARS");
    }
}
