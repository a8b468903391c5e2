//! Core types for Tienda.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod price;
pub mod product;
pub mod quantity;
pub mod status;

pub use id::*;
pub use price::{CurrencyCode, Price};
pub use product::ProductSnapshot;
pub use quantity::{Quantity, QuantityError};
pub use status::*;
