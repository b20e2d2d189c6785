//! Cart models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Product;

/// One cart line. `total_price` is computed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: u64,
    pub product: Product,
    pub quantity: u32,
    pub total_price: Decimal,
}

/// Authoritative cart as returned by `/api/cart/current/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub items: Vec<CartItem>,
    pub total_price: Decimal,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
