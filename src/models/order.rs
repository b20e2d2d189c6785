//! Order and checkout models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::User;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: u64,
    pub product: u64,
    #[serde(default)]
    pub product_name: Option<String>,
    pub quantity: u32,
    pub price: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub status: String,
    pub total_amount: Decimal,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub shipping_address: String,
    #[serde(default)]
    pub shipping_city: String,
    #[serde(default)]
    pub shipping_postal_code: String,
    #[serde(default)]
    pub shipping_country: String,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

/// Shipping fields sent to `create_order`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_postal_code: String,
    pub shipping_country: String,
}

impl Default for ShippingInfo {
    fn default() -> Self {
        Self {
            shipping_address: String::new(),
            shipping_city: String::new(),
            shipping_postal_code: String::new(),
            shipping_country: "USA".to_string(),
        }
    }
}

impl ShippingInfo {
    /// Pre-fill from the profile; missing fields stay empty.
    pub fn from_user(user: &User) -> Self {
        let mut info = Self::default();
        if let Some(ref address) = user.address {
            info.shipping_address = address.clone();
        }
        if let Some(ref city) = user.city {
            info.shipping_city = city.clone();
        }
        if let Some(ref postal) = user.postal_code {
            info.shipping_postal_code = postal.clone();
        }
        if let Some(ref country) = user.country {
            if !country.is_empty() {
                info.shipping_country = country.clone();
            }
        }
        info
    }

    /// Address, city and postal code are all required.
    pub fn is_complete(&self) -> bool {
        !self.shipping_address.trim().is_empty()
            && !self.shipping_city.trim().is_empty()
            && !self.shipping_postal_code.trim().is_empty()
    }
}

/// Body of a successful `create_order`
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedOrder {
    pub order_id: u64,
    pub client_secret: String,
    pub amount: Decimal,
}

/// Body of `/stripe/config/`
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub publishable_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shipping_prefill_keeps_default_country() {
        let user: User = serde_json::from_value(serde_json::json!({
            "id": 7,
            "email": "a@example.com",
            "address": "1 Main St",
            "city": "Springfield",
            "country": ""
        }))
        .unwrap();
        let info = ShippingInfo::from_user(&user);
        assert_eq!(info.shipping_address, "1 Main St");
        assert_eq!(info.shipping_city, "Springfield");
        assert_eq!(info.shipping_country, "USA");
        assert!(!info.is_complete());
    }
}
