//! Cart synchronizer
//!
//! The server owns cart state. Every mutation is one remote call followed by
//! a full reload; totals are never computed here. The only local aggregate
//! is the item count shown next to the cart.

use std::sync::Arc;

use crate::api::{ApiClient, ApiError};
use crate::models::Cart;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("Please log in to use the cart")]
    NotAuthenticated,
    #[error("Quantity must be greater than 0")]
    InvalidQuantity,
    #[error("{0}")]
    Request(String),
}

pub struct CartSynchronizer {
    api: Arc<ApiClient>,
    cart: Option<Cart>,
    is_loading: bool,
    error: Option<String>,
    /// Set while a session is authenticated.
    active: bool,
}

impl CartSynchronizer {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            cart: None,
            is_loading: false,
            error: None,
            active: false,
        }
    }

    pub fn cart(&self) -> Option<&Cart> {
        self.cart.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Sum of quantities over the current items; 0 without a cart.
    pub fn item_count(&self) -> u32 {
        self.cart.as_ref().map_or(0, |cart| {
            cart.items
                .iter()
                .fold(0u32, |count, item| count.saturating_add(item.quantity))
        })
    }

    /// Session became authenticated: start tracking and load the cart.
    pub async fn activate(&mut self) -> Result<(), CartError> {
        self.active = true;
        self.load().await
    }

    /// Session ended: forget the cart immediately.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.cart = None;
        self.error = None;
        self.is_loading = false;
    }

    /// Replace local state with the server's cart.
    pub async fn load(&mut self) -> Result<(), CartError> {
        self.ensure_active()?;

        self.is_loading = true;
        let result = self.api.current_cart().await;
        self.is_loading = false;

        match result {
            Ok(cart) => {
                tracing::debug!(
                    "Cart loaded: {} lines, total {}",
                    cart.items.len(),
                    cart.total_price
                );
                self.cart = Some(cart);
                self.error = None;
                Ok(())
            }
            Err(e) => Err(self.fail(e, "Failed to load cart")),
        }
    }

    pub async fn add_item(&mut self, product_id: u64, quantity: u32) -> Result<(), CartError> {
        self.ensure_active()?;
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        let result = self.api.add_cart_item(product_id, quantity).await;
        self.reload_after(result, "Failed to add item to cart").await
    }

    /// Quantity 0 is forwarded; the server drops the line.
    pub async fn update_item(&mut self, item_id: u64, quantity: u32) -> Result<(), CartError> {
        self.ensure_active()?;
        let result = self.api.update_cart_item(item_id, quantity).await;
        self.reload_after(result, "Failed to update cart item").await
    }

    pub async fn remove_item(&mut self, item_id: u64) -> Result<(), CartError> {
        self.ensure_active()?;
        let result = self.api.remove_cart_item(item_id).await;
        self.reload_after(result, "Failed to remove item from cart")
            .await
    }

    pub async fn clear(&mut self) -> Result<(), CartError> {
        self.ensure_active()?;
        let result = self.api.clear_cart().await;
        self.reload_after(result, "Failed to clear cart").await
    }

    /// On mutation failure the previous cart stays as it was.
    async fn reload_after(
        &mut self,
        result: Result<(), ApiError>,
        failure: &str,
    ) -> Result<(), CartError> {
        match result {
            Ok(()) => self.load().await,
            Err(e) => Err(self.fail(e, failure)),
        }
    }

    fn ensure_active(&self) -> Result<(), CartError> {
        if self.active {
            Ok(())
        } else {
            Err(CartError::NotAuthenticated)
        }
    }

    fn fail(&mut self, err: ApiError, message: &str) -> CartError {
        tracing::warn!("{}: {}", message, err);
        self.error = Some(message.to_string());
        CartError::Request(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::mock::MockTransport;
    use crate::auth::MemoryTokenStore;
    use reqwest::Method;
    use rust_decimal::Decimal;
    use serde_json::{json, Value};

    const CURRENT: &str = "/api/cart/current/";

    fn line(id: u64, product_id: u64, quantity: u32, total: &str) -> Value {
        json!({
            "id": id,
            "product": {
                "id": product_id,
                "name": format!("Product {}", product_id),
                "price": "5.00"
            },
            "quantity": quantity,
            "total_price": total
        })
    }

    fn cart_json(lines: Vec<Value>, total: &str) -> Value {
        json!({"id": 1, "items": lines, "total_price": total})
    }

    fn synchronizer(mock: &Arc<MockTransport>) -> CartSynchronizer {
        let store = Arc::new(MemoryTokenStore::with_pair("acc", "ref"));
        CartSynchronizer::new(Arc::new(ApiClient::new(mock.clone(), store)))
    }

    #[test]
    fn test_item_count_without_cart() {
        let mock = Arc::new(MockTransport::new());
        assert_eq!(synchronizer(&mock).item_count(), 0);
    }

    #[test]
    fn test_item_count_saturates() {
        let mock = Arc::new(MockTransport::new());
        let mut sync = synchronizer(&mock);
        let lines = vec![line(1, 2, u32::MAX, "1.00"), line(2, 3, 5, "25.00")];
        sync.cart = Some(serde_json::from_value(cart_json(lines, "26.00")).unwrap());

        assert_eq!(sync.item_count(), u32::MAX);
    }

    #[tokio::test]
    async fn test_add_item_then_reload() {
        let mock = Arc::new(MockTransport::new());
        mock.reply(Method::GET, CURRENT, 200, cart_json(vec![], "0.00"))
            .reply(
                Method::GET,
                CURRENT,
                200,
                // Server-side pricing differs from quantity * unit price.
                cart_json(vec![line(10, 3, 2, "9.50")], "9.50"),
            );
        mock.reply(
            Method::POST,
            "/api/cart/add_item/",
            201,
            json!({"message": "Item added to cart"}),
        );
        let mut sync = synchronizer(&mock);
        sync.activate().await.unwrap();

        sync.add_item(3, 2).await.unwrap();

        let requests = mock.requests();
        let paths: Vec<_> = requests.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec![CURRENT, "/api/cart/add_item/", CURRENT]);
        assert_eq!(requests[1].body, Some(json!({"product_id": 3, "quantity": 2})));

        let cart = sync.cart().unwrap();
        assert_eq!(cart.total_price, Decimal::new(950, 2));
        assert_eq!(cart.items[0].total_price, Decimal::new(950, 2));
        assert_eq!(sync.item_count(), 2);
    }

    #[tokio::test]
    async fn test_every_mutation_shows_server_cart() {
        let mock = Arc::new(MockTransport::new());
        let snapshots = vec![
            cart_json(vec![line(1, 1, 1, "5.00")], "5.00"),
            cart_json(vec![line(1, 1, 4, "20.00"), line(2, 2, 1, "5.00")], "25.00"),
            cart_json(vec![line(2, 2, 1, "5.00")], "5.00"),
            cart_json(vec![], "0.00"),
        ];
        for snapshot in &snapshots {
            mock.reply(Method::GET, CURRENT, 200, snapshot.clone());
        }
        mock.reply(Method::PATCH, "/api/cart/update_item/", 200, json!({}));
        mock.reply(Method::DELETE, "/api/cart/remove_item/", 200, json!({}));
        mock.reply(Method::DELETE, "/api/cart/clear/", 200, json!({}));

        let mut sync = synchronizer(&mock);
        sync.activate().await.unwrap();
        let expect = |i: usize| serde_json::from_value::<Cart>(snapshots[i].clone()).unwrap();
        assert_eq!(sync.cart(), Some(&expect(0)));

        sync.update_item(1, 4).await.unwrap();
        assert_eq!(sync.cart(), Some(&expect(1)));
        assert_eq!(sync.item_count(), 5);

        sync.remove_item(1).await.unwrap();
        assert_eq!(sync.cart(), Some(&expect(2)));
        assert_eq!(
            mock.calls(Method::DELETE, "/api/cart/remove_item/")[0].body,
            Some(json!({"item_id": 1}))
        );

        sync.clear().await.unwrap();
        assert_eq!(sync.cart(), Some(&expect(3)));
        assert_eq!(sync.item_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_cart_stale() {
        let mock = Arc::new(MockTransport::new());
        mock.reply(
            Method::GET,
            CURRENT,
            200,
            cart_json(vec![line(1, 1, 1, "5.00")], "5.00"),
        );
        mock.reply(
            Method::POST,
            "/api/cart/add_item/",
            400,
            json!({"error": "Insufficient stock"}),
        );
        let mut sync = synchronizer(&mock);
        sync.activate().await.unwrap();
        let before = sync.cart().cloned();

        let err = sync.add_item(1, 99).await.unwrap_err();
        assert_eq!(err, CartError::Request("Failed to add item to cart".into()));
        assert_eq!(sync.error(), Some("Failed to add item to cart"));
        assert_eq!(sync.cart().cloned(), before);
        // No reload and no retry after the failed mutation.
        assert_eq!(mock.calls(Method::GET, CURRENT).len(), 1);
        assert_eq!(mock.calls(Method::POST, "/api/cart/add_item/").len(), 1);
    }

    #[tokio::test]
    async fn test_inactive_cart_rejects_without_network() {
        let mock = Arc::new(MockTransport::new());
        let mut sync = synchronizer(&mock);

        assert_eq!(sync.add_item(1, 1).await, Err(CartError::NotAuthenticated));
        assert_eq!(sync.load().await, Err(CartError::NotAuthenticated));
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_zero_quantity_add_rejected_locally() {
        let mock = Arc::new(MockTransport::new());
        mock.reply(Method::GET, CURRENT, 200, cart_json(vec![], "0.00"));
        let mut sync = synchronizer(&mock);
        sync.activate().await.unwrap();

        assert_eq!(sync.add_item(1, 0).await, Err(CartError::InvalidQuantity));
        assert!(mock.calls(Method::POST, "/api/cart/add_item/").is_empty());
    }

    #[tokio::test]
    async fn test_deactivate_drops_cart() {
        let mock = Arc::new(MockTransport::new());
        mock.reply(
            Method::GET,
            CURRENT,
            200,
            cart_json(vec![line(1, 1, 3, "15.00")], "15.00"),
        );
        let mut sync = synchronizer(&mock);
        sync.activate().await.unwrap();
        assert_eq!(sync.item_count(), 3);

        sync.deactivate();
        assert!(sync.cart().is_none());
        assert_eq!(sync.item_count(), 0);
    }
}
