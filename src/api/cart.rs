//! Cart endpoints. Mutations return only a status message; callers
//! re-fetch the cart afterwards.

use serde_json::json;

use super::transport::ApiRequest;
use super::{ApiClient, ApiError};
use crate::models::Cart;

impl ApiClient {
    pub async fn current_cart(&self) -> Result<Cart, ApiError> {
        self.send_json(ApiRequest::get("/api/cart/current/")).await
    }

    pub async fn add_cart_item(&self, product_id: u64, quantity: u32) -> Result<(), ApiError> {
        let body = json!({ "product_id": product_id, "quantity": quantity });
        self.send(ApiRequest::post("/api/cart/add_item/").json(&body)?)
            .await?;
        Ok(())
    }

    pub async fn update_cart_item(&self, item_id: u64, quantity: u32) -> Result<(), ApiError> {
        let body = json!({ "item_id": item_id, "quantity": quantity });
        self.send(ApiRequest::patch("/api/cart/update_item/").json(&body)?)
            .await?;
        Ok(())
    }

    pub async fn remove_cart_item(&self, item_id: u64) -> Result<(), ApiError> {
        let body = json!({ "item_id": item_id });
        self.send(ApiRequest::delete("/api/cart/remove_item/").json(&body)?)
            .await?;
        Ok(())
    }

    pub async fn clear_cart(&self) -> Result<(), ApiError> {
        self.send(ApiRequest::delete("/api/cart/clear/")).await?;
        Ok(())
    }
}
