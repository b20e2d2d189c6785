//! Order and payment-configuration endpoints

use serde::Deserialize;
use serde_json::json;

use super::transport::ApiRequest;
use super::{ApiClient, ApiError};
use crate::models::{CreatedOrder, Listing, Order, PaymentConfig, ShippingInfo};

#[derive(Debug, Deserialize)]
struct ConfirmPaymentResponse {
    order: Order,
}

impl ApiClient {
    pub async fn orders(&self) -> Result<Vec<Order>, ApiError> {
        let listing: Listing<Order> = self.send_json(ApiRequest::get("/api/orders/")).await?;
        Ok(listing.into_items())
    }

    pub async fn order(&self, id: u64) -> Result<Order, ApiError> {
        self.send_json(ApiRequest::get(format!("/api/orders/{}/", id)))
            .await
    }

    pub async fn create_order(&self, shipping: &ShippingInfo) -> Result<CreatedOrder, ApiError> {
        self.send_json(ApiRequest::post("/api/orders/create_order/").json(shipping)?)
            .await
    }

    /// Record a provider receipt against an order.
    pub async fn confirm_order_payment(
        &self,
        order_id: u64,
        payment_intent_id: &str,
    ) -> Result<Order, ApiError> {
        let body = json!({ "payment_intent_id": payment_intent_id });
        let resp: ConfirmPaymentResponse = self
            .send_json(
                ApiRequest::post(format!("/api/orders/{}/confirm_payment/", order_id))
                    .json(&body)?,
            )
            .await?;
        Ok(resp.order)
    }

    pub async fn payment_config(&self) -> Result<PaymentConfig, ApiError> {
        self.send_json(ApiRequest::get("/stripe/config/")).await
    }
}
