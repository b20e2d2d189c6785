//! Checkout: order creation and payment handoff
//!
//! 1. `create_order` validates locally, then asks the server for an order
//!    and a one-time confirmation secret.
//! 2. `confirm_payment` hands the secret to the payment provider and, on
//!    success, reports the receipt back to the server. A failed report does
//!    not undo a successful payment; it is returned as
//!    `PaymentOutcome::ReconciliationPending` so it can be retried later.

pub mod provider;

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::api::{messages, ApiClient, ApiError};
use crate::models::{Cart, Order, ShippingInfo};
pub use provider::{
    CardDetails, PaymentDetails, PaymentMethod, PaymentProvider, ProviderError, StripeProvider,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckoutError {
    #[error("Please log in to check out")]
    NotAuthenticated,
    #[error("Your cart is empty")]
    EmptyCart,
    #[error("Please fill in all shipping information")]
    MissingShipping,
    #[error("{0}")]
    Server(String),
}

/// An order awaiting payment. Consumed by `confirm_payment`.
#[derive(Debug)]
pub struct PendingPayment {
    pub order_id: u64,
    client_secret: String,
    pub amount: Decimal,
}

impl PendingPayment {
    pub fn new(order_id: u64, client_secret: String, amount: Decimal) -> Self {
        Self {
            order_id,
            client_secret,
            amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub order_id: u64,
    pub payment_intent_id: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Paid and recorded on the order.
    Succeeded(PaymentReceipt),
    /// Paid with the provider; recording it on the order failed.
    ReconciliationPending {
        receipt: PaymentReceipt,
        reason: String,
    },
    /// Not paid. `reason` is shown to the customer.
    Failed { reason: String },
}

impl PaymentOutcome {
    pub fn is_paid(&self) -> bool {
        !matches!(self, PaymentOutcome::Failed { .. })
    }

    pub fn receipt(&self) -> Option<&PaymentReceipt> {
        match self {
            PaymentOutcome::Succeeded(receipt)
            | PaymentOutcome::ReconciliationPending { receipt, .. } => Some(receipt),
            PaymentOutcome::Failed { .. } => None,
        }
    }
}

pub struct Checkout {
    api: Arc<ApiClient>,
}

impl Checkout {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// Provider configured with the server's publishable key.
    pub async fn stripe_provider(&self) -> Result<StripeProvider, ApiError> {
        let config = self.api.payment_config().await?;
        Ok(StripeProvider::new(config.publishable_key))
    }

    pub async fn create_order(
        &self,
        cart: Option<&Cart>,
        shipping: &ShippingInfo,
    ) -> Result<PendingPayment, CheckoutError> {
        if cart.map_or(true, Cart::is_empty) {
            return Err(CheckoutError::EmptyCart);
        }
        if !shipping.is_complete() {
            return Err(CheckoutError::MissingShipping);
        }

        let created = self.api.create_order(shipping).await.map_err(|e| {
            tracing::error!("Error creating order: {}", e);
            CheckoutError::Server(messages::resolve(
                &e,
                messages::ORDER,
                "Failed to create order",
            ))
        })?;

        tracing::info!(
            "Order {} created, amount {}",
            created.order_id,
            created.amount
        );
        Ok(PendingPayment::new(
            created.order_id,
            created.client_secret,
            created.amount,
        ))
    }

    pub async fn confirm_payment(
        &self,
        pending: PendingPayment,
        provider: &dyn PaymentProvider,
        details: &PaymentDetails,
    ) -> PaymentOutcome {
        let confirmed = provider
            .confirm_card_payment(&pending.client_secret, details)
            .await;

        let intent = match confirmed {
            Ok(intent) if intent.succeeded() => intent,
            Ok(intent) => {
                tracing::warn!(
                    "Payment for order {} not completed (status {})",
                    pending.order_id,
                    intent.status
                );
                return PaymentOutcome::Failed {
                    reason: format!("Payment was not completed (status: {})", intent.status),
                };
            }
            Err(ProviderError::Declined(reason)) => {
                tracing::info!("Payment for order {} declined: {}", pending.order_id, reason);
                return PaymentOutcome::Failed { reason };
            }
            Err(e) => {
                tracing::error!("Payment error: {}", e);
                return PaymentOutcome::Failed {
                    reason: "An unexpected error occurred.".to_string(),
                };
            }
        };

        let receipt = PaymentReceipt {
            order_id: pending.order_id,
            payment_intent_id: intent.id,
            amount: pending.amount,
        };

        match self.reconcile(&receipt).await {
            Ok(_) => PaymentOutcome::Succeeded(receipt),
            Err(e) => {
                tracing::warn!(
                    "Payment {} succeeded but recording it on order {} failed: {}",
                    receipt.payment_intent_id,
                    receipt.order_id,
                    e
                );
                PaymentOutcome::ReconciliationPending {
                    receipt,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Record a provider receipt on its order. Safe to repeat.
    pub async fn reconcile(&self, receipt: &PaymentReceipt) -> Result<Order, ApiError> {
        self.api
            .confirm_order_payment(receipt.order_id, &receipt.payment_intent_id)
            .await
    }
}
