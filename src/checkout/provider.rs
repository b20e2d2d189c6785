//! Payment provider seam
//!
//! Confirmation happens between the client and the provider; the storefront
//! server only issues the secret up front and records the receipt after.

use futures::future::BoxFuture;
use serde::Deserialize;

const STRIPE_API: &str = "https://api.stripe.com";

/// Instrument used to pay
#[derive(Debug, Clone)]
pub enum PaymentMethod {
    /// A payment method id already known to the provider (`pm_...`).
    Saved(String),
    Card(CardDetails),
}

#[derive(Debug, Clone)]
pub struct CardDetails {
    pub number: String,
    pub exp_month: u8,
    pub exp_year: u16,
    pub cvc: String,
}

#[derive(Debug, Clone)]
pub struct PaymentDetails {
    pub method: PaymentMethod,
    pub billing_name: Option<String>,
}

/// Provider's view of the payment after confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReceipt {
    pub id: String,
    pub status: String,
}

impl ProviderReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == "succeeded"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Rejected by the provider; the message is meant for the customer.
    #[error("{0}")]
    Declined(String),
    #[error("payment provider unreachable: {0}")]
    Unexpected(String),
}

pub trait PaymentProvider: Send + Sync {
    fn confirm_card_payment<'a>(
        &'a self,
        client_secret: &'a str,
        details: &'a PaymentDetails,
    ) -> BoxFuture<'a, Result<ProviderReceipt, ProviderError>>;
}

/// PaymentIntent id embedded in a client secret (`pi_123_secret_abc`).
pub fn intent_id(client_secret: &str) -> &str {
    client_secret
        .split_once("_secret_")
        .map_or(client_secret, |(id, _)| id)
}

#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Confirms PaymentIntents with the publishable key, as a browser would.
pub struct StripeProvider {
    http: reqwest::Client,
    publishable_key: String,
    base_url: String,
}

impl StripeProvider {
    pub fn new(publishable_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            publishable_key: publishable_key.into(),
            base_url: STRIPE_API.to_string(),
        }
    }

    fn form(client_secret: &str, details: &PaymentDetails) -> Vec<(String, String)> {
        let mut form = vec![("client_secret".to_string(), client_secret.to_string())];
        match details.method {
            PaymentMethod::Saved(ref id) => {
                form.push(("payment_method".into(), id.clone()));
            }
            PaymentMethod::Card(ref card) => {
                form.push(("payment_method_data[type]".into(), "card".into()));
                form.push(("payment_method_data[card][number]".into(), card.number.clone()));
                form.push((
                    "payment_method_data[card][exp_month]".into(),
                    card.exp_month.to_string(),
                ));
                form.push((
                    "payment_method_data[card][exp_year]".into(),
                    card.exp_year.to_string(),
                ));
                form.push(("payment_method_data[card][cvc]".into(), card.cvc.clone()));
                if let Some(ref name) = details.billing_name {
                    form.push((
                        "payment_method_data[billing_details][name]".into(),
                        name.clone(),
                    ));
                }
            }
        }
        form
    }
}

impl PaymentProvider for StripeProvider {
    fn confirm_card_payment<'a>(
        &'a self,
        client_secret: &'a str,
        details: &'a PaymentDetails,
    ) -> BoxFuture<'a, Result<ProviderReceipt, ProviderError>> {
        Box::pin(async move {
            let url = format!(
                "{}/v1/payment_intents/{}/confirm",
                self.base_url,
                intent_id(client_secret)
            );
            tracing::debug!("Confirming payment at {}", url);

            let resp = self
                .http
                .post(&url)
                .bearer_auth(&self.publishable_key)
                .form(&Self::form(client_secret, details))
                .send()
                .await
                .map_err(|e| ProviderError::Unexpected(e.to_string()))?;

            let status = resp.status();
            let body = resp
                .bytes()
                .await
                .map_err(|e| ProviderError::Unexpected(e.to_string()))?;

            if !status.is_success() {
                let message = serde_json::from_slice::<ErrorEnvelope>(&body)
                    .ok()
                    .and_then(|env| env.error.message)
                    .unwrap_or_else(|| format!("Payment failed (HTTP {})", status.as_u16()));
                return Err(ProviderError::Declined(message));
            }

            let intent: IntentResponse = serde_json::from_slice(&body)
                .map_err(|e| ProviderError::Unexpected(e.to_string()))?;
            Ok(ProviderReceipt {
                id: intent.id,
                status: intent.status,
            })
        })
    }
}

#[cfg(test)]
pub mod mock {
    use std::sync::Mutex;

    use super::*;

    /// Provider returning a fixed result and counting calls.
    pub struct MockProvider {
        result: Result<ProviderReceipt, ProviderError>,
        secrets: Mutex<Vec<String>>,
    }

    impl MockProvider {
        pub fn succeeding(intent: &str) -> Self {
            Self::with(Ok(ProviderReceipt {
                id: intent.to_string(),
                status: "succeeded".to_string(),
            }))
        }

        pub fn with(result: Result<ProviderReceipt, ProviderError>) -> Self {
            Self {
                result,
                secrets: Mutex::new(Vec::new()),
            }
        }

        pub fn secrets(&self) -> Vec<String> {
            self.secrets.lock().unwrap().clone()
        }
    }

    impl PaymentProvider for MockProvider {
        fn confirm_card_payment<'a>(
            &'a self,
            client_secret: &'a str,
            _details: &'a PaymentDetails,
        ) -> BoxFuture<'a, Result<ProviderReceipt, ProviderError>> {
            self.secrets.lock().unwrap().push(client_secret.to_string());
            let result = self.result.clone();
            Box::pin(async move { result })
        }
    }
}
