//! Application root
//!
//! Owns the session, the cart and the checkout flow, all sharing one
//! `ApiClient`. Every action ends with `sync_auth`, which keeps the cart in
//! step with the session: loaded when a user is present, dropped the moment
//! there is none (including after a failed token refresh).

use std::sync::Arc;

use crate::api::ApiClient;
use crate::auth::{AuthError, Session, SessionManager};
use crate::cart::{CartError, CartSynchronizer};
use crate::checkout::{
    Checkout, CheckoutError, PaymentDetails, PaymentOutcome, PaymentProvider, PendingPayment,
};
use crate::models::{Credentials, ProfileUpdate, Registration, ShippingInfo};

pub struct Storefront {
    api: Arc<ApiClient>,
    session: SessionManager,
    cart: CartSynchronizer,
    checkout: Checkout,
}

impl Storefront {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            session: SessionManager::new(api.clone()),
            cart: CartSynchronizer::new(api.clone()),
            checkout: Checkout::new(api.clone()),
            api,
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn session(&self) -> &Session {
        self.session.session()
    }

    pub fn cart(&self) -> &CartSynchronizer {
        &self.cart
    }

    pub fn checkout(&self) -> &Checkout {
        &self.checkout
    }

    /// Restore a persisted session and its cart.
    pub async fn start(&mut self) {
        self.session.bootstrap().await;
        self.sync_auth().await;
    }

    pub async fn login(&mut self, credentials: &Credentials) -> Result<(), AuthError> {
        let result = self.session.login(credentials).await;
        self.sync_auth().await;
        result
    }

    pub async fn register(&mut self, registration: &Registration) -> Result<(), AuthError> {
        let result = self.session.register(registration).await;
        self.sync_auth().await;
        result
    }

    pub fn logout(&mut self) {
        self.session.logout();
        self.cart.deactivate();
    }

    pub async fn update_profile(&mut self, changes: &ProfileUpdate) -> Result<(), AuthError> {
        let result = self.session.update_profile(changes).await;
        self.sync_auth().await;
        result
    }

    pub async fn add_to_cart(&mut self, product_id: u64, quantity: u32) -> Result<(), CartError> {
        let result = self.cart.add_item(product_id, quantity).await;
        self.sync_auth().await;
        result
    }

    pub async fn update_cart_item(
        &mut self,
        item_id: u64,
        quantity: u32,
    ) -> Result<(), CartError> {
        let result = self.cart.update_item(item_id, quantity).await;
        self.sync_auth().await;
        result
    }

    pub async fn remove_from_cart(&mut self, item_id: u64) -> Result<(), CartError> {
        let result = self.cart.remove_item(item_id).await;
        self.sync_auth().await;
        result
    }

    pub async fn clear_cart(&mut self) -> Result<(), CartError> {
        let result = self.cart.clear().await;
        self.sync_auth().await;
        result
    }

    /// Create an order from the current cart. The server empties the cart
    /// once the order exists, so the cart is reloaded afterwards.
    pub async fn create_order(
        &mut self,
        shipping: &ShippingInfo,
    ) -> Result<PendingPayment, CheckoutError> {
        if !self.session().is_authenticated() {
            return Err(CheckoutError::NotAuthenticated);
        }

        let result = self
            .checkout
            .create_order(self.cart.cart(), shipping)
            .await;
        if result.is_ok() {
            if let Err(e) = self.cart.load().await {
                tracing::warn!("Cart not reloaded after order: {}", e);
            }
        }
        self.sync_auth().await;
        result
    }

    pub async fn confirm_payment(
        &mut self,
        pending: PendingPayment,
        provider: &dyn PaymentProvider,
        details: &PaymentDetails,
    ) -> PaymentOutcome {
        let outcome = self
            .checkout
            .confirm_payment(pending, provider, details)
            .await;
        self.sync_auth().await;
        outcome
    }

    async fn sync_auth(&mut self) {
        if self.api.take_forced_logout() {
            self.session.expire();
        }

        if !self.session().is_authenticated() {
            self.cart.deactivate();
            return;
        }

        if !self.cart.is_active() {
            if let Err(e) = self.cart.activate().await {
                tracing::warn!("Cart not loaded: {}", e);
            }
            if self.api.take_forced_logout() {
                self.session.expire();
                self.cart.deactivate();
            }
        }
    }
}
