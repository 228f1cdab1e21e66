use std::collections::HashMap;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use uuid::Uuid;

use crate::payments::stripe_client::{
    CheckoutSessionCreated, StripeClient, StripeEvent, StripeInvoice, StripeSubscription,
};

/// Seam between usecases and the Stripe HTTP client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StripeGateway: Send + Sync {
    async fn create_customer(&self, email: &str, user_id: Uuid) -> AnyResult<String>;

    async fn find_customer_by_email(&self, email: &str) -> AnyResult<Option<String>>;

    async fn create_checkout_session(
        &self,
        price_id: &str,
        mode: &str,
        customer_id: Option<String>,
        quantity: i32,
        metadata: HashMap<String, String>,
    ) -> AnyResult<CheckoutSessionCreated>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str)
    -> AnyResult<StripeEvent>;

    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<StripeSubscription>;

    async fn retrieve_invoice(&self, invoice_id: &str) -> AnyResult<StripeInvoice>;
}

#[async_trait]
impl StripeGateway for StripeClient {
    async fn create_customer(&self, email: &str, user_id: Uuid) -> AnyResult<String> {
        self.create_customer(email, user_id).await
    }

    async fn find_customer_by_email(&self, email: &str) -> AnyResult<Option<String>> {
        self.find_customer_by_email(email).await
    }

    async fn create_checkout_session(
        &self,
        price_id: &str,
        mode: &str,
        customer_id: Option<String>,
        quantity: i32,
        metadata: HashMap<String, String>,
    ) -> AnyResult<CheckoutSessionCreated> {
        self.create_checkout_session(price_id, mode, customer_id, quantity, metadata)
            .await
    }

    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> AnyResult<StripeEvent> {
        self.verify_webhook_signature(payload, signature)
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<StripeSubscription> {
        self.retrieve_subscription(subscription_id).await
    }

    async fn retrieve_invoice(&self, invoice_id: &str) -> AnyResult<StripeInvoice> {
        self.retrieve_invoice(invoice_id).await
    }
}
