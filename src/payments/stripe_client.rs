use std::collections::HashMap;

use anyhow::Result;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use sha2::Sha256;
use tracing::error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
    webhook_tolerance_secs: i64,
    success_url: String,
    cancel_url: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: Option<String>,
    pub mode: Option<String>,
    pub subscription: Option<String>,
    pub customer: Option<String>,
    pub payment_intent: Option<String>,
    pub invoice: Option<String>,
    pub amount_total: Option<i64>,
    pub metadata: Option<HashMap<String, String>>,
}

/// Subscription object embedded in `customer.subscription.*` events.
#[derive(Debug, Deserialize)]
pub struct StripeSubscriptionObject {
    pub id: Option<String>,
    pub status: Option<String>,
}

/// Invoice object embedded in `invoice.*` events.
#[derive(Debug, Deserialize)]
pub struct StripeInvoiceObject {
    pub id: Option<String>,
    pub subscription: Option<String>,
    pub status: Option<String>,
    pub amount_paid: Option<i64>,
    pub amount_due: Option<i64>,
    pub invoice_pdf: Option<String>,
    pub due_date: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
    decline_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscription {
    pub id: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<i64>,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub items: StripeSubscriptionItems,
}

#[derive(Debug, Deserialize, Default)]
pub struct StripeSubscriptionItems {
    pub data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscriptionItem {
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
}

impl StripeSubscription {
    /// Returns the subscription start timestamp, falling back to the current
    /// period start (top-level or first item) when `start_date` is absent.
    pub fn period_start(&self) -> Option<i64> {
        self.start_date.or(self.current_period_start).or_else(|| {
            self.items
                .data
                .first()
                .and_then(|item| item.current_period_start)
        })
    }

    /// Returns the subscription period end timestamp, falling back to the first item when needed.
    pub fn period_end(&self) -> Option<i64> {
        self.current_period_end.or_else(|| {
            self.items
                .data
                .first()
                .and_then(|item| item.current_period_end)
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeInvoice {
    pub id: Option<String>,
    pub status: Option<String>,
    pub amount_paid: Option<i64>,
    pub amount_due: Option<i64>,
    pub invoice_pdf: Option<String>,
    pub due_date: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSessionCreated {
    pub id: String,
    pub url: String,
}

impl StripeClient {
    pub fn new(
        secret_key: String,
        webhook_secret: String,
        webhook_tolerance_secs: i64,
        success_url: String,
        cancel_url: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            webhook_secret,
            webhook_tolerance_secs,
            success_url,
            cancel_url,
        }
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let (stripe_error_type, stripe_error_code, stripe_error_param, stripe_error_message, stripe_decline_code) =
            match serde_json::from_str::<StripeErrorEnvelope>(&body) {
                Ok(envelope) => {
                    let details = envelope.error;
                    (
                        details.type_,
                        details.code,
                        details.param,
                        details.message,
                        details.decline_code,
                    )
                }
                Err(_) => (None, None, None, None, None),
            };

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?stripe_error_type,
            stripe_error_code = ?stripe_error_code,
            stripe_error_param = ?stripe_error_param,
            stripe_error_message = ?stripe_error_message,
            stripe_decline_code = ?stripe_decline_code,
            response_body = %body,
            context = %context,
            "stripe api request failed"
        );

        anyhow::bail!(
            "Stripe API request failed: {} (status {}, request_id={:?})",
            context,
            status,
            request_id
        );
    }

    /// Creates a Stripe customer for the given email/user.
    pub async fn create_customer(&self, email: &str, user_id: Uuid) -> Result<String> {
        // See Stripe customer docs: https://stripe.com/docs/api/customers/create
        let body = [
            ("email", email.to_string()),
            ("metadata[user_id]", user_id.to_string()),
        ];

        let resp = self
            .http
            .post("https://api.stripe.com/v1/customers")
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create customer").await?;

        #[derive(Deserialize)]
        struct CustomerResp {
            id: String,
        }

        let parsed: CustomerResp = resp.json().await?;
        Ok(parsed.id)
    }

    /// Looks up an existing customer by email. Returns the first match.
    pub async fn find_customer_by_email(&self, email: &str) -> Result<Option<String>> {
        // https://stripe.com/docs/api/customers/list
        let resp = self
            .http
            .get("https://api.stripe.com/v1/customers")
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .query(&[("email", email), ("limit", "1")])
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "list customers by email").await?;

        #[derive(Deserialize)]
        struct CustomerListResp {
            data: Vec<CustomerListItem>,
        }

        #[derive(Deserialize)]
        struct CustomerListItem {
            id: String,
        }

        let parsed: CustomerListResp = resp.json().await?;
        Ok(parsed.data.into_iter().next().map(|customer| customer.id))
    }

    /// Creates a Checkout Session and returns its id and hosted URL.
    pub async fn create_checkout_session(
        &self,
        price_id: &str,
        mode: &str,
        customer_id: Option<String>,
        quantity: i32,
        metadata: HashMap<String, String>,
    ) -> Result<CheckoutSessionCreated> {
        // Stripe Checkout docs:
        // https://stripe.com/docs/payments/checkout
        let mut body: Vec<(String, String)> = vec![
            ("mode".to_string(), mode.to_string()),
            ("line_items[0][price]".to_string(), price_id.to_string()),
            (
                "line_items[0][quantity]".to_string(),
                quantity.to_string(),
            ),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
        ];

        if let Some(customer) = customer_id {
            body.push(("customer".to_string(), customer));
        }

        for (key, value) in metadata {
            body.push((format!("metadata[{}]", key), value));
        }

        let resp = self
            .http
            .post("https://api.stripe.com/v1/checkout/sessions")
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create checkout session").await?;

        #[derive(Deserialize)]
        struct CheckoutResp {
            id: String,
            url: Option<String>,
        }

        let parsed: CheckoutResp = resp.json().await?;
        let url = parsed
            .url
            .ok_or_else(|| anyhow::anyhow!("Stripe Checkout session URL is missing"))?;

        Ok(CheckoutSessionCreated { id: parsed.id, url })
    }

    /// Verifies the webhook signature. https://stripe.com/docs/webhooks/signatures
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent> {
        let mut timestamp: Option<String> = None;
        let mut signature: Option<String> = None;

        for part in signature_header.split(',') {
            if let Some(rest) = part.strip_prefix("t=") {
                timestamp = Some(rest.to_string());
            } else if let Some(rest) = part.strip_prefix("v1=") {
                signature = Some(rest.to_string());
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| anyhow::anyhow!("missing timestamp in stripe-signature"))?;
        let signature =
            signature.ok_or_else(|| anyhow::anyhow!("missing v1 in stripe-signature"))?;

        let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())?;
        mac.update(signed_payload.as_bytes());
        let expected = mac.finalize().into_bytes();
        let provided = hex::decode(&signature)?;

        if expected[..] != provided[..] {
            anyhow::bail!("invalid webhook signature");
        }

        let event_ts: i64 = timestamp
            .parse()
            .map_err(|_| anyhow::anyhow!("malformed timestamp in stripe-signature"))?;
        let age = Utc::now().timestamp() - event_ts;
        if age.abs() > self.webhook_tolerance_secs {
            anyhow::bail!("stripe-signature timestamp outside tolerance window");
        }

        let event: StripeEvent = serde_json::from_slice(payload)?;
        Ok(event)
    }

    pub fn extract_checkout_session(event: &StripeEvent) -> Option<StripeCheckoutSession> {
        serde_json::from_value(event.data.object.clone()).ok()
    }

    pub fn extract_subscription_object(event: &StripeEvent) -> Option<StripeSubscriptionObject> {
        serde_json::from_value(event.data.object.clone()).ok()
    }

    pub fn extract_invoice_object(event: &StripeEvent) -> Option<StripeInvoiceObject> {
        serde_json::from_value(event.data.object.clone()).ok()
    }

    pub async fn retrieve_subscription(&self, subscription_id: &str) -> Result<StripeSubscription> {
        // https://stripe.com/docs/api/subscriptions/retrieve
        let resp = self
            .http
            .get(format!(
                "https://api.stripe.com/v1/subscriptions/{}",
                subscription_id
            ))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "retrieve subscription").await?;

        let subscription: StripeSubscription = resp.json().await?;
        Ok(subscription)
    }

    pub async fn retrieve_invoice(&self, invoice_id: &str) -> Result<StripeInvoice> {
        // https://stripe.com/docs/api/invoices/retrieve
        let resp = self
            .http
            .get(format!(
                "https://api.stripe.com/v1/invoices/{}",
                invoice_id
            ))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "retrieve invoice").await?;

        let invoice: StripeInvoice = resp.json().await?;
        Ok(invoice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(tolerance_secs: i64) -> StripeClient {
        StripeClient::new(
            "sk_test_123".to_string(),
            "whsec_testsecret".to_string(),
            tolerance_secs,
            "https://shop.example.com/success?session_id={CHECKOUT_SESSION_ID}".to_string(),
            "https://shop.example.com/?canceled=true".to_string(),
        )
    }

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(signed_payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        format!("t={},v1={}", timestamp, signature)
    }

    #[test]
    fn accepts_correctly_signed_payload() {
        let client = test_client(300);
        let payload = br#"{"type":"checkout.session.completed","data":{"object":{}}}"#;
        let header = sign(payload, "whsec_testsecret", Utc::now().timestamp());

        let event = client.verify_webhook_signature(payload, &header).unwrap();
        assert_eq!(event.type_, "checkout.session.completed");
    }

    #[test]
    fn rejects_tampered_payload() {
        let client = test_client(300);
        let payload = br#"{"type":"checkout.session.completed","data":{"object":{}}}"#;
        let header = sign(payload, "whsec_testsecret", Utc::now().timestamp());

        let tampered = br#"{"type":"checkout.session.completed","data":{"object":{"amount_total":1}}}"#;
        assert!(client.verify_webhook_signature(tampered, &header).is_err());
    }

    #[test]
    fn rejects_wrong_secret() {
        let client = test_client(300);
        let payload = br#"{"type":"invoice.payment_succeeded","data":{"object":{}}}"#;
        let header = sign(payload, "whsec_othersecret", Utc::now().timestamp());

        assert!(client.verify_webhook_signature(payload, &header).is_err());
    }

    #[test]
    fn rejects_stale_timestamp() {
        let client = test_client(300);
        let payload = br#"{"type":"invoice.payment_succeeded","data":{"object":{}}}"#;
        let header = sign(
            payload,
            "whsec_testsecret",
            Utc::now().timestamp() - 600,
        );

        assert!(client.verify_webhook_signature(payload, &header).is_err());
    }

    #[test]
    fn rejects_header_without_signature() {
        let client = test_client(300);
        let payload = br#"{"type":"invoice.payment_succeeded","data":{"object":{}}}"#;

        assert!(client.verify_webhook_signature(payload, "t=123").is_err());
    }

    #[test]
    fn subscription_period_falls_back_to_items() {
        let subscription: StripeSubscription = serde_json::from_value(serde_json::json!({
            "id": "sub_1",
            "status": "active",
            "items": {
                "data": [
                    {"current_period_start": 1_700_000_000, "current_period_end": 1_702_592_000}
                ]
            }
        }))
        .unwrap();

        assert_eq!(subscription.period_start(), Some(1_700_000_000));
        assert_eq!(subscription.period_end(), Some(1_702_592_000));
    }
}
