use std::{collections::HashMap, sync::Arc};

use anyhow::{Context, Result as AnyResult, anyhow};
use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{
    entities::{
        credit_purchases::InsertCreditPurchaseEntity,
        user_subscriptions::InsertUserSubscriptionEntity,
    },
    repositories::{
        credit_purchases::{CreditPurchaseRepository, PurchaseInvoiceDraft, PurchaseOutcome},
        invoices::{InvoiceRepository, InvoiceSyncOutcome, ProviderInvoiceSync},
        plans::PlanRepository,
        user_subscriptions::UserSubscriptionRepository,
    },
    value_objects::enums::{
        invoice_statuses::InvoiceStatus, subscription_statuses::SubscriptionStatus,
    },
};
use crate::payments::stripe_client::{StripeCheckoutSession, StripeClient, StripeEvent};
use crate::usecases::stripe_gateway::StripeGateway;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook signature verification failed")]
    SignatureVerification,
}

impl WebhookError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            WebhookError::SignatureVerification => StatusCode::BAD_REQUEST,
        }
    }
}

pub type WebhookResult<T> = std::result::Result<T, WebhookError>;

pub struct StripeWebhookUseCase<P, CP, S, Inv, Stripe>
where
    P: PlanRepository + Send + Sync + 'static,
    CP: CreditPurchaseRepository + Send + Sync + 'static,
    S: UserSubscriptionRepository + Send + Sync + 'static,
    Inv: InvoiceRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    plan_repo: Arc<P>,
    credit_purchase_repo: Arc<CP>,
    subscription_repo: Arc<S>,
    invoice_repo: Arc<Inv>,
    stripe_client: Arc<Stripe>,
}

impl<P, CP, S, Inv, Stripe> StripeWebhookUseCase<P, CP, S, Inv, Stripe>
where
    P: PlanRepository + Send + Sync + 'static,
    CP: CreditPurchaseRepository + Send + Sync + 'static,
    S: UserSubscriptionRepository + Send + Sync + 'static,
    Inv: InvoiceRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    pub fn new(
        plan_repo: Arc<P>,
        credit_purchase_repo: Arc<CP>,
        subscription_repo: Arc<S>,
        invoice_repo: Arc<Inv>,
        stripe_client: Arc<Stripe>,
    ) -> Self {
        Self {
            plan_repo,
            credit_purchase_repo,
            subscription_repo,
            invoice_repo,
            stripe_client,
        }
    }

    /// Verifies and dispatches one webhook delivery. Only a verification
    /// failure is surfaced to the caller; reconciliation failures after a
    /// verified event are logged and acknowledged so the provider does not
    /// redeliver an event that is unprocessable locally.
    pub async fn handle_stripe_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> WebhookResult<()> {
        let event = self
            .stripe_client
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                warn!(error = %err, "webhook: signature verification failed");
                WebhookError::SignatureVerification
            })?;

        let event_type = event.type_.clone();
        let event_id = event.id.clone().unwrap_or_default();
        info!(event_type = %event_type, event_id = %event_id, "webhook: stripe event verified");

        let outcome = match event_type.as_str() {
            "checkout.session.completed" => self.handle_checkout_completed(&event).await,
            "customer.subscription.created" | "customer.subscription.updated" => {
                self.sync_subscription_status(&event, None).await
            }
            "customer.subscription.deleted" => {
                self.sync_subscription_status(&event, Some(SubscriptionStatus::Canceled))
                    .await
            }
            "invoice.payment_succeeded" => self.handle_invoice_payment_succeeded(&event).await,
            _ => {
                debug!(event_type = %event_type, "webhook: unhandled stripe event type");
                Ok(())
            }
        };

        if let Err(err) = outcome {
            error!(
                event_type = %event_type,
                event_id = %event_id,
                error = ?err,
                "webhook: reconciliation failed; event acknowledged, needs out-of-band retry"
            );
        }

        Ok(())
    }

    async fn handle_checkout_completed(&self, event: &StripeEvent) -> AnyResult<()> {
        let session = StripeClient::extract_checkout_session(event)
            .ok_or_else(|| anyhow!("checkout session missing on event"))?;

        let purchase_type = session
            .metadata
            .as_ref()
            .and_then(|metadata| metadata.get("type"))
            .map(String::as_str);

        match (session.mode.as_deref(), purchase_type) {
            (Some("payment"), Some("credit_purchase")) => {
                self.reconcile_credit_purchase(&session).await
            }
            (Some("subscription"), _) => self.reconcile_subscription_purchase(&session).await,
            (mode, purchase_type) => {
                debug!(
                    mode = ?mode,
                    purchase_type = ?purchase_type,
                    "webhook: checkout session completed with unhandled mode, skipping"
                );
                Ok(())
            }
        }
    }

    /// Applies a completed credit purchase. The credited amount is recomputed
    /// from the plan's authoritative unit price; metadata amounts are only
    /// carried for identifiers and observability and are never trusted for
    /// the credit calculation.
    async fn reconcile_credit_purchase(&self, session: &StripeCheckoutSession) -> AnyResult<()> {
        let metadata = session
            .metadata
            .as_ref()
            .ok_or_else(|| anyhow!("metadata missing on checkout session"))?;

        let user_id = Self::metadata_uuid(metadata, "userId")?;
        let plan_id = Self::metadata_uuid(metadata, "planId")?;
        let quantity: i32 = metadata
            .get("quantity")
            .and_then(|value| value.parse().ok())
            .filter(|quantity| *quantity >= 1)
            .ok_or_else(|| anyhow!("missing or invalid quantity in session metadata"))?;

        let payment_intent_id = session
            .payment_intent
            .clone()
            .ok_or_else(|| anyhow!("payment intent missing on completed session"))?;

        let plan = self
            .plan_repo
            .find_active_by_id(plan_id)
            .await
            .context("failed to load plan for credit reconciliation")?
            .ok_or_else(|| anyhow!("plan {plan_id} not found for credit reconciliation"))?;

        let credits_delta = i64::from(plan.price_minor) * i64::from(quantity);
        let credits_delta = i32::try_from(credits_delta)
            .context("credited amount does not fit the credit balance column")?;

        let invoice_amount = session
            .amount_total
            .and_then(|total| i32::try_from(total).ok())
            .unwrap_or(credits_delta);

        let purchase = InsertCreditPurchaseEntity {
            user_id,
            plan_id,
            quantity,
            amount_minor: credits_delta,
            stripe_payment_intent_id: payment_intent_id.clone(),
        };
        let invoice = PurchaseInvoiceDraft {
            stripe_invoice_id: session.invoice.clone(),
            amount_minor: invoice_amount,
        };

        let outcome = self
            .credit_purchase_repo
            .record_completed_purchase(purchase, credits_delta, invoice)
            .await
            .context("failed to record completed credit purchase")?;

        match outcome {
            PurchaseOutcome::Applied => {
                info!(
                    %user_id,
                    %plan_id,
                    payment_intent_id = %payment_intent_id,
                    credits_delta,
                    "webhook: credit purchase applied"
                );
            }
            PurchaseOutcome::AlreadyProcessed => {
                info!(
                    %user_id,
                    payment_intent_id = %payment_intent_id,
                    "webhook: credit purchase already processed, skipping"
                );
            }
        }

        Ok(())
    }

    async fn reconcile_subscription_purchase(
        &self,
        session: &StripeCheckoutSession,
    ) -> AnyResult<()> {
        let metadata = session
            .metadata
            .as_ref()
            .ok_or_else(|| anyhow!("metadata missing on checkout session"))?;

        let user_id = Self::metadata_uuid(metadata, "userId")?;
        let plan_id = Self::metadata_uuid(metadata, "planId")?;
        let subscription_id = session
            .subscription
            .clone()
            .ok_or_else(|| anyhow!("subscription reference missing on completed session"))?;

        info!(
            %user_id,
            %plan_id,
            subscription_id = %subscription_id,
            "webhook: retrieving subscription from stripe"
        );

        let subscription = self
            .stripe_client
            .retrieve_subscription(&subscription_id)
            .await
            .context("failed to retrieve subscription from stripe")?;

        let status = subscription
            .status
            .as_deref()
            .map(SubscriptionStatus::from_provider)
            .unwrap_or(SubscriptionStatus::Active);
        let starts_at = subscription
            .period_start()
            .and_then(Self::ts_to_datetime)
            .ok_or_else(|| anyhow!("period start missing on subscription"))?;
        let ends_at = subscription.period_end().and_then(Self::ts_to_datetime);

        let subscription_row_id = self
            .subscription_repo
            .upsert_by_stripe_subscription_id(InsertUserSubscriptionEntity {
                user_id,
                plan_id,
                stripe_subscription_id: subscription_id.clone(),
                status: status.to_string(),
                starts_at,
                ends_at,
            })
            .await
            .context("failed to upsert subscription after checkout")?;

        info!(
            %user_id,
            %plan_id,
            subscription_id = %subscription_id,
            subscription_row_id = %subscription_row_id,
            status = %status,
            "webhook: subscription checkout reconciled"
        );

        Ok(())
    }

    async fn sync_subscription_status(
        &self,
        event: &StripeEvent,
        forced_status: Option<SubscriptionStatus>,
    ) -> AnyResult<()> {
        let object = StripeClient::extract_subscription_object(event)
            .ok_or_else(|| anyhow!("subscription object missing on event"))?;
        let subscription_id = object
            .id
            .ok_or_else(|| anyhow!("subscription id missing on event"))?;

        let status = forced_status.unwrap_or_else(|| {
            object
                .status
                .as_deref()
                .map(SubscriptionStatus::from_provider)
                .unwrap_or_default()
        });

        let updated = self
            .subscription_repo
            .update_status_by_stripe_subscription_id(&subscription_id, status)
            .await
            .context("failed to update subscription status")?;

        if updated {
            info!(
                subscription_id = %subscription_id,
                status = %status,
                "webhook: subscription status synced"
            );
        } else {
            info!(
                subscription_id = %subscription_id,
                status = %status,
                "webhook: status update for untracked subscription, skipped"
            );
        }

        Ok(())
    }

    async fn handle_invoice_payment_succeeded(&self, event: &StripeEvent) -> AnyResult<()> {
        let invoice = StripeClient::extract_invoice_object(event)
            .ok_or_else(|| anyhow!("invoice object missing on event"))?;
        let stripe_invoice_id = invoice
            .id
            .ok_or_else(|| anyhow!("invoice id missing on event"))?;

        let subscription_ref = match invoice.subscription.as_deref() {
            Some(subscription_ref) => subscription_ref,
            None => {
                info!(
                    stripe_invoice_id = %stripe_invoice_id,
                    "webhook: invoice without subscription reference, skipped"
                );
                return Ok(());
            }
        };

        let subscription = match self
            .subscription_repo
            .find_by_stripe_subscription_id(subscription_ref)
            .await
            .context("failed to look up subscription for invoice")?
        {
            Some(subscription) => subscription,
            None => {
                info!(
                    stripe_invoice_id = %stripe_invoice_id,
                    subscription_id = %subscription_ref,
                    "webhook: invoice for untracked subscription, skipped"
                );
                return Ok(());
            }
        };

        let status = invoice
            .status
            .as_deref()
            .map(InvoiceStatus::from_provider)
            .unwrap_or(InvoiceStatus::Paid);
        let amount_minor = invoice
            .amount_paid
            .or(invoice.amount_due)
            .and_then(|amount| i32::try_from(amount).ok())
            .unwrap_or(0);
        let paid_at = (status == InvoiceStatus::Paid).then(Utc::now);

        let outcome = self
            .invoice_repo
            .sync_provider_invoice(ProviderInvoiceSync {
                stripe_invoice_id: stripe_invoice_id.clone(),
                user_id: subscription.user_id,
                user_subscription_id: Some(subscription.id),
                amount_minor,
                status,
                pdf_url: invoice.invoice_pdf.clone(),
                due_at: invoice.due_date.and_then(Self::ts_to_datetime),
                paid_at,
            })
            .await
            .context("failed to sync invoice")?;

        match outcome {
            InvoiceSyncOutcome::Created(invoice_id) => {
                info!(
                    stripe_invoice_id = %stripe_invoice_id,
                    invoice_id = %invoice_id,
                    status = %status,
                    "webhook: invoice recorded"
                );
            }
            InvoiceSyncOutcome::Updated(invoice_id) => {
                info!(
                    stripe_invoice_id = %stripe_invoice_id,
                    invoice_id = %invoice_id,
                    status = %status,
                    "webhook: invoice status synced"
                );
            }
            InvoiceSyncOutcome::SkippedDowngrade(invoice_id) => {
                warn!(
                    stripe_invoice_id = %stripe_invoice_id,
                    invoice_id = %invoice_id,
                    status = %status,
                    "webhook: refused invoice status downgrade"
                );
            }
        }

        Ok(())
    }

    fn metadata_uuid(metadata: &HashMap<String, String>, key: &str) -> AnyResult<Uuid> {
        metadata
            .get(key)
            .and_then(|value| Uuid::parse_str(value).ok())
            .ok_or_else(|| anyhow!("missing or invalid {key} in session metadata"))
    }

    fn ts_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(ts, 0).single()
    }
}
