use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
};
use serde::Serialize;

use crate::axum_http::error_responses::ApiError;
use crate::domain::repositories::{
    credit_purchases::CreditPurchaseRepository, invoices::InvoiceRepository,
    plans::PlanRepository, user_subscriptions::UserSubscriptionRepository,
};
use crate::infrastructure::postgres::{
    postgres_connection::PgPoolSquad,
    repositories::{
        credit_purchases::CreditPurchasePostgres, invoices::InvoicePostgres,
        plans::PlanPostgres, user_subscriptions::UserSubscriptionPostgres,
    },
};
use crate::payments::stripe_client::StripeClient;
use crate::usecases::{stripe_gateway::StripeGateway, stripe_webhook::StripeWebhookUseCase};

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

pub fn routes(db_pool: Arc<PgPoolSquad>, stripe_client: Arc<StripeClient>) -> Router {
    let plan_repo = PlanPostgres::new(Arc::clone(&db_pool));
    let credit_purchase_repo = CreditPurchasePostgres::new(Arc::clone(&db_pool));
    let subscription_repo = UserSubscriptionPostgres::new(Arc::clone(&db_pool));
    let invoice_repo = InvoicePostgres::new(Arc::clone(&db_pool));
    let webhook_usecase = StripeWebhookUseCase::new(
        Arc::new(plan_repo),
        Arc::new(credit_purchase_repo),
        Arc::new(subscription_repo),
        Arc::new(invoice_repo),
        stripe_client,
    );

    Router::new()
        .route("/stripe", post(handle_stripe_webhook))
        .with_state(Arc::new(webhook_usecase))
}

/// The body is taken as raw bytes: signature verification must run over the
/// exact payload Stripe signed, so nothing may parse it first.
pub async fn handle_stripe_webhook<P, CP, S, Inv, Stripe>(
    State(webhook_usecase): State<Arc<StripeWebhookUseCase<P, CP, S, Inv, Stripe>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError>
where
    P: PlanRepository + Send + Sync + 'static,
    CP: CreditPurchaseRepository + Send + Sync + 'static,
    S: UserSubscriptionRepository + Send + Sync + 'static,
    Inv: InvoiceRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Validation("Missing stripe-signature header".to_string()))?;

    webhook_usecase
        .handle_stripe_webhook(&body, signature)
        .await?;

    Ok(Json(WebhookAck { received: true }))
}
