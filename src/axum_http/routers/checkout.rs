use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Form, State},
    response::{IntoResponse, Redirect},
    routing::{get, post},
};

use crate::axum_http::{demo_user::DemoUser, error_responses::ApiError};
use crate::domain::{
    repositories::{
        plans::PlanRepository, user_subscriptions::UserSubscriptionRepository,
        users::UserRepository,
    },
    value_objects::checkout::CreateCheckoutSessionForm,
};
use crate::infrastructure::postgres::{
    postgres_connection::PgPoolSquad,
    repositories::{
        plans::PlanPostgres, user_subscriptions::UserSubscriptionPostgres, users::UserPostgres,
    },
};
use crate::payments::stripe_client::StripeClient;
use crate::usecases::{checkout::CheckoutUseCase, stripe_gateway::StripeGateway};

pub fn routes(db_pool: Arc<PgPoolSquad>, stripe_client: Arc<StripeClient>) -> Router {
    let user_repo = UserPostgres::new(Arc::clone(&db_pool));
    let plan_repo = PlanPostgres::new(Arc::clone(&db_pool));
    let subscription_repo = UserSubscriptionPostgres::new(Arc::clone(&db_pool));
    let checkout_usecase = CheckoutUseCase::new(
        Arc::new(user_repo),
        Arc::new(plan_repo),
        Arc::new(subscription_repo),
        stripe_client,
    );

    Router::new()
        .route("/api/v1/plans", get(list_plans))
        .route("/api/v1/checkout/sessions", post(create_checkout_session))
        .with_state(Arc::new(checkout_usecase))
}

pub async fn list_plans<U, P, S, Stripe>(
    State(checkout_usecase): State<Arc<CheckoutUseCase<U, P, S, Stripe>>>,
) -> Result<impl IntoResponse, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    S: UserSubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    let plans = checkout_usecase.list_plans().await?;
    Ok(Json(plans))
}

/// Validates the storefront form and redirects the buyer to the hosted
/// checkout page.
pub async fn create_checkout_session<U, P, S, Stripe>(
    State(checkout_usecase): State<Arc<CheckoutUseCase<U, P, S, Stripe>>>,
    demo_user: DemoUser,
    Form(form): Form<CreateCheckoutSessionForm>,
) -> Result<impl IntoResponse, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    S: UserSubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    let session = checkout_usecase
        .create_checkout_session(demo_user.user_id, form)
        .await?;

    Ok(Redirect::to(&session.url))
}
