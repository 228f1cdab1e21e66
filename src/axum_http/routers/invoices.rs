use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect},
    routing::get,
};
use uuid::Uuid;

use crate::axum_http::{demo_user::DemoUser, error_responses::ApiError};
use crate::domain::{
    repositories::{invoices::InvoiceRepository, users::UserRepository},
    value_objects::invoices::InvoiceListQueryParams,
};
use crate::infrastructure::postgres::{
    postgres_connection::PgPoolSquad,
    repositories::{invoices::InvoicePostgres, users::UserPostgres},
};
use crate::payments::stripe_client::StripeClient;
use crate::usecases::{invoices::InvoiceUseCase, stripe_gateway::StripeGateway};

pub fn routes(db_pool: Arc<PgPoolSquad>, stripe_client: Arc<StripeClient>) -> Router {
    let user_repo = UserPostgres::new(Arc::clone(&db_pool));
    let invoice_repo = InvoicePostgres::new(Arc::clone(&db_pool));
    let invoice_usecase =
        InvoiceUseCase::new(Arc::new(user_repo), Arc::new(invoice_repo), stripe_client);

    Router::new()
        .route("/", get(list_invoices))
        .route("/:invoice_id", get(get_invoice))
        .route("/:invoice_id/download", get(download_invoice))
        .route("/stripe/:stripe_invoice_id", get(get_invoice_by_stripe_id))
        .with_state(Arc::new(invoice_usecase))
}

pub async fn list_invoices<U, Inv, Stripe>(
    State(invoice_usecase): State<Arc<InvoiceUseCase<U, Inv, Stripe>>>,
    demo_user: DemoUser,
    Query(params): Query<InvoiceListQueryParams>,
) -> Result<impl IntoResponse, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    Inv: InvoiceRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    let invoices = invoice_usecase
        .list_invoices(demo_user.user_id, params)
        .await?;
    Ok(Json(invoices))
}

pub async fn get_invoice<U, Inv, Stripe>(
    State(invoice_usecase): State<Arc<InvoiceUseCase<U, Inv, Stripe>>>,
    demo_user: DemoUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    Inv: InvoiceRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    let invoice = invoice_usecase
        .get_invoice(demo_user.user_id, invoice_id)
        .await?;
    Ok(Json(invoice))
}

pub async fn get_invoice_by_stripe_id<U, Inv, Stripe>(
    State(invoice_usecase): State<Arc<InvoiceUseCase<U, Inv, Stripe>>>,
    demo_user: DemoUser,
    Path(stripe_invoice_id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    Inv: InvoiceRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    let invoice = invoice_usecase
        .get_invoice_by_stripe_id(demo_user.user_id, &stripe_invoice_id)
        .await?;
    Ok(Json(invoice))
}

pub async fn download_invoice<U, Inv, Stripe>(
    State(invoice_usecase): State<Arc<InvoiceUseCase<U, Inv, Stripe>>>,
    demo_user: DemoUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
    U: UserRepository + Send + Sync + 'static,
    Inv: InvoiceRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    let pdf_url = invoice_usecase
        .invoice_download_url(demo_user.user_id, invoice_id)
        .await?;
    Ok(Redirect::to(&pdf_url))
}
