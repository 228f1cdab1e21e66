use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{
    entities::invoices::InvoiceEntity,
    repositories::{invoices::InvoiceRepository, users::UserRepository},
    value_objects::invoices::{
        DEFAULT_PAGE_LIMIT, InvoiceDto, InvoiceListDto, InvoiceListQuery, InvoiceListQueryParams,
        MAX_PAGE_LIMIT, PaginationDto,
    },
};
use crate::usecases::stripe_gateway::StripeGateway;

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("invalid invoice query: {0}")]
    InvalidQuery(String),
    #[error("user not found")]
    UserNotFound,
    #[error("invoice not found")]
    InvoiceNotFound,
    #[error("no PDF is available for this invoice")]
    PdfNotAvailable,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl InvoiceError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            InvoiceError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            InvoiceError::UserNotFound
            | InvoiceError::InvoiceNotFound
            | InvoiceError::PdfNotAvailable => StatusCode::NOT_FOUND,
            InvoiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type InvoiceResult<T> = std::result::Result<T, InvoiceError>;

pub struct InvoiceUseCase<U, Inv, Stripe>
where
    U: UserRepository + Send + Sync + 'static,
    Inv: InvoiceRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    invoice_repo: Arc<Inv>,
    stripe_client: Arc<Stripe>,
}

impl<U, Inv, Stripe> InvoiceUseCase<U, Inv, Stripe>
where
    U: UserRepository + Send + Sync + 'static,
    Inv: InvoiceRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    pub fn new(user_repo: Arc<U>, invoice_repo: Arc<Inv>, stripe_client: Arc<Stripe>) -> Self {
        Self {
            user_repo,
            invoice_repo,
            stripe_client,
        }
    }

    pub async fn list_invoices(
        &self,
        user_id: Uuid,
        params: InvoiceListQueryParams,
    ) -> InvoiceResult<InvoiceListDto> {
        let query = Self::validate_query(params)?;
        self.ensure_user_exists(user_id).await?;

        let (invoices, total_count) = self
            .invoice_repo
            .list_for_user(user_id, query.clone())
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "invoices: failed to list invoices");
                InvoiceError::Internal(err)
            })?;

        let total_pages = (total_count + query.limit - 1) / query.limit;
        info!(
            %user_id,
            page = query.page,
            limit = query.limit,
            total_count,
            "invoices: listed invoices"
        );

        Ok(InvoiceListDto {
            invoices: invoices.into_iter().map(InvoiceDto::from).collect(),
            pagination: PaginationDto {
                page: query.page,
                limit: query.limit,
                total_count,
                total_pages,
                has_next: query.page < total_pages,
                has_prev: query.page > 1,
            },
        })
    }

    pub async fn get_invoice(&self, user_id: Uuid, invoice_id: Uuid) -> InvoiceResult<InvoiceDto> {
        self.ensure_user_exists(user_id).await?;
        let invoice = self.find_owned_invoice(user_id, invoice_id).await?;
        Ok(InvoiceDto::from(invoice))
    }

    pub async fn get_invoice_by_stripe_id(
        &self,
        user_id: Uuid,
        stripe_invoice_id: &str,
    ) -> InvoiceResult<InvoiceDto> {
        self.ensure_user_exists(user_id).await?;

        let invoice = self
            .invoice_repo
            .find_by_stripe_invoice_id_for_user(stripe_invoice_id, user_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    stripe_invoice_id,
                    db_error = ?err,
                    "invoices: failed to load invoice by provider reference"
                );
                InvoiceError::Internal(err)
            })?
            .ok_or_else(|| {
                let err = InvoiceError::InvoiceNotFound;
                warn!(
                    %user_id,
                    stripe_invoice_id,
                    status = err.status_code().as_u16(),
                    "invoices: invoice not found by provider reference"
                );
                err
            })?;

        Ok(InvoiceDto::from(invoice))
    }

    /// Resolves the invoice PDF URL, fetching it from Stripe and caching it
    /// onto the row on first access.
    pub async fn invoice_download_url(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
    ) -> InvoiceResult<String> {
        self.ensure_user_exists(user_id).await?;
        let invoice = self.find_owned_invoice(user_id, invoice_id).await?;

        if let Some(pdf_url) = invoice.pdf_url {
            return Ok(pdf_url);
        }

        let stripe_invoice_id = invoice.stripe_invoice_id.ok_or_else(|| {
            let err = InvoiceError::PdfNotAvailable;
            warn!(
                %user_id,
                %invoice_id,
                status = err.status_code().as_u16(),
                "invoices: invoice has no provider reference, no PDF to fetch"
            );
            err
        })?;

        let stripe_invoice = self
            .stripe_client
            .retrieve_invoice(&stripe_invoice_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %invoice_id,
                    stripe_invoice_id = %stripe_invoice_id,
                    error = ?err,
                    "invoices: failed to retrieve invoice from stripe"
                );
                InvoiceError::Internal(err)
            })?;

        let pdf_url = stripe_invoice
            .invoice_pdf
            .ok_or(InvoiceError::PdfNotAvailable)?;

        self.invoice_repo
            .update_pdf_url(invoice_id, &pdf_url)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %invoice_id,
                    db_error = ?err,
                    "invoices: failed to cache invoice PDF URL"
                );
                InvoiceError::Internal(err)
            })?;

        info!(%user_id, %invoice_id, "invoices: cached invoice PDF URL from stripe");
        Ok(pdf_url)
    }

    fn validate_query(params: InvoiceListQueryParams) -> InvoiceResult<InvoiceListQuery> {
        let page = params.page.unwrap_or(1);
        if page < 1 {
            return Err(InvoiceError::InvalidQuery(
                "page must be at least 1".to_string(),
            ));
        }

        let limit = params.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(InvoiceError::InvalidQuery(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }

        if let (Some(date_from), Some(date_to)) = (params.date_from, params.date_to) {
            if date_from > date_to {
                return Err(InvoiceError::InvalidQuery(
                    "dateFrom must not be after dateTo".to_string(),
                ));
            }
        }

        Ok(InvoiceListQuery {
            page,
            limit,
            status: params.status,
            date_from: params.date_from,
            date_to: params.date_to,
        })
    }

    async fn ensure_user_exists(&self, user_id: Uuid) -> InvoiceResult<()> {
        let user = self.user_repo.find_by_id(user_id).await.map_err(|err| {
            error!(%user_id, db_error = ?err, "invoices: failed to load user");
            InvoiceError::Internal(err)
        })?;

        if user.is_none() {
            let err = InvoiceError::UserNotFound;
            warn!(
                %user_id,
                status = err.status_code().as_u16(),
                "invoices: unknown user"
            );
            return Err(err);
        }

        Ok(())
    }

    async fn find_owned_invoice(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
    ) -> InvoiceResult<InvoiceEntity> {
        self.invoice_repo
            .find_by_id_for_user(invoice_id, user_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %invoice_id,
                    db_error = ?err,
                    "invoices: failed to load invoice"
                );
                InvoiceError::Internal(err)
            })?
            .ok_or_else(|| {
                let err = InvoiceError::InvoiceNotFound;
                warn!(
                    %user_id,
                    %invoice_id,
                    status = err.status_code().as_u16(),
                    "invoices: invoice not found for user"
                );
                err
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mockall::predicate::eq;

    use crate::domain::entities::users::UserEntity;
    use crate::domain::repositories::{
        invoices::MockInvoiceRepository, users::MockUserRepository,
    };
    use crate::domain::value_objects::enums::invoice_statuses::InvoiceStatus;
    use crate::payments::stripe_client::StripeInvoice;
    use crate::usecases::stripe_gateway::MockStripeGateway;

    fn existing_user(user_id: Uuid) -> MockUserRepository {
        let mut user_repo = MockUserRepository::new();
        user_repo.expect_find_by_id().returning(move |_| {
            let now = Utc::now();
            let user = UserEntity {
                id: user_id,
                email: "alice@example.com".to_string(),
                credits: 0,
                stripe_customer_id: Some("cus_1".to_string()),
                created_at: now,
                updated_at: now,
            };
            Box::pin(async move { Ok(Some(user)) })
        });
        user_repo
    }

    fn sample_invoice(
        invoice_id: Uuid,
        user_id: Uuid,
        pdf_url: Option<&str>,
        stripe_invoice_id: Option<&str>,
    ) -> InvoiceEntity {
        let now = Utc::now();
        InvoiceEntity {
            id: invoice_id,
            user_id,
            credit_purchase_id: Some(Uuid::new_v4()),
            user_subscription_id: None,
            stripe_invoice_id: stripe_invoice_id.map(str::to_string),
            amount_minor: 3500,
            status: InvoiceStatus::Paid.to_string(),
            pdf_url: pdf_url.map(str::to_string),
            due_at: None,
            paid_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    fn default_params() -> InvoiceListQueryParams {
        InvoiceListQueryParams {
            page: None,
            limit: None,
            status: None,
            date_from: None,
            date_to: None,
        }
    }

    #[tokio::test]
    async fn list_rejects_out_of_range_pagination() {
        let usecase = InvoiceUseCase::new(
            Arc::new(MockUserRepository::new()),
            Arc::new(MockInvoiceRepository::new()),
            Arc::new(MockStripeGateway::new()),
        );

        let err = usecase
            .list_invoices(
                Uuid::new_v4(),
                InvoiceListQueryParams {
                    page: Some(0),
                    ..default_params()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, InvoiceError::InvalidQuery(_)));

        let err = usecase
            .list_invoices(
                Uuid::new_v4(),
                InvoiceListQueryParams {
                    limit: Some(101),
                    ..default_params()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, InvoiceError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn list_builds_pagination_envelope() {
        let user_id = Uuid::new_v4();
        let mut invoice_repo = MockInvoiceRepository::new();

        invoice_repo
            .expect_list_for_user()
            .withf(move |id, query| {
                *id == user_id && query.page == 2 && query.limit == 10 && query.offset() == 10
            })
            .returning(move |user_id, _| {
                let page: Vec<InvoiceEntity> = (0..10)
                    .map(|_| sample_invoice(Uuid::new_v4(), user_id, None, None))
                    .collect();
                Box::pin(async move { Ok((page, 25)) })
            });

        let usecase = InvoiceUseCase::new(
            Arc::new(existing_user(user_id)),
            Arc::new(invoice_repo),
            Arc::new(MockStripeGateway::new()),
        );

        let dto = usecase
            .list_invoices(
                user_id,
                InvoiceListQueryParams {
                    page: Some(2),
                    limit: Some(10),
                    ..default_params()
                },
            )
            .await
            .unwrap();

        assert_eq!(dto.invoices.len(), 10);
        assert_eq!(dto.pagination.total_count, 25);
        assert_eq!(dto.pagination.total_pages, 3);
        assert!(dto.pagination.has_next);
        assert!(dto.pagination.has_prev);
    }

    #[tokio::test]
    async fn download_is_served_from_cached_pdf_url() {
        let user_id = Uuid::new_v4();
        let invoice_id = Uuid::new_v4();

        let mut invoice_repo = MockInvoiceRepository::new();
        invoice_repo
            .expect_find_by_id_for_user()
            .with(eq(invoice_id), eq(user_id))
            .returning(move |invoice_id, user_id| {
                let invoice = sample_invoice(
                    invoice_id,
                    user_id,
                    Some("https://pay.stripe.com/invoice/in_1.pdf"),
                    Some("in_1"),
                );
                Box::pin(async move { Ok(Some(invoice)) })
            });

        // No Stripe expectations: the cached URL must short-circuit the fetch.
        let usecase = InvoiceUseCase::new(
            Arc::new(existing_user(user_id)),
            Arc::new(invoice_repo),
            Arc::new(MockStripeGateway::new()),
        );

        let url = usecase
            .invoice_download_url(user_id, invoice_id)
            .await
            .unwrap();
        assert_eq!(url, "https://pay.stripe.com/invoice/in_1.pdf");
    }

    #[tokio::test]
    async fn download_fetches_and_caches_pdf_url_on_first_access() {
        let user_id = Uuid::new_v4();
        let invoice_id = Uuid::new_v4();

        let mut invoice_repo = MockInvoiceRepository::new();
        invoice_repo
            .expect_find_by_id_for_user()
            .returning(move |invoice_id, user_id| {
                let invoice = sample_invoice(invoice_id, user_id, None, Some("in_1"));
                Box::pin(async move { Ok(Some(invoice)) })
            });
        invoice_repo
            .expect_update_pdf_url()
            .with(eq(invoice_id), eq("https://pay.stripe.com/invoice/in_1.pdf"))
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(()) }));

        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_retrieve_invoice()
            .with(eq("in_1"))
            .times(1)
            .returning(|_| {
                Ok(StripeInvoice {
                    id: Some("in_1".to_string()),
                    status: Some("paid".to_string()),
                    amount_paid: Some(3500),
                    amount_due: None,
                    invoice_pdf: Some("https://pay.stripe.com/invoice/in_1.pdf".to_string()),
                    due_date: None,
                })
            });

        let usecase = InvoiceUseCase::new(
            Arc::new(existing_user(user_id)),
            Arc::new(invoice_repo),
            Arc::new(stripe),
        );

        let url = usecase
            .invoice_download_url(user_id, invoice_id)
            .await
            .unwrap();
        assert_eq!(url, "https://pay.stripe.com/invoice/in_1.pdf");
    }

    #[tokio::test]
    async fn download_without_any_pdf_reference_is_not_found() {
        let user_id = Uuid::new_v4();
        let invoice_id = Uuid::new_v4();

        let mut invoice_repo = MockInvoiceRepository::new();
        invoice_repo
            .expect_find_by_id_for_user()
            .returning(move |invoice_id, user_id| {
                let invoice = sample_invoice(invoice_id, user_id, None, None);
                Box::pin(async move { Ok(Some(invoice)) })
            });

        let usecase = InvoiceUseCase::new(
            Arc::new(existing_user(user_id)),
            Arc::new(invoice_repo),
            Arc::new(MockStripeGateway::new()),
        );

        let err = usecase
            .invoice_download_url(user_id, invoice_id)
            .await
            .unwrap_err();
        assert!(matches!(err, InvoiceError::PdfNotAvailable));
    }

    #[tokio::test]
    async fn unknown_invoice_is_not_found() {
        let user_id = Uuid::new_v4();

        let mut invoice_repo = MockInvoiceRepository::new();
        invoice_repo
            .expect_find_by_id_for_user()
            .returning(|_, _| Box::pin(async { Ok(None) }));

        let usecase = InvoiceUseCase::new(
            Arc::new(existing_user(user_id)),
            Arc::new(invoice_repo),
            Arc::new(MockStripeGateway::new()),
        );

        let err = usecase
            .get_invoice(user_id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, InvoiceError::InvoiceNotFound));
    }
}
