use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::invoices::InvoiceEntity;
use crate::domain::value_objects::enums::invoice_statuses::InvoiceStatus;
use crate::domain::value_objects::invoices::InvoiceListQuery;

/// State observed on a provider invoice, applied to the local mirror.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderInvoiceSync {
    pub stripe_invoice_id: String,
    pub user_id: Uuid,
    pub user_subscription_id: Option<Uuid>,
    pub amount_minor: i32,
    pub status: InvoiceStatus,
    pub pdf_url: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceSyncOutcome {
    Created(Uuid),
    Updated(Uuid),
    /// The stored status is terminal and the incoming one would downgrade
    /// it; the row was left untouched.
    SkippedDowngrade(Uuid),
}

#[async_trait]
#[automock]
pub trait InvoiceRepository {
    /// Upserts the local mirror of a provider invoice inside one
    /// transaction, refusing monotonicity-violating status downgrades.
    async fn sync_provider_invoice(
        &self,
        sync: ProviderInvoiceSync,
    ) -> Result<InvoiceSyncOutcome>;

    async fn find_by_id_for_user(
        &self,
        invoice_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<InvoiceEntity>>;

    async fn find_by_stripe_invoice_id_for_user(
        &self,
        stripe_invoice_id: &str,
        user_id: Uuid,
    ) -> Result<Option<InvoiceEntity>>;

    /// Returns the page of invoices plus the unpaginated total count.
    async fn list_for_user(
        &self,
        user_id: Uuid,
        query: InvoiceListQuery,
    ) -> Result<(Vec<InvoiceEntity>, i64)>;

    async fn update_pdf_url(&self, invoice_id: Uuid, pdf_url: &str) -> Result<()>;
}
