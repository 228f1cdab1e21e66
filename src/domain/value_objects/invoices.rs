use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::invoices::InvoiceEntity;
use crate::domain::value_objects::enums::invoice_statuses::InvoiceStatus;

pub const DEFAULT_PAGE_LIMIT: i64 = 10;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Query string of the invoice list endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceListQueryParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<InvoiceStatus>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

/// Validated list query handed to the repository.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceListQuery {
    pub page: i64,
    pub limit: i64,
    pub status: Option<InvoiceStatus>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl InvoiceListQuery {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDto {
    pub id: Uuid,
    pub credit_purchase_id: Option<Uuid>,
    pub user_subscription_id: Option<Uuid>,
    pub stripe_invoice_id: Option<String>,
    pub amount_minor: i32,
    pub status: InvoiceStatus,
    pub pdf_url: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<InvoiceEntity> for InvoiceDto {
    fn from(value: InvoiceEntity) -> Self {
        Self {
            id: value.id,
            credit_purchase_id: value.credit_purchase_id,
            user_subscription_id: value.user_subscription_id,
            stripe_invoice_id: value.stripe_invoice_id,
            amount_minor: value.amount_minor,
            status: InvoiceStatus::from_str(&value.status),
            pdf_url: value.pdf_url,
            due_at: value.due_at,
            paid_at: value.paid_at,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaginationDto {
    pub page: i64,
    pub limit: i64,
    pub total_count: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceListDto {
    pub invoices: Vec<InvoiceDto>,
    pub pagination: PaginationDto,
}
