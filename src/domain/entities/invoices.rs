use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infrastructure::postgres::schema::invoices;

/// Local mirror of a billing invoice. Exactly one of `credit_purchase_id`
/// and `user_subscription_id` is set (enforced by a table check constraint).
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = invoices)]
pub struct InvoiceEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub credit_purchase_id: Option<Uuid>,
    pub user_subscription_id: Option<Uuid>,
    pub stripe_invoice_id: Option<String>,
    pub amount_minor: i32,
    pub status: String,
    pub pdf_url: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = invoices)]
pub struct InsertInvoiceEntity {
    pub user_id: Uuid,
    pub credit_purchase_id: Option<Uuid>,
    pub user_subscription_id: Option<Uuid>,
    pub stripe_invoice_id: Option<String>,
    pub amount_minor: i32,
    pub status: String,
    pub pdf_url: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
}
