use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{
    Connection, OptionalExtension, PgConnection, RunQueryDsl, insert_into, prelude::*, update,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    entities::invoices::{InsertInvoiceEntity, InvoiceEntity},
    repositories::invoices::{InvoiceRepository, InvoiceSyncOutcome, ProviderInvoiceSync},
    value_objects::{enums::invoice_statuses::InvoiceStatus, invoices::InvoiceListQuery},
};
use crate::infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::invoices};

pub struct InvoicePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl InvoicePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }

    fn filtered_query<'a>(
        user_id: Uuid,
        query: &InvoiceListQuery,
    ) -> invoices::BoxedQuery<'a, diesel::pg::Pg> {
        let mut filtered = invoices::table
            .filter(invoices::user_id.eq(user_id))
            .into_boxed();

        if let Some(status) = query.status {
            filtered = filtered.filter(invoices::status.eq(status.to_string()));
        }
        if let Some(date_from) = query.date_from {
            filtered = filtered.filter(invoices::created_at.ge(date_from));
        }
        if let Some(date_to) = query.date_to {
            filtered = filtered.filter(invoices::created_at.le(date_to));
        }

        filtered
    }

    /// Applies the monotonic status update to an existing row. Terminal
    /// statuses refuse any transition except re-applying themselves.
    fn update_existing(
        conn: &mut PgConnection,
        invoice_id: Uuid,
        current_status: InvoiceStatus,
        existing_pdf_url: Option<String>,
        sync: &ProviderInvoiceSync,
    ) -> Result<InvoiceSyncOutcome> {
        if !current_status.can_transition_to(sync.status) {
            return Ok(InvoiceSyncOutcome::SkippedDowngrade(invoice_id));
        }

        update(invoices::table.filter(invoices::id.eq(invoice_id)))
            .set((
                invoices::status.eq(sync.status.to_string()),
                invoices::amount_minor.eq(sync.amount_minor),
                invoices::pdf_url.eq(sync.pdf_url.clone().or(existing_pdf_url)),
                invoices::due_at.eq(sync.due_at),
                invoices::paid_at.eq(sync.paid_at),
                invoices::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;

        Ok(InvoiceSyncOutcome::Updated(invoice_id))
    }
}

#[async_trait]
impl InvoiceRepository for InvoicePostgres {
    async fn sync_provider_invoice(
        &self,
        sync: ProviderInvoiceSync,
    ) -> Result<InvoiceSyncOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let outcome = conn.transaction::<InvoiceSyncOutcome, anyhow::Error, _>(|conn| {
            let existing = invoices::table
                .filter(invoices::stripe_invoice_id.eq(&sync.stripe_invoice_id))
                .select((invoices::id, invoices::status, invoices::pdf_url))
                .first::<(Uuid, String, Option<String>)>(conn)
                .optional()?;

            if let Some((invoice_id, status, pdf_url)) = existing {
                return Self::update_existing(
                    conn,
                    invoice_id,
                    InvoiceStatus::from_str(&status),
                    pdf_url,
                    &sync,
                );
            }

            let inserted = insert_into(invoices::table)
                .values(&InsertInvoiceEntity {
                    user_id: sync.user_id,
                    credit_purchase_id: None,
                    user_subscription_id: sync.user_subscription_id,
                    stripe_invoice_id: Some(sync.stripe_invoice_id.clone()),
                    amount_minor: sync.amount_minor,
                    status: sync.status.to_string(),
                    pdf_url: sync.pdf_url.clone(),
                    due_at: sync.due_at,
                    paid_at: sync.paid_at,
                })
                .on_conflict(invoices::stripe_invoice_id)
                .do_nothing()
                .returning(invoices::id)
                .get_result::<Uuid>(conn)
                .optional()?;

            match inserted {
                Some(invoice_id) => Ok(InvoiceSyncOutcome::Created(invoice_id)),
                // Lost an insert race with a concurrent delivery; apply the
                // monotonic update against the row that won.
                None => {
                    let (invoice_id, status, pdf_url) = invoices::table
                        .filter(invoices::stripe_invoice_id.eq(&sync.stripe_invoice_id))
                        .select((invoices::id, invoices::status, invoices::pdf_url))
                        .first::<(Uuid, String, Option<String>)>(conn)?;

                    Self::update_existing(
                        conn,
                        invoice_id,
                        InvoiceStatus::from_str(&status),
                        pdf_url,
                        &sync,
                    )
                }
            }
        })?;

        Ok(outcome)
    }

    async fn find_by_id_for_user(
        &self,
        invoice_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<InvoiceEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let invoice = invoices::table
            .filter(invoices::id.eq(invoice_id))
            .filter(invoices::user_id.eq(user_id))
            .select(InvoiceEntity::as_select())
            .first::<InvoiceEntity>(&mut conn)
            .optional()?;

        Ok(invoice)
    }

    async fn find_by_stripe_invoice_id_for_user(
        &self,
        stripe_invoice_id: &str,
        user_id: Uuid,
    ) -> Result<Option<InvoiceEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let invoice = invoices::table
            .filter(invoices::stripe_invoice_id.eq(stripe_invoice_id))
            .filter(invoices::user_id.eq(user_id))
            .select(InvoiceEntity::as_select())
            .first::<InvoiceEntity>(&mut conn)
            .optional()?;

        Ok(invoice)
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        query: InvoiceListQuery,
    ) -> Result<(Vec<InvoiceEntity>, i64)> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let total_count = Self::filtered_query(user_id, &query)
            .count()
            .get_result::<i64>(&mut conn)?;

        let page = Self::filtered_query(user_id, &query)
            .order(invoices::created_at.desc())
            .offset(query.offset())
            .limit(query.limit)
            .select(InvoiceEntity::as_select())
            .load::<InvoiceEntity>(&mut conn)?;

        Ok((page, total_count))
    }

    async fn update_pdf_url(&self, invoice_id: Uuid, pdf_url: &str) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(invoices::table.filter(invoices::id.eq(invoice_id)))
            .set((
                invoices::pdf_url.eq(Some(pdf_url)),
                invoices::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }
}
