use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::credit_purchases::InsertCreditPurchaseEntity;

/// Invoice fields recorded alongside a completed credit purchase.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseInvoiceDraft {
    pub stripe_invoice_id: Option<String>,
    pub amount_minor: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseOutcome {
    Applied,
    /// The payment-intent reference already has a purchase row; the event
    /// was delivered before and every effect must be skipped.
    AlreadyProcessed,
}

#[async_trait]
#[automock]
pub trait CreditPurchaseRepository {
    /// Applies the full effect of a completed credit purchase as one
    /// transaction: insert the purchase row keyed by the payment-intent
    /// reference, increment the user's credits by `credits_delta`, and
    /// create the PAID invoice. The purchase insert is the point of
    /// idempotency: a unique-key conflict means the event was already
    /// processed and nothing else is applied.
    async fn record_completed_purchase(
        &self,
        purchase: InsertCreditPurchaseEntity,
        credits_delta: i32,
        invoice: PurchaseInvoiceDraft,
    ) -> Result<PurchaseOutcome>;
}
