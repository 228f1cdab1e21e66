use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    #[default]
    Pending,
    Open,
    Paid,
    Void,
    Failed,
    Expired,
    Canceled,
    Unpaid,
}

impl Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Open => "open",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Void => "void",
            InvoiceStatus::Failed => "failed",
            InvoiceStatus::Expired => "expired",
            InvoiceStatus::Canceled => "canceled",
            InvoiceStatus::Unpaid => "unpaid",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "pending" => InvoiceStatus::Pending,
            "open" => InvoiceStatus::Open,
            "paid" => InvoiceStatus::Paid,
            "void" => InvoiceStatus::Void,
            "failed" => InvoiceStatus::Failed,
            "expired" => InvoiceStatus::Expired,
            "canceled" => InvoiceStatus::Canceled,
            "unpaid" => InvoiceStatus::Unpaid,
            _ => InvoiceStatus::Pending,
        }
    }

    /// Maps the provider's invoice status vocabulary onto the local one.
    pub fn from_provider(value: &str) -> Self {
        match value {
            "draft" => InvoiceStatus::Pending,
            "open" => InvoiceStatus::Open,
            "paid" => InvoiceStatus::Paid,
            "uncollectible" => InvoiceStatus::Failed,
            "void" => InvoiceStatus::Void,
            _ => InvoiceStatus::Pending,
        }
    }

    /// Terminal statuses are never overwritten by a later sync.
    pub fn is_terminal(&self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Void)
    }

    /// Whether a sync may move this status to `next`. Re-applying the same
    /// status is always allowed so replayed events stay idempotent.
    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        *self == next || !self.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_status_mapping_table() {
        assert_eq!(InvoiceStatus::from_provider("draft"), InvoiceStatus::Pending);
        assert_eq!(InvoiceStatus::from_provider("open"), InvoiceStatus::Open);
        assert_eq!(InvoiceStatus::from_provider("paid"), InvoiceStatus::Paid);
        assert_eq!(
            InvoiceStatus::from_provider("uncollectible"),
            InvoiceStatus::Failed
        );
        assert_eq!(InvoiceStatus::from_provider("void"), InvoiceStatus::Void);
        assert_eq!(
            InvoiceStatus::from_provider("something_new"),
            InvoiceStatus::Pending
        );
    }

    #[test]
    fn paid_and_void_never_downgrade() {
        assert!(!InvoiceStatus::Paid.can_transition_to(InvoiceStatus::Pending));
        assert!(!InvoiceStatus::Void.can_transition_to(InvoiceStatus::Open));
        assert!(!InvoiceStatus::Paid.can_transition_to(InvoiceStatus::Void));
        assert!(InvoiceStatus::Paid.can_transition_to(InvoiceStatus::Paid));
        assert!(InvoiceStatus::Pending.can_transition_to(InvoiceStatus::Paid));
        assert!(InvoiceStatus::Open.can_transition_to(InvoiceStatus::Void));
    }
}
