use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Payment mode selected on the storefront checkout form.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentMode {
    #[serde(rename = "credit-purchase")]
    CreditPurchase,
    #[serde(rename = "subscription")]
    Subscription,
}

impl PaymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::CreditPurchase => "credit-purchase",
            PaymentMode::Subscription => "subscription",
        }
    }

    /// The Stripe Checkout `mode` parameter for this payment mode.
    pub fn checkout_mode(&self) -> &'static str {
        match self {
            PaymentMode::CreditPurchase => "payment",
            PaymentMode::Subscription => "subscription",
        }
    }

    /// The `type` metadata value attached to the checkout session.
    pub fn purchase_type(&self) -> &'static str {
        match self {
            PaymentMode::CreditPurchase => "credit_purchase",
            PaymentMode::Subscription => "subscription_purchase",
        }
    }
}

impl Display for PaymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
