use serde::{Deserialize, Serialize};

use crate::domain::value_objects::enums::payment_modes::PaymentMode;

/// Form payload of the storefront checkout endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutSessionForm {
    pub product_id: String,
    pub payment_mode: PaymentMode,
    pub quantity: Option<i32>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CheckoutSessionDto {
    pub session_id: String,
    pub url: String,
}
