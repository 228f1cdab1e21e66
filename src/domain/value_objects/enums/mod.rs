pub mod invoice_statuses;
pub mod payment_modes;
pub mod subscription_statuses;
