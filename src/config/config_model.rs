use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub server: Server,
    pub database: Database,
    pub stripe: Stripe,
    pub storefront: Storefront,
}

#[derive(Debug, Clone)]
pub struct Server {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub webhook_secret: String,
    pub webhook_tolerance_secs: i64,
}

#[derive(Debug, Clone)]
pub struct Storefront {
    /// Base URL the hosted checkout returns to on success/cancel.
    pub base_url: String,
    /// Stand-in for an authenticated user; there is no auth system.
    pub demo_user_id: Uuid,
}
