use anyhow::{Ok, Result};
use uuid::Uuid;

use super::config_model::{Database, DotEnvyConfig, Server, Storefront, Stripe};

const DEFAULT_WEBHOOK_TOLERANCE_SECS: &str = "300";

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let server = Server {
        port: std::env::var("SERVER_PORT")
            .expect("SERVER_PORT is invalid")
            .parse()?,
        body_limit: std::env::var("SERVER_BODY_LIMIT")
            .expect("SERVER_BODY_LIMIT is invalid")
            .parse()?,
        timeout: std::env::var("SERVER_TIMEOUT")
            .expect("SERVER_TIMEOUT is invalid")
            .parse()?,
    };

    let database = Database {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL is invalid"),
    };

    let stripe = Stripe {
        secret_key: std::env::var("STRIPE_SECRET_KEY").expect("STRIPE_SECRET_KEY is invalid"),
        webhook_secret: std::env::var("STRIPE_WEBHOOK_SECRET")
            .expect("STRIPE_WEBHOOK_SECRET is invalid"),
        webhook_tolerance_secs: std::env::var("STRIPE_WEBHOOK_TOLERANCE_SECS")
            .unwrap_or_else(|_| DEFAULT_WEBHOOK_TOLERANCE_SECS.to_string())
            .parse()?,
    };

    let storefront = Storefront {
        base_url: std::env::var("STOREFRONT_BASE_URL").expect("STOREFRONT_BASE_URL is invalid"),
        demo_user_id: Uuid::parse_str(
            &std::env::var("DEMO_USER_ID").expect("DEMO_USER_ID is invalid"),
        )?,
    };

    Ok(DotEnvyConfig {
        server,
        database,
        stripe,
        storefront,
    })
}
