pub mod axum_http;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod payments;
pub mod usecases;

use std::sync::Arc;

use anyhow::Result;
use infrastructure::postgres::postgres_connection;
use tracing::info;

pub async fn run() -> Result<()> {
    let dotenvy_env = config::config_loader::load()?;
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(&dotenvy_env.database.url)?;
    info!("Postgres connection has been established");

    axum_http::http_serve::start(Arc::new(dotenvy_env), Arc::new(postgres_pool)).await?;

    Ok(())
}
