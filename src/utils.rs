//! Helper functions shared by the binary and the services

use crate::config;
use anyhow::Context;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{sync::LazyLock, time::Duration};

pub async fn setup_postgres_db_pool() -> anyhow::Result<PgPool> {
    let app_config = config::APP_CONFIG
        .get()
        .context("failed to get app config")?;

    PgPoolOptions::new()
        .max_connections(app_config.db_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&app_config.db_host)
        .await
        .context("failed to connect to postgres")
}

/// Client to make http requests
pub static REQUEST_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(reqwest::Client::new);
