use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::config::AppConfig;
use crate::gateway::{HttpGateway, PaymentGateway};
use crate::store::{PgStore, RecordStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Connects to Postgres, runs migrations and builds the gateway client.
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        let gateway = HttpGateway::new(&config.gateway).context("build gateway client")?;

        Ok(Self {
            store: Arc::new(PgStore::new(db)),
            gateway: Arc::new(gateway),
            config,
        })
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn RecordStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            store,
            gateway,
            config,
        }
    }
}
