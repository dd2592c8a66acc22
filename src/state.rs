use crate::config::AppConfig;
use crate::store::{GameStore, PgStore};
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn GameStore>,
}

impl AppState {
    pub async fn init(config: &AppConfig) -> anyhow::Result<Self> {
        let store = PgStore::connect(&config.database_url, config.db_max_connections).await?;

        if config.run_migrations {
            if let Err(e) = store.migrate().await {
                warn!(error = %e, "migration failed; continuing");
            }
        }

        Ok(Self::from_store(Arc::new(store)))
    }

    pub fn from_store(store: Arc<dyn GameStore>) -> Self {
        Self { store }
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(crate::store::MemoryStore::new()))
    }
}
