use crate::auth::repo::{PgUserRepo, UserRepo};
use crate::config::AppConfig;
use crate::db;
use crate::listings::repo::{ListingRepo, PgListingRepo};
use crate::storage::{LocalStorage, StorageClient};
use std::sync::Arc;

/// Process-wide handles, built once at startup and cloned into every
/// request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub listings: Arc<dyn ListingRepo>,
    pub storage: Arc<dyn StorageClient>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let pool = db::connect(&config).await?;
        db::migrate(&pool).await;

        let storage = Arc::new(LocalStorage::new(&config.upload_dir).await?) as Arc<dyn StorageClient>;

        Ok(Self::from_parts(
            config,
            Arc::new(PgUserRepo::new(pool.clone())),
            Arc::new(PgListingRepo::new(pool)),
            storage,
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        listings: Arc<dyn ListingRepo>,
        storage: Arc<dyn StorageClient>,
    ) -> Self {
        Self {
            config,
            users,
            listings,
            storage,
        }
    }

    /// State backed by in-memory stores.
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::test_support::{MemoryListingRepo, MemoryStorage, MemoryUserRepo};

        Self::from_parts(
            Arc::new(AppConfig::for_tests()),
            Arc::new(MemoryUserRepo::default()),
            Arc::new(MemoryListingRepo::default()),
            Arc::new(MemoryStorage::default()),
        )
    }
}
