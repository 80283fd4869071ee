use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::config::ProgressConfig;
use crate::error::AppServicesError;
use crate::progress_service::ProgressService;

/// Assembles the services the CLI talks to.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    progress: Arc<ProgressService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage at `config.database_url`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(clock: Clock, config: ProgressConfig) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(&config.database_url).await?;
        Ok(Self::from_storage(storage, clock, config))
    }

    /// Build services over in-memory repositories.
    #[must_use]
    pub fn in_memory(clock: Clock, config: ProgressConfig) -> Self {
        Self::from_storage(Storage::in_memory(), clock, config)
    }

    #[must_use]
    pub fn from_storage(storage: Storage, clock: Clock, config: ProgressConfig) -> Self {
        let progress = Arc::new(ProgressService::new(
            clock,
            config,
            Arc::clone(&storage.progress),
            Arc::clone(&storage.enrollments),
            Arc::clone(&storage.courses),
        ));
        Self { storage, progress }
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    /// Raw repository access, used for catalog seeding.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }
}
