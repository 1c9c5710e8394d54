use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::db::DatabaseProxy;
use crate::services::progress::mock::MockDataProvider;
use crate::services::progress::store::{PgProgressStore, ProgressStore};
use crate::services::progress::ProgressService;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    db_proxy: Option<Arc<DatabaseProxy>>,
    progress: Arc<ProgressService>,
}

impl AppState {
    pub fn new(db_proxy: Option<Arc<DatabaseProxy>>, progress: Arc<ProgressService>) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            db_proxy,
            progress,
        }
    }

    pub fn create_progress_service(
        db_proxy: Option<Arc<DatabaseProxy>>,
        mock_fallback: bool,
    ) -> Arc<ProgressService> {
        let store = db_proxy.map(|proxy| Arc::new(PgProgressStore::new(proxy)) as Arc<dyn ProgressStore>);
        let service = ProgressService::new(store);
        let service = if mock_fallback {
            service.with_fallback(Arc::new(MockDataProvider::new()))
        } else {
            service
        };
        Arc::new(service)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn db_proxy(&self) -> Option<Arc<DatabaseProxy>> {
        self.db_proxy.clone()
    }

    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }
}
