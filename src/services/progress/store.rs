use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::db::operations::{
    self, ElementUsageRow, GeneralStatsRow, NewProgressEvent, SimulationPage, SummaryRow,
    TheoryRow, UserKind,
};
use crate::db::DatabaseProxy;

use super::models::{
    ElementStatistics, GeneralStatistics, HistoryQuery, SimulationHistory, TheoryProgress,
    UserProgressSummary,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database unavailable")]
    Unavailable,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("malformed data: {0}")]
    Malformed(String),
}

/// Live data access for the progress service.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    /// `None` when the user has no statistics row.
    async fn progress_summary(&self, user_id: i64) -> Result<Option<SummaryRow>, StoreError>;

    async fn general_statistics(&self, user_id: i64)
        -> Result<Option<GeneralStatsRow>, StoreError>;

    async fn element_usage(&self, user_id: i64) -> Result<Vec<ElementUsageRow>, StoreError>;

    /// One page plus the total row count under the same filter.
    async fn simulation_page(
        &self,
        user_id: i64,
        query: &HistoryQuery,
    ) -> Result<SimulationPage, StoreError>;

    async fn theory_progress(&self, user_id: i64) -> Result<Vec<TheoryRow>, StoreError>;

    async fn user_kind(&self, user_id: i64) -> Result<Option<UserKind>, StoreError>;

    async fn record_progress_event(
        &self,
        event: &NewProgressEvent,
    ) -> Result<Option<i64>, StoreError>;
}

/// Substitute answers for read paths when the store cannot serve them.
/// Implementations are pure functions of their arguments and cannot fail.
pub trait FallbackSource: Send + Sync {
    fn progress_summary(&self, user_id: i64) -> UserProgressSummary;
    fn general_statistics(&self, user_id: i64) -> GeneralStatistics;
    fn element_statistics(&self, user_id: i64) -> ElementStatistics;
    fn simulation_history(&self, user_id: i64, query: &HistoryQuery) -> SimulationHistory;
    fn theory_progress(&self, user_id: i64) -> Vec<TheoryProgress>;
}

/// PostgreSQL-backed store. Every call checks out its own pooled connection,
/// which goes back to the pool when dropped.
#[derive(Clone)]
pub struct PgProgressStore {
    proxy: Arc<DatabaseProxy>,
}

impl PgProgressStore {
    pub fn new(proxy: Arc<DatabaseProxy>) -> Self {
        Self { proxy }
    }
}

#[async_trait]
impl ProgressStore for PgProgressStore {
    async fn ping(&self) -> Result<(), StoreError> {
        if self.proxy.check_health().await.is_healthy() {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }

    async fn progress_summary(&self, user_id: i64) -> Result<Option<SummaryRow>, StoreError> {
        let mut conn = self.proxy.pool().acquire().await?;
        Ok(operations::select_progress_summary(&mut conn, user_id).await?)
    }

    async fn general_statistics(
        &self,
        user_id: i64,
    ) -> Result<Option<GeneralStatsRow>, StoreError> {
        let mut conn = self.proxy.pool().acquire().await?;
        Ok(operations::select_general_statistics(&mut conn, user_id).await?)
    }

    async fn element_usage(&self, user_id: i64) -> Result<Vec<ElementUsageRow>, StoreError> {
        let mut conn = self.proxy.pool().acquire().await?;
        Ok(operations::select_element_usage(&mut conn, user_id).await?)
    }

    async fn simulation_page(
        &self,
        user_id: i64,
        query: &HistoryQuery,
    ) -> Result<SimulationPage, StoreError> {
        let status = query.status.map(|s| s.store_label());
        let offset = i64::try_from(query.offset)
            .map_err(|_| StoreError::Malformed(format!("offset too large: {}", query.offset)))?;

        // Count and page read from the same snapshot.
        let mut tx = self.proxy.pool().begin().await?;
        operations::begin_snapshot_read(&mut tx).await?;
        let total_count = operations::count_simulations(&mut tx, user_id, status).await?;
        let rows = operations::select_simulations(
            &mut tx,
            user_id,
            status,
            i64::from(query.limit),
            offset,
        )
        .await?;
        tx.commit().await?;

        Ok(SimulationPage { total_count, rows })
    }

    async fn theory_progress(&self, user_id: i64) -> Result<Vec<TheoryRow>, StoreError> {
        let mut conn = self.proxy.pool().acquire().await?;
        Ok(operations::select_theory_progress(&mut conn, user_id).await?)
    }

    async fn user_kind(&self, user_id: i64) -> Result<Option<UserKind>, StoreError> {
        let mut conn = self.proxy.pool().acquire().await?;
        Ok(operations::select_user_kind(&mut conn, user_id).await?)
    }

    async fn record_progress_event(
        &self,
        event: &NewProgressEvent,
    ) -> Result<Option<i64>, StoreError> {
        let mut tx = self.proxy.pool().begin().await?;
        let id = operations::insert_progress_event(&mut tx, event).await?;
        tx.commit().await?;
        Ok(id)
    }
}
