#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, Utc};

use irenatech_backend::db::operations::{
    ElementUsageRow, GeneralStatsRow, NewProgressEvent, SimulationPage, SimulationRow, SummaryRow,
    TheoryRow, UserKind,
};
use irenatech_backend::services::progress::mock::MockDataProvider;
use irenatech_backend::services::progress::models::{HistoryQuery, SimulationStatus};
use irenatech_backend::services::progress::store::{ProgressStore, StoreError};
use irenatech_backend::services::progress::ProgressService;
use irenatech_backend::state::AppState;

pub async fn create_test_app() -> Router {
    std::env::set_var("DATABASE_URL", "");
    std::env::set_var("PROGRESS_MOCK_FALLBACK", "true");

    irenatech_backend::create_app().await
}

pub fn app_with_service(service: ProgressService) -> Router {
    irenatech_backend::app(AppState::new(None, Arc::new(service)))
}

pub fn mock_backed_service(store: Option<Arc<dyn ProgressStore>>) -> ProgressService {
    ProgressService::new(store).with_fallback(Arc::new(MockDataProvider::new()))
}

/// A store whose every call fails the way an unreachable database does.
pub struct FailingStore;

#[async_trait]
impl ProgressStore for FailingStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn progress_summary(&self, _user_id: i64) -> Result<Option<SummaryRow>, StoreError> {
        Err(StoreError::Sqlx(sqlx::Error::PoolTimedOut))
    }

    async fn general_statistics(
        &self,
        _user_id: i64,
    ) -> Result<Option<GeneralStatsRow>, StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn element_usage(&self, _user_id: i64) -> Result<Vec<ElementUsageRow>, StoreError> {
        Err(StoreError::Sqlx(sqlx::Error::PoolClosed))
    }

    async fn simulation_page(
        &self,
        _user_id: i64,
        _query: &HistoryQuery,
    ) -> Result<SimulationPage, StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn theory_progress(&self, _user_id: i64) -> Result<Vec<TheoryRow>, StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn user_kind(&self, _user_id: i64) -> Result<Option<UserKind>, StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn record_progress_event(
        &self,
        _event: &NewProgressEvent,
    ) -> Result<Option<i64>, StoreError> {
        Err(StoreError::Unavailable)
    }
}

/// Canned rows keyed by user id. Writes are recorded for inspection.
#[derive(Default)]
pub struct InMemoryStore {
    pub summaries: HashMap<i64, SummaryRow>,
    pub general: HashMap<i64, GeneralStatsRow>,
    pub element_usage: HashMap<i64, Vec<ElementUsageRow>>,
    pub simulations: HashMap<i64, Vec<SimulationRow>>,
    pub theories: HashMap<i64, Vec<TheoryRow>>,
    pub users: HashMap<i64, UserKind>,
    pub recorded: Mutex<Vec<NewProgressEvent>>,
    pub fail_writes: bool,
    /// Reported instead of the real count, as a count read before an insert would be.
    pub stale_total: Option<i64>,
}

impl InMemoryStore {
    pub fn recorded_events(&self) -> Vec<NewProgressEvent> {
        self.recorded.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProgressStore for InMemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn progress_summary(&self, user_id: i64) -> Result<Option<SummaryRow>, StoreError> {
        Ok(self.summaries.get(&user_id).cloned())
    }

    async fn general_statistics(
        &self,
        user_id: i64,
    ) -> Result<Option<GeneralStatsRow>, StoreError> {
        Ok(self.general.get(&user_id).cloned())
    }

    async fn element_usage(&self, user_id: i64) -> Result<Vec<ElementUsageRow>, StoreError> {
        Ok(self.element_usage.get(&user_id).cloned().unwrap_or_default())
    }

    async fn simulation_page(
        &self,
        user_id: i64,
        query: &HistoryQuery,
    ) -> Result<SimulationPage, StoreError> {
        let matching: Vec<SimulationRow> = self
            .simulations
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|row| match query.status {
                None => true,
                Some(wanted) => {
                    let status = row
                        .status
                        .as_deref()
                        .and_then(SimulationStatus::parse)
                        .unwrap_or(SimulationStatus::Completed);
                    status == wanted
                }
            })
            .collect();

        Ok(SimulationPage {
            total_count: self.stale_total.unwrap_or(matching.len() as i64),
            rows: matching
                .into_iter()
                .skip(query.offset as usize)
                .take(query.limit as usize)
                .collect(),
        })
    }

    async fn theory_progress(&self, user_id: i64) -> Result<Vec<TheoryRow>, StoreError> {
        Ok(self.theories.get(&user_id).cloned().unwrap_or_default())
    }

    async fn user_kind(&self, user_id: i64) -> Result<Option<UserKind>, StoreError> {
        Ok(self.users.get(&user_id).copied())
    }

    async fn record_progress_event(
        &self,
        event: &NewProgressEvent,
    ) -> Result<Option<i64>, StoreError> {
        if self.fail_writes {
            return Err(StoreError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        let mut recorded = self.recorded.lock().unwrap();
        recorded.push(event.clone());
        Ok(Some(recorded.len() as i64))
    }
}

pub fn summary_row(kind: UserKind) -> SummaryRow {
    SummaryRow {
        level_label: Some("Intermedio".to_string()),
        total_score: 720,
        simulations_completed: 3,
        simulations_total: 12,
        theories_completed: 5,
        theories_total: 10,
        total_minutes: 95,
        user_kind: kind,
        ranking_position: Some(4),
    }
}

pub fn general_row(total: i64, completed: i64, in_progress: i64, failed: i64) -> GeneralStatsRow {
    GeneralStatsRow {
        total_simulations: total,
        simulations_completed: completed,
        simulations_in_progress: in_progress,
        simulations_failed: failed,
        distinct_elements_used: 2,
        theories_read: 1,
        theories_total: 4,
        ai_questions_asked: 0,
        total_points: 320,
        level_label: None,
        total_minutes: 75,
    }
}

pub fn simulation_row(
    id: i64,
    status: Option<&str>,
    points: i64,
    elements: i64,
    at: i64,
) -> SimulationRow {
    SimulationRow {
        simulation_id: id,
        name: format!("Simulation {id}"),
        timestamp: DateTime::<Utc>::from_timestamp(at, 0).unwrap(),
        description: None,
        status: status.map(str::to_string),
        duration_minutes: None,
        simulation_type: None,
        points_earned: points,
        elements_used: elements,
    }
}

pub fn usage(id: i64, symbol: &str, quantity: f64) -> ElementUsageRow {
    ElementUsageRow {
        element_id: id,
        element_name: symbol.to_string(),
        symbol: symbol.to_string(),
        quantity,
    }
}
