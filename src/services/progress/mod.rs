//! Progress and gamification aggregation.
//!
//! Read operations try the live store once. On a store error, a missing user
//! row, or a shaped response that fails its own validation, they fall back
//! to the configured [`FallbackSource`]. Without a fallback the error
//! surfaces as [`ProgressError::Unavailable`]. The single write operation
//! never falls back.

pub mod metrics;
pub mod mock;
pub mod models;
pub mod store;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use thiserror::Error;

use crate::db::operations::{
    ElementUsageRow, GeneralStatsRow, NewProgressEvent, SimulationPage, SimulationRow,
    SummaryRow, TheoryRow,
};

use self::metrics::{
    efficiency_tier, percentage, readable_duration, round2, BandedEstimator, LevelThresholds,
    PerformanceEstimator,
};
use self::models::{
    ElementStatistics, ElementUsageStatistic, ExperienceLevel, GeneralProgress,
    GeneralStatistics, HistoryQuery, ModelViolation, ProgressEvent, SaveProgressResult,
    ServiceHealth, SimulationHistory, SimulationHistoryEntry, SimulationStatus, TheoryProgress,
    UserProgressSummary, TOP_ELEMENTS,
};
use self::store::{FallbackSource, ProgressStore, StoreError};

const SERVICE_NAME: &str = "progress";
const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_SIMULATION_MINUTES: i64 = 30;
const DEFAULT_SIMULATION_DESCRIPTION: &str = "Chemistry simulation";
const DEFAULT_SIMULATION_TYPE: &str = "General";
const DEFAULT_EVENT_DESCRIPTION: &str = "Progress saved";

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("{0}")]
    Validation(String),
    #[error("user {0} not found")]
    UserNotFound(i64),
    #[error("failed to persist progress event: {0}")]
    WriteFailure(#[source] StoreError),
    #[error("progress data unavailable: {0}")]
    Unavailable(#[source] StoreError),
}

/// Why a live read could not be used.
#[derive(Debug, Error)]
enum ReadFailure {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no statistics row for user")]
    Missing,
    #[error(transparent)]
    Invalid(#[from] ModelViolation),
}

impl ReadFailure {
    fn into_store_error(self) -> StoreError {
        match self {
            Self::Store(err) => err,
            Self::Missing => StoreError::Malformed("no statistics row for user".to_string()),
            Self::Invalid(violation) => StoreError::Malformed(violation.to_string()),
        }
    }
}

pub struct ProgressService {
    store: Option<Arc<dyn ProgressStore>>,
    fallback: Option<Arc<dyn FallbackSource>>,
    estimator: Arc<dyn PerformanceEstimator>,
    thresholds: LevelThresholds,
}

impl ProgressService {
    pub fn new(store: Option<Arc<dyn ProgressStore>>) -> Self {
        Self {
            store,
            fallback: None,
            estimator: Arc::new(BandedEstimator),
            thresholds: LevelThresholds::default(),
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackSource>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn PerformanceEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_level_thresholds(mut self, thresholds: LevelThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn fallback_enabled(&self) -> bool {
        self.fallback.is_some()
    }

    fn store(&self) -> Result<&dyn ProgressStore, StoreError> {
        self.store.as_deref().ok_or(StoreError::Unavailable)
    }

    /// Returns the fallback answer for a failed read, or the failure itself
    /// when fallback is disabled.
    fn recover<T>(
        &self,
        operation: &'static str,
        user_id: i64,
        failure: ReadFailure,
        substitute: impl FnOnce(&dyn FallbackSource) -> T,
    ) -> Result<T, ProgressError> {
        match &failure {
            ReadFailure::Invalid(violation) => {
                tracing::error!(operation, user_id, error = %violation, "live progress data failed validation");
            }
            other => {
                tracing::warn!(operation, user_id, error = %other, "live progress data unavailable");
            }
        }

        match self.fallback.as_deref() {
            Some(fallback) => {
                tracing::warn!(operation, user_id, "serving mock progress data");
                Ok(substitute(fallback))
            }
            None => Err(ProgressError::Unavailable(failure.into_store_error())),
        }
    }

    pub async fn get_progress_summary(
        &self,
        user_id: i64,
    ) -> Result<UserProgressSummary, ProgressError> {
        validate_user_id(user_id)?;

        match self.live_summary(user_id).await {
            Ok(summary) => {
                tracing::debug!(user_id, "progress summary served from store");
                Ok(summary)
            }
            Err(failure) => self.recover("progress_summary", user_id, failure, |f| {
                f.progress_summary(user_id)
            }),
        }
    }

    async fn live_summary(&self, user_id: i64) -> Result<UserProgressSummary, ReadFailure> {
        let row = self
            .store()?
            .progress_summary(user_id)
            .await?
            .ok_or(ReadFailure::Missing)?;
        let summary = self.shape_summary(user_id, row);
        summary.validate()?;
        Ok(summary)
    }

    fn shape_summary(&self, user_id: i64, row: SummaryRow) -> UserProgressSummary {
        let total_score = non_negative(row.total_score);
        let simulations_completed = non_negative(row.simulations_completed);
        let simulations_total = non_negative(row.simulations_total);
        let theories_completed = non_negative(row.theories_completed);
        let theories_total = non_negative(row.theories_total);
        let is_anonymous = row.user_kind.is_anonymous();

        UserProgressSummary {
            user_id,
            experience_level: self.resolve_level(row.level_label.as_deref(), total_score),
            total_score,
            simulations_completed,
            simulations_total,
            theories_completed,
            theories_total,
            simulation_progress_pct: percentage(simulations_completed, simulations_total),
            theory_progress_pct: percentage(theories_completed, theories_total),
            total_time_readable: readable_duration(row.total_minutes),
            can_save_progress: !is_anonymous,
            is_anonymous_user: is_anonymous,
            ranking_position: row
                .ranking_position
                .and_then(|p| u32::try_from(p).ok())
                .filter(|p| *p > 0),
        }
    }

    fn resolve_level(&self, label: Option<&str>, score: u64) -> ExperienceLevel {
        label
            .and_then(ExperienceLevel::parse)
            .unwrap_or_else(|| ExperienceLevel::from_score(score, &self.thresholds))
    }

    /// Falls back as one unit so the mock never mixes with live parts.
    pub async fn get_general_progress(
        &self,
        user_id: i64,
    ) -> Result<GeneralProgress, ProgressError> {
        validate_user_id(user_id)?;

        match self.live_general_progress(user_id).await {
            Ok(progress) => Ok(progress),
            Err(failure) => self.recover("general_progress", user_id, failure, |f| {
                let mut top_elements = f.element_statistics(user_id).statistics;
                top_elements.truncate(TOP_ELEMENTS);
                GeneralProgress {
                    user_id,
                    general_statistics: f.general_statistics(user_id),
                    top_elements,
                    theory_progress: f.theory_progress(user_id),
                }
            }),
        }
    }

    async fn live_general_progress(&self, user_id: i64) -> Result<GeneralProgress, ReadFailure> {
        let (statistics, elements, theories) = tokio::join!(
            self.live_general_statistics(user_id),
            self.live_element_statistics(user_id),
            self.live_theory_progress(user_id),
        );

        let mut top_elements = elements?.statistics;
        top_elements.truncate(TOP_ELEMENTS);

        let progress = GeneralProgress {
            user_id,
            general_statistics: statistics?,
            top_elements,
            theory_progress: theories?,
        };
        progress.validate()?;
        Ok(progress)
    }

    async fn live_general_statistics(
        &self,
        user_id: i64,
    ) -> Result<GeneralStatistics, ReadFailure> {
        let row = self
            .store()?
            .general_statistics(user_id)
            .await?
            .ok_or(ReadFailure::Missing)?;
        let statistics = self.shape_general_statistics(row);
        statistics.validate()?;
        Ok(statistics)
    }

    fn shape_general_statistics(&self, row: GeneralStatsRow) -> GeneralStatistics {
        let total_score = non_negative(row.total_points);
        GeneralStatistics {
            total_simulations: non_negative(row.total_simulations),
            simulations_completed: non_negative(row.simulations_completed),
            simulations_in_progress: non_negative(row.simulations_in_progress),
            simulations_failed: non_negative(row.simulations_failed),
            distinct_elements_used: non_negative(row.distinct_elements_used),
            total_simulation_minutes: non_negative(row.total_minutes),
            theories_completed: non_negative(row.theories_read),
            theories_total: non_negative(row.theories_total),
            ai_questions_asked: non_negative(row.ai_questions_asked),
            experience_level: self.resolve_level(row.level_label.as_deref(), total_score),
            total_score,
            total_time_readable: readable_duration(row.total_minutes),
        }
    }

    async fn live_theory_progress(&self, user_id: i64) -> Result<Vec<TheoryProgress>, ReadFailure> {
        let rows = self.store()?.theory_progress(user_id).await?;
        let theories: Vec<TheoryProgress> = rows.into_iter().map(shape_theory).collect();
        for theory in &theories {
            theory.validate()?;
        }
        Ok(theories)
    }

    pub async fn get_simulation_history(
        &self,
        user_id: i64,
        query: &HistoryQuery,
    ) -> Result<SimulationHistory, ProgressError> {
        validate_user_id(user_id)?;
        query.validate().map_err(ProgressError::Validation)?;

        match self.live_simulation_history(user_id, query).await {
            Ok(history) => Ok(history),
            Err(failure) => self.recover("simulation_history", user_id, failure, |f| {
                f.simulation_history(user_id, query)
            }),
        }
    }

    async fn live_simulation_history(
        &self,
        user_id: i64,
        query: &HistoryQuery,
    ) -> Result<SimulationHistory, ReadFailure> {
        let SimulationPage { total_count, rows } =
            self.store()?.simulation_page(user_id, query).await?;

        let mut skipped: u64 = 0;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let simulation_id = row.simulation_id;
            match self.shape_history_entry(row) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    tracing::error!(user_id, simulation_id, error = %err, "skipping unreadable simulation row");
                    skipped += 1;
                }
            }
        }

        // A count taken before a concurrent insert can trail the page itself.
        let seen = if entries.is_empty() {
            0
        } else {
            query.offset.saturating_add(entries.len() as u64)
        };
        let history = SimulationHistory {
            user_id,
            total_count: non_negative(total_count).saturating_sub(skipped).max(seen),
            entries,
        };
        history.validate()?;
        Ok(history)
    }

    fn shape_history_entry(&self, row: SimulationRow) -> Result<SimulationHistoryEntry, StoreError> {
        let status = match row.status.as_deref() {
            None => SimulationStatus::Completed,
            Some(label) => SimulationStatus::parse(label).ok_or_else(|| {
                StoreError::Malformed(format!(
                    "simulation {} has unknown status {label:?}",
                    row.simulation_id
                ))
            })?,
        };
        let elements_used = non_negative(row.elements_used);
        let performance = (status == SimulationStatus::Completed).then(|| {
            round2(
                self.estimator
                    .from_outcome(non_negative(row.points_earned), elements_used)
                    .clamp(0.0, 100.0),
            )
        });

        Ok(SimulationHistoryEntry {
            simulation_id: row.simulation_id,
            name: row.name,
            timestamp: row.timestamp,
            description: row
                .description
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SIMULATION_DESCRIPTION.to_string()),
            status,
            elements_used_count: elements_used,
            simulation_type: row
                .simulation_type
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SIMULATION_TYPE.to_string()),
            performance,
            estimated_duration: readable_duration(
                row.duration_minutes.unwrap_or(DEFAULT_SIMULATION_MINUTES),
            ),
        })
    }

    pub async fn get_element_statistics(
        &self,
        user_id: i64,
    ) -> Result<ElementStatistics, ProgressError> {
        validate_user_id(user_id)?;

        match self.live_element_statistics(user_id).await {
            Ok(statistics) => Ok(statistics),
            Err(failure) => self.recover("element_statistics", user_id, failure, |f| {
                f.element_statistics(user_id)
            }),
        }
    }

    async fn live_element_statistics(
        &self,
        user_id: i64,
    ) -> Result<ElementStatistics, ReadFailure> {
        let rows = self.store()?.element_usage(user_id).await?;
        let statistics = aggregate_element_usage(rows, self.estimator.as_ref());
        let response = ElementStatistics {
            user_id,
            total_elements_used: statistics.len(),
            statistics,
        };
        response.validate()?;
        Ok(response)
    }

    pub async fn save_progress_event(
        &self,
        user_id: i64,
        event: ProgressEvent,
    ) -> Result<SaveProgressResult, ProgressError> {
        validate_user_id(user_id)?;
        let session_id = event.validate().map_err(ProgressError::Validation)?;

        let store = self.store().map_err(ProgressError::WriteFailure)?;
        let kind = store
            .user_kind(user_id)
            .await
            .map_err(ProgressError::WriteFailure)?
            .ok_or(ProgressError::UserNotFound(user_id))?;

        if kind.is_anonymous() {
            tracing::info!(user_id, action = %event.action_name, "anonymous user cannot save progress");
            return Ok(SaveProgressResult {
                success: false,
                message: "Anonymous users cannot save progress".to_string(),
                timestamp: now_iso(),
                user_id,
                progress_record_id: None,
            });
        }

        let record = NewProgressEvent {
            user_id,
            action_name: event.action_name.trim().to_string(),
            description: event
                .description
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT_DESCRIPTION.to_string()),
            points: event.points,
            payload: serde_json::Value::Object(event.payload),
            session_id,
        };

        let progress_record_id = store.record_progress_event(&record).await.map_err(|err| {
            tracing::error!(user_id, action = %record.action_name, error = %err, "failed to save progress event");
            ProgressError::WriteFailure(err)
        })?;

        tracing::info!(user_id, action = %record.action_name, points = record.points, ?progress_record_id, "progress event saved");

        Ok(SaveProgressResult {
            success: true,
            message: "Progress saved".to_string(),
            timestamp: now_iso(),
            user_id,
            progress_record_id,
        })
    }

    pub async fn health(&self) -> ServiceHealth {
        let mut endpoints_available: Vec<String> = [
            "GET /api/progress/summary?userId={id}",
            "GET /api/progress?userId={id}",
            "GET /api/progress/{userId}/simulations",
            "GET /api/progress/{userId}/elements",
            "POST /api/progress/{userId}/events",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let reachable = match self.store() {
            Ok(store) => store.ping().await.is_ok(),
            Err(_) => false,
        };
        if !reachable {
            tracing::warn!("progress store unreachable, service degraded");
            if self.fallback_enabled() {
                endpoints_available.push("degraded mode: serving mock data".to_string());
            }
        }

        ServiceHealth {
            status: if reachable { "healthy" } else { "degraded" },
            service: SERVICE_NAME,
            timestamp: now_iso(),
            endpoints_available,
            version: SERVICE_VERSION,
        }
    }
}

/// Groups per-usage rows by element and orders them by usage, then by
/// average performance.
pub fn aggregate_element_usage(
    rows: Vec<ElementUsageRow>,
    estimator: &dyn PerformanceEstimator,
) -> Vec<ElementUsageStatistic> {
    struct Acc {
        name: String,
        symbol: String,
        times_used: u64,
        total_quantity: f64,
        performance_sum: f64,
    }

    let mut order: Vec<i64> = Vec::new();
    let mut by_element: HashMap<i64, Acc> = HashMap::new();

    for row in rows {
        let quantity = if row.quantity.is_finite() { row.quantity.max(0.0) } else { 0.0 };
        let score = estimator.from_quantity(quantity).clamp(0.0, 100.0);
        let acc = by_element.entry(row.element_id).or_insert_with(|| {
            order.push(row.element_id);
            Acc {
                name: row.element_name,
                symbol: row.symbol,
                times_used: 0,
                total_quantity: 0.0,
                performance_sum: 0.0,
            }
        });
        acc.times_used += 1;
        acc.total_quantity += quantity;
        acc.performance_sum += score;
    }

    let mut statistics: Vec<ElementUsageStatistic> = order
        .into_iter()
        .filter_map(|id| by_element.remove(&id).map(|acc| (id, acc)))
        .map(|(element_id, acc)| {
            let average_performance = round2(acc.performance_sum / acc.times_used as f64);
            ElementUsageStatistic {
                element_id,
                element_name: acc.name,
                symbol: acc.symbol,
                times_used: acc.times_used,
                total_quantity: round2(acc.total_quantity),
                average_performance,
                efficiency_tier: efficiency_tier(average_performance),
            }
        })
        .collect();

    statistics.sort_by(|a, b| {
        b.times_used
            .cmp(&a.times_used)
            .then_with(|| b.average_performance.total_cmp(&a.average_performance))
            .then_with(|| a.element_id.cmp(&b.element_id))
    });
    statistics
}

fn shape_theory(row: TheoryRow) -> TheoryProgress {
    let tasks_total = non_negative(row.tasks_total);
    let tasks_completed = if row.read { tasks_total } else { 0 };
    TheoryProgress {
        theory_id: row.theory_id,
        title: row.title,
        category: row.category.unwrap_or_default(),
        read: row.read,
        read_at: row.read_at,
        tasks_completed,
        tasks_total,
        completion_pct: if row.read { 100.0 } else { 0.0 },
    }
}

fn validate_user_id(user_id: i64) -> Result<(), ProgressError> {
    if user_id < 1 {
        return Err(ProgressError::Validation(format!(
            "userId must be a positive integer, got {user_id}"
        )));
    }
    Ok(())
}

fn non_negative(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
