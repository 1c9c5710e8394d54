use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::metrics::efficiency_tier;

pub const HISTORY_DEFAULT_LIMIT: u32 = 10;
pub const HISTORY_MAX_LIMIT: u32 = 100;
pub const TOP_ELEMENTS: usize = 5;

/// A produced response broke one of its own invariants.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{entity}: {reason}")]
pub struct ModelViolation {
    pub entity: &'static str,
    pub reason: String,
}

impl ModelViolation {
    fn new(entity: &'static str, reason: impl Into<String>) -> Self {
        Self {
            entity,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl ExperienceLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "beginner" | "principiante" => Some(Self::Beginner),
            "intermediate" | "intermedio" => Some(Self::Intermediate),
            "advanced" | "avanzado" => Some(Self::Advanced),
            "expert" | "experto" => Some(Self::Expert),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EfficiencyTier {
    Optimal,
    VeryGood,
    Good,
    Regular,
    Poor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationStatus {
    Completed,
    InProgress,
    Failed,
}

impl SimulationStatus {
    pub fn parse(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect();
        match normalized.as_str() {
            "completed" | "completada" => Some(Self::Completed),
            "inprogress" | "enproceso" => Some(Self::InProgress),
            "failed" | "fallida" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Label stored in the `simulacion.estado` column.
    pub fn store_label(&self) -> &'static str {
        match self {
            Self::Completed => "Completada",
            Self::InProgress => "En proceso",
            Self::Failed => "Fallida",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgressSummary {
    pub user_id: i64,
    pub experience_level: ExperienceLevel,
    pub total_score: u64,
    pub simulations_completed: u64,
    pub simulations_total: u64,
    pub theories_completed: u64,
    pub theories_total: u64,
    pub simulation_progress_pct: f64,
    pub theory_progress_pct: f64,
    pub total_time_readable: String,
    pub can_save_progress: bool,
    pub is_anonymous_user: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranking_position: Option<u32>,
}

impl UserProgressSummary {
    pub fn validate(&self) -> Result<(), ModelViolation> {
        const ENTITY: &str = "UserProgressSummary";
        check_user_id(ENTITY, self.user_id)?;
        check_pct(ENTITY, "simulationProgressPct", self.simulation_progress_pct)?;
        check_pct(ENTITY, "theoryProgressPct", self.theory_progress_pct)?;
        if self.is_anonymous_user && self.can_save_progress {
            return Err(ModelViolation::new(ENTITY, "anonymous user marked as able to save"));
        }
        if self.ranking_position == Some(0) {
            return Err(ModelViolation::new(ENTITY, "ranking position must be positive"));
        }
        if self.total_time_readable.is_empty() {
            return Err(ModelViolation::new(ENTITY, "empty readable time"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementUsageStatistic {
    pub element_id: i64,
    pub element_name: String,
    pub symbol: String,
    pub times_used: u64,
    pub total_quantity: f64,
    pub average_performance: f64,
    pub efficiency_tier: EfficiencyTier,
}

impl ElementUsageStatistic {
    pub fn validate(&self) -> Result<(), ModelViolation> {
        const ENTITY: &str = "ElementUsageStatistic";
        if self.times_used == 0 {
            return Err(ModelViolation::new(ENTITY, "element listed without usage"));
        }
        if !self.total_quantity.is_finite() || self.total_quantity < 0.0 {
            return Err(ModelViolation::new(
                ENTITY,
                format!("invalid total quantity {}", self.total_quantity),
            ));
        }
        check_pct(ENTITY, "averagePerformance", self.average_performance)?;
        if self.efficiency_tier != efficiency_tier(self.average_performance) {
            return Err(ModelViolation::new(ENTITY, "tier does not match average performance"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementStatistics {
    pub user_id: i64,
    pub total_elements_used: usize,
    pub statistics: Vec<ElementUsageStatistic>,
}

impl ElementStatistics {
    pub fn validate(&self) -> Result<(), ModelViolation> {
        const ENTITY: &str = "ElementStatistics";
        check_user_id(ENTITY, self.user_id)?;
        if self.total_elements_used != self.statistics.len() {
            return Err(ModelViolation::new(ENTITY, "count does not match list length"));
        }
        for stat in &self.statistics {
            stat.validate()?;
        }
        let sorted = self.statistics.windows(2).all(|pair| {
            let (a, b) = (&pair[0], &pair[1]);
            a.times_used > b.times_used
                || (a.times_used == b.times_used && a.average_performance >= b.average_performance)
        });
        if !sorted {
            return Err(ModelViolation::new(ENTITY, "statistics not ordered by usage"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationHistoryEntry {
    pub simulation_id: i64,
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub status: SimulationStatus,
    pub elements_used_count: u64,
    pub simulation_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<f64>,
    pub estimated_duration: String,
}

impl SimulationHistoryEntry {
    pub fn validate(&self) -> Result<(), ModelViolation> {
        const ENTITY: &str = "SimulationHistoryEntry";
        match (self.status, self.performance) {
            (SimulationStatus::Completed, Some(performance)) => {
                check_pct(ENTITY, "performance", performance)
            }
            (SimulationStatus::Completed, None) => {
                Err(ModelViolation::new(ENTITY, "completed simulation without performance"))
            }
            (_, Some(_)) => Err(ModelViolation::new(
                ENTITY,
                "performance reported for unfinished simulation",
            )),
            (_, None) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationHistory {
    pub user_id: i64,
    pub total_count: u64,
    pub entries: Vec<SimulationHistoryEntry>,
}

impl SimulationHistory {
    pub fn validate(&self) -> Result<(), ModelViolation> {
        const ENTITY: &str = "SimulationHistory";
        check_user_id(ENTITY, self.user_id)?;
        if (self.entries.len() as u64) > self.total_count {
            return Err(ModelViolation::new(ENTITY, "page larger than total count"));
        }
        self.entries.iter().try_for_each(SimulationHistoryEntry::validate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralStatistics {
    pub total_simulations: u64,
    pub simulations_completed: u64,
    pub simulations_in_progress: u64,
    pub simulations_failed: u64,
    pub distinct_elements_used: u64,
    pub total_simulation_minutes: u64,
    pub theories_completed: u64,
    pub theories_total: u64,
    pub ai_questions_asked: u64,
    pub experience_level: ExperienceLevel,
    pub total_score: u64,
    pub total_time_readable: String,
}

impl GeneralStatistics {
    pub fn validate(&self) -> Result<(), ModelViolation> {
        const ENTITY: &str = "GeneralStatistics";
        let by_status = self
            .simulations_completed
            .checked_add(self.simulations_in_progress)
            .and_then(|sum| sum.checked_add(self.simulations_failed))
            .ok_or_else(|| ModelViolation::new(ENTITY, "simulation counts by status overflow"))?;
        if by_status > self.total_simulations {
            return Err(ModelViolation::new(
                ENTITY,
                format!(
                    "{by_status} simulations by status exceed total {}",
                    self.total_simulations
                ),
            ));
        }
        if self.total_time_readable.is_empty() {
            return Err(ModelViolation::new(ENTITY, "empty readable time"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TheoryProgress {
    pub theory_id: i64,
    pub title: String,
    pub category: String,
    pub read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    pub tasks_completed: u64,
    pub tasks_total: u64,
    pub completion_pct: f64,
}

impl TheoryProgress {
    pub fn validate(&self) -> Result<(), ModelViolation> {
        check_pct("TheoryProgress", "completionPct", self.completion_pct)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralProgress {
    pub user_id: i64,
    pub general_statistics: GeneralStatistics,
    pub top_elements: Vec<ElementUsageStatistic>,
    pub theory_progress: Vec<TheoryProgress>,
}

impl GeneralProgress {
    pub fn validate(&self) -> Result<(), ModelViolation> {
        const ENTITY: &str = "GeneralProgress";
        check_user_id(ENTITY, self.user_id)?;
        self.general_statistics.validate()?;
        if self.top_elements.len() > TOP_ELEMENTS {
            return Err(ModelViolation::new(ENTITY, "too many top elements"));
        }
        self.top_elements.iter().try_for_each(ElementUsageStatistic::validate)?;
        self.theory_progress.iter().try_for_each(TheoryProgress::validate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub action_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl ProgressEvent {
    pub fn new(action_name: impl Into<String>) -> Self {
        Self {
            action_name: action_name.into(),
            description: None,
            points: 0,
            payload: serde_json::Map::new(),
            session_id: None,
        }
    }

    /// Checks the event and returns the parsed session id, if any.
    pub fn validate(&self) -> Result<Option<Uuid>, String> {
        if self.action_name.trim().is_empty() {
            return Err("actionName must not be empty".to_string());
        }
        if self.points < 0 {
            return Err(format!("points must be non-negative, got {}", self.points));
        }
        match self.session_id.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => Uuid::parse_str(raw)
                .map(Some)
                .map_err(|_| format!("sessionId is not a valid UUID: {raw}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveProgressResult {
    pub success: bool,
    pub message: String,
    pub timestamp: String,
    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_record_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub limit: u32,
    pub offset: u64,
    pub status: Option<SimulationStatus>,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            limit: HISTORY_DEFAULT_LIMIT,
            offset: 0,
            status: None,
        }
    }
}

impl HistoryQuery {
    pub fn validate(&self) -> Result<(), String> {
        if self.limit == 0 || self.limit > HISTORY_MAX_LIMIT {
            return Err(format!(
                "limit must be between 1 and {HISTORY_MAX_LIMIT}, got {}",
                self.limit
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub status: &'static str,
    pub service: &'static str,
    pub timestamp: String,
    pub endpoints_available: Vec<String>,
    pub version: &'static str,
}

fn check_user_id(entity: &'static str, user_id: i64) -> Result<(), ModelViolation> {
    if user_id < 1 {
        return Err(ModelViolation::new(entity, format!("invalid user id {user_id}")));
    }
    Ok(())
}

fn check_pct(entity: &'static str, field: &str, value: f64) -> Result<(), ModelViolation> {
    if !(0.0..=100.0).contains(&value) {
        return Err(ModelViolation::new(entity, format!("{field} out of range: {value}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_accepts_store_labels() {
        assert_eq!(SimulationStatus::parse("Completada"), Some(SimulationStatus::Completed));
        assert_eq!(SimulationStatus::parse("En proceso"), Some(SimulationStatus::InProgress));
        assert_eq!(SimulationStatus::parse("in_progress"), Some(SimulationStatus::InProgress));
        assert_eq!(SimulationStatus::parse("FAILED"), Some(SimulationStatus::Failed));
        assert_eq!(SimulationStatus::parse("archived"), None);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(ExperienceLevel::parse("Avanzado"), Some(ExperienceLevel::Advanced));
        assert_eq!(ExperienceLevel::parse(" expert "), Some(ExperienceLevel::Expert));
        assert_eq!(ExperienceLevel::parse("master"), None);
    }

    fn statistics_with_status_counts(count: u64) -> GeneralStatistics {
        GeneralStatistics {
            total_simulations: count,
            simulations_completed: count,
            simulations_in_progress: count,
            simulations_failed: count,
            distinct_elements_used: 0,
            total_simulation_minutes: 0,
            theories_completed: 0,
            theories_total: 0,
            ai_questions_asked: 0,
            experience_level: ExperienceLevel::Beginner,
            total_score: 0,
            total_time_readable: "0h 0m".to_string(),
        }
    }

    #[test]
    fn test_general_statistics_status_overflow_is_a_violation() {
        let huge = statistics_with_status_counts(i64::MAX as u64);
        assert!(huge.validate().is_err());

        let maxed = statistics_with_status_counts(u64::MAX);
        assert!(maxed.validate().is_err());
    }

    #[test]
    fn test_general_statistics_status_sum() {
        let mut stats = statistics_with_status_counts(1);
        stats.total_simulations = 3;
        assert!(stats.validate().is_ok());
        stats.total_simulations = 2;
        assert!(stats.validate().is_err());
    }

    #[test]
    fn test_event_validation() {
        assert!(ProgressEvent::new("  ").validate().is_err());

        let mut event = ProgressEvent::new("simulation_completed");
        event.points = -5;
        assert!(event.validate().is_err());

        event.points = 50;
        event.session_id = Some("not-a-uuid".to_string());
        assert!(event.validate().is_err());

        let id = Uuid::new_v4();
        event.session_id = Some(id.to_string());
        assert_eq!(event.validate(), Ok(Some(id)));
    }

    #[test]
    fn test_event_defaults_from_json() {
        let event: ProgressEvent =
            serde_json::from_str(r#"{"actionName":"theory_read"}"#).unwrap();
        assert_eq!(event.points, 0);
        assert!(event.payload.is_empty());
        assert!(event.session_id.is_none());
    }

    #[test]
    fn test_history_query_limits() {
        assert!(HistoryQuery::default().validate().is_ok());
        let too_many = HistoryQuery {
            limit: 101,
            ..HistoryQuery::default()
        };
        assert!(too_many.validate().is_err());
        let zero = HistoryQuery {
            limit: 0,
            ..HistoryQuery::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_history_entry_performance_matches_status() {
        let entry = SimulationHistoryEntry {
            simulation_id: 1,
            name: "Water synthesis".to_string(),
            timestamp: Utc::now(),
            description: String::new(),
            status: SimulationStatus::InProgress,
            elements_used_count: 2,
            simulation_type: "Synthesis".to_string(),
            performance: Some(80.0),
            estimated_duration: "0h 30m".to_string(),
        };
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_summary_rejects_anonymous_saver() {
        let summary = UserProgressSummary {
            user_id: 3,
            experience_level: ExperienceLevel::Beginner,
            total_score: 0,
            simulations_completed: 0,
            simulations_total: 0,
            theories_completed: 0,
            theories_total: 0,
            simulation_progress_pct: 0.0,
            theory_progress_pct: 0.0,
            total_time_readable: "0h 0m".to_string(),
            can_save_progress: true,
            is_anonymous_user: true,
            ranking_position: None,
        };
        assert!(summary.validate().is_err());
    }
}
