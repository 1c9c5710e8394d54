use chrono::{DateTime, Utc};

use super::metrics::{efficiency_tier, percentage, readable_duration};
use super::models::{
    ElementStatistics, ElementUsageStatistic, ExperienceLevel, GeneralStatistics, HistoryQuery,
    SimulationHistory, SimulationHistoryEntry, SimulationStatus, TheoryProgress,
    UserProgressSummary,
};
use super::store::FallbackSource;

const CATALOGUE_SIMULATIONS: u64 = 10;
const CATALOGUE_THEORIES: u64 = 14;
const MINUTES_PER_SIMULATION: u64 = 45;
const ANONYMOUS_USER_ID: i64 = 3;

struct MockProfile {
    level: ExperienceLevel,
    score: u64,
    simulations: u64,
    theories: u64,
}

const DEFAULT_PROFILE: MockProfile = MockProfile {
    level: ExperienceLevel::Intermediate,
    score: 650,
    simulations: 4,
    theories: 3,
};

fn profile(user_id: i64) -> MockProfile {
    match user_id {
        2 => MockProfile {
            level: ExperienceLevel::Advanced,
            score: 1200,
            simulations: 9,
            theories: 7,
        },
        3 => MockProfile {
            level: ExperienceLevel::Beginner,
            score: 150,
            simulations: 0,
            theories: 0,
        },
        4 => MockProfile {
            level: ExperienceLevel::Intermediate,
            score: 350,
            simulations: 3,
            theories: 2,
        },
        5 => MockProfile {
            level: ExperienceLevel::Beginner,
            score: 50,
            simulations: 1,
            theories: 1,
        },
        _ => DEFAULT_PROFILE,
    }
}

/// Canned, hand-written datasets served when live data is unavailable.
#[derive(Debug, Clone, Default)]
pub struct MockDataProvider;

impl MockDataProvider {
    pub fn new() -> Self {
        Self
    }

    fn element(id: i64, name: &str, symbol: &str, times_used: u64, quantity: f64, avg: f64) -> ElementUsageStatistic {
        ElementUsageStatistic {
            element_id: id,
            element_name: name.to_string(),
            symbol: symbol.to_string(),
            times_used,
            total_quantity: quantity,
            average_performance: avg,
            efficiency_tier: efficiency_tier(avg),
        }
    }

    fn elements() -> Vec<ElementUsageStatistic> {
        vec![
            Self::element(1, "Hydrogen", "H", 8, 12.5, 85.5),
            Self::element(8, "Oxygen", "O", 6, 9.2, 78.3),
            Self::element(11, "Sodium", "Na", 3, 4.1, 65.2),
        ]
    }

    fn history() -> Vec<SimulationHistoryEntry> {
        vec![
            SimulationHistoryEntry {
                simulation_id: 1,
                name: "Water synthesis".to_string(),
                timestamp: fixed_time(1_717_236_000),
                description: "First successful simulation".to_string(),
                status: SimulationStatus::Completed,
                elements_used_count: 2,
                simulation_type: "Synthesis".to_string(),
                performance: Some(92.5),
                estimated_duration: readable_duration(45),
            },
            SimulationHistoryEntry {
                simulation_id: 2,
                name: "Acid-base neutralization".to_string(),
                timestamp: fixed_time(1_716_976_800),
                description: "Titration with indicator".to_string(),
                status: SimulationStatus::Completed,
                elements_used_count: 3,
                simulation_type: "Neutralization".to_string(),
                performance: Some(87.3),
                estimated_duration: readable_duration(30),
            },
            SimulationHistoryEntry {
                simulation_id: 3,
                name: "Magnesium combustion".to_string(),
                timestamp: fixed_time(1_716_804_000),
                description: "Exothermic reaction".to_string(),
                status: SimulationStatus::InProgress,
                elements_used_count: 2,
                simulation_type: "Combustion".to_string(),
                performance: None,
                estimated_duration: readable_duration(20),
            },
        ]
    }
}

fn fixed_time(unix_seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(unix_seconds, 0).unwrap_or_default()
}

impl FallbackSource for MockDataProvider {
    fn progress_summary(&self, user_id: i64) -> UserProgressSummary {
        let p = profile(user_id);
        let is_anonymous = user_id == ANONYMOUS_USER_ID;
        let ranking = u32::try_from(p.score / 100).ok().filter(|r| *r > 0);

        UserProgressSummary {
            user_id,
            experience_level: p.level,
            total_score: p.score,
            simulations_completed: p.simulations,
            simulations_total: CATALOGUE_SIMULATIONS,
            theories_completed: p.theories,
            theories_total: CATALOGUE_THEORIES,
            simulation_progress_pct: percentage(p.simulations, CATALOGUE_SIMULATIONS),
            theory_progress_pct: percentage(p.theories, CATALOGUE_THEORIES),
            total_time_readable: readable_duration((p.simulations * MINUTES_PER_SIMULATION) as i64),
            can_save_progress: !is_anonymous,
            is_anonymous_user: is_anonymous,
            ranking_position: ranking,
        }
    }

    fn general_statistics(&self, user_id: i64) -> GeneralStatistics {
        let p = profile(user_id);
        let minutes = p.simulations * MINUTES_PER_SIMULATION;
        let in_progress = u64::from(p.simulations > 0);

        GeneralStatistics {
            total_simulations: CATALOGUE_SIMULATIONS,
            simulations_completed: p.simulations,
            simulations_in_progress: in_progress,
            simulations_failed: 0,
            distinct_elements_used: if p.simulations > 0 { 3 } else { 0 },
            total_simulation_minutes: minutes,
            theories_completed: p.theories,
            theories_total: CATALOGUE_THEORIES,
            ai_questions_asked: p.theories,
            experience_level: p.level,
            total_score: p.score,
            total_time_readable: readable_duration(minutes as i64),
        }
    }

    fn element_statistics(&self, user_id: i64) -> ElementStatistics {
        let statistics = if profile(user_id).simulations > 0 {
            Self::elements()
        } else {
            Vec::new()
        };
        ElementStatistics {
            user_id,
            total_elements_used: statistics.len(),
            statistics,
        }
    }

    fn simulation_history(&self, user_id: i64, query: &HistoryQuery) -> SimulationHistory {
        let history = if profile(user_id).simulations > 0 {
            Self::history()
        } else {
            Vec::new()
        };
        let matching: Vec<SimulationHistoryEntry> = history
            .into_iter()
            .filter(|entry| query.status.map_or(true, |status| entry.status == status))
            .collect();
        let total_count = matching.len() as u64;
        let entries = matching
            .into_iter()
            .skip(usize::try_from(query.offset).unwrap_or(usize::MAX))
            .take(query.limit as usize)
            .collect();

        SimulationHistory {
            user_id,
            total_count,
            entries,
        }
    }

    fn theory_progress(&self, user_id: i64) -> Vec<TheoryProgress> {
        let read = profile(user_id).theories > 0;
        vec![
            TheoryProgress {
                theory_id: 1,
                title: "Atomic structure".to_string(),
                category: "Fundamentals".to_string(),
                read,
                read_at: read.then(|| fixed_time(1_716_544_800)),
                tasks_completed: if read { 2 } else { 0 },
                tasks_total: 2,
                completion_pct: if read { 100.0 } else { 0.0 },
            },
            TheoryProgress {
                theory_id: 2,
                title: "Chemical bonds".to_string(),
                category: "Fundamentals".to_string(),
                read: false,
                read_at: None,
                tasks_completed: 0,
                tasks_total: 3,
                completion_pct: 0.0,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_profile_is_valid() {
        let mock = MockDataProvider::new();
        for user_id in [1, 2, 3, 4, 5, 42, i64::MAX] {
            mock.progress_summary(user_id).validate().unwrap();
            mock.general_statistics(user_id).validate().unwrap();
            mock.element_statistics(user_id).validate().unwrap();
            mock.simulation_history(user_id, &HistoryQuery::default())
                .validate()
                .unwrap();
        }
    }

    #[test]
    fn test_anonymous_profile() {
        let summary = MockDataProvider::new().progress_summary(3);
        assert_eq!(summary.simulation_progress_pct, 0.0);
        assert_eq!(summary.theory_progress_pct, 0.0);
        assert!(summary.is_anonymous_user);
        assert!(!summary.can_save_progress);
        assert_eq!(summary.total_time_readable, "0h 0m");
    }

    #[test]
    fn test_inactive_profile_has_no_activity() {
        let mock = MockDataProvider::new();

        let statistics = mock.general_statistics(3);
        assert_eq!(statistics.distinct_elements_used, 0);

        let elements = mock.element_statistics(3);
        assert_eq!(elements.total_elements_used, 0);
        assert!(elements.statistics.is_empty());

        let history = mock.simulation_history(3, &HistoryQuery::default());
        assert_eq!(history.total_count, 0);
        assert!(history.entries.is_empty());

        assert!(mock.theory_progress(3).iter().all(|t| !t.read));
    }

    #[test]
    fn test_active_profile_elements_match_statistics() {
        let mock = MockDataProvider::new();
        for user_id in [1, 2, 4, 5, 42] {
            let statistics = mock.general_statistics(user_id);
            let elements = mock.element_statistics(user_id);
            assert_eq!(statistics.distinct_elements_used, elements.total_elements_used as u64);
        }
    }

    #[test]
    fn test_unknown_user_gets_default_profile() {
        let mock = MockDataProvider::new();
        let unknown = mock.progress_summary(999);
        let default = mock.progress_summary(1);
        assert_eq!(unknown.user_id, 999);
        assert_eq!(unknown.total_score, default.total_score);
        assert_eq!(unknown.experience_level, default.experience_level);
        assert_eq!(unknown.simulation_progress_pct, 40.0);
        assert_eq!(unknown.total_time_readable, "3h 0m");
        assert_eq!(unknown.ranking_position, Some(6));
    }

    #[test]
    fn test_history_filter_and_paging() {
        let mock = MockDataProvider::new();
        let completed = mock.simulation_history(
            1,
            &HistoryQuery {
                status: Some(SimulationStatus::Completed),
                ..HistoryQuery::default()
            },
        );
        assert_eq!(completed.total_count, 2);
        assert!(completed
            .entries
            .iter()
            .all(|e| e.status == SimulationStatus::Completed));

        let second_page = mock.simulation_history(
            1,
            &HistoryQuery {
                limit: 1,
                offset: 1,
                status: None,
            },
        );
        assert_eq!(second_page.total_count, 3);
        assert_eq!(second_page.entries.len(), 1);
        assert_eq!(second_page.entries[0].simulation_id, 2);
    }
}
