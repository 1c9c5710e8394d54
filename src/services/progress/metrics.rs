use super::models::{EfficiencyTier, ExperienceLevel};

const OUTCOME_POINTS_FOR_FULL_SCORE: f64 = 50.0;
const OUTCOME_BASELINE: f64 = 70.0;
const OUTCOME_PER_ELEMENT: f64 = 5.0;
const OUTCOME_ELEMENTS_CAP: f64 = 95.0;

/// Maps an average performance score onto its tier. First matching band wins.
pub fn efficiency_tier(average_performance: f64) -> EfficiencyTier {
    if average_performance >= 90.0 {
        EfficiencyTier::Optimal
    } else if average_performance >= 80.0 {
        EfficiencyTier::VeryGood
    } else if average_performance >= 70.0 {
        EfficiencyTier::Good
    } else if average_performance >= 60.0 {
        EfficiencyTier::Regular
    } else {
        EfficiencyTier::Poor
    }
}

pub fn readable_duration(total_minutes: i64) -> String {
    if total_minutes <= 0 {
        return "0h 0m".to_string();
    }
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    format!("{hours}h {minutes}m")
}

pub fn percentage(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    let raw = numerator as f64 * 100.0 / denominator as f64;
    round2(raw).clamp(0.0, 100.0)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelThresholds {
    pub intermediate: u64,
    pub advanced: u64,
    pub expert: u64,
}

impl Default for LevelThresholds {
    fn default() -> Self {
        Self {
            intermediate: 500,
            advanced: 1000,
            expert: 2000,
        }
    }
}

impl ExperienceLevel {
    pub fn from_score(score: u64, thresholds: &LevelThresholds) -> Self {
        if score >= thresholds.expert {
            Self::Expert
        } else if score >= thresholds.advanced {
            Self::Advanced
        } else if score >= thresholds.intermediate {
            Self::Intermediate
        } else {
            Self::Beginner
        }
    }
}

/// Heuristic used when a simulation carries no explicit score.
///
/// Implementations must be monotonic non-decreasing in every input and stay
/// within `[0, 100]`.
pub trait PerformanceEstimator: Send + Sync {
    /// Score for a single use of an element in a simulation.
    fn from_quantity(&self, quantity: f64) -> f64;

    /// Score for a completed simulation from its points and element count.
    fn from_outcome(&self, points: u64, elements_used: u64) -> f64;
}

/// Step bands over quantity. Outcomes take the better of a points score and
/// an elements-used proxy, so a low score never ranks below no score.
#[derive(Debug, Clone, Default)]
pub struct BandedEstimator;

impl PerformanceEstimator for BandedEstimator {
    fn from_quantity(&self, quantity: f64) -> f64 {
        if quantity >= 2.0 {
            95.0
        } else if quantity >= 1.5 {
            88.0
        } else if quantity >= 1.0 {
            82.0
        } else if quantity >= 0.5 {
            75.0
        } else {
            68.0
        }
    }

    fn from_outcome(&self, points: u64, elements_used: u64) -> f64 {
        let from_points = (points as f64 * 100.0 / OUTCOME_POINTS_FOR_FULL_SCORE).min(100.0);
        let from_elements = (OUTCOME_BASELINE + elements_used as f64 * OUTCOME_PER_ELEMENT)
            .min(OUTCOME_ELEMENTS_CAP);
        from_points.max(from_elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readable_duration() {
        assert_eq!(readable_duration(0), "0h 0m");
        assert_eq!(readable_duration(-30), "0h 0m");
        assert_eq!(readable_duration(125), "2h 5m");
        assert_eq!(readable_duration(45), "0h 45m");
        assert_eq!(readable_duration(180), "3h 0m");
    }

    #[test]
    fn test_percentage_zero_denominator() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(7, 0), 0.0);
    }

    #[test]
    fn test_percentage_rounds_and_clamps() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(4, 10), 40.0);
        assert_eq!(percentage(15, 10), 100.0);
    }

    #[test]
    fn test_efficiency_tier_boundaries() {
        assert_eq!(efficiency_tier(100.0), EfficiencyTier::Optimal);
        assert_eq!(efficiency_tier(90.0), EfficiencyTier::Optimal);
        assert_eq!(efficiency_tier(89.9), EfficiencyTier::VeryGood);
        assert_eq!(efficiency_tier(80.0), EfficiencyTier::VeryGood);
        assert_eq!(efficiency_tier(70.0), EfficiencyTier::Good);
        assert_eq!(efficiency_tier(60.0), EfficiencyTier::Regular);
        assert_eq!(efficiency_tier(59.9), EfficiencyTier::Poor);
        assert_eq!(efficiency_tier(0.0), EfficiencyTier::Poor);
        assert_eq!(efficiency_tier(f64::NAN), EfficiencyTier::Poor);
    }

    #[test]
    fn test_level_from_score() {
        let thresholds = LevelThresholds::default();
        assert_eq!(ExperienceLevel::from_score(0, &thresholds), ExperienceLevel::Beginner);
        assert_eq!(ExperienceLevel::from_score(499, &thresholds), ExperienceLevel::Beginner);
        assert_eq!(ExperienceLevel::from_score(500, &thresholds), ExperienceLevel::Intermediate);
        assert_eq!(ExperienceLevel::from_score(1200, &thresholds), ExperienceLevel::Advanced);
        assert_eq!(ExperienceLevel::from_score(2000, &thresholds), ExperienceLevel::Expert);
    }

    #[test]
    fn test_banded_estimator_outcome() {
        let estimator = BandedEstimator;
        assert_eq!(estimator.from_outcome(25, 0), 70.0);
        assert_eq!(estimator.from_outcome(45, 0), 90.0);
        assert_eq!(estimator.from_outcome(1, 2), 80.0);
        assert_eq!(estimator.from_outcome(80, 3), 100.0);
        assert_eq!(estimator.from_outcome(0, 2), 80.0);
        assert_eq!(estimator.from_outcome(0, 10), 95.0);
    }

    #[test]
    fn test_banded_estimator_quantity() {
        let estimator = BandedEstimator;
        assert_eq!(estimator.from_quantity(0.1), 68.0);
        assert_eq!(estimator.from_quantity(0.5), 75.0);
        assert_eq!(estimator.from_quantity(1.2), 82.0);
        assert_eq!(estimator.from_quantity(1.5), 88.0);
        assert_eq!(estimator.from_quantity(3.0), 95.0);
    }
}
