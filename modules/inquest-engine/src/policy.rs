//! Satisfaction and termination policy — a pure function of round history
//! and budgets. The satisfaction threshold is one stop condition among
//! several, never the sole gate; no-progress and empty-plan aborts are
//! handled upstream by the orchestrator.

use std::time::Duration;

use inquest_common::InvestigationConfig;

pub const REASON_SEARCH_BUDGET: &str = "search budget exhausted";
pub const REASON_TIME_BUDGET: &str = "time budget exhausted";
pub const REASON_SATISFIED: &str = "satisfaction threshold met";
pub const REASON_NO_STRATEGY: &str = "no further strategy";

/// Saturation constant for the satisfaction curve: 8 DataPoints reach a
/// score of 0.5.
const HALF_SATURATION: f64 = 8.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Stop(&'static str),
}

impl Verdict {
    pub fn should_stop(&self) -> bool {
        matches!(self, Verdict::Stop(_))
    }
}

/// Satisfaction score in [0, 1): strictly increasing in cumulative
/// DataPoint count, so monotonicity holds by construction. Computed in
/// f64 — in f32 the denominator collapses to `dp` for large counts and
/// the score hits exactly 1.0.
pub fn satisfaction(total_datapoints: u32) -> f64 {
    let dp = total_datapoints as f64;
    dp / (dp + HALF_SATURATION)
}

/// Decide whether the session continues. Continue only while under both
/// budgets and below the satisfaction threshold.
pub fn decide(
    total_searches: u32,
    total_datapoints: u32,
    elapsed: Duration,
    config: &InvestigationConfig,
) -> Verdict {
    if total_searches >= config.max_searches {
        return Verdict::Stop(REASON_SEARCH_BUDGET);
    }
    if elapsed >= config.max_duration {
        return Verdict::Stop(REASON_TIME_BUDGET);
    }
    if satisfaction(total_datapoints) >= config.satisfaction_threshold {
        return Verdict::Stop(REASON_SATISFIED);
    }
    Verdict::Continue
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> InvestigationConfig {
        InvestigationConfig::builder()
            .max_searches(10)
            .max_duration(Duration::from_secs(60))
            .satisfaction_threshold(0.8)
            .build()
    }

    #[test]
    fn satisfaction_is_monotone_in_datapoints() {
        let mut prev = satisfaction(0);
        for dp in 1..200 {
            let next = satisfaction(dp);
            assert!(next >= prev, "satisfaction dropped at dp={dp}");
            prev = next;
        }
    }

    #[test]
    fn satisfaction_stays_in_unit_interval() {
        assert_eq!(satisfaction(0), 0.0);
        // Strictly below 1.0 even where f32 arithmetic would saturate.
        assert!(satisfaction(u32::MAX) < 1.0);
        assert!(satisfaction(u32::MAX) > satisfaction(1_000_000));
    }

    #[test]
    fn continues_under_all_budgets() {
        let verdict = decide(3, 2, Duration::from_secs(5), &config());
        assert_eq!(verdict, Verdict::Continue);
    }

    #[test]
    fn stops_on_search_budget() {
        let verdict = decide(10, 2, Duration::from_secs(5), &config());
        assert_eq!(verdict, Verdict::Stop(REASON_SEARCH_BUDGET));
    }

    #[test]
    fn stops_on_time_budget() {
        let verdict = decide(3, 2, Duration::from_secs(61), &config());
        assert_eq!(verdict, Verdict::Stop(REASON_TIME_BUDGET));
    }

    #[test]
    fn stops_when_satisfied() {
        // 40 datapoints: 40/48 = 0.833 >= 0.8
        let verdict = decide(3, 40, Duration::from_secs(5), &config());
        assert_eq!(verdict, Verdict::Stop(REASON_SATISFIED));
    }

    #[test]
    fn search_budget_outranks_satisfaction() {
        let verdict = decide(10, 40, Duration::from_secs(5), &config());
        assert_eq!(verdict, Verdict::Stop(REASON_SEARCH_BUDGET));
    }
}
