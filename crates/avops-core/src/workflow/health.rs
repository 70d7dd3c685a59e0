//! Derived workflow health.

use avops_types::workflow::{HealthStatus, WorkflowDefinition};
use chrono::{DateTime, Duration, Utc};

/// Health from the time of the last successful run.
///
/// Never run is yellow; within a day is green; within a week is yellow;
/// anything older is red.
pub fn health_for(last_run_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> HealthStatus {
    let Some(last) = last_run_at else {
        return HealthStatus::Yellow;
    };
    let delta = now - last;
    if delta <= Duration::hours(24) {
        HealthStatus::Green
    } else if delta <= Duration::days(7) {
        HealthStatus::Yellow
    } else {
        HealthStatus::Red
    }
}

pub fn compute_health(def: &WorkflowDefinition, now: DateTime<Utc>) -> HealthStatus {
    health_for(def.last_run_at, now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_never_run_is_yellow() {
        assert_eq!(health_for(None, Utc::now()), HealthStatus::Yellow);
    }

    #[test]
    fn test_health_thresholds() {
        let now = Utc::now();
        assert_eq!(health_for(Some(now - Duration::hours(1)), now), HealthStatus::Green);
        assert_eq!(health_for(Some(now - Duration::days(2)), now), HealthStatus::Yellow);
        assert_eq!(health_for(Some(now - Duration::days(10)), now), HealthStatus::Red);
    }

    #[test]
    fn test_health_boundaries_are_inclusive() {
        let now = Utc::now();
        assert_eq!(health_for(Some(now - Duration::hours(24)), now), HealthStatus::Green);
        assert_eq!(health_for(Some(now - Duration::days(7)), now), HealthStatus::Yellow);
    }

    #[test]
    fn test_health_is_pure() {
        let now = Utc::now();
        let last = Some(now - Duration::days(3));
        assert_eq!(health_for(last, now), health_for(last, now));
    }
}
