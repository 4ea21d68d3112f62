//! Configuration for route matching.

use std::time::Duration;

/// Upper bounds a leg's quality ratios must stay within.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QosThresholds {
    /// Leg distance over the rider's direct distance.
    pub max_distance_quality: f64,

    /// Leg duration over the rider's direct duration.
    pub max_duration_quality: f64,

    /// Product of the two ratios.
    pub max_combined: f64,
}

impl QosThresholds {
    /// Limits for routes with authored stops only.
    pub const FIXED: Self = Self {
        max_distance_quality: 1.25,
        max_duration_quality: 1.5,
        max_combined: 1.5,
    };

    /// Limits for flexible routes, which may detour to waypoints.
    pub const FLEXIBLE: Self = Self {
        max_distance_quality: 1.5,
        max_duration_quality: 1.5,
        max_combined: 1.7,
    };

    /// Whether a leg with these ratios is acceptable.
    pub fn admits(&self, distance_quality: f64, duration_quality: f64) -> bool {
        distance_quality <= self.max_distance_quality
            && duration_quality <= self.max_duration_quality
            && distance_quality * duration_quality <= self.max_combined
    }
}

/// Configuration parameters for route matching.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Maximum number of chains to return.
    pub max_results: usize,

    /// Maximum number of node searches to run concurrently at one depth.
    pub batch_size: usize,

    /// Wall-clock budget for one request (seconds).
    pub deadline_secs: u64,

    pub fixed_thresholds: QosThresholds,

    pub flexible_thresholds: QosThresholds,
}

impl MatchConfig {
    /// Create a new configuration with default quality thresholds.
    pub fn new(max_results: usize, batch_size: usize, deadline_secs: u64) -> Self {
        Self {
            max_results,
            batch_size,
            deadline_secs,
            fixed_thresholds: QosThresholds::FIXED,
            flexible_thresholds: QosThresholds::FLEXIBLE,
        }
    }

    /// Returns the request deadline as a Duration.
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    /// Thresholds for a route of the given kind.
    pub fn thresholds(&self, fixed_route: bool) -> &QosThresholds {
        if fixed_route {
            &self.fixed_thresholds
        } else {
            &self.flexible_thresholds
        }
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self::new(25, 16, 20)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = MatchConfig::default();
        assert_eq!(config.max_results, 25);
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.deadline(), Duration::from_secs(20));
        assert_eq!(config.thresholds(true), &QosThresholds::FIXED);
        assert_eq!(config.thresholds(false), &QosThresholds::FLEXIBLE);
    }

    #[test]
    fn fixed_thresholds() {
        let fixed = QosThresholds::FIXED;
        assert!(fixed.admits(1.0, 1.0));
        assert!(fixed.admits(1.25, 1.2));
        assert!(!fixed.admits(1.26, 1.0));
        assert!(!fixed.admits(1.0, 1.51));
        // Each ratio fine, product too large
        assert!(!fixed.admits(1.2, 1.3));
    }

    #[test]
    fn flexible_thresholds_are_looser() {
        let flexible = QosThresholds::FLEXIBLE;
        assert!(flexible.admits(1.4, 1.2));
        assert!(!flexible.admits(1.4, 1.25));
        assert!(!flexible.admits(1.51, 1.0));
        assert!(!QosThresholds::FIXED.admits(1.4, 1.2));
    }
}
