//! Numeric build summary, mirroring `atlas-build::incremental::
//! IncrementalStats` but keyed to waves rather than a single pass.

use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct PlannerStats {
    pub modules_skipped: usize,
    pub modules_queued: usize,
    pub modules_scheduled: usize,
    pub waves: Vec<Duration>,
}

impl PlannerStats {
    pub fn total_modules(&self) -> usize {
        self.modules_skipped + self.modules_queued + self.modules_scheduled
    }

    pub fn skip_rate(&self) -> f64 {
        let total = self.total_modules();
        if total == 0 {
            return 0.0;
        }
        self.modules_skipped as f64 / total as f64
    }

    pub fn summary(&self) -> String {
        format!(
            "{} skipped, {} queued, {} scheduled across {} wave(s)",
            self.modules_skipped,
            self.modules_queued,
            self.modules_scheduled,
            self.waves.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_rate_is_zero_for_empty_stats() {
        assert_eq!(PlannerStats::default().skip_rate(), 0.0);
    }

    #[test]
    fn summary_reports_counts() {
        let stats = PlannerStats {
            modules_skipped: 3,
            modules_queued: 1,
            modules_scheduled: 2,
            waves: vec![Duration::from_millis(5)],
        };
        assert!(stats.summary().contains("3 skipped"));
    }
}
