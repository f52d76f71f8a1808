use serde::{Deserialize, Serialize};

/// Running counters owned by one orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerStatistics {
    /// Indexes actually built
    pub optimizations_performed: u64,
    /// Builds whose improvement was measured on two clean observations
    pub verified_optimizations: u64,
    /// Sum of verified improvements
    pub total_improvement_percent: f64,
    pub cycles_completed: u64,
}

impl ControllerStatistics {
    /// Mean over verified optimizations only.
    pub fn average_improvement_percent(&self) -> f64 {
        self.total_improvement_percent / self.verified_optimizations.max(1) as f64
    }

    pub(crate) fn record_cycle(&mut self, created_index: bool, improvement: Option<f64>) {
        self.cycles_completed += 1;
        if created_index {
            self.optimizations_performed += 1;
            if let Some(improvement) = improvement {
                self.verified_optimizations += 1;
                self.total_improvement_percent += improvement;
            }
        }
    }
}
