use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Stats {
    pub routed_tasks: usize,
    pub failed_tasks: usize,
    pub expanded_windows: usize,
    pub committed_claims: usize,
    pub conflict_sweeps: usize,
    pub delays: usize,
    pub time_us: usize,
}

impl Stats {
    pub fn print(&self) {
        info!(
            "Routed {:?} Failed {:?} Time(microseconds) {:?} Expanded windows: {:?} Committed claims: {:?} Conflict sweeps: {:?} Delays: {:?}",
            self.routed_tasks,
            self.failed_tasks,
            self.time_us,
            self.expanded_windows,
            self.committed_claims,
            self.conflict_sweeps,
            self.delays
        );
    }
}
