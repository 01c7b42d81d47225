//! Adaptive refresh interval

use std::time::Duration;

use crate::models::pipeline::Pipeline;

/// Poll fast while anything runs, slow otherwise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalPolicy {
    /// Interval while any stage is in progress
    pub active: Duration,

    /// Interval when nothing is running
    pub idle: Duration,
}

impl Default for IntervalPolicy {
    fn default() -> Self {
        Self {
            active: Duration::from_secs(5),
            idle: Duration::from_secs(60),
        }
    }
}

impl IntervalPolicy {
    /// Interval to wait before polling `pipeline` again
    pub fn next_interval(&self, pipeline: &Pipeline) -> Duration {
        if pipeline.is_in_progress() {
            self.active
        } else {
            self.idle
        }
    }
}
