//! IDLE/RUN mode and the gravity interval that goes with it.

use std::fmt;
use std::time::Duration;
use tracing::info;

/// Baseline gravity interval with no command running.
pub const DEFAULT_IDLE_GRAVITY_MS: u64 = 450;
/// Gravity interval while at least one command is tracked.
pub const DEFAULT_RUN_GRAVITY_MS: u64 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Idle,
    Run,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("IDLE"),
            Self::Run => f.write_str("RUN"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModeController {
    mode: RunMode,
    idle_interval: Duration,
    run_interval: Duration,
}

impl ModeController {
    pub fn new(idle_interval: Duration, run_interval: Duration) -> Self {
        Self {
            mode: RunMode::Idle,
            idle_interval,
            run_interval,
        }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Recompute the mode from the number of tracked runs (active or still
    /// waiting for their outcome to be applied).
    pub fn observe(&mut self, tracked_runs: usize) -> RunMode {
        let mode = if tracked_runs > 0 {
            RunMode::Run
        } else {
            RunMode::Idle
        };
        if mode != self.mode {
            info!(from = %self.mode, to = %mode, tracked_runs, "mode change");
            self.mode = mode;
        }
        mode
    }

    pub fn gravity_interval(&self) -> Duration {
        match self.mode {
            RunMode::Idle => self.idle_interval,
            RunMode::Run => self.run_interval,
        }
    }
}

impl Default for ModeController {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_IDLE_GRAVITY_MS),
            Duration::from_millis(DEFAULT_RUN_GRAVITY_MS),
        )
    }
}
