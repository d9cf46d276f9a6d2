//! When a memory update should run

/// The event that prompts an update attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateTrigger {
    /// Checked after every completed exchange.
    Periodic,
    /// The user asked for an update.
    ExplicitCommand,
    /// Clean exit.
    SessionEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdatePolicy {
    /// Completed exchanges since the last update before a periodic
    /// trigger fires.
    pub min_exchanges: usize,
}

impl Default for UpdatePolicy {
    fn default() -> Self {
        Self { min_exchanges: 2 }
    }
}

impl UpdatePolicy {
    pub fn new(min_exchanges: usize) -> Self {
        Self { min_exchanges }
    }

    /// Explicit and session-end triggers always fire; periodic ones wait
    /// for the exchange threshold.
    pub fn should_update(&self, exchanges_since_update: usize, trigger: UpdateTrigger) -> bool {
        match trigger {
            UpdateTrigger::ExplicitCommand | UpdateTrigger::SessionEnd => true,
            UpdateTrigger::Periodic => exchanges_since_update >= self.min_exchanges,
        }
    }
}
