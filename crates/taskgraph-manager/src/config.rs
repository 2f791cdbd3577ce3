//! Manager configuration: a plain builder, not a file loader.
//!
//! Loading a manager's configuration from disk is explicitly out of scope
//! (spec §1); the pieces that do need adjusting at construction time — the
//! fan-in deadline, the default `RAISE_ON_ERROR` flag — are exposed as
//! `with_*` setters in the same style as
//! `orchestrator::TaskExecutionEngine::with_max_execution_time`.

use std::time::Duration;

use taskgraph_core::context::DEFAULT_FAN_IN_TIMEOUT;

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub(crate) fan_in_timeout: Duration,
    pub(crate) raise_on_error_default: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            fan_in_timeout: DEFAULT_FAN_IN_TIMEOUT,
            raise_on_error_default: false,
        }
    }
}

impl ManagerConfig {
    pub fn with_fan_in_timeout(mut self, timeout: Duration) -> Self {
        self.fan_in_timeout = timeout;
        self
    }

    pub fn with_raise_on_error_default(mut self, raise: bool) -> Self {
        self.raise_on_error_default = raise;
        self
    }
}
