//! Session configuration: flow timings and completion callbacks.

use std::sync::Arc;
use std::time::Duration;

use trestle_core::error::NormalizedError;
use trestle_core::inputs::{FlowKind, Prefill};
use trestle_core::types::{Address, Network};

/// Granularity of the execution stopwatch.
pub const STOPWATCH_TICK: Duration = Duration::from_millis(100);

/// Quiet period after the last transfer-amount keystroke before committing.
pub const TRANSFER_COMMIT_QUIET: Duration = Duration::from_millis(800);

/// Quiet period after the last swap-amount keystroke before committing.
pub const SWAP_COMMIT_QUIET: Duration = Duration::from_millis(600);

/// Re-quote interval while a transfer intent awaits review.
pub const TRANSFER_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Re-quote interval while a swap intent awaits review.
pub const SWAP_REFRESH_INTERVAL: Duration = Duration::from_secs(15);

/// Debounce quiet period for a flow's amount field.
pub fn commit_quiet_period(kind: FlowKind) -> Duration {
    match kind {
        FlowKind::Transfer => TRANSFER_COMMIT_QUIET,
        FlowKind::ExactIn | FlowKind::ExactOut => SWAP_COMMIT_QUIET,
    }
}

/// Re-quote interval for a flow's live intent.
pub fn refresh_interval(kind: FlowKind) -> Duration {
    match kind {
        FlowKind::Transfer => TRANSFER_REFRESH_INTERVAL,
        FlowKind::ExactIn | FlowKind::ExactOut => SWAP_REFRESH_INTERVAL,
    }
}

/// Invoked once per successful completion, with the delivered destination
/// amount when the route quoted one.
pub type CompleteCallback = Arc<dyn Fn(Option<String>) + Send + Sync>;

/// Invoked when an execution attempt starts.
pub type StartCallback = Arc<dyn Fn() + Send + Sync>;

/// Invoked with every surfaced (non-refresh) failure.
pub type ErrorCallback = Arc<dyn Fn(&NormalizedError) + Send + Sync>;

/// Configuration for one orchestrator session. One session per connected
/// account and flow; sessions share nothing.
#[derive(Clone)]
pub struct SessionConfig {
    pub kind: FlowKind,
    pub network: Network,
    pub connected: Address,
    pub prefill: Prefill,
    pub on_complete: Option<CompleteCallback>,
    pub on_start: Option<StartCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl SessionConfig {
    pub fn new(kind: FlowKind, network: Network, connected: Address) -> Self {
        Self {
            kind,
            network,
            connected,
            prefill: Prefill::default(),
            on_complete: None,
            on_start: None,
            on_error: None,
        }
    }

    pub fn with_prefill(mut self, prefill: Prefill) -> Self {
        self.prefill = prefill;
        self
    }

    pub fn on_complete(mut self, callback: impl Fn(Option<String>) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Arc::new(callback));
        self
    }

    pub fn on_start(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_start = Some(Arc::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&NormalizedError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_timings() {
        assert_eq!(commit_quiet_period(FlowKind::Transfer), Duration::from_millis(800));
        assert_eq!(commit_quiet_period(FlowKind::ExactIn), Duration::from_millis(600));
        assert_eq!(refresh_interval(FlowKind::Transfer), Duration::from_secs(5));
        assert_eq!(refresh_interval(FlowKind::ExactOut), Duration::from_secs(15));
    }
}
