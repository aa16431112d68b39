//! The session state published to the UI after every processed message.

use std::time::Duration;

use serde::Serialize;

use trestle_core::error::NormalizedError;
use trestle_core::inputs::FlowInputs;
use trestle_core::steps::StepRecord;
use trestle_core::types::AssetBalance;
use trestle_engine::engine::AllowancePrompt;
use trestle_engine::intent::RouteSnapshot;

/// Where the session's single intent currently is in its lifecycle. Denied
/// and errored intents return to `NoIntent`; the error banner, not the
/// phase, records what happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NoIntent,
    Proposed,
    Refreshing,
    Executing,
    Completed,
}

/// Immutable view of the session, published through a watch channel.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,

    pub inputs: FlowInputs,

    /// The commit-gating validity predicate, for enabling the submit action.
    pub inputs_valid: bool,

    /// Latest quoted route of the live intent, if any.
    pub route: Option<RouteSnapshot>,

    /// A propose call is in flight.
    pub committing: bool,

    /// A re-quote is in flight.
    pub refreshing: bool,

    /// An execute call is in flight.
    pub executing: bool,

    /// The execution progress surface is open.
    pub dialog_open: bool,

    /// Visible error banner; cleared by the next input mutation or explicit
    /// dismissal.
    pub error: Option<NormalizedError>,

    /// Ordered execution checklist.
    pub steps: Vec<StepRecord>,

    /// Every announced step is completed.
    pub all_steps_completed: bool,

    /// The flow's terminal step has completed. This, not
    /// `all_steps_completed`, gates overall completion UI.
    pub flow_complete: bool,

    /// Frozen-or-running execution stopwatch value.
    pub elapsed: Duration,

    /// Explorer URL of the settling transaction, from the receipt.
    pub explorer_url: Option<String>,

    /// Source-leg explorer URL (swaps).
    pub source_explorer_url: Option<String>,

    /// Destination-leg explorer URL (swaps).
    pub destination_explorer_url: Option<String>,

    /// Outstanding allowance prompt, if the engine announced one.
    pub allowance: Option<AllowancePrompt>,

    /// Unified balance as of the last fetch.
    pub balances: Option<Vec<AssetBalance>>,

    /// Balance entry matching the form's selected token.
    pub selected_balance: Option<AssetBalance>,
}

impl SessionSnapshot {
    /// Either a commit or an execution is in flight.
    pub fn loading(&self) -> bool {
        self.committing || self.executing
    }
}
