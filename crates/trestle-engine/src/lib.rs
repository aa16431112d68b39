//! # Trestle Engine
//!
//! The settlement-engine contract the orchestrator consumes, treated as a
//! black box: proposing intents, re-quoting them, executing the multi-step
//! settlement, and unified-balance queries. Routing, fee computation and
//! transaction construction all live behind [`SettlementEngine`].
//!
//! A [`SimulatedEngine`] is included for tests and local development.

pub mod engine;
pub mod intent;
pub mod sim;

pub use engine::{
    AllowancePrompt, ExactInRequest, ExactOutRequest, ExecuteEvent, ExecuteReceipt,
    ExecuteRequest, MaxAmount, MaxRequest, ProposeRequest, RequestError, SettlementEngine,
    SourceSpend, TransferRequest,
};
pub use intent::{
    DestinationQuote, FeeBreakdown, IntentApi, ProposedIntent, RouteSnapshot, SourceAllocation,
};
pub use sim::{EngineCounters, SimulatedEngine, SimulatedEngineBuilder};

/// Prelude module for common imports.
pub mod prelude {
    pub use crate::engine::{ExecuteEvent, ExecuteReceipt, ProposeRequest, SettlementEngine};
    pub use crate::intent::{IntentApi, ProposedIntent, RouteSnapshot};
    pub use crate::sim::SimulatedEngine;
    pub use trestle_core::prelude::*;
}
