//! # Trestle Core
//!
//! Core primitives and types for Trestle cross-chain intent orchestration.
//!
//! This crate provides the fundamental building blocks:
//! - [`FlowInputs`] - Structured user input for each flow, with its validity predicate
//! - [`StepTracker`] - Pure reducer turning the engine's step-event stream into a stable checklist
//! - [`NormalizedError`] - Uniform error shape for display and lifecycle decisions
//! - [`ChainId`], [`Address`] and the other wire-shaped primitives

pub mod error;
pub mod inputs;
pub mod steps;
pub mod types;

// Re-exports for convenience
pub use error::{normalize, EngineError, NormalizedError, UNEXPECTED_ERROR, USER_REJECTED};
pub use inputs::{
    ExactInInputs, ExactOutInputs, FlowInputs, FlowKind, InputEdit, Prefill, TransferInputs,
    ValidationError,
};
pub use steps::{expected_steps, terminal_step, StepDescriptor, StepEvent, StepRecord, StepTracker};
pub use types::{Address, AssetBalance, ChainId, Network, TokenMeta};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{normalize, EngineError, NormalizedError};
    pub use crate::inputs::{FlowInputs, FlowKind, InputEdit, Prefill};
    pub use crate::steps::{StepDescriptor, StepEvent, StepRecord, StepTracker};
    pub use crate::types::{Address, AssetBalance, ChainId, Network, TokenMeta};
}
