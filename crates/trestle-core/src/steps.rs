//! Step progress tracking for multi-stage executions.
//!
//! The settlement engine announces execution steps over an event stream that
//! is unstable in both order and shape: the full step list may arrive at an
//! arbitrary point, completions may arrive out of order relative to it, and
//! the list may be re-sent mid-flight. [`StepTracker`] is a pure reducer over
//! that stream, keyed by stable step identity, producing a checklist whose
//! rows never reorder and whose completions never regress.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::inputs::FlowKind;
use crate::types::ChainId;

/// Stable step identities emitted by the engine.
pub mod step_keys {
    /// Transfer: intent handed to the solver network.
    pub const INTENT_SUBMITTED: &str = "INTENT_SUBMITTED";
    /// Transfer: funds collected on the source chains.
    pub const INTENT_COLLECTION: &str = "INTENT_COLLECTION";
    /// Transfer: funds delivered on the destination chain. Terminal.
    pub const INTENT_FULFILLED: &str = "INTENT_FULFILLED";

    /// Swap: source-chain leg executed.
    pub const SOURCE_SWAP: &str = "SOURCE_SWAP";
    /// Swap: source-chain transaction hash available. Carries an explorer
    /// URL; never appears as a checklist row.
    pub const SOURCE_SWAP_HASH: &str = "SOURCE_SWAP_HASH";
    /// Swap: destination-chain leg executed.
    pub const DESTINATION_SWAP: &str = "DESTINATION_SWAP";
    /// Swap: destination-chain transaction hash available. Carries an
    /// explorer URL; never appears as a checklist row.
    pub const DESTINATION_SWAP_HASH: &str = "DESTINATION_SWAP_HASH";
    /// Swap: both legs settled. Terminal.
    pub const SWAP_COMPLETE: &str = "SWAP_COMPLETE";
}

/// One step as described by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDescriptor {
    /// Stable identity correlating announcements with completions.
    pub key: String,

    /// Human-readable label.
    pub label: String,

    /// Chain the step runs on, when the engine says.
    pub chain: Option<ChainId>,

    /// Explorer URL for the step's transaction, when one exists.
    pub explorer_url: Option<String>,
}

impl StepDescriptor {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            chain: None,
            explorer_url: None,
        }
    }

    pub fn with_chain(mut self, chain: ChainId) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn with_explorer_url(mut self, url: impl Into<String>) -> Self {
        self.explorer_url = Some(url.into());
        self
    }
}

/// One row of the rendered checklist. The ordinal is fixed when the row is
/// announced; rows are never reordered afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub ordinal: usize,
    pub key: String,
    pub completed: bool,
    pub raw: StepDescriptor,
}

/// A step-stream event, reduced by [`StepTracker::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepEvent {
    /// The engine (re-)announced the full ordered step list.
    ListAnnounced(Vec<StepDescriptor>),
    /// The engine reported one step as completed.
    Completed(StepDescriptor),
}

/// Reducer state: the ordered rows plus the set of keys known completed.
///
/// The completed set survives list re-announcements, so a re-sent list can
/// never regress a step, and a completion that arrives before any list is
/// remembered until the list catches up rather than fabricating a row.
#[derive(Debug, Clone, Default)]
pub struct StepTracker {
    records: Vec<StepRecord>,
    completed: HashSet<String>,
}

impl StepTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with a known template so a checklist is visible before
    /// the first network event. Template rows are replaced wholesale by the
    /// first real list announcement.
    pub fn seed(&mut self, template: &[StepDescriptor]) {
        self.rebuild(template);
    }

    /// Reduce one event into the tracker.
    pub fn apply(&mut self, event: &StepEvent) {
        match event {
            StepEvent::ListAnnounced(list) => self.rebuild(list),
            StepEvent::Completed(step) => {
                self.completed.insert(step.key.clone());
                for record in &mut self.records {
                    if record.key == step.key {
                        record.completed = true;
                        record.raw = step.clone();
                    }
                }
            }
        }
    }

    /// Clear all rows and completion memory. Called at the start of every
    /// execution attempt and on every terminal-equivalent transition.
    pub fn reset(&mut self) {
        self.records.clear();
        self.completed.clear();
    }

    fn rebuild(&mut self, list: &[StepDescriptor]) {
        self.records = list
            .iter()
            .enumerate()
            .map(|(ordinal, step)| StepRecord {
                ordinal,
                key: step.key.clone(),
                completed: self.completed.contains(&step.key),
                raw: step.clone(),
            })
            .collect();
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True when at least one row exists and every row is completed.
    ///
    /// UI-level flow completion must additionally be gated on the flow's
    /// terminal step (see [`terminal_step`]): intermediate steps legitimately
    /// differ between transfer and bridge branches.
    pub fn all_completed(&self) -> bool {
        !self.records.is_empty() && self.records.iter().all(|r| r.completed)
    }

    /// Whether the given step key has been reported completed.
    pub fn is_completed(&self, key: &str) -> bool {
        self.completed.contains(key)
    }
}

/// The step list a flow is expected to run, used to seed the tracker before
/// the engine announces the real list.
pub fn expected_steps(kind: FlowKind) -> Vec<StepDescriptor> {
    match kind {
        FlowKind::Transfer => vec![
            StepDescriptor::new(step_keys::INTENT_SUBMITTED, "Submit intent"),
            StepDescriptor::new(step_keys::INTENT_COLLECTION, "Collect funds on sources"),
            StepDescriptor::new(step_keys::INTENT_FULFILLED, "Receive on destination"),
        ],
        FlowKind::ExactIn | FlowKind::ExactOut => vec![
            StepDescriptor::new(step_keys::SOURCE_SWAP, "Swap on source"),
            StepDescriptor::new(step_keys::DESTINATION_SWAP, "Swap on destination"),
            StepDescriptor::new(step_keys::SWAP_COMPLETE, "Swap complete"),
        ],
    }
}

/// The explicit terminal marker gating overall flow completion.
pub fn terminal_step(kind: FlowKind) -> &'static str {
    match kind {
        FlowKind::Transfer => step_keys::INTENT_FULFILLED,
        FlowKind::ExactIn | FlowKind::ExactOut => step_keys::SWAP_COMPLETE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_abc() -> Vec<StepDescriptor> {
        vec![
            StepDescriptor::new("A", "Step A"),
            StepDescriptor::new("B", "Step B"),
            StepDescriptor::new("C", "Step C"),
        ]
    }

    #[test]
    fn test_list_then_completions_in_order() {
        let mut tracker = StepTracker::new();
        tracker.apply(&StepEvent::ListAnnounced(list_abc()));
        for key in ["A", "B", "C"] {
            tracker.apply(&StepEvent::Completed(StepDescriptor::new(key, "")));
        }
        assert!(tracker.all_completed());
        assert_eq!(
            tracker.records().iter().map(|r| r.ordinal).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_relist_never_regresses_completion() {
        let mut tracker = StepTracker::new();
        tracker.apply(&StepEvent::ListAnnounced(list_abc()));
        tracker.apply(&StepEvent::Completed(StepDescriptor::new("B", "")));
        // The engine re-sends the list mid-flight.
        tracker.apply(&StepEvent::ListAnnounced(list_abc()));
        let b = tracker.records().iter().find(|r| r.key == "B").unwrap();
        assert!(b.completed);
        assert!(!tracker.all_completed());
    }

    #[test]
    fn test_completion_before_list_creates_no_orphan_row() {
        let mut tracker = StepTracker::new();
        tracker.apply(&StepEvent::Completed(StepDescriptor::new("B", "")));
        assert!(tracker.is_empty());
        assert!(!tracker.all_completed());

        // Once the list catches up the remembered completion is applied.
        tracker.apply(&StepEvent::ListAnnounced(list_abc()));
        let b = tracker.records().iter().find(|r| r.key == "B").unwrap();
        assert!(b.completed);
    }

    #[test]
    fn test_seed_replaced_by_real_list() {
        let mut tracker = StepTracker::new();
        tracker.seed(&expected_steps(FlowKind::Transfer));
        assert_eq!(tracker.records().len(), 3);

        tracker.apply(&StepEvent::ListAnnounced(vec![
            StepDescriptor::new("A", "Step A"),
            StepDescriptor::new("B", "Step B"),
        ]));
        assert_eq!(tracker.records().len(), 2);
        assert_eq!(tracker.records()[0].key, "A");
    }

    #[test]
    fn test_reset_clears_completion_memory() {
        let mut tracker = StepTracker::new();
        tracker.apply(&StepEvent::ListAnnounced(list_abc()));
        tracker.apply(&StepEvent::Completed(StepDescriptor::new("A", "")));
        tracker.reset();
        assert!(tracker.is_empty());

        tracker.apply(&StepEvent::ListAnnounced(list_abc()));
        assert!(!tracker.records()[0].completed);
    }

    #[test]
    fn test_completion_records_latest_descriptor() {
        let mut tracker = StepTracker::new();
        tracker.apply(&StepEvent::ListAnnounced(list_abc()));
        tracker.apply(&StepEvent::Completed(
            StepDescriptor::new("A", "Step A").with_explorer_url("https://scan.example/tx/1"),
        ));
        let a = tracker.records().iter().find(|r| r.key == "A").unwrap();
        assert_eq!(a.raw.explorer_url.as_deref(), Some("https://scan.example/tx/1"));
    }

    #[test]
    fn test_all_completed_requires_rows() {
        let tracker = StepTracker::new();
        assert!(!tracker.all_completed());
    }

    #[test]
    fn test_terminal_step_gating() {
        let mut tracker = StepTracker::new();
        tracker.apply(&StepEvent::ListAnnounced(expected_steps(FlowKind::ExactIn)));
        tracker.apply(&StepEvent::Completed(StepDescriptor::new(
            step_keys::SOURCE_SWAP,
            "",
        )));
        tracker.apply(&StepEvent::Completed(StepDescriptor::new(
            step_keys::DESTINATION_SWAP,
            "",
        )));
        assert!(!tracker.is_completed(terminal_step(FlowKind::ExactIn)));
        tracker.apply(&StepEvent::Completed(StepDescriptor::new(
            step_keys::SWAP_COMPLETE,
            "",
        )));
        assert!(tracker.is_completed(terminal_step(FlowKind::ExactIn)));
        assert!(tracker.all_completed());
    }
}
