//! The intent lifecycle state machine.
//!
//! All mutable session state lives in [`SessionState`], owned by a single
//! loop task. Timers and spawned engine calls never touch state directly;
//! they send a [`Msg`] back into the loop, so every transition is serialized
//! and ordering guarantees (deny-before-discard, stale-result discard) hold
//! by construction.
//!
//! Staleness is tracked three ways:
//! - `epoch` bumps on every input mutation; a proposal that resolves under an
//!   older epoch was quoted against inputs that no longer exist and is denied
//!   on arrival.
//! - refresh resolutions carry the intent id they were started for and are
//!   discarded unless that intent is still the live one.
//! - `exec_generation` bumps per execution attempt; events and receipts from
//!   a superseded execution are ignored.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use trestle_core::error::{normalize, EngineError, NormalizedError, USER_REJECTED};
use trestle_core::inputs::{FlowInputs, FlowKind, InputEdit};
use trestle_core::steps::{expected_steps, step_keys, terminal_step, StepEvent, StepTracker};
use trestle_core::types::AssetBalance;
use trestle_engine::engine::{
    AllowancePrompt, ExecuteEvent, ExecuteReceipt, ExecuteRequest, MaxAmount, MaxRequest,
    ProposeRequest, SettlementEngine,
};
use trestle_engine::intent::{ProposedIntent, RouteSnapshot};

use crate::config::{commit_quiet_period, refresh_interval, SessionConfig, STOPWATCH_TICK};
use crate::scheduler::{schedule_interval, schedule_once, TaskHandle};
use crate::snapshot::{Phase, SessionSnapshot};
use crate::stopwatch::Stopwatch;

/// Everything the session loop can be asked to do or told about.
#[derive(Debug)]
pub(crate) enum Msg {
    // Commands from the handle.
    Edit(InputEdit),
    CommitNow,
    UseMax,
    Accept,
    Deny,
    Reset,
    DismissError,
    CloseDialog,
    Shutdown,

    // Timer firings.
    DebounceFired { seq: u64 },
    RefreshTick,
    StopwatchTick,

    // Resolutions of spawned engine calls.
    CommitResolved {
        epoch: u64,
        request: ProposeRequest,
        outcome: Result<ProposedIntent, EngineError>,
    },
    RefreshResolved {
        intent_id: Uuid,
        outcome: Result<RouteSnapshot, EngineError>,
    },
    ExecutionEvent {
        generation: u64,
        event: ExecuteEvent,
    },
    ExecutionResolved {
        generation: u64,
        outcome: Result<Option<ExecuteReceipt>, EngineError>,
    },
    MaxResolved {
        outcome: Result<MaxAmount, EngineError>,
    },
    BalanceFetched {
        outcome: Result<Vec<AssetBalance>, EngineError>,
    },
}

/// The one live intent, together with the request it was quoted for.
struct LiveIntent {
    intent: ProposedIntent,
    params: ProposeRequest,
}

pub(crate) struct SessionState {
    engine: Arc<dyn SettlementEngine>,
    config: SessionConfig,
    tx: mpsc::UnboundedSender<Msg>,

    inputs: FlowInputs,
    initial_inputs: FlowInputs,

    epoch: u64,
    debounce_seq: u64,
    pending_commit: Option<TaskHandle>,
    committing: bool,

    live: Option<LiveIntent>,
    refresh_task: Option<TaskHandle>,
    refreshing_intent: Option<Uuid>,

    executing: bool,
    exec_generation: u64,
    completed: bool,
    dialog_open: bool,

    error: Option<NormalizedError>,
    steps: StepTracker,
    stopwatch: Stopwatch,
    stopwatch_task: Option<TaskHandle>,

    explorer_url: Option<String>,
    source_explorer_url: Option<String>,
    destination_explorer_url: Option<String>,
    allowance: Option<AllowancePrompt>,
    balances: Option<Vec<AssetBalance>>,
}

impl SessionState {
    pub(crate) fn new(
        engine: Arc<dyn SettlementEngine>,
        config: SessionConfig,
        tx: mpsc::UnboundedSender<Msg>,
    ) -> Self {
        let initial_inputs = FlowInputs::initial(
            config.kind,
            config.network,
            &config.connected,
            &config.prefill,
        );
        Self {
            engine,
            tx,
            inputs: initial_inputs.clone(),
            initial_inputs,
            epoch: 0,
            debounce_seq: 0,
            pending_commit: None,
            committing: false,
            live: None,
            refresh_task: None,
            refreshing_intent: None,
            executing: false,
            exec_generation: 0,
            completed: false,
            dialog_open: false,
            error: None,
            steps: StepTracker::new(),
            stopwatch: Stopwatch::new(),
            stopwatch_task: None,
            explorer_url: None,
            source_explorer_url: None,
            destination_explorer_url: None,
            allowance: None,
            balances: None,
            config,
        }
    }

    pub(crate) fn handle(&mut self, msg: Msg) {
        match msg {
            Msg::Edit(edit) => self.on_edit(edit),
            Msg::CommitNow => self.on_commit_now(),
            Msg::UseMax => self.on_use_max(),
            Msg::Accept => self.on_accept(),
            Msg::Deny => self.on_deny(),
            Msg::Reset => self.on_reset(),
            Msg::DismissError => self.on_dismiss_error(),
            Msg::CloseDialog => self.on_close_dialog(),
            Msg::Shutdown => unreachable!("handled by the loop"),
            Msg::DebounceFired { seq } => self.on_debounce_fired(seq),
            Msg::RefreshTick => self.on_refresh_tick(),
            Msg::StopwatchTick => self.on_stopwatch_tick(),
            Msg::CommitResolved { epoch, request, outcome } => {
                self.on_commit_resolved(epoch, request, outcome)
            }
            Msg::RefreshResolved { intent_id, outcome } => {
                self.on_refresh_resolved(intent_id, outcome)
            }
            Msg::ExecutionEvent { generation, event } => {
                self.on_execution_event(generation, event)
            }
            Msg::ExecutionResolved { generation, outcome } => {
                self.on_execution_resolved(generation, outcome)
            }
            Msg::MaxResolved { outcome } => self.on_max_resolved(outcome),
            Msg::BalanceFetched { outcome } => self.on_balance_fetched(outcome),
        }
    }

    // ---- input mutation & commit pipeline ----

    fn on_edit(&mut self, edit: InputEdit) {
        // Mutation clears any visible error and invalidates whatever was
        // quoted against the previous inputs, before the field is touched.
        self.error = None;
        self.completed = false;
        self.epoch += 1;
        if let Some(live) = self.live.take() {
            live.intent.api.deny();
            self.refresh_task = None;
            self.steps.reset();
            debug!(intent = %live.intent.id, "input mutated, denied live intent");
        }

        if !self.inputs.apply(&edit) {
            warn!(?edit, "dropping edit that does not apply to this flow");
            return;
        }

        if edit.is_amount() {
            self.debounce_seq += 1;
            self.pending_commit = Some(schedule_once(
                commit_quiet_period(self.config.kind),
                self.tx.clone(),
                Msg::DebounceFired { seq: self.debounce_seq },
            ));
        }
    }

    fn on_debounce_fired(&mut self, seq: u64) {
        if seq != self.debounce_seq {
            // A newer keystroke rescheduled the window after this fire was
            // already in the queue.
            return;
        }
        self.pending_commit = None;
        self.try_commit();
    }

    fn on_commit_now(&mut self) {
        self.pending_commit = None;
        self.debounce_seq += 1;
        self.try_commit();
    }

    fn try_commit(&mut self) {
        if self.committing {
            debug!("commit suppressed: propose already in flight");
            return;
        }
        if self.live.is_some() {
            debug!("commit suppressed: an intent is already live");
            return;
        }
        if self.executing {
            debug!("commit suppressed: execution in progress");
            return;
        }
        if self.error.is_some() {
            debug!("commit suppressed: unresolved error banner");
            return;
        }
        if !self.inputs.is_valid() {
            debug!("commit suppressed: inputs not valid");
            return;
        }
        let request = match ProposeRequest::from_inputs(&self.inputs) {
            Ok(request) => request,
            Err(err) => {
                debug!(%err, "commit suppressed: could not build request");
                return;
            }
        };

        self.committing = true;
        let epoch = self.epoch;
        let engine = self.engine.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = engine.propose(request.clone()).await;
            // Sent unconditionally: the resolution is what clears the
            // re-entrancy guard.
            let _ = tx.send(Msg::CommitResolved { epoch, request, outcome });
        });
    }

    fn on_commit_resolved(
        &mut self,
        epoch: u64,
        request: ProposeRequest,
        outcome: Result<ProposedIntent, EngineError>,
    ) {
        self.committing = false;
        match outcome {
            Ok(intent) => {
                if epoch != self.epoch || self.live.is_some() || self.executing {
                    debug!(intent = %intent.id, "denying proposal quoted against stale inputs");
                    intent.api.deny();
                    return;
                }
                debug!(intent = %intent.id, "intent proposed");
                self.live = Some(LiveIntent { intent, params: request });
                self.refresh_task = Some(schedule_interval(
                    refresh_interval(self.config.kind),
                    self.tx.clone(),
                    || Msg::RefreshTick,
                ));
            }
            Err(err) => {
                let normalized = normalize(&err);
                warn!(error = %normalized, "propose failed");
                self.dialog_open = false;
                self.notify_error(&normalized);
                self.error = Some(normalized);
            }
        }
    }

    // ---- refresh loop ----

    fn on_refresh_tick(&mut self) {
        if self.dialog_open || self.executing {
            return;
        }
        let Some(live) = &self.live else { return };
        if self.refreshing_intent.is_some() {
            // A failed refresh is retried by the next tick, never sooner.
            debug!("refresh tick skipped: previous refresh still in flight");
            return;
        }

        let intent_id = live.intent.id;
        self.refreshing_intent = Some(intent_id);
        let api = live.intent.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = api.refresh().await;
            let _ = tx.send(Msg::RefreshResolved { intent_id, outcome });
        });
    }

    fn on_refresh_resolved(
        &mut self,
        intent_id: Uuid,
        outcome: Result<RouteSnapshot, EngineError>,
    ) {
        if self.refreshing_intent == Some(intent_id) {
            self.refreshing_intent = None;
        }
        let Some(live) = &mut self.live else {
            debug!(intent = %intent_id, "discarding refresh for a cleared intent");
            return;
        };
        if live.intent.id != intent_id {
            debug!(intent = %intent_id, "discarding refresh for a superseded intent");
            return;
        }
        match outcome {
            Ok(route) => live.intent.route = route,
            // Staleness beats losing the user's place mid-review.
            Err(err) => warn!(intent = %intent_id, error = %err, "intent refresh failed"),
        }
    }

    // ---- accept / execute ----

    fn on_accept(&mut self) {
        if self.executing {
            warn!("accept ignored: execution already running");
            return;
        }
        let Some(live) = &self.live else {
            warn!("accept ignored: no live intent");
            return;
        };

        if let Some(callback) = &self.config.on_start {
            callback();
        }
        live.intent.api.allow();

        // No refresh may race against execution.
        self.refresh_task = None;
        self.dialog_open = true;
        self.error = None;
        self.completed = false;
        self.allowance = None;
        self.explorer_url = None;
        self.source_explorer_url = None;
        self.destination_explorer_url = None;

        self.steps.reset();
        self.steps.seed(&expected_steps(self.config.kind));
        self.stopwatch.reset();
        self.stopwatch.start();
        self.stopwatch_task = Some(schedule_interval(
            STOPWATCH_TICK,
            self.tx.clone(),
            || Msg::StopwatchTick,
        ));

        self.executing = true;
        self.exec_generation += 1;
        let generation = self.exec_generation;
        let request = ExecuteRequest {
            intent_id: live.intent.id,
            params: live.params.clone(),
        };
        info!(intent = %live.intent.id, "executing intent");

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let forward_tx = self.tx.clone();
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                if forward_tx.send(Msg::ExecutionEvent { generation, event }).is_err() {
                    break;
                }
            }
        });

        let engine = self.engine.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = engine.execute(request, event_tx).await;
            let _ = tx.send(Msg::ExecutionResolved { generation, outcome });
        });
    }

    fn on_execution_event(&mut self, generation: u64, event: ExecuteEvent) {
        if generation != self.exec_generation {
            debug!("ignoring event from a superseded execution");
            return;
        }
        match event {
            ExecuteEvent::StepsList(list) => {
                self.steps.apply(&StepEvent::ListAnnounced(list));
            }
            ExecuteEvent::StepComplete(step) => {
                if let Some(url) = &step.explorer_url {
                    match step.key.as_str() {
                        step_keys::SOURCE_SWAP_HASH => {
                            self.source_explorer_url = Some(url.clone());
                        }
                        step_keys::DESTINATION_SWAP_HASH => {
                            self.destination_explorer_url = Some(url.clone());
                        }
                        _ => {}
                    }
                }
                self.steps.apply(&StepEvent::Completed(step));
                if self.flow_complete() {
                    self.stopwatch.stop();
                    self.stopwatch_task = None;
                }
            }
            ExecuteEvent::AllowanceRequired(prompt) => self.allowance = Some(prompt),
        }
    }

    fn on_execution_resolved(
        &mut self,
        generation: u64,
        outcome: Result<Option<ExecuteReceipt>, EngineError>,
    ) {
        if generation != self.exec_generation {
            debug!("ignoring receipt from a superseded execution");
            return;
        }
        // Cleared on every path, success or failure.
        self.executing = false;
        self.stopwatch.stop();
        self.stopwatch_task = None;

        match outcome {
            Ok(Some(receipt)) if receipt.success => self.settle(receipt),
            Ok(Some(receipt)) => {
                let message = receipt.error.unwrap_or_else(|| match self.config.kind {
                    FlowKind::Transfer => "Transfer failed".to_string(),
                    FlowKind::ExactIn | FlowKind::ExactOut => "Swap failed".to_string(),
                });
                self.fail_execution(NormalizedError::message_only(message));
            }
            // A missing receipt is the wallet layer declining to sign.
            Ok(None) => self.fail_execution(NormalizedError::message_only(USER_REJECTED)),
            Err(err) => self.fail_execution(normalize(&err)),
        }
    }

    /// Settlement side effects. The only path that refetches the balance.
    fn settle(&mut self, receipt: ExecuteReceipt) {
        let delivered = self
            .live
            .take()
            .map(|live| live.intent.route.destination.amount);
        info!(amount = ?delivered, "execution complete");

        self.explorer_url = receipt.explorer_url;
        self.refresh_task = None;
        self.allowance = None;
        self.completed = true;
        self.error = None;

        // The form returns to its defaults; orphan anything scheduled for it.
        self.inputs = self.initial_inputs.clone();
        self.epoch += 1;
        self.debounce_seq += 1;
        self.pending_commit = None;

        if let Some(callback) = &self.config.on_complete {
            callback(delivered);
        }
        self.request_balance_refetch();
    }

    fn fail_execution(&mut self, normalized: NormalizedError) {
        warn!(error = %normalized, "execution failed");
        // Cleared, not denied: allow() was already signalled.
        self.live = None;
        self.refresh_task = None;
        self.dialog_open = false;
        self.steps.reset();
        self.allowance = None;
        self.notify_error(&normalized);
        self.error = Some(normalized);
    }

    // ---- user-driven transitions ----

    fn on_deny(&mut self) {
        let Some(live) = self.live.take() else { return };
        live.intent.api.deny();
        self.refresh_task = None;
        self.steps.reset();
        self.completed = false;
        debug!(intent = %live.intent.id, "intent denied by user");
    }

    fn on_dismiss_error(&mut self) {
        self.error = None;
        self.teardown_lifecycle();
    }

    fn on_reset(&mut self) {
        self.error = None;
        self.teardown_lifecycle();
        self.inputs = self.initial_inputs.clone();
        self.explorer_url = None;
        self.source_explorer_url = None;
        self.destination_explorer_url = None;
    }

    fn on_close_dialog(&mut self) {
        self.dialog_open = false;
        self.stopwatch.stop();
        self.stopwatch_task = None;
    }

    /// Return the lifecycle to `NoIntent`: deny anything live, stop every
    /// timer, orphan every in-flight call.
    fn teardown_lifecycle(&mut self) {
        if let Some(live) = self.live.take() {
            live.intent.api.deny();
        }
        self.refresh_task = None;
        self.pending_commit = None;
        self.epoch += 1;
        self.debounce_seq += 1;
        self.exec_generation += 1;
        self.executing = false;
        self.dialog_open = false;
        self.completed = false;
        self.steps.reset();
        self.allowance = None;
        self.stopwatch.stop();
        self.stopwatch_task = None;
    }

    // ---- convenience & ambient ----

    fn on_use_max(&mut self) {
        let request = match &self.inputs {
            FlowInputs::Transfer(t) => MaxRequest { token: t.token.clone(), chain: t.chain },
            FlowInputs::ExactIn(s) => match &s.from_token {
                Some(token) => MaxRequest {
                    token: token.symbol.clone(),
                    chain: s.from_chain,
                },
                None => {
                    debug!("max ignored: no source token selected");
                    return;
                }
            },
            FlowInputs::ExactOut(_) => {
                debug!("max ignored: exact-out fixes the destination amount");
                return;
            }
        };

        let engine = self.engine.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = engine.calculate_max(request).await;
            let _ = tx.send(Msg::MaxResolved { outcome });
        });
    }

    fn on_max_resolved(&mut self, outcome: Result<MaxAmount, EngineError>) {
        match outcome {
            Ok(max) => {
                // Max is an explicit choice; commit without waiting out the
                // debounce window.
                self.on_edit(InputEdit::Amount(max.amount));
                self.pending_commit = None;
                self.try_commit();
            }
            Err(err) => warn!(error = %err, "max calculation failed"),
        }
    }

    fn on_stopwatch_tick(&mut self) {
        if self.dialog_open && !self.flow_complete() {
            self.stopwatch.tick(STOPWATCH_TICK);
        } else {
            self.stopwatch.stop();
            self.stopwatch_task = None;
        }
    }

    pub(crate) fn request_balance_refetch(&mut self) {
        let engine = self.engine.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = engine.fetch_unified_balance().await;
            let _ = tx.send(Msg::BalanceFetched { outcome });
        });
    }

    fn on_balance_fetched(&mut self, outcome: Result<Vec<AssetBalance>, EngineError>) {
        match outcome {
            Ok(balances) => self.balances = Some(balances),
            Err(err) => warn!(error = %err, "unified balance fetch failed"),
        }
    }

    fn notify_error(&self, error: &NormalizedError) {
        if let Some(callback) = &self.config.on_error {
            callback(error);
        }
    }

    fn flow_complete(&self) -> bool {
        self.steps.is_completed(terminal_step(self.config.kind))
    }

    // ---- view ----

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        let phase = if self.executing {
            Phase::Executing
        } else if self.completed {
            Phase::Completed
        } else if self.live.is_some() {
            if self.refreshing_intent.is_some() {
                Phase::Refreshing
            } else {
                Phase::Proposed
            }
        } else {
            Phase::NoIntent
        };

        let selected_balance = self.inputs.selected_symbol().and_then(|symbol| {
            self.balances
                .as_ref()?
                .iter()
                .find(|balance| balance.symbol == symbol)
                .cloned()
        });

        SessionSnapshot {
            phase,
            inputs: self.inputs.clone(),
            inputs_valid: self.inputs.is_valid(),
            route: self.live.as_ref().map(|live| live.intent.route.clone()),
            committing: self.committing,
            refreshing: self.refreshing_intent.is_some(),
            executing: self.executing,
            dialog_open: self.dialog_open,
            error: self.error.clone(),
            steps: self.steps.records().to_vec(),
            all_steps_completed: self.steps.all_completed(),
            flow_complete: self.flow_complete(),
            elapsed: self.stopwatch.elapsed(),
            explorer_url: self.explorer_url.clone(),
            source_explorer_url: self.source_explorer_url.clone(),
            destination_explorer_url: self.destination_explorer_url.clone(),
            allowance: self.allowance.clone(),
            balances: self.balances.clone(),
            selected_balance,
        }
    }
}
