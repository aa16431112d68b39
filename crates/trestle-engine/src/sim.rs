//! In-process simulated settlement engine.
//!
//! Quotes with a flat fee rate, executes by replaying a per-flow step script
//! with short delays, and keeps call counters so orchestration tests can
//! assert exactly how many propose/refresh/allow/deny calls they caused.
//! Failure injection covers the three failure shapes the orchestrator has to
//! survive: a propose error, a failed receipt, and a wallet rejection.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::debug;
use uuid::Uuid;

use trestle_core::error::EngineError;
use trestle_core::steps::{expected_steps, step_keys, StepDescriptor};
use trestle_core::types::{AssetBalance, ChainId};
use trestle_core::FlowKind;

use crate::engine::{
    AllowancePrompt, ExecuteEvent, ExecuteReceipt, ExecuteRequest, MaxAmount, MaxRequest,
    ProposeRequest, SettlementEngine,
};
use crate::intent::{
    DestinationQuote, FeeBreakdown, IntentApi, ProposedIntent, RouteSnapshot, SourceAllocation,
};

/// Base units per token in simulated quotes. The simulator prices every
/// token with six decimals; real engines resolve per-token precision.
const SIM_DECIMALS: u32 = 6;

/// Call counters exposed to tests.
#[derive(Debug, Default)]
pub struct EngineCounters {
    proposals: AtomicUsize,
    refreshes: AtomicUsize,
    allows: AtomicUsize,
    denies: AtomicUsize,
    executions: AtomicUsize,
    balance_fetches: AtomicUsize,
}

impl EngineCounters {
    pub fn proposals(&self) -> usize {
        self.proposals.load(Ordering::SeqCst)
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn allows(&self) -> usize {
        self.allows.load(Ordering::SeqCst)
    }

    pub fn denies(&self) -> usize {
        self.denies.load(Ordering::SeqCst)
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    pub fn balance_fetches(&self) -> usize {
        self.balance_fetches.load(Ordering::SeqCst)
    }
}

/// Builder for [`SimulatedEngine`].
#[derive(Debug, Clone)]
pub struct SimulatedEngineBuilder {
    fee_bps: u64,
    drift_bps: u64,
    step_delay: Duration,
    propose_delay: Duration,
    refresh_delay: Duration,
    fail_propose: Option<(String, String)>,
    fail_execute: Option<String>,
    reject_execute: bool,
    require_allowance: bool,
    balances: Vec<AssetBalance>,
}

impl Default for SimulatedEngineBuilder {
    fn default() -> Self {
        Self {
            fee_bps: 50,
            drift_bps: 0,
            step_delay: Duration::from_millis(40),
            propose_delay: Duration::from_millis(10),
            refresh_delay: Duration::from_millis(10),
            fail_propose: None,
            fail_execute: None,
            reject_execute: false,
            require_allowance: false,
            balances: vec![
                AssetBalance {
                    symbol: "USDC".to_string(),
                    balance: "125.5".to_string(),
                    fiat_value: Some(125.5),
                },
                AssetBalance {
                    symbol: "ETH".to_string(),
                    balance: "0.42".to_string(),
                    fiat_value: Some(1190.0),
                },
            ],
        }
    }
}

impl SimulatedEngineBuilder {
    /// Flat routing fee in basis points.
    pub fn fee_bps(mut self, bps: u64) -> Self {
        self.fee_bps = bps;
        self
    }

    /// Maximum random quote movement per refresh, in basis points. Zero
    /// keeps re-quotes deterministic.
    pub fn drift_bps(mut self, bps: u64) -> Self {
        self.drift_bps = bps;
        self
    }

    pub fn step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    pub fn propose_delay(mut self, delay: Duration) -> Self {
        self.propose_delay = delay;
        self
    }

    pub fn refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    /// Every propose call fails with this structured error.
    pub fn fail_propose(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.fail_propose = Some((code.into(), message.into()));
        self
    }

    /// Every execute call returns a failed receipt with this message after
    /// completing the first step.
    pub fn fail_execute(mut self, message: impl Into<String>) -> Self {
        self.fail_execute = Some(message.into());
        self
    }

    /// Every execute call resolves to `Ok(None)`: wallet rejection.
    pub fn reject_execute(mut self) -> Self {
        self.reject_execute = true;
        self
    }

    /// Emit an allowance prompt before the step script starts.
    pub fn require_allowance(mut self) -> Self {
        self.require_allowance = true;
        self
    }

    pub fn balances(mut self, balances: Vec<AssetBalance>) -> Self {
        self.balances = balances;
        self
    }

    pub fn build(self) -> SimulatedEngine {
        SimulatedEngine {
            counters: Arc::new(EngineCounters::default()),
            proposals_seen: Mutex::new(Vec::new()),
            config: self,
        }
    }
}

/// See module docs.
pub struct SimulatedEngine {
    config: SimulatedEngineBuilder,
    counters: Arc<EngineCounters>,
    proposals_seen: Mutex<Vec<ProposeRequest>>,
}

impl SimulatedEngine {
    pub fn builder() -> SimulatedEngineBuilder {
        SimulatedEngineBuilder::default()
    }

    pub fn counters(&self) -> &EngineCounters {
        &self.counters
    }

    /// Every propose request observed, in order.
    pub fn proposals_seen(&self) -> Vec<ProposeRequest> {
        self.proposals_seen.lock().expect("proposals lock").clone()
    }

    fn quote(request: &ProposeRequest, fee_bps: u64, drift_bps: u64) -> RouteSnapshot {
        let (token, spend, to_chain) = match request {
            ProposeRequest::Transfer(t) => (
                t.token.clone(),
                t.amount.trim().parse::<f64>().unwrap_or(0.0),
                t.to_chain,
            ),
            ProposeRequest::ExactIn(s) => (
                "TOKEN".to_string(),
                s.from.iter().map(|f| f.amount as f64).sum::<f64>()
                    / 10f64.powi(SIM_DECIMALS as i32),
                s.to_chain,
            ),
            ProposeRequest::ExactOut(s) => (
                "TOKEN".to_string(),
                s.to_amount as f64 / 10f64.powi(SIM_DECIMALS as i32),
                s.to_chain,
            ),
        };

        let drift = if drift_bps == 0 {
            0i64
        } else {
            rand::thread_rng().gen_range(-(drift_bps as i64)..=drift_bps as i64)
        };
        let fee = spend * fee_bps as f64 / 10_000.0;
        let delivered = match request {
            // Exact-out fixes the destination; fees land on the source side.
            ProposeRequest::ExactOut(_) => spend,
            _ => spend - fee,
        };
        let delivered = delivered * (10_000 + drift) as f64 / 10_000.0;

        RouteSnapshot {
            sources: vec![SourceAllocation {
                chain: ChainId::BASE,
                token: token.clone(),
                amount: format_amount(match request {
                    ProposeRequest::ExactOut(_) => spend + fee,
                    _ => spend,
                }),
            }],
            destination: DestinationQuote {
                chain: to_chain,
                token,
                amount: format_amount(delivered),
            },
            fees: FeeBreakdown {
                protocol: format_amount(fee * 0.6),
                gas: format_amount(fee * 0.3),
                solver: format_amount(fee * 0.1),
                total: format_amount(fee),
            },
            quoted_at: Utc::now(),
        }
    }

    fn script(request: &ProposeRequest) -> (Vec<StepDescriptor>, Vec<StepDescriptor>) {
        let kind = match request {
            ProposeRequest::Transfer(_) => FlowKind::Transfer,
            ProposeRequest::ExactIn(_) => FlowKind::ExactIn,
            ProposeRequest::ExactOut(_) => FlowKind::ExactOut,
        };
        let list = expected_steps(kind);

        // Completion order includes hash-only steps that never appear as
        // checklist rows, the way real engines interleave them.
        let completions = match kind {
            FlowKind::Transfer => list.clone(),
            FlowKind::ExactIn | FlowKind::ExactOut => vec![
                list[0].clone(),
                StepDescriptor::new(step_keys::SOURCE_SWAP_HASH, "Source hash")
                    .with_explorer_url("https://explorer.example/src"),
                list[1].clone(),
                StepDescriptor::new(step_keys::DESTINATION_SWAP_HASH, "Destination hash")
                    .with_explorer_url("https://explorer.example/dst"),
                list[2].clone(),
            ],
        };
        (list, completions)
    }
}

#[async_trait]
impl SettlementEngine for SimulatedEngine {
    async fn propose(&self, request: ProposeRequest) -> Result<ProposedIntent, EngineError> {
        self.counters.proposals.fetch_add(1, Ordering::SeqCst);
        self.proposals_seen
            .lock()
            .expect("proposals lock")
            .push(request.clone());
        sleep(self.config.propose_delay).await;

        if let Some((code, message)) = &self.config.fail_propose {
            return Err(EngineError::structured(code.clone(), message.clone())
                .with_context("propose"));
        }

        let id = Uuid::new_v4();
        let route = Self::quote(&request, self.config.fee_bps, 0);
        debug!(intent = %id, "simulated engine proposed intent");

        Ok(ProposedIntent {
            id,
            route,
            api: Arc::new(SimIntent {
                request,
                fee_bps: self.config.fee_bps,
                drift_bps: self.config.drift_bps,
                refresh_delay: self.config.refresh_delay,
                counters: self.counters.clone(),
                denied: AtomicBool::new(false),
            }),
        })
    }

    async fn execute(
        &self,
        request: ExecuteRequest,
        events: mpsc::UnboundedSender<ExecuteEvent>,
    ) -> Result<Option<ExecuteReceipt>, EngineError> {
        self.counters.executions.fetch_add(1, Ordering::SeqCst);

        if self.config.reject_execute {
            return Ok(None);
        }

        if self.config.require_allowance {
            let _ = events.send(ExecuteEvent::AllowanceRequired(AllowancePrompt {
                token: "USDC".to_string(),
                amount: "115792089237316195423570985".to_string(),
                chain: ChainId::BASE,
            }));
        }

        let (list, completions) = Self::script(&request.params);
        let _ = events.send(ExecuteEvent::StepsList(list));

        for (index, step) in completions.iter().enumerate() {
            sleep(self.config.step_delay).await;
            let _ = events.send(ExecuteEvent::StepComplete(step.clone()));

            if index == 0 {
                if let Some(message) = &self.config.fail_execute {
                    return Ok(Some(ExecuteReceipt {
                        success: false,
                        error: Some(message.clone()),
                        explorer_url: None,
                    }));
                }
            }
        }

        Ok(Some(ExecuteReceipt {
            success: true,
            error: None,
            explorer_url: Some(format!("https://explorer.example/tx/{}", request.intent_id)),
        }))
    }

    async fn fetch_unified_balance(&self) -> Result<Vec<AssetBalance>, EngineError> {
        self.counters.balance_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.config.balances.clone())
    }

    async fn calculate_max(&self, request: MaxRequest) -> Result<MaxAmount, EngineError> {
        let amount = self
            .config
            .balances
            .iter()
            .find(|b| b.symbol == request.token)
            .map(|b| b.balance.clone())
            .unwrap_or_else(|| "0".to_string());
        Ok(MaxAmount { amount })
    }
}

struct SimIntent {
    request: ProposeRequest,
    fee_bps: u64,
    drift_bps: u64,
    refresh_delay: Duration,
    counters: Arc<EngineCounters>,
    denied: AtomicBool,
}

#[async_trait]
impl IntentApi for SimIntent {
    async fn refresh(&self) -> Result<RouteSnapshot, EngineError> {
        self.counters.refreshes.fetch_add(1, Ordering::SeqCst);
        sleep(self.refresh_delay).await;

        if self.denied.load(Ordering::SeqCst) {
            return Err(EngineError::structured("QUOTE_EXPIRED", "intent was denied")
                .with_context("refresh"));
        }
        Ok(SimulatedEngine::quote(&self.request, self.fee_bps, self.drift_bps))
    }

    fn allow(&self) {
        self.counters.allows.fetch_add(1, Ordering::SeqCst);
    }

    fn deny(&self) {
        self.denied.store(true, Ordering::SeqCst);
        self.counters.denies.fetch_add(1, Ordering::SeqCst);
    }
}

fn format_amount(value: f64) -> String {
    // Round away float noise, then let Display pick the shortest form.
    let rounded = (value * 1e6).round() / 1e6;
    format!("{}", rounded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trestle_core::types::Address;

    fn transfer_request(amount: &str) -> ProposeRequest {
        ProposeRequest::Transfer(crate::engine::TransferRequest {
            token: "USDC".to_string(),
            amount: amount.to_string(),
            to_chain: ChainId::ETHEREUM,
            recipient: "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
                .parse::<Address>()
                .unwrap(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_propose_applies_fee() {
        let engine = SimulatedEngine::builder().fee_bps(50).build();
        let intent = engine.propose(transfer_request("10")).await.unwrap();

        assert_eq!(intent.route.destination.amount, "9.95");
        assert_eq!(intent.route.fees.total, "0.05");
        assert_eq!(engine.counters().proposals(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_replays_full_script() {
        let engine = SimulatedEngine::builder().build();
        let intent = engine.propose(transfer_request("10")).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let receipt = engine
            .execute(
                ExecuteRequest { intent_id: intent.id, params: transfer_request("10") },
                tx,
            )
            .await
            .unwrap()
            .unwrap();

        assert!(receipt.success);
        assert!(receipt.explorer_url.is_some());

        let mut lists = 0;
        let mut completions = vec![];
        while let Ok(event) = rx.try_recv() {
            match event {
                ExecuteEvent::StepsList(_) => lists += 1,
                ExecuteEvent::StepComplete(step) => completions.push(step.key),
                ExecuteEvent::AllowanceRequired(_) => {}
            }
        }
        assert_eq!(lists, 1);
        assert_eq!(
            completions,
            vec![
                step_keys::INTENT_SUBMITTED,
                step_keys::INTENT_COLLECTION,
                step_keys::INTENT_FULFILLED,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_execute_stops_after_first_step() {
        let engine = SimulatedEngine::builder().fail_execute("slippage").build();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let receipt = engine
            .execute(
                ExecuteRequest { intent_id: Uuid::new_v4(), params: transfer_request("10") },
                tx,
            )
            .await
            .unwrap()
            .unwrap();

        assert!(!receipt.success);
        assert_eq!(receipt.error.as_deref(), Some("slippage"));

        let mut completions = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, ExecuteEvent::StepComplete(_)) {
                completions += 1;
            }
        }
        assert_eq!(completions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wallet_rejection() {
        let engine = SimulatedEngine::builder().reject_execute().build();
        let (tx, _rx) = mpsc::unbounded_channel();
        let outcome = engine
            .execute(
                ExecuteRequest { intent_id: Uuid::new_v4(), params: transfer_request("1") },
                tx,
            )
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_intent_refuses_refresh() {
        let engine = SimulatedEngine::builder().build();
        let intent = engine.propose(transfer_request("10")).await.unwrap();

        intent.api.deny();
        assert_eq!(engine.counters().denies(), 1);
        assert!(intent.api.refresh().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_calculate_max_uses_balance() {
        let engine = SimulatedEngine::builder().build();
        let max = engine
            .calculate_max(MaxRequest { token: "USDC".to_string(), chain: ChainId::BASE })
            .await
            .unwrap();
        assert_eq!(max.amount, "125.5");
    }
}
