//! The settlement-engine trait and its request/response shapes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use trestle_core::error::EngineError;
use trestle_core::inputs::{FlowInputs, ValidationError};
use trestle_core::steps::StepDescriptor;
use trestle_core::types::{to_base_units, Address, AmountError, AssetBalance, ChainId};

use crate::intent::ProposedIntent;

/// Quote request for the transfer flow. Amounts stay readable; the engine
/// owns unit conversion for its own tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub token: String,
    pub amount: String,
    pub to_chain: ChainId,
    pub recipient: Address,
}

/// Funds to spend from one source position, in base units.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSpend {
    pub chain: ChainId,
    pub amount: u128,
    pub token_contract: Address,
}

/// Quote request for an exact-input swap.
#[derive(Debug, Clone, PartialEq)]
pub struct ExactInRequest {
    pub from: Vec<SourceSpend>,
    pub to_chain: ChainId,
    pub to_token: Address,
}

/// Quote request for an exact-output swap.
#[derive(Debug, Clone, PartialEq)]
pub struct ExactOutRequest {
    pub to_amount: u128,
    pub to_chain: ChainId,
    pub to_token: Address,
}

/// A quote request for any flow.
#[derive(Debug, Clone, PartialEq)]
pub enum ProposeRequest {
    Transfer(TransferRequest),
    ExactIn(ExactInRequest),
    ExactOut(ExactOutRequest),
}

/// Why committable-looking inputs could not be turned into a request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Amount(#[from] AmountError),
}

impl ProposeRequest {
    /// Build the engine request for the current inputs. Callers are expected
    /// to have checked validity already; failures here suppress the commit
    /// rather than surfacing a banner.
    pub fn from_inputs(inputs: &FlowInputs) -> Result<Self, RequestError> {
        inputs.validate()?;

        match inputs {
            FlowInputs::Transfer(t) => Ok(ProposeRequest::Transfer(TransferRequest {
                token: t.token.clone(),
                amount: t.amount.clone().ok_or(ValidationError::MissingField("amount"))?,
                to_chain: t.chain,
                recipient: t
                    .recipient
                    .clone()
                    .ok_or(ValidationError::MissingField("recipient"))?,
            })),
            FlowInputs::ExactIn(s) => {
                let from_token =
                    s.from_token.as_ref().ok_or(ValidationError::MissingField("from_token"))?;
                let to_token =
                    s.to_token.as_ref().ok_or(ValidationError::MissingField("to_token"))?;
                let amount =
                    s.amount.as_deref().ok_or(ValidationError::MissingField("amount"))?;
                Ok(ProposeRequest::ExactIn(ExactInRequest {
                    from: vec![SourceSpend {
                        chain: s.from_chain,
                        amount: to_base_units(amount, from_token.decimals)?,
                        token_contract: from_token.contract.clone(),
                    }],
                    to_chain: s.to_chain,
                    to_token: to_token.contract.clone(),
                }))
            }
            FlowInputs::ExactOut(s) => {
                let to_token =
                    s.to_token.as_ref().ok_or(ValidationError::MissingField("to_token"))?;
                let to_amount =
                    s.to_amount.as_deref().ok_or(ValidationError::MissingField("to_amount"))?;
                Ok(ProposeRequest::ExactOut(ExactOutRequest {
                    to_amount: to_base_units(to_amount, to_token.decimals)?,
                    to_chain: s.to_chain,
                    to_token: to_token.contract.clone(),
                }))
            }
        }
    }
}

/// Execute a previously allowed intent.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteRequest {
    pub intent_id: Uuid,
    pub params: ProposeRequest,
}

/// Outcome of an execute call. `success == false` carries the engine's
/// failure message; the explorer URL points at the settling transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteReceipt {
    pub success: bool,
    pub error: Option<String>,
    pub explorer_url: Option<String>,
}

/// A token allowance the engine needs before it can pull funds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllowancePrompt {
    pub token: String,
    pub amount: String,
    pub chain: ChainId,
}

/// The discriminated event stream delivered during an execute call. Order
/// and shape are unstable: the list may arrive late, be re-sent, and
/// completions may reference steps the list never announced.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecuteEvent {
    /// The full ordered step list, possibly re-announced mid-flight.
    StepsList(Vec<StepDescriptor>),
    /// One step completed, possibly carrying an explorer URL.
    StepComplete(StepDescriptor),
    /// The engine needs a token allowance before proceeding.
    AllowanceRequired(AllowancePrompt),
}

/// Parameters for the max-spendable convenience query.
#[derive(Debug, Clone, PartialEq)]
pub struct MaxRequest {
    pub token: String,
    pub chain: ChainId,
}

/// Result of [`SettlementEngine::calculate_max`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaxAmount {
    pub amount: String,
}

/// The external settlement engine: computes routes, holds reservations, and
/// drives multi-step on-chain execution. Everything behind this trait is out
/// of the orchestrator's scope.
#[async_trait]
pub trait SettlementEngine: Send + Sync {
    /// Request a quoted intent for the given flow inputs.
    async fn propose(&self, request: ProposeRequest) -> Result<ProposedIntent, EngineError>;

    /// Execute an allowed intent, streaming step events through `events`.
    /// `Ok(None)` means the wallet layer rejected the execution.
    async fn execute(
        &self,
        request: ExecuteRequest,
        events: mpsc::UnboundedSender<ExecuteEvent>,
    ) -> Result<Option<ExecuteReceipt>, EngineError>;

    /// Fetch the account's unified balance across chains.
    async fn fetch_unified_balance(&self) -> Result<Vec<AssetBalance>, EngineError>;

    /// Largest spendable amount for a token, net of gas reserves.
    async fn calculate_max(&self, request: MaxRequest) -> Result<MaxAmount, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use trestle_core::inputs::{FlowKind, InputEdit, Prefill};
    use trestle_core::types::{Network, TokenMeta};

    fn connected() -> Address {
        "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".parse().unwrap()
    }

    fn token(symbol: &str, decimals: u8) -> TokenMeta {
        TokenMeta {
            symbol: symbol.to_string(),
            contract: "0xcccccccccccccccccccccccccccccccccccccccc".parse().unwrap(),
            decimals,
            name: symbol.to_string(),
        }
    }

    #[test]
    fn test_transfer_request_from_inputs() {
        let mut inputs = FlowInputs::initial(
            FlowKind::Transfer,
            Network::Mainnet,
            &connected(),
            &Prefill::default(),
        );
        inputs.apply(&InputEdit::Amount("10".to_string()));

        let request = ProposeRequest::from_inputs(&inputs).unwrap();
        let ProposeRequest::Transfer(t) = request else { panic!("wrong request") };
        assert_eq!(t.amount, "10");
        assert_eq!(t.token, "USDC");
        assert_eq!(t.to_chain, ChainId::ETHEREUM);
        assert_eq!(t.recipient, connected());
    }

    #[test]
    fn test_exact_in_request_converts_to_base_units() {
        let mut inputs = FlowInputs::initial(
            FlowKind::ExactIn,
            Network::Mainnet,
            &connected(),
            &Prefill::default(),
        );
        inputs.apply(&InputEdit::FromToken(token("USDC", 6)));
        inputs.apply(&InputEdit::ToToken(token("WETH", 18)));
        inputs.apply(&InputEdit::Amount("1.5".to_string()));

        let request = ProposeRequest::from_inputs(&inputs).unwrap();
        let ProposeRequest::ExactIn(s) = request else { panic!("wrong request") };
        assert_eq!(s.from.len(), 1);
        assert_eq!(s.from[0].amount, 1_500_000);
        assert_eq!(s.to_chain, ChainId::OPTIMISM);
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let inputs = FlowInputs::initial(
            FlowKind::Transfer,
            Network::Mainnet,
            &connected(),
            &Prefill::default(),
        );
        assert!(ProposeRequest::from_inputs(&inputs).is_err());
    }

    #[test]
    fn test_excess_precision_rejected_not_rounded() {
        let mut inputs = FlowInputs::initial(
            FlowKind::ExactOut,
            Network::Mainnet,
            &connected(),
            &Prefill::default(),
        );
        inputs.apply(&InputEdit::ToToken(token("USDC", 6)));
        inputs.apply(&InputEdit::Amount("1.23456789".to_string()));

        assert!(matches!(
            ProposeRequest::from_inputs(&inputs),
            Err(RequestError::Amount(_))
        ));
    }
}
