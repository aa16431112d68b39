//! User input state for each flow, and its validity predicate.
//!
//! Input mutation has one orchestration-level side effect, enforced by the
//! session rather than here: applying an edit while a quoted intent is live
//! denies that intent, so a quote never outlives the inputs it was priced
//! against.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{amount_is_positive, Address, ChainId, Network, TokenMeta};

/// Token symbol a fresh transfer form defaults to.
pub const DEFAULT_TRANSFER_TOKEN: &str = "USDC";

/// The three value-transfer flows a session can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    /// Bridge funds to a destination chain, optionally to a third-party
    /// recipient.
    Transfer,
    /// Swap with exact-input semantics: the user fixes what they spend.
    ExactIn,
    /// Swap with exact-output semantics: the user fixes what they receive.
    ExactOut,
}

/// Inputs for the transfer flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferInputs {
    /// Destination chain.
    pub chain: ChainId,

    /// Token symbol to move.
    pub token: String,

    /// Readable decimal amount, absent until the user types one.
    pub amount: Option<String>,

    /// Recipient address; defaults to the connected account.
    pub recipient: Option<Address>,
}

/// Inputs for the exact-input swap flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExactInInputs {
    pub from_chain: ChainId,
    pub from_token: Option<TokenMeta>,
    /// Readable amount of the source token to spend.
    pub amount: Option<String>,
    pub to_chain: ChainId,
    pub to_token: Option<TokenMeta>,
}

/// Inputs for the exact-output swap flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExactOutInputs {
    pub to_chain: ChainId,
    pub to_token: Option<TokenMeta>,
    /// Readable amount of the destination token to receive.
    pub to_amount: Option<String>,
}

/// Externally supplied pre-fill for a fresh form. Unset fields fall back to
/// the per-network defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prefill {
    pub token: Option<String>,
    pub chain: Option<ChainId>,
    pub amount: Option<String>,
    pub recipient: Option<Address>,
    pub from_chain: Option<ChainId>,
    pub from_token: Option<TokenMeta>,
    pub to_chain: Option<ChainId>,
    pub to_token: Option<TokenMeta>,
    pub to_amount: Option<String>,
}

/// Why a set of inputs is not committable. Validation failures never reach
/// the settlement engine and never surface a banner; the commit is simply
/// suppressed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("amount must be a positive number, got {0:?}")]
    NonPositiveAmount(String),
}

/// A single field mutation coming from the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputEdit {
    /// The debounce-committed amount field of whichever flow is active:
    /// transfer amount, exact-in spend amount, or exact-out receive amount.
    /// An empty string clears the field.
    Amount(String),
    Chain(ChainId),
    Token(String),
    Recipient(Address),
    FromChain(ChainId),
    FromToken(TokenMeta),
    ToChain(ChainId),
    ToToken(TokenMeta),
}

impl InputEdit {
    /// Amount edits are the ones that schedule a debounced commit.
    pub fn is_amount(&self) -> bool {
        matches!(self, InputEdit::Amount(_))
    }
}

/// The active flow's input state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "flow", rename_all = "snake_case")]
pub enum FlowInputs {
    Transfer(TransferInputs),
    ExactIn(ExactInInputs),
    ExactOut(ExactOutInputs),
}

impl FlowInputs {
    /// Build the initial form for a flow, honoring any pre-fill.
    pub fn initial(
        kind: FlowKind,
        network: Network,
        connected: &Address,
        prefill: &Prefill,
    ) -> Self {
        match kind {
            FlowKind::Transfer => FlowInputs::Transfer(TransferInputs {
                chain: prefill.chain.unwrap_or_else(|| network.default_chain()),
                token: prefill
                    .token
                    .clone()
                    .unwrap_or_else(|| DEFAULT_TRANSFER_TOKEN.to_string()),
                amount: prefill.amount.clone(),
                recipient: Some(prefill.recipient.clone().unwrap_or_else(|| connected.clone())),
            }),
            FlowKind::ExactIn => FlowInputs::ExactIn(ExactInInputs {
                from_chain: prefill.from_chain.unwrap_or(ChainId::BASE),
                from_token: prefill.from_token.clone(),
                amount: prefill.amount.clone(),
                to_chain: prefill.to_chain.unwrap_or(ChainId::OPTIMISM),
                to_token: prefill.to_token.clone(),
            }),
            FlowKind::ExactOut => FlowInputs::ExactOut(ExactOutInputs {
                to_chain: prefill.to_chain.unwrap_or(ChainId::OPTIMISM),
                to_token: prefill.to_token.clone(),
                to_amount: prefill.to_amount.clone(),
            }),
        }
    }

    /// Which flow these inputs belong to.
    pub fn kind(&self) -> FlowKind {
        match self {
            FlowInputs::Transfer(_) => FlowKind::Transfer,
            FlowInputs::ExactIn(_) => FlowKind::ExactIn,
            FlowInputs::ExactOut(_) => FlowKind::ExactOut,
        }
    }

    /// The amount field the debounce pipeline commits.
    pub fn amount(&self) -> Option<&str> {
        match self {
            FlowInputs::Transfer(t) => t.amount.as_deref(),
            FlowInputs::ExactIn(s) => s.amount.as_deref(),
            FlowInputs::ExactOut(s) => s.to_amount.as_deref(),
        }
    }

    /// Symbol of the token whose unified balance backs the active form.
    pub fn selected_symbol(&self) -> Option<&str> {
        match self {
            FlowInputs::Transfer(t) => Some(t.token.as_str()),
            FlowInputs::ExactIn(s) => s.from_token.as_ref().map(|t| t.symbol.as_str()),
            FlowInputs::ExactOut(s) => s.to_token.as_ref().map(|t| t.symbol.as_str()),
        }
    }

    /// Apply one field mutation. Returns false when the edit does not
    /// belong to this flow (the caller logs and drops it).
    pub fn apply(&mut self, edit: &InputEdit) -> bool {
        let normalize_amount =
            |s: &str| if s.is_empty() { None } else { Some(s.to_string()) };

        match (self, edit) {
            (FlowInputs::Transfer(t), InputEdit::Amount(a)) => t.amount = normalize_amount(a),
            (FlowInputs::Transfer(t), InputEdit::Chain(c)) => t.chain = *c,
            (FlowInputs::Transfer(t), InputEdit::Token(sym)) => t.token = sym.clone(),
            (FlowInputs::Transfer(t), InputEdit::Recipient(r)) => t.recipient = Some(r.clone()),
            (FlowInputs::ExactIn(s), InputEdit::Amount(a)) => s.amount = normalize_amount(a),
            (FlowInputs::ExactIn(s), InputEdit::FromChain(c)) => s.from_chain = *c,
            (FlowInputs::ExactIn(s), InputEdit::FromToken(t)) => s.from_token = Some(t.clone()),
            (FlowInputs::ExactIn(s), InputEdit::ToChain(c)) => s.to_chain = *c,
            (FlowInputs::ExactIn(s), InputEdit::ToToken(t)) => s.to_token = Some(t.clone()),
            (FlowInputs::ExactOut(s), InputEdit::Amount(a)) => s.to_amount = normalize_amount(a),
            (FlowInputs::ExactOut(s), InputEdit::ToChain(c)) => s.to_chain = *c,
            (FlowInputs::ExactOut(s), InputEdit::ToToken(t)) => s.to_token = Some(t.clone()),
            _ => return false,
        }
        true
    }

    /// Diagnostic form of the validity predicate.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let check_amount = |amount: &Option<String>, field: &'static str| match amount {
            None => Err(ValidationError::MissingField(field)),
            Some(a) if !amount_is_positive(a) => {
                Err(ValidationError::NonPositiveAmount(a.clone()))
            }
            Some(_) => Ok(()),
        };

        match self {
            FlowInputs::Transfer(t) => {
                check_amount(&t.amount, "amount")?;
                if t.token.is_empty() {
                    return Err(ValidationError::MissingField("token"));
                }
                match &t.recipient {
                    None => Err(ValidationError::MissingField("recipient")),
                    // Address is parse-validated at construction.
                    Some(_) => Ok(()),
                }
            }
            FlowInputs::ExactIn(s) => {
                check_amount(&s.amount, "amount")?;
                if s.from_token.is_none() {
                    return Err(ValidationError::MissingField("from_token"));
                }
                if s.to_token.is_none() {
                    return Err(ValidationError::MissingField("to_token"));
                }
                Ok(())
            }
            FlowInputs::ExactOut(s) => {
                check_amount(&s.to_amount, "to_amount")?;
                if s.to_token.is_none() {
                    return Err(ValidationError::MissingField("to_token"));
                }
                Ok(())
            }
        }
    }

    /// The pure validity predicate gating the commit pipeline.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> Address {
        "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".parse().unwrap()
    }

    fn token(symbol: &str) -> TokenMeta {
        TokenMeta {
            symbol: symbol.to_string(),
            contract: "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb".parse().unwrap(),
            decimals: 6,
            name: symbol.to_string(),
        }
    }

    #[test]
    fn test_transfer_defaults() {
        let inputs = FlowInputs::initial(
            FlowKind::Transfer,
            Network::Testnet,
            &connected(),
            &Prefill::default(),
        );
        let FlowInputs::Transfer(t) = &inputs else { panic!("wrong flow") };
        assert_eq!(t.chain, ChainId::SEPOLIA);
        assert_eq!(t.token, "USDC");
        assert_eq!(t.recipient.as_ref().unwrap(), &connected());
        assert!(t.amount.is_none());
    }

    #[test]
    fn test_prefill_wins_over_defaults() {
        let prefill = Prefill {
            chain: Some(ChainId::ARBITRUM),
            token: Some("ETH".to_string()),
            amount: Some("0.5".to_string()),
            ..Prefill::default()
        };
        let inputs =
            FlowInputs::initial(FlowKind::Transfer, Network::Mainnet, &connected(), &prefill);
        let FlowInputs::Transfer(t) = &inputs else { panic!("wrong flow") };
        assert_eq!(t.chain, ChainId::ARBITRUM);
        assert_eq!(t.token, "ETH");
        assert_eq!(t.amount.as_deref(), Some("0.5"));
    }

    #[test]
    fn test_transfer_validity() {
        let mut inputs = FlowInputs::initial(
            FlowKind::Transfer,
            Network::Mainnet,
            &connected(),
            &Prefill::default(),
        );
        assert!(!inputs.is_valid());

        assert!(inputs.apply(&InputEdit::Amount("10".to_string())));
        assert!(inputs.is_valid());

        assert!(inputs.apply(&InputEdit::Amount("0".to_string())));
        assert_eq!(
            inputs.validate(),
            Err(ValidationError::NonPositiveAmount("0".to_string()))
        );
    }

    #[test]
    fn test_exact_in_validity() {
        let mut inputs = FlowInputs::initial(
            FlowKind::ExactIn,
            Network::Mainnet,
            &connected(),
            &Prefill::default(),
        );
        inputs.apply(&InputEdit::Amount("1".to_string()));
        assert!(!inputs.is_valid());

        inputs.apply(&InputEdit::FromToken(token("USDC")));
        inputs.apply(&InputEdit::ToToken(token("WETH")));
        assert!(inputs.is_valid());
    }

    #[test]
    fn test_edit_for_wrong_flow_is_rejected() {
        let mut inputs = FlowInputs::initial(
            FlowKind::ExactOut,
            Network::Mainnet,
            &connected(),
            &Prefill::default(),
        );
        assert!(!inputs.apply(&InputEdit::Recipient(connected())));
        assert!(!inputs.apply(&InputEdit::FromChain(ChainId::BASE)));
        assert!(inputs.apply(&InputEdit::ToChain(ChainId::BASE)));
    }

    #[test]
    fn test_empty_amount_clears_field() {
        let mut inputs = FlowInputs::initial(
            FlowKind::Transfer,
            Network::Mainnet,
            &connected(),
            &Prefill::default(),
        );
        inputs.apply(&InputEdit::Amount("10".to_string()));
        inputs.apply(&InputEdit::Amount(String::new()));
        assert_eq!(inputs.amount(), None);
        assert!(!inputs.is_valid());
    }
}
