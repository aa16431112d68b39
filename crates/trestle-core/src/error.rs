//! Engine failure shapes and the error normalizer.
//!
//! Failures crossing the engine boundary arrive in several shapes: a
//! structured error carrying an engine error code, a bare message, or an
//! arbitrary wrapped error. [`normalize`] folds all of them into one
//! [`NormalizedError`] for display and lifecycle decisions. It is total and
//! side-effect-free.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed fallback message for failures that carry no usable message.
pub const UNEXPECTED_ERROR: &str = "Unexpected error";

/// Message surfaced when the wallet layer rejects an execution.
pub const USER_REJECTED: &str = "Transaction rejected by user";

/// The closed set of engine error codes the normalizer recognizes. Codes
/// outside this set are dropped and only the message survives.
pub const ERROR_CODES: &[&str] = &[
    "USER_REJECTED",
    "INSUFFICIENT_BALANCE",
    "ALLOWANCE_REQUIRED",
    "SIMULATION_FAILED",
    "QUOTE_EXPIRED",
    "UNSUPPORTED_CHAIN",
    "UNSUPPORTED_TOKEN",
    "RPC_ERROR",
    "TIMEOUT",
];

/// Whether a code belongs to the recognized set.
pub fn is_recognized_code(code: &str) -> bool {
    ERROR_CODES.contains(&code)
}

/// A failure raised by the settlement engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Structured engine error with a code and optional context payload.
    #[error("{message}")]
    Structured {
        code: String,
        message: String,
        context: Option<String>,
        details: Option<serde_json::Map<String, serde_json::Value>>,
    },

    /// A bare failure message.
    #[error("{0}")]
    Message(String),

    /// Anything else thrown across the boundary.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    /// Structured error with just a code and message.
    pub fn structured(code: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Structured {
            code: code.into(),
            message: message.into(),
            context: None,
            details: None,
        }
    }

    pub fn with_context(self, context: impl Into<String>) -> Self {
        match self {
            EngineError::Structured { code, message, details, .. } => EngineError::Structured {
                code,
                message,
                context: Some(context.into()),
                details,
            },
            other => other,
        }
    }

    pub fn with_details(
        self,
        details: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        match self {
            EngineError::Structured { code, message, context, .. } => EngineError::Structured {
                code,
                message,
                context,
                details: Some(details),
            },
            other => other,
        }
    }
}

/// The uniform failure shape consumed by display and lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedError {
    /// Recognized engine error code, when one was present.
    pub code: Option<String>,

    /// Always present; never empty.
    pub message: String,

    /// Engine-supplied context string, e.g. which operation failed.
    pub context: Option<String>,

    /// Structured diagnostic payload.
    pub details: Option<serde_json::Map<String, serde_json::Value>>,
}

impl NormalizedError {
    /// A message-only error with no code or payload.
    pub fn message_only(message: impl Into<String>) -> Self {
        let message = message.into();
        NormalizedError {
            code: None,
            message: if message.is_empty() {
                UNEXPECTED_ERROR.to_string()
            } else {
                message
            },
            context: None,
            details: None,
        }
    }
}

impl std::fmt::Display for NormalizedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Fold any engine failure into a [`NormalizedError`].
///
/// Recognized codes keep their code, context and details. An unrecognized
/// code is not trusted; only the message survives. Failures with an empty
/// message fall back to [`UNEXPECTED_ERROR`].
pub fn normalize(err: &EngineError) -> NormalizedError {
    match err {
        EngineError::Structured { code, message, context, details }
            if is_recognized_code(code) =>
        {
            NormalizedError {
                code: Some(code.clone()),
                message: if message.is_empty() {
                    UNEXPECTED_ERROR.to_string()
                } else {
                    message.clone()
                },
                context: context.clone(),
                details: details.clone(),
            }
        }
        EngineError::Structured { message, .. } => NormalizedError::message_only(message.clone()),
        EngineError::Message(message) => NormalizedError::message_only(message.clone()),
        EngineError::Other(err) => NormalizedError::message_only(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognized_code_kept() {
        let err = EngineError::structured("QUOTE_EXPIRED", "quote is stale")
            .with_context("refresh");
        let normalized = normalize(&err);
        assert_eq!(normalized.code.as_deref(), Some("QUOTE_EXPIRED"));
        assert_eq!(normalized.message, "quote is stale");
        assert_eq!(normalized.context.as_deref(), Some("refresh"));
    }

    #[test]
    fn test_unrecognized_code_dropped() {
        let err = EngineError::structured("SOMETHING_NEW", "engine said no");
        let normalized = normalize(&err);
        assert_eq!(normalized.code, None);
        assert_eq!(normalized.message, "engine said no");
    }

    #[test]
    fn test_bare_message() {
        let normalized = normalize(&EngineError::Message("slippage".to_string()));
        assert_eq!(normalized.code, None);
        assert_eq!(normalized.message, "slippage");
    }

    #[test]
    fn test_empty_message_falls_back() {
        assert_eq!(
            normalize(&EngineError::Message(String::new())).message,
            UNEXPECTED_ERROR
        );
        assert_eq!(
            normalize(&EngineError::structured("RPC_ERROR", "")).message,
            UNEXPECTED_ERROR
        );
    }

    #[test]
    fn test_wrapped_error_uses_display() {
        let err = EngineError::from(anyhow::anyhow!("socket closed"));
        assert_eq!(normalize(&err).message, "socket closed");
    }

    #[test]
    fn test_details_survive_for_recognized_codes() {
        let mut details = serde_json::Map::new();
        details.insert("needed".to_string(), serde_json::json!("12.5"));
        let err = EngineError::structured("INSUFFICIENT_BALANCE", "not enough USDC")
            .with_details(details.clone());
        assert_eq!(normalize(&err).details, Some(details));
    }

    #[test]
    fn test_display_includes_code() {
        let normalized = normalize(&EngineError::structured("TIMEOUT", "engine timed out"));
        assert_eq!(normalized.to_string(), "[TIMEOUT] engine timed out");
        assert_eq!(NormalizedError::message_only("plain").to_string(), "plain");
    }
}
