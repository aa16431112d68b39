//! Live intent capabilities and the quoted route they carry.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use trestle_core::error::EngineError;
use trestle_core::types::ChainId;

/// Funds the engine plans to pull from one source chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceAllocation {
    pub chain: ChainId,
    pub token: String,
    /// Readable decimal amount.
    pub amount: String,
}

/// What arrives on the destination chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationQuote {
    pub chain: ChainId,
    pub token: String,
    /// Readable decimal amount, net of fees.
    pub amount: String,
}

/// Fee components of a quoted route, as readable decimal amounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub protocol: String,
    pub gas: String,
    pub solver: String,
    pub total: String,
}

/// One quoted route. Re-quoting may change any of it, including which
/// sources funds are pulled from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSnapshot {
    pub sources: Vec<SourceAllocation>,
    pub destination: DestinationQuote,
    pub fees: FeeBreakdown,
    pub quoted_at: DateTime<Utc>,
}

/// Capabilities of a live intent held by the orchestrator.
///
/// `allow` and `deny` are fire-and-forget signals to the engine; the
/// orchestrator never blocks on them. `deny` must be called before a live
/// intent reference is discarded so the engine can release its side of the
/// reservation.
#[async_trait]
pub trait IntentApi: Send + Sync {
    /// Re-quote the route. The result must be checked against the current
    /// intent before being applied; a refresh resolving after the intent
    /// was denied is a stale result.
    async fn refresh(&self) -> Result<RouteSnapshot, EngineError>;

    /// Irrevocably commit the intent for execution.
    fn allow(&self);

    /// Cancel the intent and release engine-side resources.
    fn deny(&self);
}

/// An engine-issued proposal awaiting user review. Exactly one may be live
/// per orchestrator session at a time.
#[derive(Clone)]
pub struct ProposedIntent {
    pub id: Uuid,
    pub route: RouteSnapshot,
    pub api: Arc<dyn IntentApi>,
}

impl fmt::Debug for ProposedIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProposedIntent")
            .field("id", &self.id)
            .field("route", &self.route)
            .finish_non_exhaustive()
    }
}
