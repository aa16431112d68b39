//! # Trestle Session
//!
//! The transaction intent orchestrator: one session per connected account
//! and flow, owning the debounced commit pipeline, the intent lifecycle
//! state machine, step progress tracking, and the execution stopwatch.
//!
//! All state lives behind a single loop task; the UI drives it through a
//! [`SessionHandle`] and observes it through watch-channel snapshots:
//!
//! ```no_run
//! use std::sync::Arc;
//! use trestle_engine::sim::SimulatedEngine;
//! use trestle_session::prelude::*;
//!
//! # async fn demo() {
//! let engine = Arc::new(SimulatedEngine::builder().build());
//! let config = SessionConfig::new(
//!     FlowKind::Transfer,
//!     Network::Mainnet,
//!     "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".parse().unwrap(),
//! );
//! let session = Session::spawn(engine, config);
//!
//! session.set_amount("10");
//! let quoted = session.wait_for(|s| s.phase == Phase::Proposed).await.unwrap();
//! println!("you will receive {}", quoted.route.unwrap().destination.amount);
//! session.accept();
//! # }
//! ```

pub mod config;
pub mod scheduler;
pub mod session;
pub mod snapshot;
pub mod stopwatch;

mod lifecycle;

pub use config::{SessionConfig, STOPWATCH_TICK, SWAP_COMMIT_QUIET, SWAP_REFRESH_INTERVAL,
    TRANSFER_COMMIT_QUIET, TRANSFER_REFRESH_INTERVAL};
pub use session::{Session, SessionClosed, SessionHandle};
pub use snapshot::{Phase, SessionSnapshot};
pub use stopwatch::Stopwatch;

/// Prelude module for common imports.
pub mod prelude {
    pub use crate::config::SessionConfig;
    pub use crate::session::{Session, SessionHandle};
    pub use crate::snapshot::{Phase, SessionSnapshot};
    pub use trestle_core::prelude::*;
    pub use trestle_engine::prelude::*;
}
