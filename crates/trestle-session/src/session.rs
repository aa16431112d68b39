//! Session construction and the handle the UI drives it with.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::WatchStream;

use trestle_core::inputs::InputEdit;
use trestle_core::types::{Address, ChainId, TokenMeta};
use trestle_engine::engine::SettlementEngine;

use crate::config::SessionConfig;
use crate::lifecycle::{Msg, SessionState};
use crate::snapshot::SessionSnapshot;

/// The session loop terminated while a caller was waiting on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("session terminated")]
pub struct SessionClosed;

/// One orchestrator session. Construct with [`Session::spawn`]; all further
/// interaction goes through the returned [`SessionHandle`].
pub struct Session;

impl Session {
    /// Spawn the session loop for one connected account and flow. The
    /// unified balance is fetched once up front; dropping the handle tears
    /// the loop and every timer down.
    pub fn spawn(engine: Arc<dyn SettlementEngine>, config: SessionConfig) -> SessionHandle {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = SessionState::new(engine, config, tx.clone());
        state.request_balance_refetch();

        let (watch_tx, watch_rx) = watch::channel(state.snapshot());
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if matches!(msg, Msg::Shutdown) {
                    break;
                }
                state.handle(msg);
                let _ = watch_tx.send(state.snapshot());
            }
            // Dropping the state aborts every scheduled timer.
        });

        SessionHandle { tx, snapshots: watch_rx }
    }
}

/// Command surface plus snapshot subscription for one session.
///
/// Commands are fire-and-forget; the resulting state lands in the next
/// published [`SessionSnapshot`]. Sends after the session terminated are
/// silently dropped.
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Msg>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    fn send(&self, msg: Msg) {
        let _ = self.tx.send(msg);
    }

    /// Apply one field mutation. Mutating any field denies a live intent
    /// and clears a visible error; amount edits also (re)schedule the
    /// debounced commit.
    pub fn edit(&self, edit: InputEdit) {
        self.send(Msg::Edit(edit));
    }

    pub fn set_amount(&self, amount: impl Into<String>) {
        self.edit(InputEdit::Amount(amount.into()));
    }

    pub fn set_chain(&self, chain: ChainId) {
        self.edit(InputEdit::Chain(chain));
    }

    pub fn set_token(&self, token: impl Into<String>) {
        self.edit(InputEdit::Token(token.into()));
    }

    pub fn set_recipient(&self, recipient: Address) {
        self.edit(InputEdit::Recipient(recipient));
    }

    pub fn set_from_chain(&self, chain: ChainId) {
        self.edit(InputEdit::FromChain(chain));
    }

    pub fn set_from_token(&self, token: TokenMeta) {
        self.edit(InputEdit::FromToken(token));
    }

    pub fn set_to_chain(&self, chain: ChainId) {
        self.edit(InputEdit::ToChain(chain));
    }

    pub fn set_to_token(&self, token: TokenMeta) {
        self.edit(InputEdit::ToToken(token));
    }

    /// Commit the current inputs immediately, cancelling any pending
    /// debounce window.
    pub fn commit_now(&self) {
        self.send(Msg::CommitNow);
    }

    /// Resolve the maximum spendable amount and commit it.
    pub fn use_max(&self) {
        self.send(Msg::UseMax);
    }

    /// Accept the proposed intent and begin execution.
    pub fn accept(&self) {
        self.send(Msg::Accept);
    }

    /// Deny the proposed intent.
    pub fn deny(&self) {
        self.send(Msg::Deny);
    }

    /// Dismiss the error banner; also resets the lifecycle.
    pub fn dismiss_error(&self) {
        self.send(Msg::DismissError);
    }

    /// Close the execution progress surface. A running execution keeps
    /// going; only the stopwatch stops.
    pub fn close_dialog(&self) {
        self.send(Msg::CloseDialog);
    }

    /// Deny anything live and restore the initial form.
    pub fn reset(&self) {
        self.send(Msg::Reset);
    }

    /// Current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Stream of every published state.
    pub fn snapshots(&self) -> WatchStream<SessionSnapshot> {
        WatchStream::new(self.snapshots.clone())
    }

    /// Wait until a published snapshot satisfies the predicate.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<SessionSnapshot, SessionClosed>
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        let mut rx = self.snapshots.clone();
        let snapshot = rx.wait_for(|s| predicate(s)).await.map_err(|_| SessionClosed)?;
        Ok(snapshot.clone())
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        let _ = self.tx.send(Msg::Shutdown);
    }
}
