//! Single-resolution result handles.
//!
//! Every submission returns a [`PendingRequest`] immediately; the broker
//! worker resolves it exactly once, with either the transport result or an
//! explicit failure. Waiting after resolution returns the stored result
//! without blocking again.

use thiserror::Error;
use tokio::sync::watch;

use crate::category::Category;
use crate::transport::TransportResponse;

/// Result delivered through a [`PendingRequest`].
pub type CallResult = Result<TransportResponse, CallError>;

/// Failure modes a caller can observe when awaiting a submitted request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    #[error("transport call failed: {0}")]
    Transport(String),
    #[error("broker shut down before the request completed")]
    BrokerClosed,
}

/// Handle for one submitted request.
///
/// Cloneable; every clone observes the same single resolution. There is no
/// cancellation: once submitted, a request always resolves, success or
/// failure.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    category: Category,
    rx: watch::Receiver<Option<CallResult>>,
}

impl PendingRequest {
    /// Category the request was submitted under.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Waits until the worker resolves this request and returns the result.
    ///
    /// Idempotent after resolution: further calls return the same result
    /// immediately.
    pub async fn wait(&mut self) -> CallResult {
        match self.rx.wait_for(Option::is_some).await {
            Ok(value) => value.as_ref().cloned().unwrap_or(Err(CallError::BrokerClosed)),
            Err(_) => Err(CallError::BrokerClosed),
        }
    }
}

/// Worker-side writing end of a [`PendingRequest`].
///
/// The first resolution wins; later attempts are ignored. Dropping an
/// unresolved resolver resolves the handle with [`CallError::BrokerClosed`]
/// so a caller can never hang on a request the worker abandoned.
#[derive(Debug)]
pub(crate) struct Resolver {
    tx: watch::Sender<Option<CallResult>>,
}

impl Resolver {
    pub(crate) fn resolve(&self, result: CallResult) {
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(result);
            true
        });
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        self.resolve(Err(CallError::BrokerClosed));
    }
}

/// Creates a linked resolver/handle pair for one submission.
pub(crate) fn pending_pair(category: Category) -> (Resolver, PendingRequest) {
    let (tx, rx) = watch::channel(None);
    (Resolver { tx }, PendingRequest { category, rx })
}
