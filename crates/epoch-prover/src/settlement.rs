//! Settle-once result channel for an epoch proving attempt.

use std::fmt;

use tokio::sync::oneshot;
use tracing::*;

/// Reason reported to the consumer when the producer goes away without settling.
pub const DROPPED_REASON: &str = "Proving state dropped";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvingResult {
    Success,
    Failure { reason: String },
}

/// What the consumer of an epoch eventually observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EpochOutcome {
    Completed(ProvingResult),
    Rejected(String),
}

type CompletionFn = Box<dyn FnOnce(ProvingResult) + Send + 'static>;
type RejectionFn = Box<dyn FnOnce(String) + Send + 'static>;

enum SettleTarget {
    Channel(oneshot::Sender<EpochOutcome>),
    Callbacks {
        on_complete: CompletionFn,
        on_reject: RejectionFn,
    },
}

/// Producer side of the settlement. Fires at most once; later calls are ignored.
pub struct Settlement {
    target: Option<SettleTarget>,
}

impl Settlement {
    pub fn from_callbacks(
        on_complete: impl FnOnce(ProvingResult) + Send + 'static,
        on_reject: impl FnOnce(String) + Send + 'static,
    ) -> Self {
        Self {
            target: Some(SettleTarget::Callbacks {
                on_complete: Box::new(on_complete),
                on_reject: Box::new(on_reject),
            }),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.target.is_none()
    }

    /// Fires the completion callback. Returns if this call did the settling.
    pub fn complete(&mut self, result: ProvingResult) -> bool {
        match self.target.take() {
            Some(SettleTarget::Channel(tx)) => {
                if tx.send(EpochOutcome::Completed(result)).is_err() {
                    debug!("epoch handle dropped before completion");
                }
                true
            }
            Some(SettleTarget::Callbacks { on_complete, .. }) => {
                on_complete(result);
                true
            }
            None => false,
        }
    }

    /// Fires the rejection callback. Returns if this call did the settling.
    pub fn reject(&mut self, reason: String) -> bool {
        match self.target.take() {
            Some(SettleTarget::Channel(tx)) => {
                if tx.send(EpochOutcome::Rejected(reason)).is_err() {
                    debug!("epoch handle dropped before rejection");
                }
                true
            }
            Some(SettleTarget::Callbacks { on_reject, .. }) => {
                on_reject(reason);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Settlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.target {
            Some(SettleTarget::Channel(_)) => "channel",
            Some(SettleTarget::Callbacks { .. }) => "callbacks",
            None => "settled",
        };
        f.debug_struct("Settlement").field("target", &kind).finish()
    }
}

/// Consumer side of the settlement.
#[derive(Debug)]
pub struct EpochProvingHandle {
    rx: oneshot::Receiver<EpochOutcome>,
}

impl EpochProvingHandle {
    /// Waits for the epoch to settle.
    pub async fn wait(self) -> EpochOutcome {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => EpochOutcome::Rejected(DROPPED_REASON.to_owned()),
        }
    }

    /// Returns the outcome if the epoch already settled, without waiting.
    pub fn try_outcome(&mut self) -> Option<EpochOutcome> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => {
                Some(EpochOutcome::Rejected(DROPPED_REASON.to_owned()))
            }
        }
    }
}

/// Creates a connected settlement producer and consumer.
pub fn settlement_channel() -> (Settlement, EpochProvingHandle) {
    let (tx, rx) = oneshot::channel();
    let settlement = Settlement {
        target: Some(SettleTarget::Channel(tx)),
    };
    (settlement, EpochProvingHandle { rx })
}
