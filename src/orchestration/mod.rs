//! Transactional services over the engine and the store.
//!
//! Each operation is one unit of work: load the nodes it needs inside a
//! transaction, run the pure engine, write everything back with versioned
//! updates and commit. A lost race surfaces as `ServiceError::Conflict` and
//! the whole unit is retried with exponential backoff.

use crate::domain::{AmountOverflow, PayoutStatus, UserId};
use crate::engine::EngineError;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

mod cycle;
mod ledger;
mod matching;
mod orchestrator;
mod orders;
mod ranks;
mod registrar;

pub use ledger::VerificationUpdate;
pub use matching::{RunReport, UserFailure};
pub use orchestrator::Orchestrator;
pub use orders::{OrderReceipt, RecordStatus};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Db(sqlx::Error),
    #[error("Concurrent modification: {0}")]
    Conflict(String),
    #[error("Payout {payout_id} cannot move from {from} to {to}")]
    InvalidTransition {
        payout_id: String,
        from: PayoutStatus,
        to: PayoutStatus,
    },
    #[error("Payout not found: {0}")]
    PayoutNotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ServiceError {
    pub(crate) fn stale(what: impl std::fmt::Display) -> Self {
        ServiceError::Conflict(format!("{} changed underneath this operation", what))
    }

    pub(crate) fn missing_wallet(user: &UserId) -> Self {
        ServiceError::Engine(EngineError::Integrity(format!("no wallet for {}", user)))
    }

    fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Conflict(_))
    }
}

// SQLITE_BUSY and SQLITE_LOCKED with their extended codes
const BUSY_CODES: [&str; 5] = ["5", "261", "517", "6", "262"];

impl From<AmountOverflow> for ServiceError {
    fn from(err: AmountOverflow) -> Self {
        ServiceError::Engine(err.into())
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        let busy = err
            .as_database_error()
            .and_then(|e| e.code())
            .map(|code| BUSY_CODES.contains(&code.as_ref()))
            .unwrap_or(false);
        if busy {
            ServiceError::Conflict(err.to_string())
        } else {
            ServiceError::Db(err)
        }
    }
}

/// Run `op` until it succeeds or fails with a non-conflict error.
pub(crate) async fn with_retry<T, F, Fut>(mut op: F) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let backoff = ExponentialBackoff {
        initial_interval: Duration::from_millis(10),
        max_interval: Duration::from_millis(500),
        max_elapsed_time: Some(Duration::from_secs(10)),
        ..Default::default()
    };

    retry(backoff, || {
        let attempt = op();
        async move {
            attempt.await.map_err(|e| {
                if e.is_transient() {
                    debug!(error = %e, "retrying unit of work");
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        }
    })
    .await
}
