use thiserror::Error;

use super::states::Stage;

/// Errors raised by the persistence seam.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Optimistic-concurrency rejection: the persisted state moved under us.
    #[error("stale state for machine {machine_id}: expected '{expected}', found '{found}'")]
    StaleState {
        machine_id: uuid::Uuid,
        expected: String,
        found: String,
    },

    #[error("portfolio {0} not found")]
    PortfolioNotFound(uuid::Uuid),

    #[error("state machine {0} not found")]
    MachineNotFound(uuid::Uuid),

    #[error("persisted state '{0}' is not a member of the state set")]
    CorruptState(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Errors raised by the provisioning engine.
#[derive(Debug, Error)]
pub enum StateMachineError {
    /// The trigger is not legal from the current state. A no-op error, never
    /// a crash: the caller decides whether to re-drive or reset.
    #[error("trigger '{trigger}' is not legal from state '{state}'")]
    InvalidTrigger { trigger: String, state: String },

    #[error("guard rejected transition '{trigger}': {reason}")]
    GuardRejected { trigger: String, reason: String },

    /// A concurrent advance won the compare-and-swap.
    #[error("concurrent state advance detected: {0}")]
    StaleState(String),

    /// The stage ended in its FAILED sub-state; forward progress halts until
    /// an external re-drive or reset.
    #[error("provisioning stage '{stage}' failed: {reason}")]
    StageFailed { stage: Stage, reason: String },

    #[error(transparent)]
    Store(StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for StateMachineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::StaleState { ref expected, ref found, .. } => {
                StateMachineError::StaleState(format!("expected '{expected}', found '{found}'"))
            }
            other => StateMachineError::Store(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type StateMachineResult<T> = Result<T, StateMachineError>;
