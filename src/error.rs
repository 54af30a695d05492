//! Structured error handling for the provisioning core.
//!
//! Layer-specific errors live next to their layers ([`crate::csp::CspError`],
//! [`crate::state_machine::StateMachineError`]); this umbrella exists for
//! binaries and embedders that drive the whole pipeline through one `?`.

use thiserror::Error;

use crate::config::ConfigError;
use crate::csp::CspError;
use crate::state_machine::StateMachineError;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    StateMachine(#[from] StateMachineError),

    #[error(transparent)]
    Csp(#[from] CspError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
