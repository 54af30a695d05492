use thiserror::Error;

/// Typed failures a cloud provider adapter may report.
///
/// The provisioning callback is the only place these are classified into
/// retry-vs-fatal; everything above it sees stage-advanced or stage-failed.
#[derive(Debug, Error)]
pub enum CspError {
    /// Credentials rejected outright. Fatal.
    #[error("an error occurred with authentication: {0}")]
    Authentication(String),

    /// Credentials valid but insufficiently privileged. Fatal.
    #[error("an error occurred with authorization: {0}")]
    Authorization(String),

    /// Transport, timeout or DNS-level failure. Retryable.
    #[error("could not connect to cloud provider: {0}")]
    Connection(String),

    /// Vendor 5xx or unclassified server error. Retryable.
    #[error("a server error occurred: {0}")]
    UnknownServer(String),

    #[error("the environment {identifier} couldn't be created: {reason}")]
    EnvironmentCreation { identifier: String, reason: String },

    #[error("failed to create user {user} for environment {environment}: {reason}")]
    UserProvisioning {
        environment: String,
        user: String,
        reason: String,
    },

    #[error("failed to suspend or delete user {user}: {reason}")]
    UserRemoval { user: String, reason: String },

    #[error("could not complete baseline provisioning for environment ({identifier}): {reason}")]
    BaselineProvision { identifier: String, reason: String },

    /// The vendor reports the target entity is already being mutated.
    /// Treated as fatal-for-now: the caller cannot distinguish "will resolve
    /// shortly" from "stuck".
    #[error("an operation for this entity is already in progress: {0}")]
    OperationInProgress(String),

    /// Payload failed its schema. Always fatal; a malformed payload will not
    /// self-correct.
    #[error("payload failed schema validation: {0}")]
    InvalidPayload(String),

    /// Adapter returned data that does not satisfy the stage result schema.
    #[error("result failed schema validation: {0}")]
    InvalidResult(String),
}

impl CspError {
    /// Connectivity and unclassified server errors are the only
    /// retry-eligible class; everything else fails the stage immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, CspError::Connection(_) | CspError::UnknownServer(_))
    }
}

pub type CspResult<T> = Result<T, CspError>;
