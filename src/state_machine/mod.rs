// State machine module for portfolio provisioning
//
// Persisted finite-state machines driving a portfolio through the ordered
// cloud-provisioning stage pipeline, with a deterministic transition table
// derived from the stage catalog and compare-and-swap persistence.

pub mod errors;
pub mod guards;
pub mod machine;
pub mod persistence;
pub mod states;
pub mod transitions;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult, StoreError, StoreResult};
pub use machine::{PortfolioStateMachine, TransitionContext};
pub use persistence::{InMemoryProvisioningStore, PgProvisioningStore, ProvisioningStore};
pub use states::{FsmState, Stage, SubState, SystemState};
pub use transitions::{Transition, TransitionKind, TransitionSource, TransitionTable};

// Common traits and utilities
pub use guards::{StageDataValidGuard, TransitionGuard};
