//! Data layer: the two entities the provisioning state machine touches.

pub mod portfolio;
pub mod portfolio_state_machine;

pub use portfolio::{merge_provisioning_data, NewPortfolio, Portfolio};
pub use portfolio_state_machine::PortfolioStateMachineRow;
