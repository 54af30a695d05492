#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Provision Core
//!
//! Provisioning state-machine core for onboarding a portfolio (a cloud
//! tenancy) against a commercial cloud service provider.
//!
//! ## Overview
//!
//! Cloud onboarding is a long-running pipeline of vendor calls: create the
//! tenant, stand up billing, enable task-order billing, report the first
//! billing instruction, then build out a service principal with the roles it
//! needs to administer the tenant. Each step can fail, each step's output
//! feeds later steps, and the whole pipeline must survive process restarts.
//!
//! This crate models that pipeline as a persisted finite-state machine: an
//! ordered stage catalog expands deterministically into a transition table,
//! every state change commits through a compare-and-swap store before the
//! in-memory view moves, and each stage's vendor call runs behind a typed
//! payload/result registry and a swappable [`csp::CloudProvider`] adapter.
//!
//! ## Module Organization
//!
//! - [`state_machine`] - States, transition table, guards, persistence, and
//!   the driving engine
//! - [`csp`] - Adapter contract, payload/result registry, error taxonomy,
//!   mock and Azure implementations
//! - [`models`] - Portfolio and machine rows, provisioning-data merge
//! - [`config`] - Environment-aware configuration loading
//! - [`error`] - Umbrella error type
//! - [`logging`] - Structured console + JSON file logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use provision_core::csp::{CloudProvider, MockCloudProvider};
//! use provision_core::models::NewPortfolio;
//! use provision_core::state_machine::{
//!     InMemoryProvisioningStore, PortfolioStateMachine, ProvisioningStore, TransitionContext,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryProvisioningStore::new());
//! let csp = Arc::new(MockCloudProvider::reliable());
//!
//! let portfolio = store
//!     .create_portfolio(NewPortfolio { name: "Sample Portfolio".into() })
//!     .await?;
//! let mut machine = PortfolioStateMachine::load_or_create(
//!     store,
//!     csp.clone(),
//!     portfolio.id,
//!     Default::default(),
//! )
//! .await?;
//!
//! let ctx = TransitionContext::new(csp.root_credentials());
//! machine.trigger_next_transition(&ctx).await?; // unstarted -> starting
//! machine.trigger_next_transition(&ctx).await?; // starting -> started
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod csp;
pub mod error;
pub mod logging;
pub mod models;
pub mod state_machine;

// Re-export commonly used types
pub use config::{AdapterKind, ProvisionConfig, RetryPolicy};
pub use csp::{CloudProvider, CspCredentials, CspError, StagePayload, StageResult};
pub use error::{ProvisionError, Result};
pub use state_machine::{FsmState, PortfolioStateMachine, Stage, SubState, TransitionContext};
