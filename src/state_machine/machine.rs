//! # Portfolio Provisioning Engine
//!
//! Drives a persisted portfolio state machine through the stage pipeline.
//! Every trigger resolves against the precomputed [`TransitionTable`], and
//! every state change commits through the [`ProvisioningStore`] with
//! compare-and-swap semantics before the in-memory view is updated.
//!
//! A `create_*` trigger is the only transition with an after-effect: it moves
//! the machine into the stage's in-progress state, calls the cloud provider,
//! then commits `finish_*` (merging the stage result) or `fail_*` depending
//! on the outcome. Transient vendor errors are retried inline up to the
//! configured attempt budget; validation failures are not retried at all.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::errors::{StateMachineError, StateMachineResult, StoreError};
use super::guards::{StageDataValidGuard, TransitionGuard};
use super::persistence::ProvisioningStore;
use super::states::{FsmState, Stage};
use super::transitions::{Transition, TransitionKind, TransitionTable};
use crate::config::RetryPolicy;
use crate::csp::{CloudProvider, CspCredentials, CspError, StageResult};

/// Caller-supplied inputs for a trigger: the root credentials the payload
/// carries toward the vendor, and per-call overrides layered on top of the
/// portfolio's accumulated provisioning data.
#[derive(Debug, Clone)]
pub struct TransitionContext {
    pub credentials: CspCredentials,
    pub stage_data: Map<String, Value>,
}

impl TransitionContext {
    pub fn new(credentials: CspCredentials) -> TransitionContext {
        TransitionContext {
            credentials,
            stage_data: Map::new(),
        }
    }

    pub fn with_stage_data(mut self, stage_data: Map<String, Value>) -> TransitionContext {
        self.stage_data = stage_data;
        self
    }
}

pub struct PortfolioStateMachine {
    machine_id: Uuid,
    portfolio_id: Uuid,
    state: FsmState,
    provisioning_data: Map<String, Value>,
    table: TransitionTable,
    csp: Arc<dyn CloudProvider>,
    store: Arc<dyn ProvisioningStore>,
    retry: RetryPolicy,
}

impl PortfolioStateMachine {
    /// Attach to the portfolio's persisted machine, creating an unstarted one
    /// on first contact. The transition table is rebuilt deterministically
    /// from the stage catalog on every attach.
    pub async fn load_or_create(
        store: Arc<dyn ProvisioningStore>,
        csp: Arc<dyn CloudProvider>,
        portfolio_id: Uuid,
        retry: RetryPolicy,
    ) -> StateMachineResult<PortfolioStateMachine> {
        let portfolio = store.load_portfolio(portfolio_id).await?;
        let row = match store.load_machine(portfolio_id).await? {
            Some(row) => row,
            None => store.create_machine(portfolio_id).await?,
        };
        let state = row
            .fsm_state()
            .map_err(|bad| StateMachineError::from(StoreError::CorruptState(bad)))?;
        debug!(
            portfolio_id = %portfolio_id,
            machine_id = %row.id,
            state = %state,
            "attached portfolio state machine"
        );
        Ok(PortfolioStateMachine {
            machine_id: row.id,
            portfolio_id,
            state,
            provisioning_data: portfolio.provisioning_data(),
            table: TransitionTable::build(),
            csp,
            store,
            retry,
        })
    }

    pub fn machine_id(&self) -> Uuid {
        self.machine_id
    }

    pub fn portfolio_id(&self) -> Uuid {
        self.portfolio_id
    }

    pub fn state(&self) -> FsmState {
        self.state
    }

    /// In-memory view of the portfolio's accumulated provisioning data,
    /// refreshed on every committed merge.
    pub fn provisioning_data(&self) -> &Map<String, Value> {
        &self.provisioning_data
    }

    /// Fire a named trigger. Returns the state the machine landed in, which
    /// for `create_*` triggers is the stage's created or failed sub-state,
    /// never in-progress.
    pub async fn trigger(
        &mut self,
        trigger: &str,
        ctx: &TransitionContext,
    ) -> StateMachineResult<FsmState> {
        let transition = self
            .table
            .find(trigger, self.state)
            .cloned()
            .ok_or_else(|| StateMachineError::InvalidTrigger {
                trigger: trigger.to_string(),
                state: self.state.to_string(),
            })?;

        match transition.kind {
            TransitionKind::Create(stage) => self.run_stage(stage, &transition, ctx).await,
            TransitionKind::Finish(stage) => {
                let source = self.payload_source(ctx)?;
                StageDataValidGuard.check(stage, &source)?;
                self.commit(&transition, None).await
            }
            _ => self.commit(&transition, None).await,
        }
    }

    /// Advance the machine one step along its happy path: `init` and `start`
    /// through the system states, then each stage's `create_*` in catalog
    /// order, then `complete`. States with no forward trigger (failed
    /// sub-states and terminal states) are left to the escape triggers.
    pub async fn trigger_next_transition(
        &mut self,
        ctx: &TransitionContext,
    ) -> StateMachineResult<FsmState> {
        let trigger = if self.state == FsmState::UNSTARTED {
            Some("init".to_string())
        } else if self.state == FsmState::STARTING {
            Some("start".to_string())
        } else {
            self.table
                .next_create_trigger(self.state)
                .or_else(|| self.table.complete_trigger(self.state))
                .map(str::to_string)
        };
        match trigger {
            Some(trigger) => self.trigger(&trigger, ctx).await,
            None => Err(StateMachineError::InvalidTrigger {
                trigger: "trigger_next_transition".to_string(),
                state: self.state.to_string(),
            }),
        }
    }

    /// The map a stage payload deserializes from: accumulated provisioning
    /// data, per-call overrides on top, credentials last.
    fn payload_source(&self, ctx: &TransitionContext) -> StateMachineResult<Map<String, Value>> {
        let mut source = self.provisioning_data.clone();
        for (key, value) in &ctx.stage_data {
            source.insert(key.clone(), value.clone());
        }
        source.insert("creds".to_string(), serde_json::to_value(&ctx.credentials)?);
        Ok(source)
    }

    async fn run_stage(
        &mut self,
        stage: Stage,
        create: &Transition,
        ctx: &TransitionContext,
    ) -> StateMachineResult<FsmState> {
        self.commit(create, None).await?;
        info!(
            portfolio_id = %self.portfolio_id,
            stage = %stage,
            "provisioning stage started"
        );

        let source = self.payload_source(ctx)?;
        let payload = match stage.payload_from_value(Value::Object(source)) {
            Ok(payload) => payload,
            Err(err) => {
                // Validation failures are deterministic; retrying cannot help.
                return self.fail_stage(stage, err.to_string()).await;
            }
        };

        let mut attempt = 1u32;
        let result = loop {
            match self.csp.create_stage(payload.clone()).await {
                Ok(result) => break result,
                Err(err) if err.is_transient() && attempt < self.retry.max_attempts => {
                    warn!(
                        portfolio_id = %self.portfolio_id,
                        stage = %stage,
                        attempt,
                        error = %err,
                        "transient provisioning error, retrying"
                    );
                    attempt += 1;
                }
                Err(err) => {
                    return self
                        .fail_stage(stage, format!("attempt {attempt}: {err}"))
                        .await;
                }
            }
        };

        if let Err(err) = self.store_sensitive_creds(&result).await {
            return self
                .fail_stage(stage, format!("storing credentials: {err}"))
                .await;
        }

        let patch = match result.to_merge_value() {
            Ok(patch) => patch,
            Err(err) => return self.fail_stage(stage, err.to_string()).await,
        };

        let finish = self.finish_transition(stage)?;
        let landed = self.commit(&finish, Some(&patch)).await?;
        info!(
            portfolio_id = %self.portfolio_id,
            stage = %stage,
            attempts = attempt,
            "provisioning stage created"
        );
        Ok(landed)
    }

    /// Sensitive fields never enter the merge; they go to the vendor's secret
    /// store keyed by field name.
    async fn store_sensitive_creds(&self, result: &StageResult) -> Result<(), CspError> {
        if let Some(creds) = result.sensitive_creds() {
            for (key, value) in &creds {
                if let Value::String(secret) = value {
                    self.csp.set_secret(key, secret).await?;
                }
            }
        }
        Ok(())
    }

    async fn fail_stage(&mut self, stage: Stage, reason: String) -> StateMachineResult<FsmState> {
        warn!(
            portfolio_id = %self.portfolio_id,
            stage = %stage,
            reason = reason.as_str(),
            "provisioning stage failed"
        );
        let fail = self.fail_transition(stage)?;
        self.commit(&fail, None).await?;
        Err(StateMachineError::StageFailed { stage, reason })
    }

    fn finish_transition(&self, stage: Stage) -> StateMachineResult<Transition> {
        self.table
            .find(&format!("finish_{}", stage.name()), self.state)
            .cloned()
            .ok_or_else(|| StateMachineError::InvalidTrigger {
                trigger: format!("finish_{}", stage.name()),
                state: self.state.to_string(),
            })
    }

    fn fail_transition(&self, stage: Stage) -> StateMachineResult<Transition> {
        self.table
            .find(&format!("fail_{}", stage.name()), self.state)
            .cloned()
            .ok_or_else(|| StateMachineError::InvalidTrigger {
                trigger: format!("fail_{}", stage.name()),
                state: self.state.to_string(),
            })
    }

    /// Commit one transition through the store, then apply it to the
    /// in-memory view. The store's compare-and-swap makes simultaneous
    /// advances from the same source state single-winner.
    async fn commit(
        &mut self,
        transition: &Transition,
        patch: Option<&Map<String, Value>>,
    ) -> StateMachineResult<FsmState> {
        self.store
            .commit_transition(
                self.machine_id,
                self.portfolio_id,
                self.state,
                transition.dest,
                patch,
            )
            .await?;
        self.state = transition.dest;
        if let Some(patch) = patch {
            crate::models::merge_provisioning_data(&mut self.provisioning_data, patch);
        }
        debug!(
            portfolio_id = %self.portfolio_id,
            trigger = transition.trigger.as_str(),
            state = %self.state,
            "transition committed"
        );
        Ok(self.state)
    }
}
