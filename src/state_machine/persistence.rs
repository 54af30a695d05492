//! Persistence seam for the provisioning engine.
//!
//! A transition and its provisioning-data merge commit atomically, and the
//! state write is a compare-and-swap against the state read at transition
//! time: of two simultaneous advances from the same source state, exactly one
//! wins and the other gets [`StoreError::StaleState`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use sqlx::PgPool;
use uuid::Uuid;

use super::errors::{StoreError, StoreResult};
use super::states::{FsmState, Stage};
use crate::models::{merge_provisioning_data, NewPortfolio, Portfolio, PortfolioStateMachineRow};

#[async_trait]
pub trait ProvisioningStore: Send + Sync {
    async fn create_portfolio(&self, new: NewPortfolio) -> StoreResult<Portfolio>;

    async fn load_portfolio(&self, id: Uuid) -> StoreResult<Portfolio>;

    async fn load_machine(
        &self,
        portfolio_id: Uuid,
    ) -> StoreResult<Option<PortfolioStateMachineRow>>;

    async fn create_machine(&self, portfolio_id: Uuid) -> StoreResult<PortfolioStateMachineRow>;

    /// Atomically advance `machine_id` from `expected_from` to `to`, merging
    /// `data_patch` into the portfolio's provisioning data in the same
    /// transaction. Fails with [`StoreError::StaleState`] when the persisted
    /// state no longer matches `expected_from`.
    async fn commit_transition(
        &self,
        machine_id: Uuid,
        portfolio_id: Uuid,
        expected_from: FsmState,
        to: FsmState,
        data_patch: Option<&Map<String, Value>>,
    ) -> StoreResult<()>;

    /// Portfolios whose machine is unstarted, failed, stuck in the tenant
    /// stage's failed sub-state, or missing entirely.
    async fn portfolios_pending_provisioning(&self) -> StoreResult<Vec<Uuid>>;
}

/// Postgres-backed store.
pub struct PgProvisioningStore {
    pool: PgPool,
}

impl PgProvisioningStore {
    pub fn new(pool: PgPool) -> PgProvisioningStore {
        PgProvisioningStore { pool }
    }
}

#[async_trait]
impl ProvisioningStore for PgProvisioningStore {
    async fn create_portfolio(&self, new: NewPortfolio) -> StoreResult<Portfolio> {
        Ok(Portfolio::create(&self.pool, &new).await?)
    }

    async fn load_portfolio(&self, id: Uuid) -> StoreResult<Portfolio> {
        Portfolio::find_by_id(&self.pool, id)
            .await?
            .ok_or(StoreError::PortfolioNotFound(id))
    }

    async fn load_machine(
        &self,
        portfolio_id: Uuid,
    ) -> StoreResult<Option<PortfolioStateMachineRow>> {
        Ok(PortfolioStateMachineRow::find_by_portfolio(&self.pool, portfolio_id).await?)
    }

    async fn create_machine(&self, portfolio_id: Uuid) -> StoreResult<PortfolioStateMachineRow> {
        Ok(PortfolioStateMachineRow::create(&self.pool, portfolio_id).await?)
    }

    async fn commit_transition(
        &self,
        machine_id: Uuid,
        portfolio_id: Uuid,
        expected_from: FsmState,
        to: FsmState,
        data_patch: Option<&Map<String, Value>>,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(String,)> =
            sqlx::query_as("SELECT state FROM portfolio_state_machines WHERE id = $1 FOR UPDATE")
                .bind(machine_id)
                .fetch_optional(&mut *tx)
                .await?;
        let current = current
            .ok_or(StoreError::MachineNotFound(machine_id))?
            .0;
        if current != expected_from.to_string() {
            return Err(StoreError::StaleState {
                machine_id,
                expected: expected_from.to_string(),
                found: current,
            });
        }

        sqlx::query(
            "UPDATE portfolio_state_machines SET state = $1, updated_at = now() WHERE id = $2",
        )
        .bind(to.to_string())
        .bind(machine_id)
        .execute(&mut *tx)
        .await?;

        if let Some(patch) = data_patch {
            let row: Option<(Option<Value>,)> =
                sqlx::query_as("SELECT csp_data FROM portfolios WHERE id = $1 FOR UPDATE")
                    .bind(portfolio_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let existing = row.ok_or(StoreError::PortfolioNotFound(portfolio_id))?.0;
            let mut data = match existing {
                Some(Value::Object(map)) => map,
                _ => Map::new(),
            };
            merge_provisioning_data(&mut data, patch);
            sqlx::query("UPDATE portfolios SET csp_data = $1, updated_at = now() WHERE id = $2")
                .bind(Value::Object(data))
                .bind(portfolio_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn portfolios_pending_provisioning(&self) -> StoreResult<Vec<Uuid>> {
        Ok(PortfolioStateMachineRow::pending_provisioning(&self.pool).await?)
    }
}

/// In-memory store with the same compare-and-swap semantics, for tests and
/// local development.
#[derive(Default)]
pub struct InMemoryProvisioningStore {
    portfolios: Mutex<HashMap<Uuid, Portfolio>>,
    machines: Mutex<HashMap<Uuid, PortfolioStateMachineRow>>,
}

impl InMemoryProvisioningStore {
    pub fn new() -> InMemoryProvisioningStore {
        Self::default()
    }
}

#[async_trait]
impl ProvisioningStore for InMemoryProvisioningStore {
    async fn create_portfolio(&self, new: NewPortfolio) -> StoreResult<Portfolio> {
        let now = Utc::now().naive_utc();
        let portfolio = Portfolio {
            id: Uuid::new_v4(),
            name: new.name,
            csp_data: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.portfolios
            .lock()
            .insert(portfolio.id, portfolio.clone());
        Ok(portfolio)
    }

    async fn load_portfolio(&self, id: Uuid) -> StoreResult<Portfolio> {
        self.portfolios
            .lock()
            .get(&id)
            .cloned()
            .ok_or(StoreError::PortfolioNotFound(id))
    }

    async fn load_machine(
        &self,
        portfolio_id: Uuid,
    ) -> StoreResult<Option<PortfolioStateMachineRow>> {
        Ok(self.machines.lock().get(&portfolio_id).cloned())
    }

    async fn create_machine(&self, portfolio_id: Uuid) -> StoreResult<PortfolioStateMachineRow> {
        let now = Utc::now().naive_utc();
        let row = PortfolioStateMachineRow {
            id: Uuid::new_v4(),
            portfolio_id,
            state: FsmState::UNSTARTED.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.machines.lock().insert(portfolio_id, row.clone());
        Ok(row)
    }

    async fn commit_transition(
        &self,
        machine_id: Uuid,
        portfolio_id: Uuid,
        expected_from: FsmState,
        to: FsmState,
        data_patch: Option<&Map<String, Value>>,
    ) -> StoreResult<()> {
        // Both maps are mutated under a single critical section so the state
        // swap and the data merge stay atomic, matching the SQL transaction.
        let mut machines = self.machines.lock();
        let mut portfolios = self.portfolios.lock();

        let machine = machines
            .values_mut()
            .find(|m| m.id == machine_id)
            .ok_or(StoreError::MachineNotFound(machine_id))?;
        if machine.state != expected_from.to_string() {
            return Err(StoreError::StaleState {
                machine_id,
                expected: expected_from.to_string(),
                found: machine.state.clone(),
            });
        }
        machine.state = to.to_string();
        machine.updated_at = Utc::now().naive_utc();

        if let Some(patch) = data_patch {
            let portfolio = portfolios
                .get_mut(&portfolio_id)
                .ok_or(StoreError::PortfolioNotFound(portfolio_id))?;
            let mut data = match portfolio.csp_data.take() {
                Some(Value::Object(map)) => map,
                _ => Map::new(),
            };
            merge_provisioning_data(&mut data, patch);
            portfolio.csp_data = Some(Value::Object(data));
            portfolio.updated_at = Utc::now().naive_utc();
        }
        Ok(())
    }

    async fn portfolios_pending_provisioning(&self) -> StoreResult<Vec<Uuid>> {
        let machines = self.machines.lock();
        let pending_states = [
            FsmState::UNSTARTED.to_string(),
            FsmState::FAILED.to_string(),
            FsmState::failed(Stage::Tenant).to_string(),
        ];
        let mut ids: Vec<Uuid> = self
            .portfolios
            .lock()
            .values()
            .filter(|p| p.deleted_at.is_none())
            .filter(|p| match machines.get(&p.id) {
                None => true,
                Some(m) => pending_states.contains(&m.state),
            })
            .map(|p| p.id)
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_cas_rejects_stale_advance() {
        let store = InMemoryProvisioningStore::new();
        let portfolio = store
            .create_portfolio(NewPortfolio { name: "demo".into() })
            .await
            .unwrap();
        let machine = store.create_machine(portfolio.id).await.unwrap();

        store
            .commit_transition(
                machine.id,
                portfolio.id,
                FsmState::UNSTARTED,
                FsmState::STARTING,
                None,
            )
            .await
            .unwrap();

        // A second advance from the already-consumed source state loses.
        let err = store
            .commit_transition(
                machine.id,
                portfolio.id,
                FsmState::UNSTARTED,
                FsmState::STARTING,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StaleState { .. }));
    }

    #[tokio::test]
    async fn test_commit_merges_patch_atomically() {
        let store = InMemoryProvisioningStore::new();
        let portfolio = store
            .create_portfolio(NewPortfolio { name: "demo".into() })
            .await
            .unwrap();
        let machine = store.create_machine(portfolio.id).await.unwrap();

        let mut patch = Map::new();
        patch.insert("tenant_id".into(), Value::String("t-1".into()));
        store
            .commit_transition(
                machine.id,
                portfolio.id,
                FsmState::UNSTARTED,
                FsmState::STARTING,
                Some(&patch),
            )
            .await
            .unwrap();

        let reloaded = store.load_portfolio(portfolio.id).await.unwrap();
        assert_eq!(reloaded.provisioning_data()["tenant_id"], "t-1");
        let machine = store.load_machine(portfolio.id).await.unwrap().unwrap();
        assert_eq!(machine.state, "starting");
    }

    #[tokio::test]
    async fn test_pending_provisioning_includes_unstarted_failed_and_missing() {
        let store = InMemoryProvisioningStore::new();

        let no_machine = store
            .create_portfolio(NewPortfolio { name: "a".into() })
            .await
            .unwrap();

        let unstarted = store
            .create_portfolio(NewPortfolio { name: "b".into() })
            .await
            .unwrap();
        store.create_machine(unstarted.id).await.unwrap();

        let advanced = store
            .create_portfolio(NewPortfolio { name: "c".into() })
            .await
            .unwrap();
        let m = store.create_machine(advanced.id).await.unwrap();
        store
            .commit_transition(m.id, advanced.id, FsmState::UNSTARTED, FsmState::STARTING, None)
            .await
            .unwrap();

        let tenant_failed = store
            .create_portfolio(NewPortfolio { name: "d".into() })
            .await
            .unwrap();
        let m = store.create_machine(tenant_failed.id).await.unwrap();
        store
            .commit_transition(
                m.id,
                tenant_failed.id,
                FsmState::UNSTARTED,
                FsmState::failed(Stage::Tenant),
                None,
            )
            .await
            .unwrap();

        let pending = store.portfolios_pending_provisioning().await.unwrap();
        assert!(pending.contains(&no_machine.id));
        assert!(pending.contains(&unstarted.id));
        assert!(pending.contains(&tenant_failed.id));
        assert!(!pending.contains(&advanced.id));
    }
}
