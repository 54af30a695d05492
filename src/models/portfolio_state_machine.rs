//! # Portfolio State Machine Row
//!
//! Persisted layout of a portfolio's provisioning machine:
//! `{id, portfolio_id, state, created_at, updated_at}`. Created lazily the
//! first time a portfolio needs provisioning, 1:1 with its portfolio, and
//! mutated only by transition execution.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::state_machine::states::{FsmState, Stage};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PortfolioStateMachineRow {
    pub id: Uuid,
    pub portfolio_id: Uuid,
    /// String form of the current [`FsmState`]; always a member of the
    /// precomputed state set.
    pub state: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl PortfolioStateMachineRow {
    pub fn fsm_state(&self) -> Result<FsmState, String> {
        self.state.parse()
    }

    pub async fn find_by_portfolio(
        pool: &PgPool,
        portfolio_id: Uuid,
    ) -> Result<Option<PortfolioStateMachineRow>, sqlx::Error> {
        sqlx::query_as::<_, PortfolioStateMachineRow>(
            "SELECT id, portfolio_id, state, created_at, updated_at \
             FROM portfolio_state_machines WHERE portfolio_id = $1",
        )
        .bind(portfolio_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &PgPool,
        portfolio_id: Uuid,
    ) -> Result<PortfolioStateMachineRow, sqlx::Error> {
        sqlx::query_as::<_, PortfolioStateMachineRow>(
            "INSERT INTO portfolio_state_machines (id, portfolio_id, state, created_at, updated_at) \
             VALUES ($1, $2, $3, now(), now()) \
             RETURNING id, portfolio_id, state, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(portfolio_id)
        .bind(FsmState::UNSTARTED.to_string())
        .fetch_one(pool)
        .await
    }

    /// Portfolios an external scheduler should re-drive: machine missing,
    /// unstarted, failed outright, or stuck in the tenant stage's failed
    /// sub-state. Soft-deleted portfolios are excluded.
    pub async fn pending_provisioning(pool: &PgPool) -> Result<Vec<Uuid>, sqlx::Error> {
        let states = vec![
            FsmState::UNSTARTED.to_string(),
            FsmState::FAILED.to_string(),
            FsmState::failed(Stage::Tenant).to_string(),
        ];
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT p.id FROM portfolios p \
             LEFT JOIN portfolio_state_machines m ON m.portfolio_id = p.id \
             WHERE p.deleted_at IS NULL \
               AND (m.id IS NULL OR m.state = ANY($1)) \
             ORDER BY p.created_at",
        )
        .bind(&states)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
