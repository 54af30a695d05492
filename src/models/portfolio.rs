//! # Portfolio Model
//!
//! The organization being provisioned into the cloud provider. Carries the
//! accumulated `csp_data` blob: every completed stage's result is merged in
//! additively so later stages can read earlier stages' outputs.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

/// Maps to the `portfolios` table. Only the columns the provisioning core
/// touches are modeled here; the wider application schema is out of scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Portfolio {
    pub id: Uuid,
    pub name: String,
    /// Opaque JSON blob of accumulated stage results, snake_case keys.
    pub csp_data: Option<Value>,
    pub deleted_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPortfolio {
    pub name: String,
}

impl Portfolio {
    /// Accumulated provisioning data as an owned map; absent or non-object
    /// data yields an empty map.
    pub fn provisioning_data(&self) -> Map<String, Value> {
        match &self.csp_data {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Portfolio>, sqlx::Error> {
        sqlx::query_as::<_, Portfolio>(
            "SELECT id, name, csp_data, deleted_at, created_at, updated_at \
             FROM portfolios WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(pool: &PgPool, new: &NewPortfolio) -> Result<Portfolio, sqlx::Error> {
        sqlx::query_as::<_, Portfolio>(
            "INSERT INTO portfolios (id, name, created_at, updated_at) \
             VALUES ($1, $2, now(), now()) \
             RETURNING id, name, csp_data, deleted_at, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .fetch_one(pool)
        .await
    }
}

/// Additive merge of a stage result into accumulated provisioning data.
///
/// Keys written by completed stages are never silently overwritten: a
/// conflicting value is logged before it replaces the old one (verification
/// stages legitimately refresh fields they re-read from the vendor).
pub fn merge_provisioning_data(data: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        if let Some(existing) = data.get(key) {
            if existing != value {
                warn!(
                    key = key.as_str(),
                    "provisioning data key overwritten with conflicting value"
                );
            }
        }
        data.insert(key.clone(), value.clone());
    }
}
