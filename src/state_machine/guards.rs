//! Transition guards.
//!
//! A stage's create transition only fires when the assembled payload source
//! actually deserializes into that stage's typed payload. Failing the guard
//! is not an error escape: the engine records it by moving the machine into
//! the stage's failed sub-state.

use serde_json::{Map, Value};

use super::errors::{StateMachineError, StateMachineResult};
use super::states::Stage;

/// Trait for implementing state transition guards.
pub trait TransitionGuard {
    /// Check whether the transition is allowed for `stage` given the data the
    /// payload would be built from.
    fn check(&self, stage: Stage, payload_source: &Map<String, Value>) -> StateMachineResult<bool>;

    /// Description of this guard for logging.
    fn description(&self) -> &'static str;
}

/// Guard that validates the payload source against the stage's payload type.
pub struct StageDataValidGuard;

impl TransitionGuard for StageDataValidGuard {
    fn check(&self, stage: Stage, payload_source: &Map<String, Value>) -> StateMachineResult<bool> {
        match stage.payload_from_value(Value::Object(payload_source.clone())) {
            Ok(_) => Ok(true),
            Err(err) => Err(StateMachineError::GuardRejected {
                trigger: format!("create_{stage}"),
                reason: format!("payload does not deserialize: {err}"),
            }),
        }
    }

    fn description(&self) -> &'static str {
        "stage payload must deserialize from accumulated provisioning data"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_guard_accepts_complete_payload_source() {
        let data = source(json!({
            "creds": {"username": "root", "password": "pw"},
            "user_id": "u-1",
            "password": "p",
            "domain_name": "demo",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "country_code": "US",
            "password_recovery_email_address": "ada@example.com",
            "address": {
                "company_name": "Demo",
                "address_line_1": "1 Main St",
                "city": "Richmond",
                "region": "VA",
                "country": "US",
                "postal_code": "23220"
            },
            "billing_profile_display_name": "Demo Billing",
        }));
        assert!(StageDataValidGuard.check(Stage::Tenant, &data).unwrap());
    }

    #[test]
    fn test_guard_rejects_missing_required_field() {
        let data = source(json!({
            "creds": {"username": "root", "password": "pw"},
            "user_id": "u-1",
        }));
        let err = StageDataValidGuard.check(Stage::Tenant, &data).unwrap_err();
        assert!(matches!(err, StateMachineError::GuardRejected { .. }));
    }
}
