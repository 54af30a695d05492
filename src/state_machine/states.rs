use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered catalog of provisioning stages.
///
/// Each stage is one remote CSP operation with its own payload/result schema
/// and its own in-progress/created/failed sub-states. The order here is the
/// order the pipeline runs in; `next()` walks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Tenant,
    BillingProfileCreation,
    BillingProfileVerification,
    BillingProfileTenantAccess,
    TaskOrderBillingCreation,
    TaskOrderBillingVerification,
    BillingInstruction,
    TenantPrincipalApp,
    TenantPrincipal,
    TenantPrincipalCredential,
    AdminRoleDefinition,
    PrincipalAdminRole,
    TenantAdminOwnership,
    TenantPrincipalOwnership,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 14] = [
        Stage::Tenant,
        Stage::BillingProfileCreation,
        Stage::BillingProfileVerification,
        Stage::BillingProfileTenantAccess,
        Stage::TaskOrderBillingCreation,
        Stage::TaskOrderBillingVerification,
        Stage::BillingInstruction,
        Stage::TenantPrincipalApp,
        Stage::TenantPrincipal,
        Stage::TenantPrincipalCredential,
        Stage::AdminRoleDefinition,
        Stage::PrincipalAdminRole,
        Stage::TenantAdminOwnership,
        Stage::TenantPrincipalOwnership,
    ];

    pub fn first() -> Stage {
        Self::ALL[0]
    }

    /// Position of this stage in the pipeline.
    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0)
    }

    /// The stage that follows this one, if any.
    pub fn next(&self) -> Option<Stage> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn is_last(&self) -> bool {
        self.next().is_none()
    }

    /// Snake-case stage name; trigger names and state strings derive from it.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Tenant => "tenant",
            Stage::BillingProfileCreation => "billing_profile_creation",
            Stage::BillingProfileVerification => "billing_profile_verification",
            Stage::BillingProfileTenantAccess => "billing_profile_tenant_access",
            Stage::TaskOrderBillingCreation => "task_order_billing_creation",
            Stage::TaskOrderBillingVerification => "task_order_billing_verification",
            Stage::BillingInstruction => "billing_instruction",
            Stage::TenantPrincipalApp => "tenant_principal_app",
            Stage::TenantPrincipal => "tenant_principal",
            Stage::TenantPrincipalCredential => "tenant_principal_credential",
            Stage::AdminRoleDefinition => "admin_role_definition",
            Stage::PrincipalAdminRole => "principal_admin_role",
            Stage::TenantAdminOwnership => "tenant_admin_ownership",
            Stage::TenantPrincipalOwnership => "tenant_principal_ownership",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|stage| stage.name() == s)
            .copied()
            .ok_or_else(|| format!("Unknown provisioning stage: {s}"))
    }
}

/// Per-stage sub-state composed with a [`Stage`] to form a concrete FSM state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubState {
    InProgress,
    Created,
    Failed,
}

impl SubState {
    pub fn suffix(&self) -> &'static str {
        match self {
            SubState::InProgress => "in_progress",
            SubState::Created => "created",
            SubState::Failed => "failed",
        }
    }
}

/// System-level states the machine passes through outside any stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemState {
    Unstarted,
    Starting,
    Started,
    Completed,
    Failed,
}

impl SystemState {
    pub fn name(&self) -> &'static str {
        match self {
            SystemState::Unstarted => "unstarted",
            SystemState::Starting => "starting",
            SystemState::Started => "started",
            SystemState::Completed => "completed",
            SystemState::Failed => "failed",
        }
    }
}

/// The full FSM state: either a system state or a (stage, sub-state) pair.
///
/// The string form is what the `state` column persists, so `Display` and
/// `FromStr` must round-trip for every member of the precomputed state set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsmState {
    System(SystemState),
    Stage(Stage, SubState),
}

impl FsmState {
    pub const UNSTARTED: FsmState = FsmState::System(SystemState::Unstarted);
    pub const STARTING: FsmState = FsmState::System(SystemState::Starting);
    pub const STARTED: FsmState = FsmState::System(SystemState::Started);
    pub const COMPLETED: FsmState = FsmState::System(SystemState::Completed);
    pub const FAILED: FsmState = FsmState::System(SystemState::Failed);

    pub fn in_progress(stage: Stage) -> FsmState {
        FsmState::Stage(stage, SubState::InProgress)
    }

    pub fn created(stage: Stage) -> FsmState {
        FsmState::Stage(stage, SubState::Created)
    }

    pub fn failed(stage: Stage) -> FsmState {
        FsmState::Stage(stage, SubState::Failed)
    }

    pub fn is_system(&self) -> bool {
        matches!(self, FsmState::System(_))
    }

    /// The stage this state belongs to, if it is a stage state.
    pub fn owning_stage(&self) -> Option<Stage> {
        match self {
            FsmState::Stage(stage, _) => Some(*stage),
            FsmState::System(_) => None,
        }
    }

    pub fn sub_state(&self) -> Option<SubState> {
        match self {
            FsmState::Stage(_, sub) => Some(*sub),
            FsmState::System(_) => None,
        }
    }

    /// Terminal states: nothing but the universal escapes applies.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FsmState::System(SystemState::Completed) | FsmState::System(SystemState::Failed)
        )
    }

    /// Every state the table builder can produce, in deterministic order.
    pub fn all() -> Vec<FsmState> {
        let mut states = vec![
            Self::UNSTARTED,
            Self::STARTING,
            Self::STARTED,
            Self::COMPLETED,
            Self::FAILED,
        ];
        for stage in Stage::ALL {
            states.push(FsmState::in_progress(stage));
            states.push(FsmState::created(stage));
            states.push(FsmState::failed(stage));
        }
        states
    }
}

impl fmt::Display for FsmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsmState::System(sys) => f.write_str(sys.name()),
            FsmState::Stage(stage, sub) => write!(f, "{}_{}", stage.name(), sub.suffix()),
        }
    }
}

impl std::str::FromStr for FsmState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unstarted" => return Ok(Self::UNSTARTED),
            "starting" => return Ok(Self::STARTING),
            "started" => return Ok(Self::STARTED),
            "completed" => return Ok(Self::COMPLETED),
            "failed" => return Ok(Self::FAILED),
            _ => {}
        }
        for (suffix, sub) in [
            ("_in_progress", SubState::InProgress),
            ("_created", SubState::Created),
            ("_failed", SubState::Failed),
        ] {
            if let Some(stage_name) = s.strip_suffix(suffix) {
                if let Ok(stage) = stage_name.parse::<Stage>() {
                    return Ok(FsmState::Stage(stage, sub));
                }
            }
        }
        Err(format!("Unknown FSM state: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_and_next() {
        assert_eq!(Stage::first(), Stage::Tenant);
        assert_eq!(Stage::Tenant.next(), Some(Stage::BillingProfileCreation));
        assert!(Stage::TenantPrincipalOwnership.is_last());
        assert_eq!(Stage::TenantPrincipalOwnership.next(), None);
    }

    #[test]
    fn test_state_string_round_trip() {
        for state in FsmState::all() {
            let text = state.to_string();
            let parsed: FsmState = text.parse().expect("state string must parse back");
            assert_eq!(parsed, state, "round trip failed for {text}");
        }
    }

    #[test]
    fn test_state_tags() {
        let state = FsmState::in_progress(Stage::BillingInstruction);
        assert!(!state.is_system());
        assert_eq!(state.owning_stage(), Some(Stage::BillingInstruction));
        assert_eq!(state.sub_state(), Some(SubState::InProgress));

        assert!(FsmState::STARTED.is_system());
        assert_eq!(FsmState::STARTED.owning_stage(), None);
        assert!(FsmState::COMPLETED.is_terminal());
        assert!(!FsmState::failed(Stage::Tenant).is_terminal());
    }

    #[test]
    fn test_stage_suffix_never_ambiguous() {
        // tenant_principal_created must resolve to (TenantPrincipal, Created),
        // not to a stage literally named "tenant_principal_created".
        let parsed: FsmState = "tenant_principal_created".parse().unwrap();
        assert_eq!(parsed, FsmState::created(Stage::TenantPrincipal));
        let parsed: FsmState = "tenant_principal_credential_in_progress".parse().unwrap();
        assert_eq!(parsed, FsmState::in_progress(Stage::TenantPrincipalCredential));
    }

    proptest::proptest! {
        // The persisted state column must only ever parse to canonical
        // members of the precomputed state set, and parsing must be the
        // exact inverse of Display.
        #[test]
        fn test_parse_accepts_only_canonical_state_strings(s in "[a-z_]{0,48}") {
            use std::collections::HashSet;
            let canonical: HashSet<String> =
                FsmState::all().iter().map(|state| state.to_string()).collect();
            match s.parse::<FsmState>() {
                Ok(state) => {
                    proptest::prop_assert_eq!(state.to_string(), s.clone());
                    proptest::prop_assert!(canonical.contains(&s));
                }
                Err(_) => proptest::prop_assert!(!canonical.contains(&s)),
            }
        }
    }
}
