//! End-to-end provisioning lifecycle tests against the in-memory store and
//! the mock cloud provider.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use provision_core::csp::{
    AdminRoleDefinitionPayload, AdminRoleDefinitionResult, BillingInstructionPayload,
    BillingInstructionResult, BillingProfileCreationPayload, BillingProfileCreationResult,
    BillingProfileTenantAccessPayload, BillingProfileTenantAccessResult,
    BillingProfileVerificationPayload, BillingProfileVerificationResult, CloudProvider,
    CspCredentials, CspError, CspResult, MockCloudProvider, PrincipalAdminRolePayload,
    PrincipalAdminRoleResult, TaskOrderBillingCreationPayload, TaskOrderBillingCreationResult,
    TaskOrderBillingVerificationPayload, TaskOrderBillingVerificationResult,
    TenantAdminOwnershipPayload, TenantAdminOwnershipResult, TenantPayload,
    TenantPrincipalAppPayload, TenantPrincipalAppResult, TenantPrincipalCredentialPayload,
    TenantPrincipalCredentialResult, TenantPrincipalOwnershipPayload,
    TenantPrincipalOwnershipResult, TenantPrincipalPayload, TenantPrincipalResult, TenantResult,
};
use provision_core::models::NewPortfolio;
use provision_core::state_machine::{
    FsmState, InMemoryProvisioningStore, PortfolioStateMachine, ProvisioningStore, Stage,
    StateMachineError, TransitionContext,
};
use provision_core::RetryPolicy;

/// Wraps the reliable mock and injects transient connection failures into the
/// tenant stage: the first `fail_first` tenant calls fail, later ones pass
/// through. Counts every tenant call either way.
struct FlakyTenantProvider {
    inner: MockCloudProvider,
    fail_first: u32,
    tenant_calls: AtomicU32,
}

impl FlakyTenantProvider {
    fn new(fail_first: u32) -> FlakyTenantProvider {
        FlakyTenantProvider {
            inner: MockCloudProvider::reliable(),
            fail_first,
            tenant_calls: AtomicU32::new(0),
        }
    }

    fn tenant_calls(&self) -> u32 {
        self.tenant_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CloudProvider for FlakyTenantProvider {
    async fn create_tenant(&self, payload: TenantPayload) -> CspResult<TenantResult> {
        let call = self.tenant_calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            return Err(CspError::Connection("simulated outage".to_string()));
        }
        self.inner.create_tenant(payload).await
    }

    async fn create_billing_profile_creation(
        &self,
        payload: BillingProfileCreationPayload,
    ) -> CspResult<BillingProfileCreationResult> {
        self.inner.create_billing_profile_creation(payload).await
    }

    async fn create_billing_profile_verification(
        &self,
        payload: BillingProfileVerificationPayload,
    ) -> CspResult<BillingProfileVerificationResult> {
        self.inner.create_billing_profile_verification(payload).await
    }

    async fn create_billing_profile_tenant_access(
        &self,
        payload: BillingProfileTenantAccessPayload,
    ) -> CspResult<BillingProfileTenantAccessResult> {
        self.inner.create_billing_profile_tenant_access(payload).await
    }

    async fn create_task_order_billing_creation(
        &self,
        payload: TaskOrderBillingCreationPayload,
    ) -> CspResult<TaskOrderBillingCreationResult> {
        self.inner.create_task_order_billing_creation(payload).await
    }

    async fn create_task_order_billing_verification(
        &self,
        payload: TaskOrderBillingVerificationPayload,
    ) -> CspResult<TaskOrderBillingVerificationResult> {
        self.inner
            .create_task_order_billing_verification(payload)
            .await
    }

    async fn create_billing_instruction(
        &self,
        payload: BillingInstructionPayload,
    ) -> CspResult<BillingInstructionResult> {
        self.inner.create_billing_instruction(payload).await
    }

    async fn create_tenant_principal_app(
        &self,
        payload: TenantPrincipalAppPayload,
    ) -> CspResult<TenantPrincipalAppResult> {
        self.inner.create_tenant_principal_app(payload).await
    }

    async fn create_tenant_principal(
        &self,
        payload: TenantPrincipalPayload,
    ) -> CspResult<TenantPrincipalResult> {
        self.inner.create_tenant_principal(payload).await
    }

    async fn create_tenant_principal_credential(
        &self,
        payload: TenantPrincipalCredentialPayload,
    ) -> CspResult<TenantPrincipalCredentialResult> {
        self.inner.create_tenant_principal_credential(payload).await
    }

    async fn create_admin_role_definition(
        &self,
        payload: AdminRoleDefinitionPayload,
    ) -> CspResult<AdminRoleDefinitionResult> {
        self.inner.create_admin_role_definition(payload).await
    }

    async fn create_principal_admin_role(
        &self,
        payload: PrincipalAdminRolePayload,
    ) -> CspResult<PrincipalAdminRoleResult> {
        self.inner.create_principal_admin_role(payload).await
    }

    async fn create_tenant_admin_ownership(
        &self,
        payload: TenantAdminOwnershipPayload,
    ) -> CspResult<TenantAdminOwnershipResult> {
        self.inner.create_tenant_admin_ownership(payload).await
    }

    async fn create_tenant_principal_ownership(
        &self,
        payload: TenantPrincipalOwnershipPayload,
    ) -> CspResult<TenantPrincipalOwnershipResult> {
        self.inner.create_tenant_principal_ownership(payload).await
    }

    async fn get_secret(&self, key: &str) -> CspResult<Option<String>> {
        self.inner.get_secret(key).await
    }

    async fn set_secret(&self, key: &str, value: &str) -> CspResult<()> {
        self.inner.set_secret(key, value).await
    }

    fn root_credentials(&self) -> CspCredentials {
        self.inner.root_credentials()
    }

    fn get_environment_login_url(&self) -> String {
        self.inner.get_environment_login_url()
    }
}

/// Everything the pipeline needs that does not come from earlier stage
/// results: tenant admin details, billing display names, and the initial
/// task-order line item.
fn onboarding_context(creds: CspCredentials) -> TransitionContext {
    let stage_data: Map<String, Value> = json!({
        "user_id": "admin",
        "password": "correct-horse-battery-staple",
        "domain_name": "sample",
        "first_name": "Ada",
        "last_name": "Lovelace",
        "country_code": "US",
        "password_recovery_email_address": "ada@example.com",
        "billing_profile_display_name": "Sample Billing Profile",
        "billing_account_name": "7c89b735-b22b-55c0-ab5a-c624843e8bf6:de4416ce-acc6-44b1-8122-c87c4e903c91_2019-05-31",
        "address": {
            "company_name": "Sample Corp",
            "address_line_1": "1 Main St",
            "city": "Richmond",
            "region": "VA",
            "country": "US",
            "postal_code": "23220",
        },
        "initial_clin_amount": 1_000_000.0,
        "initial_clin_start_date": "2026-01-01",
        "initial_clin_end_date": "2026-12-31",
        "initial_clin_type": "1",
        "initial_task_order_id": "TO-0001",
    })
    .as_object()
    .unwrap()
    .clone();
    TransitionContext::new(creds).with_stage_data(stage_data)
}

async fn seeded_portfolio(store: &InMemoryProvisioningStore) -> Uuid {
    store
        .create_portfolio(NewPortfolio {
            name: "Sample Portfolio".into(),
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_full_pipeline_runs_to_completion() {
    let store = Arc::new(InMemoryProvisioningStore::new());
    let csp = Arc::new(MockCloudProvider::reliable());
    let portfolio_id = seeded_portfolio(&store).await;

    let mut machine = PortfolioStateMachine::load_or_create(
        store.clone(),
        csp.clone(),
        portfolio_id,
        RetryPolicy::default(),
    )
    .await
    .unwrap();
    let ctx = onboarding_context(csp.root_credentials());

    // init + start + 14 stages + complete = 17 forward steps.
    for _ in 0..17 {
        machine.trigger_next_transition(&ctx).await.unwrap();
    }
    assert_eq!(machine.state(), FsmState::COMPLETED);

    // Nothing further to drive.
    let err = machine.trigger_next_transition(&ctx).await.unwrap_err();
    assert!(matches!(err, StateMachineError::InvalidTrigger { .. }));

    // Every stage's result landed, and every merged value is non-empty.
    let portfolio = store.load_portfolio(portfolio_id).await.unwrap();
    let data = portfolio.provisioning_data();
    for key in [
        "tenant_id",
        "user_object_id",
        "billing_profile_verify_url",
        "billing_profile_id",
        "billing_profile_name",
        "billing_role_assignment_id",
        "task_order_billing_verify_url",
        "reported_clin_name",
        "principal_app_id",
        "principal_app_object_id",
        "principal_id",
        "principal_client_id",
        "admin_role_def_id",
        "principal_assignment_id",
        "admin_owner_assignment_id",
        "principal_owner_assignment_id",
    ] {
        let value = data
            .get(key)
            .unwrap_or_else(|| panic!("missing merged key {key}"));
        if let Value::String(s) = value {
            assert!(!s.is_empty(), "empty merged value for {key}");
        }
    }

    // Sensitive material stayed out of the merge but reached the vault.
    assert!(!data.contains_key("tenant_admin_password"));
    assert!(!data.contains_key("principal_secret_key"));
    assert!(csp.get_secret("tenant_admin_password").await.unwrap().is_some());
    assert!(csp.get_secret("principal_secret_key").await.unwrap().is_some());

    // The persisted row agrees with the in-memory view.
    let row = store.load_machine(portfolio_id).await.unwrap().unwrap();
    assert_eq!(row.state, "completed");

    // A completed portfolio is not pending provisioning.
    let pending = store.portfolios_pending_provisioning().await.unwrap();
    assert!(!pending.contains(&portfolio_id));
}

#[tokio::test]
async fn test_transient_failures_within_budget_still_create_the_stage() {
    let store = Arc::new(InMemoryProvisioningStore::new());
    let csp = Arc::new(FlakyTenantProvider::new(4)); // budget is 5 attempts
    let portfolio_id = seeded_portfolio(&store).await;

    let mut machine = PortfolioStateMachine::load_or_create(
        store.clone(),
        csp.clone(),
        portfolio_id,
        RetryPolicy { max_attempts: 5 },
    )
    .await
    .unwrap();
    let ctx = onboarding_context(csp.root_credentials());

    machine.trigger("init", &ctx).await.unwrap();
    machine.trigger("start", &ctx).await.unwrap();
    let landed = machine.trigger("create_tenant", &ctx).await.unwrap();

    assert_eq!(landed, FsmState::created(Stage::Tenant));
    assert_eq!(csp.tenant_calls(), 5);
}

#[tokio::test]
async fn test_exhausted_retry_budget_fails_the_stage() {
    let store = Arc::new(InMemoryProvisioningStore::new());
    let csp = Arc::new(FlakyTenantProvider::new(u32::MAX));
    let portfolio_id = seeded_portfolio(&store).await;

    let mut machine = PortfolioStateMachine::load_or_create(
        store.clone(),
        csp.clone(),
        portfolio_id,
        RetryPolicy { max_attempts: 3 },
    )
    .await
    .unwrap();
    let ctx = onboarding_context(csp.root_credentials());

    machine.trigger("init", &ctx).await.unwrap();
    machine.trigger("start", &ctx).await.unwrap();
    let err = machine.trigger("create_tenant", &ctx).await.unwrap_err();

    assert!(matches!(
        err,
        StateMachineError::StageFailed {
            stage: Stage::Tenant,
            ..
        }
    ));
    assert_eq!(machine.state(), FsmState::failed(Stage::Tenant));
    // Exactly the budget, no more.
    assert_eq!(csp.tenant_calls(), 3);

    // A tenant-failed machine is picked up for re-provisioning.
    let pending = store.portfolios_pending_provisioning().await.unwrap();
    assert!(pending.contains(&portfolio_id));
}

#[tokio::test]
async fn test_concurrent_advance_from_same_state_has_one_winner() {
    let store = Arc::new(InMemoryProvisioningStore::new());
    let csp = Arc::new(MockCloudProvider::reliable());
    let portfolio_id = seeded_portfolio(&store).await;

    let mut first = PortfolioStateMachine::load_or_create(
        store.clone(),
        csp.clone(),
        portfolio_id,
        RetryPolicy::default(),
    )
    .await
    .unwrap();
    let mut second = PortfolioStateMachine::load_or_create(
        store.clone(),
        csp.clone(),
        portfolio_id,
        RetryPolicy::default(),
    )
    .await
    .unwrap();
    let ctx = onboarding_context(csp.root_credentials());

    first.trigger("init", &ctx).await.unwrap();
    let err = second.trigger("init", &ctx).await.unwrap_err();
    assert!(matches!(err, StateMachineError::StaleState(_)));

    // The loser's view did not move; the persisted row holds the winner's state.
    assert_eq!(second.state(), FsmState::UNSTARTED);
    let row = store.load_machine(portfolio_id).await.unwrap().unwrap();
    assert_eq!(row.state, "starting");
}

#[tokio::test]
async fn test_stage_results_accumulate_across_stages() {
    let store = Arc::new(InMemoryProvisioningStore::new());
    let csp = Arc::new(MockCloudProvider::reliable());
    let portfolio_id = seeded_portfolio(&store).await;

    let mut machine = PortfolioStateMachine::load_or_create(
        store.clone(),
        csp.clone(),
        portfolio_id,
        RetryPolicy::default(),
    )
    .await
    .unwrap();
    let ctx = onboarding_context(csp.root_credentials());

    machine.trigger("init", &ctx).await.unwrap();
    machine.trigger("start", &ctx).await.unwrap();
    machine.trigger("create_tenant", &ctx).await.unwrap();
    assert!(machine.provisioning_data().contains_key("tenant_id"));

    // The next stage's payload draws tenant_id from the merge, not the ctx.
    machine
        .trigger("create_billing_profile_creation", &ctx)
        .await
        .unwrap();
    assert_eq!(
        machine.state(),
        FsmState::created(Stage::BillingProfileCreation)
    );
    assert!(machine
        .provisioning_data()
        .contains_key("billing_profile_verify_url"));
}
