//! Mock cloud provider for tests and local development.
//!
//! Simulates latency and independently-seeded failure classes at configurable
//! probabilities. Swappable with the real adapter with no engine changes.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use uuid::Uuid;

use super::error::{CspError, CspResult};
use super::models::*;
use super::CloudProvider;
use crate::config::MockAdapterConfig;

const MOCK_BILLING_ACCOUNT: &str =
    "7c89b735-b22b-55c0-ab5a-c624843e8bf6:de4416ce-acc6-44b1-8122-c87c4e903c91_2019-05-31";
const MOCK_BILLING_PROFILE_NAME: &str = "KQWI-W2SU-BG7-TGB";

/// Failure-injection knobs: independent percentage chance per failure class,
/// plus a credential check gate.
#[derive(Debug, Clone)]
pub struct MockSimulation {
    pub with_delay: bool,
    pub with_authorization: bool,
    pub connection_failure_pct: u8,
    pub server_failure_pct: u8,
    pub authorization_failure_pct: u8,
}

impl MockSimulation {
    /// No delays, no credential checks, no injected failures. What the tests
    /// run with.
    pub fn reliable() -> MockSimulation {
        MockSimulation {
            with_delay: false,
            with_authorization: false,
            connection_failure_pct: 0,
            server_failure_pct: 0,
            authorization_failure_pct: 0,
        }
    }

    /// Default failure rates for interactive development.
    pub fn flaky() -> MockSimulation {
        MockSimulation {
            with_delay: true,
            with_authorization: true,
            connection_failure_pct: 7,
            server_failure_pct: 1,
            authorization_failure_pct: 2,
        }
    }
}

impl From<&MockAdapterConfig> for MockSimulation {
    fn from(cfg: &MockAdapterConfig) -> Self {
        MockSimulation {
            with_delay: cfg.with_delay,
            with_authorization: cfg.with_authorization,
            connection_failure_pct: cfg.connection_failure_pct,
            server_failure_pct: cfg.server_failure_pct,
            authorization_failure_pct: cfg.authorization_failure_pct,
        }
    }
}

pub struct MockCloudProvider {
    simulation: MockSimulation,
    secrets: Mutex<HashMap<String, String>>,
}

impl MockCloudProvider {
    pub fn new(simulation: MockSimulation) -> MockCloudProvider {
        MockCloudProvider {
            simulation,
            secrets: Mutex::new(HashMap::new()),
        }
    }

    /// Deterministic instance with all simulation disabled.
    pub fn reliable() -> MockCloudProvider {
        Self::new(MockSimulation::reliable())
    }

    fn id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    async fn delay(&self) {
        if self.simulation.with_delay {
            let millis = rand::thread_rng().gen_range(100..500);
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }

    fn maybe(pct: u8) -> bool {
        pct > 0 && rand::thread_rng().gen_range(0..100u8) < pct
    }

    fn authorize(&self, creds: &CspCredentials) -> CspResult<()> {
        if self.simulation.with_authorization && *creds != self.root_credentials() {
            return Err(CspError::Authentication("Authentication failure.".into()));
        }
        Ok(())
    }

    /// One roll per failure class, mirroring the live adapter's error surface.
    async fn simulate_faults(&self, creds: &CspCredentials) -> CspResult<()> {
        self.delay().await;
        self.authorize(creds)?;
        if Self::maybe(self.simulation.connection_failure_pct) {
            return Err(CspError::Connection("Network failure.".into()));
        }
        if Self::maybe(self.simulation.server_failure_pct) {
            return Err(CspError::UnknownServer("Not our fault.".into()));
        }
        if Self::maybe(self.simulation.authorization_failure_pct) {
            return Err(CspError::Authorization("Not authorized.".into()));
        }
        Ok(())
    }

    fn billing_profile_id() -> String {
        format!(
            "/providers/Microsoft.Billing/billingAccounts/{MOCK_BILLING_ACCOUNT}/billingProfiles/{MOCK_BILLING_PROFILE_NAME}"
        )
    }
}

#[async_trait]
impl CloudProvider for MockCloudProvider {
    async fn create_tenant(&self, payload: TenantPayload) -> CspResult<TenantResult> {
        self.simulate_faults(&payload.creds).await?;
        Ok(TenantResult {
            user_id: payload.user_id,
            tenant_id: Self::id(),
            user_object_id: Self::id(),
            tenant_admin_username: Some("test".into()),
            tenant_admin_password: Some("test".into()),
        })
    }

    async fn create_billing_profile_creation(
        &self,
        payload: BillingProfileCreationPayload,
    ) -> CspResult<BillingProfileCreationResult> {
        self.simulate_faults(&payload.creds).await?;
        Ok(BillingProfileCreationResult {
            billing_profile_verify_url: "https://zombo.com".into(),
            billing_profile_retry_after: 10,
        })
    }

    async fn create_billing_profile_verification(
        &self,
        payload: BillingProfileVerificationPayload,
    ) -> CspResult<BillingProfileVerificationResult> {
        self.simulate_faults(&payload.creds).await?;
        Ok(BillingProfileVerificationResult {
            billing_profile_id: Self::billing_profile_id(),
            billing_profile_name: MOCK_BILLING_PROFILE_NAME.into(),
            billing_profile_properties: BillingProfileProperties {
                address: BillingProfileAddress {
                    company_name: "Promptworks".into(),
                    address_line_1: "123 S Broad Street, Suite 2400".into(),
                    city: "Philadelphia".into(),
                    region: "PA".into(),
                    country: "US".into(),
                    postal_code: "19109".into(),
                },
                billing_profile_display_name: "Test Billing Profile".into(),
                invoice_sections: vec![BillingInvoiceSection {
                    invoice_section_id: format!(
                        "{}/invoiceSections/CHCO-BAAR-PJA-TGB",
                        Self::billing_profile_id()
                    ),
                    invoice_section_name: "CHCO-BAAR-PJA-TGB".into(),
                }],
            },
        })
    }

    async fn create_billing_profile_tenant_access(
        &self,
        payload: BillingProfileTenantAccessPayload,
    ) -> CspResult<BillingProfileTenantAccessResult> {
        self.simulate_faults(&payload.creds).await?;
        let assignment = format!("40000000-aaaa-bbbb-cccc-100000000000_{}", Self::id());
        Ok(BillingProfileTenantAccessResult {
            billing_role_assignment_id: format!(
                "{}/billingRoleAssignments/{assignment}",
                Self::billing_profile_id()
            ),
            billing_role_assignment_name: assignment,
        })
    }

    async fn create_task_order_billing_creation(
        &self,
        payload: TaskOrderBillingCreationPayload,
    ) -> CspResult<TaskOrderBillingCreationResult> {
        self.simulate_faults(&payload.creds).await?;
        Ok(TaskOrderBillingCreationResult {
            task_order_billing_verify_url: "https://somelocation".into(),
            task_order_retry_after: 10,
        })
    }

    async fn create_task_order_billing_verification(
        &self,
        payload: TaskOrderBillingVerificationPayload,
    ) -> CspResult<TaskOrderBillingVerificationResult> {
        self.simulate_faults(&payload.creds).await?;
        Ok(TaskOrderBillingVerificationResult {
            billing_profile_id: Self::billing_profile_id(),
            billing_profile_name: MOCK_BILLING_PROFILE_NAME.into(),
            billing_profile_enabled_plan_details: BillingProfileEnabledPlanDetails {
                enabled_azure_plans: vec![serde_json::json!({
                    "productId": "DZH318Z0BPS6",
                    "skuId": "0001",
                    "skuDescription": "Microsoft Azure Plan",
                })],
            },
        })
    }

    async fn create_billing_instruction(
        &self,
        payload: BillingInstructionPayload,
    ) -> CspResult<BillingInstructionResult> {
        self.simulate_faults(&payload.creds).await?;
        Ok(BillingInstructionResult {
            reported_clin_name: format!("{}:CLIN001", payload.initial_task_order_id),
        })
    }

    async fn create_tenant_principal_app(
        &self,
        payload: TenantPrincipalAppPayload,
    ) -> CspResult<TenantPrincipalAppResult> {
        self.simulate_faults(&payload.creds).await?;
        Ok(TenantPrincipalAppResult {
            principal_app_id: Self::id(),
            principal_app_object_id: Self::id(),
        })
    }

    async fn create_tenant_principal(
        &self,
        payload: TenantPrincipalPayload,
    ) -> CspResult<TenantPrincipalResult> {
        self.simulate_faults(&payload.creds).await?;
        Ok(TenantPrincipalResult {
            principal_id: Self::id(),
        })
    }

    async fn create_tenant_principal_credential(
        &self,
        payload: TenantPrincipalCredentialPayload,
    ) -> CspResult<TenantPrincipalCredentialResult> {
        self.simulate_faults(&payload.creds).await?;
        Ok(TenantPrincipalCredentialResult {
            principal_client_id: payload.principal_app_id,
            principal_secret_key: Some(Self::id()),
        })
    }

    async fn create_admin_role_definition(
        &self,
        payload: AdminRoleDefinitionPayload,
    ) -> CspResult<AdminRoleDefinitionResult> {
        self.simulate_faults(&payload.creds).await?;
        Ok(AdminRoleDefinitionResult {
            admin_role_def_id: Self::id(),
        })
    }

    async fn create_principal_admin_role(
        &self,
        payload: PrincipalAdminRolePayload,
    ) -> CspResult<PrincipalAdminRoleResult> {
        self.simulate_faults(&payload.creds).await?;
        Ok(PrincipalAdminRoleResult {
            principal_assignment_id: Self::id(),
        })
    }

    async fn create_tenant_admin_ownership(
        &self,
        payload: TenantAdminOwnershipPayload,
    ) -> CspResult<TenantAdminOwnershipResult> {
        self.simulate_faults(&payload.creds).await?;
        Ok(TenantAdminOwnershipResult {
            admin_owner_assignment_id: Self::id(),
        })
    }

    async fn create_tenant_principal_ownership(
        &self,
        payload: TenantPrincipalOwnershipPayload,
    ) -> CspResult<TenantPrincipalOwnershipResult> {
        self.simulate_faults(&payload.creds).await?;
        Ok(TenantPrincipalOwnershipResult {
            principal_owner_assignment_id: Self::id(),
        })
    }

    async fn get_secret(&self, key: &str) -> CspResult<Option<String>> {
        Ok(self.secrets.lock().get(key).cloned())
    }

    async fn set_secret(&self, key: &str, value: &str) -> CspResult<()> {
        self.secrets.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn root_credentials(&self) -> CspCredentials {
        CspCredentials {
            username: "mock-cloud".into(),
            password: "shh".into(),
        }
    }

    fn get_environment_login_url(&self) -> String {
        "https://www.mycloud.com/my-env-login".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_creds() -> CspCredentials {
        CspCredentials {
            username: "mock-cloud".into(),
            password: "shh".into(),
        }
    }

    #[tokio::test]
    async fn test_reliable_mock_returns_complete_results() {
        let mock = MockCloudProvider::reliable();
        let result = mock
            .create_tenant(TenantPayload {
                creds: root_creds(),
                user_id: "admin".into(),
                password: "pw".into(),
                domain_name: "sample".into(),
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                country_code: "US".into(),
                password_recovery_email_address: "ada@example.com".into(),
            })
            .await
            .unwrap();
        assert!(!result.tenant_id.is_empty());
        assert!(!result.user_object_id.is_empty());
        assert!(result.tenant_admin_username.is_some());
    }

    #[tokio::test]
    async fn test_connection_failure_rate_of_100_always_raises() {
        let mock = MockCloudProvider::new(MockSimulation {
            with_delay: false,
            with_authorization: false,
            connection_failure_pct: 100,
            server_failure_pct: 0,
            authorization_failure_pct: 0,
        });
        let err = mock
            .create_tenant_principal_app(TenantPrincipalAppPayload {
                creds: root_creds(),
                tenant_id: "t".into(),
            })
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_secret_round_trip() {
        let mock = MockCloudProvider::reliable();
        assert_eq!(mock.get_secret("missing").await.unwrap(), None);
        mock.set_secret("tenant_creds", "{}").await.unwrap();
        assert_eq!(
            mock.get_secret("tenant_creds").await.unwrap().as_deref(),
            Some("{}")
        );
    }
}
