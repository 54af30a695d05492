//! CSP adapter boundary.
//!
//! The provisioning engine is decoupled from the concrete cloud vendor
//! through [`CloudProvider`]: one creation method per stage plus a handful of
//! lifecycle-independent operations. The mock and real implementations are
//! interchangeable with no engine changes.

pub mod azure;
pub mod error;
pub mod mock;
pub mod models;

pub use azure::AzureCloudProvider;
pub use error::{CspError, CspResult};
pub use mock::MockCloudProvider;
pub use models::{
    AdminRoleDefinitionPayload, AdminRoleDefinitionResult, BillingInstructionPayload,
    BillingInstructionResult, BillingProfileAddress, BillingProfileCreationPayload,
    BillingProfileCreationResult, BillingProfileTenantAccessPayload,
    BillingProfileTenantAccessResult, BillingProfileVerificationPayload,
    BillingProfileVerificationResult, CspCredentials, PrincipalAdminRolePayload,
    PrincipalAdminRoleResult, StagePayload, StageResult, TaskOrderBillingCreationPayload,
    TaskOrderBillingCreationResult, TaskOrderBillingVerificationPayload,
    TaskOrderBillingVerificationResult, TenantAdminOwnershipPayload, TenantAdminOwnershipResult,
    TenantPayload, TenantPrincipalAppPayload, TenantPrincipalAppResult,
    TenantPrincipalCredentialPayload, TenantPrincipalCredentialResult,
    TenantPrincipalOwnershipPayload, TenantPrincipalOwnershipResult, TenantPrincipalPayload,
    TenantPrincipalResult, TenantResult,
};

use async_trait::async_trait;

use models::*;

/// Contract a cloud vendor implementation must satisfy.
///
/// Preconditions: payloads already satisfy the stage's schema (the caller
/// validates). Postconditions: success returns a schema-complete result;
/// failure raises one typed [`CspError`] and never a partial result.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    async fn create_tenant(&self, payload: TenantPayload) -> CspResult<TenantResult>;

    async fn create_billing_profile_creation(
        &self,
        payload: BillingProfileCreationPayload,
    ) -> CspResult<BillingProfileCreationResult>;

    async fn create_billing_profile_verification(
        &self,
        payload: BillingProfileVerificationPayload,
    ) -> CspResult<BillingProfileVerificationResult>;

    async fn create_billing_profile_tenant_access(
        &self,
        payload: BillingProfileTenantAccessPayload,
    ) -> CspResult<BillingProfileTenantAccessResult>;

    async fn create_task_order_billing_creation(
        &self,
        payload: TaskOrderBillingCreationPayload,
    ) -> CspResult<TaskOrderBillingCreationResult>;

    async fn create_task_order_billing_verification(
        &self,
        payload: TaskOrderBillingVerificationPayload,
    ) -> CspResult<TaskOrderBillingVerificationResult>;

    async fn create_billing_instruction(
        &self,
        payload: BillingInstructionPayload,
    ) -> CspResult<BillingInstructionResult>;

    async fn create_tenant_principal_app(
        &self,
        payload: TenantPrincipalAppPayload,
    ) -> CspResult<TenantPrincipalAppResult>;

    async fn create_tenant_principal(
        &self,
        payload: TenantPrincipalPayload,
    ) -> CspResult<TenantPrincipalResult>;

    async fn create_tenant_principal_credential(
        &self,
        payload: TenantPrincipalCredentialPayload,
    ) -> CspResult<TenantPrincipalCredentialResult>;

    async fn create_admin_role_definition(
        &self,
        payload: AdminRoleDefinitionPayload,
    ) -> CspResult<AdminRoleDefinitionResult>;

    async fn create_principal_admin_role(
        &self,
        payload: PrincipalAdminRolePayload,
    ) -> CspResult<PrincipalAdminRoleResult>;

    async fn create_tenant_admin_ownership(
        &self,
        payload: TenantAdminOwnershipPayload,
    ) -> CspResult<TenantAdminOwnershipResult>;

    async fn create_tenant_principal_ownership(
        &self,
        payload: TenantPrincipalOwnershipPayload,
    ) -> CspResult<TenantPrincipalOwnershipResult>;

    /// Fetch a secret by key from the vendor's secret store.
    async fn get_secret(&self, key: &str) -> CspResult<Option<String>>;

    /// Store a secret by key in the vendor's secret store.
    async fn set_secret(&self, key: &str, value: &str) -> CspResult<()>;

    /// Root credentials for the provider account.
    fn root_credentials(&self) -> CspCredentials;

    /// Login URL for a provisioned environment.
    fn get_environment_login_url(&self) -> String;

    /// Dispatch a validated payload to the matching per-stage method.
    ///
    /// The engine drives everything through this; the typed methods exist so
    /// vendor implementations stay explicit about each remote operation.
    async fn create_stage(&self, payload: StagePayload) -> CspResult<StageResult> {
        Ok(match payload {
            StagePayload::Tenant(p) => StageResult::Tenant(self.create_tenant(p).await?),
            StagePayload::BillingProfileCreation(p) => {
                StageResult::BillingProfileCreation(self.create_billing_profile_creation(p).await?)
            }
            StagePayload::BillingProfileVerification(p) => StageResult::BillingProfileVerification(
                self.create_billing_profile_verification(p).await?,
            ),
            StagePayload::BillingProfileTenantAccess(p) => {
                StageResult::BillingProfileTenantAccess(
                    self.create_billing_profile_tenant_access(p).await?,
                )
            }
            StagePayload::TaskOrderBillingCreation(p) => StageResult::TaskOrderBillingCreation(
                self.create_task_order_billing_creation(p).await?,
            ),
            StagePayload::TaskOrderBillingVerification(p) => {
                StageResult::TaskOrderBillingVerification(
                    self.create_task_order_billing_verification(p).await?,
                )
            }
            StagePayload::BillingInstruction(p) => {
                StageResult::BillingInstruction(self.create_billing_instruction(p).await?)
            }
            StagePayload::TenantPrincipalApp(p) => {
                StageResult::TenantPrincipalApp(self.create_tenant_principal_app(p).await?)
            }
            StagePayload::TenantPrincipal(p) => {
                StageResult::TenantPrincipal(self.create_tenant_principal(p).await?)
            }
            StagePayload::TenantPrincipalCredential(p) => StageResult::TenantPrincipalCredential(
                self.create_tenant_principal_credential(p).await?,
            ),
            StagePayload::AdminRoleDefinition(p) => {
                StageResult::AdminRoleDefinition(self.create_admin_role_definition(p).await?)
            }
            StagePayload::PrincipalAdminRole(p) => {
                StageResult::PrincipalAdminRole(self.create_principal_admin_role(p).await?)
            }
            StagePayload::TenantAdminOwnership(p) => {
                StageResult::TenantAdminOwnership(self.create_tenant_admin_ownership(p).await?)
            }
            StagePayload::TenantPrincipalOwnership(p) => {
                StageResult::TenantPrincipalOwnership(
                    self.create_tenant_principal_ownership(p).await?,
                )
            }
        })
    }
}
