//! Real cloud provider adapter.
//!
//! Resolves a bearer token, issues the vendor management API calls and maps
//! HTTP status codes onto the typed CSP error taxonomy. Stages that are
//! asynchronous on the vendor side (202 + polling headers) surface the verify
//! URL and retry-after hint as their result; the follow-up verification stage
//! polls that URL.

use std::time::Duration;

use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{error, warn};

use super::error::{CspError, CspResult};
use super::models::*;
use super::CloudProvider;
use crate::config::AzureAdapterConfig;
use async_trait::async_trait;

const BILLING_API_VERSION: &str = "2019-10-01-preview";
const GRAPH_API_VERSION: &str = "1.6";
const VAULT_API_VERSION: &str = "7.0";

pub struct AzureCloudProvider {
    config: AzureAdapterConfig,
    http: reqwest::Client,
}

impl AzureCloudProvider {
    pub fn new(config: AzureAdapterConfig) -> CspResult<AzureCloudProvider> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| CspError::Connection(e.to_string()))?;
        Ok(AzureCloudProvider { config, http })
    }

    /// Client-credentials token for the given resource audience.
    async fn fetch_token(&self, resource: &str) -> CspResult<String> {
        let url = format!(
            "{}/{}/oauth2/token",
            self.config.login_endpoint.trim_end_matches('/'),
            self.config.tenant_id
        );
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("resource", resource),
        ];
        let response = self
            .http
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(CspError::Authentication(format!(
                "token request rejected with status {}",
                response.status()
            )));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| CspError::UnknownServer(e.to_string()))?;
        body.get("access_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CspError::Authentication("token response missing access_token".into()))
    }

    async fn request(
        &self,
        method: Method,
        resource: &str,
        url: String,
        body: Option<Value>,
    ) -> CspResult<Value> {
        let token = self.fetch_token(resource).await?;
        let mut builder = self
            .http
            .request(method, &url)
            .bearer_auth(token);
        if let Some(body) = body {
            builder = builder.json(&camelize_keys(body));
        }
        let response = builder.send().await.map_err(transport_error)?;
        classify_response(response).await
    }

    async fn call<P: serde::Serialize, R: DeserializeOwned>(
        &self,
        method: Method,
        url: String,
        payload: &P,
    ) -> CspResult<R> {
        let body = serde_json::to_value(payload)
            .map_err(|e| CspError::InvalidPayload(e.to_string()))?;
        let value = self
            .request(method, &self.management_endpoint(), url, Some(body))
            .await?;
        serde_json::from_value(value).map_err(|e| CspError::InvalidResult(e.to_string()))
    }

    /// Poll a verify URL handed back by an earlier asynchronous creation.
    async fn poll<R: DeserializeOwned>(&self, verify_url: &str) -> CspResult<R> {
        let value = self
            .request(
                Method::GET,
                &self.management_endpoint(),
                verify_url.to_string(),
                None,
            )
            .await?;
        serde_json::from_value(value).map_err(|e| CspError::InvalidResult(e.to_string()))
    }

    fn management_endpoint(&self) -> String {
        self.config.management_endpoint.trim_end_matches('/').to_string()
    }

    fn graph_endpoint(&self) -> String {
        self.config.graph_endpoint.trim_end_matches('/').to_string()
    }

    fn billing_account_url(&self, billing_account_name: &str, suffix: &str) -> String {
        format!(
            "{}/providers/Microsoft.Billing/billingAccounts/{billing_account_name}{suffix}?api-version={BILLING_API_VERSION}",
            self.management_endpoint()
        )
    }
}

fn transport_error(err: reqwest::Error) -> CspError {
    if err.is_timeout() || err.is_connect() {
        CspError::Connection(err.to_string())
    } else {
        CspError::UnknownServer(err.to_string())
    }
}

/// Map a vendor response to a result body or a typed error.
///
/// 202 responses carry their outcome in the `Location`/`Retry-After` headers
/// rather than the body; they are returned as an object holding both so the
/// async-creation result types can consume them.
async fn classify_response(response: Response) -> CspResult<Value> {
    let status = response.status();

    if status == StatusCode::ACCEPTED {
        let location = response
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                CspError::UnknownServer("202 response missing Location header".into())
            })?;
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(10);
        return Ok(json!({ "Location": location, "Retry-After": retry_after }));
    }

    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| CspError::UnknownServer(e.to_string()));
    }

    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED => Err(CspError::Authentication(body)),
        StatusCode::FORBIDDEN => Err(CspError::Authorization(body)),
        StatusCode::CONFLICT => {
            warn!(%status, "vendor reports operation already in progress");
            Err(CspError::OperationInProgress(body))
        }
        s if s.is_server_error() => {
            error!(%status, "vendor server error");
            Err(CspError::UnknownServer(body))
        }
        _ => Err(CspError::UnknownServer(format!("{status}: {body}"))),
    }
}

#[async_trait]
impl CloudProvider for AzureCloudProvider {
    async fn create_tenant(&self, payload: TenantPayload) -> CspResult<TenantResult> {
        let url = format!(
            "{}/{}/tenants?api-version={GRAPH_API_VERSION}",
            self.graph_endpoint(),
            self.config.tenant_id
        );
        self.call(Method::POST, url, &payload).await
    }

    async fn create_billing_profile_creation(
        &self,
        payload: BillingProfileCreationPayload,
    ) -> CspResult<BillingProfileCreationResult> {
        let url = self.billing_account_url(&payload.billing_account_name, "/billingProfiles");
        self.call(Method::POST, url, &payload).await
    }

    async fn create_billing_profile_verification(
        &self,
        payload: BillingProfileVerificationPayload,
    ) -> CspResult<BillingProfileVerificationResult> {
        self.poll(&payload.billing_profile_verify_url).await
    }

    async fn create_billing_profile_tenant_access(
        &self,
        payload: BillingProfileTenantAccessPayload,
    ) -> CspResult<BillingProfileTenantAccessResult> {
        let url = self.billing_account_url(
            &payload.billing_account_name,
            &format!(
                "/billingProfiles/{}/createBillingRoleAssignment",
                payload.billing_profile_name
            ),
        );
        self.call(Method::POST, url, &payload).await
    }

    async fn create_task_order_billing_creation(
        &self,
        payload: TaskOrderBillingCreationPayload,
    ) -> CspResult<TaskOrderBillingCreationResult> {
        let url = self.billing_account_url(
            &payload.billing_account_name,
            &format!("/billingProfiles/{}", payload.billing_profile_name),
        );
        self.call(Method::PATCH, url, &payload).await
    }

    async fn create_task_order_billing_verification(
        &self,
        payload: TaskOrderBillingVerificationPayload,
    ) -> CspResult<TaskOrderBillingVerificationResult> {
        self.poll(&payload.task_order_billing_verify_url).await
    }

    async fn create_billing_instruction(
        &self,
        payload: BillingInstructionPayload,
    ) -> CspResult<BillingInstructionResult> {
        let url = self.billing_account_url(
            &payload.billing_account_name,
            &format!(
                "/billingProfiles/{}/instructions/{}",
                payload.billing_profile_name, payload.initial_task_order_id
            ),
        );
        self.call(Method::PUT, url, &payload).await
    }

    async fn create_tenant_principal_app(
        &self,
        payload: TenantPrincipalAppPayload,
    ) -> CspResult<TenantPrincipalAppResult> {
        let url = format!(
            "{}/{}/applications?api-version={GRAPH_API_VERSION}",
            self.graph_endpoint(),
            payload.tenant_id
        );
        self.call(Method::POST, url, &payload).await
    }

    async fn create_tenant_principal(
        &self,
        payload: TenantPrincipalPayload,
    ) -> CspResult<TenantPrincipalResult> {
        let url = format!(
            "{}/{}/servicePrincipals?api-version={GRAPH_API_VERSION}",
            self.graph_endpoint(),
            payload.tenant_id
        );
        self.call(Method::POST, url, &payload).await
    }

    async fn create_tenant_principal_credential(
        &self,
        payload: TenantPrincipalCredentialPayload,
    ) -> CspResult<TenantPrincipalCredentialResult> {
        let url = format!(
            "{}/{}/applications/{}/addPassword?api-version={GRAPH_API_VERSION}",
            self.graph_endpoint(),
            payload.tenant_id,
            payload.principal_app_object_id
        );
        self.call(Method::POST, url, &payload).await
    }

    async fn create_admin_role_definition(
        &self,
        payload: AdminRoleDefinitionPayload,
    ) -> CspResult<AdminRoleDefinitionResult> {
        let url = format!(
            "{}/{}/directoryRoles?api-version={GRAPH_API_VERSION}",
            self.graph_endpoint(),
            payload.tenant_id
        );
        self.call(Method::GET, url, &payload).await
    }

    async fn create_principal_admin_role(
        &self,
        payload: PrincipalAdminRolePayload,
    ) -> CspResult<PrincipalAdminRoleResult> {
        let url = format!(
            "{}/{}/directoryRoles/{}/members?api-version={GRAPH_API_VERSION}",
            self.graph_endpoint(),
            payload.tenant_id,
            payload.admin_role_def_id
        );
        self.call(Method::POST, url, &payload).await
    }

    async fn create_tenant_admin_ownership(
        &self,
        payload: TenantAdminOwnershipPayload,
    ) -> CspResult<TenantAdminOwnershipResult> {
        let url = format!(
            "{}/providers/Microsoft.Authorization/roleAssignments/{}?api-version=2019-04-01-preview",
            self.management_endpoint(),
            uuid::Uuid::new_v4()
        );
        self.call(Method::PUT, url, &payload).await
    }

    async fn create_tenant_principal_ownership(
        &self,
        payload: TenantPrincipalOwnershipPayload,
    ) -> CspResult<TenantPrincipalOwnershipResult> {
        let url = format!(
            "{}/providers/Microsoft.Authorization/roleAssignments/{}?api-version=2019-04-01-preview",
            self.management_endpoint(),
            uuid::Uuid::new_v4()
        );
        self.call(Method::PUT, url, &payload).await
    }

    async fn get_secret(&self, key: &str) -> CspResult<Option<String>> {
        let url = format!(
            "{}/secrets/{key}?api-version={VAULT_API_VERSION}",
            self.config.vault_url.trim_end_matches('/')
        );
        match self
            .request(Method::GET, &self.config.vault_url, url, None)
            .await
        {
            Ok(value) => Ok(value.get("value").and_then(Value::as_str).map(str::to_string)),
            Err(CspError::UnknownServer(body)) if body.contains("SecretNotFound") => Ok(None),
            Err(err) => {
                error!(key, %err, "could not GET secret from vault");
                Err(err)
            }
        }
    }

    async fn set_secret(&self, key: &str, value: &str) -> CspResult<()> {
        let url = format!(
            "{}/secrets/{key}?api-version={VAULT_API_VERSION}",
            self.config.vault_url.trim_end_matches('/')
        );
        self.request(
            Method::PUT,
            &self.config.vault_url,
            url,
            Some(json!({ "value": value })),
        )
        .await
        .map_err(|err| {
            error!(key, %err, "could not SET secret in vault");
            err
        })?;
        Ok(())
    }

    fn root_credentials(&self) -> CspCredentials {
        CspCredentials {
            username: self.config.client_id.clone(),
            password: self.config.client_secret.clone(),
        }
    }

    fn get_environment_login_url(&self) -> String {
        self.config.login_url.clone()
    }
}
