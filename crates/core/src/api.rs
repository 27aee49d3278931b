//! Management API client.
//!
//! [`ManagementApi`] is the seam for every backing-store round-trip; tests
//! substitute an in-memory implementation. [`RestApi`] is the production
//! client, speaking the Kubernetes-style REST surface of the management
//! server with bearer authentication.

use async_trait::async_trait;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::errors::ApiError;
use crate::models::{
    ActiveDirectoryConfig, ClusterRoleTemplateBinding, ListEnvelope, ProjectRoleTemplateBinding,
    Token, User,
};

/// Backing-store operations used by the migration.
///
/// All calls are issued strictly sequentially by the callers; no operation
/// has side effects beyond the one it names.
#[async_trait]
pub trait ManagementApi: Send + Sync {
    async fn list_users(&self) -> Result<Vec<User>, ApiError>;
    async fn update_user(&self, user: &User) -> Result<User, ApiError>;

    async fn list_project_bindings(&self) -> Result<Vec<ProjectRoleTemplateBinding>, ApiError>;
    async fn create_project_binding(
        &self,
        namespace: &str,
        binding: &ProjectRoleTemplateBinding,
    ) -> Result<ProjectRoleTemplateBinding, ApiError>;
    async fn delete_project_binding(&self, namespace: &str, name: &str) -> Result<(), ApiError>;

    async fn list_cluster_bindings(&self) -> Result<Vec<ClusterRoleTemplateBinding>, ApiError>;
    async fn create_cluster_binding(
        &self,
        namespace: &str,
        binding: &ClusterRoleTemplateBinding,
    ) -> Result<ClusterRoleTemplateBinding, ApiError>;
    async fn delete_cluster_binding(&self, namespace: &str, name: &str) -> Result<(), ApiError>;

    async fn list_tokens(&self) -> Result<Vec<Token>, ApiError>;
    async fn update_token(&self, token: &Token) -> Result<Token, ApiError>;

    /// Read the `activedirectory` auth-config record.
    async fn get_active_directory_config(&self) -> Result<ActiveDirectoryConfig, ApiError>;

    /// Read one key of a secret. `Ok(None)` when the secret or key is absent.
    async fn read_secret_value(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> Result<Option<String>, ApiError>;
}

/// REST client for the management server.
#[derive(Clone)]
pub struct RestApi {
    http: reqwest::Client,
    server: String,
    token: String,
}

impl RestApi {
    /// Build a client against `server` (scheme + host, no trailing slash
    /// required) with the given bearer token.
    pub fn new(
        server: impl Into<String>,
        token: impl Into<String>,
        ca_pem: Option<&[u8]>,
        insecure: bool,
    ) -> Result<Self, ApiError> {
        let server = server.into().trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("admigrate/0.1"));

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(pem) = ca_pem {
            let cert = reqwest::Certificate::from_pem(pem)?;
            builder = builder.add_root_certificate(cert);
        }
        if insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder.build()?;

        info!(server = %server, "created management API client");
        Ok(Self {
            http,
            server,
            token: token.into(),
        })
    }

    fn mgmt_url(&self, resource: &str) -> String {
        format!("{}/apis/management.cattle.io/v3/{resource}", self.server)
    }

    fn mgmt_namespaced_url(&self, namespace: &str, resource: &str) -> String {
        format!(
            "{}/apis/management.cattle.io/v3/namespaces/{namespace}/{resource}",
            self.server
        )
    }

    async fn check_response(
        &self,
        resource: &str,
        resp: reqwest::Response,
    ) -> Result<reqwest::Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ApiError::StatusError {
            status: status.as_u16(),
            resource: resource.to_string(),
            body,
        })
    }

    async fn list<T: DeserializeOwned>(&self, resource: &str) -> Result<Vec<T>, ApiError> {
        let url = self.mgmt_url(resource);
        let resp = self.http.get(&url).bearer_auth(&self.token).send().await?;
        let resp = self.check_response(resource, resp).await?;
        let envelope: ListEnvelope<T> = resp
            .json()
            .await
            .map_err(|e| ApiError::ParseError(e.to_string()))?;
        debug!(resource, count = envelope.items.len(), "listed resources");
        Ok(envelope.items)
    }
}

#[async_trait]
impl ManagementApi for RestApi {
    #[instrument(skip(self))]
    async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        self.list("users").await
    }

    #[instrument(skip(self, user), fields(name = %user.metadata.name))]
    async fn update_user(&self, user: &User) -> Result<User, ApiError> {
        let resource = format!("users/{}", user.metadata.name);
        let url = self.mgmt_url(&resource);
        let resp = self
            .http
            .put(&url)
            .bearer_auth(&self.token)
            .json(user)
            .send()
            .await?;
        let resp = self.check_response(&resource, resp).await?;
        resp.json()
            .await
            .map_err(|e| ApiError::ParseError(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn list_project_bindings(&self) -> Result<Vec<ProjectRoleTemplateBinding>, ApiError> {
        self.list("projectroletemplatebindings").await
    }

    #[instrument(skip(self, binding))]
    async fn create_project_binding(
        &self,
        namespace: &str,
        binding: &ProjectRoleTemplateBinding,
    ) -> Result<ProjectRoleTemplateBinding, ApiError> {
        let resource = format!("namespaces/{namespace}/projectroletemplatebindings");
        let url = self.mgmt_namespaced_url(namespace, "projectroletemplatebindings");
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(binding)
            .send()
            .await?;
        let resp = self.check_response(&resource, resp).await?;
        resp.json()
            .await
            .map_err(|e| ApiError::ParseError(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn delete_project_binding(&self, namespace: &str, name: &str) -> Result<(), ApiError> {
        let resource = format!("namespaces/{namespace}/projectroletemplatebindings/{name}");
        let url = format!(
            "{}/{name}",
            self.mgmt_namespaced_url(namespace, "projectroletemplatebindings")
        );
        let resp = self.http.delete(&url).bearer_auth(&self.token).send().await?;
        self.check_response(&resource, resp).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_cluster_bindings(&self) -> Result<Vec<ClusterRoleTemplateBinding>, ApiError> {
        self.list("clusterroletemplatebindings").await
    }

    #[instrument(skip(self, binding))]
    async fn create_cluster_binding(
        &self,
        namespace: &str,
        binding: &ClusterRoleTemplateBinding,
    ) -> Result<ClusterRoleTemplateBinding, ApiError> {
        let resource = format!("namespaces/{namespace}/clusterroletemplatebindings");
        let url = self.mgmt_namespaced_url(namespace, "clusterroletemplatebindings");
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(binding)
            .send()
            .await?;
        let resp = self.check_response(&resource, resp).await?;
        resp.json()
            .await
            .map_err(|e| ApiError::ParseError(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn delete_cluster_binding(&self, namespace: &str, name: &str) -> Result<(), ApiError> {
        let resource = format!("namespaces/{namespace}/clusterroletemplatebindings/{name}");
        let url = format!(
            "{}/{name}",
            self.mgmt_namespaced_url(namespace, "clusterroletemplatebindings")
        );
        let resp = self.http.delete(&url).bearer_auth(&self.token).send().await?;
        self.check_response(&resource, resp).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_tokens(&self) -> Result<Vec<Token>, ApiError> {
        self.list("tokens").await
    }

    #[instrument(skip(self, token), fields(name = %token.metadata.name))]
    async fn update_token(&self, token: &Token) -> Result<Token, ApiError> {
        let resource = format!("tokens/{}", token.metadata.name);
        let url = self.mgmt_url(&resource);
        let resp = self
            .http
            .put(&url)
            .bearer_auth(&self.token)
            .json(token)
            .send()
            .await?;
        let resp = self.check_response(&resource, resp).await?;
        resp.json()
            .await
            .map_err(|e| ApiError::ParseError(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn get_active_directory_config(&self) -> Result<ActiveDirectoryConfig, ApiError> {
        let resource = "authconfigs/activedirectory";
        let url = self.mgmt_url(resource);
        let resp = self.http.get(&url).bearer_auth(&self.token).send().await?;
        let resp = self.check_response(resource, resp).await?;
        resp.json()
            .await
            .map_err(|e| ApiError::ParseError(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn read_secret_value(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> Result<Option<String>, ApiError> {
        let resource = format!("api/v1/namespaces/{namespace}/secrets/{name}");
        let url = format!("{}/{resource}", self.server);
        let resp = self.http.get(&url).bearer_auth(&self.token).send().await?;

        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        let resp = self.check_response(&resource, resp).await?;
        let secret: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ApiError::ParseError(e.to_string()))?;

        // Secret data values are base64; the platform also serves a
        // stringData view on some endpoints, so accept both.
        if let Some(encoded) = secret["data"][key].as_str() {
            let decoded = BASE64_STANDARD
                .decode(encoded)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .ok_or_else(|| {
                    ApiError::ParseError(format!("secret key '{key}' is not valid base64"))
                })?;
            return Ok(Some(decoded));
        }
        if let Some(plain) = secret["stringData"][key].as_str() {
            return Ok(Some(plain.to_string()));
        }
        Ok(None)
    }
}

/// Resolve the service-account password, which may be stored as a
/// `namespace:name` secret reference. Falls back to the literal value when
/// the reference shape does not match or the secret cannot be read.
pub async fn resolve_service_account_password(
    api: &dyn ManagementApi,
    value: &str,
) -> String {
    let Some((namespace, name)) = value.split_once(':') else {
        return value.to_string();
    };
    match api
        .read_secret_value(namespace, name, "serviceaccountpassword")
        .await
    {
        Ok(Some(password)) => password,
        Ok(None) | Err(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_shapes() {
        let api = RestApi::new("https://mgmt.example.com/", "tok", None, false).unwrap();
        assert_eq!(
            api.mgmt_url("users"),
            "https://mgmt.example.com/apis/management.cattle.io/v3/users"
        );
        assert_eq!(
            api.mgmt_namespaced_url("p-xyz", "projectroletemplatebindings"),
            "https://mgmt.example.com/apis/management.cattle.io/v3/namespaces/p-xyz/projectroletemplatebindings"
        );
    }
}
