//! Directory (LDAP) client and lookups.
//!
//! Connection parameters come from the platform's `activedirectory`
//! auth-config record ([`LdapSettings::from_config`]); the service-account
//! password may itself be a secret reference, resolved by the caller before
//! the settings are built.
//!
//! [`DirectoryLookup`] is the seam the migration core uses: two fixed search
//! shapes, a base-object search resolving a DN to its objectGUID and a
//! whole-subtree search resolving an objectGUID back to its DN.

use std::time::Duration;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use tracing::{debug, info, warn};

use crate::errors::{ConfigError, LookupError};
use crate::guid::Guid;
use crate::models::ActiveDirectoryConfig;
use crate::principal::OBJECT_GUID_ATTRIBUTE;

const MEMBER_OF_ATTRIBUTE: &str = "memberOf";
const OBJECT_CLASS_ATTRIBUTE: &str = "objectClass";

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Directory connection settings derived from the auth-config record.
#[derive(Debug, Clone)]
pub struct LdapSettings {
    pub servers: Vec<String>,
    pub port: u16,
    pub tls: bool,
    pub start_tls: bool,
    pub connection_timeout: Duration,
    /// Extra PEM trust anchors from the auth config, if any.
    pub certificate: Option<String>,
    pub service_account_name: String,
    pub service_account_password: String,
    pub default_login_domain: String,
}

impl LdapSettings {
    /// Build settings from the auth-config record and the already-resolved
    /// service-account password.
    pub fn from_config(
        config: &ActiveDirectoryConfig,
        service_account_password: String,
    ) -> Result<Self, ConfigError> {
        if config.servers.is_empty() {
            return Err(ConfigError::InvalidDirectorySettings(
                "no directory servers configured".into(),
            ));
        }

        let certificate = if config.certificate.is_empty() {
            None
        } else {
            // Fail early on an unusable bundle rather than at connect time.
            native_tls::Certificate::from_pem(config.certificate.as_bytes()).map_err(|e| {
                ConfigError::InvalidDirectorySettings(format!("bad CA certificate: {e}"))
            })?;
            Some(config.certificate.clone())
        };

        Ok(Self {
            servers: config.servers.clone(),
            port: config.port,
            tls: config.tls,
            start_tls: config.start_tls,
            connection_timeout: Duration::from_millis(config.connection_timeout),
            certificate,
            service_account_name: config.service_account_username.clone(),
            service_account_password,
            default_login_domain: config.default_login_domain.clone(),
        })
    }

    /// The bind account: `DOMAIN\name` when the configured name carries no
    /// domain part and a default login domain is set.
    fn bind_account(&self) -> String {
        let name = &self.service_account_name;
        if name.contains('\\') || name.contains('@') || self.default_login_domain.is_empty() {
            name.clone()
        } else {
            format!("{}\\{}", self.default_login_domain, name)
        }
    }

    fn conn_settings(&self) -> Result<LdapConnSettings, LookupError> {
        let mut settings = LdapConnSettings::new()
            .set_conn_timeout(self.connection_timeout)
            .set_starttls(self.start_tls);

        if let Some(ref pem) = self.certificate {
            let cert = native_tls::Certificate::from_pem(pem.as_bytes())
                .map_err(|e| LookupError::ConnectionFailed(format!("bad CA certificate: {e}")))?;
            let connector = native_tls::TlsConnector::builder()
                .add_root_certificate(cert)
                .build()
                .map_err(|e| LookupError::ConnectionFailed(format!("TLS setup failed: {e}")))?;
            settings = settings.set_connector(connector);
        }

        Ok(settings)
    }

    /// Connect to the first reachable server and bind the service account.
    pub async fn connect(&self) -> Result<Ldap, LookupError> {
        let scheme = if self.tls { "ldaps" } else { "ldap" };
        let mut last_err: Option<LookupError> = None;

        for server in &self.servers {
            let url = format!("{scheme}://{server}:{}", self.port);
            debug!(url = %url, "connecting to directory server");

            let conn = LdapConnAsync::with_settings(self.conn_settings()?, &url).await;
            let (conn, mut ldap) = match conn {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(url = %url, error = %e, "directory server unreachable");
                    last_err = Some(LookupError::ConnectionFailed(format!("{url}: {e}")));
                    continue;
                }
            };
            ldap3::drive!(conn);

            let account = self.bind_account();
            ldap.simple_bind(&account, &self.service_account_password)
                .await?
                .success()
                .map_err(|e| {
                    LookupError::ConnectionFailed(format!("bind as '{account}' failed: {e}"))
                })?;

            info!(url = %url, account = %account, "directory bind succeeded");
            return Ok(ldap);
        }

        Err(last_err.unwrap_or_else(|| {
            LookupError::ConnectionFailed("no directory servers configured".into())
        }))
    }
}

// ---------------------------------------------------------------------------
// Lookup seam
// ---------------------------------------------------------------------------

/// Directory lookups used by the index build.
#[async_trait]
pub trait DirectoryLookup: Send {
    /// Resolve a DN to its objectGUID via a base-object search.
    async fn resolve_guid(&mut self, dn: &str) -> Result<Guid, LookupError>;

    /// Resolve an objectGUID to its DN via a whole-subtree search.
    async fn resolve_dn(&mut self, guid: &Guid) -> Result<String, LookupError>;
}

/// Production [`DirectoryLookup`] over a bound LDAP connection.
pub struct LdapDirectory {
    ldap: Ldap,
    user_object_class: String,
    user_search_base: String,
    attributes: Vec<String>,
}

impl LdapDirectory {
    pub fn new(ldap: Ldap, config: &ActiveDirectoryConfig) -> Self {
        Self {
            ldap,
            user_object_class: config.user_object_class.clone(),
            user_search_base: config.user_search_base.clone(),
            attributes: config.user_search_attributes(&[
                MEMBER_OF_ATTRIBUTE,
                OBJECT_CLASS_ATTRIBUTE,
                OBJECT_GUID_ATTRIBUTE,
            ]),
        }
    }
}

#[async_trait]
impl DirectoryLookup for LdapDirectory {
    async fn resolve_guid(&mut self, dn: &str) -> Result<Guid, LookupError> {
        let filter = format!("({OBJECT_CLASS_ATTRIBUTE}={})", self.user_object_class);
        debug!(dn, filter = %filter, "base-object search");

        let (entries, _res) = self
            .ldap
            .search(dn, Scope::Base, &filter, &self.attributes)
            .await?
            .success()?;

        let entry = entries.into_iter().next().ok_or_else(|| LookupError::NotFound {
            subject: dn.to_string(),
        })?;
        let entry = SearchEntry::construct(entry);

        let raw = entry
            .bin_attrs
            .get(OBJECT_GUID_ATTRIBUTE)
            .and_then(|values| values.first())
            .ok_or_else(|| LookupError::MissingGuid {
                dn: entry.dn.clone(),
            })?;

        Guid::new(raw)
    }

    async fn resolve_dn(&mut self, guid: &Guid) -> Result<String, LookupError> {
        let filter = format!(
            "(&({OBJECT_CLASS_ATTRIBUTE}={})({OBJECT_GUID_ATTRIBUTE}={}))",
            self.user_object_class,
            guid.escape()
        );
        debug!(guid = %guid, filter = %filter, "whole-subtree search");

        let (entries, _res) = self
            .ldap
            .search(
                &self.user_search_base,
                Scope::Subtree,
                &filter,
                &self.attributes,
            )
            .await?
            .success()?;

        let entry = entries.into_iter().next().ok_or_else(|| LookupError::NotFound {
            subject: guid.to_string(),
        })?;
        Ok(SearchEntry::construct(entry).dn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(name: &str, domain: &str) -> LdapSettings {
        LdapSettings {
            servers: vec!["ad.example.com".into()],
            port: 389,
            tls: false,
            start_tls: false,
            connection_timeout: Duration::from_secs(5),
            certificate: None,
            service_account_name: name.into(),
            service_account_password: "secret".into(),
            default_login_domain: domain.into(),
        }
    }

    #[test]
    fn test_bind_account_domain_prefix() {
        assert_eq!(settings("svc", "EXAMPLE").bind_account(), "EXAMPLE\\svc");
        assert_eq!(settings("svc", "").bind_account(), "svc");
        // Already qualified names are left alone.
        assert_eq!(
            settings("OTHER\\svc", "EXAMPLE").bind_account(),
            "OTHER\\svc"
        );
        assert_eq!(
            settings("svc@example.com", "EXAMPLE").bind_account(),
            "svc@example.com"
        );
    }

    #[test]
    fn test_from_config_requires_servers() {
        let config = ActiveDirectoryConfig::default();
        let err = LdapSettings::from_config(&config, "pw".into()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDirectorySettings(_)));
    }

    #[test]
    fn test_from_config_rejects_bad_certificate() {
        let config = ActiveDirectoryConfig {
            servers: vec!["ad.example.com".into()],
            certificate: "not a pem".into(),
            ..Default::default()
        };
        let err = LdapSettings::from_config(&config, "pw".into()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDirectorySettings(_)));
    }
}
