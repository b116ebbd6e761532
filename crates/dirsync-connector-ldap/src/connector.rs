//! LDAP directory client
//!
//! Implements the dirsync directory traits on top of `ldap3`.

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Mod, Scope, SearchEntry};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use dirsync_connector::entry::{AttributeValue, DirectoryEntry};
use dirsync_connector::error::{ConnectorError, ConnectorResult};
use dirsync_connector::filter::Filter;
use dirsync_connector::traits::{Connector, SourceDirectory, TargetDirectory};

use crate::config::LdapConfig;

/// LDAP result code: invalid credentials.
const RC_INVALID_CREDENTIALS: u32 = 49;

/// LDAP result code: no such object.
const RC_NO_SUCH_OBJECT: u32 = 32;

/// LDAP-backed directory usable as either side of a sync.
pub struct LdapDirectory {
    /// Configuration.
    config: LdapConfig,

    /// Display name for this instance.
    display_name: String,

    /// Cached LDAP connection (lazily initialized).
    connection: Arc<RwLock<Option<Ldap>>>,

    /// Whether the client has been disposed.
    disposed: Arc<RwLock<bool>>,
}

impl LdapDirectory {
    /// Create a new client with the given configuration.
    ///
    /// No connection is made until the first operation.
    pub fn new(config: LdapConfig) -> ConnectorResult<Self> {
        config.validate()?;

        let display_name = format!("LDAP: {}", config.host);

        Ok(Self {
            config,
            display_name,
            connection: Arc::new(RwLock::new(None)),
            disposed: Arc::new(RwLock::new(false)),
        })
    }

    /// Replace the display name used in logs.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// The configured base DN.
    pub fn base_dn(&self) -> &str {
        &self.config.base_dn
    }

    /// Get an LDAP connection, creating one if necessary.
    async fn get_connection(&self) -> ConnectorResult<Ldap> {
        if *self.disposed.read().await {
            return Err(ConnectorError::Disposed);
        }

        {
            let conn_guard = self.connection.read().await;
            if let Some(ref conn) = *conn_guard {
                return Ok(conn.clone());
            }
        }

        let conn = self.create_connection().await?;

        {
            let mut conn_guard = self.connection.write().await;
            *conn_guard = Some(conn.clone());
        }

        Ok(conn)
    }

    /// Forget the cached connection so the next operation reconnects.
    async fn reset_connection(&self) {
        let mut conn_guard = self.connection.write().await;
        if conn_guard.take().is_some() {
            debug!(directory = %self.display_name, "Dropped cached LDAP connection");
        }
    }

    /// Open a connection and bind with the configured credentials.
    async fn create_connection(&self) -> ConnectorResult<Ldap> {
        let url = self.config.url();

        debug!(url = %url, "Connecting to LDAP server");

        let settings = LdapConnSettings::new()
            .set_conn_timeout(std::time::Duration::from_secs(
                self.config.connection_timeout_secs,
            ))
            .set_starttls(self.config.use_starttls);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| {
                ConnectorError::connection_failed_with_source(
                    format!("Failed to connect to LDAP server at {}", url),
                    e,
                )
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        let bind_dn = &self.config.bind_dn;
        let bind_password = self.config.bind_password.as_deref().unwrap_or("");

        debug!(bind_dn = %bind_dn, "Performing LDAP bind");

        let result = ldap
            .simple_bind(bind_dn, bind_password)
            .await
            .map_err(|e| {
                ConnectorError::connection_failed_with_source(
                    format!("LDAP bind failed for {}", bind_dn),
                    e,
                )
            })?;

        if result.rc != 0 {
            if result.rc == RC_INVALID_CREDENTIALS {
                return Err(ConnectorError::AuthenticationFailed);
            }
            return Err(ConnectorError::connection_failed(format!(
                "LDAP bind failed with code {}: {}",
                result.rc, result.text
            )));
        }

        info!(host = %self.config.host, "LDAP connection established");

        Ok(ldap)
    }

    /// Run a subtree search under the base DN returning all user attributes.
    async fn search_raw(&self, filter: &str) -> ConnectorResult<Vec<DirectoryEntry>> {
        let mut ldap = self.get_connection().await?;

        let result = match ldap
            .search(&self.config.base_dn, Scope::Subtree, filter, vec!["*"])
            .await
        {
            Ok(result) => result,
            Err(e) => {
                self.reset_connection().await;
                return Err(ConnectorError::connection_failed_with_source(
                    "LDAP search failed",
                    e,
                ));
            }
        };

        let (entries, _) = result.success().map_err(|e| {
            ConnectorError::operation_failed_with_source("LDAP search failed", e)
        })?;

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(search_entry_to_directory_entry)
            .collect())
    }
}

/// Convert an LDAP search entry into a `DirectoryEntry`.
///
/// One value becomes `Single`, several become `Multi` in server order.
/// Binary attribute values are carried base64-encoded.
pub(crate) fn search_entry_to_directory_entry(entry: SearchEntry) -> DirectoryEntry {
    let mut converted = DirectoryEntry::new(entry.dn);

    for (name, values) in entry.attrs {
        if let Some(value) = values_to_attribute(values) {
            converted.set(name, value);
        }
    }

    for (name, values) in entry.bin_attrs {
        let encoded: Vec<String> = values
            .iter()
            .map(|v| base64::Engine::encode(&base64::engine::general_purpose::STANDARD, v))
            .collect();
        if let Some(value) = values_to_attribute(encoded) {
            converted.set(name, value);
        }
    }

    converted
}

fn values_to_attribute(mut values: Vec<String>) -> Option<AttributeValue> {
    match values.len() {
        0 => None,
        1 => values.pop().map(AttributeValue::Single),
        _ => Some(AttributeValue::Multi(values)),
    }
}

#[async_trait]
impl Connector for LdapDirectory {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    #[instrument(skip(self), fields(directory = %self.display_name))]
    async fn test_connection(&self) -> ConnectorResult<()> {
        let mut ldap = self.get_connection().await?;

        let result = ldap
            .search(
                &self.config.base_dn,
                Scope::Base,
                "(objectClass=*)",
                vec!["dn"],
            )
            .await
            .map_err(|e| ConnectorError::connection_failed_with_source("Test search failed", e))?;

        let (entries, _res) = result.success().map_err(|e| {
            ConnectorError::connection_failed(format!("Test search failed: {:?}", e))
        })?;

        if entries.is_empty() {
            return Err(ConnectorError::connection_failed(format!(
                "Base DN '{}' not found or not accessible",
                self.config.base_dn
            )));
        }

        info!("LDAP connection test successful");
        Ok(())
    }

    async fn dispose(&self) -> ConnectorResult<()> {
        *self.disposed.write().await = true;

        let mut conn_guard = self.connection.write().await;
        if let Some(mut ldap) = conn_guard.take() {
            if let Err(e) = ldap.unbind().await {
                warn!(error = %e, "Error during LDAP unbind");
            }
        }

        info!(directory = %self.display_name, "LDAP client disposed");
        Ok(())
    }
}

#[async_trait]
impl SourceDirectory for LdapDirectory {
    #[instrument(skip(self), fields(directory = %self.display_name))]
    async fn search_entries(&self, filter: &Filter) -> ConnectorResult<Vec<DirectoryEntry>> {
        let ldap_filter = filter.to_ldap();

        debug!(
            filter = %ldap_filter,
            base_dn = %self.config.base_dn,
            "Searching LDAP"
        );

        let entries = self.search_raw(&ldap_filter).await?;

        debug!(total_found = entries.len(), "LDAP search completed");

        Ok(entries)
    }
}

#[async_trait]
impl TargetDirectory for LdapDirectory {
    #[instrument(skip(self), fields(directory = %self.display_name))]
    async fn find_one(&self, filter: &Filter) -> ConnectorResult<Option<DirectoryEntry>> {
        let ldap_filter = filter.to_ldap();
        let entries = self.search_raw(&ldap_filter).await?;

        debug!(filter = %ldap_filter, matches = entries.len(), "LDAP lookup completed");

        Ok(entries.into_iter().next())
    }

    #[instrument(skip(self, values), fields(directory = %self.display_name))]
    async fn replace_attribute(
        &self,
        dn: &str,
        attribute: &str,
        values: Vec<String>,
    ) -> ConnectorResult<()> {
        let mut ldap = self.get_connection().await?;

        let values: HashSet<String> = values.into_iter().collect();
        let mods = vec![Mod::Replace(attribute.to_string(), values)];

        let result = match ldap.modify(dn, mods).await {
            Ok(result) => result,
            Err(e) => {
                self.reset_connection().await;
                return Err(ConnectorError::operation_failed_with_source(
                    format!("Failed to update entry: {}", dn),
                    e,
                ));
            }
        };

        if result.rc == RC_NO_SUCH_OBJECT {
            return Err(ConnectorError::ObjectNotFound {
                identifier: dn.to_string(),
            });
        }

        if result.rc != 0 {
            return Err(ConnectorError::operation_failed(format!(
                "LDAP modify failed with code {}: {}",
                result.rc, result.text
            )));
        }

        info!(dn = %dn, attribute = %attribute, "LDAP attribute replaced");

        Ok(())
    }
}

impl std::fmt::Debug for LdapDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapDirectory")
            .field("display_name", &self.display_name)
            .field("config", &self.config.redacted())
            .finish()
    }
}
