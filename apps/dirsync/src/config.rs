//! Daemon configuration loaded from the environment.

use std::env::VarError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use dirsync_connector::filter::Filter;
use dirsync_connector_ldap::LdapConfig;
use dirsync_engine::classify::ClassificationMode;
use dirsync_engine::config::{SyncConfig, DEFAULT_SEARCH_FILTER};
use dirsync_engine::diff::ObservableAttributes;
use dirsync_engine::filter::{IgnoreList, DEFAULT_PASSWORD_ATTRIBUTE};
use dirsync_engine::handlers::EmailAttributes;
use dirsync_engine::notify::{SmtpSettings, DEFAULT_SMTP_PORT};

const DEFAULT_STATE_PATH: &str = "entries-state.json";
const DEFAULT_PROVISION_PROGRAM: &str = "bash";
const DEFAULT_PROVISION_SCRIPT: &str = "create_mail_user_OpenLDAP.sh";
const DEFAULT_PROVISION_WORKDIR: &str = "tools";

/// Variable names of earlier deployments, read when the current name is
/// unset.
const LEGACY_NAMES: &[(&str, &str)] = &[
    ("SOURCE_LDAP_HOST", "MAIN_LDAP_SERVER"),
    ("SOURCE_LDAP_BASE_DN", "MAIN_LDAP_BASE_DN"),
    ("SOURCE_LDAP_BIND_DN", "MAIN_LDAP_BIND_DN"),
    ("SOURCE_LDAP_BIND_PASSWORD", "MAIN_LDAP_BIND_PASSWORD"),
    ("SOURCE_LDAP_FILTER", "MAIN_LDAP_FILTER"),
    ("TARGET_LDAP_HOST", "IREDMAIL_LDAP_SERVER"),
    ("TARGET_LDAP_BASE_DN", "IREDMAIL_LDAP_BASE_DN"),
    ("TARGET_LDAP_BIND_DN", "IREDMAIL_LDAP_BIND_DN"),
    ("TARGET_LDAP_BIND_PASSWORD", "IREDMAIL_LDAP_BIND_PASSWORD"),
    ("SYNC_IGNORE_USERS", "LDAP_IGNORE_USERS"),
    ("SYNC_MUST_HAVE_PASSWORD", "LDAP_MUST_HAVE_PASSWORD"),
];

/// Everything the daemon needs to start.
#[derive(Debug, Clone)]
pub struct DirsyncConfig {
    /// Observed directory.
    pub source: LdapConfig,
    /// Reconciled directory.
    pub target: LdapConfig,
    /// Poll loop and handler settings.
    pub sync: SyncConfig,
    /// JSON file holding the last snapshot hash.
    pub state_path: PathBuf,
    /// Interpreter for the provisioning script.
    pub provision_program: String,
    /// Provisioning script, relative to `provision_workdir`.
    pub provision_script: String,
    /// Working directory of the provisioning script.
    pub provision_workdir: PathBuf,
    /// Operator notification channels.
    pub notify: NotifyConfig,
}

impl DirsyncConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    ///
    /// This allows tests to supply variables without mutating process-global
    /// environment state.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let source = ldap_config(&reader, "SOURCE_LDAP", None)?;
        let target = ldap_config(&reader, "TARGET_LDAP", Some(&source))?;

        let search_filter = Filter::raw(optional(&reader, "SOURCE_LDAP_FILTER").unwrap_or_else(
            || DEFAULT_SEARCH_FILTER.to_string(),
        ));

        let ignore_list = optional(&reader, "SYNC_IGNORE_USERS")
            .map(|csv| IgnoreList::parse(&csv))
            .unwrap_or_default();

        let observable_attributes = optional(&reader, "SYNC_OBSERVABLE_ATTRIBUTES")
            .map(|csv| ObservableAttributes::parse(&csv))
            .unwrap_or_default();

        let email_attributes = optional(&reader, "SYNC_EMAIL_ATTRIBUTES")
            .map(|csv| EmailAttributes::parse(&csv))
            .unwrap_or_default();

        let sync = SyncConfig {
            search_filter,
            ignore_list,
            require_password: parse_or(&reader, "SYNC_MUST_HAVE_PASSWORD", false)?,
            password_attribute: optional(&reader, "SYNC_PASSWORD_ATTRIBUTE")
                .unwrap_or_else(|| DEFAULT_PASSWORD_ATTRIBUTE.to_string()),
            observable_attributes,
            email_attributes,
            classification: parse_or(
                &reader,
                "SYNC_CLASSIFICATION",
                ClassificationMode::default(),
            )?,
            poll_interval: Duration::from_secs(parse_or(&reader, "SYNC_POLL_INTERVAL_SECS", 5)?),
            retry_interval: Duration::from_secs(parse_or(&reader, "SYNC_RETRY_INTERVAL_SECS", 5)?),
        };

        sync.validate()
            .map_err(|e| ConfigError::Rejected(e.to_string()))?;

        Ok(Self {
            source,
            target,
            sync,
            state_path: optional(&reader, "SYNC_STATE_PATH")
                .unwrap_or_else(|| DEFAULT_STATE_PATH.to_string())
                .into(),
            provision_program: optional(&reader, "PROVISION_PROGRAM")
                .unwrap_or_else(|| DEFAULT_PROVISION_PROGRAM.to_string()),
            provision_script: optional(&reader, "PROVISION_SCRIPT")
                .unwrap_or_else(|| DEFAULT_PROVISION_SCRIPT.to_string()),
            provision_workdir: optional(&reader, "PROVISION_WORKDIR")
                .unwrap_or_else(|| DEFAULT_PROVISION_WORKDIR.to_string())
                .into(),
            notify: NotifyConfig::from_reader(&reader)?,
        })
    }
}

/// Where operator notifications go.
///
/// SMTP wins over the webhook; with neither set notifications are only
/// logged.
#[derive(Debug, Clone, Default)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
    pub smtp: Option<SmtpSettings>,
}

impl NotifyConfig {
    /// Load notification settings from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load notification settings from a custom variable reader.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        Ok(Self {
            webhook_url: optional(&reader, "NOTIFY_WEBHOOK_URL"),
            smtp: smtp_settings(&reader)?,
        })
    }
}

/// Read `SMTP_*`; `None` unless `SMTP_HOST` is set.
fn smtp_settings<F>(reader: &F) -> Result<Option<SmtpSettings>, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let Some(host) = optional(reader, "SMTP_HOST") else {
        return Ok(None);
    };

    let username = optional(reader, "SMTP_USER");
    let password = optional(reader, "SMTP_PASSWORD");
    let from = optional(reader, "SMTP_FROM")
        .or_else(|| username.clone())
        .ok_or_else(|| ConfigError::MissingVar("SMTP_FROM".to_string()))?;

    let to: Vec<String> = required(reader, "SMTP_TO")?
        .split(',')
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .map(str::to_string)
        .collect();
    if to.is_empty() {
        return Err(ConfigError::MissingVar("SMTP_TO".to_string()));
    }

    let mut settings = SmtpSettings::new(host, from, to)
        .with_port(parse_or(reader, "SMTP_PORT", DEFAULT_SMTP_PORT)?);
    match (username, password) {
        (Some(username), Some(password)) => {
            settings = settings.with_credentials(username, password);
        }
        (Some(_), None) => return Err(ConfigError::MissingVar("SMTP_PASSWORD".to_string())),
        (None, Some(_)) => return Err(ConfigError::MissingVar("SMTP_USER".to_string())),
        (None, None) => {}
    }

    Ok(Some(settings))
}

/// Read `<prefix>_*` connection settings.
///
/// Port and SSL fall back to `defaults` (the source settings) when given.
fn ldap_config<F>(
    reader: &F,
    prefix: &str,
    defaults: Option<&LdapConfig>,
) -> Result<LdapConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let (host, host_port) = split_host_port(&required(reader, &format!("{prefix}_HOST"))?);
    let base_dn = required(reader, &format!("{prefix}_BASE_DN"))?;
    let bind_dn = required(reader, &format!("{prefix}_BIND_DN"))?;
    let bind_password = required(reader, &format!("{prefix}_BIND_PASSWORD"))?;

    let mut config = LdapConfig::new(host, base_dn, bind_dn).with_password(bind_password);

    let use_ssl = parse_or(
        reader,
        &format!("{prefix}_SSL"),
        defaults.is_some_and(|d| d.use_ssl),
    )?;
    if use_ssl {
        config = config.with_ssl();
    }

    let port_var = format!("{prefix}_PORT");
    match optional(reader, &port_var) {
        Some(port) => {
            let port = port
                .parse::<u16>()
                .map_err(|e| ConfigError::InvalidValue(port_var.clone(), e.to_string()))?;
            config = config.with_port(port);
        }
        None => {
            if let Some(port) = host_port {
                config = config.with_port(port);
            } else if let Some(defaults) = defaults.filter(|d| d.use_ssl == use_ssl) {
                config = config.with_port(defaults.port);
            }
        }
    }

    config
        .validate()
        .map_err(|e| ConfigError::Rejected(format!("{prefix}: {e}")))?;

    Ok(config)
}

/// Split `host:port`; anything else is returned as the host.
fn split_host_port(value: &str) -> (String, Option<u16>) {
    if let Some((host, port)) = value.rsplit_once(':') {
        if !host.is_empty() && !host.contains(':') {
            if let Ok(port) = port.parse::<u16>() {
                return (host.to_string(), Some(port));
            }
        }
    }
    (value.to_string(), None)
}

/// A set, non-blank variable, falling back to its legacy name.
fn optional<F>(reader: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let read = |name: &str| reader(name).ok().filter(|v| !v.trim().is_empty());

    read(key).or_else(|| {
        LEGACY_NAMES
            .iter()
            .find(|(current, _)| *current == key)
            .and_then(|(_, legacy)| read(legacy))
    })
}

fn required<F>(reader: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    optional(reader, key).ok_or_else(|| ConfigError::MissingVar(key.to_string()))
}

/// Parse a variable, or use `default` when it is unset.
fn parse_or<F, T>(reader: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(reader, key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("invalid configuration: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Create a reader closure from a HashMap (no global env mutation).
    fn make_reader(vars: HashMap<&str, &str>) -> impl Fn(&str) -> Result<String, VarError> {
        let owned: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| owned.get(key).cloned().ok_or(VarError::NotPresent)
    }

    fn required_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("SOURCE_LDAP_HOST", "ad.corp.example.com"),
            ("SOURCE_LDAP_BASE_DN", "ou=people,dc=corp,dc=example,dc=com"),
            ("SOURCE_LDAP_BIND_DN", "cn=reader,dc=corp,dc=example,dc=com"),
            ("SOURCE_LDAP_BIND_PASSWORD", "source-secret"),
            ("TARGET_LDAP_HOST", "mail.example.com"),
            ("TARGET_LDAP_BASE_DN", "o=domains,dc=mail"),
            ("TARGET_LDAP_BIND_DN", "cn=vmailadmin,dc=mail"),
            ("TARGET_LDAP_BIND_PASSWORD", "target-secret"),
        ])
    }

    #[test]
    fn test_missing_source_host() {
        let mut vars = required_vars();
        vars.remove("SOURCE_LDAP_HOST");

        let err = DirsyncConfig::from_reader(make_reader(vars)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(_)));
        assert!(err.to_string().contains("SOURCE_LDAP_HOST"));
    }

    #[test]
    fn test_blank_password_counts_as_missing() {
        let mut vars = required_vars();
        vars.insert("TARGET_LDAP_BIND_PASSWORD", "  ");

        let err = DirsyncConfig::from_reader(make_reader(vars)).unwrap_err();
        assert!(err.to_string().contains("TARGET_LDAP_BIND_PASSWORD"));
    }

    #[test]
    fn test_defaults() {
        let config = DirsyncConfig::from_reader(make_reader(required_vars()))
            .expect("should succeed with defaults");

        assert_eq!(config.source.port, 389);
        assert!(!config.source.use_ssl);
        assert_eq!(config.source.bind_password.as_deref(), Some("source-secret"));
        assert_eq!(config.target.url(), "ldap://mail.example.com:389");
        assert_eq!(config.sync.search_filter.to_ldap(), DEFAULT_SEARCH_FILTER);
        assert!(config.sync.ignore_list.is_empty());
        assert!(!config.sync.require_password);
        assert_eq!(config.sync.password_attribute, "userPassword");
        assert_eq!(config.sync.classification, ClassificationMode::Cardinality);
        assert_eq!(config.sync.poll_interval, Duration::from_secs(5));
        assert_eq!(config.sync.retry_interval, Duration::from_secs(5));
        assert_eq!(config.state_path, PathBuf::from("entries-state.json"));
        assert_eq!(config.provision_program, "bash");
        assert_eq!(config.provision_script, "create_mail_user_OpenLDAP.sh");
        assert_eq!(config.provision_workdir, PathBuf::from("tools"));
        assert!(config.notify.webhook_url.is_none());
        assert!(config.notify.smtp.is_none());
    }

    #[test]
    fn test_custom_values() {
        let mut vars = required_vars();
        vars.extend([
            ("SOURCE_LDAP_FILTER", "(objectClass=inetOrgPerson)"),
            ("SYNC_IGNORE_USERS", "svc@x.com, admin@x.com"),
            ("SYNC_MUST_HAVE_PASSWORD", "true"),
            ("SYNC_CLASSIFICATION", "full_diff"),
            ("SYNC_POLL_INTERVAL_SECS", "30"),
            ("SYNC_RETRY_INTERVAL_SECS", "10"),
            ("SYNC_OBSERVABLE_ATTRIBUTES", "cn,title"),
            ("SYNC_EMAIL_ATTRIBUTES", "proxyAddress"),
            ("SYNC_STATE_PATH", "/var/lib/dirsync/state.json"),
            ("NOTIFY_WEBHOOK_URL", "https://hooks.example.com/dirsync"),
        ]);

        let config = DirsyncConfig::from_reader(make_reader(vars)).unwrap();
        assert_eq!(
            config.sync.search_filter.to_ldap(),
            "(objectClass=inetOrgPerson)"
        );
        assert_eq!(
            config.sync.ignore_list.tokens(),
            &["svc@x.com", "admin@x.com"]
        );
        assert!(config.sync.require_password);
        assert_eq!(config.sync.classification, ClassificationMode::FullDiff);
        assert_eq!(config.sync.poll_interval, Duration::from_secs(30));
        assert_eq!(config.sync.retry_interval, Duration::from_secs(10));
        assert_eq!(config.sync.observable_attributes.names(), &["cn", "title"]);
        assert_eq!(config.sync.email_attributes.names(), &["proxyAddress"]);
        assert_eq!(
            config.state_path,
            PathBuf::from("/var/lib/dirsync/state.json")
        );
        assert_eq!(
            config.notify.webhook_url.as_deref(),
            Some("https://hooks.example.com/dirsync")
        );
    }

    #[test]
    fn test_ssl_switches_port_and_target_inherits() {
        let mut vars = required_vars();
        vars.insert("SOURCE_LDAP_SSL", "true");

        let config = DirsyncConfig::from_reader(make_reader(vars)).unwrap();
        assert!(config.source.use_ssl);
        assert_eq!(config.source.port, 636);
        assert!(config.target.use_ssl);
        assert_eq!(config.target.port, 636);
    }

    #[test]
    fn test_target_inherits_source_port() {
        let mut vars = required_vars();
        vars.insert("SOURCE_LDAP_PORT", "10389");

        let config = DirsyncConfig::from_reader(make_reader(vars)).unwrap();
        assert_eq!(config.source.port, 10389);
        assert_eq!(config.target.port, 10389);
    }

    #[test]
    fn test_target_overrides() {
        let mut vars = required_vars();
        vars.extend([
            ("SOURCE_LDAP_SSL", "true"),
            ("TARGET_LDAP_SSL", "false"),
            ("TARGET_LDAP_PORT", "1389"),
        ]);

        let config = DirsyncConfig::from_reader(make_reader(vars)).unwrap();
        assert_eq!(config.source.port, 636);
        assert!(!config.target.use_ssl);
        assert_eq!(config.target.port, 1389);
    }

    #[test]
    fn test_invalid_port() {
        let mut vars = required_vars();
        vars.insert("SOURCE_LDAP_PORT", "not-a-port");

        let err = DirsyncConfig::from_reader(make_reader(vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(..)));
        assert!(err.to_string().contains("SOURCE_LDAP_PORT"));
    }

    #[test]
    fn test_invalid_bool() {
        let mut vars = required_vars();
        vars.insert("SYNC_MUST_HAVE_PASSWORD", "yes please");

        let err = DirsyncConfig::from_reader(make_reader(vars)).unwrap_err();
        assert!(err.to_string().contains("SYNC_MUST_HAVE_PASSWORD"));
    }

    #[test]
    fn test_invalid_classification() {
        let mut vars = required_vars();
        vars.insert("SYNC_CLASSIFICATION", "by-magic");

        let err = DirsyncConfig::from_reader(make_reader(vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(..)));
        assert!(err.to_string().contains("SYNC_CLASSIFICATION"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut vars = required_vars();
        vars.insert("SYNC_POLL_INTERVAL_SECS", "0");

        let err = DirsyncConfig::from_reader(make_reader(vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Rejected(_)));
    }

    #[test]
    fn test_debug_redacts_passwords() {
        let config = DirsyncConfig::from_reader(make_reader(required_vars())).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("source-secret"));
        assert!(!debug.contains("target-secret"));
    }

    #[test]
    fn test_legacy_variable_names() {
        let vars = HashMap::from([
            ("MAIN_LDAP_SERVER", "ad.corp.example.com"),
            ("MAIN_LDAP_BASE_DN", "ou=people,dc=corp"),
            ("MAIN_LDAP_BIND_DN", "cn=reader,dc=corp"),
            ("MAIN_LDAP_BIND_PASSWORD", "source-secret"),
            ("MAIN_LDAP_FILTER", "(objectClass=*)"),
            ("IREDMAIL_LDAP_SERVER", "mail.example.com"),
            ("IREDMAIL_LDAP_BASE_DN", "o=domains,dc=mail"),
            ("IREDMAIL_LDAP_BIND_DN", "cn=vmailadmin,dc=mail"),
            ("IREDMAIL_LDAP_BIND_PASSWORD", "target-secret"),
            ("LDAP_IGNORE_USERS", "svc@x.com"),
            ("LDAP_MUST_HAVE_PASSWORD", "true"),
        ]);

        let config = DirsyncConfig::from_reader(make_reader(vars)).unwrap();
        assert_eq!(config.source.url(), "ldap://ad.corp.example.com:389");
        assert_eq!(config.source.base_dn, "ou=people,dc=corp");
        assert_eq!(config.source.bind_password.as_deref(), Some("source-secret"));
        assert_eq!(config.target.url(), "ldap://mail.example.com:389");
        assert_eq!(config.target.bind_dn, "cn=vmailadmin,dc=mail");
        assert_eq!(config.sync.search_filter.to_ldap(), "(objectClass=*)");
        assert_eq!(config.sync.ignore_list.tokens(), &["svc@x.com"]);
        assert!(config.sync.require_password);
    }

    #[test]
    fn test_current_name_wins_over_legacy_name() {
        let mut vars = required_vars();
        vars.insert("MAIN_LDAP_SERVER", "old.example.com");
        vars.insert("LDAP_MUST_HAVE_PASSWORD", "true");

        let config = DirsyncConfig::from_reader(make_reader(vars)).unwrap();
        assert_eq!(config.source.url(), "ldap://ad.corp.example.com:389");
        assert!(!config.sync.require_password);
    }

    #[test]
    fn test_missing_var_names_current_variable() {
        let mut vars = required_vars();
        vars.remove("TARGET_LDAP_BIND_DN");

        let err = DirsyncConfig::from_reader(make_reader(vars)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required environment variable: TARGET_LDAP_BIND_DN"
        );
    }

    #[test]
    fn test_host_with_port() {
        let mut vars = required_vars();
        vars.insert("SOURCE_LDAP_HOST", "ad.corp.example.com:3268");
        vars.insert("TARGET_LDAP_HOST", "mail.example.com:1389");

        let config = DirsyncConfig::from_reader(make_reader(vars)).unwrap();
        assert_eq!(config.source.url(), "ldap://ad.corp.example.com:3268");
        assert_eq!(config.target.url(), "ldap://mail.example.com:1389");
    }

    #[test]
    fn test_explicit_port_wins_over_host_port() {
        let mut vars = required_vars();
        vars.insert("SOURCE_LDAP_HOST", "ad.corp.example.com:3268");
        vars.insert("SOURCE_LDAP_PORT", "389");

        let config = DirsyncConfig::from_reader(make_reader(vars)).unwrap();
        assert_eq!(config.source.url(), "ldap://ad.corp.example.com:389");
    }

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("ldap.x.com"), ("ldap.x.com".to_string(), None));
        assert_eq!(
            split_host_port("ldap.x.com:636"),
            ("ldap.x.com".to_string(), Some(636))
        );
        assert_eq!(
            split_host_port("ldap.x.com:ldaps"),
            ("ldap.x.com:ldaps".to_string(), None)
        );
        assert_eq!(split_host_port("::1"), ("::1".to_string(), None));
    }

    #[test]
    fn test_smtp_settings() {
        let mut vars = required_vars();
        vars.extend([
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_USER", "mailer@example.com"),
            ("SMTP_PASSWORD", "smtp-secret"),
            ("SMTP_TO", "ops@example.com, admin@example.com"),
        ]);

        let config = DirsyncConfig::from_reader(make_reader(vars)).unwrap();
        let smtp = config.notify.smtp.expect("SMTP configured");
        assert_eq!(smtp.host, "smtp.example.com");
        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.username.as_deref(), Some("mailer@example.com"));
        assert_eq!(smtp.password.as_deref(), Some("smtp-secret"));
        assert_eq!(smtp.from, "mailer@example.com");
        assert_eq!(smtp.to, vec!["ops@example.com", "admin@example.com"]);
        assert!(!format!("{smtp:?}").contains("smtp-secret"));
    }

    #[test]
    fn test_smtp_custom_port_and_sender() {
        let vars = HashMap::from([
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "25"),
            ("SMTP_FROM", "Sync <sync@example.com>"),
            ("SMTP_TO", "ops@example.com"),
        ]);

        let notify = NotifyConfig::from_reader(make_reader(vars)).unwrap();
        let smtp = notify.smtp.unwrap();
        assert_eq!(smtp.port, 25);
        assert_eq!(smtp.from, "Sync <sync@example.com>");
        assert!(smtp.username.is_none());
    }

    #[test]
    fn test_smtp_requires_recipients_and_sender() {
        let vars = HashMap::from([
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_FROM", "sync@example.com"),
        ]);
        let err = NotifyConfig::from_reader(make_reader(vars)).unwrap_err();
        assert!(err.to_string().contains("SMTP_TO"));

        let vars = HashMap::from([("SMTP_HOST", "smtp.example.com"), ("SMTP_TO", "ops@x.com")]);
        let err = NotifyConfig::from_reader(make_reader(vars)).unwrap_err();
        assert!(err.to_string().contains("SMTP_FROM"));

        let vars = HashMap::from([
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_USER", "mailer@example.com"),
            ("SMTP_TO", "ops@x.com"),
        ]);
        let err = NotifyConfig::from_reader(make_reader(vars)).unwrap_err();
        assert!(err.to_string().contains("SMTP_PASSWORD"));
    }

    #[test]
    fn test_smtp_ignored_without_host() {
        let vars = HashMap::from([("SMTP_TO", "ops@x.com"), ("SMTP_PORT", "not-a-port")]);
        let notify = NotifyConfig::from_reader(make_reader(vars)).unwrap();
        assert!(notify.smtp.is_none());
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingVar("FOO".into());
        assert_eq!(
            err.to_string(),
            "missing required environment variable: FOO"
        );

        let err = ConfigError::InvalidValue("BAR".into(), "bad".into());
        assert_eq!(err.to_string(), "invalid value for BAR: bad");
    }
}
