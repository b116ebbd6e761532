//! Shared mocks for engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use dirsync_connector::entry::DirectoryEntry;
use dirsync_connector::error::{ConnectorError, ConnectorResult};
use dirsync_connector::filter::Filter;
use dirsync_connector::traits::{Connector, SourceDirectory, TargetDirectory};
use dirsync_engine::notify::{Notification, NotificationSink};
use dirsync_engine::provision::{Provisioner, ProvisioningError};

/// Install a test-writer subscriber once per test binary.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dirsync_engine=debug")
        .with_test_writer()
        .try_init();
}

pub fn person(uid: &str, mail: &str) -> DirectoryEntry {
    DirectoryEntry::new(format!("uid={uid},ou=people,dc=x"))
        .with("uid", uid)
        .with("mail", mail)
        .with("cn", uid)
        .with("userPassword", format!("{{SSHA}}{uid}-secret"))
}

// =============================================================================
// Source directory
// =============================================================================

/// Source directory returning a settable snapshot.
pub struct MockSource {
    entries: Mutex<Vec<DirectoryEntry>>,
    fail_search: AtomicBool,
    search_calls: AtomicUsize,
    disposed: AtomicBool,
}

impl MockSource {
    pub fn new(entries: Vec<DirectoryEntry>) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(entries),
            fail_search: AtomicBool::new(false),
            search_calls: AtomicUsize::new(0),
            disposed: AtomicBool::new(false),
        })
    }

    pub fn set_entries(&self, entries: Vec<DirectoryEntry>) {
        *self.entries.lock().unwrap() = entries;
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_search.store(failing, Ordering::SeqCst);
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockSource {
    fn display_name(&self) -> &str {
        "mock-source"
    }

    async fn test_connection(&self) -> ConnectorResult<()> {
        Ok(())
    }

    async fn dispose(&self) -> ConnectorResult<()> {
        self.disposed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl SourceDirectory for MockSource {
    async fn search_entries(&self, _filter: &Filter) -> ConnectorResult<Vec<DirectoryEntry>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(ConnectorError::connection_failed("source unreachable"));
        }
        Ok(self.entries.lock().unwrap().clone())
    }
}

// =============================================================================
// Target directory
// =============================================================================

/// One recorded attribute replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub dn: String,
    pub attribute: String,
    pub values: Vec<String>,
}

/// In-memory target resolving equality filters against stored entries.
pub struct MockTarget {
    entries: Mutex<Vec<DirectoryEntry>>,
    replacements: Mutex<Vec<Replacement>>,
    failing_lookups: Mutex<HashSet<String>>,
    failing_attributes: Mutex<HashSet<String>>,
    lookup_calls: AtomicUsize,
}

impl MockTarget {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(Vec::new()),
            replacements: Mutex::new(Vec::new()),
            failing_lookups: Mutex::new(HashSet::new()),
            failing_attributes: Mutex::new(HashSet::new()),
            lookup_calls: AtomicUsize::new(0),
        })
    }

    /// Add a hosted domain object.
    pub fn with_domain(self: Arc<Self>, domain: &str) -> Arc<Self> {
        self.add(
            DirectoryEntry::new(format!("domainName={domain},o=domains,dc=mail"))
                .with("domainName", domain),
        );
        self
    }

    /// Add a mailbox.
    pub fn with_mailbox(self: Arc<Self>, email: &str) -> Arc<Self> {
        self.add(mailbox(email));
        self
    }

    pub fn add(&self, entry: DirectoryEntry) {
        self.entries.lock().unwrap().push(entry);
    }

    /// Make lookups whose filter value equals `value` fail.
    pub fn fail_lookup_of(&self, value: &str) {
        self.failing_lookups.lock().unwrap().insert(value.to_string());
    }

    /// Make replacements of `attribute` fail.
    pub fn fail_replace_of(&self, attribute: &str) {
        self.failing_attributes
            .lock()
            .unwrap()
            .insert(attribute.to_string());
    }

    pub fn replacements(&self) -> Vec<Replacement> {
        self.replacements.lock().unwrap().clone()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }
}

pub fn mailbox(email: &str) -> DirectoryEntry {
    let domain = email.split('@').nth(1).unwrap_or_default();
    DirectoryEntry::new(format!("mail={email},ou=Users,domainName={domain},o=domains,dc=mail"))
        .with("mail", email)
        .with("userPassword", "{SSHA}initial")
}

#[async_trait]
impl Connector for MockTarget {
    fn display_name(&self) -> &str {
        "mock-target"
    }

    async fn test_connection(&self) -> ConnectorResult<()> {
        Ok(())
    }

    async fn dispose(&self) -> ConnectorResult<()> {
        Ok(())
    }
}

#[async_trait]
impl TargetDirectory for MockTarget {
    async fn find_one(&self, filter: &Filter) -> ConnectorResult<Option<DirectoryEntry>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);

        let Filter::Equals { attribute, value } = filter else {
            return Err(ConnectorError::operation_failed(format!(
                "unsupported filter {filter}"
            )));
        };

        if self.failing_lookups.lock().unwrap().contains(value) {
            return Err(ConnectorError::connection_failed("lookup failed"));
        }

        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .find(|e| {
                e.get(attribute)
                    .is_some_and(|v| v.values().contains(&value.as_str()))
            })
            .cloned())
    }

    async fn replace_attribute(
        &self,
        dn: &str,
        attribute: &str,
        values: Vec<String>,
    ) -> ConnectorResult<()> {
        if self.failing_attributes.lock().unwrap().contains(attribute) {
            return Err(ConnectorError::operation_failed("modify rejected"));
        }

        let mut entries = self.entries.lock().unwrap();
        let Some(entry) = entries.iter_mut().find(|e| e.dn() == dn) else {
            return Err(ConnectorError::ObjectNotFound {
                identifier: dn.to_string(),
            });
        };
        entry.set(attribute, values.clone());

        self.replacements.lock().unwrap().push(Replacement {
            dn: dn.to_string(),
            attribute: attribute.to_string(),
            values,
        });
        Ok(())
    }
}

// =============================================================================
// Provisioner and notifier
// =============================================================================

/// Records calls and creates the mailboxes in the mock target.
pub struct RecordingProvisioner {
    target: Option<Arc<MockTarget>>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
    failing_domains: Mutex<HashSet<String>>,
}

impl RecordingProvisioner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            target: None,
            calls: Mutex::new(Vec::new()),
            failing_domains: Mutex::new(HashSet::new()),
        })
    }

    /// Provisioner that creates mailboxes in `target`.
    pub fn creating_in(target: Arc<MockTarget>) -> Arc<Self> {
        Arc::new(Self {
            target: Some(target),
            calls: Mutex::new(Vec::new()),
            failing_domains: Mutex::new(HashSet::new()),
        })
    }

    pub fn fail_domain(&self, domain: &str) {
        self.failing_domains
            .lock()
            .unwrap()
            .insert(domain.to_string());
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provisioner for RecordingProvisioner {
    async fn provision(&self, domain: &str, usernames: &[String]) -> Result<(), ProvisioningError> {
        self.calls
            .lock()
            .unwrap()
            .push((domain.to_string(), usernames.to_vec()));

        if self.failing_domains.lock().unwrap().contains(domain) {
            return Err(ProvisioningError::Failed {
                domain: domain.to_string(),
                status: "exit status: 1".to_string(),
                stderr: "script failed".to_string(),
            });
        }

        if let Some(target) = &self.target {
            for username in usernames {
                target.add(mailbox(&format!("{username}@{domain}")));
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}
