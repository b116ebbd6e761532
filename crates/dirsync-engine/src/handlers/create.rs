//! Create handler: password reconciliation plus bulk provisioning.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use dirsync_connector::entry::DirectoryEntry;

use crate::classify::ChangeKind;
use crate::dispatch::{ChangePayload, PendingCycle, ReconciliationHandler};
use crate::error::ReconciliationError;
use crate::handlers::{EmailIdentity, HandlerContext, ReconciliationReport};
use crate::notify::{Notification, NotificationSink};
use crate::provision::Provisioner;

/// A source entry about to be created in the target.
#[derive(Debug, Clone)]
struct Candidate {
    identity: EmailIdentity,
    password: Option<Vec<String>>,
}

/// Handles newly observed source entries.
///
/// Entries whose address already exists in the target only get their
/// password replaced. The rest are provisioned per domain, then receive
/// their password in a second pass.
pub struct CreateHandler {
    context: HandlerContext,
    provisioner: Arc<dyn Provisioner>,
    notifier: Arc<dyn NotificationSink>,
}

impl CreateHandler {
    pub fn new(
        context: HandlerContext,
        provisioner: Arc<dyn Provisioner>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            context,
            provisioner,
            notifier,
        }
    }

    /// Reconcile created entries against the target.
    pub async fn reconcile(&self, entries: &[DirectoryEntry]) -> ReconciliationReport {
        let mut report = ReconciliationReport::default();

        let mut candidates = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.context.identify(entry) {
                Some(identity) => candidates.push(Candidate {
                    identity,
                    password: entry
                        .get(self.context.password_attribute())
                        .map(|v| v.clone().into_values()),
                }),
                None => {
                    debug!(dn = %entry.dn(), "Entry has no e-mail address, skipping");
                    report.skipped += 1;
                }
            }
        }

        let candidates = self.drop_unknown_domains(candidates, &mut report).await;
        let remaining = self.reconcile_passwords(candidates, &mut report).await;

        let mut provisioned = Vec::new();
        for (domain, group) in group_by_domain(remaining) {
            let usernames: Vec<String> = group.iter().map(|c| c.identity.username.clone()).collect();

            match self.provisioner.provision(&domain, &usernames).await {
                Ok(()) => {
                    info!(domain = %domain, users = usernames.len(), "Accounts provisioned");
                    report.provisioned += group.len();
                    provisioned.extend(group);
                }
                Err(source) => {
                    let err = ReconciliationError::Provisioning {
                        domain: domain.clone(),
                        source,
                    };
                    error!(domain = %domain, error = %err, "Provisioning failed");
                    report.failed += group.len();
                    self.notifier
                        .notify(Notification::new("ProvisioningError", err.to_string()))
                        .await;
                }
            }
        }

        for candidate in self.reconcile_passwords(provisioned, &mut report).await {
            warn!(
                email = %candidate.identity.email,
                "Provisioned account not found in target"
            );
            report.skipped += 1;
        }

        report
    }

    /// Keep only candidates whose domain is hosted by the target.
    async fn drop_unknown_domains(
        &self,
        candidates: Vec<Candidate>,
        report: &mut ReconciliationReport,
    ) -> Vec<Candidate> {
        let mut checked = HashSet::new();
        let mut hosted = HashSet::new();

        for candidate in &candidates {
            let domain = candidate.identity.domain.as_str();
            if !checked.insert(domain) {
                continue;
            }

            match self.context.domain_exists(domain).await {
                Ok(true) => {
                    hosted.insert(domain.to_string());
                }
                Ok(false) => {
                    info!(domain = %domain, "Domain not hosted by target, dropping its entries");
                }
                Err(e) => {
                    warn!(domain = %domain, error = %e, "Domain lookup failed, dropping its entries");
                }
            }
        }

        let (kept, dropped): (Vec<_>, Vec<_>) = candidates
            .into_iter()
            .partition(|c| hosted.contains(&c.identity.domain));
        report.skipped += dropped.len();
        kept
    }

    /// Set passwords on candidates that already exist in the target.
    ///
    /// Returns the candidates not found. A failed lookup drops the
    /// candidate, so it is neither updated nor provisioned this cycle.
    async fn reconcile_passwords(
        &self,
        candidates: Vec<Candidate>,
        report: &mut ReconciliationReport,
    ) -> Vec<Candidate> {
        let mut missing = Vec::new();

        for candidate in candidates {
            let email = candidate.identity.email.as_str();

            let existing = match self.context.find_by_mail(email).await {
                Ok(Some(existing)) => existing,
                Ok(None) => {
                    missing.push(candidate);
                    continue;
                }
                Err(e) => {
                    warn!(email = %email, error = %e, "Target lookup failed");
                    report.failed += 1;
                    continue;
                }
            };

            let Some(password) = candidate.password.clone() else {
                warn!(email = %email, "Source entry has no password, leaving target unchanged");
                report.skipped += 1;
                continue;
            };

            match self
                .context
                .replace(existing.dn(), self.context.password_attribute(), password)
                .await
            {
                Ok(()) => {
                    info!(email = %email, dn = %existing.dn(), "Password reconciled");
                    report.updated += 1;
                }
                Err(e) => {
                    error!(email = %email, error = %e, "Password reconciliation failed");
                    report.failed += 1;
                }
            }
        }

        missing
    }
}

/// Group candidates by domain, in first-seen domain order.
fn group_by_domain(candidates: Vec<Candidate>) -> Vec<(String, Vec<Candidate>)> {
    let mut groups: Vec<(String, Vec<Candidate>)> = Vec::new();
    for candidate in candidates {
        match groups
            .iter_mut()
            .find(|(domain, _)| *domain == candidate.identity.domain)
        {
            Some((_, group)) => group.push(candidate),
            None => groups.push((candidate.identity.domain.clone(), vec![candidate])),
        }
    }
    groups
}

#[async_trait]
impl ReconciliationHandler for CreateHandler {
    fn kind(&self) -> ChangeKind {
        ChangeKind::Create
    }

    async fn handle(&self, cycle: PendingCycle, payload: ChangePayload) {
        match payload {
            ChangePayload::Created(entries) => {
                let report = self.reconcile(&entries).await;
                info!(
                    token = %cycle.token(),
                    entries = entries.len(),
                    updated = report.updated,
                    provisioned = report.provisioned,
                    skipped = report.skipped,
                    failed = report.failed,
                    "Create reconciliation finished"
                );
            }
            other => {
                warn!(token = %cycle.token(), kind = %other.kind(), "Create handler received foreign payload");
            }
        }
        cycle.complete();
    }
}
