//! Delete handler: credential invalidation.
//!
//! Removed source entries are never deleted from the target; their
//! password is replaced with the digest of a random secret instead.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use dirsync_auth::{generate_random_secret, ssha_hash};
use dirsync_connector::entry::DirectoryEntry;

use crate::classify::ChangeKind;
use crate::dispatch::{ChangePayload, PendingCycle, ReconciliationHandler};
use crate::handlers::{HandlerContext, ReconciliationReport};

/// Length of the random secret whose digest replaces the password.
const INVALIDATION_SECRET_LEN: usize = 32;

/// Handles entries removed from the source.
pub struct DeleteHandler {
    context: HandlerContext,
}

impl DeleteHandler {
    pub fn new(context: HandlerContext) -> Self {
        Self { context }
    }

    /// Invalidate the target credentials of each removed entry.
    pub async fn reconcile(&self, entries: &[DirectoryEntry]) -> ReconciliationReport {
        let mut report = ReconciliationReport::default();

        for entry in entries {
            let Some(identity) = self.context.identify(entry) else {
                debug!(dn = %entry.dn(), "Entry has no e-mail address, skipping");
                report.skipped += 1;
                continue;
            };

            let target = match self.context.find_by_mail(&identity.email).await {
                Ok(Some(target)) => target,
                Ok(None) => {
                    debug!(email = %identity.email, "No target account to invalidate");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(email = %identity.email, error = %e, "Target lookup failed");
                    report.failed += 1;
                    continue;
                }
            };

            let digest = ssha_hash(&generate_random_secret(INVALIDATION_SECRET_LEN), None);

            match self
                .context
                .replace(target.dn(), self.context.password_attribute(), vec![digest])
                .await
            {
                Ok(()) => {
                    info!(email = %identity.email, dn = %target.dn(), "Credentials invalidated");
                    report.updated += 1;
                }
                Err(e) => {
                    error!(email = %identity.email, error = %e, "Credential invalidation failed");
                    report.failed += 1;
                }
            }
        }

        report
    }
}

#[async_trait]
impl ReconciliationHandler for DeleteHandler {
    fn kind(&self) -> ChangeKind {
        ChangeKind::Delete
    }

    async fn handle(&self, cycle: PendingCycle, payload: ChangePayload) {
        match payload {
            ChangePayload::Deleted(entries) => {
                let report = self.reconcile(&entries).await;
                info!(
                    token = %cycle.token(),
                    entries = entries.len(),
                    invalidated = report.updated,
                    skipped = report.skipped,
                    failed = report.failed,
                    "Delete reconciliation finished"
                );
            }
            other => {
                warn!(token = %cycle.token(), kind = %other.kind(), "Delete handler received foreign payload");
            }
        }
        cycle.complete();
    }
}
