//! Update handler: per-attribute replacement.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::classify::ChangeKind;
use crate::diff::ModifiedEntry;
use crate::dispatch::{ChangePayload, PendingCycle, ReconciliationHandler};
use crate::handlers::{HandlerContext, ReconciliationReport};

/// Handles entries whose observable attributes changed.
///
/// Each attribute is replaced independently; a failure is logged and the
/// remaining attributes are still applied.
pub struct UpdateHandler {
    context: HandlerContext,
}

impl UpdateHandler {
    pub fn new(context: HandlerContext) -> Self {
        Self { context }
    }

    pub async fn reconcile(&self, records: &[ModifiedEntry]) -> ReconciliationReport {
        let mut report = ReconciliationReport::default();

        for record in records {
            let entry = &record.entry;

            let Some(identity) = self.context.identify(entry) else {
                debug!(dn = %entry.dn(), "Entry has no e-mail address, skipping");
                report.skipped += 1;
                continue;
            };

            let target = match self.context.find_by_mail(&identity.email).await {
                Ok(Some(target)) => target,
                Ok(None) => {
                    debug!(email = %identity.email, "No target account to update");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(email = %identity.email, error = %e, "Target lookup failed");
                    report.failed += 1;
                    continue;
                }
            };

            for attribute in &record.modified_attributes {
                // An attribute gone from the source is cleared on the target.
                let values = entry
                    .get(attribute)
                    .map(|v| v.clone().into_values())
                    .unwrap_or_default();

                match self.context.replace(target.dn(), attribute, values).await {
                    Ok(()) => report.updated += 1,
                    Err(e) => {
                        error!(
                            email = %identity.email,
                            attribute = %attribute,
                            error = %e,
                            "Attribute update failed"
                        );
                        report.failed += 1;
                    }
                }
            }
        }

        report
    }
}

#[async_trait]
impl ReconciliationHandler for UpdateHandler {
    fn kind(&self) -> ChangeKind {
        ChangeKind::Update
    }

    async fn handle(&self, cycle: PendingCycle, payload: ChangePayload) {
        match payload {
            ChangePayload::Updated(records) => {
                let report = self.reconcile(&records).await;
                info!(
                    token = %cycle.token(),
                    records = records.len(),
                    updated = report.updated,
                    skipped = report.skipped,
                    failed = report.failed,
                    "Update reconciliation finished"
                );
            }
            other => {
                warn!(token = %cycle.token(), kind = %other.kind(), "Update handler received foreign payload");
            }
        }
        cycle.complete();
    }
}
