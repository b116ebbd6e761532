//! Snapshot poll loop.
//!
//! Each cycle searches the source, filters and hashes the result, and
//! compares it with the persisted hash. On a mismatch the new hash is
//! persisted first, then the change is classified, diffed and dispatched.
//! Persisting before reconciliation gives at-most-once delivery: a crash
//! mid-reconciliation loses that change instead of replaying it.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use dirsync_connector::entry::DirectoryEntry;
use dirsync_connector::traits::SourceDirectory;

use crate::classify::{classify, ChangeKind, ClassificationMode};
use crate::config::SyncConfig;
use crate::diff::DiffVerifier;
use crate::dispatch::{ChangePayload, Dispatcher};
use crate::error::SyncError;
use crate::filter::EntryFilter;
use crate::snapshot::{decode_snapshot, empty_snapshot_hash, snapshot_hash};
use crate::state::{StateStore, SyncState};

/// What a single cycle decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The source search failed; nothing changed.
    SearchFailed,
    /// Persisted state could not be read or written; nothing dispatched.
    StateUnavailable,
    /// The snapshot hash matched the persisted one.
    Unchanged,
    /// The snapshot changed and these kinds were dispatched, in order.
    Dispatched(Vec<ChangeKind>),
    /// The snapshot changed but there was nothing to dispatch.
    NothingToDispatch,
}

impl CycleOutcome {
    /// Whether the next cycle should wait the retry interval.
    pub fn is_failure(&self) -> bool {
        matches!(self, CycleOutcome::SearchFailed | CycleOutcome::StateUnavailable)
    }
}

/// Drives the periodic snapshot comparison.
pub struct SnapshotPoller {
    source: Arc<dyn SourceDirectory>,
    store: Arc<dyn StateStore>,
    dispatcher: Arc<Dispatcher>,
    filter: EntryFilter,
    config: SyncConfig,
}

impl SnapshotPoller {
    pub fn new(
        source: Arc<dyn SourceDirectory>,
        store: Arc<dyn StateStore>,
        dispatcher: Arc<Dispatcher>,
        config: SyncConfig,
    ) -> Self {
        Self {
            source,
            store,
            dispatcher,
            filter: config.entry_filter(),
            config,
        }
    }

    /// Run one fetch/compare/dispatch cycle.
    #[instrument(skip(self), fields(source = %self.source.display_name()))]
    pub async fn run_cycle(&self) -> CycleOutcome {
        let raw = match self.source.search_entries(&self.config.search_filter).await {
            Ok(entries) => entries,
            Err(e) => {
                let code = e.error_code();
                let transient = e.is_transient();
                let err = SyncError::DirectorySearch(e);
                warn!(
                    error = %err,
                    code,
                    transient,
                    "Source search failed, skipping cycle"
                );
                return CycleOutcome::SearchFailed;
            }
        };

        let latest = self.filter.apply(raw);
        let hash = snapshot_hash(&latest);

        let stored = match self.store.get().await {
            Ok(stored) => stored,
            Err(e) => {
                error!(error = %e, "Failed to read sync state");
                return CycleOutcome::StateUnavailable;
            }
        };

        let previous_hash = stored
            .as_ref()
            .map(|s| s.hash.clone())
            .unwrap_or_else(empty_snapshot_hash);

        if previous_hash == hash {
            debug!(entries = latest.len(), "Snapshot unchanged");
            return CycleOutcome::Unchanged;
        }

        let next = SyncState::new(hash).with_id(stored.and_then(|s| s.id));
        if let Err(e) = self.store.set(next).await {
            error!(error = %e, "Failed to persist sync state, skipping dispatch");
            return CycleOutcome::StateUnavailable;
        }

        let current = match decode_snapshot(&previous_hash) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Stored snapshot unreadable, comparing against empty set");
                Vec::new()
            }
        };

        info!(
            latest = latest.len(),
            current = current.len(),
            "Snapshot changed"
        );

        let plan = self.plan(&latest, &current);
        if plan.is_empty() {
            return CycleOutcome::NothingToDispatch;
        }

        let mut dispatched = Vec::with_capacity(plan.len());
        for payload in plan {
            let kind = payload.kind();
            match self.dispatcher.dispatch(kind, payload).await {
                Ok(()) => dispatched.push(kind),
                Err(e) => error!(error = %e, "Dispatch failed"),
            }
        }

        CycleOutcome::Dispatched(dispatched)
    }

    /// Payloads to dispatch for a changed snapshot, in dispatch order.
    fn plan(&self, latest: &[DirectoryEntry], current: &[DirectoryEntry]) -> Vec<ChangePayload> {
        let verifier = DiffVerifier::new(latest, current);
        let observable = &self.config.observable_attributes;

        match self.config.classification {
            ClassificationMode::Cardinality => {
                let kind = classify(latest, current);
                debug!(kind = %kind, "Change classified");
                let payload = match kind {
                    ChangeKind::Create => ChangePayload::Created(verifier.verify_create()),
                    ChangeKind::Delete => ChangePayload::Deleted(verifier.verify_delete()),
                    ChangeKind::Update => ChangePayload::Updated(verifier.verify_update(observable)),
                };
                vec![payload]
            }
            ClassificationMode::FullDiff => [
                ChangePayload::Created(verifier.verify_create()),
                ChangePayload::Updated(verifier.verify_update(observable)),
                ChangePayload::Deleted(verifier.verify_delete()),
            ]
            .into_iter()
            .filter(|payload| !payload.is_empty())
            .collect(),
        }
    }

    /// Poll until `cancel` turns true (or its sender goes away), then
    /// release the source connection.
    ///
    /// Cancellation is observed between cycles and during waits; a cycle in
    /// progress, including its dispatch, always runs to completion.
    pub async fn run(self: Arc<Self>, mut cancel: watch::Receiver<bool>) {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            retry_interval_secs = self.config.retry_interval.as_secs(),
            classification = %self.config.classification,
            "Snapshot poller started"
        );

        loop {
            if *cancel.borrow() {
                info!("Snapshot poller received cancel signal, shutting down");
                break;
            }

            let outcome = self.run_cycle().await;
            let wait = if outcome.is_failure() {
                self.config.retry_interval
            } else {
                self.config.poll_interval
            };

            if wait_or_cancel(&mut cancel, wait).await {
                info!("Snapshot poller received cancel signal, shutting down");
                break;
            }
        }

        if let Err(e) = self.source.dispose().await {
            warn!(error = %e, "Failed to release source directory");
        }
        info!("Snapshot poller stopped");
    }
}

/// Sleep for `wait`; returns `true` if cancellation arrived first.
async fn wait_or_cancel(cancel: &mut watch::Receiver<bool>, wait: Duration) -> bool {
    let sleep = tokio::time::sleep(wait);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            () = &mut sleep => return *cancel.borrow(),
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    return true;
                }
            }
        }
    }
}

impl std::fmt::Debug for SnapshotPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotPoller")
            .field("source", &self.source.display_name())
            .field("dispatcher", &self.dispatcher)
            .field("filter", &self.filter)
            .field("config", &self.config)
            .finish()
    }
}
