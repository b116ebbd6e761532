//! Change dispatching.
//!
//! Each dispatch hands one payload to the handler registered for its kind
//! and waits until the handler signals completion through its
//! [`PendingCycle`]. Waiters are kept in a token-keyed map and removed as
//! soon as they resolve.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use dirsync_connector::entry::DirectoryEntry;

use crate::classify::ChangeKind;
use crate::diff::ModifiedEntry;
use crate::error::{SyncError, SyncResult};

/// Payload handed to a reconciliation handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "entries", rename_all = "snake_case")]
pub enum ChangePayload {
    Created(Vec<DirectoryEntry>),
    Deleted(Vec<DirectoryEntry>),
    Updated(Vec<ModifiedEntry>),
}

impl ChangePayload {
    /// The change kind this payload belongs to.
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangePayload::Created(_) => ChangeKind::Create,
            ChangePayload::Deleted(_) => ChangeKind::Delete,
            ChangePayload::Updated(_) => ChangeKind::Update,
        }
    }

    /// Number of records carried.
    pub fn len(&self) -> usize {
        match self {
            ChangePayload::Created(entries) | ChangePayload::Deleted(entries) => entries.len(),
            ChangePayload::Updated(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type Waiters = Arc<Mutex<HashMap<Uuid, oneshot::Sender<()>>>>;

/// Completion handle for one in-flight dispatch.
///
/// Completing or dropping the handle releases the waiting dispatcher, so a
/// handler that returns early or panics never stalls the poll loop.
pub struct PendingCycle {
    token: Uuid,
    waiters: Waiters,
    signaled: bool,
}

impl PendingCycle {
    /// Correlation token of this dispatch.
    pub fn token(&self) -> Uuid {
        self.token
    }

    /// Signal that the handler has finished.
    pub fn complete(mut self) {
        self.signal();
    }

    fn signal(&mut self) {
        if self.signaled {
            return;
        }
        self.signaled = true;

        let sender = self
            .waiters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.token);

        if let Some(sender) = sender {
            // The dispatcher may already have stopped waiting.
            let _ = sender.send(());
        }
    }
}

impl Drop for PendingCycle {
    fn drop(&mut self) {
        if !self.signaled {
            debug!(token = %self.token, "Pending cycle dropped without completion");
            self.signal();
        }
    }
}

impl std::fmt::Debug for PendingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCycle")
            .field("token", &self.token)
            .field("signaled", &self.signaled)
            .finish()
    }
}

/// Reconciles one kind of change against the target.
///
/// Implementations must not return errors to the dispatcher; they log
/// failures and complete the cycle.
#[async_trait]
pub trait ReconciliationHandler: Send + Sync {
    /// The change kind this handler consumes.
    fn kind(&self) -> ChangeKind;

    /// Process a payload and complete `cycle`.
    async fn handle(&self, cycle: PendingCycle, payload: ChangePayload);
}

/// Routes classified changes to their handlers, one at a time.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<ChangeKind, Arc<dyn ReconciliationHandler>>,
    waiters: Waiters,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for the kind it reports, replacing any previous one.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn ReconciliationHandler>) -> Self {
        self.handlers.insert(handler.kind(), handler);
        self
    }

    /// Whether a handler is registered for `kind`.
    pub fn handles(&self, kind: ChangeKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Number of dispatches waiting for completion.
    pub fn pending_count(&self) -> usize {
        self.waiters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Hand `payload` to the handler for `kind` and wait for it to finish.
    pub async fn dispatch(&self, kind: ChangeKind, payload: ChangePayload) -> SyncResult<()> {
        if payload.kind() != kind {
            return Err(SyncError::dispatch(
                kind,
                format!("payload of kind {} does not match", payload.kind()),
            ));
        }

        let handler = self
            .handlers
            .get(&kind)
            .cloned()
            .ok_or_else(|| SyncError::dispatch(kind, "no handler registered"))?;

        let token = Uuid::new_v4();
        let (sender, receiver) = oneshot::channel();
        self.waiters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(token, sender);

        let cycle = PendingCycle {
            token,
            waiters: Arc::clone(&self.waiters),
            signaled: false,
        };

        debug!(token = %token, kind = %kind, records = payload.len(), "Dispatching change");

        let task = tokio::spawn(async move {
            handler.handle(cycle, payload).await;
        });

        if receiver.await.is_err() {
            warn!(token = %token, kind = %kind, "Handler released the cycle without signaling");
        }

        if let Err(e) = task.await {
            if e.is_panic() {
                warn!(token = %token, kind = %kind, "Reconciliation handler panicked");
            }
        }

        self.waiters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&token);

        debug!(token = %token, kind = %kind, "Dispatch completed");
        Ok(())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&str> = self.handlers.keys().map(ChangeKind::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("Dispatcher")
            .field("handlers", &kinds)
            .field("pending", &self.pending_count())
            .finish()
    }
}
