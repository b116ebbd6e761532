//! # dirsync engine
//!
//! Change detection and reconciliation between a source and a target
//! directory.
//!
//! ## Flow
//!
//! ```text
//! search ─► EntryFilter ─► snapshot_hash ─► compare with StateStore
//!                                                │ changed
//!                                                ▼
//!                      persist hash ─► classify ─► DiffVerifier
//!                                                │
//!                                                ▼
//!                 Dispatcher ─► Create / Delete / Update handler ─► target
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use dirsync_engine::prelude::*;
//!
//! let config = SyncConfig::default();
//! let context = config.handler_context(target.clone());
//! let dispatcher = Dispatcher::new()
//!     .with_handler(Arc::new(CreateHandler::new(context.clone(), provisioner, notifier)))
//!     .with_handler(Arc::new(DeleteHandler::new(context.clone())))
//!     .with_handler(Arc::new(UpdateHandler::new(context)));
//!
//! let poller = Arc::new(SnapshotPoller::new(source, store, Arc::new(dispatcher), config));
//! tokio::spawn(poller.run(cancel_rx));
//! ```

pub mod classify;
pub mod config;
pub mod diff;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod notify;
pub mod poller;
pub mod provision;
pub mod snapshot;
pub mod state;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::classify::{classify, ChangeKind, ClassificationMode};
    pub use crate::config::SyncConfig;
    pub use crate::diff::{DiffVerifier, ModifiedEntry, ObservableAttributes};
    pub use crate::dispatch::{ChangePayload, Dispatcher, PendingCycle, ReconciliationHandler};
    pub use crate::error::{ReconciliationError, SyncError, SyncResult};
    pub use crate::filter::{EntryFilter, IgnoreList};
    pub use crate::handlers::{
        CreateHandler, DeleteHandler, EmailAttributes, HandlerContext, ReconciliationReport,
        UpdateHandler,
    };
    pub use crate::notify::{LogNotifier, Notification, NotificationSink, WebhookNotifier};
    pub use crate::poller::{CycleOutcome, SnapshotPoller};
    pub use crate::provision::{Provisioner, ProvisioningError, ScriptProvisioner};
    pub use crate::snapshot::{decode_snapshot, empty_snapshot_hash, snapshot_hash};
    pub use crate::state::{FileStateStore, MemoryStateStore, StateStore, SyncState};
}
