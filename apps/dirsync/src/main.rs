//! dirsync daemon.
//!
//! Polls the source directory, detects changes against the persisted
//! snapshot hash and reconciles them into the target directory until
//! SIGINT/SIGTERM.

mod config;
mod logging;

use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use dirsync_connector::traits::Connector;
use dirsync_connector_ldap::LdapDirectory;
use dirsync_engine::dispatch::Dispatcher;
use dirsync_engine::handlers::{CreateHandler, DeleteHandler, UpdateHandler};
use dirsync_engine::notify::{
    LogNotifier, Notification, NotificationSink, SmtpNotifier, WebhookNotifier,
};
use dirsync_engine::poller::SnapshotPoller;
use dirsync_engine::provision::ScriptProvisioner;
use dirsync_engine::state::FileStateStore;

use crate::config::{DirsyncConfig, NotifyConfig};
use crate::logging::{init_logging, LogFormat, DEFAULT_LOG_FILTER};

#[tokio::main]
async fn main() {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let log_format = std::env::var("LOG_FORMAT")
        .ok()
        .and_then(|v| v.parse::<LogFormat>().ok())
        .unwrap_or_default();
    init_logging(DEFAULT_LOG_FILTER, log_format);

    let config = match DirsyncConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            let notifier = build_notifier(&NotifyConfig::from_env().unwrap_or_default());
            report_config_error(notifier.as_ref(), e.to_string()).await;
            std::process::exit(1);
        }
    };

    info!(
        source = %config.source.url(),
        target = %config.target.url(),
        state_path = %config.state_path.display(),
        classification = %config.sync.classification,
        "Starting dirsync"
    );

    let notifier = build_notifier(&config.notify);

    let source = match LdapDirectory::new(config.source.clone()) {
        Ok(directory) => directory.with_display_name("source"),
        Err(e) => {
            report_config_error(notifier.as_ref(), format!("source directory: {e}")).await;
            std::process::exit(1);
        }
    };
    let target = match LdapDirectory::new(config.target.clone()) {
        Ok(directory) => directory.with_display_name("target"),
        Err(e) => {
            report_config_error(notifier.as_ref(), format!("target directory: {e}")).await;
            std::process::exit(1);
        }
    };
    let source = Arc::new(source);
    let target = Arc::new(target);

    // Unreachable directories are not fatal; the poll loop retries.
    for directory in [&source, &target] {
        match directory.test_connection().await {
            Ok(()) => info!(directory = %directory.display_name(), "Directory reachable"),
            Err(e) => warn!(
                directory = %directory.display_name(),
                error = %e,
                "Directory not reachable yet"
            ),
        }
    }

    let provisioner = Arc::new(ScriptProvisioner::new(
        config.provision_program.clone(),
        config.provision_script.clone(),
        config.provision_workdir.clone(),
    ));

    let context = config.sync.handler_context(target.clone());
    let dispatcher = Dispatcher::new()
        .with_handler(Arc::new(CreateHandler::new(
            context.clone(),
            provisioner,
            notifier,
        )))
        .with_handler(Arc::new(DeleteHandler::new(context.clone())))
        .with_handler(Arc::new(UpdateHandler::new(context)));

    let store = Arc::new(FileStateStore::new(config.state_path.clone()));
    let poller = Arc::new(SnapshotPoller::new(
        source,
        store,
        Arc::new(dispatcher),
        config.sync.clone(),
    ));

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let poller_task = tokio::spawn(poller.run(cancel_rx));

    shutdown_signal().await;
    let _ = cancel_tx.send(true);

    if let Err(e) = poller_task.await {
        error!(error = %e, "Snapshot poller task failed");
    }
    if let Err(e) = target.dispose().await {
        warn!(error = %e, "Failed to release target directory");
    }

    info!("dirsync stopped");
}

/// Report a fatal startup problem to the operator.
async fn report_config_error(notifier: &dyn NotificationSink, message: String) {
    error!(error = %message, "Configuration error");
    eprintln!("Configuration error: {message}");
    notifier
        .notify(Notification::new("ConfigError", message))
        .await;
}

/// SMTP sink when a relay is configured, else the webhook, else log-only.
fn build_notifier(config: &NotifyConfig) -> Arc<dyn NotificationSink> {
    if let Some(smtp) = &config.smtp {
        match SmtpNotifier::new(smtp) {
            Ok(notifier) => {
                info!(relay = %smtp.host, port = smtp.port, "Notifications go to SMTP");
                return Arc::new(notifier);
            }
            Err(e) => warn!(error = %e, "Failed to set up SMTP notifications"),
        }
    }

    if let Some(url) = &config.webhook_url {
        match WebhookNotifier::new(url.as_str()) {
            Ok(notifier) => return Arc::new(notifier),
            Err(e) => warn!(error = %e, "Failed to build webhook client"),
        }
    }

    info!("Notifications go to the log");
    Arc::new(LogNotifier)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use dirsync_connector_ldap::LdapConfig;

    #[derive(Default)]
    struct RecordingSink {
        received: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn notify(&self, notification: Notification) {
            self.received.lock().unwrap().push(notification);
        }
    }

    #[tokio::test]
    async fn test_directory_setup_failure_reaches_the_sink() {
        let sink = RecordingSink::default();
        let err = LdapDirectory::new(LdapConfig::new("", "dc=x", "cn=admin,dc=x")).unwrap_err();

        report_config_error(&sink, format!("source directory: {err}")).await;

        let received = sink.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].name, "ConfigError");
        assert!(received[0].message.starts_with("source directory: invalid configuration"));
    }

    #[test]
    fn test_build_notifier_falls_back_to_log_on_bad_smtp_settings() {
        let config = NotifyConfig {
            webhook_url: None,
            smtp: Some(dirsync_engine::notify::SmtpSettings::new(
                "smtp.example.com",
                "not an address",
                vec!["ops@example.com".to_string()],
            )),
        };
        // Invalid sender falls back to the log sink.
        let _notifier = build_notifier(&config);
    }
}
