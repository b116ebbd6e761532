//! Provisioning executor.
//!
//! Account creation in the target is delegated to an external program,
//! invoked once per domain with the usernames to create.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Errors from the provisioning executor.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// The program could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran but reported failure.
    #[error("provisioning for {domain} exited with {status}: {stderr}")]
    Failed {
        domain: String,
        status: String,
        stderr: String,
    },
}

/// Creates accounts in the target directory.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Create `usernames` under `domain`; returns once creation finished.
    async fn provision(&self, domain: &str, usernames: &[String]) -> Result<(), ProvisioningError>;
}

/// Runs `<program> <script> <domain> <user>...` in a working directory.
///
/// The child inherits the process environment.
#[derive(Debug, Clone)]
pub struct ScriptProvisioner {
    program: String,
    script: String,
    workdir: PathBuf,
}

impl ScriptProvisioner {
    pub fn new(
        program: impl Into<String>,
        script: impl Into<String>,
        workdir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            script: script.into(),
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }
}

#[async_trait]
impl Provisioner for ScriptProvisioner {
    #[instrument(skip(self, usernames), fields(users = usernames.len()))]
    async fn provision(&self, domain: &str, usernames: &[String]) -> Result<(), ProvisioningError> {
        debug!(
            program = %self.program,
            script = %self.script,
            workdir = %self.workdir.display(),
            "Running provisioning script"
        );

        let output = Command::new(&self.program)
            .arg(&self.script)
            .arg(domain)
            .args(usernames)
            .current_dir(&self.workdir)
            .output()
            .await
            .map_err(|source| ProvisioningError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProvisioningError::Failed {
                domain: domain.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!(
            domain = %domain,
            stdout = %String::from_utf8_lossy(&output.stdout).trim(),
            "Provisioning script completed"
        );
        Ok(())
    }
}
