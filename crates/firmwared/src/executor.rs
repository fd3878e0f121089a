// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Operation executor for upgrade and factory reset
//!
//! Each operation is a linear machine: mark in progress, persist, settle,
//! invoke the external tool, persist the outcome, reboot on success.
//! A failure leaves the device running so an operator can inspect it.

use crate::config::AgentConfig;
use crate::error::{FirmwareError, Result};
use crate::store::{FirmwareRecord, OpStatus, Store};
use crate::tool::ExternalTool;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

pub struct Executor {
    store: Store,
    tool: Arc<dyn ExternalTool>,
    config: Arc<AgentConfig>,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Executor {
    pub fn new(store: Store, tool: Arc<dyn ExternalTool>, config: Arc<AgentConfig>) -> Self {
        Self {
            store,
            tool,
            config,
        }
    }

    /// Flash the staged artifact. The in-progress marker is persisted
    /// before anything destructive runs so a mid-operation reboot is
    /// observable at next startup.
    pub async fn upgrade(&self, record: &mut FirmwareRecord) {
        record.upgrading = Some(OpStatus::InProgress);
        if let Err(e) = self.store.save(record) {
            error!("Cannot persist upgrade start, aborting: {e}");
            record.upgrading = None;
            return;
        }

        self.settle().await;

        match self.run_upgrade_tool() {
            Ok(()) => {
                info!("Upgrading success, reboot now");
                record.upgrading = Some(OpStatus::Succeeded);
                record.last_upgrade_at = Some(chrono::Utc::now());
                if let Err(e) = self.store.save(record) {
                    error!("Cannot persist upgrade outcome: {e}");
                }
                self.reboot();
            }
            Err(e) => {
                error!("Upgrading failed, please check if the staged image is correct: {e}");
                record.upgrading = Some(OpStatus::Failed);
                if let Err(e) = self.store.save(record) {
                    error!("Cannot persist upgrade outcome: {e}");
                }
            }
        }
    }

    /// Restore factory defaults; same shape as `upgrade` on the
    /// `defaulting` marker, without the artifact gate.
    pub async fn reset_to_factory_default(&self, record: &mut FirmwareRecord) {
        record.defaulting = Some(OpStatus::InProgress);
        if let Err(e) = self.store.save(record) {
            error!("Cannot persist reset start, aborting: {e}");
            record.defaulting = None;
            return;
        }

        self.settle().await;

        let command = self.config.render(&self.config.commands.factory_reset, None);
        match self.run_tool(&command) {
            Ok(()) => {
                info!("Resetting to factory default success, reboot now");
                record.defaulting = Some(OpStatus::Succeeded);
                if let Err(e) = self.store.save(record) {
                    error!("Cannot persist reset outcome: {e}");
                }
                self.reboot();
            }
            Err(e) => {
                error!("Resetting to factory default failed: {e}");
                record.defaulting = Some(OpStatus::Failed);
                if let Err(e) = self.store.save(record) {
                    error!("Cannot persist reset outcome: {e}");
                }
            }
        }
    }

    /// Bounded pause to let in-flight writes and services quiesce before
    /// anything destructive runs.
    async fn settle(&self) {
        tokio::time::sleep(Duration::from_secs(self.config.settle_delay_secs)).await;
    }

    fn run_upgrade_tool(&self) -> Result<()> {
        self.verify_artifact()?;
        let command = self.config.render(&self.config.commands.upgrade, None);
        self.run_tool(&command)
    }

    fn run_tool(&self, command: &str) -> Result<()> {
        let output = self.tool.run(command)?;
        if output.success() {
            Ok(())
        } else {
            Err(FirmwareError::Tool(format!(
                "{command:?} exited with status {}",
                output.status
            )))
        }
    }

    /// The staged artifact must exist; when a sibling `.sha256` file is
    /// present its digest must match before the flashing tool runs.
    fn verify_artifact(&self) -> Result<()> {
        let artifact = &self.config.artifact_path;
        if !artifact.exists() {
            return Err(FirmwareError::Tool(format!(
                "staged artifact missing: {}",
                artifact.display()
            )));
        }

        let digest_path = PathBuf::from(format!("{}.sha256", artifact.display()));
        if !digest_path.exists() {
            return Ok(());
        }

        let content = std::fs::read_to_string(&digest_path)
            .map_err(|e| FirmwareError::Tool(format!("cannot read {}: {e}", digest_path.display())))?;
        let expected = content
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_lowercase();

        let image = std::fs::read(artifact)
            .map_err(|e| FirmwareError::Tool(format!("cannot read {}: {e}", artifact.display())))?;
        let mut hasher = Sha256::new();
        hasher.update(&image);
        let actual = format!("{:x}", hasher.finalize());

        if actual != expected {
            return Err(FirmwareError::Tool(format!(
                "artifact checksum mismatch: expected {expected}, got {actual}"
            )));
        }

        Ok(())
    }

    fn reboot(&self) {
        // Success path only; the reboot ends this process.
        let command = self.config.render(&self.config.commands.reboot, None);
        if let Err(e) = self.run_tool(&command) {
            error!("Reboot command failed: {e}");
        }
    }
}
