// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Durable state store with layered recovery
//!
//! The persisted document survives three ways: the live file, a mirror
//! refreshed on every save, and the read-only factory template shipped with
//! the image. `load` walks that chain; `save` keeps the mirror fresh.

use crate::config::AgentConfig;
use crate::error::{FirmwareError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome marker for an operation, persisted with the original wire
/// integers: 1 = in progress, 0 = succeeded, -1 = failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum OpStatus {
    InProgress,
    Succeeded,
    Failed,
}

impl From<OpStatus> for i8 {
    fn from(status: OpStatus) -> Self {
        match status {
            OpStatus::InProgress => 1,
            OpStatus::Succeeded => 0,
            OpStatus::Failed => -1,
        }
    }
}

impl TryFrom<i8> for OpStatus {
    type Error = String;

    fn try_from(value: i8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(OpStatus::InProgress),
            0 => Ok(OpStatus::Succeeded),
            -1 => Ok(OpStatus::Failed),
            other => Err(format!("invalid operation status: {other}")),
        }
    }
}

/// The persisted firmware document. Flat key-value JSON; transient fields
/// are absent unless an operation is in flight or unreconciled.
///
/// Invariant: at most one of `upgrading`/`defaulting` is present at a time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FirmwareRecord {
    /// Last-known installed firmware version
    #[serde(default)]
    pub version: String,

    /// Configured upgrade-source endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Upgrade operation marker, written before the tool is invoked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrading: Option<OpStatus>,

    /// Factory-reset operation marker, same shape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaulting: Option<OpStatus>,

    /// When the last upgrade outcome was recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_upgrade_at: Option<DateTime<Utc>>,
}

/// Exclusive owner of the on-disk representation; every other component
/// goes through `load`/`save`.
#[derive(Debug, Clone)]
pub struct Store {
    state_path: PathBuf,
    backup_path: PathBuf,
    factory_path: PathBuf,
}

impl Store {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            state_path: config.state_path.clone(),
            backup_path: config.backup_path.clone(),
            factory_path: config.factory_path.clone(),
        }
    }

    /// Walk the current -> backup -> factory chain. The first document that
    /// parses becomes the record and is immediately re-saved, promoting
    /// backup or factory content back to the live location.
    pub fn load(&self) -> Result<FirmwareRecord> {
        let tiers = [
            ("current", &self.state_path),
            ("backup", &self.backup_path),
            ("factory", &self.factory_path),
        ];

        for (tier, path) in tiers {
            match Self::read_record(path) {
                Ok(record) => {
                    if tier != "current" {
                        tracing::warn!(
                            "Recovered configuration from {tier} document at {}",
                            path.display()
                        );
                    }
                    self.save(&record)?;
                    return Ok(record);
                }
                Err(e) => {
                    tracing::warn!("Cannot load {tier} document {}: {e}", path.display());
                }
            }
        }

        Err(FirmwareError::ConfigUnavailable(format!(
            "no readable document at {}, {}, or {}",
            self.state_path.display(),
            self.backup_path.display(),
            self.factory_path.display()
        )))
    }

    /// Serialize to the live location (write-then-rename), then mirror the
    /// file byte for byte to the backup location. A copy failure after a
    /// successful write leaves the two inconsistent; that is reported, not
    /// retried — the fallback chain covers it on the next load.
    pub fn save(&self, record: &FirmwareRecord) -> Result<()> {
        let content = serde_json::to_string_pretty(record)?;

        for path in [&self.state_path, &self.backup_path] {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    FirmwareError::Persistence(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
        }

        let temp_path = self.state_path.with_extension("tmp");
        fs::write(&temp_path, &content).map_err(|e| {
            FirmwareError::Persistence(format!("cannot write {}: {e}", temp_path.display()))
        })?;
        fs::rename(&temp_path, &self.state_path).map_err(|e| {
            FirmwareError::Persistence(format!("cannot replace {}: {e}", self.state_path.display()))
        })?;

        fs::copy(&self.state_path, &self.backup_path).map_err(|e| {
            FirmwareError::Persistence(format!(
                "cannot refresh backup {}: {e}",
                self.backup_path.display()
            ))
        })?;

        Ok(())
    }

    fn read_record(path: &Path) -> Result<FirmwareRecord> {
        let content = fs::read_to_string(path)
            .map_err(|e| FirmwareError::Persistence(format!("{e}")))?;
        Ok(serde_json::from_str(&content)?)
    }
}
