// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Configuration for the firmware manager
//!
//! One immutable `AgentConfig` is constructed at startup and passed into
//! each component; nothing mutates it afterwards.

use crate::error::{FirmwareError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_port() -> u16 {
    8090
}

fn default_state_path() -> PathBuf {
    PathBuf::from("/var/lib/firmwared/firmware.json")
}

fn default_backup_path() -> PathBuf {
    PathBuf::from("/var/lib/firmwared/firmware.json.backup")
}

fn default_factory_path() -> PathBuf {
    PathBuf::from("/etc/firmwared/firmware.json.factory")
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from("/run/shm/LATEST_FIRMWARE")
}

fn default_package() -> String {
    "firmware".to_string()
}

fn default_settle_delay() -> u64 {
    5
}

fn default_tool_timeout() -> u64 {
    600
}

fn default_version_field() -> usize {
    2
}

/// Shell command templates. `{package}`, `{server}`, and `{artifact}` are
/// substituted before invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commands {
    /// Prints the running firmware version (token extracted by field index)
    #[serde(default = "default_version_query")]
    pub version_query: String,

    /// Refreshes the local package index from the upgrade source
    #[serde(default = "default_index_refresh")]
    pub index_refresh: String,

    /// Queries installed and candidate versions of the firmware package
    #[serde(default = "default_index_query")]
    pub index_query: String,

    /// Flashes the staged firmware artifact
    #[serde(default = "default_upgrade")]
    pub upgrade: String,

    /// Restores factory defaults
    #[serde(default = "default_factory_reset")]
    pub factory_reset: String,

    /// Reboots the device (terminates this process)
    #[serde(default = "default_reboot")]
    pub reboot: String,
}

fn default_version_query() -> String {
    "kversion".to_string()
}

fn default_index_refresh() -> String {
    "apt-get update -qq".to_string()
}

fn default_index_query() -> String {
    "apt-cache policy {package}".to_string()
}

fn default_upgrade() -> String {
    "upgradehfm {artifact}".to_string()
}

fn default_factory_reset() -> String {
    "setdef".to_string()
}

fn default_reboot() -> String {
    "reboot".to_string()
}

impl Default for Commands {
    fn default() -> Self {
        Self {
            version_query: default_version_query(),
            index_refresh: default_index_refresh(),
            index_query: default_index_query(),
            upgrade: default_upgrade(),
            factory_reset: default_factory_reset(),
            reboot: default_reboot(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Port for the request surface
    #[serde(default = "default_port")]
    pub port: u16,

    /// Live persisted document
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// Mirror refreshed on every save
    #[serde(default = "default_backup_path")]
    pub backup_path: PathBuf,

    /// Read-only shipped template, last tier of the fallback chain
    #[serde(default = "default_factory_path")]
    pub factory_path: PathBuf,

    /// Staged firmware image handed to the upgrade tool
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,

    /// Firmware package name in the platform index
    #[serde(default = "default_package")]
    pub package: String,

    /// Pause before invoking a destructive tool (seconds)
    #[serde(default = "default_settle_delay")]
    pub settle_delay_secs: u64,

    /// Bound on any single external tool run (seconds)
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    /// Whitespace token index extracted from the version-query output
    #[serde(default = "default_version_field")]
    pub version_field: usize,

    /// Event-channel endpoint; absent means log-only notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_url: Option<String>,

    #[serde(default)]
    pub commands: Commands,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            state_path: default_state_path(),
            backup_path: default_backup_path(),
            factory_path: default_factory_path(),
            artifact_path: default_artifact_path(),
            package: default_package(),
            settle_delay_secs: default_settle_delay(),
            tool_timeout_secs: default_tool_timeout(),
            version_field: default_version_field(),
            notify_url: None,
            commands: Commands::default(),
        }
    }
}

impl AgentConfig {
    /// Load the configuration file, falling back to defaults when it does
    /// not exist. A file that exists but cannot be parsed is an error, not
    /// a silent fallback.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| FirmwareError::Config(format!("cannot read {}: {e}", path.display())))?;
            serde_json::from_str(&content)
                .map_err(|e| FirmwareError::Config(format!("cannot parse {}: {e}", path.display())))
        } else {
            tracing::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Substitute the `{package}`, `{artifact}`, and `{server}` placeholders
    /// in a command template.
    pub fn render(&self, template: &str, server: Option<&str>) -> String {
        template
            .replace("{package}", &self.package)
            .replace("{artifact}", &self.artifact_path.to_string_lossy())
            .replace("{server}", server.unwrap_or(""))
    }
}
