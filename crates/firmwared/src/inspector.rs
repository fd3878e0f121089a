// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Version inspection: running version and update availability

use crate::config::AgentConfig;
use crate::error::{FirmwareError, Result};
use crate::tool::ExternalTool;
use crate::version;
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;

/// Result of an update check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionCheck {
    pub installed: String,
    pub candidate: String,
    pub is_latest: bool,
}

pub struct Inspector {
    tool: Arc<dyn ExternalTool>,
    config: Arc<AgentConfig>,
}

impl std::fmt::Debug for Inspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inspector")
            .field("package", &self.config.package)
            .finish_non_exhaustive()
    }
}

impl Inspector {
    pub fn new(tool: Arc<dyn ExternalTool>, config: Arc<AgentConfig>) -> Self {
        Self { tool, config }
    }

    /// Query the running firmware version and extract the configured
    /// whitespace token. Callers degrade a failure here to an empty version
    /// string rather than failing the request.
    pub fn current_version(&self) -> Result<String> {
        let output = self
            .tool
            .run(&self.config.commands.version_query)
            .map_err(|e| FirmwareError::VersionQuery(e.to_string()))?;

        if !output.success() {
            return Err(FirmwareError::VersionQuery(format!(
                "version query exited with status {}",
                output.status
            )));
        }

        let line = output.stdout.lines().next().unwrap_or("");
        line.split_whitespace()
            .nth(self.config.version_field)
            .map(str::to_string)
            .ok_or_else(|| {
                FirmwareError::VersionQuery(format!(
                    "no field {} in version output {line:?}",
                    self.config.version_field
                ))
            })
    }

    /// Refresh the package index, query installed and candidate versions of
    /// the firmware package, and compare them. A comparison that cannot
    /// resolve a strict ordering reports `is_latest = true` so a broken
    /// index never produces a false upgrade prompt.
    pub fn check_for_update(&self, server: Option<&str>) -> Result<VersionCheck> {
        let refresh = self.config.render(&self.config.commands.index_refresh, server);
        let refreshed = self
            .tool
            .run(&refresh)
            .map_err(|e| FirmwareError::UpdateCheckFailed(e.to_string()))?;
        if !refreshed.success() {
            return Err(FirmwareError::UpdateCheckFailed(format!(
                "index refresh exited with status {}",
                refreshed.status
            )));
        }

        let query = self.config.render(&self.config.commands.index_query, server);
        let queried = self
            .tool
            .run(&query)
            .map_err(|e| FirmwareError::UnknownCheck(e.to_string()))?;
        if !queried.success() {
            return Err(FirmwareError::FirmwareNotInstalled);
        }

        let (installed, candidate) = parse_index_output(&queried.stdout)?;

        let is_latest = match version::compare(&installed, &candidate) {
            Ok(ordering) => ordering != Ordering::Less,
            Err(e) => {
                tracing::warn!("Version comparison failed ({e}), assuming already latest");
                true
            }
        };

        Ok(VersionCheck {
            installed,
            candidate,
            is_latest,
        })
    }
}

/// Parse `Installed:`/`Candidate:` lines from the index query output. An
/// absent or never-installed package yields `FirmwareNotInstalled`; a
/// missing candidate falls back to the installed version (nothing newer is
/// on offer).
fn parse_index_output(stdout: &str) -> Result<(String, String)> {
    let mut installed = None;
    let mut candidate = None;

    for line in stdout.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("Installed:") {
            installed = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("Candidate:") {
            candidate = Some(value.trim().to_string());
        }
    }

    let installed = match installed {
        Some(v) if !v.is_empty() && v != "(none)" => v,
        _ => return Err(FirmwareError::FirmwareNotInstalled),
    };

    let candidate = match candidate {
        Some(v) if !v.is_empty() && v != "(none)" => v,
        _ => installed.clone(),
    };

    Ok((installed, candidate))
}
