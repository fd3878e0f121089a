// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Error types for the firmware manager

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FirmwareError {
    #[error("no usable configuration document: {0}")]
    ConfigUnavailable(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("version query failed: {0}")]
    VersionQuery(String),

    #[error("update check failed: {0}")]
    UpdateCheckFailed(String),

    #[error("firmware package not installed")]
    FirmwareNotInstalled,

    #[error("update check failed with unknown error: {0}")]
    UnknownCheck(String),

    #[error("tool invocation failed: {0}")]
    Tool(String),

    #[error("version parse error: {0}")]
    VersionParse(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FirmwareError>;
