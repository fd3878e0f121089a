// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Startup reconciliation of leftover operation markers
//!
//! A successful upgrade or reset reboots the device, so the terminal
//! outcome can only be reported by the next process. This runs exactly once
//! per process lifetime, after the store loads and before any request is
//! served.

use crate::error::Result;
use crate::notifier::{EventKind, EventSink, Notification};
use crate::store::{FirmwareRecord, OpStatus, Store};
use tracing::{info, warn};

/// Finalize the outcome of any operation that was in flight when the
/// process last terminated: emit one terminal notification, clear the
/// marker, persist. A marker still `InProgress` means the process died
/// mid-operation; an interrupted operation cannot be assumed successful.
pub async fn reconcile(
    store: &Store,
    record: &mut FirmwareRecord,
    sink: &dyn EventSink,
) -> Result<()> {
    let mut dirty = false;

    if let Some(status) = record.upgrading.take() {
        let kind = terminal_kind(status, EventKind::UpgradeSuccess, EventKind::UpgradeFail);
        info!("Reconciling leftover upgrade marker ({status:?}) as {kind:?}");
        sink.emit(&Notification::new(kind, &record.version)).await?;
        dirty = true;
    }

    if let Some(status) = record.defaulting.take() {
        let kind = terminal_kind(status, EventKind::ResetSuccess, EventKind::ResetFail);
        info!("Reconciling leftover reset marker ({status:?}) as {kind:?}");
        sink.emit(&Notification::new(kind, &record.version)).await?;
        dirty = true;
    }

    if dirty {
        store.save(record)?;
    }

    Ok(())
}

fn terminal_kind(status: OpStatus, success: EventKind, failure: EventKind) -> EventKind {
    match status {
        OpStatus::Succeeded => success,
        OpStatus::Failed => failure,
        OpStatus::InProgress => {
            warn!("Operation was still in progress at last shutdown, treating as failed");
            failure
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use crate::notifier::fake::RecordingSink;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> Store {
        let config = AgentConfig {
            state_path: dir.path().join("firmware.json"),
            backup_path: dir.path().join("firmware.json.backup"),
            factory_path: dir.path().join("firmware.json.factory"),
            ..Default::default()
        };
        Store::new(&config)
    }

    fn persisted(dir: &TempDir) -> FirmwareRecord {
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("firmware.json")).unwrap())
            .unwrap()
    }

    #[tokio::test]
    async fn test_failed_upgrade_emits_one_failure_and_clears() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let sink = RecordingSink::default();

        let mut record = FirmwareRecord {
            version: "1.0".to_string(),
            upgrading: Some(OpStatus::Failed),
            ..Default::default()
        };
        reconcile(&store, &mut record, &sink).await.unwrap();

        assert_eq!(sink.kinds(), vec![EventKind::UpgradeFail]);
        assert!(record.upgrading.is_none());
        assert!(persisted(&dir).upgrading.is_none());
    }

    #[tokio::test]
    async fn test_successful_upgrade_emits_success() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let sink = RecordingSink::default();

        let mut record = FirmwareRecord {
            upgrading: Some(OpStatus::Succeeded),
            ..Default::default()
        };
        reconcile(&store, &mut record, &sink).await.unwrap();

        assert_eq!(sink.kinds(), vec![EventKind::UpgradeSuccess]);
        assert!(record.upgrading.is_none());
    }

    #[tokio::test]
    async fn test_interrupted_upgrade_reports_failure() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let sink = RecordingSink::default();

        let mut record = FirmwareRecord {
            upgrading: Some(OpStatus::InProgress),
            ..Default::default()
        };
        reconcile(&store, &mut record, &sink).await.unwrap();

        assert_eq!(sink.kinds(), vec![EventKind::UpgradeFail]);
        assert!(record.upgrading.is_none());
    }

    #[tokio::test]
    async fn test_reset_markers_map_to_reset_events() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let sink = RecordingSink::default();

        let mut record = FirmwareRecord {
            defaulting: Some(OpStatus::Succeeded),
            ..Default::default()
        };
        reconcile(&store, &mut record, &sink).await.unwrap();
        assert_eq!(sink.kinds(), vec![EventKind::ResetSuccess]);

        let sink = RecordingSink::default();
        let mut record = FirmwareRecord {
            defaulting: Some(OpStatus::InProgress),
            ..Default::default()
        };
        reconcile(&store, &mut record, &sink).await.unwrap();
        assert_eq!(sink.kinds(), vec![EventKind::ResetFail]);
    }

    #[tokio::test]
    async fn test_clean_record_emits_nothing_and_skips_save() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let sink = RecordingSink::default();

        let mut record = FirmwareRecord::default();
        reconcile(&store, &mut record, &sink).await.unwrap();

        assert!(sink.kinds().is_empty());
        assert!(!dir.path().join("firmware.json").exists());
    }
}
