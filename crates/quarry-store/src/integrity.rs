use crate::journal::Journal;
use crate::layout::InstallationLayout;
use crate::objects::{snapshot_hash, SnapshotStore};
use crate::StoreError;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;

#[derive(Debug, Default, Serialize)]
pub struct IntegrityReport {
    pub records_checked: usize,
    pub objects_checked: usize,
    pub objects_passed: usize,
    pub failed: Vec<IntegrityFailure>,
    /// Whether the working copy still matches the head snapshot; `None`
    /// without history.
    pub working_copy_matches_head: Option<bool>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Serialize)]
pub struct IntegrityFailure {
    pub subject: String,
    pub reason: String,
}

/// Check the journal and every snapshot it references.
///
/// Journal corruption is reported as a failure rather than returned as an
/// error, so a damaged history still produces a report.
pub(crate) fn verify_history(
    layout: &InstallationLayout,
    objects: &SnapshotStore,
    journal: &Journal,
) -> Result<IntegrityReport, StoreError> {
    let mut report = IntegrityReport::default();

    let records = match journal.read_all() {
        Ok(records) => records,
        Err(e @ StoreError::CorruptHistory { .. }) => {
            report.failed.push(IntegrityFailure {
                subject: "journal".to_owned(),
                reason: e.to_string(),
            });
            return Ok(report);
        }
        Err(e) => return Err(e),
    };
    report.records_checked = records.len();

    let referenced: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| std::iter::once(r.manifest.as_str()).chain(r.channels.as_deref()))
        .collect();
    report.objects_checked = referenced.len();

    for hash in referenced {
        match objects.get(hash) {
            Ok(_) => report.objects_passed += 1,
            Err(StoreError::IntegrityFailure { actual, .. }) => {
                report.failed.push(IntegrityFailure {
                    subject: hash.to_owned(),
                    reason: format!("snapshot hash mismatch: got {actual}"),
                });
            }
            Err(e) => {
                report.failed.push(IntegrityFailure {
                    subject: hash.to_owned(),
                    reason: format!("snapshot read error: {e}"),
                });
            }
        }
    }

    if let Some(head) = records.last() {
        let matches = fs::read(layout.manifest_path())
            .map(|bytes| snapshot_hash(&bytes) == head.manifest)
            .unwrap_or(false);
        report.working_copy_matches_head = Some(matches);
    }

    Ok(report)
}
