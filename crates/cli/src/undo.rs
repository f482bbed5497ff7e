use crate::fs_apply;
use crate::journal::{self, JournalCode, JournalError};
use serde::Serialize;
use std::fs;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackSummary {
    pub restored: usize,
    pub removed_copies: usize,
    /// Transfers whose destination is already gone.
    pub already_restored: usize,
    pub malformed: usize,
    /// Moves left in place because something now occupies the source path.
    pub conflicts: usize,
    pub failures: usize,
}

/// Reverses a journal, newest line first. Safe to run repeatedly: a
/// destination that no longer exists counts as already restored.
pub fn rollback(journal_path: &std::path::Path) -> Result<RollbackSummary, JournalError> {
    let mut summary = RollbackSummary::default();
    if !journal_path.exists() {
        info!(journal = %journal_path.display(), "no journal, nothing to roll back");
        return Ok(summary);
    }
    let contents = journal::read_journal(journal_path)?;
    summary.malformed = contents.malformed;
    if contents.malformed > 0 {
        debug!(count = contents.malformed, "ignoring malformed journal lines");
    }

    for record in contents.records.iter().rev() {
        let dst = match (&record.code, &record.destination) {
            (JournalCode::Move | JournalCode::Copy, Some(dst)) => dst,
            _ => continue,
        };
        if !dst.exists() {
            summary.already_restored += 1;
            continue;
        }
        match record.code {
            JournalCode::Move => {
                if record.source.exists() {
                    warn!(src = %record.source.display(), "source path occupied, leaving moved file in place");
                    summary.conflicts += 1;
                    continue;
                }
                match fs_apply::restore(dst, &record.source) {
                    Ok(()) => summary.restored += 1,
                    Err(e) => {
                        warn!(dst = %dst.display(), error = %e, "failed to restore");
                        summary.failures += 1;
                    }
                }
            }
            JournalCode::Copy => match fs::remove_file(dst) {
                Ok(()) => summary.removed_copies += 1,
                Err(e) => {
                    warn!(dst = %dst.display(), error = %e, "failed to remove copy");
                    summary.failures += 1;
                }
            },
            _ => {}
        }
    }

    info!(
        restored = summary.restored,
        removed_copies = summary.removed_copies,
        already_restored = summary.already_restored,
        conflicts = summary.conflicts,
        failures = summary.failures,
        "rollback finished"
    );
    Ok(summary)
}
