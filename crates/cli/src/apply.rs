use crate::fs_apply::{self, Placement};
use crate::journal::{JournalCode, JournalError, JournalRecord, JournalWriter};
use crate::paths;
use devsort_core::config::{ConflictPolicy, OrganizeSettings, TransferMode};
use devsort_core::{FileRecord, ProjectGroup};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct OrganizeConfig {
    pub target_root: PathBuf,
    pub mode: TransferMode,
    pub conflict: ConflictPolicy,
    /// Created under every project root before any file lands there.
    pub schema_paths: Vec<String>,
}

impl OrganizeConfig {
    pub fn from_settings(settings: &OrganizeSettings, target_root: PathBuf) -> Self {
        Self {
            target_root,
            mode: settings.mode,
            conflict: settings.conflict,
            schema_paths: settings.schema_paths.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error("missing input file: {0:?}")]
    MissingInput(PathBuf),
    #[error("failed to prepare {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Journal(#[from] JournalError),
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct OrganizeSummary {
    pub projects_count: usize,
    /// Successful transfers, moves and copies alike.
    pub files_moved: usize,
    pub skipped: usize,
    pub missing: usize,
    pub errors: usize,
}

fn ensure_dir(path: &Path) -> Result<(), OrganizeError> {
    fs::create_dir_all(path).map_err(|source| OrganizeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Places every file of every project group under
/// `target_root/<project>/<bucket>/`, appending one journal line per attempt.
///
/// Per-file failures become `MISS` or `ERROR` lines and the run goes on. Only
/// failing to create the target layout or to write the journal stops it.
pub fn organize(
    projects: &[ProjectGroup],
    by_path: &HashMap<PathBuf, FileRecord>,
    config: &OrganizeConfig,
    journal_path: &Path,
) -> Result<OrganizeSummary, OrganizeError> {
    ensure_dir(&config.target_root)?;
    let mut journal = JournalWriter::open(journal_path)?;
    let mut summary = OrganizeSummary {
        projects_count: projects.len(),
        ..Default::default()
    };

    for group in projects {
        let label = paths::sanitize_label(&group.label);
        let project_root = config.target_root.join(&label);
        ensure_dir(&project_root)?;
        for schema in &config.schema_paths {
            let sub = paths::sanitize_label(schema.trim_end_matches(['/', '\\']));
            ensure_dir(&project_root.join(sub))?;
        }
        info!(project = %label, files = group.paths.len(), "organizing project");

        for src in &group.paths {
            let record = organize_one(src, &label, &project_root, by_path, config);
            match record.code {
                JournalCode::Move | JournalCode::Copy => summary.files_moved += 1,
                JournalCode::Skip | JournalCode::SkipExists => summary.skipped += 1,
                JournalCode::Miss => summary.missing += 1,
                JournalCode::Error => summary.errors += 1,
            }
            journal.append(&record)?;
        }
    }

    info!(
        projects = summary.projects_count,
        moved = summary.files_moved,
        skipped = summary.skipped,
        missing = summary.missing,
        errors = summary.errors,
        journal = %journal_path.display(),
        "organize finished"
    );
    Ok(summary)
}

fn organize_one(
    src: &Path,
    project: &str,
    project_root: &Path,
    by_path: &HashMap<PathBuf, FileRecord>,
    config: &OrganizeConfig,
) -> JournalRecord {
    if !src.is_file() {
        debug!(path = %src.display(), "source vanished");
        return JournalRecord::new(JournalCode::Miss, src).with_detail("project", project);
    }
    let bucket = by_path
        .get(src)
        .and_then(|r| r.bucket.as_deref())
        .map(paths::sanitize_label)
        .unwrap_or_else(|| paths::DEFAULT_BUCKET.to_string());
    let dst_dir = project_root.join(&bucket);
    let failed = |e: std::io::Error| {
        warn!(path = %src.display(), error = %e, "organize failed for file");
        JournalRecord::new(JournalCode::Error, src)
            .with_detail("project", project)
            .with_detail("bucket", bucket.as_str())
            .with_detail("error", e.to_string())
    };
    if let Err(e) = fs::create_dir_all(&dst_dir) {
        return failed(e);
    }

    let (to, version, replaces) = match fs_apply::plan_destination(src, &dst_dir, config.conflict) {
        Ok(Placement::Transfer {
            to,
            version,
            replaces,
        }) => (to, version, replaces),
        Ok(Placement::Skip { existing }) => {
            return JournalRecord::new(JournalCode::Skip, src)
                .with_destination(existing)
                .with_detail("reason", "exists");
        }
        Ok(Placement::AlreadyThere { at }) => {
            return JournalRecord::new(JournalCode::SkipExists, src).with_destination(at);
        }
        Err(e) => return failed(e),
    };

    if let Err(e) = fs_apply::transfer(src, &to, config.mode) {
        return failed(e).with_destination(to);
    }
    let code = match config.mode {
        TransferMode::Move => JournalCode::Move,
        TransferMode::Copy => JournalCode::Copy,
    };
    let mut record = JournalRecord::new(code, src)
        .with_destination(&to)
        .with_detail("project", project)
        .with_detail("bucket", bucket.as_str());
    if let Some(hash) = version {
        record = record.with_detail("hash", hash);
    }
    if replaces {
        record = record.with_detail("replaced", true);
    }
    debug!(code = %code, from = %src.display(), to = %to.display(), "transferred");
    record
}
