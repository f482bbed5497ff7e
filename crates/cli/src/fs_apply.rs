use crate::paths;
use devsort_core::config::{ConflictPolicy, TransferMode};
use devsort_core::hashing;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Where a source file should go, decided before anything is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Transfer {
        to: PathBuf,
        /// Content hash used for the versioned name.
        version: Option<String>,
        /// An existing file at `to` will be replaced.
        replaces: bool,
    },
    /// Skip policy and the plain name is taken.
    Skip { existing: PathBuf },
    /// The source already is the destination.
    AlreadyThere { at: PathBuf },
}

/// Resolves the destination inside `dst_dir` for `src` under `policy`.
///
/// `version` always suffixes the stem with the content hash, so two files
/// with the same name and different content never collide. `skip` and
/// `overwrite` compare by name only.
pub fn plan_destination(src: &Path, dst_dir: &Path, policy: ConflictPolicy) -> io::Result<Placement> {
    let name = src
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "source has no file name"))?;
    let plain = dst_dir.join(&name);
    if same_file(src, &plain) {
        return Ok(Placement::AlreadyThere { at: plain });
    }
    match policy {
        ConflictPolicy::Version => {
            let hash = hashing::content_hash_prefix(src)?;
            // An already versioned file sitting in its bucket stays put.
            if src.parent().map(|p| same_file(p, dst_dir)).unwrap_or(false)
                && name.contains(&format!("__{hash}"))
            {
                return Ok(Placement::AlreadyThere {
                    at: src.to_path_buf(),
                });
            }
            Ok(Placement::Transfer {
                to: paths::versioned_name(dst_dir, &name, &hash),
                version: Some(hash),
                replaces: false,
            })
        }
        ConflictPolicy::Skip if plain.exists() => Ok(Placement::Skip { existing: plain }),
        ConflictPolicy::Skip => Ok(Placement::Transfer {
            to: plain,
            version: None,
            replaces: false,
        }),
        ConflictPolicy::Overwrite => {
            let replaces = plain.exists();
            Ok(Placement::Transfer {
                to: plain,
                version: None,
                replaces,
            })
        }
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    }
}

/// Performs the move or copy. A move across devices falls back to copy then
/// delete; any other rename failure is returned as is.
pub fn transfer(from: &Path, to: &Path, mode: TransferMode) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    match mode {
        TransferMode::Copy => {
            fs::copy(from, to)?;
        }
        TransferMode::Move => match fs::rename(from, to) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => copy_then_remove(from, to)?,
            Err(e) => return Err(e),
        },
    }
    Ok(())
}

/// Leaves exactly one of `from` or `to` behind.
fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to)?;
    if let Err(e) = fs::remove_file(from) {
        let _ = fs::remove_file(to);
        return Err(e);
    }
    Ok(())
}

/// Moves a file back to `to`, recreating parent directories.
pub fn restore(from: &Path, to: &Path) -> io::Result<()> {
    transfer(from, to, TransferMode::Move)
}
