//! Directory enumeration with glob filters and a depth bound.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What the walker hands to the scanner for each live entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEntry {
    File(PathBuf),
    Error { path: PathBuf, message: String },
}

#[derive(Debug, Clone)]
pub struct PathFilter {
    include: Option<GlobSet>,
    exclude: GlobSet,
}

impl PathFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, globset::Error> {
        let include = if include.is_empty() {
            None
        } else {
            Some(build_globset(include)?)
        };
        Ok(Self {
            include,
            exclude: build_globset(exclude)?,
        })
    }

    /// `rel` is the root-relative path with `/` separators. Directories are
    /// also tested with a trailing slash so `build/` style patterns prune.
    pub fn is_excluded(&self, rel: &str, is_dir: bool) -> bool {
        if self.exclude.is_empty() {
            return false;
        }
        if self.exclude.is_match(rel) {
            return true;
        }
        is_dir && self.exclude.is_match(format!("{rel}/"))
    }

    pub fn is_included(&self, rel: &str) -> bool {
        self.include.as_ref().map_or(true, |set| set.is_match(rel))
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(Glob::new(pat)?);
    }
    builder.build()
}

fn relative_posix(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Clone)]
pub struct DirectoryWalker {
    roots: Vec<PathBuf>,
    filter: PathFilter,
    max_depth: Option<usize>,
    follow_symlinks: bool,
}

impl DirectoryWalker {
    pub fn new(
        roots: Vec<PathBuf>,
        filter: PathFilter,
        max_depth: Option<usize>,
        follow_symlinks: bool,
    ) -> Self {
        Self {
            roots,
            filter,
            max_depth,
            follow_symlinks,
        }
    }

    /// Lazily walks every root in order. Only the traversal stack is held,
    /// never the full listing of the tree.
    pub fn into_entries(self) -> impl Iterator<Item = WalkEntry> + Send {
        let DirectoryWalker {
            roots,
            filter,
            max_depth,
            follow_symlinks,
        } = self;
        roots
            .into_iter()
            .flat_map(move |root| walk_root(root, filter.clone(), max_depth, follow_symlinks))
    }
}

fn walk_root(
    root: PathBuf,
    filter: PathFilter,
    max_depth: Option<usize>,
    follow_symlinks: bool,
) -> impl Iterator<Item = WalkEntry> + Send {
    let mut walk = WalkDir::new(&root).min_depth(1).follow_links(follow_symlinks);
    if let Some(depth) = max_depth {
        // walkdir counts the root's children as depth 1.
        walk = walk.max_depth(depth.saturating_add(1));
    }
    let prune_root = root.clone();
    let prune_filter = filter.clone();
    walk.into_iter()
        .filter_entry(move |e| {
            if e.depth() == 0 {
                return true;
            }
            let rel = relative_posix(&prune_root, e.path());
            !prune_filter.is_excluded(&rel, e.file_type().is_dir())
        })
        .filter_map(move |entry| match entry {
            Ok(e) => {
                if !e.file_type().is_file() {
                    return None;
                }
                let rel = relative_posix(&root, e.path());
                if !filter.is_included(&rel) {
                    return None;
                }
                Some(WalkEntry::File(e.into_path()))
            }
            Err(err) => {
                let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                Some(WalkEntry::Error {
                    path,
                    message: err.to_string(),
                })
            }
        })
}
