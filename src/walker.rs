use std::path::{Path, PathBuf};

use globset::GlobSet;
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

use crate::{
    error::{Error, Result},
    sidecar::{self, METADATA_DIR},
};

/// Filesystem traversal over a document root.
///
/// Hidden entries (names starting with `.`) and entries whose name matches
/// the exclude set are pruned together with everything below them.
/// Unreadable entries are logged and skipped; only a missing root is an
/// error.
#[derive(Debug, Clone)]
pub struct Walker {
    excludes: GlobSet,
}

impl Default for Walker {
    fn default() -> Self {
        Self::new(GlobSet::empty())
    }
}

impl Walker {
    pub fn new(excludes: GlobSet) -> Self {
        Self { excludes }
    }

    fn is_pruned(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        name.starts_with('.') || self.excludes.is_match(name.as_ref())
    }

    /// Every regular file below `root`, sorted by path.
    pub fn discover_documents(&self, root: &Path) -> Result<Vec<PathBuf>> {
        ensure_root(root)?;

        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| !self.is_pruned(e));

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    files.push(entry.into_path());
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "skipping unreadable entry");
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Every metadata directory below `root`, sorted by path.
    ///
    /// Metadata directories are hidden, so they are matched by name before
    /// the hidden-entry rule prunes them. Their contents are not descended
    /// into.
    pub fn metadata_dirs(&self, root: &Path) -> Result<Vec<PathBuf>> {
        ensure_root(root)?;

        let mut dirs = Vec::new();
        let mut it = WalkDir::new(root).follow_links(true).into_iter();

        while let Some(entry) = it.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }

            if entry.depth() > 0 && entry.file_name() == METADATA_DIR {
                dirs.push(entry.into_path());
                it.skip_current_dir();
            } else if self.is_pruned(&entry) {
                it.skip_current_dir();
            }
        }

        dirs.sort();
        Ok(dirs)
    }
}

/// JSON sidecars directly inside a metadata directory, sorted by path.
pub fn list_sidecars(metadata_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut sidecars = Vec::new();
    for entry in std::fs::read_dir(metadata_dir)? {
        let path = entry?.path();
        if path.is_file() && sidecar::is_sidecar(&path) {
            sidecars.push(path);
        }
    }
    sidecars.sort();
    Ok(sidecars)
}

fn ensure_root(root: &Path) -> Result<()> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(Error::NotFound {
            kind: "root directory",
            name: root.display().to_string(),
        })
    }
}
