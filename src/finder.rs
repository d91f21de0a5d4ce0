//! Substring search over the sidecar store.
//!
//! There is no index: every call walks the metadata directories below the
//! roots and reads the sidecars. Work fans out over roots, metadata
//! directories, sidecars, query terms and text lines. While walking, the
//! finder also keeps the store healthy: legacy page files are migrated,
//! unreadable sidecars are regenerated and sidecars whose original is gone
//! are deleted.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::{
        Mutex,
        PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, SystemTime},
};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    error::{Error, Result},
    finding::Finding,
    legacy,
    metadata::MetaData,
    sidecar,
    text_util::{
        DEFAULT_SNIPPET_MAX_CHARS,
        join_snippets,
        matching_lines,
        truncate_snippet,
    },
    walker::{self, Walker},
};

#[derive(Debug, Clone)]
pub struct DocumentFinder {
    roots: Vec<PathBuf>,
    walker: Walker,
    max_findings: usize,
    newest_window: Duration,
}

impl DocumentFinder {
    pub fn new(
        roots: Vec<PathBuf>,
        walker: Walker,
        max_findings: usize,
        newest_window: Duration,
    ) -> Self {
        Self {
            roots,
            walker,
            max_findings,
            newest_window,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            config.roots(),
            Walker::new(config.exclude_set()?),
            config.max_findings,
            config.newest_window(),
        ))
    }

    pub fn max_findings(&self) -> usize {
        self.max_findings
    }

    /// Documents matching any whitespace-separated term of `query`, case
    /// insensitively, in text, tags, title or file path.
    pub fn find(&self, query: &str) -> Vec<Finding> {
        let mut terms: Vec<String> =
            query.split_whitespace().map(str::to_lowercase).collect();
        terms.dedup();
        if terms.is_empty() {
            return Vec::new();
        }

        let findings = self.collect(|sidecar, original| {
            let metadata = load_or_heal(sidecar, original)?;
            let context = match_context(&metadata, original, &terms)?;
            Some(Finding::new(metadata, original, context))
        });
        debug!(query, findings = findings.len(), "search finished");
        findings
    }

    /// Documents whose sidecar changed within the look-back window.
    pub fn find_newest(&self) -> Vec<Finding> {
        let cutoff = SystemTime::now()
            .checked_sub(self.newest_window)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        self.collect(|sidecar, original| {
            let modified = std::fs::metadata(sidecar).and_then(|m| m.modified());
            match modified {
                Ok(modified) if modified >= cutoff => {}
                Ok(_) => return None,
                Err(e) => {
                    warn!(path = %sidecar.display(), error = %e, "cannot stat sidecar");
                    return None;
                }
            }
            let metadata = load_or_heal(sidecar, original)?;
            let context =
                truncate_snippet(metadata.text.trim(), DEFAULT_SNIPPET_MAX_CHARS);
            Some(Finding::new(metadata, original, context))
        })
    }

    /// Persist an edited record to the sidecar it was loaded from. The next
    /// search sees the change.
    pub fn update(&self, metadata: &mut MetaData) -> Result<()> {
        metadata.save_in_place()?;
        debug!(
            path = %metadata.sidecar_path().unwrap_or(Path::new("")).display(),
            "metadata updated"
        );
        Ok(())
    }

    /// The record of `original`, regenerated if its sidecar is unreadable.
    pub fn metadata_for(&self, original: &Path) -> Result<MetaData> {
        let sidecar = sidecar::sidecar_path(original);
        if !original.try_exists()? {
            return Err(Error::NotFound {
                kind: "document",
                name: original.display().to_string(),
            });
        }
        if !sidecar.try_exists()? {
            return Err(Error::NotFound {
                kind: "sidecar",
                name: sidecar.display().to_string(),
            });
        }
        match MetaData::load(&sidecar) {
            Err(Error::Json(e)) => {
                warn!(path = %sidecar.display(), error = %e, "regenerating unreadable sidecar");
                let mut metadata = MetaData::synthesize(original);
                metadata.save(&sidecar)?;
                Ok(metadata)
            }
            other => other,
        }
    }

    /// Walk all sidecars, let `visit` turn them into findings until the cap
    /// of distinct documents is reached, then order and truncate.
    fn collect<F>(&self, visit: F) -> Vec<Finding>
    where
        F: Fn(&Path, &Path) -> Option<Finding> + Sync,
    {
        if self.max_findings == 0 {
            return Vec::new();
        }

        let found = Found::default();
        let per_root: Vec<Vec<Finding>> = self
            .roots
            .par_iter()
            .map(|root| {
                let dirs = match self.walker.metadata_dirs(root) {
                    Ok(dirs) => dirs,
                    Err(e) => {
                        warn!(root = %root.display(), error = %e, "cannot search root");
                        return Vec::new();
                    }
                };
                dirs.par_iter()
                    .flat_map_iter(|dir| self.visit_dir(dir, &found, &visit))
                    .collect()
            })
            .collect();

        self.merge(per_root)
    }

    fn visit_dir<F>(
        &self,
        dir: &Path,
        found: &Found,
        visit: &F,
    ) -> Vec<Finding>
    where
        F: Fn(&Path, &Path) -> Option<Finding> + Sync,
    {
        if let Err(e) = legacy::migrate_dir(dir) {
            warn!(dir = %dir.display(), error = %e, "legacy migration failed");
        }

        let sidecars = match walker::list_sidecars(dir) {
            Ok(sidecars) => sidecars,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot list sidecars");
                return Vec::new();
            }
        };

        sidecars
            .par_iter()
            .filter_map(|sidecar| {
                let original = sidecar::original_path(sidecar).ok()?;
                match original.try_exists() {
                    Ok(true) => {}
                    Ok(false) => {
                        reclaim_orphan(sidecar, &original);
                        return None;
                    }
                    Err(e) => {
                        warn!(
                            path = %original.display(),
                            error = %e,
                            "cannot stat original, skipping"
                        );
                        return None;
                    }
                }
                // Cooperative cap: running workers may overshoot slightly,
                // the merge truncates.
                if found.count() >= self.max_findings {
                    return None;
                }
                let finding = visit(sidecar.as_path(), original.as_path())?;
                found.insert(&original).then_some(finding)
            })
            .collect()
    }

    fn merge(&self, per_root: Vec<Vec<Finding>>) -> Vec<Finding> {
        let mut findings: Vec<Finding> =
            per_root.into_iter().flatten().collect();
        findings.sort();
        findings.truncate(self.max_findings);
        findings
    }
}

/// Documents already found during one search, keyed by canonical path so a
/// document reachable from overlapping roots is counted once.
#[derive(Default)]
struct Found {
    seen: Mutex<HashSet<PathBuf>>,
    count: AtomicUsize,
}

impl Found {
    fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Record `original`; `false` if it was already found.
    fn insert(&self, original: &Path) -> bool {
        let key = std::fs::canonicalize(original)
            .unwrap_or_else(|_| original.to_path_buf());
        let mut seen =
            self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        if !seen.insert(key) {
            return false;
        }
        self.count.fetch_add(1, Ordering::Relaxed);
        true
    }
}

/// Load a sidecar; one that does not parse is replaced by a minimal record
/// so later scans treat the document as processed.
fn load_or_heal(sidecar: &Path, original: &Path) -> Option<MetaData> {
    match MetaData::load(sidecar) {
        Ok(metadata) => Some(metadata),
        Err(Error::Json(e)) => {
            warn!(path = %sidecar.display(), error = %e, "regenerating unreadable sidecar");
            let mut metadata = MetaData::synthesize(original);
            match metadata.save(sidecar) {
                Ok(()) => Some(metadata),
                Err(e) => {
                    warn!(path = %sidecar.display(), error = %e, "cannot rewrite sidecar");
                    None
                }
            }
        }
        Err(e) => {
            warn!(path = %sidecar.display(), error = %e, "cannot read sidecar");
            None
        }
    }
}

/// Delete a sidecar whose original is gone, together with its thumbnails.
fn reclaim_orphan(sidecar: &Path, original: &Path) {
    let mut thumbnails = vec![sidecar::thumbnail_path(original)];
    if let Ok(metadata) = MetaData::load(sidecar)
        && let Some(dir) = sidecar.parent()
    {
        thumbnails.extend(metadata.thumbnail_paths.iter().map(|t| dir.join(t)));
    }

    match std::fs::remove_file(sidecar) {
        Ok(()) => {
            info!(path = %original.display(), "original is gone, removed its sidecar");
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(path = %sidecar.display(), error = %e, "cannot remove orphaned sidecar");
            return;
        }
    }

    for thumbnail in thumbnails {
        match std::fs::remove_file(&thumbnail) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %thumbnail.display(), error = %e, "cannot remove orphaned thumbnail");
            }
        }
    }
}

/// Snippet for `term` in one document. Matching text lines win over tags,
/// tags over the title, the title over the file path.
fn term_context(
    metadata: &MetaData,
    original: &Path,
    term: &str,
) -> Option<String> {
    let lines = matching_lines(&metadata.text, term);
    if !lines.is_empty() {
        return Some(join_snippets(&lines));
    }

    let tags = metadata.tags.join(", ");
    if tags.to_lowercase().contains(term) {
        return Some(tags);
    }
    if metadata.title.to_lowercase().contains(term) {
        return Some(metadata.title.clone());
    }

    let path = original.to_string_lossy();
    path.to_lowercase()
        .contains(term)
        .then(|| path.into_owned())
}

/// Combined snippet for every term that matched, or `None` if none did.
fn match_context(
    metadata: &MetaData,
    original: &Path,
    terms: &[String],
) -> Option<String> {
    let contexts: Vec<String> = terms
        .par_iter()
        .filter_map(|term| term_context(metadata, original, term))
        .collect();

    let mut unique: Vec<String> = Vec::with_capacity(contexts.len());
    for context in contexts {
        if !unique.contains(&context) {
            unique.push(context);
        }
    }
    (!unique.is_empty()).then(|| join_snippets(&unique))
}
