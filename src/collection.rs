use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use crate::sidecar;

/// Candidate paths of one scan cycle, grouped by extractor identifier.
///
/// Rebuilt from scratch on every cycle and never persisted. Both levels are
/// ordered so extraction runs over a stable sequence.
#[derive(Debug, Default, Clone)]
pub struct ExtractionCollection {
    by_extractor: BTreeMap<&'static str, BTreeSet<PathBuf>>,
}

impl ExtractionCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, extractor: &'static str, path: impl Into<PathBuf>) {
        self.by_extractor
            .entry(extractor)
            .or_default()
            .insert(path.into());
    }

    /// Identifiers that collected at least one path.
    pub fn extractors(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.by_extractor.keys().copied()
    }

    pub fn get(&self, extractor: &str) -> Option<&BTreeSet<PathBuf>> {
        self.by_extractor.get(extractor)
    }

    /// Paths collected for `extractor` that have no sidecar yet.
    pub fn pending(&self, extractor: &str) -> Vec<&Path> {
        self.get(extractor)
            .into_iter()
            .flatten()
            .map(PathBuf::as_path)
            .filter(|p| !sidecar::is_already_extracted(p))
            .collect()
    }

    pub fn len_for(&self, extractor: &str) -> usize {
        self.get(extractor).map_or(0, BTreeSet::len)
    }

    /// Total number of (extractor, path) entries.
    pub fn len(&self) -> usize {
        self.by_extractor.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_and_deduplicates() {
        let mut collection = ExtractionCollection::new();
        collection.add("pdf", "/d/b.pdf");
        collection.add("pdf", "/d/a.pdf");
        collection.add("pdf", "/d/a.pdf");
        collection.add("html", "/d/c.html");

        assert_eq!(collection.len(), 3);
        assert_eq!(collection.len_for("pdf"), 2);
        assert_eq!(collection.len_for("docx"), 0);
        assert_eq!(collection.extractors().collect::<Vec<_>>(), ["html", "pdf"]);

        let pdfs: Vec<_> = collection.get("pdf").unwrap().iter().collect();
        assert_eq!(pdfs, [Path::new("/d/a.pdf"), Path::new("/d/b.pdf")]);
    }

    #[test]
    fn pending_skips_extracted_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let done = tmp.path().join("done.pdf");
        let todo = tmp.path().join("todo.pdf");
        std::fs::write(&done, b"%PDF").unwrap();
        std::fs::write(&todo, b"%PDF").unwrap();
        std::fs::create_dir_all(sidecar::metadata_dir(&done)).unwrap();
        std::fs::write(sidecar::sidecar_path(&done), b"{}").unwrap();

        let mut collection = ExtractionCollection::new();
        collection.add("pdf", &done);
        collection.add("pdf", &todo);

        assert_eq!(collection.pending("pdf"), vec![todo.as_path()]);
        assert!(collection.pending("html").is_empty());
    }
}
