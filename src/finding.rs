use std::{
    cmp::Ordering,
    path::{Path, PathBuf},
    time::SystemTime,
};

use crate::metadata::MetaData;

/// One search result: a document's metadata and the snippet that matched.
///
/// Findings order newest first by sidecar update time, then by
/// case-insensitive file path, then by exact file path.
#[derive(Debug, Clone)]
pub struct Finding {
    pub metadata: MetaData,
    pub context: String,
    path: PathBuf,
    sort_key: String,
}

impl Finding {
    pub fn new(
        metadata: MetaData,
        path: impl Into<PathBuf>,
        context: impl Into<String>,
    ) -> Self {
        let path = path.into();
        let sort_key = path.to_string_lossy().to_lowercase();
        Self {
            metadata,
            context: context.into(),
            path,
            sort_key,
        }
    }

    /// Path of the original document.
    pub fn file_path(&self) -> &Path {
        &self.path
    }

    pub fn last_update(&self) -> Option<SystemTime> {
        self.metadata.last_update()
    }
}

impl Ord for Finding {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .last_update()
            .cmp(&self.last_update())
            .then_with(|| self.sort_key.cmp(&other.sort_key))
            .then_with(|| self.path.cmp(&other.path))
    }
}

impl PartialOrd for Finding {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Finding {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Finding {}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn finding_at(path: &str, dir: &Path, age_secs: u64) -> Finding {
        let sidecar = dir.join(format!("{path}.json"));
        let mut metadata = MetaData::new(path);
        metadata.save(&sidecar).unwrap();
        let mtime = SystemTime::now() - Duration::from_secs(age_secs);
        std::fs::File::options()
            .write(true)
            .open(&sidecar)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
        Finding::new(MetaData::load(&sidecar).unwrap(), format!("/d/{path}"), "")
    }

    fn names(findings: &[Finding]) -> Vec<String> {
        findings
            .iter()
            .map(|f| f.file_path().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn newest_first() {
        let tmp = tempfile::tempdir().unwrap();
        let mut findings = vec![
            finding_at("old", tmp.path(), 300),
            finding_at("new", tmp.path(), 10),
            finding_at("mid", tmp.path(), 100),
        ];
        findings.sort();
        assert_eq!(names(&findings), ["/d/new", "/d/mid", "/d/old"]);
    }

    #[test]
    fn ties_break_on_case_insensitive_path() {
        let mut findings = vec![
            Finding::new(MetaData::new("b"), "/d/b.pdf", ""),
            Finding::new(MetaData::new("a"), "/d/A.pdf", ""),
            Finding::new(MetaData::new("c"), "/d/C.pdf", ""),
        ];
        findings.sort();
        assert_eq!(names(&findings), ["/d/A.pdf", "/d/b.pdf", "/d/C.pdf"]);
    }

    #[test]
    fn exact_path_is_final_tiebreak() {
        let upper = Finding::new(MetaData::new("x"), "/d/X.pdf", "");
        let lower = Finding::new(MetaData::new("x"), "/d/x.pdf", "");
        assert_eq!(upper.cmp(&lower), Ordering::Less);
        assert_ne!(upper, lower);
    }
}
