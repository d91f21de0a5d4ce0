//! Migration of per-page text sidecars into the JSON scheme.
//!
//! Older archives stored OCR output as one file per page,
//! `.docarchive/<name>_<N>.png.txt`, with the thumbnail at
//! `.docarchive/thumb_<name>_1.png`. Migration folds the page texts, in page
//! order, into `<name>.json` and deletes the page files.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use tracing::{info, warn};

use crate::{
    error::{Error, Result},
    metadata::MetaData,
    sidecar::{self, THUMBNAIL_PREFIX},
    walker::Walker,
};

const PAGE_SUFFIX: &str = ".png.txt";

/// Split `<name>_<N>.png.txt` into `(name, N)`.
fn parse_page_file(file_name: &str) -> Option<(&str, usize)> {
    let stem = file_name.strip_suffix(PAGE_SUFFIX)?;
    let (name, page) = stem.rsplit_once('_')?;
    if name.is_empty() {
        return None;
    }
    Some((name, page.parse().ok()?))
}

/// Page files in `dir`, grouped by original file name and ordered by page.
fn page_files(dir: &Path) -> Result<BTreeMap<String, BTreeMap<usize, PathBuf>>> {
    let mut groups: BTreeMap<String, BTreeMap<usize, PathBuf>> = BTreeMap::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some((name, page)) = parse_page_file(file_name) {
            groups
                .entry(name.to_string())
                .or_default()
                .insert(page, path.clone());
        }
    }
    Ok(groups)
}

fn legacy_thumbnail_name(name: &str) -> String {
    format!("{THUMBNAIL_PREFIX}{name}_1.png")
}

fn migrate_document(
    dir: &Path,
    name: &str,
    pages: &BTreeMap<usize, PathBuf>,
) -> Result<()> {
    let parent = dir.parent().ok_or_else(|| {
        Error::Config(format!("{} has no parent", dir.display()))
    })?;
    let original = parent.join(name);
    let sidecar_path = sidecar::sidecar_path(&original);

    let mut metadata = match MetaData::load(&sidecar_path) {
        Ok(metadata) => metadata,
        Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            MetaData::synthesize(&original)
        }
        Err(Error::Json(_)) => MetaData::synthesize(&original),
        Err(e) => return Err(e),
    };

    let legacy_thumbnail = legacy_thumbnail_name(name);
    if metadata.thumbnail_paths.is_empty() && dir.join(&legacy_thumbnail).is_file() {
        metadata.thumbnail_paths.push(legacy_thumbnail);
    }

    let mut texts = Vec::new();
    if !metadata.text.trim().is_empty() {
        texts.push(metadata.text.trim_end().to_string());
    }
    for path in pages.values() {
        let page = std::fs::read_to_string(path)?;
        let page = page.trim_end();
        // An interrupted earlier migration may already have folded it in.
        if !page.trim().is_empty() && !metadata.text.contains(page) {
            texts.push(page.to_string());
        }
    }
    metadata.text = texts.join("\n\n");
    metadata.save(&sidecar_path)?;

    for path in pages.values() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

/// Migrate every legacy document in one metadata directory. Returns the
/// number of documents migrated.
pub fn migrate_dir(dir: &Path) -> Result<usize> {
    let groups = page_files(dir)?;
    let mut migrated = 0;
    for (name, pages) in &groups {
        match migrate_document(dir, name, pages) {
            Ok(()) => {
                info!(
                    dir = %dir.display(),
                    document = %name,
                    pages = pages.len(),
                    "migrated legacy page sidecars"
                );
                migrated += 1;
            }
            Err(e) => {
                warn!(dir = %dir.display(), document = %name, error = %e, "cannot migrate legacy sidecars");
            }
        }
    }
    Ok(migrated)
}

/// Migrate every metadata directory below `roots`. Unreadable roots and
/// directories are logged and skipped.
pub fn migrate_roots(walker: &Walker, roots: &[PathBuf]) -> usize {
    let mut migrated = 0;
    for root in roots {
        let dirs = match walker.metadata_dirs(root) {
            Ok(dirs) => dirs,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "cannot scan root");
                continue;
            }
        };
        for dir in dirs {
            match migrate_dir(&dir) {
                Ok(n) => migrated += n,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "cannot read metadata directory");
                }
            }
        }
    }
    migrated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sidecar::METADATA_DIR;

    #[test]
    fn parses_page_file_names() {
        assert_eq!(parse_page_file("scan.pdf_1.png.txt"), Some(("scan.pdf", 1)));
        assert_eq!(
            parse_page_file("my_scan.pdf_12.png.txt"),
            Some(("my_scan.pdf", 12))
        );
        assert_eq!(parse_page_file("scan.pdf_x.png.txt"), None);
        assert_eq!(parse_page_file("scan.pdf.json"), None);
        assert_eq!(parse_page_file("_1.png.txt"), None);
    }

    fn legacy_layout(root: &Path) -> PathBuf {
        let dir = root.join(METADATA_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(root.join("scan.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.join("scan.pdf_2.png.txt"), "second page\n").unwrap();
        std::fs::write(dir.join("scan.pdf_10.png.txt"), "tenth page\n").unwrap();
        std::fs::write(dir.join("scan.pdf_1.png.txt"), "first page\n").unwrap();
        std::fs::write(dir.join("thumb_scan.pdf_1.png"), b"png").unwrap();
        dir
    }

    #[test]
    fn folds_pages_into_json_in_page_order() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = legacy_layout(tmp.path());

        assert_eq!(migrate_dir(&dir).unwrap(), 1);

        let metadata = MetaData::load(&dir.join("scan.pdf.json")).unwrap();
        assert_eq!(metadata.title, "scan.pdf");
        assert_eq!(metadata.text, "first page\n\nsecond page\n\ntenth page");
        assert_eq!(metadata.thumbnail_paths, vec!["thumb_scan.pdf_1.png"]);
        assert!(!dir.join("scan.pdf_1.png.txt").exists());
        assert!(!dir.join("scan.pdf_10.png.txt").exists());
        assert_eq!(migrate_dir(&dir).unwrap(), 0);
    }

    #[test]
    fn appends_to_existing_sidecar() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = legacy_layout(tmp.path());
        let mut existing = MetaData::new("Bank letter");
        existing.text = "first page".to_string();
        existing.tags = vec!["bank".to_string()];
        existing.save(&dir.join("scan.pdf.json")).unwrap();

        migrate_dir(&dir).unwrap();

        let metadata = MetaData::load(&dir.join("scan.pdf.json")).unwrap();
        assert_eq!(metadata.title, "Bank letter");
        assert_eq!(metadata.tags, vec!["bank"]);
        assert_eq!(metadata.text, "first page\n\nsecond page\n\ntenth page");
    }

    #[test]
    fn migrate_roots_finds_nested_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("2019");
        std::fs::create_dir(&nested).unwrap();
        legacy_layout(tmp.path());
        legacy_layout(&nested);

        let migrated =
            migrate_roots(&Walker::default(), &[tmp.path().to_path_buf()]);
        assert_eq!(migrated, 2);
        assert!(sidecar::is_already_extracted(&nested.join("scan.pdf")));
    }
}
