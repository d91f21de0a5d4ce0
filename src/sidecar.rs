//! Path algebra between original documents and their sidecar files.
//!
//! Every original `dir/name` owns a hidden directory `dir/.docarchive/`
//! holding its metadata sidecar (`name.json`), its thumbnail
//! (`thumb_name.png`) and, while extraction runs, per-page scratch files.
//! All functions here are pure path manipulation except
//! [`is_already_extracted`], which checks the filesystem.

use std::{
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
};

use crate::{
    error::{Error, Result},
    metadata::MetaData,
};

/// Name of the hidden directory that sits next to originals.
pub const METADATA_DIR: &str = ".docarchive";

/// Appended to the original file name to form the sidecar name.
pub const SIDECAR_SUFFIX: &str = ".json";

pub const THUMBNAIL_PREFIX: &str = "thumb_";

fn file_name(original: &Path) -> &OsStr {
    original.file_name().unwrap_or_default()
}

fn decorated(original: &Path, prefix: &str, suffix: &str) -> PathBuf {
    let mut name = OsString::from(prefix);
    name.push(file_name(original));
    name.push(suffix);
    metadata_dir(original).join(name)
}

/// The hidden directory holding sidecars for `original`'s siblings.
pub fn metadata_dir(original: &Path) -> PathBuf {
    original
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(METADATA_DIR)
}

/// `original.parent / .docarchive / original.name + ".json"`.
pub fn sidecar_path(original: &Path) -> PathBuf {
    decorated(original, "", SIDECAR_SUFFIX)
}

/// Inverse of [`sidecar_path`].
///
/// Fails with [`Error::NotASidecar`] if `sidecar` does not live directly in
/// a metadata directory or lacks the sidecar suffix.
pub fn original_path(sidecar: &Path) -> Result<PathBuf> {
    let not_a_sidecar = || Error::NotASidecar(sidecar.to_path_buf());

    let dir = sidecar.parent().ok_or_else(not_a_sidecar)?;
    if dir.file_name() != Some(OsStr::new(METADATA_DIR)) {
        return Err(not_a_sidecar());
    }

    let name = sidecar
        .file_name()
        .and_then(OsStr::to_str)
        .and_then(|n| n.strip_suffix(SIDECAR_SUFFIX))
        .filter(|n| !n.is_empty())
        .ok_or_else(not_a_sidecar)?;

    let parent = dir.parent().unwrap_or_else(|| Path::new(""));
    Ok(parent.join(name))
}

/// Original document path of a loaded or saved record.
///
/// Fails with [`Error::MissingFilePath`] when the record was built in memory
/// and never associated with a sidecar location.
pub fn original_path_of(metadata: &MetaData) -> Result<PathBuf> {
    let sidecar = metadata.sidecar_path().ok_or(Error::MissingFilePath)?;
    original_path(sidecar)
}

/// Whether `original` already has a sidecar. Sidecar presence is the only
/// marker for "processed".
pub fn is_already_extracted(original: &Path) -> bool {
    sidecar_path(original).exists()
}

/// Whether `path` looks like a sidecar (right directory, right suffix).
pub fn is_sidecar(path: &Path) -> bool {
    original_path(path).is_ok()
}

/// Thumbnail location for `original`.
pub fn thumbnail_path(original: &Path) -> PathBuf {
    decorated(original, THUMBNAIL_PREFIX, ".png")
}

/// Rasterized image of page `page` (1-based) used during extraction.
pub fn page_image_path(original: &Path, page: usize) -> PathBuf {
    decorated(original, "", &format!("_{page}.png"))
}

/// Output base handed to the OCR engine for page `page`; the engine
/// appends `.txt`.
pub fn ocr_output_base(original: &Path, page: usize) -> PathBuf {
    decorated(original, "", &format!("_{page}"))
}
