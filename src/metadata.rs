use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
    time::SystemTime,
};

use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    error::{Error, Result},
    sidecar,
};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Metadata of one archived document, persisted as its JSON sidecar.
///
/// Only `title`, `text`, `tags` and `thumbnailPaths` are stored. The sidecar
/// location and the last-update time are runtime attributes: they are set
/// when a record is loaded from or saved to disk.
///
/// # Examples
///
/// ```
/// use docarchive::MetaData;
///
/// let mut meta = MetaData::new("invoice.pdf");
/// meta.text = "Invoice #42".to_string();
/// let json = serde_json::to_string(&meta).unwrap();
/// assert!(json.contains("\"thumbnailPaths\":[]"));
/// assert!(meta.sidecar_path().is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    /// Thumbnail file names inside the metadata directory; the first one is
    /// the primary preview.
    #[serde(default, deserialize_with = "null_as_default")]
    pub thumbnail_paths: Vec<String>,
    #[serde(skip)]
    sidecar_path: Option<PathBuf>,
    #[serde(skip)]
    last_update: Option<SystemTime>,
}

fn null_as_default<'de, D, T>(
    deserializer: D,
) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl MetaData {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Minimal record for `original`, used when a sidecar is missing or
    /// unreadable: the title is the file name, and an existing thumbnail is
    /// adopted.
    pub fn synthesize(original: &Path) -> Self {
        let title = original
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut metadata = Self::new(title);

        let thumbnail = sidecar::thumbnail_path(original);
        if thumbnail.is_file()
            && let Some(name) = thumbnail.file_name()
        {
            metadata
                .thumbnail_paths
                .push(name.to_string_lossy().into_owned());
        }
        metadata
    }

    /// Load a sidecar file.
    ///
    /// The last-update time is taken from the sidecar's mtime. Thumbnail
    /// entries written as full paths by older versions are reduced to their
    /// file names.
    pub fn load(sidecar_path: &Path) -> Result<Self> {
        let bytes = std::fs::read(sidecar_path)?;
        let mut metadata: Self = serde_json::from_slice(&bytes)?;

        metadata.last_update =
            Some(std::fs::metadata(sidecar_path)?.modified()?);
        metadata.sidecar_path = Some(sidecar_path.to_path_buf());

        for thumbnail in &mut metadata.thumbnail_paths {
            if let Some(name) = Path::new(thumbnail.as_str()).file_name() {
                *thumbnail = name.to_string_lossy().into_owned();
            }
        }

        Ok(metadata)
    }

    /// Write the record to `sidecar_path`, creating the metadata directory if
    /// needed, and stamp it as updated now.
    ///
    /// The file is written next to its destination and renamed into place so
    /// a concurrent reader never sees a half-written sidecar.
    pub fn save(&mut self, sidecar_path: &Path) -> Result<()> {
        if let Some(dir) = sidecar_path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        // Unique per writer; concurrent saves of one sidecar never share it.
        let mut tmp = sidecar_path.as_os_str().to_os_string();
        tmp.push(format!(
            ".{}.{}.tmp",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let tmp = PathBuf::from(tmp);

        let written = std::fs::write(&tmp, serde_json::to_vec_pretty(self)?)
            .and_then(|()| std::fs::rename(&tmp, sidecar_path));
        if let Err(e) = written {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        self.sidecar_path = Some(sidecar_path.to_path_buf());
        self.last_update = Some(SystemTime::now());
        Ok(())
    }

    /// Re-save the record at the location it was loaded from.
    pub fn save_in_place(&mut self) -> Result<()> {
        let path = self.sidecar_path.clone().ok_or(Error::MissingFilePath)?;
        self.save(&path)
    }

    pub fn sidecar_path(&self) -> Option<&Path> {
        self.sidecar_path.as_deref()
    }

    pub fn last_update(&self) -> Option<SystemTime> {
        self.last_update
    }

    /// The document this record describes.
    pub fn original_path(&self) -> Result<PathBuf> {
        sidecar::original_path_of(self)
    }

    /// Absolute path of the primary thumbnail, if any.
    pub fn primary_thumbnail(&self) -> Option<PathBuf> {
        let dir = self.sidecar_path.as_deref()?.parent()?;
        self.thumbnail_paths.first().map(|name| dir.join(name))
    }
}
