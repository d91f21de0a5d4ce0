use std::path::Path;

use crate::{
    error::Result,
    extractor::{Extractor, has_extension},
    metadata::MetaData,
};

/// Stores an HTML file's raw content as the document text. No OCR, no
/// thumbnail. Bytes that are not UTF-8 become U+FFFD.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlExtractor;

impl Extractor for HtmlExtractor {
    fn identifier(&self) -> &'static str {
        "html"
    }

    fn accepts(&self, path: &Path) -> bool {
        has_extension(path, &["html", "htm"])
    }

    fn convert(&self, path: &Path) -> Result<MetaData> {
        let bytes = std::fs::read(path)?;
        let text = String::from_utf8_lossy(&bytes).into_owned();

        let mut metadata = MetaData::synthesize(path);
        metadata.thumbnail_paths.clear();
        metadata.text = text;
        Ok(metadata)
    }
}
