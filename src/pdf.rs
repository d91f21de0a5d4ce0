//! PDF extraction: embedded text first, per-page OCR for scanned files.
//!
//! Page 1 is always rasterized for the thumbnail. When the embedded text is
//! blank every page is rasterized, cleaned up for OCR and fed to tesseract.
//! A failing tool only costs the page it was working on; the record is
//! still written with whatever text was gathered.

use std::{
    ffi::OsString,
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use crate::{
    error::{Error, Result},
    extractor::{Extractor, has_extension},
    metadata::MetaData,
    runners::Toolchain,
    sidecar,
};

#[derive(Debug, Clone)]
pub struct PdfExtractor {
    tools: Toolchain,
}

/// Removes intermediate files when dropped, whatever the outcome.
struct Scratch(Vec<PathBuf>);

impl Drop for Scratch {
    fn drop(&mut self) {
        for path in &self.0 {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot remove scratch file");
                }
            }
        }
    }
}

impl PdfExtractor {
    pub fn new(tools: Toolchain) -> Self {
        Self { tools }
    }

    /// Rasterize `page` into the metadata directory. `None` when the
    /// rasterizer ran but produced nothing usable.
    fn render(&self, pdf: &Path, page: usize) -> Result<Option<PathBuf>> {
        let image = sidecar::page_image_path(pdf, page);
        // -singlefile appends ".png" to the prefix.
        let prefix = sidecar::ocr_output_base(pdf, page);
        let code = self.tools.pdftoppm.render_page(pdf, page, &prefix)?;
        if code != 0 || !image.is_file() {
            warn!(path = %pdf.display(), page, code, "page rasterization failed");
            return Ok(None);
        }
        Ok(Some(image))
    }

    /// Thumbnail file name when one was written.
    fn thumbnail(&self, pdf: &Path, page_image: &Path) -> Option<String> {
        let thumbnail = sidecar::thumbnail_path(pdf);
        match self.tools.graphicsmagick.thumbnail(page_image, &thumbnail) {
            Ok(0) if thumbnail.is_file() => thumbnail
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
            Ok(code) => {
                warn!(path = %pdf.display(), code, "thumbnail generation failed");
                None
            }
            Err(e) => {
                warn!(path = %pdf.display(), error = %e, "thumbnail generation failed");
                None
            }
        }
    }

    fn ocr(&self, pdf: &Path, page: usize, page_image: &Path) -> Result<String> {
        let code = self.tools.graphicsmagick.prepare_for_ocr(page_image)?;
        if code != 0 {
            debug!(path = %pdf.display(), page, code, "OCR preparation failed, using raw page image");
        }

        let base = sidecar::ocr_output_base(pdf, page);
        let mut txt = OsString::from(base.as_os_str());
        txt.push(".txt");
        let txt = PathBuf::from(txt);
        let _scratch = Scratch(vec![txt.clone()]);

        let code = self.tools.tesseract.run(page_image, &base)?;
        if code != 0 {
            debug!(path = %pdf.display(), page, code, "tesseract exited non-zero");
        }
        Ok(std::fs::read_to_string(&txt)?)
    }

    /// Rasterize one page, thumbnail it if `thumbnail` is still empty and
    /// page 1 is being handled, then optionally OCR it.
    fn process_page(
        &self,
        pdf: &Path,
        page: usize,
        with_ocr: bool,
        thumbnail: &mut Option<String>,
    ) -> Result<Option<String>> {
        let _scratch = Scratch(vec![sidecar::page_image_path(pdf, page)]);
        let Some(image) = self.render(pdf, page)? else {
            return Ok(None);
        };

        // Before OCR preparation rewrites the image in place.
        if page == 1 && thumbnail.is_none() {
            *thumbnail = self.thumbnail(pdf, &image);
        }

        if !with_ocr {
            return Ok(None);
        }
        self.ocr(pdf, page, &image).map(Some)
    }
}

impl Extractor for PdfExtractor {
    fn identifier(&self) -> &'static str {
        "pdf"
    }

    fn accepts(&self, path: &Path) -> bool {
        has_extension(path, &["pdf"])
    }

    fn convert(&self, path: &Path) -> Result<MetaData> {
        let bytes = std::fs::read(path)?;
        let mut metadata = MetaData::synthesize(path);
        metadata.thumbnail_paths.clear();
        let mut thumbnail = None;

        let text = embedded_text(path, &bytes).unwrap_or_default();
        if text.trim().is_empty() {
            let pages = page_count(&bytes).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "cannot count pages, trying page 1 only");
                1
            });
            info!(path = %path.display(), pages, "no embedded text, running OCR");

            let mut texts = Vec::new();
            for page in 1..=pages {
                match self.process_page(path, page, true, &mut thumbnail) {
                    Ok(Some(text)) if !text.trim().is_empty() => {
                        texts.push(text.trim_end().to_string());
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(path = %path.display(), page, error = %e, "page OCR failed");
                    }
                }
            }
            metadata.text = texts.join("\n\n");
        } else {
            metadata.text = text;
            if let Err(e) = self.process_page(path, 1, false, &mut thumbnail) {
                warn!(path = %path.display(), error = %e, "cannot render thumbnail page");
            }
        }

        metadata.thumbnail_paths.extend(thumbnail);
        Ok(metadata)
    }
}

/// Text embedded in the PDF, or `None` when the parser fails or panics.
fn embedded_text(path: &Path, bytes: &[u8]) -> Option<String> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(bytes)
    }));
    match result {
        Ok(Ok(text)) => Some(text),
        Ok(Err(e)) => {
            debug!(path = %path.display(), error = %e, "no embedded text");
            None
        }
        Err(_) => {
            warn!(path = %path.display(), "PDF text extraction panicked");
            None
        }
    }
}

fn page_count(bytes: &[u8]) -> Result<usize> {
    let document = lopdf::Document::load_mem(bytes)
        .map_err(|e| Error::Pdf(e.to_string()))?;
    match document.get_pages().len() {
        0 => Err(Error::Pdf("document has no pages".to_string())),
        n => Ok(n),
    }
}
