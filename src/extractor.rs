//! Pluggable converters from one document type into a metadata sidecar.

use std::path::Path;

use tracing::debug;

use crate::{
    error::Result,
    html::HtmlExtractor,
    metadata::MetaData,
    pdf::PdfExtractor,
    runners::Toolchain,
    sidecar,
};

/// Outcome of [`Extractor::extract`] for one path.
#[derive(Debug)]
pub enum Extraction {
    /// A new sidecar was written.
    Extracted(MetaData),
    /// A sidecar was already present; nothing was done.
    AlreadyExtracted,
}

/// A converter for one document type.
///
/// Implementations only provide [`convert`](Extractor::convert); the
/// provided [`extract`](Extractor::extract) handles the idempotency check
/// and writes the sidecar.
pub trait Extractor: Send + Sync {
    /// Stable tag used for grouping and reporting.
    fn identifier(&self) -> &'static str;

    /// Whether `path` is a document this extractor handles.
    fn accepts(&self, path: &Path) -> bool;

    /// Build the metadata record for `path`. May write thumbnails into the
    /// metadata directory, which exists by the time this is called.
    fn convert(&self, path: &Path) -> Result<MetaData>;

    /// Convert `path` and persist its sidecar, unless one already exists.
    fn extract(&self, path: &Path) -> Result<Extraction> {
        if sidecar::is_already_extracted(path) {
            debug!(path = %path.display(), "already extracted");
            return Ok(Extraction::AlreadyExtracted);
        }

        std::fs::create_dir_all(sidecar::metadata_dir(path))?;
        let mut metadata = self.convert(path)?;
        metadata.save(&sidecar::sidecar_path(path))?;
        Ok(Extraction::Extracted(metadata))
    }
}

/// Case-insensitive extension test shared by the built-in extractors.
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            extensions.iter().any(|want| ext.eq_ignore_ascii_case(want))
        })
}

/// The registered extractors, consulted in insertion order.
#[derive(Default)]
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// PDF first, then HTML.
    pub fn standard(tools: Toolchain) -> Self {
        let mut registry = Self::new();
        registry.register(PdfExtractor::new(tools));
        registry.register(HtmlExtractor);
        registry
    }

    pub fn register(&mut self, extractor: impl Extractor + 'static) {
        self.extractors.push(Box::new(extractor));
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Extractor> {
        self.extractors.iter().map(|e| e.as_ref())
    }

    pub fn get(&self, identifier: &str) -> Option<&dyn Extractor> {
        self.iter().find(|e| e.identifier() == identifier)
    }

    /// Identifiers of every extractor accepting `path`, in registry order.
    pub fn classify(&self, path: &Path) -> Vec<&'static str> {
        self.iter()
            .filter(|e| e.accepts(path))
            .map(|e| e.identifier())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.iter().map(|e| e.identifier()))
            .finish()
    }
}
