//! docarchive - scan, OCR and search a document archive through sidecar
//! metadata.
//!
//! Documents stay where the user keeps them. Next to every directory
//! holding documents, docarchive maintains a hidden `.docarchive/`
//! directory with one JSON sidecar per document (title, extracted text,
//! tags, thumbnails). PDFs are read directly when they carry text and
//! OCRed page by page through `pdftoppm`, GraphicsMagick and `tesseract`
//! when they do not. Search is a parallel substring scan over the
//! sidecars; there is no index to keep in sync.
//!
//! # Quick start
//!
//! ```no_run
//! use docarchive::{Archive, Config, DocumentFinder};
//!
//! let config = Config::resolve(None).unwrap();
//!
//! let report = Archive::from_config(&config).unwrap().run_cycle();
//! println!("extracted {} document(s)", report.extracted());
//!
//! let finder = DocumentFinder::from_config(&config).unwrap();
//! for finding in finder.find("invoice 2024") {
//!     println!("{}: {}", finding.file_path().display(), finding.context);
//! }
//! ```

pub mod archive;
pub mod cli;
pub mod collection;
pub mod config;
pub mod error;
pub mod extractor;
pub mod finder;
pub mod finding;
pub mod html;
pub mod legacy;
pub mod metadata;
pub mod output;
pub mod pdf;
pub mod process;
pub mod runners;
pub mod scheduler;
pub mod sidecar;
pub mod text_util;
pub mod walker;

pub use archive::{Archive, ArchiveState, CycleReport};
pub use config::Config;
pub use error::{Error, Result};
pub use extractor::{Extraction, Extractor, ExtractorRegistry};
pub use finder::DocumentFinder;
pub use finding::Finding;
pub use metadata::MetaData;
pub use scheduler::Scheduler;
pub use walker::Walker;
