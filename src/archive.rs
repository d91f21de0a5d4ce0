//! Scan cycle orchestration: walk the roots, classify files, extract the
//! ones without a sidecar.

use std::{
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
    time::Instant,
};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    collection::ExtractionCollection,
    config::Config,
    error::Result,
    extractor::{Extraction, Extractor, ExtractorRegistry},
    runners::Toolchain,
    walker::Walker,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveState {
    Idle,
    Scanning,
    Extracting,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractorReport {
    pub extractor: &'static str,
    /// Accepted files found during the walk.
    pub collected: usize,
    /// Accepted files without a sidecar when extraction started.
    pub pending: usize,
    pub extracted: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionFailure {
    pub extractor: &'static str,
    pub path: PathBuf,
    pub error: String,
}

/// What one scan cycle did. Failed paths keep no sidecar and are retried
/// by the next cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub discovered: usize,
    pub extractors: Vec<ExtractorReport>,
    pub failures: Vec<ExtractionFailure>,
    pub unreadable_roots: Vec<PathBuf>,
}

impl CycleReport {
    pub fn extracted(&self) -> usize {
        self.extractors.iter().map(|e| e.extracted).sum()
    }

    pub fn pending(&self) -> usize {
        self.extractors.iter().map(|e| e.pending).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractorStatus {
    pub extractor: &'static str,
    pub discovered: usize,
    pub extracted: usize,
}

/// Ties the walk, the extractor registry and the sidecar store together.
///
/// Cycles are serialized: a cycle started while another one runs waits for
/// it to finish.
#[derive(Debug)]
pub struct Archive {
    roots: Vec<PathBuf>,
    walker: Walker,
    registry: ExtractorRegistry,
    state: Mutex<ArchiveState>,
    cycle: Mutex<()>,
}

/// Puts the archive back to idle when a cycle ends, even by panic.
struct IdleOnDrop<'a>(&'a Archive);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.set_state(ArchiveState::Idle);
    }
}

impl Archive {
    pub fn new(
        roots: Vec<PathBuf>,
        walker: Walker,
        registry: ExtractorRegistry,
    ) -> Self {
        Self {
            roots,
            walker,
            registry,
            state: Mutex::new(ArchiveState::Idle),
            cycle: Mutex::new(()),
        }
    }

    /// Archive over the configured roots with the standard extractors.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            config.roots(),
            Walker::new(config.exclude_set()?),
            ExtractorRegistry::standard(Toolchain::from_config(config)),
        ))
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn walker(&self) -> &Walker {
        &self.walker
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    pub fn state(&self) -> ArchiveState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ArchiveState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Walk every root and group accepted files by extractor.
    fn collect(&self, report: &mut CycleReport) -> ExtractionCollection {
        let mut collection = ExtractionCollection::new();
        for root in &self.roots {
            let files = match self.walker.discover_documents(root) {
                Ok(files) => files,
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "cannot scan root");
                    report.unreadable_roots.push(root.clone());
                    continue;
                }
            };
            debug!(root = %root.display(), files = files.len(), "walked root");

            report.discovered += files.len();
            for file in files {
                for extractor in self.registry.classify(&file) {
                    collection.add(extractor, file.clone());
                }
            }
        }
        collection
    }

    /// Run one scan and extract cycle over all roots.
    pub fn run_cycle(&self) -> CycleReport {
        let _cycle = self.cycle.lock().unwrap_or_else(PoisonError::into_inner);
        let _idle = IdleOnDrop(self);
        let started = Instant::now();

        self.set_state(ArchiveState::Scanning);
        let mut report = CycleReport::default();
        let collection = self.collect(&mut report);

        self.set_state(ArchiveState::Extracting);
        for extractor in self.registry.iter() {
            let id = extractor.identifier();
            let pending = collection.pending(id);
            let (extracted, failures) = extract_all(extractor, &pending);

            report.extractors.push(ExtractorReport {
                extractor: id,
                collected: collection.len_for(id),
                pending: pending.len(),
                extracted,
            });
            report.failures.extend(failures);
        }

        for failure in &report.failures {
            warn!(
                extractor = failure.extractor,
                path = %failure.path.display(),
                error = %failure.error,
                "extraction failed, will retry next cycle"
            );
        }
        info!(
            discovered = report.discovered,
            pending = report.pending(),
            extracted = report.extracted(),
            failed = report.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scan cycle finished"
        );
        report
    }

    /// Per-extractor counts of accepted files and of those with a sidecar.
    /// Walks the roots but extracts nothing.
    pub fn status(&self) -> Vec<ExtractorStatus> {
        let mut scratch = CycleReport::default();
        let collection = self.collect(&mut scratch);
        self.registry
            .iter()
            .map(|e| {
                let id = e.identifier();
                let discovered = collection.len_for(id);
                ExtractorStatus {
                    extractor: id,
                    discovered,
                    extracted: discovered - collection.pending(id).len(),
                }
            })
            .collect()
    }
}

/// Extract `pending` in parallel. Every path is isolated: an error or a
/// panic is recorded and the rest of the batch carries on.
fn extract_all(
    extractor: &dyn Extractor,
    pending: &[&Path],
) -> (usize, Vec<ExtractionFailure>) {
    let id = extractor.identifier();
    let total = pending.len();
    if total == 0 {
        debug!(extractor = id, "nothing to extract");
        return (0, Vec::new());
    }
    info!(extractor = id, pending = total, "extracting");

    let done = std::sync::atomic::AtomicUsize::new(0);
    let outcomes: Vec<std::result::Result<bool, ExtractionFailure>> = pending
        .par_iter()
        .map(|path| {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| extractor.extract(path)));

            let n = done.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
            let percent = n * 100 / total;
            if percent / 10 > (n - 1) * 100 / total / 10 {
                info!(extractor = id, percent, done = n, total, "extraction progress");
            }

            let failure = |error: String| ExtractionFailure {
                extractor: id,
                path: path.to_path_buf(),
                error,
            };
            match outcome {
                Ok(Ok(Extraction::Extracted(_))) => {
                    debug!(extractor = id, path = %path.display(), "extracted");
                    Ok(true)
                }
                Ok(Ok(Extraction::AlreadyExtracted)) => Ok(false),
                Ok(Err(e)) => Err(failure(e.to_string())),
                Err(_) => Err(failure("extractor panicked".to_string())),
            }
        })
        .collect();

    let mut extracted = 0;
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(true) => extracted += 1,
            Ok(false) => {}
            Err(failure) => failures.push(failure),
        }
    }
    (extracted, failures)
}
