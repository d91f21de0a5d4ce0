#![cfg(unix)]

mod common;

use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant, SystemTime},
};

use docarchive::{
    Archive,
    DocumentFinder,
    ExtractorRegistry,
    MetaData,
    Walker,
    process::ProcessRunner,
    runners::{GraphicsMagick, Pdftoppm, Tesseract, Toolchain},
    sidecar,
};

struct Fixture {
    _tmp: tempfile::TempDir,
    root: PathBuf,
    bin: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("archive");
        let bin = tmp.path().join("bin");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(&bin).unwrap();
        Self {
            _tmp: tmp,
            root,
            bin,
        }
    }

    fn write(&self, name: &str, bytes: impl AsRef<[u8]>) -> PathBuf {
        let path = self.root.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn archive_with(&self, tools: Toolchain) -> Archive {
        Archive::new(
            vec![self.root.clone()],
            Walker::default(),
            ExtractorRegistry::standard(tools),
        )
    }

    fn archive(&self) -> Archive {
        self.archive_with(common::fake_toolchain(
            &self.bin,
            ProcessRunner::new(Some(Duration::from_secs(60))),
        ))
    }

    fn finder(&self, cap: usize) -> DocumentFinder {
        DocumentFinder::new(
            vec![self.root.clone()],
            Walker::default(),
            cap,
            Duration::from_secs(48 * 3600),
        )
    }
}

fn load(original: &Path) -> MetaData {
    MetaData::load(&sidecar::sidecar_path(original)).unwrap()
}

fn set_sidecar_mtime(original: &Path, time: SystemTime) {
    std::fs::File::options()
        .write(true)
        .open(sidecar::sidecar_path(original))
        .unwrap()
        .set_modified(time)
        .unwrap();
}

fn found_paths(findings: &[docarchive::Finding]) -> Vec<PathBuf> {
    findings.iter().map(|f| f.file_path().to_path_buf()).collect()
}

#[test]
fn text_pdf_is_extracted_thumbnailed_and_searchable() {
    let fx = Fixture::new();
    let invoice = fx.write("invoice.pdf", common::pdf_with_pages(&["Invoice #42"]));

    let report = fx.archive().run_cycle();
    assert_eq!(report.extracted(), 1, "{report:?}");
    assert!(report.failures.is_empty());

    let metadata = load(&invoice);
    assert!(metadata.text.contains("Invoice #42"), "text: {:?}", metadata.text);
    assert_eq!(metadata.title, "invoice.pdf");
    assert_eq!(metadata.thumbnail_paths, vec!["thumb_invoice.pdf.png"]);
    assert!(sidecar::thumbnail_path(&invoice).is_file());
    assert_eq!(
        common::file_names(&sidecar::metadata_dir(&invoice)),
        ["invoice.pdf.json", "thumb_invoice.pdf.png"]
    );

    let finder = fx.finder(100);
    assert_eq!(found_paths(&finder.find("42")), vec![invoice.clone()]);
    assert_eq!(found_paths(&finder.find("#42")), vec![invoice]);
    assert!(finder.find("nomatch").is_empty());
}

#[test]
fn html_text_is_stored_verbatim_without_thumbnail() {
    let fx = Fixture::new();
    let html = "<html><body>Hello World</body></html>";
    let note = fx.write("note.html", html);

    fx.archive().run_cycle();

    let metadata = load(&note);
    assert_eq!(metadata.text, html);
    assert!(metadata.thumbnail_paths.is_empty());
    assert!(!sidecar::thumbnail_path(&note).exists());
    assert_eq!(found_paths(&fx.finder(100).find("hello")), vec![note]);
}

#[test]
fn scanned_pdf_is_ocred_page_by_page() {
    let fx = Fixture::new();
    let scan = fx.write("scan.pdf", common::pdf_with_pages(&["", ""]));

    let report = fx.archive().run_cycle();
    assert_eq!(report.extracted(), 1, "{report:?}");

    let metadata = load(&scan);
    assert_eq!(
        metadata.text,
        "Scanned text from scan.pdf_1.png\n\nScanned text from scan.pdf_2.png"
    );
    assert!(sidecar::thumbnail_path(&scan).is_file());
    assert_eq!(
        common::file_names(&sidecar::metadata_dir(&scan)),
        ["scan.pdf.json", "thumb_scan.pdf.png"]
    );

    let found = fx.finder(100).find("scanned");
    assert_eq!(found_paths(&found), vec![scan]);
    assert!(found[0].context.contains(" … "));
}

#[test]
fn second_cycle_is_a_no_op() {
    let fx = Fixture::new();
    let pdf = fx.write("a.pdf", common::pdf_with_pages(&["Idempotent text"]));
    let html = fx.write("sub/b.html", "<p>b</p>");
    let archive = fx.archive();

    assert_eq!(archive.run_cycle().extracted(), 2);
    let before: Vec<Vec<u8>> = [&pdf, &html]
        .iter()
        .map(|p| std::fs::read(sidecar::sidecar_path(p)).unwrap())
        .collect();

    let report = archive.run_cycle();
    assert_eq!(report.discovered, 2);
    assert_eq!(report.pending(), 0);
    assert_eq!(report.extracted(), 0);
    let after: Vec<Vec<u8>> = [&pdf, &html]
        .iter()
        .map(|p| std::fs::read(sidecar::sidecar_path(p)).unwrap())
        .collect();
    assert_eq!(before, after);
}

#[test]
fn results_are_newest_first_with_path_tiebreak() {
    let fx = Fixture::new();
    let docs: Vec<PathBuf> = ["a.html", "b.html", "c.html", "D.html"]
        .iter()
        .map(|name| fx.write(name, "shared keyword"))
        .collect();
    fx.archive().run_cycle();

    let now = SystemTime::now();
    let at = |secs| now - Duration::from_secs(secs);
    set_sidecar_mtime(&docs[0], at(200));
    set_sidecar_mtime(&docs[1], at(300));
    set_sidecar_mtime(&docs[2], at(100));
    set_sidecar_mtime(&docs[3], at(200));

    let found = fx.finder(100).find("keyword");
    assert_eq!(
        found_paths(&found),
        vec![
            docs[2].clone(),
            docs[0].clone(),
            docs[3].clone(),
            docs[1].clone()
        ]
    );
}

#[test]
fn deleted_originals_disappear_from_results() {
    let fx = Fixture::new();
    let keep = fx.write("keep.html", "ephemeral content");
    let gone = fx.write("gone.html", "ephemeral content");
    fx.archive().run_cycle();
    std::fs::remove_file(&gone).unwrap();

    let finder = fx.finder(100);
    assert_eq!(found_paths(&finder.find("ephemeral")), vec![keep.clone()]);
    assert!(!sidecar::sidecar_path(&gone).exists());
    assert!(sidecar::sidecar_path(&keep).exists());
    assert_eq!(found_paths(&finder.find("ephemeral")), vec![keep]);
}

#[test]
fn newest_is_bounded_by_window_and_cap() {
    let fx = Fixture::new();
    let docs: Vec<PathBuf> = (0..5)
        .map(|i| fx.write(&format!("doc{i}.html"), "x"))
        .collect();
    fx.archive().run_cycle();
    set_sidecar_mtime(&docs[0], SystemTime::now() - Duration::from_secs(49 * 3600));

    let newest = fx.finder(100).find_newest();
    assert_eq!(newest.len(), 4);
    assert!(!found_paths(&newest).contains(&docs[0]));

    assert_eq!(fx.finder(2).find_newest().len(), 2);
}

#[test]
fn overlapping_roots_yield_one_finding_per_document() {
    let fx = Fixture::new();
    let nested = fx.write("letters/bank.html", "overdraft notice");
    fx.archive().run_cycle();

    let finder = DocumentFinder::new(
        vec![fx.root.clone(), fx.root.join("letters")],
        Walker::default(),
        100,
        Duration::from_secs(3600),
    );
    assert_eq!(found_paths(&finder.find("overdraft")), vec![nested]);
}

#[test]
fn cap_counts_distinct_documents_across_overlapping_roots() {
    let fx = Fixture::new();
    for name in ["letters/a.html", "letters/b.html", "z/c.html", "z/d.html"] {
        fx.write(name, "quarterly statement");
    }
    fx.archive().run_cycle();

    let finder = DocumentFinder::new(
        vec![fx.root.join("letters"), fx.root.clone()],
        Walker::default(),
        3,
        Duration::from_secs(3600),
    );
    let found = found_paths(&finder.find("statement"));
    assert_eq!(found.len(), 3, "{found:?}");
    let mut unique = found.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 3);
}

#[test]
fn latin1_html_is_extracted_once() {
    let fx = Fixture::new();
    let brief = fx.write("brief.html", b"<p>Gr\xfc\xdfe aus Wien</p>");
    let archive = fx.archive();

    let report = archive.run_cycle();
    assert_eq!(report.extracted(), 1, "{report:?}");
    assert!(report.failures.is_empty());
    assert!(load(&brief).text.contains('\u{FFFD}'));

    let report = archive.run_cycle();
    assert_eq!(report.pending(), 0);
    assert_eq!(found_paths(&fx.finder(100).find("wien")), vec![brief]);
}

#[test]
fn hung_ocr_fails_only_the_page() {
    let fx = Fixture::new();
    let scan = fx.write("scan.pdf", common::pdf_with_pages(&[""]));
    let runner = ProcessRunner::new(Some(Duration::from_secs(1)));
    let mut tools = common::fake_toolchain(&fx.bin, runner);
    tools.tesseract = Tesseract::new(
        common::write_script(&fx.bin, "slow-tesseract", "exec sleep 30"),
        runner,
    );

    let started = Instant::now();
    let report = fx.archive_with(tools).run_cycle();
    assert!(started.elapsed() < Duration::from_secs(20));
    assert_eq!(report.extracted(), 1);

    let metadata = load(&scan);
    assert!(metadata.text.is_empty());
    assert_eq!(metadata.thumbnail_paths, vec!["thumb_scan.pdf.png"]);
}

#[test]
fn missing_tools_still_persist_text() {
    let fx = Fixture::new();
    let pdf = fx.write("plain.pdf", common::pdf_with_pages(&["Plain text layer"]));
    let runner = ProcessRunner::default();
    let tools = Toolchain {
        graphicsmagick: GraphicsMagick::new("/nonexistent/gm", runner),
        tesseract: Tesseract::new("/nonexistent/tesseract", runner),
        pdftoppm: Pdftoppm::new("/nonexistent/pdftoppm", runner),
    };

    let report = fx.archive_with(tools).run_cycle();
    assert_eq!(report.extracted(), 1);
    let metadata = load(&pdf);
    assert!(metadata.text.contains("Plain text layer"));
    assert!(metadata.thumbnail_paths.is_empty());
}

#[test]
fn hidden_and_os_metadata_dirs_are_not_scanned() {
    let fx = Fixture::new();
    fx.write(".private/secret.html", "hidden");
    fx.write("@eaDir/thumb.html", "synology");
    fx.write("visible.html", "visible");

    let config = docarchive::Config::default();
    let archive = Archive::new(
        vec![fx.root.clone()],
        Walker::new(config.exclude_set().unwrap()),
        ExtractorRegistry::standard(Toolchain::from_config(&config)),
    );
    let report = archive.run_cycle();
    assert_eq!(report.discovered, 1);
    assert_eq!(report.extracted(), 1);
}
