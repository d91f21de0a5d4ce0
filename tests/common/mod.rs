#![allow(dead_code)]

use std::{
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use docarchive::{
    process::ProcessRunner,
    runners::{GraphicsMagick, Pdftoppm, Tesseract, Toolchain},
};

/// Minimal PDF with one page per entry of `pages`, each showing its text in
/// Helvetica. An empty entry yields a page with an empty content stream,
/// which reads like a scanned page without a text layer.
///
/// Body first, then the xref table with the real byte offsets, so both
/// pdf-extract and lopdf can parse it.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let n = pages.len();
    let font_id = 3 + 2 * n;

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {n} >>",
            (0..n)
                .map(|i| format!("{} 0 R", 3 + 2 * i))
                .collect::<Vec<_>>()
                .join(" ")
        ),
    ];
    for (i, text) in pages.iter().enumerate() {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Contents {} 0 R /Resources << /Font << /F1 {font_id} 0 R >> >> >>",
            4 + 2 * i
        ));
        let content = if text.is_empty() {
            String::new()
        } else {
            format!("BT /F1 12 Tf 100 700 Td ({text}) Tj ET")
        };
        objects.push(format!(
            "<< /Length {} >>\nstream\n{content}\nendstream",
            content.len()
        ));
    }
    objects.push(
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    );

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{xref_start}\n%%EOF\n",
            objects.len() + 1
        )
        .as_bytes(),
    );
    out
}

pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .unwrap();
    path
}

/// Stand-ins for pdftoppm, gm and tesseract.
///
/// * pdftoppm writes a placeholder image to `<prefix>.png`.
/// * gm writes a placeholder to its last argument unless it exists (so the
///   in-place OCR preparation is a no-op and thumbnailing creates a file).
/// * tesseract writes `Scanned text from <image name>` to `<base>.txt`.
pub fn fake_tool_bins(dir: &Path) -> (PathBuf, PathBuf, PathBuf) {
    std::fs::create_dir_all(dir).unwrap();
    let gm = write_script(
        dir,
        "gm",
        r#"for last; do :; done; [ -e "$last" ] || printf THUMB > "$last""#,
    );
    let tesseract = write_script(
        dir,
        "tesseract",
        r#"printf 'Scanned text from %s\n' "$(basename "$1")" > "$2.txt""#,
    );
    let pdftoppm = write_script(
        dir,
        "pdftoppm",
        r#"for last; do :; done; printf PNG > "$last.png""#,
    );
    (gm, tesseract, pdftoppm)
}

pub fn fake_toolchain(dir: &Path, runner: ProcessRunner) -> Toolchain {
    let (gm, tesseract, pdftoppm) = fake_tool_bins(dir);
    Toolchain {
        graphicsmagick: GraphicsMagick::new(gm, runner),
        tesseract: Tesseract::new(tesseract, runner),
        pdftoppm: Pdftoppm::new(pdftoppm, runner),
    }
}

/// Names of the files left in `dir`, sorted.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
