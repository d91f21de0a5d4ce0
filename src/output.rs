//! Terminal rendering for the CLI.

use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::{
    archive::{CycleReport, ExtractorStatus},
    error::Result,
    finding::Finding,
};

/// JSON shape of one finding.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingView<'a> {
    pub rank: usize,
    pub path: String,
    pub title: &'a str,
    pub tags: &'a [String],
    pub context: &'a str,
    pub thumbnail: Option<String>,
    /// Seconds since the Unix epoch.
    pub last_update: Option<u64>,
}

impl<'a> FindingView<'a> {
    pub fn new(rank: usize, finding: &'a Finding) -> Self {
        Self {
            rank,
            path: finding.file_path().display().to_string(),
            title: &finding.metadata.title,
            tags: &finding.metadata.tags,
            context: &finding.context,
            thumbnail: finding
                .metadata
                .primary_thumbnail()
                .map(|p| p.display().to_string()),
            last_update: finding
                .last_update()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs()),
        }
    }
}

pub fn findings_json(
    findings: &[Finding],
    query: Option<&str>,
) -> Result<String> {
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Response<'a> {
        #[serde(skip_serializing_if = "Option::is_none")]
        query: Option<&'a str>,
        result_count: usize,
        results: Vec<FindingView<'a>>,
    }

    let response = Response {
        query,
        result_count: findings.len(),
        results: findings
            .iter()
            .enumerate()
            .map(|(i, f)| FindingView::new(i + 1, f))
            .collect(),
    };
    Ok(serde_json::to_string(&response)?)
}

pub fn findings_human(findings: &[Finding]) -> String {
    if findings.is_empty() {
        return "No results.\n".to_string();
    }

    let mut out = String::new();
    for (i, finding) in findings.iter().enumerate() {
        out.push_str(&format!(
            "{:>3}. {}\n",
            i + 1,
            finding.file_path().display()
        ));
        let title = &finding.metadata.title;
        if !title.is_empty() {
            out.push_str(&format!("     {title}\n"));
        }
        if !finding.metadata.tags.is_empty() {
            out.push_str(&format!(
                "     tags: {}\n",
                finding.metadata.tags.join(", ")
            ));
        }
        let context = finding.context.replace('\n', " ");
        if !context.trim().is_empty() {
            out.push_str(&format!("     {}\n", context.trim()));
        }
    }
    out
}

pub fn report_human(report: &CycleReport) -> String {
    let mut out = format!("Discovered: {}\n", report.discovered);
    for e in &report.extractors {
        out.push_str(&format!(
            "  {}: {} collected, {} pending, {} extracted\n",
            e.extractor, e.collected, e.pending, e.extracted
        ));
    }
    for root in &report.unreadable_roots {
        out.push_str(&format!("Unreadable root: {}\n", root.display()));
    }
    if !report.failures.is_empty() {
        out.push_str(&format!("Failures: {}\n", report.failures.len()));
        for f in &report.failures {
            out.push_str(&format!(
                "  [{}] {}: {}\n",
                f.extractor,
                f.path.display(),
                f.error
            ));
        }
    }
    out
}

pub fn status_human(status: &[ExtractorStatus]) -> String {
    let mut out = String::new();
    for s in status {
        out.push_str(&format!(
            "{}: {}/{} extracted\n",
            s.extractor, s.extracted, s.discovered
        ));
    }
    out
}
