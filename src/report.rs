//! Report Assembler: completed stage results → one document.
//!
//! The document lists completed stages only, in catalog order, whatever
//! order they finished in. It is recomputed on demand and rendered to the
//! fixed HTML shape the PDF render endpoint expects, or to Markdown for the
//! terminal.

use crate::error::SidekickError;
use crate::pipeline::orchestrator::AnalysisSession;
use crate::stages::STAGES;
use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::Path;

/// Characters that are not safe in a file name on common platforms.
static UNSAFE_FILENAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/:*?"<>|\x00-\x1f]"#).unwrap());

/// Prefix of the suggested download file name.
pub const DOWNLOAD_PREFIX: &str = "Customer Research Analysis Report";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSection {
    pub stage_id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportDocument {
    pub title: String,
    pub source_name: String,
    pub sections: Vec<ReportSection>,
}

/// Fold a session's completed stages into a report.
pub fn assemble(session: &AnalysisSession, title: &str) -> ReportDocument {
    let sections = STAGES
        .iter()
        .filter_map(|stage| {
            session.content(stage.id).map(|content| ReportSection {
                stage_id: stage.id,
                label: stage.label,
                description: stage.description,
                content: content.to_string(),
            })
        })
        .collect();

    ReportDocument {
        title: title.to_string(),
        source_name: session.source_name().to_string(),
        sections,
    }
}

impl ReportDocument {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// `"{title} - {source name}"`.
    pub fn heading(&self) -> String {
        format!("{} - {}", self.title, self.source_name)
    }

    /// Fail with [`SidekickError::NothingCompleted`] when there is nothing to deliver.
    pub fn ensure_not_empty(&self) -> Result<(), SidekickError> {
        if self.is_empty() {
            Err(SidekickError::NothingCompleted)
        } else {
            Ok(())
        }
    }

    pub fn to_html(&self) -> String {
        let heading = escape_html(&self.heading());
        let mut html = String::with_capacity(
            512 + self.sections.iter().map(|s| s.content.len() + 256).sum::<usize>(),
        );
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>");
        html.push_str(&heading);
        html.push_str("</title>\n</head>\n<body>\n<h1>");
        html.push_str(&heading);
        html.push_str("</h1>\n");
        for section in &self.sections {
            html.push_str("<section><h2>");
            html.push_str(&escape_html(section.label));
            html.push_str("</h2><p><em>");
            html.push_str(&escape_html(section.description));
            html.push_str("</em></p><pre>");
            html.push_str(&escape_html(&section.content));
            html.push_str("</pre></section>\n");
        }
        html.push_str("</body>\n</html>\n");
        html
    }

    pub fn to_markdown(&self) -> String {
        let mut md = format!("# {}\n", self.heading());
        for section in &self.sections {
            md.push_str(&format!(
                "\n## {}\n\n_{}_\n\n{}\n",
                section.label,
                section.description,
                section.content.trim_end()
            ));
        }
        md
    }

    /// Name sent with render and share requests: `{source stem}_analysis`.
    pub fn render_file_name(&self) -> String {
        let stem = Path::new(&self.source_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source_name.clone());
        format!("{}_analysis", sanitize_file_name(&stem))
    }
}

/// Suggested name for a downloaded PDF, stamped with local time.
pub fn download_file_name(now: DateTime<Local>) -> String {
    format!("{} - {}.pdf", DOWNLOAD_PREFIX, now.format("%Y-%m-%d - %H-%M-%S"))
}

pub fn sanitize_file_name(name: &str) -> String {
    UNSAFE_FILENAME.replace_all(name, "_").into_owned()
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Write `bytes` to `path` atomically: temp file in the same directory, then rename.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SidekickError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SidekickError::OutputWriteFailed {
                    path: path.to_path_buf(),
                    source: e,
                })?;
        }
    }

    let ext = path
        .extension()
        .map(|e| format!("{}.tmp", e.to_string_lossy()))
        .unwrap_or_else(|| "tmp".to_string());
    let tmp_path = path.with_extension(ext);
    tokio::fs::write(&tmp_path, bytes)
        .await
        .map_err(|e| SidekickError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| SidekickError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn doc(sections: Vec<ReportSection>) -> ReportDocument {
        ReportDocument {
            title: "Customer Analyst Side Kick".into(),
            source_name: "acme-call.pdf".into(),
            sections,
        }
    }

    fn section(id: &'static str, content: &str) -> ReportSection {
        let stage = crate::stages::find(id).unwrap();
        ReportSection {
            stage_id: stage.id,
            label: stage.label,
            description: stage.description,
            content: content.into(),
        }
    }

    #[test]
    fn html_has_fixed_shape() {
        let html = doc(vec![section("curse", "Score: 4/5")]).to_html();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Customer Analyst Side Kick - acme-call.pdf</title>"));
        assert!(html.contains("<h1>Customer Analyst Side Kick - acme-call.pdf</h1>"));
        assert!(html.contains(
            "<section><h2>CURSE Problem Analyst</h2><p><em>Evaluates customer pain points"
        ));
        assert!(html.contains("<pre>Score: 4/5</pre></section>"));
    }

    #[test]
    fn html_escapes_model_output() {
        let html = doc(vec![section("needs", "<script>alert('x')</script> & more")]).to_html();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; more"));
    }

    #[test]
    fn markdown_lists_sections() {
        let md = doc(vec![section("jtbd-analysis", "goals"), section("demand", "vendor")]).to_markdown();
        assert!(md.starts_with("# Customer Analyst Side Kick - acme-call.pdf\n"));
        assert!(md.find("## JTBD Goal Analysis").unwrap() < md.find("## Demand Analyst").unwrap());
    }

    #[test]
    fn empty_report_is_rejected_for_delivery() {
        let d = doc(vec![]);
        assert!(d.is_empty());
        assert!(matches!(d.ensure_not_empty(), Err(SidekickError::NothingCompleted)));
    }

    #[test]
    fn file_names() {
        assert_eq!(doc(vec![]).render_file_name(), "acme-call_analysis");
        let mut d = doc(vec![]);
        d.source_name = "Text Analysis".into();
        assert_eq!(d.render_file_name(), "Text Analysis_analysis");

        let when = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            download_file_name(when),
            "Customer Research Analysis Report - 2024-03-09 - 14-05-07.pdf"
        );
    }

    #[test]
    fn sanitize_replaces_separators() {
        assert_eq!(sanitize_file_name("a/b:c?d"), "a_b_c_d");
    }

    #[tokio::test]
    async fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.html");
        write_atomic(&path, b"<html></html>").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"<html></html>");
        assert!(!path.with_extension("html.tmp").exists());
    }
}
