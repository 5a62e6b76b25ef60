//! Résumé annotation: writes a copy of an uploaded résumé with job keywords highlighted.
//!
//! Word documents get their matching spans underlined; PDFs get translucent
//! rectangles drawn over approximate keyword positions. Both paths are
//! synchronous and CPU/file bound: async callers go through `spawn_blocking`.

pub mod docx;
pub mod pdf;

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::analysis::keywords::{extract_keywords, KeywordMap};

/// Fixed prefix of every generated résumé file name.
pub const OUTPUT_PREFIX: &str = "adapted_cv_";

#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("Résumé file does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unsupported résumé format: {0}")]
    UnsupportedFormat(String),

    #[error("Adapted résumé was not created: {}", .0.display())]
    Io(PathBuf),

    #[error("Failed to adapt résumé: {0}")]
    Processing(String),
}

/// Résumé formats the annotator can rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Docx,
    Pdf,
}

impl DocumentKind {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "docx" => Some(Self::Docx),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Kind of a file name such as `resume.PDF`; names without a dot have none.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, extension) = filename.rsplit_once('.')?;
        Self::from_extension(extension)
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::Pdf => "pdf",
        }
    }
}

/// Decides which PDF pages receive the highlight overlay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PdfHighlightGate {
    /// Only pages with at least one keyword occurrence.
    #[default]
    PerPage,
    /// Every page with text once any page so far had an occurrence.
    Cumulative,
}

impl FromStr for PdfHighlightGate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-page" | "page" => Ok(Self::PerPage),
            "cumulative" => Ok(Self::Cumulative),
            other => Err(format!("unknown PDF highlight gate '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnnotateOptions {
    pub pdf_gate: PdfHighlightGate,
}

/// Counters for one adaptation. Exactly one of the `*_modified` fields is set,
/// depending on the document kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationStats {
    pub total_keywords: usize,
    pub highlighted_keywords: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraphs_modified: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages_modified: Option<usize>,
}

impl AnnotationStats {
    pub fn for_paragraphs(total_keywords: usize) -> Self {
        Self {
            total_keywords,
            paragraphs_modified: Some(0),
            ..Self::default()
        }
    }

    pub fn for_pages(total_keywords: usize) -> Self {
        Self {
            total_keywords,
            pages_modified: Some(0),
            ..Self::default()
        }
    }
}

/// A generated file in the output directory.
#[derive(Debug, Clone)]
pub struct AnnotatedFile {
    pub filename: String,
    pub stats: AnnotationStats,
}

/// Result of adapting a résumé to a job description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptedResume {
    pub filename: String,
    pub stats: AnnotationStats,
    pub keywords: KeywordMap,
}

/// `adapted_cv_<32 hex><.ext>`
pub fn output_filename(kind: DocumentKind) -> String {
    format!(
        "{OUTPUT_PREFIX}{}.{}",
        Uuid::new_v4().simple(),
        kind.extension()
    )
}

/// Extracts the job keywords, then highlights them in the résumé at `input`.
pub fn adapt_resume(
    input: &Path,
    job_description: &str,
    output_dir: &Path,
    options: &AnnotateOptions,
) -> Result<AdaptedResume, AnnotateError> {
    tracing::info!("Adapting résumé {}", input.display());

    if !input.exists() {
        tracing::error!("Résumé file does not exist: {}", input.display());
        return Err(AnnotateError::NotFound(input.to_path_buf()));
    }

    let kind = DocumentKind::from_path(input).ok_or_else(|| {
        AnnotateError::UnsupportedFormat(
            input
                .extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .unwrap_or_default(),
        )
    })?;

    let keywords = extract_keywords(job_description);
    let flattened = keywords.flatten();

    let annotated = annotate_resume(input, kind, &flattened, output_dir, options)?;

    Ok(AdaptedResume {
        filename: annotated.filename,
        stats: annotated.stats,
        keywords,
    })
}

/// Writes a highlighted copy of `input` under `output_dir` with a generated name.
pub fn annotate_resume(
    input: &Path,
    kind: DocumentKind,
    keywords: &BTreeSet<String>,
    output_dir: &Path,
    options: &AnnotateOptions,
) -> Result<AnnotatedFile, AnnotateError> {
    if !input.exists() {
        return Err(AnnotateError::NotFound(input.to_path_buf()));
    }

    let (bytes, stats) = highlight(input, kind, keywords, options).map_err(|e| {
        tracing::error!("Failed to adapt résumé {}: {e:#}", input.display());
        AnnotateError::Processing(format!("{e:#}"))
    })?;

    let filename = output_filename(kind);
    let path = output_dir.join(&filename);

    persist(output_dir, &path, &bytes).map_err(|e| {
        tracing::error!("Failed to write adapted résumé {}: {e:#}", path.display());
        AnnotateError::Processing(format!("{e:#}"))
    })?;

    if !path.exists() {
        tracing::error!("Adapted résumé missing after write: {}", path.display());
        return Err(AnnotateError::Io(path));
    }

    tracing::info!(
        total_keywords = stats.total_keywords,
        highlighted = stats.highlighted_keywords,
        paragraphs = ?stats.paragraphs_modified,
        pages = ?stats.pages_modified,
        "Adapted résumé written: {filename}"
    );

    Ok(AnnotatedFile {
        filename,
        stats,
    })
}

fn highlight(
    input: &Path,
    kind: DocumentKind,
    keywords: &BTreeSet<String>,
    options: &AnnotateOptions,
) -> anyhow::Result<(Vec<u8>, AnnotationStats)> {
    let bytes = std::fs::read(input)?;
    match kind {
        DocumentKind::Docx => docx::highlight_docx(&bytes, keywords),
        DocumentKind::Pdf => pdf::highlight_pdf(&bytes, keywords, options.pdf_gate),
    }
}

fn persist(output_dir: &Path, path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    std::fs::create_dir_all(output_dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(output_dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path)?;
    Ok(())
}
