//! Text Extractor: document bytes → one normalised string.
//!
//! ## PDF
//!
//! pdfium reads the document straight from the byte slice; no temp file.
//! Like the rest of pdfium-render it is blocking, so the whole extraction
//! runs in `spawn_blocking`. A page whose text layer cannot be read counts
//! as empty rather than failing the document.
//!
//! ## DOCX
//!
//! Non-empty body paragraphs first, then one line per table row with the
//! cells tab-joined. Tables therefore always trail the prose, whatever their
//! position in the source; the model sees the same ordering for every input.

use crate::docx::{self, DocxBody};
use crate::error::ExtractError;
use crate::pipeline::input::{DocumentFormat, RawDocument};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the pdfium shared library (file or directory).
pub const PDFIUM_LIB_ENV: &str = "PDFIUM_LIB_PATH";

#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Explicit pdfium library path; falls back to `PDFIUM_LIB_PATH`, then
    /// the system library.
    pub pdfium_lib_path: Option<PathBuf>,
}

/// Extract plain text from a PDF or DOCX document.
///
/// Never returns `None`-like values: a document with no text yields `""`.
pub async fn extract_text(
    document: RawDocument,
    options: &ExtractOptions,
) -> Result<String, ExtractError> {
    let format = document.format()?;
    let lib_path = options
        .pdfium_lib_path
        .clone()
        .or_else(|| std::env::var_os(PDFIUM_LIB_ENV).map(PathBuf::from));
    let RawDocument { filename, bytes } = document;

    let text = tokio::task::spawn_blocking(move || match format {
        DocumentFormat::Pdf => pdf_text(&bytes, lib_path.as_deref()),
        DocumentFormat::Docx => docx_text(&bytes),
    })
    .await
    .map_err(|e| ExtractError::Internal(format!("Extraction task panicked: {e}")))??;

    info!(
        "Extracted {} characters from {} ({})",
        text.chars().count(),
        filename,
        format.as_str()
    );
    Ok(text)
}

// ── PDF ──────────────────────────────────────────────────────────────────

fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, ExtractError> {
    let bindings = match lib_path {
        Some(path) if path.is_dir() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
        }
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ExtractError::PdfiumBindingFailed(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

fn pdf_text(bytes: &[u8], lib_path: Option<&Path>) -> Result<String, ExtractError> {
    let pdfium = bind_pdfium(lib_path)?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| ExtractError::CorruptDocument {
            format: "PDF",
            detail: format!("{e:?}"),
        })?;

    let pages: Vec<String> = document
        .pages()
        .iter()
        .enumerate()
        .map(|(i, page)| match page.text() {
            Ok(text) => text.all(),
            Err(e) => {
                warn!("Page {} has no readable text layer: {:?}", i + 1, e);
                String::new()
            }
        })
        .collect();
    debug!("PDF loaded: {} pages", pages.len());
    Ok(join_pages(pages))
}

/// Pages in order, newline-separated, trimmed as a whole.
pub fn join_pages<I>(pages: I) -> String
where
    I: IntoIterator<Item = String>,
{
    pages
        .into_iter()
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

// ── DOCX ─────────────────────────────────────────────────────────────────

fn docx_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let body = docx::read_body(bytes)?;
    debug!(
        paragraphs = body.paragraphs.len(),
        tables = body.tables.len(),
        "DOCX body read"
    );
    Ok(assemble_docx_text(&body))
}

/// Non-empty paragraphs, then each table row as tab-joined trimmed cells.
pub fn assemble_docx_text(body: &DocxBody) -> String {
    let paragraphs = body
        .paragraphs
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(str::to_string);
    let rows = body.tables.iter().flat_map(|table| {
        table.rows.iter().map(|row| {
            row.iter()
                .map(|cell| cell.trim())
                .collect::<Vec<_>>()
                .join("\t")
        })
    });
    paragraphs
        .chain(rows)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
