//! Input handling: the raw document, its format hint and output basenames.
//!
//! A [`RawDocument`] is just bytes plus the filename they arrived under.
//! The format is decided by the extension alone; content sniffing would let
//! a mislabelled upload through to a parser that then fails less clearly.

use crate::error::ExtractError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::debug;

static RE_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap());

/// Basename used when neither the record nor the filename yields one.
pub const FALLBACK_BASENAME: &str = "profile";

/// The two document kinds the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Page-based (`.pdf`).
    Pdf,
    /// Structured-paragraph (`.docx`).
    Docx,
}

impl DocumentFormat {
    /// Format hint from the filename extension, case-insensitive.
    pub fn from_filename(filename: &str) -> Result<Self, ExtractError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "docx" => Ok(DocumentFormat::Docx),
            _ => Err(ExtractError::UnsupportedFormat {
                filename: filename.to_string(),
                extension: if extension.is_empty() {
                    "(none)".to_string()
                } else {
                    format!(".{extension}")
                },
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "PDF",
            DocumentFormat::Docx => "DOCX",
        }
    }
}

/// Document bytes plus the filename they were submitted under.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl RawDocument {
    pub fn new(bytes: Vec<u8>, filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Read a local file; the filename hint is the path's final component.
    pub async fn from_path(path: &Path) -> Result<Self, ExtractError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ExtractError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        debug!("Read {} ({} bytes)", path.display(), bytes.len());
        Ok(Self { filename, bytes })
    }

    pub fn format(&self) -> Result<DocumentFormat, ExtractError> {
        DocumentFormat::from_filename(&self.filename)
    }

    /// Filename without directory or extension.
    pub fn stem(&self) -> String {
        Path::new(&self.filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Replace every run of characters outside `[A-Za-z0-9._-]` with `_` and
/// trim leading/trailing underscores. Idempotent.
pub fn sanitize_basename(raw: &str) -> String {
    let replaced = RE_UNSAFE.replace_all(raw, "_");
    let trimmed = replaced.trim_matches('_');
    if trimmed.is_empty() {
        FALLBACK_BASENAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Output basename: the profile's Name when present, else the input stem.
pub fn derive_basename(name: Option<&str>, filename_stem: &str) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => sanitize_basename(name),
        None => sanitize_basename(filename_stem),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(DocumentFormat::from_filename("cv.pdf").unwrap(), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::from_filename("CV.PDF").unwrap(), DocumentFormat::Pdf);
        assert_eq!(
            DocumentFormat::from_filename("dir/Jane.Docx").unwrap(),
            DocumentFormat::Docx
        );
    }

    #[test]
    fn other_extensions_are_unsupported() {
        for name in ["cv.doc", "cv.txt", "cv", "pdf"] {
            match DocumentFormat::from_filename(name) {
                Err(ExtractError::UnsupportedFormat { filename, .. }) => assert_eq!(filename, name),
                other => panic!("{name}: expected UnsupportedFormat, got {other:?}"),
            }
        }
    }

    #[test]
    fn sanitize_replaces_and_trims() {
        assert_eq!(sanitize_basename("Jane Doe"), "Jane_Doe");
        assert_eq!(sanitize_basename("  Zoë  O'Brien!! "), "Zo_O_Brien");
        assert_eq!(sanitize_basename("a.b-c_d"), "a.b-c_d");
        assert_eq!(sanitize_basename("___"), FALLBACK_BASENAME);
        assert_eq!(sanitize_basename(""), FALLBACK_BASENAME);
    }

    #[test]
    fn sanitize_is_idempotent_and_safe() {
        let inputs = [
            "Jane Doe",
            "  lead/trail  ",
            "名前",
            "a..b",
            "_x_",
            "semi;colon:and\\slash",
            "Dr. Jane Q. Public, PhD",
            "résumé (final) v2.docx",
        ];
        for input in inputs {
            let once = sanitize_basename(input);
            assert_eq!(sanitize_basename(&once), once, "input {input:?}");
            assert!(
                once.chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')),
                "{once:?}"
            );
        }
    }

    #[test]
    fn basename_prefers_name_then_stem() {
        assert_eq!(derive_basename(Some("Jane Doe"), "upload_123"), "Jane_Doe");
        assert_eq!(derive_basename(Some("   "), "upload_123"), "upload_123");
        assert_eq!(derive_basename(None, "my resume"), "my_resume");
    }

    #[test]
    fn stem_strips_directory_and_extension() {
        let doc = RawDocument::new(vec![], "incoming/Jane Doe CV.pdf");
        assert_eq!(doc.stem(), "Jane Doe CV");
    }
}
