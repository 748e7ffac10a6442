//! Error types for the resume-profile library.
//!
//! Each pipeline stage owns one error enum describing what can go wrong
//! inside it. The orchestrator never returns those directly: it wraps them in
//! a [`PipelineError`] stage variant that names the failing stage and keeps
//! the original error as its `source()`, so a caller logging the chain sees
//! both *where* and *why*.
//!
//! ```text
//! PipelineError::InferenceFailed
//!   └─ InferenceError::ModelInvocationFailed { attempts: 5 }
//!        └─ ModelError::Api { status: 429 }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors returned by the orchestrator for a single document.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Stage wrappers ────────────────────────────────────────────────────
    /// Text extraction failed.
    #[error("Extraction stage failed for '{filename}'")]
    ExtractionFailed {
        filename: String,
        #[source]
        source: ExtractError,
    },

    /// The model stage gave up.
    #[error("Inference stage failed for '{filename}'")]
    InferenceFailed {
        filename: String,
        #[source]
        source: InferenceError,
    },

    /// The profile record could not be encoded.
    #[error("Serialization stage failed")]
    SerializationFailed(#[source] serde_json::Error),

    /// The output document could not be produced.
    #[error("Rendering stage failed ({renderer} layout)")]
    RenderingFailed {
        renderer: &'static str,
        #[source]
        source: RenderError,
    },

    // ── Outside the stages ────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}'")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error (e.g. a blocking task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Name of the stage that failed, if the error came from one.
    pub fn stage(&self) -> Option<crate::progress::Stage> {
        use crate::progress::Stage;
        match self {
            PipelineError::ExtractionFailed { .. } => Some(Stage::Extraction),
            PipelineError::InferenceFailed { .. } => Some(Stage::Inference),
            PipelineError::SerializationFailed(_) => Some(Stage::Serialization),
            PipelineError::RenderingFailed { .. } => Some(Stage::Rendering),
            _ => None,
        }
    }
}

/// An error and its `source()` chain on one line, `": "`-separated.
///
/// The enums here keep causes out of their own messages, so this is what
/// logs and progress callbacks print.
pub fn display_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut next = err.source();
    while let Some(cause) = next {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        next = cause.source();
    }
    out
}

/// Failures while turning document bytes into text.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The filename extension is neither `.pdf` nor `.docx`.
    #[error("Unsupported file type '{extension}' for '{filename}' (use .pdf or .docx)")]
    UnsupportedFormat { filename: String, extension: String },

    /// The document was recognised but could not be parsed.
    #[error("{format} document is corrupt: {detail}")]
    CorruptDocument {
        format: &'static str,
        detail: String,
    },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or pass --pdfium-lib."
    )]
    PdfiumBindingFailed(String),

    /// DOCX package or XML failure.
    #[error(transparent)]
    Docx(#[from] DocxError),

    /// Could not read the input file.
    #[error("Failed to read '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A single model call failed at the transport or API level.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Model call timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Model response contained no choices")]
    EmptyResponse,

    #[error("Provider error: {0}")]
    Provider(String),
}

/// Response Repair could not locate any `{…}` span.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepairError {
    #[error("No JSON object found in model response")]
    NoJsonObject,
}

/// The model stage failed after exhausting its attempt budget.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// The last attempt failed at the network/API level.
    #[error("Model invocation failed after {attempts} attempt(s)")]
    ModelInvocationFailed {
        attempts: u32,
        #[source]
        source: ModelError,
    },

    /// The last attempt returned text with no usable profile record in it.
    #[error("Malformed model response after {attempts} attempt(s): {detail}")]
    MalformedResponse { attempts: u32, detail: String },

    /// No model backend could be built from the configuration.
    #[error("Model backend is not configured.\n{hint}")]
    ProviderNotConfigured { hint: String },
}

/// Failures reading or writing an OOXML package.
#[derive(Debug, Error)]
pub enum DocxError {
    #[error("Invalid DOCX archive")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error in DOCX archive")]
    Io(#[from] std::io::Error),

    #[error("DOCX package is missing part '{0}'")]
    MissingPart(String),

    #[error("Malformed XML in '{part}': {detail}")]
    Xml { part: String, detail: String },

    /// A part inflates past the size we are willing to hold in memory.
    #[error("DOCX part '{part}' exceeds {limit} bytes")]
    PartTooLarge { part: String, limit: u64 },

    #[error("Could not read DOCX document: {0}")]
    Read(String),

    #[error("Could not write DOCX document: {0}")]
    Pack(String),
}

/// Failures while rendering a profile into a document.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The configured template file does not exist.
    #[error("Template not found: '{path}'")]
    TemplateNotFound { path: PathBuf },

    #[error(transparent)]
    Docx(#[from] DocxError),

    /// The logo exists but is not a PNG/JPEG image we can embed.
    #[error("Logo '{path}' could not be embedded: {detail}")]
    Logo { path: PathBuf, detail: String },

    #[error("Failed to read '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
