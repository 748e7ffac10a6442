//! # resume-profile
//!
//! Turn PDF/DOCX resumes into structured professional profiles and styled
//! DOCX capability documents using a chat model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! resume.pdf / resume.docx
//!  │
//!  ├─ 1. Extract  page text via pdfium, or paragraphs + table rows from the DOCX
//!  ├─ 2. Infer    instruction payload + text → chat model, retried with backoff
//!  │              └─ Repair  recover the JSON object from a noisy reply
//!  ├─ 3. Name     sanitised basename from the profile's Name (or the filename)
//!  ├─ 4. Encode   ProfileRecord → pretty JSON
//!  └─ 5. Render   DOCX, either generated from scratch or filled from a template
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resume_profile::{process_to_dir, AzureSettings, PipelineConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let azure = AzureSettings::from_env().ok_or("AZURE_OPENAI_* not set")?;
//!     let config = PipelineConfig::builder()
//!         .azure(azure)
//!         .logo_path("logo.png")
//!         .build()?;
//!     let written = process_to_dir(Path::new("Jane Doe CV.pdf"), None, &config).await?;
//!     println!("{}", written.docx.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `resume2profile` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! resume-profile = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod docx;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod profile;
pub mod progress;
pub mod prompts;
pub mod render;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{AzureSettings, ModelBackend, PipelineConfig, PipelineConfigBuilder};
pub use convert::{
    extract_file, output_dir_for, process_resume, process_resume_sync, process_to_dir,
    write_outputs, BatchItem, ResumePipeline, WrittenFiles,
};
pub use error::{
    display_chain, DocxError, ExtractError, InferenceError, ModelError, PipelineError, RenderError,
    RepairError,
};
pub use output::{ProfileOutput, RunStats};
pub use pipeline::extract::ExtractOptions;
pub use pipeline::input::{sanitize_basename, DocumentFormat, RawDocument};
pub use pipeline::llm::{ModelClient, ModelInvoker, RetryPolicy, SamplingParams};
pub use pipeline::repair::repair_json;
pub use profile::ProfileRecord;
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback, Stage};
pub use render::{GeneratedLayout, ProfileRenderer, RenderMode, TemplateFill};
