//! Pipeline Orchestrator: document bytes → basename, record JSON, DOCX.
//!
//! One run is strictly linear: extraction → inference → basename →
//! serialization → rendering. Each stage's failure is wrapped in the
//! matching [`PipelineError`] stage variant with the original cause kept as
//! its source; nothing is retried here (retries live in the Model Invoker).
//!
//! Runs share nothing mutable. A [`ResumePipeline`] holds the model client,
//! renderer and options behind `Arc`s, so [`ResumePipeline::run_batch`] can
//! drive many documents at once and one failure never touches the others.

use crate::config::PipelineConfig;
use crate::error::{display_chain, ExtractError, PipelineError};
use crate::output::{ProfileOutput, RunStats};
use crate::pipeline::client::resolve_client;
use crate::pipeline::extract::{extract_text, ExtractOptions};
use crate::pipeline::input::{derive_basename, RawDocument};
use crate::pipeline::llm::ModelInvoker;
use crate::progress::{NoopProgressCallback, ProgressCallback, Stage};
use crate::prompts::effective_prompt;
use crate::render::{renderer_for, ProfileRenderer};
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A ready-to-run pipeline. Cheap to clone; clones share everything.
#[derive(Clone)]
pub struct ResumePipeline {
    invoker: ModelInvoker,
    renderer: Arc<dyn ProfileRenderer>,
    extract_options: ExtractOptions,
    progress: ProgressCallback,
    concurrency: usize,
}

/// Outcome of one document in a batch.
#[derive(Debug)]
pub struct BatchItem {
    pub path: PathBuf,
    pub result: Result<ProfileOutput, PipelineError>,
}

impl ResumePipeline {
    /// Resolve the model client and renderer described by `config`.
    ///
    /// # Errors
    /// [`PipelineError::InvalidConfig`] when no model backend can be found.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let client =
            resolve_client(config).map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
        let invoker = ModelInvoker::new(
            client,
            effective_prompt(config.system_prompt.as_deref()),
            config.sampling(),
            config.retry_policy(),
        );
        let renderer = renderer_for(
            config.render_mode,
            config.template_path.clone(),
            config.logo_path.clone(),
        );
        info!("Render mode: {}", renderer.name());

        let mut pipeline = Self::new(invoker, renderer, config.extract_options());
        pipeline.concurrency = config.concurrency.max(1);
        if let Some(ref cb) = config.progress_callback {
            pipeline.progress = Arc::clone(cb);
        }
        Ok(pipeline)
    }

    /// Assemble a pipeline from already-built parts.
    pub fn new(
        invoker: ModelInvoker,
        renderer: Arc<dyn ProfileRenderer>,
        extract_options: ExtractOptions,
    ) -> Self {
        Self {
            invoker,
            renderer,
            extract_options,
            progress: Arc::new(NoopProgressCallback),
            concurrency: 4,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    pub fn renderer_name(&self) -> &'static str {
        self.renderer.name()
    }

    /// Run one document held in memory. `filename` supplies the format hint
    /// and the fallback basename.
    pub async fn run(
        &self,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<ProfileOutput, PipelineError> {
        self.progress.on_run_start(filename);
        let result = self.run_stages(bytes, filename).await;
        match result {
            Ok(ref output) => self.progress.on_run_complete(filename, &output.base_name),
            Err(ref e) => {
                let chain = display_chain(e);
                warn!("Pipeline failed for '{}': {}", filename, chain);
                self.progress.on_run_error(filename, &chain);
            }
        }
        result
    }

    /// Read a local file and run it.
    pub async fn run_file(&self, path: &Path) -> Result<ProfileOutput, PipelineError> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let document = match RawDocument::from_path(path).await {
            Ok(doc) => doc,
            Err(source) => {
                let e = PipelineError::ExtractionFailed { filename, source };
                self.progress
                    .on_run_error(&path.display().to_string(), &display_chain(&e));
                return Err(e);
            }
        };
        self.run(document.bytes, &document.filename).await
    }

    /// Run many files concurrently, bounded by the configured concurrency.
    /// Results come back in input order, one per path.
    pub async fn run_batch(&self, paths: &[PathBuf]) -> Vec<BatchItem> {
        let mut items: Vec<(usize, BatchItem)> = stream::iter(paths.iter().enumerate())
            .map(|(i, path)| async move {
                let result = self.run_file(path).await;
                (
                    i,
                    BatchItem {
                        path: path.clone(),
                        result,
                    },
                )
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        items.sort_by_key(|(i, _)| *i);
        let items: Vec<BatchItem> = items.into_iter().map(|(_, item)| item).collect();

        let failed = items.iter().filter(|it| it.result.is_err()).count();
        info!(
            "Batch complete: {}/{} succeeded",
            items.len() - failed,
            items.len()
        );
        items
    }

    async fn run_stages(
        &self,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<ProfileOutput, PipelineError> {
        let total_start = Instant::now();
        let mut stats = RunStats::default();

        // ── Extraction ───────────────────────────────────────────────────
        let document = RawDocument::new(bytes, filename);
        let stem = document.stem();
        let start = self.stage_start(filename, Stage::Extraction);
        let text = extract_text(document, &self.extract_options)
            .await
            .map_err(|source| PipelineError::ExtractionFailed {
                filename: filename.to_string(),
                source,
            })?;
        if text.is_empty() {
            warn!("No text extracted from '{}'", filename);
        }
        stats.extracted_chars = text.chars().count();
        stats.extraction_ms = self.stage_complete(filename, Stage::Extraction, start);

        // ── Inference ────────────────────────────────────────────────────
        let start = self.stage_start(filename, Stage::Inference);
        let inference =
            self.invoker
                .infer(&text)
                .await
                .map_err(|source| PipelineError::InferenceFailed {
                    filename: filename.to_string(),
                    source,
                })?;
        drop(text);
        stats.model_attempts = inference.attempts;
        stats.inference_ms = self.stage_complete(filename, Stage::Inference, start);
        let record = inference.record;

        let base_name = derive_basename(record.display_name(), &stem);
        debug!("Output basename for '{}': {}", filename, base_name);

        // ── Serialization ────────────────────────────────────────────────
        let start = self.stage_start(filename, Stage::Serialization);
        let record_json = record
            .to_json_bytes()
            .map_err(PipelineError::SerializationFailed)?;
        stats.serialization_ms = self.stage_complete(filename, Stage::Serialization, start);

        // ── Rendering ────────────────────────────────────────────────────
        let start = self.stage_start(filename, Stage::Rendering);
        let renderer = Arc::clone(&self.renderer);
        let renderer_name = renderer.name();
        let to_render = record.clone();
        let document = tokio::task::spawn_blocking(move || renderer.render(&to_render))
            .await
            .map_err(|e| PipelineError::Internal(format!("Render task panicked: {e}")))?
            .map_err(|source| PipelineError::RenderingFailed {
                renderer: renderer_name,
                source,
            })?;
        stats.rendering_ms = self.stage_complete(filename, Stage::Rendering, start);
        stats.total_ms = total_start.elapsed().as_millis() as u64;

        info!(
            "Profile '{}' ready from '{}': {} JSON bytes, {} DOCX bytes, {}ms",
            base_name,
            filename,
            record_json.len(),
            document.len(),
            stats.total_ms
        );

        Ok(ProfileOutput {
            base_name,
            record,
            record_json,
            document,
            renderer: renderer_name,
            stats,
        })
    }

    fn stage_start(&self, filename: &str, stage: Stage) -> Instant {
        debug!("'{}': {} started", filename, stage);
        self.progress.on_stage_start(filename, stage);
        Instant::now()
    }

    fn stage_complete(&self, filename: &str, stage: Stage, start: Instant) -> u64 {
        let elapsed_ms = start.elapsed().as_millis() as u64;
        debug!("'{}': {} finished in {}ms", filename, stage, elapsed_ms);
        self.progress.on_stage_complete(filename, stage, elapsed_ms);
        elapsed_ms
    }
}

/// Run one in-memory document with a pipeline built from `config`.
///
/// # Example
/// ```rust,no_run
/// use resume_profile::{process_resume, PipelineConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("Jane Doe CV.pdf")?;
/// let config = PipelineConfig::default();
/// let output = process_resume(bytes, "Jane Doe CV.pdf", &config).await?;
/// println!("{} ({} bytes)", output.docx_file_name(), output.document.len());
/// # Ok(())
/// # }
/// ```
pub async fn process_resume(
    bytes: Vec<u8>,
    filename: &str,
    config: &PipelineConfig,
) -> Result<ProfileOutput, PipelineError> {
    ResumePipeline::from_config(config)?.run(bytes, filename).await
}

/// Synchronous wrapper around [`process_resume`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_resume_sync(
    bytes: Vec<u8>,
    filename: &str,
    config: &PipelineConfig,
) -> Result<ProfileOutput, PipelineError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PipelineError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(process_resume(bytes, filename, config))
}

/// Paths of the two files written for one profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFiles {
    pub json: PathBuf,
    pub docx: PathBuf,
}

/// Write `{base}.json` and `{base}.docx` into `dir`, creating it if needed.
///
/// Each file is written to a temp file in `dir` and renamed into place, so a
/// reader never sees a half-written output.
pub fn write_outputs(output: &ProfileOutput, dir: &Path) -> Result<WrittenFiles, PipelineError> {
    std::fs::create_dir_all(dir).map_err(|source| PipelineError::OutputWriteFailed {
        path: dir.to_path_buf(),
        source,
    })?;
    let json = dir.join(output.json_file_name());
    let docx = dir.join(output.docx_file_name());
    write_atomic(&json, &output.record_json)?;
    write_atomic(&docx, &output.document)?;
    debug!("Wrote {} and {}", json.display(), docx.display());
    Ok(WrittenFiles { json, docx })
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<(), PipelineError> {
    let fail = |source: std::io::Error| PipelineError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(fail)?;
    tmp.write_all(data).map_err(fail)?;
    tmp.persist(path).map_err(|e| fail(e.error))?;
    Ok(())
}

/// Process a local file and write both outputs next to it (or into `out_dir`).
pub async fn process_to_dir(
    path: &Path,
    out_dir: Option<&Path>,
    config: &PipelineConfig,
) -> Result<WrittenFiles, PipelineError> {
    let output = ResumePipeline::from_config(config)?.run_file(path).await?;
    let dir = output_dir_for(path, out_dir);
    write_outputs(&output, &dir)
}

/// `out_dir` when given, else the input's own directory.
pub fn output_dir_for(input: &Path, out_dir: Option<&Path>) -> PathBuf {
    match out_dir {
        Some(dir) => dir.to_path_buf(),
        None => input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    }
}

/// Extract a local file's text without calling the model.
///
/// Does not require a model backend or API key.
pub async fn extract_file(path: &Path, options: &ExtractOptions) -> Result<String, PipelineError> {
    let wrap = |source: ExtractError| PipelineError::ExtractionFailed {
        filename: path.display().to_string(),
        source,
    };
    let document = RawDocument::from_path(path).await.map_err(wrap)?;
    extract_text(document, options).await.map_err(wrap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileRecord;

    fn output(base: &str) -> ProfileOutput {
        ProfileOutput {
            base_name: base.into(),
            record: ProfileRecord::default(),
            record_json: b"{}".to_vec(),
            document: b"PK".to_vec(),
            renderer: "generate",
            stats: RunStats::default(),
        }
    }

    #[test]
    fn writes_both_outputs_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/out");
        let written = write_outputs(&output("Jane_Doe"), &target).unwrap();
        assert_eq!(written.json, target.join("Jane_Doe.json"));
        assert_eq!(std::fs::read(&written.json).unwrap(), b"{}");
        assert_eq!(std::fs::read(&written.docx).unwrap(), b"PK");

        // Overwrites in place and leaves no temp files behind.
        write_outputs(&output("Jane_Doe"), &target).unwrap();
        assert_eq!(std::fs::read_dir(&target).unwrap().count(), 2);
    }

    #[test]
    fn output_dir_defaults_to_input_dir() {
        assert_eq!(
            output_dir_for(Path::new("/in/cv.pdf"), None),
            PathBuf::from("/in")
        );
        assert_eq!(output_dir_for(Path::new("cv.pdf"), None), PathBuf::from("."));
        assert_eq!(
            output_dir_for(Path::new("/in/cv.pdf"), Some(Path::new("/out"))),
            PathBuf::from("/out")
        );
    }
}
