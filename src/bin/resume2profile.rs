//! CLI binary for resume-profile.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and writes the profile files.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use resume_profile::{
    extract_file, output_dir_for, write_outputs, AzureSettings, PipelineConfig,
    PipelineProgressCallback, ProgressCallback, RenderMode, ResumePipeline, Stage,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar counting finished documents plus a
/// log line per completed stage. Documents finish out of order when
/// `--concurrency` is above one.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new(total: usize) -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} resumes  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        let bar = ProgressBar::new(total as u64);
        bar.set_style(style);
        bar.set_prefix("Profiling");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, filename: &str) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(filename))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn finish(&self, total: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} resumes converted successfully",
                green("✔"),
                bold(&total.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} resumes converted  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&(total - failed).to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_run_start(&self, filename: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(filename.to_string(), Instant::now());
        }
        self.bar.set_message(filename.to_string());
    }

    fn on_stage_start(&self, filename: &str, stage: Stage) {
        self.bar.set_message(format!("{filename}: {stage}"));
    }

    fn on_stage_complete(&self, filename: &str, stage: Stage, elapsed_ms: u64) {
        self.bar.println(format!(
            "    {} {:<14} {}  {}",
            dim("·"),
            stage.as_str(),
            dim(filename),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_run_complete(&self, filename: &str, base_name: &str) {
        let secs = self.elapsed_secs(filename);
        self.bar.println(format!(
            "  {} {}  →  {}  {}",
            green("✓"),
            filename,
            bold(base_name),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_run_error(&self, filename: &str, error: &str) {
        let secs = self.elapsed_secs(filename);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 100 {
            let mut s: String = error.chars().take(99).collect();
            s.push('\u{2026}');
            s
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {}  {}  {}",
            red("✗"),
            filename,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Generated layout, outputs next to the input
  resume2profile "Jane Doe CV.pdf"

  # Several resumes into one folder, with a logo
  resume2profile cvs/*.pdf cvs/*.docx -o profiles/ --logo brand.png

  # Fill a pre-authored template
  resume2profile --mode template --template profile_template.docx cv.docx

  # Use a named provider instead of Azure
  resume2profile --provider openai --model gpt-4.1-mini cv.pdf

  # Show the extracted text only (no model call)
  resume2profile --extract-only cv.pdf

ENVIRONMENT VARIABLES:
  AZURE_OPENAI_ENDPOINT     Azure OpenAI resource endpoint
  AZURE_OPENAI_API_KEY      Azure OpenAI key
  AZURE_OPENAI_API_VERSION  API version (default: 2024-12-01-preview)
  AZURE_OPENAI_DEPLOYMENT   Chat deployment name (DEPLOYMENT also accepted)
  EDGEQUAKE_LLM_PROVIDER    Provider used when Azure is not configured
  EDGEQUAKE_MODEL           Model ID for that provider
  PROFILE_RENDER_MODE       generate | template
  PROFILE_TEMPLATE_PATH     Template DOCX for template mode
  PROFILE_LOGO_PATH         Logo image (PNG or JPEG)
  PDFIUM_LIB_PATH           libpdfium file or directory

OUTPUTS:
  For each input two files are written: {Name}.json and {Name}.docx, where
  {Name} is the profile's Name with unsafe characters replaced by "_"
  (the input's file stem when the model returns no name).
"#;

/// Convert PDF/DOCX resumes into structured profiles and styled DOCX documents.
#[derive(Parser, Debug)]
#[command(
    name = "resume2profile",
    version,
    about = "Convert PDF/DOCX resumes into professional profile documents using an LLM",
    long_about = "Extract the text of PDF or DOCX resumes, ask a chat model for a structured \
profile, and write the profile as JSON plus a styled DOCX capability document. Uses Azure \
OpenAI by default, or any edgequake-llm provider (OpenAI, Anthropic, Gemini, Ollama, …).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Resume files (.pdf or .docx).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory (default: next to each input).
    #[arg(short, long, env = "PROFILE_OUTPUT_DIR")]
    output: Option<PathBuf>,

    /// Document layout: generate or template.
    #[arg(long, env = "PROFILE_RENDER_MODE", value_enum, default_value = "generate")]
    mode: ModeArg,

    /// Template DOCX with {{Field}} placeholders (template mode).
    #[arg(long, env = "PROFILE_TEMPLATE_PATH")]
    template: Option<PathBuf>,

    /// Logo image placed in the header/footer (generate) or first paragraph (template).
    #[arg(long, env = "PROFILE_LOGO_PATH")]
    logo: Option<PathBuf>,

    /// Azure OpenAI endpoint.
    #[arg(long, env = "AZURE_OPENAI_ENDPOINT")]
    endpoint: Option<String>,

    /// Azure OpenAI API key.
    #[arg(long, env = "AZURE_OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Azure OpenAI API version.
    #[arg(long, env = "AZURE_OPENAI_API_VERSION")]
    api_version: Option<String>,

    /// Azure chat deployment name.
    #[arg(long, env = "AZURE_OPENAI_DEPLOYMENT")]
    deployment: Option<String>,

    /// edgequake-llm provider (openai, anthropic, gemini, ollama, …); overrides Azure.
    #[arg(long)]
    provider: Option<String>,

    /// Model ID for --provider.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Path to a text file containing a custom instruction payload.
    #[arg(long, env = "PROFILE_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max model output tokens (default: provider default).
    #[arg(long, env = "PROFILE_MAX_TOKENS")]
    max_tokens: Option<usize>,

    /// Model attempts per resume before giving up.
    #[arg(long, env = "PROFILE_MAX_ATTEMPTS", default_value_t = 5)]
    max_attempts: u32,

    /// Per-call model timeout in seconds.
    #[arg(long, env = "PROFILE_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Resumes processed at once.
    #[arg(short, long, env = "PROFILE_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// libpdfium shared library (file or directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Print extracted text only, no model call.
    #[arg(long)]
    extract_only: bool,

    /// Print a JSON summary of the written files to stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PROFILE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Generate,
    Template,
}

impl From<ModeArg> for RenderMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Generate => RenderMode::Generate,
            ModeArg::Template => RenderMode::Template,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose is given.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.extract_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Extract-only mode ────────────────────────────────────────────────
    if cli.extract_only {
        let mut builder = PipelineConfig::builder();
        if let Some(ref lib) = cli.pdfium_lib {
            builder = builder.pdfium_lib_path(lib);
        }
        let options = builder.build().context("Invalid configuration")?.extract_options();
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        for input in &cli.inputs {
            let text = extract_file(input, &options)
                .await
                .with_context(|| format!("Failed to extract {}", input.display()))?;
            if cli.inputs.len() > 1 {
                writeln!(handle, "==> {} <==", input.display())?;
            }
            handle
                .write_all(text.as_bytes())
                .context("Failed to write to stdout")?;
            if !text.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
        return Ok(());
    }

    // ── Build pipeline ───────────────────────────────────────────────────
    let progress = show_progress.then(|| CliProgressCallback::new(cli.inputs.len()));
    let config = build_config(&cli, progress.clone().map(|p| p as ProgressCallback)).await?;
    let pipeline = ResumePipeline::from_config(&config).context("Failed to set up pipeline")?;

    // ── Run ──────────────────────────────────────────────────────────────
    let items = pipeline.run_batch(&cli.inputs).await;
    if let Some(ref p) = progress {
        p.finish(cli.inputs.len());
    }

    let mut failures = 0usize;
    let mut summary = Vec::with_capacity(items.len());
    for item in items {
        let written = item.result.and_then(|output| {
            let dir = output_dir_for(&item.path, cli.output.as_deref());
            write_outputs(&output, &dir).map(|files| (files, output.stats))
        });
        match written {
            Ok((files, stats)) => {
                if !cli.quiet && !cli.json {
                    eprintln!(
                        "{}  {}  →  {}",
                        green("✔"),
                        item.path.display(),
                        bold(&files.docx.display().to_string()),
                    );
                    eprintln!(
                        "   {} attempt(s)  /  {} chars extracted  /  {}ms total",
                        dim(&stats.model_attempts.to_string()),
                        dim(&stats.extracted_chars.to_string()),
                        stats.total_ms,
                    );
                }
                summary.push(serde_json::json!({
                    "input": item.path,
                    "json": files.json,
                    "docx": files.docx,
                    "stats": stats,
                }));
            }
            Err(e) => {
                failures += 1;
                let chain = anyhow::Error::new(e);
                eprintln!("{} {}: {:#}", red("✘"), item.path.display(), chain);
                summary.push(serde_json::json!({
                    "input": item.path,
                    "error": format!("{chain:#}"),
                }));
            }
        }
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?;
        println!("{json}");
    }

    if failures > 0 {
        bail!("{failures} of {} resumes failed", cli.inputs.len());
    }
    Ok(())
}

/// Map CLI args to `PipelineConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = PipelineConfig::builder()
        .render_mode(cli.mode.into())
        .max_attempts(cli.max_attempts)
        .api_timeout_secs(cli.api_timeout)
        .concurrency(cli.concurrency);

    // A named provider wins; otherwise Azure when all three flags are known;
    // otherwise the library's environment fallbacks decide.
    if let Some(ref name) = cli.provider {
        builder = builder.provider(name.clone(), cli.model.clone().unwrap_or_default());
    } else if let (Some(endpoint), Some(key), Some(deployment)) =
        (&cli.endpoint, &cli.api_key, &cli.deployment)
    {
        let mut azure = AzureSettings::new(endpoint.clone(), key.clone(), deployment.clone());
        if let Some(ref version) = cli.api_version {
            azure = azure.api_version(version.clone());
        }
        builder = builder.azure(azure);
    }

    if let Some(ref path) = cli.template {
        builder = builder.template_path(path);
    }
    if let Some(ref path) = cli.logo {
        builder = builder.logo_path(path);
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib);
    }
    if let Some(n) = cli.max_tokens {
        builder = builder.max_tokens(n);
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
