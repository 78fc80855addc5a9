//! CLI binary for edgequake-docextract.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, runs one or several inputs and prints the JSON result.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docextract::{
    Pipeline, PipelineConfig, PipelineProgressCallback, ProgressCallback, Taxonomy,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
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

fn truncate(msg: &str, max: usize) -> String {
    if msg.chars().count() > max {
        let cut: String = msg.chars().take(max - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        msg.to_string()
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar over documents for a single input, or over
/// files for a batch. Group events may arrive out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    batch: bool,
    /// Per-group wall-clock start times (single-input mode).
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new(files: usize) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading input…");
        bar.enable_steady_tick(Duration::from_millis(80));

        let batch = files > 1;
        let cb = Arc::new(Self {
            bar,
            batch,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        });
        if batch {
            cb.activate_bar(files, "files");
        }
        cb
    }

    fn activate_bar(&self, total: usize, unit: &str) {
        let template = format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  \
             [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {unit}  \
             ⏱ {{elapsed_precise}}"
        );
        let progress_style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn elapsed(&self, group: usize) -> f64 {
        self.start_times
            .lock()
            .map(|mut m| m.remove(&group))
            .ok()
            .flatten()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_run_start(&self, input: &str, total_pages: usize, loader: &str) {
        self.bar.println(format!(
            "{} {}  {}",
            cyan("◆"),
            bold(input),
            dim(&format!("{total_pages} page(s), {loader} loader"))
        ));
    }

    fn on_segmented(&self, groups: usize) {
        if !self.batch {
            self.activate_bar(groups, "documents");
        }
    }

    fn on_group_start(&self, group: usize, _total: usize) {
        if !self.batch {
            if let Ok(mut m) = self.start_times.lock() {
                m.insert(group, Instant::now());
            }
            self.bar.set_message(format!("document {group}"));
        }
    }

    fn on_group_complete(&self, group: usize, total: usize, doc_type: Option<&str>) {
        if self.batch {
            return;
        }
        let secs = self.elapsed(group);
        self.bar.println(format!(
            "  {} Document {:>2}/{:<2}  {:<28}  {}",
            green("✓"),
            group,
            total,
            doc_type.unwrap_or("(category only)"),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_group_error(&self, group: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        if self.batch {
            return;
        }
        let secs = self.elapsed(group);
        self.bar.println(format!(
            "  {} Document {:>2}/{:<2}  {}  {}",
            red("✗"),
            group,
            total,
            red(&truncate(error, 80)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, documents: usize, error: Option<&str>) {
        if let Some(e) = error {
            self.bar
                .println(format!("  {} {}", red("✘"), red(&truncate(e, 100))));
        } else if self.batch {
            self.bar.println(format!(
                "  {} {} document(s)",
                green("✓"),
                documents
            ));
        }
        if self.batch {
            self.bar.inc(1);
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One file, JSON on stdout
  docextract scan.pdf

  # Several files, 4 at a time, written to a file
  docextract -j 4 cccd.jpg hop-dong.pdf hoa-don.pdf -o results.json

  # Use a specific model
  docextract --provider openai --model gpt-4.1 scan.pdf

  # Custom taxonomy
  docextract --taxonomy my-types.json scan.pdf

  # Show the document types the classifier can assign
  docextract --list-types

OUTPUT:
  One input:     {"documents": [...], "error": null}
  Several:       {"total": N, "results": [{"input": "...", "documents": [...],
                                           "error": null, "duration_ms": 1234}]}

  Each document: {"category", "docType", "data", "confidence",
                  "_debug": {"loader", "vision", "pages"}}

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium; skips auto-download
  PDFIUM_AUTO_CACHE_DIR   Override the default pdfium cache directory

  A .env file in the working directory is loaded at start-up.
"#;

/// Split, classify and extract documents from PDFs and images.
#[derive(Parser, Debug)]
#[command(
    name = "docextract",
    version,
    about = "Split, classify and extract documents from PDFs, images and spreadsheets",
    long_about = "Find the logical documents inside each input file, classify them against a \
two-level taxonomy (category, then document type) and extract the fields of each document \
type with an LLM. Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any \
OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file paths or HTTP/HTTPS URLs.
    #[arg(required_unless_present = "list_types")]
    inputs: Vec<String>,

    /// Write JSON to this file instead of stdout.
    #[arg(short, long, env = "DOCEXTRACT_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4.1-mini, gemini-2.0-flash).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// JSON taxonomy file replacing the built-in catalogue.
    #[arg(long, env = "DOCEXTRACT_TAXONOMY")]
    taxonomy: Option<PathBuf>,

    /// Print the taxonomy tree and exit.
    #[arg(long)]
    list_types: bool,

    /// Files processed at the same time.
    #[arg(short, long, env = "DOCEXTRACT_JOBS", default_value_t = 2)]
    jobs: usize,

    /// Concurrent extraction calls per file.
    #[arg(short, long, env = "DOCEXTRACT_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Split files with at most this many pages in one call; longer files
    /// are split page by page.
    #[arg(long, env = "DOCEXTRACT_EAGER_THRESHOLD", default_value_t = 10)]
    eager_threshold: usize,

    /// Do not retry segmentation with the other modality on a mismatch.
    #[arg(long, env = "DOCEXTRACT_NO_FALLBACK")]
    no_fallback: bool,

    /// The model cannot read images; use text only.
    #[arg(long, env = "DOCEXTRACT_NO_VISION")]
    no_vision: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "DOCEXTRACT_PASSWORD")]
    password: Option<String>,

    /// Max LLM output tokens per call.
    #[arg(long, env = "DOCEXTRACT_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOCEXTRACT_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Retries per LLM call on failure.
    #[arg(long, env = "DOCEXTRACT_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "DOCEXTRACT_API_TIMEOUT", default_value_t = 90)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOCEXTRACT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Longest edge of rendered PDF pages in pixels.
    #[arg(long, env = "DOCEXTRACT_MAX_PIXELS", default_value_t = 2000)]
    max_pixels: u32,

    /// Print JSON on one line.
    #[arg(long, env = "DOCEXTRACT_COMPACT")]
    compact: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCEXTRACT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCEXTRACT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCEXTRACT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress;
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

    // ── Taxonomy ─────────────────────────────────────────────────────────
    let taxonomy = match cli.taxonomy {
        Some(ref path) => Taxonomy::from_path(path)
            .with_context(|| format!("Failed to load taxonomy from {:?}", path))?,
        None => Taxonomy::builtin(),
    };

    if cli.list_types {
        print!("{}", taxonomy.render_tree());
        return Ok(());
    }

    // ── Ensure PDFium engine is available ───────────────────────────────────
    // Downloaded (~30 MB) on first use, cached afterwards.
    let needs_pdfium = cli
        .inputs
        .iter()
        .any(|i| i.to_lowercase().ends_with(".pdf") || i.starts_with("http"));
    if needs_pdfium && !pdfium_auto::is_pdfium_cached() {
        ensure_pdfium(cli.quiet)?;
    }

    // ── Build config and pipeline ────────────────────────────────────────
    let progress = show_progress.then(|| CliProgressCallback::new(cli.inputs.len()));
    let config = build_config(
        &cli,
        progress.clone().map(|cb| cb as ProgressCallback),
    )?;
    let pipeline = Pipeline::new(config, taxonomy).context("Failed to set up the LLM provider")?;

    // ── Run ──────────────────────────────────────────────────────────────
    let started = Instant::now();
    let (json, failed) = if cli.inputs.len() == 1 {
        let result = pipeline.run(&cli.inputs[0]).await;
        let failed = !result.is_success();
        (to_json(&result, cli.compact)?, failed)
    } else {
        let batch = pipeline.run_many(&cli.inputs, cli.jobs).await;
        (to_json(&batch, cli.compact)?, false)
    };

    let errors = progress
        .as_ref()
        .map(|cb| {
            cb.finish();
            cb.errors.load(Ordering::SeqCst)
        })
        .unwrap_or(0);

    match cli.output {
        Some(ref path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("Failed to write {:?}", path))?;
            if !cli.quiet {
                eprintln!(
                    "{}  {} input(s)  {}ms  →  {}",
                    if failed { red("✘") } else { green("✔") },
                    cli.inputs.len(),
                    started.elapsed().as_millis(),
                    bold(&path.display().to_string()),
                );
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{json}").context("Failed to write to stdout")?;
        }
    }

    if errors > 0 && !cli.quiet {
        eprintln!("{} {} document(s) skipped or without data", cyan("⚠"), errors);
    }
    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn to_json<T: Serialize>(value: &T, compact: bool) -> Result<String> {
    if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .context("Failed to serialise output")
}

/// Download pdfium with a byte-level progress bar.
fn ensure_pdfium(quiet: bool) -> Result<()> {
    if quiet {
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .context("Failed to download PDFium engine")?;
        return Ok(());
    }

    let dl_bar = ProgressBar::new(0);
    dl_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    dl_bar.set_prefix("PDF engine");
    dl_bar.set_message("Connecting…");
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    // block_in_place: the download is blocking and the callback borrows `bar`.
    tokio::task::block_in_place(|| {
        pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
            if let Some(t) = total {
                if bar.length().unwrap_or(0) != t {
                    bar.set_length(t);
                }
            }
            bar.set_position(downloaded);
        }))
    })
    .context("Failed to download PDFium engine")?;

    dl_bar.finish_with_message("ready ✓");
    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .concurrency(cli.concurrency)
        .eager_page_threshold(cli.eager_threshold)
        .modality_fallback(!cli.no_fallback)
        .vision_enabled(!cli.no_vision)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .max_rendered_pixels(cli.max_pixels);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
