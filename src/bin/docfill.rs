//! CLI binary for edgequake-docfill.
//!
//! A thin shim over [`Session`]: uploads the template and documents, applies
//! `--format` / `--select`, then writes the filled workbook and the selected
//! documents to the output directory.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docfill::{
    Annotation, BatchProgressCallback, DocFillConfig, DocumentFile, FieldKey, OutputFormat,
    ProgressCallback, Session,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per document. Documents finish out
/// of order, so timings are keyed by upload index.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Reading");

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.enable_steady_tick(Duration::from_millis(80));
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting fields from {total} document(s)…"))
        ));
    }

    fn on_document_start(&self, index: usize, _total: usize, file_name: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(file_name.to_string());
    }

    fn on_document_complete(&self, index: usize, total: usize, file_name: &str) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            green("✓"),
            index + 1,
            total,
            file_name,
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, total: usize, file_name: &str, error: &str) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            red("✗"),
            index + 1,
            total,
            file_name,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, extracted: usize) {
        self.bar.finish_and_clear();
        let failed = total.saturating_sub(extracted);
        if failed == 0 {
            eprintln!(
                "{} {} document(s) read successfully",
                green("✔"),
                bold(&extracted.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} document(s) read  ({} without data)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&extracted.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Fill a template from a folder of scans
  docfill --template template.xlsx scans/*.jpg scans/*.pdf

  # Also download documents 1 and 3, document 1 converted to PDF
  docfill --template template.xlsx --select 1,3 --format 1=pdf a.jpg b.jpg c.pdf

  # Everything as JSON, into ./out
  docfill --template template.xlsx --json --output-dir out *.jpg

OUTPUT:
  Dokumen_Terisi.xlsx   the template with one appended row per distinct person
  <name>.<ext>          a single selected document
  Dokumen_Terunduh.zip  two or more selected documents

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (needed for PDF input and PDF → JPG)
"#;

/// Extract identity fields from scans and fill a spreadsheet template.
#[derive(Parser, Debug)]
#[command(
    name = "docfill",
    version,
    about = "Extract identity fields from scanned documents and fill a spreadsheet template",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Document files (images or PDFs), in upload order.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Spreadsheet template (.xlsx, .xls, .ods); row 1 is the header.
    #[arg(short, long, env = "DOCFILL_TEMPLATE")]
    template: PathBuf,

    /// Directory for Dokumen_Terisi.xlsx and downloaded documents.
    #[arg(short, long, env = "DOCFILL_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Documents to download: all, or 1-based positions like 1,3.
    #[arg(long, env = "DOCFILL_SELECT")]
    select: Option<String>,

    /// Per-document format, e.g. 2=pdf or 3=jpg (repeatable).
    #[arg(long = "format", value_name = "N=FORMAT")]
    formats: Vec<String>,

    /// Print results as JSON instead of a table.
    #[arg(long, env = "DOCFILL_JSON")]
    json: bool,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1-mini, gemini-2.5-flash).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Number of concurrent extraction calls.
    #[arg(short, long, env = "DOCFILL_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Per-document extraction timeout in seconds.
    #[arg(long, env = "DOCFILL_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Leading PDF pages sent for extraction.
    #[arg(long, env = "DOCFILL_PDF_PAGES", default_value_t = 2)]
    pdf_pages: usize,

    /// Max LLM output tokens per document.
    #[arg(long, env = "DOCFILL_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// Path to a text file replacing the built-in extraction instruction.
    #[arg(long, env = "DOCFILL_INSTRUCTION")]
    instruction: Option<PathBuf>,

    /// Disable progress bar.
    #[arg(long, env = "DOCFILL_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCFILL_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCFILL_QUIET")]
    quiet: bool,
}

/// Which documents `--select` names.
#[derive(Debug, PartialEq)]
enum Selection {
    All,
    Indices(Vec<usize>),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level logs unless --verbose.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Parse selection flags before spending any tokens ─────────────────
    let selection = cli.select.as_deref().map(parse_selection).transpose()?;
    let formats = cli
        .formats
        .iter()
        .map(|s| parse_format_override(s))
        .collect::<Result<Vec<_>>>()?;

    // ── Session ──────────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;
    let mut session = Session::from_config(config).context("Failed to set up LLM provider")?;

    let template_bytes = tokio::fs::read(&cli.template)
        .await
        .with_context(|| format!("Failed to read template {:?}", cli.template))?;
    session
        .upload_template(&template_bytes)
        .with_context(|| format!("Failed to load template {:?}", cli.template))?;

    let mut documents = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {:?}", path))?;
        documents.push(DocumentFile::guess(file_name_of(path), bytes));
    }

    let stats = session.upload_documents(documents).await;

    // ── Formats and selection ────────────────────────────────────────────
    for (position, format) in formats {
        session
            .set_format(position - 1, format)
            .with_context(|| format!("--format {position}={format}"))?;
    }
    match selection {
        Some(Selection::All) => {
            for i in 0..session.entries().len() {
                session.toggle_select(i)?;
            }
        }
        Some(Selection::Indices(positions)) => {
            for position in positions {
                session
                    .toggle_select(position - 1)
                    .with_context(|| format!("--select {position}"))?;
            }
        }
        None => {}
    }

    // ── Outputs ──────────────────────────────────────────────────────────
    tokio::fs::create_dir_all(&cli.output_dir)
        .await
        .with_context(|| format!("Failed to create {:?}", cli.output_dir))?;

    let export = session
        .download_spreadsheet()
        .context("Spreadsheet export failed")?;
    let xlsx_path = cli.output_dir.join(&export.file_name);
    tokio::fs::write(&xlsx_path, &export.bytes)
        .await
        .with_context(|| format!("Failed to write {:?}", xlsx_path))?;

    let download = if session.selected_count() > 0 {
        let artifact = session
            .download_documents()
            .await
            .context("Document download failed")?;
        let path = cli.output_dir.join(&artifact.file_name);
        tokio::fs::write(&path, &artifact.bytes)
            .await
            .with_context(|| format!("Failed to write {:?}", path))?;
        Some((artifact, path))
    } else {
        None
    };

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        let documents: Vec<_> = session
            .entries()
            .iter()
            .zip(session.records())
            .map(|(entry, record)| {
                json!({
                    "file": entry.file().name,
                    "download_name": entry.download_name(),
                    "format": entry.format(),
                    "available_formats": entry.available_formats(),
                    "selected": entry.selected,
                    "annotation": record.as_ref().map(|r| Annotation::for_record(r).as_str()),
                    "record": record,
                })
            })
            .collect();
        let report = json!({
            "stats": stats,
            "documents": documents,
            "spreadsheet": {
                "path": xlsx_path,
                "sheet_name": export.sheet_name,
                "rows_appended": export.rows_appended,
            },
            "download": download.as_ref().map(|(artifact, path)| json!({
                "path": path,
                "entries": artifact.entries,
                "skipped": artifact.skipped,
            })),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
        return Ok(());
    }

    if !cli.quiet {
        print_table(&session);
        eprintln!(
            "{}  {} row(s) appended  →  {}",
            green("✔"),
            export.rows_appended,
            bold(&xlsx_path.display().to_string()),
        );
        if let Some((artifact, path)) = &download {
            eprintln!(
                "{}  {} document(s)  →  {}",
                green("✔"),
                artifact.entries.len(),
                bold(&path.display().to_string()),
            );
            for skipped in &artifact.skipped {
                eprintln!(
                    "   {} {}: {}",
                    red("✗"),
                    skipped.download_name,
                    red(&skipped.error.to_string())
                );
            }
        }
        if !show_progress {
            eprintln!(
                "Read {}/{} document(s) in {}ms",
                stats.extracted, stats.total, stats.duration_ms
            );
        }
    }

    Ok(())
}

/// Map CLI args to `DocFillConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<DocFillConfig> {
    let mut builder = DocFillConfig::builder()
        .concurrency(cli.concurrency)
        .api_timeout_secs(cli.api_timeout)
        .pdf_pages(cli.pdf_pages)
        .max_tokens(cli.max_tokens);

    if let Some(ref path) = cli.instruction {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instruction from {:?}", path))?;
        builder = builder.instruction(text);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Human-readable per-document summary on stdout.
fn print_table(session: &Session) {
    for (i, (entry, record)) in session.entries().iter().zip(session.records()).enumerate() {
        let marker = if entry.selected { cyan("●") } else { dim("○") };
        println!(
            "{} {:>3}  {}  →  {}  {}",
            marker,
            i + 1,
            entry.file().name,
            bold(entry.download_name()),
            dim(&format!(
                "[{}]",
                entry
                    .available_formats()
                    .iter()
                    .map(|f| f.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        );
        match record {
            Some(r) => {
                for key in FieldKey::ALL {
                    let value = r.field(key);
                    let text = if value.is_present() {
                        value.display().to_string()
                    } else {
                        dim(value.display())
                    };
                    println!("        {:<10} {}", key.label(), text);
                }
                let annotation = Annotation::for_record(r);
                if annotation != Annotation::Complete {
                    println!("        {:<10} {}", "Keterangan", red(annotation.as_str()));
                }
            }
            None => println!("        {}", red("no data extracted")),
        }
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Parse `--select`: `all` or comma-separated 1-based positions.
fn parse_selection(s: &str) -> Result<Selection> {
    let s = s.trim().to_lowercase();
    if s == "all" {
        return Ok(Selection::All);
    }

    let mut positions = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let n: usize = part
            .parse()
            .with_context(|| format!("Invalid document number: '{part}'"))?;
        if n < 1 {
            anyhow::bail!("Documents are 1-indexed, minimum is 1 (got {n})");
        }
        if !positions.contains(&n) {
            positions.push(n);
        }
    }
    if positions.is_empty() {
        anyhow::bail!("--select needs 'all' or document numbers like 1,3");
    }
    Ok(Selection::Indices(positions))
}

/// Parse one `--format N=FORMAT` override.
fn parse_format_override(s: &str) -> Result<(usize, OutputFormat)> {
    let (n, format) = s
        .split_once('=')
        .with_context(|| format!("Expected N=FORMAT, got '{s}'"))?;
    let n: usize = n
        .trim()
        .parse()
        .with_context(|| format!("Invalid document number in '{s}'"))?;
    if n < 1 {
        anyhow::bail!("Documents are 1-indexed, minimum is 1 (got {n})");
    }
    let format: OutputFormat = format.parse().map_err(anyhow::Error::msg)?;
    Ok((n, format))
}
