//! CLI binary for invoice-extract.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractorConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use invoice_extract::{
    extract, extract_to_file, ExtractionProgressCallback, ExtractorConfig, ProgressCallback,
    Stage,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that names the stage in flight and logs one line per finished
/// stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading document…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Analysis => "Analysing",
        Stage::Structuring => "Structuring",
        Stage::Translation => "Translating",
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_session_start(&self, _session: u64, filename: &str) {
        self.bar.println(format!("{} {}", bold("◆"), bold(filename)));
    }

    fn on_stage_start(&self, _session: u64, stage: Stage) {
        self.bar.set_prefix(stage_label(stage));
        self.bar.set_message(match stage {
            Stage::Analysis => "uploading for OCR…",
            Stage::Structuring => "extracting invoice fields…",
            Stage::Translation => "translating to English…",
        });
    }

    fn on_stage_complete(&self, _session: u64, stage: Stage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<12} {}",
            green("✓"),
            stage.as_str(),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_stage_error(&self, _session: u64, stage: Stage, error: &str) {
        let msg = match error.char_indices().nth(80) {
            Some((idx, _)) => format!("{}\u{2026}", &error[..idx]),
            None => error.to_string(),
        };
        self.bar
            .println(format!("  {} {:<12} {}", red("✗"), stage.as_str(), red(&msg)));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Structured invoice JSON in the document's language (stdout)
  invoice-extract facture.pdf

  # English rendition
  invoice-extract --view english rechnung.png

  # Full output (both views, envelope, markdown, timings) to a file
  invoice-extract --view english factura.pdf -o factura.json

  # Download the document first
  invoice-extract https://example.com/invoices/inv-042.pdf --json

  # Upload through a local analysis relay (it adds the cookie itself)
  invoice-extract --analysis-url http://localhost:3001/api/azure-analysis --no-cookie scan.jpg

ENVIRONMENT VARIABLES:
  INVOICE_ANALYSIS_URL     Document analysis (OCR) endpoint
  INVOICE_STRUCTURING_URL  LLM structuring endpoint
  INVOICE_TRANSLATION_URL  Translation endpoint
  INVOICE_ANALYSIS_COOKIE  Cookie header sent with the upload
  INVOICE_PROVIDER         Structuring provider (default: groq)
  INVOICE_MODEL            Structuring model (default: llama-3.3-70b-versatile)
  RUST_LOG                 Overrides --verbose / --quiet log filtering
"#;

/// Extract structured data from invoice PDFs and images.
#[derive(Parser, Debug)]
#[command(
    name = "invoice-extract",
    version,
    about = "Extract structured invoice data from PDFs and images",
    long_about = "Upload an invoice (local file or URL) for OCR, structure the result into \
invoice JSON with an LLM, and optionally translate it to English.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF/image path or HTTP/HTTPS URL.
    input: String,

    /// Write the full JSON output to this file instead of stdout.
    #[arg(short, long, env = "INVOICE_OUTPUT")]
    output: Option<PathBuf>,

    /// Which rendition to print.
    #[arg(long, env = "INVOICE_VIEW", value_enum, default_value = "original")]
    view: ViewArg,

    /// Print the full output (both views, envelope, markdown, timings).
    #[arg(long, env = "INVOICE_JSON")]
    json: bool,

    /// Document analysis endpoint.
    #[arg(long, env = "INVOICE_ANALYSIS_URL")]
    analysis_url: Option<String>,

    /// LLM structuring endpoint.
    #[arg(long, env = "INVOICE_STRUCTURING_URL")]
    structuring_url: Option<String>,

    /// Translation endpoint.
    #[arg(long, env = "INVOICE_TRANSLATION_URL")]
    translation_url: Option<String>,

    /// Cookie header for the analysis upload.
    #[arg(long, env = "INVOICE_ANALYSIS_COOKIE")]
    analysis_cookie: Option<String>,

    /// Send no cookie with the upload (e.g. when going through the relay).
    /// Wins over `--analysis-cookie` and `INVOICE_ANALYSIS_COOKIE`.
    #[arg(long)]
    no_cookie: bool,

    /// Structuring provider.
    #[arg(long, env = "INVOICE_PROVIDER")]
    provider: Option<String>,

    /// Structuring model.
    #[arg(long, env = "INVOICE_MODEL")]
    model: Option<String>,

    /// Path to a text file replacing the built-in structuring prompt.
    #[arg(long, env = "INVOICE_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Disable the progress spinner.
    #[arg(long, env = "INVOICE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "INVOICE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "INVOICE_QUIET")]
    quiet: bool,

    /// Analysis upload timeout in seconds.
    #[arg(long, env = "INVOICE_UPLOAD_TIMEOUT", default_value_t = 120)]
    upload_timeout: u64,

    /// Structuring and translation timeout in seconds.
    #[arg(long, env = "INVOICE_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, env = "INVOICE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ViewArg {
    Original,
    English,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers progress; library INFO logs would only garble it.
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(
        &cli,
        progress
            .clone()
            .map(|cb| cb as Arc<dyn ExtractionProgressCallback>),
    )
    .await?;

    // ── Run extraction ───────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let result = extract_to_file(&cli.input, output_path, &config).await;
        if let Some(cb) = &progress {
            cb.finish();
        }
        let stats = result.context("Extraction failed")?;

        if !cli.quiet {
            eprintln!(
                "{}  {} line items  {}ms  →  {}",
                green("✔"),
                stats.line_items,
                stats.total_ms,
                bold(&output_path.display().to_string()),
            );
        }
        return Ok(());
    }

    let result = extract(&cli.input, &config).await;
    if let Some(cb) = &progress {
        cb.finish();
    }
    let output = result.context("Extraction failed")?;

    let json = if cli.json {
        serde_json::to_string_pretty(&output)
    } else {
        match (cli.view, &output.translated) {
            (ViewArg::English, Some(english)) => serde_json::to_string_pretty(english),
            _ => serde_json::to_string_pretty(&output.original),
        }
    }
    .context("Failed to serialise output")?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{json}").context("Failed to write to stdout")?;

    if !cli.quiet {
        eprintln!(
            "{}  {} line items  {}ms total",
            green("✔"),
            output.stats.line_items,
            output.stats.total_ms
        );
    }

    Ok(())
}

/// Map CLI args to `ExtractorConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractorConfig> {
    let mut builder = ExtractorConfig::builder()
        .translate(cli.view == ViewArg::English)
        .upload_timeout_secs(cli.upload_timeout)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref url) = cli.analysis_url {
        builder = builder.analysis_url(url);
    }
    if let Some(ref url) = cli.structuring_url {
        builder = builder.structuring_url(url);
    }
    if let Some(ref url) = cli.translation_url {
        builder = builder.translation_url(url);
    }
    if cli.no_cookie {
        builder = builder.analysis_cookie(None::<String>);
    } else if let Some(ref cookie) = cli.analysis_cookie {
        builder = builder.analysis_cookie(Some(cookie));
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider(provider);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref path) = cli.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read structuring prompt from {:?}", path))?;
        builder = builder.structuring_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_cookie_overrides_a_supplied_cookie() {
        let cli = Cli::try_parse_from([
            "invoice-extract",
            "facture.pdf",
            "--analysis-cookie",
            "client_id=abc",
            "--no-cookie",
        ])
        .unwrap();

        let config = build_config(&cli, None).await.unwrap();
        assert_eq!(config.analysis_cookie, None);
    }

    #[tokio::test]
    async fn cookie_flag_is_used_without_no_cookie() {
        let cli =
            Cli::try_parse_from(["invoice-extract", "facture.pdf", "--analysis-cookie", "client_id=abc"])
                .unwrap();

        let config = build_config(&cli, None).await.unwrap();
        assert_eq!(config.analysis_cookie.as_deref(), Some("client_id=abc"));
    }
}
