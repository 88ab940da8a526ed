//! CLI binary for ledgerscan.
//!
//! A thin shim over the library crate: maps flags and environment variables
//! to `AnalysisConfig`, runs one of the subcommands, prints results, and
//! saves each result as `<output-dir>/<stem>.json`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;
use indicatif::{ProgressBar, ProgressStyle};
use ledgerscan::{
    analyze, analyze_batch, discover_documents, pick_random, write_result, AnalysisConfig,
    AnalysisOutput, AnalysisProgressCallback, ProgressCallback, ReferencePaths,
};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::error;
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

// ── Batch progress callback using indicatif ──────────────────────────────────

/// Terminal progress bar for batch runs. Documents may finish out of order.
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
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Analyzing");
        bar.enable_steady_tick(Duration::from_millis(80));

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

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Analyzing {total} documents…"))
        ));
    }

    fn on_document_start(&self, index: usize, _total: usize, path: &Path) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(path.display().to_string());
    }

    fn on_document_complete(&self, index: usize, total: usize, entry_count: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} Document {:>3}/{:<3}  {:<12}  {}",
            green("✓"),
            index,
            total,
            dim(&format!("{entry_count:>4} entries")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let first_line = error.lines().next().unwrap_or(error);
        let msg: String = if first_line.chars().count() > 80 {
            first_line.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            first_line.to_string()
        };

        self.bar.println(format!(
            "  {} Document {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} documents analyzed successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} documents analyzed  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Interactive menu (default)
  ledgerscan

  # Analyze one document
  ledgerscan analyze documents/2024/invoice-17.pdf

  # Analyze a random document from the input tree
  ledgerscan random --input-dir documents

  # Analyze every document, 8 at a time, with retries
  ledgerscan batch --concurrency 8 --max-retries 2

REFERENCE FILES (read fresh for every document):
  prompt.txt           system prompt
  plan.json            chart of accounts
  output_format.json   example of the expected output
  Use --refs-dir to look for them somewhere other than the working directory.

ENVIRONMENT VARIABLES:
  OPENROUTER_API_KEY   Bearer token for the completions endpoint
  MODEL_NAME           Model identifier, e.g. google/gemini-2.5-flash
  PDFIUM_LIB_PATH      pdfium shared library (file or directory) for PDF input
  RUST_LOG             Override the log filter
"#;

/// Turn primary accounting documents into ledger entries using a Vision LLM.
#[derive(Parser, Debug)]
#[command(
    name = "ledgerscan",
    version,
    about = "Turn primary accounting documents into ledger entries using a Vision LLM",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// API key for the completions endpoint.
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Model identifier sent with each request.
    #[arg(long, env = "MODEL_NAME", global = true)]
    model: Option<String>,

    /// Chat-completions URL.
    #[arg(long, env = "LEDGERSCAN_ENDPOINT", default_value = ledgerscan::DEFAULT_ENDPOINT, global = true)]
    endpoint: String,

    /// Directory holding prompt.txt, plan.json and output_format.json.
    #[arg(long, env = "LEDGERSCAN_REFS_DIR", default_value = ".", global = true)]
    refs_dir: PathBuf,

    /// Directory scanned recursively for .pdf/.png/.jpg/.jpeg documents.
    #[arg(long, env = "LEDGERSCAN_INPUT_DIR", default_value = "documents", global = true)]
    input_dir: PathBuf,

    /// Directory where <stem>.json results are written.
    #[arg(long, env = "LEDGERSCAN_OUTPUT_DIR", default_value = "results", global = true)]
    output_dir: PathBuf,

    /// Print results without writing them to the output directory.
    #[arg(long, global = true)]
    no_save: bool,

    /// Rendering DPI for PDF pages (72–400).
    #[arg(long, env = "LEDGERSCAN_DPI", default_value_t = 72, global = true,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Per-request timeout in seconds.
    #[arg(long, env = "LEDGERSCAN_API_TIMEOUT", default_value_t = 120, global = true)]
    api_timeout: u64,

    /// Retries on timeouts, connection errors, 429 and 5xx.
    #[arg(long, env = "LEDGERSCAN_MAX_RETRIES", default_value_t = 0, global = true)]
    max_retries: u32,

    /// pdfium shared library (file or directory).
    #[arg(long, env = "PDFIUM_LIB_PATH", global = true)]
    pdfium_lib: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "LEDGERSCAN_VERBOSE", global = true)]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, env = "LEDGERSCAN_QUIET", global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one document.
    Analyze {
        /// Path to a .pdf, .png, .jpg or .jpeg file.
        path: PathBuf,
    },
    /// Analyze one document chosen at random from the input directory.
    Random,
    /// Analyze every document in the input directory.
    Batch {
        /// Documents in flight at once.
        #[arg(short, long, env = "LEDGERSCAN_CONCURRENCY", default_value_t = 4)]
        concurrency: usize,

        /// Disable the progress bar.
        #[arg(long)]
        no_progress: bool,
    },
    /// Interactive menu (the default).
    Menu,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Some(Command::Analyze { ref path }) => {
            let config = build_config(&cli, None)?;
            if !run_single(&cli, &config, path).await? {
                std::process::exit(1);
            }
        }
        Some(Command::Random) => {
            let config = build_config(&cli, None)?;
            run_random(&cli, &config).await?;
        }
        Some(Command::Batch {
            concurrency,
            no_progress,
        }) => {
            let progress: Option<ProgressCallback> = if cli.quiet || no_progress {
                None
            } else {
                Some(CliProgressCallback::new() as ProgressCallback)
            };
            let mut config = build_config(&cli, progress)?;
            config.concurrency = concurrency.max(1);
            run_batch(&cli, &config).await?;
        }
        Some(Command::Menu) | None => {
            let config = build_config(&cli, None)?;
            run_menu(&cli, &config).await?;
        }
    }

    Ok(())
}

/// Map CLI args to `AnalysisConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .api_key(cli.api_key.clone().unwrap_or_default())
        .model(cli.model.clone().unwrap_or_default())
        .endpoint(cli.endpoint.clone())
        .references(ReferencePaths::in_dir(&cli.refs_dir))
        .dpi(cli.dpi)
        .api_timeout_secs(cli.api_timeout)
        .max_retries(cli.max_retries);

    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Analyze one document, print and save the result. Returns false on failure.
async fn run_single(cli: &Cli, config: &AnalysisConfig, path: &Path) -> Result<bool> {
    match analyze(path, config).await {
        Some(output) => {
            print_result(&output)?;
            if !cli.no_save {
                save(cli, &output).await;
            }
            Ok(true)
        }
        None => {
            eprintln!("{}", red("Analysis failed."));
            Ok(false)
        }
    }
}

async fn run_random(cli: &Cli, config: &AnalysisConfig) -> Result<bool> {
    let docs = discover_documents(&cli.input_dir);
    let Some(doc) = pick_random(&docs, &mut rand::thread_rng()) else {
        eprintln!(
            "No eligible files found to process in {}.",
            cli.input_dir.display()
        );
        return Ok(false);
    };
    run_single(cli, config, doc.path()).await
}

async fn run_batch(cli: &Cli, config: &AnalysisConfig) -> Result<()> {
    let docs = discover_documents(&cli.input_dir);
    if docs.is_empty() {
        eprintln!(
            "No eligible files found to process in {}.",
            cli.input_dir.display()
        );
        return Ok(());
    }

    let (outcomes, stats) = analyze_batch(docs, config)
        .await
        .context("Batch analysis failed")?;

    if !cli.no_save {
        let saved = save_all(cli, outcomes.iter().filter_map(|o| o.result.as_ref().ok())).await;
        if saved < stats.succeeded {
            eprintln!(
                "{} {} of {} results could not be saved",
                red("✗"),
                stats.succeeded - saved,
                stats.succeeded
            );
        }
    }

    if !cli.quiet {
        eprintln!(
            "{}  {}/{} documents  {}ms",
            if stats.failed == 0 { green("✔") } else { cyan("⚠") },
            stats.succeeded,
            stats.total_documents,
            stats.total_duration_ms,
        );
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&stats.total_input_tokens.to_string()),
            dim(&stats.total_output_tokens.to_string()),
        );
    }
    Ok(())
}

/// Main menu options.
const MENU_ITEMS: &[&str] = &["Analyze a random file", "Analyze all files", "Exit"];

async fn run_menu(cli: &Cli, config: &AnalysisConfig) -> Result<()> {
    let theme = ColorfulTheme::default();

    loop {
        let selection = Select::with_theme(&theme)
            .with_prompt("Menu")
            .items(MENU_ITEMS)
            .default(0)
            .interact_opt()
            .context("Failed to read menu choice")?;

        // A failed action is reported and the menu shown again.
        let outcome = match selection {
            Some(0) => run_random(cli, config).await.map(|_| ()),
            Some(1) => {
                let mut batch_config = config.clone();
                if !cli.quiet {
                    batch_config.progress_callback =
                        Some(CliProgressCallback::new() as ProgressCallback);
                }
                run_batch(cli, &batch_config).await
            }
            _ => {
                eprintln!("Exiting...");
                break;
            }
        };
        if let Err(e) = outcome {
            error!("{:#}", e);
        }
    }

    Ok(())
}

fn print_result(output: &AnalysisOutput) -> Result<()> {
    let json = output
        .entries
        .to_pretty_json()
        .context("Failed to serialise result")?;
    println!("\n--- Analysis Result ---");
    println!("{json}");
    println!("-----------------------");
    Ok(())
}

/// Write one result to the output directory. A failed write is logged and
/// reported as `false`; it never ends the session.
async fn save(cli: &Cli, output: &AnalysisOutput) -> bool {
    match write_result(&cli.output_dir, &output.source, &output.entries).await {
        Ok(path) => {
            if !cli.quiet {
                eprintln!("{} Saved result to {}", green("✔"), bold(&path.display().to_string()));
            }
            true
        }
        Err(e) => {
            error!("Failed to save result for {}: {}", output.source.display(), e);
            false
        }
    }
}

/// Save every output, continuing past failures. Returns how many were written.
async fn save_all<'a>(cli: &Cli, outputs: impl Iterator<Item = &'a AnalysisOutput>) -> usize {
    let mut saved = 0;
    for output in outputs {
        if save(cli, output).await {
            saved += 1;
        }
    }
    saved
}
