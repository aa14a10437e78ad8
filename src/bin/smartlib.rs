//! CLI binary for smartlib.
//!
//! A thin shim over the library crate: each subcommand maps its flags to a
//! `CatalogConfig` / `StoreConfig`, calls the library and prints a summary.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use indicatif::{ProgressBar, ProgressStyle};
use smartlib::{
    apply_plan, build_analyzer, serve, AnalyzerKind, AppState, CatalogConfig, CatalogPlan,
    CatalogProgressCallback, CatalogReport, CatalogStore, Cataloger, Form,
    KeywordInference, KeywordModelKind, Pacer, ProgressCallback, StoreConfig,
    TextGenerationKeywords,
};
use std::io::{self, IsTerminal, Write};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar for the directory, one log line per file.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Loading models…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed(&self) -> String {
        let secs = self
            .started
            .lock()
            .unwrap()
            .take()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }
}

impl CatalogProgressCallback for CliProgressCallback {
    fn on_catalog_start(&self, total_files: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total_files as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Cataloging");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Cataloging {total_files} files…"))
        ));
    }

    fn on_file_start(&self, _index: usize, _total: usize, path: &Path) {
        *self.started.lock().unwrap() = Some(Instant::now());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.bar.set_message(name);
    }

    fn on_file_complete(&self, index: usize, total: usize, title: &str) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            green("✓"),
            index + 1,
            total,
            title,
            self.elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_file_skipped(&self, index: usize, total: usize, path: &Path) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}",
            dim("·"),
            index + 1,
            total,
            dim(&path.display().to_string()),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg),
            self.elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_catalog_complete(&self, _total: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} files catalogued",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {} files catalogued  ({} failed)",
                if success_count == 0 { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Create a catalog, register its owner and the standard topics
  smartlib init library.db alice

  # Catalog a directory of Springer books named by ISBN
  smartlib catalog library.db ~/books/springer --publisher Springer --fetch-metadata

  # Let a vision model read the front pages, review before writing
  smartlib catalog library.db ~/papers --analyzer doc-vqa --form "research article" \
      --preview plan.json
  smartlib apply library.db plan.json

  # Serve the web UI backend on port 5000
  smartlib serve library.db alice

  # Rebuild a catalog from its statement log
  smartlib replay fresh.db locallog.txt

ANALYZERS:
  pdf-meta    embedded PDF info + Crossref record keyed on the ISBN file name
  doc-vqa     vision model, document question answering (default gpt-4.1-nano)
  moondream   vision model, short captions (default ollama/moondream)

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Directory or file of the pdfium shared library
  RUST_LOG                Log filter, overrides --verbose / --quiet
"#;

/// Catalog PDF libraries into SQLite and serve them to the web UI.
#[derive(Parser, Debug)]
#[command(
    name = "smartlib",
    version,
    about = "Catalog PDF libraries into SQLite using Vision LLMs",
    long_about = "Catalog directories of PDF documents into a SQLite database. Titles, publishers \
and years come from embedded PDF metadata, Crossref, or a Vision Language Model reading the \
front page; topics come from a text model. A small REST service exposes the catalog to the \
web UI.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "SMARTLIB_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "SMARTLIB_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "SMARTLIB_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct StoreArgs {
    /// SQLite catalog file (created when missing).
    database: PathBuf,

    /// Statement log. Default: locallog.txt next to the database.
    #[arg(long, env = "SMARTLIB_LOG")]
    log: Option<PathBuf>,

    /// Do not write a statement log.
    #[arg(long)]
    no_log: bool,
}

impl StoreArgs {
    fn config(&self) -> StoreConfig {
        let mut config = StoreConfig::new(&self.database);
        if let Some(ref log) = self.log {
            config = config.with_log_path(log);
        }
        if self.no_log {
            config = config.without_log();
        }
        config
    }
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// Vision model provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "SMARTLIB_VISION_PROVIDER")]
    vision_provider: Option<String>,

    /// Vision model ID (e.g. gpt-4.1-nano, moondream).
    #[arg(long, env = "SMARTLIB_VISION_MODEL")]
    vision_model: Option<String>,

    /// Keyword model provider.
    #[arg(long, env = "SMARTLIB_KEYWORD_PROVIDER")]
    keyword_provider: Option<String>,

    /// Keyword model ID.
    #[arg(long, env = "SMARTLIB_KEYWORD_MODEL")]
    keyword_model: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the schema, register the owner and seed the standard topics.
    Init {
        #[command(flatten)]
        store: StoreArgs,

        /// Owner user name; the password is prompted for.
        user: String,

        /// Skip the standard topic hierarchy.
        #[arg(long)]
        no_standard_topics: bool,
    },

    /// Drop every catalog table and reseed. The owner is kept.
    Reset {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Catalog a directory of PDFs.
    Catalog(CatalogArgs),

    /// Execute a reviewed preview plan.
    Apply {
        #[command(flatten)]
        store: StoreArgs,

        /// Plan written by `catalog --preview`.
        plan: PathBuf,

        /// Reject books whose topics are not registered yet.
        #[arg(long)]
        no_auto_register: bool,
    },

    /// Execute a SQL file, typically a statement log.
    Replay {
        /// SQLite catalog file (created when missing).
        database: PathBuf,

        /// SQL file to execute.
        sql_file: PathBuf,

        /// Also append the replayed statements to this log.
        #[arg(long)]
        log: Option<PathBuf>,
    },

    /// Load a model and write its snapshot descriptor.
    SaveModel {
        /// pdf-meta, doc-vqa, moondream or keywords.
        kind: String,

        /// Destination JSON file.
        dest: PathBuf,

        #[command(flatten)]
        models: ModelArgs,
    },

    /// Serve the catalog to the web UI.
    Serve {
        #[command(flatten)]
        store: StoreArgs,

        /// Registered owner; the password is prompted for.
        user: String,

        #[arg(long, env = "SMARTLIB_HOST", default_value = "127.0.0.1")]
        host: String,

        #[arg(long, env = "SMARTLIB_PORT", default_value_t = 5000)]
        port: u16,
    },
}

#[derive(Args, Debug)]
struct CatalogArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Directory containing the PDFs.
    dir: PathBuf,

    /// Metadata backend: pdf-meta, doc-vqa, moondream.
    #[arg(long, env = "SMARTLIB_ANALYZER", default_value = "pdf-meta")]
    analyzer: AnalyzerKind,

    /// Form of every catalogued document (book, notes, research article, …).
    #[arg(long, env = "SMARTLIB_FORM", default_value = "book")]
    form: Form,

    /// Publisher of the files (pdf-meta reports it and picks the Crossref cache).
    #[arg(long, env = "SMARTLIB_PUBLISHER")]
    publisher: Option<String>,

    /// Fetch Crossref records when no cache exists.
    #[arg(long)]
    fetch_metadata: bool,

    /// Directory of `<publisher>_crossref_mdb.dump` caches.
    #[arg(long, env = "SMARTLIB_METADATA_DIR", default_value = ".")]
    metadata_dir: PathBuf,

    /// Write a reviewable plan instead of touching the catalog.
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Skip keyword inference.
    #[arg(long)]
    no_keywords: bool,

    /// Reject books whose topics are not registered yet.
    #[arg(long)]
    no_auto_register: bool,

    #[command(flatten)]
    models: ModelArgs,

    /// Pause between model calls, in milliseconds.
    #[arg(long, env = "SMARTLIB_PAUSE_MS", default_value_t = 1000)]
    pause_ms: u64,

    /// Front-page zoom factor (0.5–8.0).
    #[arg(long, env = "SMARTLIB_RENDER_SCALE", default_value_t = 2.0)]
    render_scale: f32,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "SMARTLIB_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per model call.
    #[arg(long, env = "SMARTLIB_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Directory or file of the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Restore the analyzer from a snapshot written by `save-model`.
    #[arg(long)]
    analyzer_snapshot: Option<PathBuf>,

    /// Restore the keyword model from a snapshot written by `save-model`.
    #[arg(long)]
    keyword_snapshot: Option<PathBuf>,

    /// Dump each rendered front page to this PNG.
    #[arg(long)]
    debug_front_page: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs while cataloging.
    let show_progress = !cli.quiet
        && !cli.no_progress
        && matches!(cli.command, Command::Catalog(_) | Command::Apply { .. });
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

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn CatalogProgressCallback>)
    } else {
        None
    };

    match cli.command {
        Command::Init {
            store,
            user,
            no_standard_topics,
        } => {
            let password = read_password(&format!("Choose a password for '{user}': "))?;
            if password.is_empty() {
                bail!("The owner password must not be empty");
            }
            let mut catalog = open_store(&store).await?;
            catalog
                .set_owner(&user, &password)
                .await
                .context("Failed to register the owner")?;
            if !no_standard_topics {
                catalog
                    .standard_setup()
                    .await
                    .context("Failed to seed the standard topics")?;
            }
            catalog.finish(true).await.context("Failed to close catalog")?;
            if !cli.quiet {
                eprintln!(
                    "{} Catalog {} ready, owned by {}",
                    green("✔"),
                    bold(&store.database.display().to_string()),
                    bold(&user)
                );
            }
        }

        Command::Reset { store } => {
            let mut catalog = open_store(&store).await?;
            catalog.clear().await.context("Failed to clear catalog")?;
            catalog
                .standard_setup()
                .await
                .context("Failed to seed the standard topics")?;
            catalog.finish(true).await.context("Failed to close catalog")?;
            if !cli.quiet {
                eprintln!("{} Catalog cleared and reseeded", green("✔"));
            }
        }

        Command::Catalog(args) => {
            let config = build_config(&args, progress)?;
            let mut cataloger = Cataloger::from_config(&config)
                .await
                .context("Failed to load models")?;

            if let Some(ref dest) = args.preview {
                let (plan, report) = cataloger
                    .plan_directory(&args.dir)
                    .await
                    .with_context(|| format!("Failed to catalog {}", args.dir.display()))?;
                plan.write(dest).context("Failed to write plan")?;
                print_summary(&report, cli.quiet, show_progress);
                if !cli.quiet {
                    eprintln!(
                        "   plan with {} entries  →  {}",
                        plan.entries.len(),
                        bold(&dest.display().to_string())
                    );
                }
            } else {
                let mut catalog = open_store(&args.store).await?;
                let report = cataloger
                    .catalog_directory(&args.dir, &mut catalog)
                    .await
                    .with_context(|| format!("Failed to catalog {}", args.dir.display()))?;
                catalog.finish(true).await.context("Failed to close catalog")?;
                print_summary(&report, cli.quiet, show_progress);
            }
        }

        Command::Apply {
            store,
            plan,
            no_auto_register,
        } => {
            let plan = CatalogPlan::read(&plan).context("Failed to read plan")?;
            let mut catalog = open_store(&store).await?;
            let report = apply_plan(&mut catalog, &plan, !no_auto_register, progress.as_ref())
                .await
                .context("Failed to apply plan")?;
            catalog.finish(true).await.context("Failed to close catalog")?;
            print_summary(&report, cli.quiet, show_progress);
        }

        Command::Replay {
            database,
            sql_file,
            log,
        } => {
            // Replaying into the log being read would duplicate it.
            let config = match log {
                Some(log) => StoreConfig::new(&database).with_log_path(log),
                None => StoreConfig::new(&database).without_log(),
            };
            let mut catalog = CatalogStore::open(&config)
                .await
                .with_context(|| format!("Failed to open {}", database.display()))?;
            let affected = match catalog.execute_file(&sql_file, true).await {
                Ok(n) => n,
                Err(e) => {
                    catalog.cancel_transaction().await.ok();
                    return Err(e).with_context(|| format!("Failed to replay {}", sql_file.display()));
                }
            };
            if !cli.quiet {
                eprintln!(
                    "{} Replayed {}  ({} rows, {} books)",
                    green("✔"),
                    bold(&sql_file.display().to_string()),
                    affected,
                    catalog.book_count()
                );
            }
            catalog.finish(true).await.context("Failed to close catalog")?;
        }

        Command::SaveModel { kind, dest, models } => {
            save_model(&kind, &dest, &models).await?;
            if !cli.quiet {
                eprintln!(
                    "{} Snapshot written to {}",
                    green("✔"),
                    bold(&dest.display().to_string())
                );
            }
        }

        Command::Serve {
            store,
            user,
            host,
            port,
        } => {
            let mut catalog = open_store(&store).await?;
            let password = read_password("Please enter the password for the DB: ")?;
            if !catalog
                .verify_owner(&user, &password)
                .await
                .context("Failed to verify the owner")?
            {
                bail!("Wrong user name or password");
            }
            if !cli.quiet {
                eprintln!(
                    "{} Serving {} on {}",
                    cyan("◆"),
                    bold(&store.database.display().to_string()),
                    bold(&format!("http://{host}:{port}"))
                );
            }
            serve(AppState::new(catalog), &host, port)
                .await
                .context("Query service failed")?;
        }
    }

    Ok(())
}

async fn open_store(args: &StoreArgs) -> Result<CatalogStore> {
    CatalogStore::open(&args.config())
        .await
        .with_context(|| format!("Failed to open catalog {}", args.database.display()))
}

/// Map CLI args to `CatalogConfig`.
fn build_config(args: &CatalogArgs, progress: Option<ProgressCallback>) -> Result<CatalogConfig> {
    let mut builder = CatalogConfig::builder()
        .analyzer(args.analyzer)
        .form(args.form)
        .fetch_metadata(args.fetch_metadata)
        .metadata_dir(&args.metadata_dir)
        .auto_register_topics(!args.no_auto_register)
        .pause(Duration::from_millis(args.pause_ms))
        .render_scale(args.render_scale)
        .temperature(args.temperature)
        .max_retries(args.max_retries);

    if args.no_keywords {
        builder = builder.keyword_model(KeywordModelKind::None);
    }
    if let Some(ref p) = args.publisher {
        builder = builder.publisher(p);
    }
    builder = apply_models(builder, &args.models);
    if let Some(ref p) = args.pdfium_lib {
        builder = builder.pdfium_lib_path(p);
    }
    if let Some(ref p) = args.analyzer_snapshot {
        builder = builder.analyzer_snapshot(p);
    }
    if let Some(ref p) = args.keyword_snapshot {
        builder = builder.keyword_snapshot(p);
    }
    if let Some(ref p) = args.debug_front_page {
        builder = builder.debug_front_page(p);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn apply_models(
    mut builder: smartlib::CatalogConfigBuilder,
    models: &ModelArgs,
) -> smartlib::CatalogConfigBuilder {
    if let Some(ref p) = models.vision_provider {
        builder = builder.vision_provider_name(p);
    }
    if let Some(ref m) = models.vision_model {
        builder = builder.vision_model(m);
    }
    if let Some(ref p) = models.keyword_provider {
        builder = builder.keyword_provider_name(p);
    }
    if let Some(ref m) = models.keyword_model {
        builder = builder.keyword_model_name(m);
    }
    builder
}

async fn save_model(kind: &str, dest: &Path, models: &ModelArgs) -> Result<()> {
    let builder = apply_models(CatalogConfig::builder(), models);
    let pacer = Arc::new(Pacer::new(Duration::ZERO));

    if kind.trim().eq_ignore_ascii_case("keywords") {
        let config = builder.build().context("Invalid configuration")?;
        let mut model = TextGenerationKeywords::new(
            config.keywords.clone(),
            smartlib::pipeline::llm::CallSettings::for_keywords(&config),
            pacer,
        );
        model.load(None).await.context("Failed to load keyword model")?;
        model.save(dest).await.context("Failed to write snapshot")?;
        return Ok(());
    }

    let analyzer_kind: AnalyzerKind = kind.parse().context("Unknown model kind")?;
    if analyzer_kind == AnalyzerKind::PdfMeta {
        bail!("pdf-meta has no model to snapshot");
    }
    let config = builder
        .analyzer(analyzer_kind)
        .build()
        .context("Invalid configuration")?;
    let mut analyzer = build_analyzer(&config, pacer).context("Failed to build analyzer")?;
    analyzer.load(None).await.context("Failed to load analyzer")?;
    analyzer.save(dest).await.context("Failed to write snapshot")
}

fn print_summary(report: &CatalogReport, quiet: bool, show_progress: bool) {
    if quiet {
        return;
    }
    let s = &report.stats;
    if !show_progress {
        eprintln!(
            "{}  {} analyzed, {} written, {} skipped, {} failed  {}ms",
            if s.failed == 0 { green("✔") } else { cyan("⚠") },
            s.analyzed,
            s.written,
            s.skipped,
            s.failed,
            s.total_duration_ms,
        );
    }
    for failure in &report.failures {
        eprintln!("   {} {}", red("✗"), dim(&failure.to_string()));
    }
}

// ── Password prompt ──────────────────────────────────────────────────────────

/// Hidden prompt on a terminal; one plain line from stdin otherwise.
fn read_password(prompt: &str) -> Result<String> {
    eprint!("{prompt}");
    io::stderr().flush().ok();

    if !io::stdin().is_terminal() {
        let mut line = String::new();
        io::stdin()
            .read_line(&mut line)
            .context("Failed to read password from stdin")?;
        return Ok(line.trim_end_matches(['\r', '\n']).to_string());
    }

    terminal::enable_raw_mode().context("Failed to switch the terminal to raw mode")?;
    let password = read_hidden_line();
    terminal::disable_raw_mode().ok();
    eprintln!();
    password
}

fn read_hidden_line() -> Result<String> {
    let mut password = String::new();
    loop {
        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind,
            ..
        }) = event::read().context("Failed to read from the terminal")?
        else {
            continue;
        };
        if kind == KeyEventKind::Release {
            continue;
        }
        match code {
            KeyCode::Enter => return Ok(password),
            KeyCode::Backspace => {
                password.pop();
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                bail!("Password entry cancelled")
            }
            KeyCode::Esc => bail!("Password entry cancelled"),
            KeyCode::Char(c) => password.push(c),
            _ => {}
        }
    }
}
