//! CLI binary for edgequake-pdfchat.
//!
//! A thin shim over the library crate: maps flags and environment variables
//! onto the config types, wires the store, parser, chat service and cache
//! together, and either serves HTTP or runs one command.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use edgequake_pdfchat::{
    cache, extract_content, server, CacheConfig, ChatConfig, ChatService, ConversionConfig,
    ConversionProgressCallback, ConversionStats, Converter, DocumentContent, DocumentName,
    ObjectArtifactStore, PdfiumParser, ProgressCallback, StorageConfig,
};
use edgequake_pdfchat::pipeline::input::load_source;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner until the page count is known, then a page bar with one log line
/// per finished page.
struct CliProgressCallback {
    bar: ProgressBar,
    total_pages: AtomicUsize,
    image_errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Storing PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            total_pages: AtomicUsize::new(0),
            image_errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, document: &str, page_count: usize) {
        self.total_pages.store(page_count, Ordering::SeqCst);
        self.activate_bar(page_count);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {document} ({page_count} pages)…"))
        ));
    }

    fn on_page_complete(&self, page: usize, elements: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page,
            self.total_pages.load(Ordering::SeqCst),
            dim(&format!("{elements:>3} elements")),
        ));
        self.bar.set_position(page as u64);
    }

    fn on_image_error(&self, page: usize, file_name: &str, error: &str) {
        self.image_errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}  {}  {}",
            red("✗"),
            page,
            file_name,
            red(&msg),
        ));
    }

    fn on_conversion_complete(&self, stats: &ConversionStats) {
        self.bar.finish_and_clear();
        let failed = self.image_errors.load(Ordering::SeqCst) + stats.extraction_failures;
        eprintln!(
            "{} {} pages, {} tables, {}/{} images{}",
            if failed == 0 { green("✔") } else { cyan("⚠") },
            bold(&stats.pages.to_string()),
            stats.tables,
            stats.images_uploaded,
            stats.images_found,
            if failed == 0 {
                String::new()
            } else {
                format!("  ({} skipped)", red(&failed.to_string()))
            },
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve the HTTP API backed by S3 and Redis
  S3_BUCKET_NAME=docs REDIS_URL=redis://127.0.0.1/ pdfchat --storage s3 serve

  # Convert a local file into ./pdfchat-data/Report_1/
  pdfchat convert "Report (1).pdf"

  # Plain text + tables as JSON (the /chat/ endpoint's pdf_json)
  pdfchat extract paper.pdf -o paper.json

  # Ask a question
  pdfchat ask paper.pdf "What is the main result?" --llm "gpt-4o mini"

  # Summarise
  pdfchat ask paper.json --summary

PROVIDERS (--llm):
  Choice             Backend                    Input $/1M  Output $/1M
  ─────────────────  ─────────────────────────  ──────────  ───────────
  gpt-4o mini        openai gpt-4o-mini         $0.15       $0.60
  gemini flash free  gemini gemini-2.0-flash    $2.00       $2.00
  deepseek chat      deepseek deepseek-chat     $2.00       $2.00
  claude-3.5 haiku   anthropic claude-3-5-haiku $3.00       $3.00
  (summary)          openai gpt-4o              $2.50       $10.00

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY / GEMINI_API_KEY / ANTHROPIC_API_KEY / DEEPSEEK_API_KEY
  S3_BUCKET_NAME, AWS_DEFAULT_REGION, AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY, S3_ENDPOINT
  PDFCHAT_STORAGE, PDFCHAT_STORAGE_DIR, PDFCHAT_PUBLIC_URL
  REDIS_URL, PDFCHAT_CACHE_TTL, PDFCHAT_BIND
  PDFIUM_LIB_PATH         Path to libpdfium; otherwise the system library is used
"#;

/// Convert PDFs to Markdown in object storage and chat with them.
#[derive(Parser, Debug)]
#[command(
    name = "pdfchat",
    version,
    about = "Convert PDFs to Markdown in object storage and chat with them",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    storage: StorageArgs,

    #[command(flatten)]
    pdf: PdfArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFCHAT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDFCHAT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        /// Address to listen on.
        #[arg(long, env = "PDFCHAT_BIND", default_value = "127.0.0.1:8000")]
        bind: SocketAddr,

        /// Largest accepted upload in MiB.
        #[arg(long, env = "PDFCHAT_MAX_UPLOAD_MB", default_value_t = 50)]
        max_upload_mb: usize,

        #[command(flatten)]
        cache: CacheArgs,

        #[command(flatten)]
        chat: ChatArgs,
    },
    /// Convert a PDF (path or URL) and store its artifacts.
    Convert {
        input: String,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,

        /// Disable progress bar.
        #[arg(long, env = "PDFCHAT_NO_PROGRESS")]
        no_progress: bool,
    },
    /// Extract plain text and tables as JSON without storing anything.
    Extract {
        input: String,

        /// Write JSON to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Ask a question about a PDF or an extracted JSON file.
    Ask {
        /// PDF path or URL, or a `.json` file written by `extract`.
        input: String,

        /// The question. Ignored with --summary.
        #[arg(default_value = "")]
        question: String,

        /// Provider choice, e.g. "gpt-4o mini".
        #[arg(long)]
        llm: Option<String>,

        /// Summarise instead of answering.
        #[arg(long)]
        summary: bool,

        #[command(flatten)]
        chat: ChatArgs,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum StorageKind {
    S3,
    Filesystem,
    Memory,
}

#[derive(Args, Debug)]
struct StorageArgs {
    /// Artifact store backend.
    #[arg(long, global = true, env = "PDFCHAT_STORAGE", value_enum, default_value = "filesystem")]
    storage: StorageKind,

    /// Root directory of the filesystem backend.
    #[arg(long, global = true, env = "PDFCHAT_STORAGE_DIR", default_value = "pdfchat-data")]
    storage_dir: PathBuf,

    #[arg(long, global = true, env = "S3_BUCKET_NAME")]
    bucket: Option<String>,

    #[arg(long, global = true, env = "AWS_DEFAULT_REGION", default_value = "us-east-1")]
    region: String,

    /// S3-compatible endpoint (MinIO, R2, …).
    #[arg(long, global = true, env = "S3_ENDPOINT")]
    endpoint: Option<String>,

    #[arg(long, global = true, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    access_key_id: Option<String>,

    #[arg(long, global = true, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    secret_access_key: Option<String>,

    /// Prefix of public artifact URLs.
    #[arg(long, global = true, env = "PDFCHAT_PUBLIC_URL")]
    public_url: Option<String>,
}

#[derive(Args, Debug)]
struct PdfArgs {
    /// Path to libpdfium.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, global = true, env = "PDFCHAT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Concurrent image uploads per document.
    #[arg(long, global = true, env = "PDFCHAT_UPLOAD_CONCURRENCY", default_value_t = 4)]
    upload_concurrency: usize,

    /// Line written in place of images that could not be uploaded.
    #[arg(long, global = true, env = "PDFCHAT_IMAGE_PLACEHOLDER")]
    image_placeholder: Option<String>,

    /// HTTP download timeout in seconds.
    #[arg(long, global = true, env = "PDFCHAT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(Args, Debug)]
struct CacheArgs {
    /// Redis URL; the in-process cache is used when unset.
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Cached answer lifetime in seconds.
    #[arg(long, env = "PDFCHAT_CACHE_TTL", default_value_t = 86_400)]
    cache_ttl: u64,
}

#[derive(Args, Debug)]
struct ChatArgs {
    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDFCHAT_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, env = "PDFCHAT_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// Model used for summaries.
    #[arg(long, env = "PDFCHAT_SUMMARY_MODEL", default_value = "gpt-4o")]
    summary_model: String,

    #[arg(long, env = "DEEPSEEK_API_KEY", hide_env_values = true)]
    deepseek_api_key: Option<String>,

    #[arg(long, env = "DEEPSEEK_BASE_URL", default_value = "https://api.deepseek.com")]
    deepseek_base_url: String,

    /// Per-call timeout in seconds.
    #[arg(long, env = "PDFCHAT_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet
        && !cli.verbose
        && matches!(
            cli.command,
            Command::Convert {
                json: false,
                no_progress: false,
                ..
            }
        );
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

    let conversion = build_conversion_config(&cli.pdf)?;

    match &cli.command {
        Command::Serve {
            bind,
            max_upload_mb,
            cache: cache_args,
            chat,
        } => {
            let converter = build_converter(&cli.storage, conversion)?;
            let chat = ChatService::from_config(&build_chat_config(chat)?)
                .context("Failed to set up chat providers")?;
            let cache_config = CacheConfig {
                redis_url: cache_args.redis_url.clone(),
                ttl_secs: cache_args.cache_ttl,
            };
            let response_cache = cache::from_config(&cache_config)
                .await
                .context("Failed to connect the response cache")?;

            let state = server::AppState::new(converter, chat, response_cache).with_limits(
                server::ServerLimits {
                    cache_ttl: Duration::from_secs(cache_config.ttl_secs),
                    max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
                },
            );
            server::serve(*bind, state).await.context("Server failed")?;
        }

        Command::Convert { input, json, .. } => {
            let source = load_source(input, cli.pdf.download_timeout)
                .await
                .with_context(|| format!("Failed to load '{input}'"))?;
            let name = DocumentName::from_file_name(&source.file_name)
                .context("Cannot derive a document name")?;

            let mut converter = build_converter(&cli.storage, conversion)?;
            if show_progress {
                let cb: ProgressCallback = CliProgressCallback::new_dynamic();
                converter = converter.with_progress(cb);
            }

            let result = converter
                .convert(source.bytes.into(), &name)
                .await
                .context("Conversion failed")?;

            if *json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&result).context("Failed to serialise result")?
                );
            } else {
                println!("{}", result.markdown_url);
                if !cli.quiet {
                    eprintln!(
                        "   {}  {}",
                        dim(&result.pdf_url),
                        dim(&format!("{}ms total", result.stats.total_duration_ms)),
                    );
                }
            }
        }

        Command::Extract { input, output } => {
            let content = extract_from_pdf(input, &conversion, cli.pdf.download_timeout).await?;
            let json =
                serde_json::to_string_pretty(&content).context("Failed to serialise content")?;
            match output {
                Some(path) => tokio::fs::write(path, json)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => println!("{json}"),
            }
        }

        Command::Ask {
            input,
            question,
            llm,
            summary,
            chat,
        } => {
            if !summary && question.trim().is_empty() {
                anyhow::bail!("A question is required unless --summary is set");
            }
            let content = if input.ends_with(".json") {
                let raw = tokio::fs::read_to_string(input)
                    .await
                    .with_context(|| format!("Failed to read {input}"))?;
                serde_json::from_str::<DocumentContent>(&raw)
                    .with_context(|| format!("{input} is not extracted document JSON"))?
            } else {
                extract_from_pdf(input, &conversion, cli.pdf.download_timeout).await?
            };

            let service = ChatService::from_config(&build_chat_config(chat)?)
                .context("Failed to set up chat providers")?;
            let answer = service
                .answer(&content, question, llm.as_deref(), *summary)
                .await;

            println!("{}", answer.text);
            if !cli.quiet {
                eprintln!(
                    "   {}  {} tokens in  /  {} tokens out  —  ${:.6}",
                    dim(answer.provider.as_deref().unwrap_or("no provider")),
                    answer.input_tokens,
                    answer.output_tokens,
                    answer.cost,
                );
            }
        }
    }

    Ok(())
}

async fn extract_from_pdf(
    input: &str,
    config: &ConversionConfig,
    timeout_secs: u64,
) -> Result<DocumentContent> {
    let source = load_source(input, timeout_secs)
        .await
        .with_context(|| format!("Failed to load '{input}'"))?;
    let parser = PdfiumParser::new(config);
    extract_content(&parser, &source.file_name, source.bytes.into())
        .await
        .context("Extraction failed")
}

/// Map CLI args to `ConversionConfig`.
fn build_conversion_config(pdf: &PdfArgs) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .image_upload_concurrency(pdf.upload_concurrency)
        .download_timeout_secs(pdf.download_timeout);
    if let Some(ref path) = pdf.pdfium_lib_path {
        builder = builder.pdfium_lib_path(path);
    }
    if let Some(ref password) = pdf.password {
        builder = builder.password(password);
    }
    if let Some(ref line) = pdf.image_placeholder {
        builder = builder.image_placeholder(line);
    }
    builder.build().context("Invalid conversion configuration")
}

fn build_chat_config(chat: &ChatArgs) -> Result<ChatConfig> {
    ChatConfig::builder()
        .temperature(chat.temperature)
        .max_tokens(chat.max_tokens)
        .summary_model(&chat.summary_model)
        .deepseek_api_key(chat.deepseek_api_key.clone())
        .deepseek_base_url(&chat.deepseek_base_url)
        .api_timeout_secs(chat.api_timeout)
        .build()
        .context("Invalid chat configuration")
}

fn build_storage_config(args: &StorageArgs) -> Result<StorageConfig> {
    let mut config = match args.storage {
        StorageKind::S3 => {
            let bucket = args
                .bucket
                .clone()
                .context("--bucket (or S3_BUCKET_NAME) is required for S3 storage")?;
            let mut config = StorageConfig::s3(bucket, &args.region);
            if let edgequake_pdfchat::StorageBackend::S3 {
                endpoint,
                access_key_id,
                secret_access_key,
                ..
            } = &mut config.backend
            {
                *endpoint = args.endpoint.clone();
                *access_key_id = args.access_key_id.clone();
                *secret_access_key = args.secret_access_key.clone();
            }
            config
        }
        StorageKind::Filesystem => StorageConfig::filesystem(&args.storage_dir),
        StorageKind::Memory => StorageConfig::memory(),
    };
    if let Some(ref url) = args.public_url {
        config = config.with_public_base_url(url);
    }
    Ok(config)
}

fn build_converter(storage: &StorageArgs, config: ConversionConfig) -> Result<Converter> {
    let store = ObjectArtifactStore::from_config(&build_storage_config(storage)?)
        .context("Failed to open the artifact store")?;
    let parser = PdfiumParser::new(&config);
    Ok(Converter::new(Arc::new(store), Arc::new(parser), config))
}
