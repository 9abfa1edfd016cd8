// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info, warn};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tokio::sync::watch;

use mtdock::app_config::{self, Config};
use mtdock::database::models::ProviderId;
use mtdock::pipeline::{ImportArticle, PipelineService, PushParams};
use mtdock::providers::build_translator;
use mtdock::{TranslationWorker, get_language_name, server};

/// CLI Wrapper for ProviderId to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliProvider {
    Aws,
    Gcp,
    Azure,
}

impl From<CliProvider> for ProviderId {
    fn from(cli_provider: CliProvider) -> Self {
        match cli_provider {
            CliProvider::Aws => ProviderId::Aws,
            CliProvider::Gcp => ProviderId::Gcp,
            CliProvider::Azure => ProviderId::Azure,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Also run one worker per enabled provider
        #[arg(long)]
        with_workers: bool,
    },

    /// Consume a provider queue
    Work {
        /// Provider whose queue to drain
        #[arg(short, long, value_enum)]
        provider: CliProvider,

        /// Process a single batch and exit
        #[arg(long)]
        once: bool,
    },

    /// Queue an article for translation by every enabled provider
    Push {
        /// Article id
        #[arg(long, required_unless_present = "title")]
        id: Option<i64>,

        /// Article title
        #[arg(long)]
        title: Option<String>,

        /// Source language code (e.g., 'en')
        #[arg(long)]
        from: Option<String>,

        /// Target language code (e.g., 'es')
        #[arg(long)]
        to: Option<String>,
    },

    /// Load source articles from a JSON array of {id, title, text}
    Import {
        #[arg(value_name = "ARTICLES_JSON")]
        path: PathBuf,
    },

    /// Generate shell completions for mtdock
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// mtdock - multi-provider machine translation pipeline
///
/// Queues articles to Amazon, Google and Azure translation, stores their
/// output with integrity checksums and serves the review dashboard API.
#[derive(Parser, Debug)]
#[command(name = "mtdock")]
#[command(version)]
#[command(about = "Multi-provider machine translation pipeline")]
#[command(long_about = "mtdock queues articles to several machine translation providers and serves the API used to review and finalize their translations.

EXAMPLES:
    mtdock import articles.json                 # Load source articles
    mtdock serve --with-workers                 # API plus one worker per provider
    mtdock push --id 4 --to de                  # Queue article 4 for German
    mtdock work --provider gcp --once           # Drain one batch of the GCP queue
    mtdock completions bash > mtdock.bash       # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file doesn't exist,
    a default one will be created automatically. Provider keys can be given as
    MTDOCK_AWS_API_KEY, MTDOCK_GCP_API_KEY and MTDOCK_AZURE_API_KEY.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let _ = writeln!(
                std::io::stderr(),
                "\x1B[{}m{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Trace lets the configured level take over later via set_max_level
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "mtdock", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config, cli.log_level)?;
    log::set_max_level(config.log_level.to_level_filter());

    match cli.command {
        Commands::Serve { with_workers } => run_serve(config, with_workers).await,
        Commands::Work { provider, once } => run_work(config, provider.into(), once).await,
        Commands::Push { id, title, from, to } => run_push(config, id, title, from, to).await,
        Commands::Import { path } => run_import(config, &path).await,
        Commands::Completions { .. } => Ok(()),
    }
}

fn load_config(path: &Path, log_level: Option<CliLogLevel>) -> Result<Config> {
    let mut config = Config::load_or_create(path)?;
    config.apply_env_overrides();

    if let Some(level) = log_level {
        config.log_level = level.into();
    }

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

/// Resolves on Ctrl-C and flips the worker shutdown flag
fn shutdown_signal() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    let (tx, rx) = watch::channel(false);
    let signal_tx = tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        info!("Shutting down");
        let _ = signal_tx.send(true);
    });
    (tx, rx)
}

fn spawn_worker(pipeline: &PipelineService, provider: ProviderId) -> Result<TranslationWorker> {
    let provider_config = pipeline
        .config()
        .provider(provider)
        .ok_or_else(|| anyhow!("Provider '{}' is not configured", provider))?;
    let translator = build_translator(provider_config)?;
    Ok(TranslationWorker::new(translator, pipeline.clone()))
}

async fn run_serve(config: Config, with_workers: bool) -> Result<()> {
    let pipeline = PipelineService::open(config)?;
    let (_tx, shutdown) = shutdown_signal();

    let mut workers = Vec::new();
    if with_workers {
        for provider in pipeline.config().enabled_providers() {
            let worker = spawn_worker(&pipeline, provider)?;
            let shutdown = shutdown.clone();
            workers.push(tokio::spawn(async move { worker.run(shutdown).await }));
        }
        info!("Started {} workers", workers.len());
    }

    let mut server_shutdown = shutdown.clone();
    server::serve(pipeline, async move {
        let _ = server_shutdown.wait_for(|stop| *stop).await;
    })
    .await?;

    for worker in workers {
        if let Err(e) = worker.await {
            warn!("Worker task ended abnormally: {}", e);
        }
    }
    Ok(())
}

async fn run_work(config: Config, provider: ProviderId, once: bool) -> Result<()> {
    let pipeline = PipelineService::open(config)?;
    let worker = spawn_worker(&pipeline, provider)?;

    if once {
        let report = worker.process_batch().await?;
        info!("{}: {}", provider, report);
        return Ok(());
    }

    let (_tx, shutdown) = shutdown_signal();
    worker.run(shutdown).await;
    Ok(())
}

async fn run_push(
    config: Config,
    id: Option<i64>,
    title: Option<String>,
    from: Option<String>,
    to: Option<String>,
) -> Result<()> {
    let pipeline = PipelineService::open(config)?;
    let response = pipeline
        .push_to_queue(PushParams {
            id: id.map(|id| id.to_string()),
            title,
            from_lang: from,
            to_lang: to,
        })
        .await?;

    let target = &pipeline.config().languages.target_language;
    info!(
        "{} (default target: {})",
        response.message,
        get_language_name(target).unwrap_or_else(|_| target.clone())
    );
    Ok(())
}

async fn run_import(config: Config, path: &Path) -> Result<()> {
    let file = File::open(path).with_context(|| format!("Failed to open articles file: {}", path.display()))?;
    let articles: Vec<ImportArticle> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse articles file: {}", path.display()))?;

    let pipeline = PipelineService::open(config)?;
    let imported = pipeline.import_articles(articles).await?;
    info!("Imported {} articles from {}", imported, path.display());
    Ok(())
}
