// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

use subai::app_config::{self, Config};
use subai::app_controller::Controller;
use subai::hub::{HubEvent, NotificationHub};
use subai::language_utils::LanguagePreference;
use subai::media::MediaId;
use subai::translation::{JobOutcome, JobStatus, OllamaBackend, TranslationBackend};

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
    /// Look up subtitles for a media item, translating in the background if needed
    Request(RequestArgs),

    /// Translate a local SRT file through the job manager
    Translate(TranslateArgs),

    /// Check that the translation backend is reachable and has the model
    Check,

    /// Inspect or clear stored translations
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Generate shell completions for subai
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct RequestArgs {
    /// Media id: tt1234567 for a movie, tt1234567:1:2 for an episode
    #[arg(value_name = "MEDIA_ID")]
    media_id: String,

    /// Wanted subtitle language (defaults to the configured target)
    #[arg(short, long)]
    language: Option<String>,
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// Source SRT file
    #[arg(value_name = "SRT_FILE")]
    input_path: PathBuf,

    /// Media id the translation is stored under
    #[arg(short, long)]
    media_id: String,

    /// Also write the translated track to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// List stored translations
    List,
    /// Remove the translation of one media item
    Remove {
        #[arg(value_name = "MEDIA_ID")]
        media_id: String,
    },
    /// Remove every stored translation
    Clear,
}

/// SubAI - subtitles with on-demand AI translation
///
/// Finds subtitles for movies and episodes and translates a fallback track
/// with a local Ollama model when none exist in the target language.
#[derive(Parser, Debug)]
#[command(name = "subai")]
#[command(version)]
#[command(about = "Subtitle lookup with background AI translation")]
#[command(long_about = "SubAI searches the OpenSubtitles catalogs and, when no track exists in the
target language, translates a fallback track with Ollama in the background.

EXAMPLES:
    subai request tt0133093                       # Movie subtitles, translate if needed
    subai request tt0944947:1:2 -l en             # English subtitles for an episode
    subai translate movie.en.srt -m tt0133093     # Translate a local file
    subai check                                   # Probe Ollama and the model
    subai cache list                              # Show stored translations
    subai completions bash > subai.bash           # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically. PORT, OLLAMA_URL, OLLAMA_MODEL, SUBTITLES_DIR and
    PUBLIC_BASE_URL override the file.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, visible_alias = "config", default_value = "conf.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,

    /// Ollama server URL
    #[arg(long, env = "OLLAMA_URL", global = true)]
    ollama_url: Option<String>,

    /// Model name to use for translation
    #[arg(long, env = "OLLAMA_MODEL", global = true)]
    model: Option<String>,

    /// Port translated tracks are served on
    #[arg(long, env = "PORT", global = true)]
    port: Option<u16>,

    /// Directory holding translated tracks
    #[arg(long, env = "SUBTITLES_DIR", global = true)]
    subtitles_dir: Option<String>,

    /// Public base URL of the served tracks
    #[arg(long, env = "PUBLIC_BASE_URL", global = true)]
    public_base_url: Option<String>,
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
        // The filter is driven by log::set_max_level afterwards
        let logger = Box::new(CustomLogger::new(LevelFilter::Trace));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI color for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
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
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {} {}\x1B[0m",
                Self::get_color_for_level(record.level()),
                now,
                Self::get_emoji_for_level(record.level()),
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
    // Initialize the logger once with info level by default
    // We'll update the level after loading the config if needed
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "subai", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli)?;
    log::set_max_level(config.log_level.to_level_filter());

    match cli.command {
        Commands::Request(args) => run_request(config, args).await,
        Commands::Translate(args) => run_translate(config, args).await,
        Commands::Check => run_check(config).await,
        Commands::Cache { action } => run_cache(config, action).await,
        Commands::Completions { .. } => Ok(()),
    }
}

/// Load or create the config file, then apply CLI and environment overrides
fn load_config(cli: &CommandLineOptions) -> Result<Config> {
    let mut config = Config::load_or_create(&cli.config_path)?;

    if let Some(url) = &cli.ollama_url {
        config.backend.endpoint = url.clone();
    }
    if let Some(model) = &cli.model {
        config.backend.model = model.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(dir) = &cli.subtitles_dir {
        config.subtitles_dir = dir.clone();
    }
    if let Some(base) = &cli.public_base_url {
        config.public_base_url = Some(base.clone());
    }
    if let Some(log_level) = &cli.log_level {
        config.log_level = log_level.clone().into();
    }

    // Validate the configuration after loading and overriding
    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

async fn run_request(config: Config, args: RequestArgs) -> Result<()> {
    let controller = Controller::with_config(config)?;
    let outcome = controller
        .handle_request(&args.media_id, args.language.as_deref())
        .await;

    println!("{}", serde_json::to_string_pretty(&outcome.subtitles)?);

    // The job does not outlive this process
    if let Some(job) = outcome.job {
        if follow_progress(controller.hub(), job).await?.is_some() {
            info!("Translation finished, request again to get the translated track");
        }
    }
    Ok(())
}

async fn run_translate(config: Config, args: TranslateArgs) -> Result<()> {
    let media = MediaId::parse(&args.media_id)?;
    let raw = tokio::fs::read_to_string(&args.input_path)
        .await
        .with_context(|| format!("Failed to read subtitle file: {:?}", args.input_path))?;

    let controller = Controller::with_config(config)?;
    let jobs = controller.jobs().clone();
    if !jobs.backend().is_ready().await {
        warn!("Translation backend is not ready, every batch will keep its source text");
    }

    let key = media.cache_key();
    let job = tokio::spawn(async move { jobs.translate(&key, &raw).await });
    let outcome = follow_progress(controller.hub(), job).await??;

    let content = match outcome {
        JobOutcome::Cached(content) => {
            info!("{} was already translated", media);
            content
        }
        JobOutcome::Completed(content) => content,
        JobOutcome::AlreadyRunning => return Err(anyhow!("{} is already being translated", media)),
    };

    if let Some(output) = &args.output {
        tokio::fs::write(output, &content)
            .await
            .with_context(|| format!("Failed to write translated file: {:?}", output))?;
        info!("Success: {:?}", output);
    } else {
        info!("Stored as {}", controller.track_url(&media));
    }
    Ok(())
}

async fn run_check(config: Config) -> Result<()> {
    let target = LanguagePreference::parse(&config.target_language)?;
    let fallback = LanguagePreference::parse(&config.fallback_language)?;
    let backend = OllamaBackend::new(&config.backend, &fallback, &target);

    match backend.version().await {
        Ok(version) => info!("Ollama {} at {}", version, config.backend.endpoint),
        Err(e) => return Err(anyhow!("Ollama is not reachable at {}: {}", config.backend.endpoint, e)),
    }

    if backend.is_ready().await {
        info!("Model '{}' is installed, translations are available", backend.model());
        Ok(())
    } else {
        Err(anyhow!("Model '{}' is not installed (ollama pull {})", backend.model(), backend.model()))
    }
}

async fn run_cache(config: Config, action: CacheAction) -> Result<()> {
    let controller = Controller::with_config(config)?;
    match action {
        CacheAction::List => {
            let tracks = controller.cached_tracks().await?;
            if tracks.is_empty() {
                info!("No stored translation");
            }
            for track in tracks {
                println!("{}", track);
            }
        }
        CacheAction::Remove { media_id } => controller.remove_cached(&media_id).await?,
        CacheAction::Clear => {
            controller.clear_cache().await?;
        }
    }
    Ok(())
}

/// Draw job progress until `job` ends
async fn follow_progress<T>(hub: &Arc<NotificationHub>, mut job: JoinHandle<T>) -> Result<T> {
    let mut observer = hub.subscribe();

    let progress_bar = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} cues ({percent}%) {msg}")
        .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress_bar.set_style(style.progress_chars("█▓▒░"));

    let result = loop {
        tokio::select! {
            finished = &mut job => break finished,
            event = observer.recv() => match event {
                Some(HubEvent::State(state)) => {
                    progress_bar.set_length(state.total_cues as u64);
                    progress_bar.set_position(state.translated_cues as u64);
                    progress_bar.set_message(format!(
                        "batch {}/{} {}",
                        state.current_batch, state.total_batches, state.status
                    ));
                }
                Some(HubEvent::Log(_)) => {}
                None => break (&mut job).await,
            },
        }
    };

    hub.unsubscribe(observer.id());
    let state = hub.current_state();
    if state.status == JobStatus::Done {
        progress_bar.finish_with_message("done");
    } else {
        progress_bar.abandon_with_message(state.status.to_string());
    }

    result.map_err(|e| anyhow!("Translation task failed: {}", e))
}
