// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info};
use std::io::Write;
use std::path::PathBuf;

use texlate::app_config::{self, Config, TranslationProvider};
use texlate::app_controller::{Controller, ErrorResponse};
use texlate::errors::AppError;
use texlate::language_utils::TargetLanguage;
use texlate::request::{TranslateRequest, TranslationModel};

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    #[value(name = "openai")]
    OpenAI,
    Mock,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
            CliTranslationProvider::Mock => TranslationProvider::Mock,
        }
    }
}

/// CLI Wrapper for TranslationModel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliModel {
    #[value(name = "gpt-4")]
    Gpt4,
    #[value(name = "gpt-4o")]
    Gpt4o,
    #[value(name = "gpt-4o-mini")]
    Gpt4oMini,
    #[value(name = "gpt-3.5-turbo")]
    Gpt35Turbo,
}

impl From<CliModel> for TranslationModel {
    fn from(cli_model: CliModel) -> Self {
        match cli_model {
            CliModel::Gpt4 => TranslationModel::Gpt4,
            CliModel::Gpt4o => TranslationModel::Gpt4o,
            CliModel::Gpt4oMini => TranslationModel::Gpt4oMini,
            CliModel::Gpt35Turbo => TranslationModel::Gpt35Turbo,
        }
    }
}

/// CLI Wrapper for TargetLanguage to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLanguage {
    English,
    Spanish,
    French,
    German,
    Italian,
    Portuguese,
}

impl From<CliLanguage> for TargetLanguage {
    fn from(cli_language: CliLanguage) -> Self {
        match cli_language {
            CliLanguage::English => TargetLanguage::English,
            CliLanguage::Spanish => TargetLanguage::Spanish,
            CliLanguage::French => TargetLanguage::French,
            CliLanguage::German => TargetLanguage::German,
            CliLanguage::Italian => TargetLanguage::Italian,
            CliLanguage::Portuguese => TargetLanguage::Portuguese,
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
    /// Translate a LaTeX document
    Translate(TranslateArgs),

    /// Generate shell completions for texlate
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// URL or path of the LaTeX source
    #[arg(value_name = "FILE_URL", required_unless_present = "request")]
    file_url: Option<String>,

    /// Full request as JSON, e.g. '{"file_url": "paper.tex", "max_len": 2000}'
    #[arg(long, conflicts_with = "file_url")]
    request: Option<String>,

    /// Token limit of each chunk (1000-5000)
    #[arg(long)]
    max_len: Option<usize>,

    /// Language to translate into
    #[arg(short, long, value_enum)]
    dest_language: Option<CliLanguage>,

    /// Chat model to translate with
    #[arg(short, long, value_enum)]
    model: Option<CliModel>,

    /// Translate only the first N pages (1-20)
    #[arg(short, long)]
    num_pages: Option<u32>,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Directory translated documents are written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Base URL the output directory is served from
    #[arg(long)]
    public_base_url: Option<String>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Hide the progress bar
    #[arg(short, long)]
    quiet: bool,
}

/// texlate - translate LaTeX documents with a chat model
///
/// Splits a document into token-bounded chunks, translates them concurrently
/// and reassembles the result with every command and formula intact.
#[derive(Parser, Debug)]
#[command(name = "texlate")]
#[command(version)]
#[command(about = "Token-bounded LaTeX document translation")]
#[command(long_about = "texlate translates LaTeX documents while keeping markup and math untouched.

EXAMPLES:
    texlate translate paper.tex                               # Translate to English with gpt-4
    texlate translate https://example.com/a.tex -d spanish    # Translate a remote file to Spanish
    texlate translate paper.tex -m gpt-4o-mini --max-len 2000 # Pick model and chunk size
    texlate translate paper.tex -n 3                          # Only the first three pages
    texlate translate --request '{\"file_url\": \"paper.tex\"}'  # Pass a JSON request
    texlate completions bash > texlate.bash                   # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.

OUTPUT:
    A JSON response is printed on stdout. Failures print a JSON error payload
    and exit with a non-zero status.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
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

    // @returns: ANSI colour for log level
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
            let _ = writeln!(
                std::io::stderr(),
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
    // Logger accepts everything; the effective level is set via set_max_level
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "texlate", &mut std::io::stdout());
            Ok(())
        }
        Commands::Translate(args) => run_translate(args).await,
    }
}

async fn run_translate(options: TranslateArgs) -> Result<()> {
    if let Some(cmd_log_level) = &options.log_level {
        let level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let mut config = Config::load_or_create(&options.config_path)?;
    apply_overrides(&mut config, &options);
    log::set_max_level(config.log_level.to_level_filter());

    let request = match build_request(&options) {
        Ok(request) => request,
        Err(e) => return fail(&e),
    };

    let controller = Controller::with_config(config)
        .context("Failed to initialize controller")?
        .with_progress(!options.quiet);

    info!(
        "Translating {} into {} with {}",
        request.file_url,
        request.dest_language.name(),
        request.model
    );

    match controller.translate(&request).await {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(e) => fail(&e),
    }
}

/// Override config with CLI options if provided
fn apply_overrides(config: &mut Config, options: &TranslateArgs) {
    if let Some(provider) = &options.provider {
        config.provider.provider_type = provider.clone().into();
    }
    if let Some(api_key) = options.api_key.as_ref().filter(|k| !k.is_empty()) {
        config.provider.api_key = api_key.clone();
    }
    if let Some(output_dir) = &options.output_dir {
        config.storage.output_dir = output_dir.clone();
    }
    if let Some(base_url) = &options.public_base_url {
        config.storage.public_base_url = Some(base_url.clone());
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }
}

fn build_request(options: &TranslateArgs) -> Result<TranslateRequest, AppError> {
    let mut request = match (&options.request, &options.file_url) {
        (Some(body), _) => TranslateRequest::from_json(body)?,
        (None, Some(file_url)) => TranslateRequest::new(file_url.clone()),
        (None, None) => return Err(AppError::Unknown("FILE_URL or --request is required".to_string())),
    };

    if let Some(max_len) = options.max_len {
        request.max_len = max_len;
    }
    if let Some(language) = &options.dest_language {
        request.dest_language = language.clone().into();
    }
    if let Some(model) = &options.model {
        request.model = model.clone().into();
    }
    if options.num_pages.is_some() {
        request.num_pages = options.num_pages;
    }

    request.validate()?;
    Ok(request)
}

/// Print the JSON error payload and exit non-zero
fn fail(error: &AppError) -> Result<()> {
    error!("{}", error);
    let payload = ErrorResponse::from(error);
    println!("{}", serde_json::to_string_pretty(&payload)?);
    std::process::exit(1);
}
