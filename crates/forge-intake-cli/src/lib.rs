//! # Forge-Intake CLI
//!
//! Command-line interface for the Forge-Intake event normalization pipeline.
//!
//! This module provides CLI commands for:
//! - Parsing a stored payload into its canonical event
//! - Listing the registered comment actions
//! - Resolving a `/packit` comment to its handler
//! - Configuration validation

use clap::{Parser, Subcommand};
use forge_intake_core::services::BuildStoreSeed;
use forge_intake_core::{
    CentosEventParser, CommandError, CommentActionRegistry, ConfigError, Event, HttpTestingFarmClient,
    InMemoryBuildStore, IntakeError, ParseError, Parser as EventParser, ServiceConfig,
    TestingFarmClientConfig,
};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ============================================================================
// CLI Structure
// ============================================================================

/// Forge-Intake CLI - Event normalization for forge and build-system notifications
#[derive(Parser)]
#[command(name = "forge-intake")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Normalize forge, build-system and test-service notifications")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "FORGE_INTAKE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level
    #[arg(short, long, default_value = "warn")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Parse a payload file into its canonical event
    Parse {
        /// JSON payload to parse
        file: PathBuf,

        /// Treat the payload as a Pagure bus message
        #[arg(long)]
        centos: bool,

        /// JSON file with known builds and test runs
        #[arg(short, long)]
        builds: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,
    },

    /// List the registered comment actions
    Actions {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Resolve a comment to its action and handler
    Command {
        /// Comment body, e.g. "/packit copr-build"
        comment: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Validate configuration
    Config {
        /// Configuration file to validate
        #[arg(long)]
        file: Option<PathBuf>,

        /// Show resolved configuration
        #[arg(short, long)]
        show: bool,

        /// Output format for configuration
        #[arg(short = 'f', long, default_value = "yaml")]
        format: ConfigFormat,
    },
}

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
}

/// Configuration format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
    /// TOML format
    Toml,
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Configuration(_) => 1,
            CliError::Parse(_) => 2,
            CliError::CommandFailed { .. } => 3,
            CliError::InvalidArgument { .. } => 4,
            CliError::Io(_) => 5,
        }
    }

    fn command_failed(message: impl ToString) -> Self {
        CliError::CommandFailed {
            message: message.to_string(),
        }
    }
}

impl From<IntakeError> for CliError {
    fn from(error: IntakeError) -> Self {
        match error {
            IntakeError::Configuration(e) => CliError::Configuration(e),
            IntakeError::Parse(e) => CliError::Parse(e),
            IntakeError::Command(e) => CliError::command_failed(e.get_user_message()),
            other => CliError::command_failed(other),
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Parse the process arguments and run the selected command.
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    initialize_logging(&cli)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run(cli, &mut out).await
}

/// Run a parsed command line, writing command output to `out`.
pub async fn run(cli: Cli, out: &mut dyn Write) -> Result<(), CliError> {
    match cli.command {
        Commands::Parse {
            file,
            centos,
            builds,
            format,
        } => {
            let config = ServiceConfig::load(cli.config.as_deref())?;
            execute_parse_command(&file, centos, builds.as_deref(), format, config, out).await
        }
        Commands::Actions { format } => execute_actions_command(format, out),
        Commands::Command { comment, format } => execute_command_command(&comment, format, out),
        Commands::Config { file, show, format } => {
            let path = file.or(cli.config);
            execute_config_command(path.as_deref(), show, format, out)
        }
    }
}

/// Install the global tracing subscriber. Logs go to stderr.
///
/// `RUST_LOG` takes precedence over `--log-level`.
pub fn initialize_logging(cli: &Cli) -> Result<(), CliError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cli.log_level).map_err(|e| CliError::InvalidArgument {
            arg: "log-level".to_string(),
            message: e.to_string(),
        })?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = if cli.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    if let Err(e) = result {
        debug!(error = %e, "Tracing subscriber already installed");
    }
    Ok(())
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn execute_parse_command(
    file: &Path,
    centos: bool,
    builds: Option<&Path>,
    format: OutputFormat,
    config: ServiceConfig,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    info!(file = %file.display(), centos, "Parsing payload");

    let mut payload = read_json(file, "FILE")?;
    let config = Arc::new(config);

    let event = if centos {
        CentosEventParser::new(config).parse_event(&mut payload)
    } else {
        let store = match builds {
            Some(path) => {
                let seed: BuildStoreSeed = serde_json::from_value(read_json(path, "builds")?)
                    .map_err(|e| CliError::InvalidArgument {
                        arg: "builds".to_string(),
                        message: e.to_string(),
                    })?;
                InMemoryBuildStore::from_seed(seed)
            }
            None => InMemoryBuildStore::new(),
        };
        let testing_farm =
            HttpTestingFarmClient::new(TestingFarmClientConfig::from_service_config(&config))
                .map_err(CliError::command_failed)?;

        EventParser::new(config, Arc::new(store), Arc::new(testing_farm))
            .parse_event(&payload)
            .await?
    };

    match event {
        Some(event) => write_event(&event, format, out),
        None => {
            writeln!(out, "No event recognized in {}", file.display())?;
            Ok(())
        }
    }
}

fn execute_actions_command(format: OutputFormat, out: &mut dyn Write) -> Result<(), CliError> {
    let registry = CommentActionRegistry::standard();

    let mut rows = Vec::new();
    for action in registry.actions() {
        let handler = registry.get(action).map_err(CliError::command_failed)?;
        rows.push(HandlerRow {
            action: action.to_string(),
            handler: handler.name(),
            task_name: handler.task_name(),
        });
    }

    match format {
        OutputFormat::Text => {
            for row in &rows {
                writeln!(out, "{:<16} {:<36} {}", row.action, row.handler, row.task_name)?;
            }
            Ok(())
        }
        _ => write_serialized(&rows, format, out),
    }
}

fn execute_command_command(
    comment: &str,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    if comment.trim().is_empty() {
        return Err(CliError::InvalidArgument {
            arg: "COMMENT".to_string(),
            message: CommandError::Empty {
                comment: comment.to_string(),
            }
            .to_string(),
        });
    }

    let registry = CommentActionRegistry::standard();
    let (action, handler) = registry.resolve_comment(comment)?;
    let row = HandlerRow {
        action: action.to_string(),
        handler: handler.name(),
        task_name: handler.task_name(),
    };

    match format {
        OutputFormat::Text => {
            writeln!(out, "action:  {}", row.action)?;
            writeln!(out, "handler: {}", row.handler)?;
            writeln!(out, "task:    {}", row.task_name)?;
            Ok(())
        }
        _ => write_serialized(&row, format, out),
    }
}

fn execute_config_command(
    file: Option<&Path>,
    show: bool,
    format: ConfigFormat,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    info!(file = ?file, show, format = ?format, "Processing config command");

    let config = ServiceConfig::load(file)?;
    if !show {
        writeln!(out, "Configuration is valid")?;
        return Ok(());
    }

    let rendered = match format {
        ConfigFormat::Yaml => serde_yaml::to_string(&config).map_err(CliError::command_failed)?,
        ConfigFormat::Json => {
            serde_json::to_string_pretty(&config).map_err(CliError::command_failed)?
        }
        ConfigFormat::Toml => toml::to_string(&config).map_err(CliError::command_failed)?,
    };
    writeln!(out, "{}", rendered.trim_end())?;
    Ok(())
}

// ============================================================================
// Output helpers
// ============================================================================

#[derive(Debug, Serialize)]
struct HandlerRow {
    action: String,
    handler: &'static str,
    task_name: &'static str,
}

fn read_json(path: &Path, arg: &str) -> Result<Value, CliError> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| CliError::InvalidArgument {
        arg: arg.to_string(),
        message: format!("{} is not valid JSON: {}", path.display(), e),
    })
}

fn write_event(event: &Event, format: OutputFormat, out: &mut dyn Write) -> Result<(), CliError> {
    let dict = event
        .to_transport_dict()
        .map_err(CliError::command_failed)?;

    match format {
        OutputFormat::Text => {
            writeln!(out, "{}", event.event_type())?;
            for (key, value) in &dict {
                writeln!(out, "  {}: {}", key, render_scalar(value))?;
            }
            Ok(())
        }
        _ => write_serialized(&dict, format, out),
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

fn write_serialized<T: Serialize + ?Sized>(
    value: &T,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let rendered = match format {
        OutputFormat::Yaml => serde_yaml::to_string(value).map_err(CliError::command_failed)?,
        OutputFormat::Json | OutputFormat::Text => {
            serde_json::to_string_pretty(value).map_err(CliError::command_failed)?
        }
    };
    writeln!(out, "{}", rendered.trim_end())?;
    Ok(())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
