//! # RQS CLI
//!
//! Command-line interface for an RQS broker.
//!
//! This module provides CLI commands for:
//! - Creating, listing and provisioning queues and exchanges
//! - Producing messages to a queue or through an exchange
//! - Consuming, acknowledging and draining queues

use clap::{Args, Parser, Subcommand, ValueEnum};
use rqs_client::{
    ClientSettings, ConfigurationError, DeliveredMessage, Exchange, ExchangeId, ExchangeType,
    Message, MessageHandler, ProcessOutcome, Queue, QueueId, RqsClient, RqsError,
    ValidationError,
};
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

// ============================================================================
// CLI Structure
// ============================================================================

/// RQS CLI - Work with queues and exchanges on an RQS broker
#[derive(Parser)]
#[command(name = "rqs")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Work with queues and exchanges on an RQS broker")]
pub struct Cli {
    /// Settings file path
    #[arg(short, long, env = "RQS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Broker root URL, overriding the settings file
    #[arg(long, env = "RQS_BASE_URL")]
    pub base_url: Option<String>,

    /// Request timeout in seconds, overriding the settings file
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Logging level
    #[arg(short, long, default_value = "warn")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Queue management commands
    Queue {
        #[command(subcommand)]
        action: QueueCommands,
    },

    /// Exchange management commands
    Exchange {
        #[command(subcommand)]
        action: ExchangeCommands,
    },

    /// Produce messages to a queue or an exchange
    Produce(ProduceArgs),

    /// Consume messages from a queue
    Consume(ConsumeArgs),
}

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

/// Exchange routing policies
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExchangeKind {
    /// Copy every message to every bound queue
    Fanout,
    /// Deliver each message to the bound queue named by its id
    Id,
}

impl From<ExchangeKind> for ExchangeType {
    fn from(kind: ExchangeKind) -> Self {
        match kind {
            ExchangeKind::Fanout => ExchangeType::Fanout,
            ExchangeKind::Id => ExchangeType::Id,
        }
    }
}

// ============================================================================
// Queue Commands
// ============================================================================

/// Queue management subcommands
#[derive(Subcommand, Debug)]
pub enum QueueCommands {
    /// Create a queue, failing if it exists
    Create(QueueArgs),

    /// List queue ids
    List,

    /// Create a queue unless it already exists
    Ensure(QueueArgs),
}

#[derive(Args, Debug, Clone)]
pub struct QueueArgs {
    /// Queue id
    pub queue_id: String,

    /// Seconds a delivered message stays hidden from other consumers
    #[arg(long)]
    pub visibility_timeout: Option<u32>,

    /// Maximum messages returned per consume call
    #[arg(long)]
    pub max_batch: Option<u32>,
}

// ============================================================================
// Exchange Commands
// ============================================================================

/// Exchange management subcommands
#[derive(Subcommand, Debug)]
pub enum ExchangeCommands {
    /// Create an exchange, failing if it exists
    Create(ExchangeArgs),

    /// List exchange ids
    List,

    /// Create an exchange unless it already exists
    Ensure(ExchangeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExchangeArgs {
    /// Exchange id
    pub exchange_id: String,

    /// Routing policy
    #[arg(short = 't', long = "type", value_enum)]
    pub exchange_type: ExchangeKind,

    /// Bound queue (repeatable, in routing order)
    #[arg(short, long = "queue", required = true)]
    pub queues: Vec<String>,
}

// ============================================================================
// Message Commands
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct ProduceArgs {
    /// Target queue
    #[arg(long, conflicts_with = "exchange", required_unless_present = "exchange")]
    pub queue: Option<String>,

    /// Target exchange
    #[arg(long)]
    pub exchange: Option<String>,

    /// Routing policy of the target exchange
    #[arg(short = 't', long = "type", value_enum, requires = "exchange")]
    pub exchange_type: Option<ExchangeKind>,

    /// Queue bound to the target exchange (repeatable)
    #[arg(long = "bind", requires = "exchange")]
    pub bound_queues: Vec<String>,

    /// Message as `id=content` (repeatable, sent as one batch)
    #[arg(short, long = "message", required = true)]
    pub messages: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ConsumeArgs {
    /// Queue id
    pub queue_id: String,

    /// Keep consuming until the queue comes back empty
    #[arg(long)]
    pub drain: bool,

    /// Acknowledge every message received
    #[arg(long)]
    pub ack: bool,

    /// Visibility timeout the queue was created with
    #[arg(long)]
    pub visibility_timeout: Option<u32>,

    /// Batch size the queue was created with
    #[arg(long)]
    pub max_batch: Option<u32>,
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Broker error: {0}")]
    Client(#[from] RqsError),

    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output encoding failed: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    fn invalid(arg: &str, error: ValidationError) -> Self {
        Self::InvalidArgument {
            arg: arg.to_string(),
            message: error.to_string(),
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    initialize_logging(&cli.log_level, cli.json_logs)?;

    let settings = resolve_settings(&cli)?;
    let client = RqsClient::new(settings.to_client_config())?;
    debug!(base_url = %settings.base_url, "Using broker");

    let mut out = std::io::stdout().lock();
    execute(cli.command, &client, &settings, cli.format, &mut out).await
}

/// Initialize logging to stderr
///
/// `RUST_LOG` takes precedence over `log_level` when set.
pub fn initialize_logging(log_level: &str, json: bool) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("rqs_cli={0},rqs_client={0}", log_level)))
        .map_err(|e| CliError::InvalidArgument {
            arg: "--log-level".to_string(),
            message: e.to_string(),
        })?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| CliError::CommandFailed {
        message: format!("Failed to initialize logging: {}", e),
    })
}

/// Load settings and apply command-line overrides
pub fn resolve_settings(cli: &Cli) -> Result<ClientSettings, CliError> {
    let mut settings = ClientSettings::load(cli.config.as_deref())?;

    if let Some(base_url) = &cli.base_url {
        settings.base_url = base_url.clone();
    }
    if let Some(timeout) = cli.timeout {
        settings.timeout_seconds = timeout;
    }

    settings.validate()?;
    Ok(settings)
}

/// Execute a command, writing its result to `out`
pub async fn execute(
    command: Commands,
    client: &RqsClient,
    settings: &ClientSettings,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        Commands::Queue { action } => {
            execute_queue_command(action, client, settings, format, out).await
        }
        Commands::Exchange { action } => {
            execute_exchange_command(action, client, format, out).await
        }
        Commands::Produce(args) => {
            execute_produce_command(args, client, settings, format, out).await
        }
        Commands::Consume(args) => {
            execute_consume_command(args, client, settings, format, out).await
        }
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn execute_queue_command(
    action: QueueCommands,
    client: &RqsClient,
    settings: &ClientSettings,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match action {
        QueueCommands::Create(args) => {
            let queue = queue_from_args(
                &args.queue_id,
                args.visibility_timeout,
                args.max_batch,
                settings,
            )?;
            client.create_queue(&queue).await?;
            info!(queue_id = %queue.queue_id(), "Queue created");
            write_created(out, format, "queue", queue.queue_id().as_str(), true)
        }
        QueueCommands::Ensure(args) => {
            let queue = queue_from_args(
                &args.queue_id,
                args.visibility_timeout,
                args.max_batch,
                settings,
            )?;
            let created = client.ensure_queue(&queue).await?;
            write_created(out, format, "queue", queue.queue_id().as_str(), created)
        }
        QueueCommands::List => {
            let queues = client.list_queues().await?;
            write_ids(out, format, queues.iter().map(QueueId::as_str))
        }
    }
}

async fn execute_exchange_command(
    action: ExchangeCommands,
    client: &RqsClient,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match action {
        ExchangeCommands::Create(args) => {
            let exchange =
                exchange_from_parts(&args.exchange_id, args.exchange_type, &args.queues, "--queue")?;
            client.create_exchange(&exchange).await?;
            info!(exchange_id = %exchange.exchange_id(), "Exchange created");
            write_created(out, format, "exchange", exchange.exchange_id().as_str(), true)
        }
        ExchangeCommands::Ensure(args) => {
            let exchange =
                exchange_from_parts(&args.exchange_id, args.exchange_type, &args.queues, "--queue")?;
            let created = client.ensure_exchange(&exchange).await?;
            write_created(
                out,
                format,
                "exchange",
                exchange.exchange_id().as_str(),
                created,
            )
        }
        ExchangeCommands::List => {
            let exchanges = client.list_exchanges().await?;
            write_ids(out, format, exchanges.iter().map(ExchangeId::as_str))
        }
    }
}

async fn execute_produce_command(
    args: ProduceArgs,
    client: &RqsClient,
    settings: &ClientSettings,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let messages = args
        .messages
        .iter()
        .map(|raw| parse_message(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let (target, response) = match (&args.queue, &args.exchange) {
        (Some(queue_id), None) => {
            let queue = queue_from_args(queue_id, None, None, settings)?;
            let handler = MessageHandler::new(client.clone(), queue);
            let response = handler.produce(&messages).await?;
            (format!("queue '{}'", queue_id), response)
        }
        (None, Some(exchange_id)) => {
            let exchange_type = args.exchange_type.ok_or_else(|| CliError::InvalidArgument {
                arg: "--type".to_string(),
                message: "required when producing to an exchange".to_string(),
            })?;
            let exchange =
                exchange_from_parts(exchange_id, exchange_type, &args.bound_queues, "--bind")?;
            let response = client.produce_to_exchange(&exchange, &messages).await?;
            (format!("exchange '{}'", exchange_id), response)
        }
        _ => {
            return Err(CliError::InvalidArgument {
                arg: "--queue/--exchange".to_string(),
                message: "exactly one target is required".to_string(),
            })
        }
    };

    match format {
        OutputFormat::Text => {
            writeln!(out, "Produced {} message(s) to {}", messages.len(), target)?;
        }
        OutputFormat::Json => {
            let report = json!({
                "target": target,
                "count": messages.len(),
                "data": response.into_data(),
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        }
    }
    Ok(())
}

async fn execute_consume_command(
    args: ConsumeArgs,
    client: &RqsClient,
    settings: &ClientSettings,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let queue = queue_from_args(
        &args.queue_id,
        args.visibility_timeout,
        args.max_batch,
        settings,
    )?;
    let handler = MessageHandler::new(client.clone(), queue);

    // Each message is written and flushed before it is acknowledged.
    if args.drain {
        let mut write_error = None;
        let summary = handler
            .drain(|message| {
                if write_error.is_some() {
                    return ProcessOutcome::Retain;
                }
                match write_delivery(out, format, message) {
                    Ok(()) if args.ack => ProcessOutcome::Acknowledge,
                    Ok(()) => ProcessOutcome::Retain,
                    Err(e) => {
                        write_error = Some(e);
                        ProcessOutcome::Retain
                    }
                }
            })
            .await?;
        if let Some(e) = write_error {
            return Err(e);
        }

        match format {
            OutputFormat::Text => writeln!(
                out,
                "Drained {} message(s) in {} batch(es): {} acknowledged, {} retained",
                summary.received, summary.batches, summary.acknowledged, summary.retained
            )?,
            OutputFormat::Json => {
                let report = json!({
                    "summary": {
                        "batches": summary.batches,
                        "received": summary.received,
                        "acknowledged": summary.acknowledged,
                        "retained": summary.retained,
                    },
                });
                writeln!(out, "{}", serde_json::to_string(&report)?)?;
            }
        }
    } else {
        let delivered = handler.consume().await?;
        if delivered.is_empty() && format == OutputFormat::Text {
            writeln!(out, "No messages available")?;
        }
        for message in delivered {
            write_delivery(out, format, &message)?;
            if args.ack {
                handler.acknowledge(message).await?;
            }
        }
    }

    Ok(())
}

// ============================================================================
// Argument Helpers
// ============================================================================

/// Parse an `id=content` message argument
pub fn parse_message(raw: &str) -> Result<Message, CliError> {
    let (id, content) = raw.split_once('=').ok_or_else(|| CliError::InvalidArgument {
        arg: "--message".to_string(),
        message: format!("expected id=content, got '{}'", raw),
    })?;

    Message::from_parts(id, content).map_err(|e| CliError::invalid("--message", e))
}

fn queue_from_args(
    queue_id: &str,
    visibility_timeout: Option<u32>,
    max_batch: Option<u32>,
    settings: &ClientSettings,
) -> Result<Queue, CliError> {
    let queue_id = QueueId::new(queue_id).map_err(|e| CliError::invalid("queue_id", e))?;
    Queue::new(
        queue_id,
        visibility_timeout.unwrap_or(settings.default_visibility_timeout),
        max_batch.unwrap_or(settings.default_max_batch),
    )
    .map_err(|e| CliError::invalid("queue", e))
}

/// Build an exchange; `queue_flag` names the option the bound queues came from.
fn exchange_from_parts(
    exchange_id: &str,
    kind: ExchangeKind,
    queues: &[String],
    queue_flag: &str,
) -> Result<Exchange, CliError> {
    let exchange_id =
        ExchangeId::new(exchange_id).map_err(|e| CliError::invalid("exchange_id", e))?;
    let queues = queues
        .iter()
        .map(|q| QueueId::new(q.as_str()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CliError::invalid(queue_flag, e))?;

    Exchange::new(exchange_id, kind.into(), queues).map_err(|e| CliError::invalid(queue_flag, e))
}

/// Write one delivered message as a text line or a JSON line, then flush.
fn write_delivery(
    out: &mut impl Write,
    format: OutputFormat,
    message: &DeliveredMessage,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Text => writeln!(out, "{}\t{}", message.message_id(), message.content())?,
        OutputFormat::Json => {
            let entry = json!({
                "messageId": message.message_id().as_str(),
                "content": message.content(),
                "deliveryToken": message.delivery_token().as_str(),
                "queueId": message.queue_id().as_str(),
            });
            writeln!(out, "{}", serde_json::to_string(&entry)?)?;
        }
    }
    out.flush()?;
    Ok(())
}

// ============================================================================
// Output Helpers
// ============================================================================

fn write_created(
    out: &mut impl Write,
    format: OutputFormat,
    kind: &str,
    id: &str,
    created: bool,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Text if created => writeln!(out, "Created {} '{}'", kind, id)?,
        OutputFormat::Text => writeln!(out, "The {} '{}' already exists", kind, id)?,
        OutputFormat::Json => writeln!(
            out,
            "{}",
            serde_json::to_string(&json!({ "id": id, "kind": kind, "created": created }))?
        )?,
    }
    Ok(())
}

fn write_ids<'a>(
    out: &mut impl Write,
    format: OutputFormat,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Text => {
            for id in ids {
                writeln!(out, "{}", id)?;
            }
        }
        OutputFormat::Json => {
            let ids: Vec<&str> = ids.collect();
            writeln!(out, "{}", serde_json::to_string(&ids)?)?;
        }
    }
    Ok(())
}
