use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use slackline_core::{AppError, Config};
use slackline_slack::{Gateway, HttpSlackApi, SlackGateway};
use tracing::{info, warn};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{reload, EnvFilter, Registry};

mod cli;
mod mcp_server;

/// Slack messaging gateway: one-shot CLI commands and a stdio tool server.
#[derive(Parser, Debug)]
#[command(name = "slackline", version, about, long_about = None)]
struct Cli {
    /// Config file path (default: .slack-mcp.json in the working directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Slack bot token (overrides config and environment)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Channel name or ID (overrides the configured default)
    #[arg(long, global = true)]
    channel: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the tool server on stdin/stdout (default)
    Serve,
    /// Post a message to a channel
    Post {
        /// Message text
        #[arg(short, long)]
        message: String,
        /// Persona name appended as a hashtag
        #[arg(long)]
        display_name: Option<String>,
    },
    /// Reply in a thread
    Reply {
        /// Timestamp of the parent message
        #[arg(short = 't', long)]
        thread_ts: String,
        /// Reply text
        #[arg(short, long)]
        message: String,
        /// Persona name appended as a hashtag
        #[arg(long)]
        display_name: Option<String>,
    },
    /// Show recent messages
    History {
        /// Number of messages (1-100)
        #[arg(short, long, default_value_t = 10)]
        limit: i64,
        /// Only messages after this Unix timestamp
        #[arg(long)]
        oldest: Option<String>,
        /// Only messages before this Unix timestamp
        #[arg(long)]
        latest: Option<String>,
    },
    /// Add a reaction to a message
    React {
        /// Timestamp of the target message
        #[arg(short, long)]
        timestamp: String,
        /// Emoji name, colons optional
        #[arg(short, long)]
        reaction: String,
    },
    /// Remove a reaction from a message
    Unreact {
        /// Timestamp of the target message
        #[arg(short, long)]
        timestamp: String,
        /// Emoji name, colons optional
        #[arg(short, long)]
        reaction: String,
    },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            match e.downcast_ref::<AppError>() {
                Some(app) => eprintln!("{}", app.format_for_tool()),
                None => eprintln!("Error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let command = cli.command.unwrap_or(Command::Serve);
    if let Command::Version = command {
        cli::print_version(cli.json);
        return Ok(ExitCode::SUCCESS);
    }

    let rust_log = std::env::var("RUST_LOG").ok().filter(|v| !v.is_empty());
    let env_level = std::env::var("SLACK_FAST_MCP_LOG_LEVEL").ok();
    let initial = initial_directive(rust_log.as_deref(), cli.verbose, env_level.as_deref());
    let (subscriber, filter) = build_subscriber(&initial, std::io::stderr);
    subscriber.init();

    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load(&std::env::current_dir()?)?,
    };
    config.apply_overrides(cli.token.as_deref(), cli.channel.as_deref(), cli.verbose);
    if rust_log.is_none() {
        if let Err(e) = filter.reload(level_filter(&config.log_level)) {
            warn!(error = %e, "could not apply configured log level");
        }
    }
    config.validate()?;

    let gateway: Arc<dyn Gateway> = Arc::new(SlackGateway::new(HttpSlackApi::new(
        config.token.clone(),
        None,
    )));

    match command {
        Command::Serve => {
            info!(version = env!("CARGO_PKG_VERSION"), "starting stdio tool server");
            mcp_server::serve(gateway, Arc::new(config)).await?;
            Ok(ExitCode::SUCCESS)
        }
        other => {
            let (tool, params) = cli::invocation(other)
                .ok_or_else(|| anyhow::anyhow!("command has no tool mapping"))?;
            cli::run_tool(gateway.as_ref(), &config, tool, params, cli.json).await
        }
    }
}

/// Filter used until the config is loaded: `RUST_LOG`, else debug for
/// `--verbose`, else `SLACK_FAST_MCP_LOG_LEVEL`, else warn.
fn initial_directive(rust_log: Option<&str>, verbose: bool, env_level: Option<&str>) -> String {
    if let Some(directive) = rust_log {
        return directive.to_string();
    }
    if verbose {
        return "debug".to_string();
    }
    env_level
        .filter(|l| !l.is_empty())
        .unwrap_or("warn")
        .to_string()
}

fn level_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Installed before config loading so loader warnings are not lost. Logs go
/// to the given writer (stderr in the binary) so stdout stays clean for the
/// tool protocol. The handle swaps in the configured level afterwards.
fn build_subscriber<W>(
    directive: &str,
    writer: W,
) -> (impl tracing::Subscriber + Send + Sync, reload::Handle<EnvFilter, Registry>)
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let (filter, handle) = reload::Layer::new(level_filter(directive));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(writer));
    (subscriber, handle)
}
