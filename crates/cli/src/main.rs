mod config;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use runtime::{Orchestrator, StdioConnector};
use serde_json::{Map, Value};

use config::Config;
use error::{Error, Result};

const CONFIG_FILE: &str = "switchyard.toml";

#[derive(Parser)]
#[command(name = "switchyard")]
#[command(about = "Route tool calls across MCP tool providers", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the provider configuration
    #[arg(short, long, default_value = CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List every tool and the provider that owns it
    Tools {
        /// Print function-calling specs as JSON
        #[arg(long)]
        json: bool,
    },
    /// Call a tool
    Call {
        /// Tool name
        tool: String,
        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli.config)?;
    tracing::debug!(
        config = %cli.config.display(),
        providers = config.providers.len(),
        "loaded configuration"
    );

    let mut orchestrator = Orchestrator::stdio(config.providers)?;
    if let Err(e) = orchestrator.initialize().await {
        tracing::error!(error = %e, "failed to discover provider tools");
        return Err(e.into());
    }

    let command = cli.command.unwrap_or(Commands::Tools { json: false });
    let outcome = match command {
        Commands::Tools { json: true } => cmd_tools_json(&orchestrator),
        Commands::Tools { json: false } => {
            cmd_tools(&orchestrator);
            Ok(())
        }
        Commands::Call { tool, args } => cmd_call(&orchestrator, &tool, &args).await,
    };

    // Providers are shut down even when the command failed.
    let closed = orchestrator.close().await;
    if let Err(e) = &closed {
        tracing::warn!(error = %e, "providers did not shut down cleanly");
    }
    outcome?;
    closed?;
    Ok(())
}

fn cmd_tools(orchestrator: &Orchestrator<StdioConnector>) {
    let tools = orchestrator.list_tools();
    println!("{} tools\n", tools.len());

    for tool in tools {
        let provider = orchestrator.provider_for(&tool.name).unwrap_or("?");
        let required: Vec<_> = tool.parameters.required.iter().map(String::as_str).collect();
        println!("{} [{provider}]", tool.name);
        if !tool.description.is_empty() {
            println!("    {}", tool.description);
        }
        if !required.is_empty() {
            println!("    required: {}", required.join(", "));
        }
    }
}

fn cmd_tools_json(orchestrator: &Orchestrator<StdioConnector>) -> Result<()> {
    let specs = orchestrator.registry().specs();
    println!("{}", serde_json::to_string_pretty(&specs)?);
    Ok(())
}

async fn cmd_call(
    orchestrator: &Orchestrator<StdioConnector>,
    tool: &str,
    args: &str,
) -> Result<()> {
    let arguments = parse_arguments(args)?;
    let execution = orchestrator.execute(tool, arguments).await?;
    tracing::info!(tool, provider = %execution.provider, "tool call finished");
    let text = execution.text();

    if execution.is_error() {
        return Err(Error::ToolFailed {
            tool: tool.to_string(),
            message: text,
        });
    }

    eprintln!("[{}]", execution.provider);
    if text.is_empty() {
        println!("{}", serde_json::to_string_pretty(&execution.result.content)?);
    } else {
        println!("{text}");
    }
    Ok(())
}

fn parse_arguments(args: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str(args)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidArguments(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_object_arguments() {
        let args = parse_arguments(r#"{"path": "/tmp/x", "limit": 3}"#).unwrap();
        assert_eq!(args["path"], "/tmp/x");
        assert_eq!(args["limit"], 3);
        assert!(parse_arguments("{}").unwrap().is_empty());
    }

    #[test]
    fn rejects_non_object_arguments() {
        assert!(matches!(
            parse_arguments("[1, 2]"),
            Err(Error::InvalidArguments(_))
        ));
        assert!(matches!(parse_arguments("{"), Err(Error::Json(_))));
    }

    #[test]
    fn cli_defaults_to_config_file() {
        let cli = Cli::try_parse_from(["switchyard", "call", "read_file", "--args", "{}"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(CONFIG_FILE));
        assert!(matches!(cli.command, Some(Commands::Call { ref tool, .. }) if tool == "read_file"));
    }
}
