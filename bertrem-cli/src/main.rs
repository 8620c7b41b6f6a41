//! bertrem-cli - Command-line interface for BERT-RPC services
//!
//! Sends a single call or cast and prints the reply.

mod commands;

use bertrem_client::{CastPolicy, Client, ClientConfig, ClientError};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bertrem-cli")]
#[command(about = "Command-line client for BERT-RPC services")]
#[command(version)]
pub struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "BERTREM_CONFIG")]
    config: Option<PathBuf>,

    /// Server address (host:port)
    #[arg(short, long, env = "BERTREM_ADDR")]
    server: Option<String>,

    /// Keep the connection open across replies
    #[arg(short, long)]
    persistent: bool,

    /// Connect timeout in milliseconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Send a cache validation token with the request
    #[arg(long)]
    cache_token: Option<String>,

    /// Raw request options as JSON
    #[arg(long, conflicts_with = "cache_token")]
    options: Option<String>,

    /// Do not wait for a reply to casts
    #[arg(long)]
    fire_and_forget: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Call a remote function and print its result
    Call {
        /// Module name
        module: String,

        /// Function name
        function: String,

        /// Arguments as a JSON array (or @file.json to read from file)
        args: Option<String>,
    },

    /// Cast to a remote function without expecting a result
    Cast {
        /// Module name
        module: String,

        /// Function name
        function: String,

        /// Arguments as a JSON array (or @file.json to read from file)
        args: Option<String>,
    },

    /// Print the effective configuration
    ShowConfig,
}

impl Cli {
    /// Builds the client configuration: file or environment, then flags.
    fn client_config(&self) -> Result<ClientConfig, ClientError> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load_from(path)?,
            None => ClientConfig::from_env()?,
        };

        if let Some(ref server) = self.server {
            config.addr = server.clone();
        }
        if self.persistent {
            config.persistent = true;
        }
        if let Some(ms) = self.timeout {
            config = config.with_connect_timeout(Duration::from_millis(ms));
        }
        if self.fire_and_forget {
            config = config.with_cast_policy(CastPolicy::FireAndForget);
        }

        config.validate()?;
        Ok(config)
    }

    /// Request options as given on the command line, unvalidated.
    fn request_options(&self) -> Result<Option<Value>, ClientError> {
        if let Some(ref token) = self.cache_token {
            return Ok(Some(json!({ "cache": ["validation", token] })));
        }
        match self.options {
            Some(ref raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let config = cli.client_config().map_err(|e| {
        eprintln!("{}: {}", "Configuration error".red(), e);
        e
    })?;

    if let Commands::ShowConfig = cli.command {
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    let options = cli.request_options()?;

    tracing::debug!("Connecting to {}", config.addr);
    let client = Client::connect(&config).await.map_err(|e| {
        eprintln!("{}: {}", "Connection failed".red(), e);
        e
    })?;

    match commands::execute(&client, cli.command, options.as_ref()).await {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }

    client.close();
    if let Err(e) = client.closed().await {
        eprintln!("{}: {}", "Warning".yellow(), e);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_file() {
        let cli = Cli::parse_from([
            "bertrem-cli",
            "--config",
            "/nonexistent/bertrem.yaml",
            "show-config",
        ]);
        assert!(matches!(cli.client_config(), Err(ClientError::Config(_))));
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "bertrem-cli",
            "--server",
            "rpc.local:9999",
            "--persistent",
            "--timeout",
            "1500",
            "--fire-and-forget",
            "show-config",
        ]);
        let config = cli.client_config().unwrap();
        assert_eq!(config.addr, "rpc.local:9999");
        assert!(config.persistent);
        assert_eq!(config.connect_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.cast_policy, CastPolicy::FireAndForget);
    }

    #[test]
    fn test_request_options() {
        let cli = Cli::parse_from(["bertrem-cli", "--cache-token", "v1", "show-config"]);
        assert_eq!(
            cli.request_options().unwrap(),
            Some(json!({"cache": ["validation", "v1"]}))
        );

        let cli = Cli::parse_from(["bertrem-cli", "--options", "{bad", "show-config"]);
        assert!(matches!(cli.request_options(), Err(ClientError::Json(_))));
    }
}
