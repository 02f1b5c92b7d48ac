//! Teambot - Main entry point.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use teambot_common::config::Config;
use teambot_common::logging::init_logging;
use teambot_service::{cli, start_server};

/// Teams and REST chat relay to Azure OpenAI.
#[derive(Parser, Debug)]
#[command(name = "teambot")]
#[command(version)]
#[command(about = "Teams and REST chat relay to Azure OpenAI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,

    /// Validate configuration and probe Azure OpenAI
    CheckConfig,

    /// Smoke test a running instance
    Smoke {
        /// Base URL of the instance
        #[arg(long, default_value = "http://127.0.0.1:3978")]
        url: String,
    },

    /// Manage the encrypted secret store
    Secrets {
        #[command(subcommand)]
        command: SecretsCommands,
    },
}

#[derive(Subcommand, Debug)]
enum SecretsCommands {
    /// Create a new store and print its key
    Init {
        /// Store file to create
        path: PathBuf,
    },
    /// Set a secret
    Set { key: String, value: String },
    /// Remove a secret
    Remove { key: String },
    /// List secret names
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let config = Config::load_and_validate()?;
            init_logging(
                &config.observability.log_level,
                &config.observability.log_format,
            );
            for warning in config.warnings() {
                tracing::warn!("{warning}");
            }

            tracing::info!("Teambot v{}", env!("CARGO_PKG_VERSION"));
            start_server(&config).await
        }

        Commands::CheckConfig => {
            let config = Config::load()?;
            init_logging("warn", &config.observability.log_format);
            cli::print_report(&cli::check_config(&config).await)
        }

        Commands::Smoke { url } => cli::smoke(&url).await,

        Commands::Secrets { command } => match command {
            SecretsCommands::Init { path } => {
                let key = cli::secrets_init(path.clone())?;
                println!("Created {}", path.display());
                println!("export TEAMBOT_SECRETS_PATH={}", path.display());
                println!("export TEAMBOT_SECRETS_KEY={key}");
                Ok(())
            }
            SecretsCommands::Set { key, value } => {
                cli::secrets_set(&key, &value)?;
                println!("Stored {key}");
                Ok(())
            }
            SecretsCommands::Remove { key } => {
                if cli::secrets_remove(&key)? {
                    println!("Removed {key}");
                } else {
                    println!("{key} not found");
                }
                Ok(())
            }
            SecretsCommands::List => {
                for key in cli::secrets_list()? {
                    println!("{key}");
                }
                Ok(())
            }
        },
    }
}
