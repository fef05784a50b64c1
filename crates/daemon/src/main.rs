//! PathGate Daemon
//!
//! Contained file browsing, transfer and archive service.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use daemon::config::{default_config_path, Config};
use daemon::router::{Outcome, RequestRouter};
use protocol::{ListRequest, PageSize, Request};

/// PathGate Daemon - serve one directory tree over HTTP.
#[derive(Parser, Debug)]
#[command(name = "pathgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for the daemon.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Directory to serve (overrides the config file)
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,

        /// Listen address (overrides the config file)
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },

    /// Print one page of a directory listing as JSON
    List {
        /// Directory relative to the root
        #[arg(default_value = "")]
        path: String,

        /// Page number, 1-based
        #[arg(long, default_value = "1")]
        page: usize,

        /// Entries per page, or "all" (defaults to the configured page size)
        #[arg(long, conflicts_with = "all")]
        page_size: Option<PageSize>,

        /// List every entry on one page
        #[arg(long)]
        all: bool,
    },

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    // Load configuration
    let mut config = Config::load(&config_path)?;

    // Apply environment variable overrides
    config.apply_env_overrides();

    if let Commands::Serve { root, bind } = &cli.command {
        if let Some(root) = root {
            config.storage.root = root.clone();
        }
        if let Some(bind) = bind {
            config.server.bind_addr = bind.clone();
        }
    }

    // Validate configuration
    config.validate()?;

    // Initialize tracing
    let filter = if cli.verbose {
        "debug".to_string()
    } else {
        config.server.log_level.to_lowercase()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::debug!("Using config file: {:?}", config_path);

    // Handle commands
    match cli.command {
        Commands::Serve { .. } => {
            tracing::info!(
                "PathGate starting (root: {}, bind: {})",
                config.storage.root.display(),
                config.server.bind_addr
            );
            daemon::serve(&config, wait_for_shutdown_signal()).await?;
        }
        Commands::List {
            path,
            page,
            page_size,
            all,
        } => {
            let page_size = if all { Some(PageSize::All) } else { page_size };

            let router = RequestRouter::from_config(&config)?;
            let request = Request::List(ListRequest {
                path,
                page,
                page_size,
            });

            match router.route(request, Vec::new()) {
                Ok(Outcome::Listing(listing)) => {
                    println!("{}", serde_json::to_string_pretty(&listing)?);
                }
                Ok(other) => anyhow::bail!("Unexpected outcome: {:?}", other),
                Err(e) => {
                    let message = e.to_operation_result().error.unwrap_or_default();
                    eprintln!("Failed to list directory: {}", message);
                    std::process::exit(1);
                }
            }
        }
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => {
                print!("{}", config.to_toml()?);
            }
            ConfigCommands::Init { force } => {
                if config_path.exists() && !force {
                    eprintln!("Config file already exists: {}", config_path.display());
                    eprintln!("Use --force to overwrite it.");
                    std::process::exit(1);
                }
                Config::default().save(&config_path)?;
                println!("Wrote default configuration to {}", config_path.display());
            }
        },
    }

    Ok(())
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        tracing::info!("Received SIGTERM");
                    }
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Received SIGINT");
                    }
                }
                return;
            }
            Err(e) => {
                tracing::warn!("Failed to register SIGTERM handler: {}", e);
            }
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
    }
    tracing::info!("Received shutdown signal");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_serve_overrides() {
        let cli = Cli::parse_from(["pathgate", "serve", "--root", "/srv/files", "--bind", "0.0.0.0:9000"]);
        match cli.command {
            Commands::Serve { root, bind } => {
                assert_eq!(root, Some(PathBuf::from("/srv/files")));
                assert_eq!(bind.as_deref(), Some("0.0.0.0:9000"));
            }
            other => panic!("Expected serve, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_list_defaults() {
        let cli = Cli::parse_from(["pathgate", "list"]);
        match cli.command {
            Commands::List {
                path,
                page,
                page_size,
                all,
            } => {
                assert_eq!(path, "");
                assert_eq!(page, 1);
                assert_eq!(page_size, None);
                assert!(!all);
            }
            other => panic!("Expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_list_page_size() {
        let cli = Cli::parse_from(["pathgate", "list", "docs", "--page-size", "25"]);
        match cli.command {
            Commands::List { page_size, .. } => assert_eq!(page_size, Some(PageSize::Count(25))),
            other => panic!("Expected list, got {:?}", other),
        }

        let cli = Cli::parse_from(["pathgate", "list", "--page-size", "all"]);
        match cli.command {
            Commands::List { page_size, .. } => assert_eq!(page_size, Some(PageSize::All)),
            other => panic!("Expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_zero_page_size() {
        for value in ["0", "-1", "ten"] {
            let result = Cli::try_parse_from(["pathgate", "list", "--page-size", value]);
            assert!(result.is_err(), "{:?} should be rejected", value);
        }
    }

    #[test]
    fn test_cli_rejects_page_size_with_all() {
        let result = Cli::try_parse_from(["pathgate", "list", "--all", "--page-size", "10"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from(["pathgate", "config", "show", "--verbose", "-c", "/tmp/p.toml"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/p.toml")));
        assert!(matches!(cli.command, Commands::Config(ConfigCommands::Show)));
    }
}
