//! Expediente CLI - sign in and call the case-management API from a terminal.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use expediente_config::{init_logging, parse_level, Config, Paths};
use std::path::PathBuf;
use tracing::debug;

/// Expediente CLI - manage your session with the case-management API.
#[derive(Parser)]
#[command(name = "expediente")]
#[command(about = "Expediente CLI for authentication and API access")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base directory for config, credentials and logs (default: ~/.expediente)
    #[arg(long, global = true, env = "EXPEDIENTE_HOME")]
    base_dir: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Mirror log lines to stderr
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        /// Account email (prompted if omitted)
        #[arg(short, long)]
        email: Option<String>,
        /// Account password (prompted without echo if omitted)
        #[arg(long, env = "EXPEDIENTE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign out and clear stored credentials
    Logout,

    /// Show the current session
    Status,

    /// Check whether the signed-in user holds a permission
    Can {
        /// Permission name, e.g. expedientes.read
        permission: String,
    },

    /// Send an authenticated request to the API
    Request {
        /// HTTP method
        method: String,
        /// Path relative to the API base URL, e.g. /expedientes
        path: String,
        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,
    },
}

fn load(cli: &Cli) -> Result<(Config, Paths)> {
    let paths = match &cli.base_dir {
        Some(dir) => Paths::with_base_dir(dir.clone()),
        None => Paths::new()?,
    };
    let mut config = Config::load(&paths)?;
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    Ok((config, paths))
}

async fn run(cli: Cli) -> Result<()> {
    let (config, paths) = load(&cli)?;

    let level = parse_level(&config.log_level).as_str().to_lowercase();
    if let Err(e) = paths.ensure_dirs() {
        eprintln!("Warning: could not create {}: {}", paths.base_dir().display(), e);
    }
    init_logging("cli", &level, &paths, cli.verbose);
    debug!(api = %config.api_base_url, storage = ?config.storage, "Configuration loaded");

    let format = &cli.format;
    match cli.command {
        Commands::Login { email, password } => {
            commands::login(&config, &paths, email, password, format).await
        }
        Commands::Logout => commands::logout(&config, &paths, format).await,
        Commands::Status => commands::status(&config, &paths, format).await,
        Commands::Can { permission } => commands::can(&config, &paths, &permission, format).await,
        Commands::Request { method, path, data } => {
            commands::request(&config, &paths, &method, &path, data.as_deref(), format).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = cli.format;

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e), &format);
        std::process::exit(1);
    }
}
