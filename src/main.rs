//! rest-transport CLI application
//!
//! Command-line front end for the REST transport: sends requests, uploads and downloads
//! files, and manages the stored credential.

use std::process;

use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use rest_transport::cli::{
    Cli, Commands, Session, handle_download, handle_get, handle_login, handle_refresh,
    handle_status, handle_upload,
};
use rest_transport::config::AppConfig;
use rest_transport::errors::Result;

#[tokio::main]
async fn main() {
    // Initialize program
    let result = run().await;

    // Handle any errors that occurred
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();
    let config = AppConfig::load(cli.global.config.clone()).await?;

    init_logging(&cli, &config.logging.level);
    info!("rest-transport v{} starting", env!("CARGO_PKG_VERSION"));

    let session = Session::open(&cli.global, config)?;

    // Execute the appropriate command
    match cli.command {
        Commands::Get(args) => handle_get(&session, args).await,
        Commands::Upload(args) => handle_upload(&session, args).await,
        Commands::Download(args) => handle_download(&session, args).await,
        Commands::Login(args) => handle_login(&session, args).await,
        Commands::Refresh(args) => handle_refresh(&session, args).await,
        Commands::Status => handle_status(&session).await,
    }
}

/// Initialize logging from the CLI verbosity flags, falling back to the configured level
fn init_logging(cli: &Cli, configured_level: &str) {
    let level = cli
        .log_level()
        .map(|level| level.to_string().to_lowercase())
        .unwrap_or_else(|| configured_level.to_string());

    // Create environment filter
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("rest_transport={}", level).parse() {
        filter = filter.add_directive(directive);
    }

    // Initialize subscriber
    fmt()
        .with_env_filter(filter)
        .with_target(cli.global.verbose > 1)
        .with_writer(std::io::stderr)
        .init();

    if cli.global.verbose > 0 {
        info!("Verbose logging enabled ({})", level);
    }
}
