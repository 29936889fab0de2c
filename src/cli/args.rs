//! Command-line argument parsing for the REST transport
//!
//! This module defines the CLI structure using clap derive macros. The commands are thin
//! exercisers of the transport: each builds one request descriptor and prints the result.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use serde_json::Value;

use crate::app::request::{Endpoint, QueryParams};

/// rest-transport - exercise a REST API through the managed transport
#[derive(Parser, Debug)]
#[command(
    name = "rest-transport",
    version,
    about = "Issue authenticated REST requests with managed credentials",
    long_about = "Sends requests through bounded task queues with transparent credential refresh.
Credentials are stored in the user configuration directory with owner-only permissions."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Increase logging verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode - errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Base URL of the API (overrides configuration and environment)
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Credential file path
    #[arg(long, global = true, value_name = "FILE")]
    pub credential_file: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a GET request and print the JSON response
    Get(GetArgs),

    /// Upload a file as multipart form data
    Upload(UploadArgs),

    /// Download a file
    Download(DownloadArgs),

    /// Sign in with a username and password
    Login(LoginArgs),

    /// Refresh the stored credential now
    Refresh(RefreshArgs),

    /// Show configuration and credential status
    Status,
}

/// Arguments for the get command
#[derive(Args, Debug, Clone)]
pub struct GetArgs {
    /// API path, or an absolute URL on another host
    pub path: String,

    /// Query parameter, repeatable
    #[arg(short = 'q', long = "query", value_name = "NAME=VALUE")]
    pub query: Vec<String>,

    /// Send without credentials
    #[arg(long)]
    pub no_auth: bool,
}

/// Arguments for the upload command
#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    /// API path to upload to
    pub path: String,

    /// File to upload
    pub file: PathBuf,

    /// JSON document sent alongside the file
    #[arg(long, value_name = "JSON")]
    pub json: Option<String>,
}

/// Arguments for the download command
#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    /// API path, or an absolute URL on another host
    pub path: String,

    /// Move the downloaded file here
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Send without credentials
    #[arg(long)]
    pub no_auth: bool,
}

/// Arguments for the login command
#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    /// Account username; the password is prompted for
    pub username: String,
}

/// Arguments for the refresh command
#[derive(Args, Debug, Clone, Default)]
pub struct RefreshArgs {
    /// Identifier of terms to accept with this refresh, repeatable
    #[arg(long = "accept", value_name = "TERMS_ID")]
    pub accept: Vec<String>,

    /// Billing country sent with the refresh
    #[arg(long)]
    pub billing_country: Option<String>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Log level forced by flags; `None` defers to the configured level
    pub fn log_level(&self) -> Option<tracing::Level> {
        if self.global.quiet {
            Some(tracing::Level::ERROR)
        } else {
            match self.global.verbose {
                0 => None,
                1 => Some(tracing::Level::DEBUG),
                _ => Some(tracing::Level::TRACE),
            }
        }
    }
}

/// Absolute URLs address foreign hosts, anything else is a path on the home host
pub fn endpoint(path: &str) -> Endpoint {
    if path.starts_with("http://") || path.starts_with("https://") {
        Endpoint::foreign(path)
    } else {
        Endpoint::home(path)
    }
}

impl GetArgs {
    /// Query parameters in the order given; a bare name has no value
    pub fn query_params(&self) -> Result<QueryParams, String> {
        let mut params = QueryParams::new();
        for item in &self.query {
            let (name, value) = match item.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (item.as_str(), None),
            };
            if name.is_empty() {
                return Err(format!("Invalid query parameter: {}", item));
            }
            params.put(name, value);
        }
        Ok(params)
    }
}

impl UploadArgs {
    /// Parsed `--json` document
    pub fn json_body(&self) -> Result<Option<Value>, String> {
        self.json
            .as_deref()
            .map(|json| {
                serde_json::from_str(json).map_err(|e| format!("Invalid --json document: {}", e))
            })
            .transpose()
    }
}
