//! Command-line interface components
//!
//! This module contains CLI-specific code for the rest-transport binary,
//! including argument parsing, command handlers and progress display.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{
    Cli, Commands, DownloadArgs, GetArgs, GlobalArgs, LoginArgs, RefreshArgs, UploadArgs,
};
pub use commands::{
    Session, handle_download, handle_get, handle_login, handle_refresh, handle_status,
    handle_upload,
};
pub use progress::TransferProgress;
