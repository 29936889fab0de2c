//! Shared fixtures for the integration tests

#![allow(dead_code)]

use rest_transport::app::{ClientSettings, StagingDirs, TransportClient};
use rest_transport::auth::Credential;
use tempfile::TempDir;
use wiremock::MockServer;

pub const CLIENT_ID: &str = "test-app";
pub const CLIENT_SECRET: &str = "s3cret";

pub fn settings(server: &MockServer) -> ClientSettings {
    ClientSettings::new(&server.uri())
        .unwrap()
        .with_client(CLIENT_ID, Some(CLIENT_SECRET))
}

pub fn client(
    server: &MockServer,
    temp: &TempDir,
    credential: Option<Credential>,
) -> TransportClient {
    TransportClient::builder(settings(server))
        .staging(StagingDirs::under(temp.path()))
        .credential(credential)
        .build()
        .unwrap()
}

/// Refreshable credential inside the refresh threshold
pub fn expiring_credential(token: &str) -> Credential {
    Credential::new(token)
        .with_refresh_token("refresh-1")
        .with_username("user@example.com")
        .expiring_in(5)
}

/// Refreshable credential well outside the refresh threshold
pub fn fresh_credential(token: &str) -> Credential {
    Credential::new(token)
        .with_refresh_token("refresh-1")
        .with_username("user@example.com")
        .expiring_in(3600)
}

pub fn entries(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}
