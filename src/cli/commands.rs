//! Command handlers for the REST transport CLI
//!
//! Each handler builds one request descriptor, submits it through a `TransportClient`
//! and prints the outcome. Credential changes made along the way (sign-in, refresh) are
//! written back to the credential store.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::app::TransportClient;
use crate::app::models::RefreshOptions;
use crate::app::request::RequestDescriptor;
use crate::auth::{Credential, CredentialStore, prompt_password};
use crate::cli::args::endpoint;
use crate::cli::{
    DownloadArgs, GetArgs, GlobalArgs, LoginArgs, RefreshArgs, TransferProgress, UploadArgs,
};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// Client, configuration and credential store for one CLI invocation
#[derive(Debug)]
pub struct Session {
    pub config: AppConfig,
    pub store: CredentialStore,
    pub client: TransportClient,
    loaded: Option<Credential>,
}

impl Session {
    /// Build a session from loaded configuration and the global flags
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the credential store cannot
    /// be read.
    pub fn open(global: &GlobalArgs, mut config: AppConfig) -> Result<Self> {
        if let Some(base_url) = &global.base_url {
            config.client.base_url = Some(base_url.clone());
        }
        config.validate()?;

        let store = match &global.credential_file {
            Some(path) => CredentialStore::new(path),
            None => CredentialStore::default_location()?,
        };
        let loaded = store.load_optional()?;
        debug!(
            "Credential store at {} ({})",
            store.path().display(),
            if loaded.is_some() { "present" } else { "empty" }
        );

        let client = TransportClient::from_config(&config, loaded.clone())?;
        Ok(Self {
            config,
            store,
            client,
            loaded,
        })
    }

    /// Write the client's credential back if it changed during this session
    pub fn persist(&self) -> Result<()> {
        let current = self.client.credential();
        if current == self.loaded {
            return Ok(());
        }

        match &current {
            Some(credential) => self.store.save(credential)?,
            None => self.store.clear()?,
        }
        info!("Credential store updated");
        Ok(())
    }
}

/// Handle the get command
pub async fn handle_get(session: &Session, args: GetArgs) -> Result<()> {
    let params = args.query_params().map_err(AppError::generic)?;
    let mut descriptor = RequestDescriptor::get(endpoint(&args.path)).with_query(params);
    if args.no_auth {
        descriptor = descriptor.without_auth();
    }

    // A refresh may have rotated the credential even if the request failed
    let result = session.client.perform::<Value>(descriptor).await;
    session.persist()?;
    print_json(&result?)
}

/// Handle the upload command
pub async fn handle_upload(session: &Session, args: UploadArgs) -> Result<()> {
    if !args.file.is_file() {
        return Err(AppError::generic(format!(
            "Upload source is not a file: {}",
            args.file.display()
        )));
    }

    let mut descriptor = RequestDescriptor::upload(endpoint(&args.path), &args.file);
    if let Some(json) = args.json_body().map_err(AppError::generic)? {
        descriptor = descriptor.with_json(&json)?;
    }

    let progress = TransferProgress::new(&format!("Uploading {}", args.file.display()));
    let result = session.client.upload::<Value>(descriptor).await;
    progress.clear();
    session.persist()?;

    print_json(&result?)
}

/// Handle the download command
pub async fn handle_download(session: &Session, args: DownloadArgs) -> Result<()> {
    let progress = TransferProgress::new(&format!("Downloading {}", args.path));
    let mut descriptor =
        RequestDescriptor::download(endpoint(&args.path)).with_progress(progress.sink());
    if args.no_auth {
        descriptor = descriptor.without_auth();
    }

    let result = session.client.download(descriptor).await;
    match &result {
        Ok(_) => progress.finish("done"),
        Err(_) => progress.clear(),
    }
    session.persist()?;

    let downloaded = result?;
    let saved = match args.output {
        Some(output) => relocate(&downloaded, &output).await?,
        None => downloaded,
    };
    println!("{}", saved.display());
    Ok(())
}

/// Handle the login command
pub async fn handle_login(session: &Session, args: LoginArgs) -> Result<()> {
    let password = prompt_password(&args.username)?;
    if password.is_empty() {
        return Err(AppError::generic("Password cannot be empty"));
    }

    let credential = session
        .client
        .exchange_password(&args.username, &password)
        .await?;
    session.persist()?;

    println!("✅ Signed in as {}", args.username);
    if let Some(remaining) = credential.remaining_millis() {
        println!("   Token valid for {}s", remaining / 1000);
    }
    Ok(())
}

/// Handle the refresh command
pub async fn handle_refresh(session: &Session, args: RefreshArgs) -> Result<()> {
    let options = RefreshOptions {
        accept: (!args.accept.is_empty()).then_some(args.accept),
        billing_country: args.billing_country,
        ..RefreshOptions::default()
    };

    let credential = session.client.refresh_credential(options).await?;
    session.persist()?;

    println!("✅ Credential refreshed ({}...)", credential.log_prefix());
    Ok(())
}

/// Handle the status command
pub async fn handle_status(session: &Session) -> Result<()> {
    let status = session.store.status()?;
    let settings = session.client.settings();

    let base_url = settings.base_url.as_ref().map(|url| url.as_str());
    let configured = if session.client.is_configured() { "yes" } else { "no" };

    println!("Base URL:        {}", base_url.unwrap_or("<not configured>"));
    println!("Client ID:       {}", settings.client_id.as_deref().unwrap_or("<none>"));
    println!("Configured:      {}", configured);
    println!("Credential file: {}", session.store.path().display());
    if let Some(username) = &status.username {
        println!("Username:        {}", username);
    }
    println!("Status:          {}", status.status_message());
    println!("Staging:         {}", session.client.staging().uploads.display());
    println!("                 {}", session.client.staging().downloads.display());

    for stats in session.client.queue_stats() {
        println!("Queue {:<12} ceiling {}", stats.kind, stats.ceiling);
    }
    Ok(())
}

fn print_json(value: &Value) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::generic(format!("Cannot render response: {}", e)))?;
    println!("{}", rendered);
    Ok(())
}

/// Move a downloaded file to its requested location
async fn relocate(from: &Path, to: &Path) -> Result<PathBuf> {
    if let Some(parent) = to.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    if let Err(e) = tokio::fs::rename(from, to).await {
        // Rename fails across file systems
        warn!("Rename to {} failed ({}), copying instead", to.display(), e);
        tokio::fs::copy(from, to).await?;
        tokio::fs::remove_file(from).await?;
    }
    Ok(to.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn global(temp: &TempDir) -> GlobalArgs {
        GlobalArgs {
            verbose: 0,
            quiet: false,
            config: None,
            base_url: Some("https://api.example.com".into()),
            credential_file: Some(temp.path().join("credential.json")),
        }
    }

    #[tokio::test]
    async fn test_session_persists_changed_credentials() {
        let temp = TempDir::new().unwrap();
        let session = Session::open(&global(&temp), AppConfig::default()).unwrap();
        assert!(session.client.credential().is_none());

        session.persist().unwrap();
        assert!(!session.store.exists());

        let credential = Credential::new("abc").with_username("a@b.c");
        session.client.set_credential(Some(credential.clone()));
        session.persist().unwrap();
        assert_eq!(session.store.load().unwrap(), credential);

        let reopened = Session::open(&global(&temp), AppConfig::default()).unwrap();
        assert_eq!(reopened.client.credential(), Some(credential));
        assert!(reopened.client.is_configured());
    }

    #[tokio::test]
    async fn test_invalid_base_url_flag_is_rejected() {
        let temp = TempDir::new().unwrap();
        let mut args = global(&temp);
        args.base_url = Some("::nope".into());

        assert!(matches!(
            Session::open(&args, AppConfig::default()),
            Err(AppError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_rotated_credential_is_saved_when_the_request_fails() {
        use serde_json::json;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/auth/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "rotated",
                "refresh": "refresh-2",
                "expiresIn": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let mut args = global(&temp);
        args.base_url = Some(server.uri());
        CredentialStore::new(temp.path().join("credential.json"))
            .save(
                &Credential::new("stale")
                    .with_refresh_token("refresh-1")
                    .with_username("a@b.c")
                    .expiring_in(5),
            )
            .unwrap();

        let session = Session::open(&args, AppConfig::default()).unwrap();
        let result = handle_get(
            &session,
            GetArgs {
                path: "/rest/missing".into(),
                query: Vec::new(),
                no_auth: false,
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::Transport(_))));

        let stored = session.store.load().unwrap();
        assert_eq!(stored.access_token, "rotated");
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh-2"));
    }

    #[tokio::test]
    async fn test_relocate_moves_the_file() {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("a.bin");
        std::fs::write(&from, b"data").unwrap();
        let to = temp.path().join("nested").join("b.bin");

        let saved = relocate(&from, &to).await.unwrap();
        assert_eq!(saved, to);
        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"data");
    }
}
