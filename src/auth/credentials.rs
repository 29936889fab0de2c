//! Credential persistence
//!
//! This module handles secure storage and retrieval of the current credential.
//! Credentials are stored as JSON in a file with owner-only permissions.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::auth::Credential;
use crate::constants::{auth, files};
use crate::errors::{CredentialStoreError, StoreResult};

/// Summary of the stored credential for display
#[derive(Debug, Clone)]
pub struct AuthStatus {
    /// Whether a credential file exists
    pub stored: bool,
    /// Whether the stored credential carries a refresh token
    pub refreshable: bool,
    /// Milliseconds until expiry (None = no expiry recorded)
    pub remaining_millis: Option<i64>,
    /// Username associated with the credential
    pub username: Option<String>,
}

impl AuthStatus {
    fn from_credential(credential: Option<&Credential>) -> Self {
        match credential {
            Some(credential) => Self {
                stored: true,
                refreshable: credential.refresh_token.is_some(),
                remaining_millis: credential.remaining_millis(),
                username: credential.effective_username(),
            },
            None => Self {
                stored: false,
                refreshable: false,
                remaining_millis: None,
                username: None,
            },
        }
    }

    /// Get descriptive status message for display
    pub fn status_message(&self) -> String {
        match (self.stored, self.remaining_millis) {
            (false, _) => "No credential stored - run 'login' to authenticate".to_string(),
            (true, None) => "Credential stored without expiry".to_string(),
            (true, Some(remaining)) if remaining <= 0 && self.refreshable => {
                "Credential expired - it will be refreshed on the next request".to_string()
            }
            (true, Some(remaining)) if remaining <= 0 => {
                "Credential expired - run 'login' to authenticate again".to_string()
            }
            (true, Some(remaining)) => format!("Credential valid for {}s", remaining / 1000),
        }
    }
}

/// File-backed credential storage
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Store backed by an explicit file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<config_dir>/rest-transport/credential.json`
    pub fn default_location() -> StoreResult<Self> {
        let dir = dirs::config_dir().ok_or(CredentialStoreError::NoConfigDirectory)?;
        Ok(Self::new(
            dir.join(files::CACHE_NAMESPACE)
                .join(auth::CREDENTIAL_FILE_NAME),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the stored credential
    ///
    /// # Errors
    ///
    /// Returns `CredentialStoreError::NotFound` when nothing has been saved yet.
    pub fn load(&self) -> StoreResult<Credential> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CredentialStoreError::NotFound {
                    path: self.path.clone(),
                });
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                return Err(CredentialStoreError::PermissionDenied {
                    path: self.path.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let credential: Credential = serde_json::from_str(&contents)?;
        debug!("Loaded credential from {}", self.path.display());
        Ok(credential)
    }

    /// Load the stored credential, treating a missing file as no credential
    pub fn load_optional(&self) -> StoreResult<Option<Credential>> {
        match self.load() {
            Ok(credential) => Ok(Some(credential)),
            Err(CredentialStoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Save the credential with secure permissions
    pub fn save(&self, credential: &Credential) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(credential)?;

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(auth::CREDENTIAL_FILE_PERMISSIONS);
        }

        let mut file = options.open(&self.path)?;
        file.write_all(json.as_bytes())?;

        // Set restrictive permissions (Unix-like systems only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = file.metadata()?.permissions();
            perms.set_mode(auth::CREDENTIAL_FILE_PERMISSIONS);
            file.set_permissions(perms)?;
        }

        info!(
            "Saved credential {}... to {}",
            credential.log_prefix(),
            self.path.display()
        );
        Ok(())
    }

    /// Remove the stored credential; a missing file is not an error
    pub fn clear(&self) -> StoreResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Describe the stored credential
    pub fn status(&self) -> StoreResult<AuthStatus> {
        let credential = self.load_optional()?;
        Ok(AuthStatus::from_credential(credential.as_ref()))
    }
}

/// Prompt for a password without echoing it
pub fn prompt_password(username: &str) -> StoreResult<String> {
    let password = rpassword::prompt_password(format!("Password for {}: ", username))?;

    if password.is_empty() {
        return Err(CredentialStoreError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Password cannot be empty",
        )));
    }

    Ok(password)
}
