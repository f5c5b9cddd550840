//! Stored OAuth credentials and the refresh flow.
//!
//! Credentials live in a JSON file produced by an interactive authorization
//! flow. Loading transparently refreshes an expired access token when a
//! refresh token is present and writes the result back, so long-lived
//! installs keep working without re-authorizing.

use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CredentialError;

/// Tokens this close to their deadline are treated as already expired.
const EXPIRY_LEEWAY_SECS: i64 = 60;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredCredentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    pub expiry: DateTime<Utc>,
}

impl StoredCredentials {
    fn needs_refresh(&self) -> bool {
        Utc::now() + Duration::seconds(EXPIRY_LEEWAY_SECS) >= self.expiry
    }
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

/// File-backed credential store.
pub struct CredentialStore {
    path: PathBuf,
    http: reqwest::blocking::Client,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            http: reqwest::blocking::Client::new(),
        }
    }

    /// Load credentials, refreshing and persisting them if expired.
    ///
    /// `NoCredentials` means the caller has to run an authorization flow:
    /// the file is missing, or the token is expired with no refresh token.
    pub fn load(&self) -> Result<StoredCredentials, CredentialError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CredentialError::NoCredentials(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        let creds: StoredCredentials = serde_json::from_str(&text)?;
        if !creds.needs_refresh() {
            return Ok(creds);
        }
        let refreshed = self.refresh(&creds)?;
        self.save(&refreshed)?;
        Ok(refreshed)
    }

    pub fn save(&self, creds: &StoredCredentials) -> Result<(), CredentialError> {
        let text = serde_json::to_string_pretty(creds)?;
        fs::write(&self.path, text)?;
        Ok(())
    }

    fn refresh(&self, creds: &StoredCredentials) -> Result<StoredCredentials, CredentialError> {
        let refresh_token = creds
            .refresh_token
            .as_deref()
            .ok_or_else(|| CredentialError::NoCredentials(self.path.clone()))?;
        debug!(uri = %creds.token_uri, "refreshing expired access token");
        let response = self
            .http
            .post(&creds.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", creds.client_id.as_str()),
                ("client_secret", creds.client_secret.as_str()),
            ])
            .send()
            .map_err(|e| CredentialError::Refresh(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CredentialError::Refresh(format!("{status}: {body}")));
        }
        let token: RefreshResponse = response
            .json()
            .map_err(|e| CredentialError::Refresh(e.to_string()))?;
        let mut next = creds.clone();
        next.access_token = token.access_token;
        next.expiry = Utc::now() + Duration::seconds(token.expires_in);
        Ok(next)
    }
}
