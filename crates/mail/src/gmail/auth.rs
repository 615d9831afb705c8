//! Gmail OAuth2 token management
//!
//! Loads the cached token, refreshes it when it is about to expire, and
//! persists the result. The interactive authorization flow (browser +
//! loopback redirect) is owned by the embedding application; this module
//! only consumes its output. Uses synchronous HTTP (ureq) to be
//! executor-agnostic.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// OAuth2 token management for the Gmail API
pub struct GmailAuth {
    client_id: String,
    client_secret: String,
    token_path: PathBuf,
}

/// Stored token data, as written by the authorization flow
#[derive(Debug, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
}

/// Token response from Google
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    #[allow(dead_code)]
    token_type: String,
}

impl GmailAuth {
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Token cache filename in the Chuckterm config directory
    const TOKEN_FILE: &'static str = "token.json";

    /// Create a new GmailAuth instance
    ///
    /// # Arguments
    /// * `client_id` - OAuth2 client ID from Google Cloud Console
    /// * `client_secret` - OAuth2 client secret from Google Cloud Console
    pub fn new(client_id: String, client_secret: String) -> Result<Self> {
        let token_path = config::state_path(Self::TOKEN_FILE)?;

        Ok(Self {
            client_id,
            client_secret,
            token_path,
        })
    }

    /// Create an instance with an explicit token cache path
    pub fn with_token_path(client_id: String, client_secret: String, token_path: PathBuf) -> Self {
        Self {
            client_id,
            client_secret,
            token_path,
        }
    }

    /// Get a valid access token, refreshing if needed.
    ///
    /// Fails when no cached token exists or the refresh grant is rejected;
    /// the caller surfaces that as "authentication required".
    pub fn get_access_token(&self) -> Result<String> {
        let token = self
            .load_token()
            .context("No cached Gmail token; run the authentication flow first")?;

        // Still valid (with a 5 minute buffer)?
        if let Some(expires_at) = token.expires_at {
            let now = chrono::Utc::now().timestamp();
            if expires_at > now + 300 {
                return Ok(token.access_token);
            }
        }

        let refresh_token = token
            .refresh_token
            .context("Cached Gmail token has expired and carries no refresh token")?;
        let new_token = self.refresh_access_token(&refresh_token)?;
        self.save_token_response(&new_token)?;
        Ok(new_token.access_token)
    }

    /// Check if a usable token is cached
    pub fn is_authenticated(&self) -> bool {
        let Ok(token) = self.load_token() else {
            return false;
        };
        if let Some(expires_at) = token.expires_at {
            let now = chrono::Utc::now().timestamp();
            if expires_at > now + 300 {
                return true;
            }
        }
        token.refresh_token.is_some()
    }

    /// Clear the stored token (logout)
    pub fn logout(&self) -> Result<()> {
        if self.token_path.exists() {
            fs::remove_file(&self.token_path)?;
        }
        Ok(())
    }

    /// Refresh an access token using a refresh token
    fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        let response = ureq::post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .context("Failed to refresh access token")?;

        let mut token: TokenResponse = response
            .into_body()
            .read_json()
            .context("Failed to parse refresh token response")?;

        // Preserve the refresh token if not returned
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }

        Ok(token)
    }

    /// Load the stored token from disk
    fn load_token(&self) -> Result<StoredToken> {
        let content = fs::read_to_string(&self.token_path)?;
        let token: StoredToken = serde_json::from_str(&content)?;
        Ok(token)
    }

    /// Save a token response to disk
    fn save_token_response(&self, token: &TokenResponse) -> Result<()> {
        if let Some(parent) = self.token_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let stored = StoredToken {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: token
                .expires_in
                .map(|d| chrono::Utc::now().timestamp() + d as i64),
        };

        let content = serde_json::to_string_pretty(&stored)?;
        fs::write(&self.token_path, content)?;
        Ok(())
    }
}
