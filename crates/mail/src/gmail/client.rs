//! Gmail API HTTP client
//!
//! Implements [`MailGateway`] against the Gmail REST API.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use std::time::Duration;

use super::api::{
    GmailMessage, HistoryResponse, ListMessagesResponse, ModifyMessageRequest, ProfileResponse,
};
use super::{GmailAuth, MailGateway, METADATA_HEADERS};
use crate::models::MessageId;

/// Error indicating the stored history cursor has expired or is invalid.
/// Callers fall back to a full scan when they see this.
#[derive(Debug, thiserror::Error)]
#[error("History ID expired or invalid")]
pub struct HistoryExpiredError;

/// Gmail API client
pub struct GmailClient {
    auth: GmailAuth,
    include_spam_trash: bool,
}

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Page size used for message listing and history walks
    const PAGE_SIZE: usize = 500;

    /// Create a new Gmail client
    pub fn new(auth: GmailAuth) -> Self {
        Self {
            auth,
            include_spam_trash: false,
        }
    }

    /// Include spam and trash in message listings (off by default)
    pub fn include_spam_trash(mut self, include: bool) -> Self {
        self.include_spam_trash = include;
        self
    }

    /// Check if the client has a usable token
    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    /// The authenticated user's profile
    pub fn get_profile(&self) -> Result<ProfileResponse> {
        let access_token = self.auth.get_access_token()?;

        let url = format!("{}/users/me/profile", Self::BASE_URL);

        let mut response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .context("Failed to send profile request")?;

        let profile: ProfileResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse profile response")?;

        Ok(profile)
    }

    fn get_message(&self, id: &MessageId, format: &str) -> Result<GmailMessage> {
        let access_token = self.auth.get_access_token()?;

        let mut url = format!(
            "{}/users/me/messages/{}?format={}",
            Self::BASE_URL,
            id.as_str(),
            format
        );
        if format == "metadata" {
            for header in METADATA_HEADERS {
                url.push_str(&format!("&metadataHeaders={}", header));
            }
        }

        let mut response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .with_context(|| format!("Failed to fetch message {}", id.as_str()))?;

        let message: GmailMessage = response
            .body_mut()
            .read_json()
            .context("Failed to parse message response")?;

        Ok(message)
    }

    /// Fetch with exponential backoff; transient failures are common when
    /// 16 workers hammer the metadata endpoint.
    fn get_message_with_retry(
        &self,
        id: &MessageId,
        format: &str,
        max_retries: u32,
    ) -> Result<GmailMessage> {
        let mut last_error = None;
        let mut delay = Duration::from_millis(100);

        for attempt in 0..max_retries {
            match self.get_message(id, format) {
                Ok(msg) => return Ok(msg),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < max_retries - 1 {
                        let jitter = Duration::from_millis(rand_jitter());
                        std::thread::sleep(delay + jitter);
                        delay *= 2;
                    }
                }
            }
        }

        Err(last_error.unwrap())
    }
}

impl MailGateway for GmailClient {
    fn list_inbox_ids(&self, page_token: Option<&str>) -> Result<ListMessagesResponse> {
        let access_token = self.auth.get_access_token()?;

        let mut url = format!(
            "{}/users/me/messages?labelIds=INBOX&maxResults={}&includeSpamTrash={}",
            Self::BASE_URL,
            Self::PAGE_SIZE,
            self.include_spam_trash
        );
        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", token));
        }

        let mut response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .context("Failed to send list messages request")?;

        let list: ListMessagesResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse list messages response")?;

        Ok(list)
    }

    fn get_metadata(&self, id: &MessageId) -> Result<GmailMessage> {
        self.get_message_with_retry(id, "metadata", 3)
    }

    fn get_full(&self, id: &MessageId) -> Result<GmailMessage> {
        self.get_message_with_retry(id, "full", 3)
    }

    fn list_history(
        &self,
        start_history_id: u64,
        page_token: Option<&str>,
    ) -> Result<HistoryResponse> {
        let access_token = self.auth.get_access_token()?;

        let mut url = format!(
            "{}/users/me/history?startHistoryId={}&labelId=INBOX&maxResults={}",
            Self::BASE_URL,
            start_history_id,
            Self::PAGE_SIZE
        );
        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", token));
        }

        let response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call();

        match response {
            Ok(mut resp) => {
                let history: HistoryResponse = resp
                    .body_mut()
                    .read_json()
                    .context("Failed to parse history response")?;
                Ok(history)
            }
            // Gmail answers 404 when the start cursor is too old.
            Err(ureq::Error::StatusCode(404)) => Err(HistoryExpiredError.into()),
            Err(e) => Err(anyhow::anyhow!("Failed to fetch history: {}", e)),
        }
    }

    fn current_history_id(&self) -> Result<String> {
        let profile = self.get_profile()?;
        Ok(profile.history_id)
    }

    fn modify_labels(&self, id: &MessageId, add: &[&str], remove: &[&str]) -> Result<()> {
        let access_token = self.auth.get_access_token()?;

        let url = format!(
            "{}/users/me/messages/{}/modify",
            Self::BASE_URL,
            id.as_str()
        );
        let body = ModifyMessageRequest {
            add_label_ids: add.iter().map(|s| s.to_string()).collect(),
            remove_label_ids: remove.iter().map(|s| s.to_string()).collect(),
        };

        ureq::post(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .send_json(&body)
            .with_context(|| format!("Failed to modify labels on message {}", id.as_str()))?;

        Ok(())
    }

    fn trash(&self, id: &MessageId) -> Result<()> {
        let access_token = self.auth.get_access_token()?;

        let url = format!(
            "{}/users/me/messages/{}/trash",
            Self::BASE_URL,
            id.as_str()
        );

        ureq::post(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .send_empty()
            .with_context(|| format!("Failed to trash message {}", id.as_str()))?;

        Ok(())
    }
}

/// Generate a random jitter value (0-100ms)
fn rand_jitter() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let hasher = RandomState::new().build_hasher();
    hasher.finish() % 100
}
