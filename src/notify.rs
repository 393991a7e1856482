//! User notification sink.
//!
//! Expiry and payment success are the only outcomes users hear about.
//! Notification is fire-and-forget: a failed send is logged and swallowed,
//! and never affects stored invoice state.

use crate::config::NotifyConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers outcome messages to users.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `text` to `user_id`. Must not error; failures are logged.
    async fn notify(&self, user_id: i64, text: &str);
}

/// Notifier backed by the Telegram Bot API.
pub struct TelegramNotifier {
    api_base: String,
    token: String,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

impl TelegramNotifier {
    /// Build a notifier from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no bot token is configured.
    pub fn from_config(config: &NotifyConfig) -> Result<Self> {
        let token = config
            .bot_token
            .clone()
            .ok_or_else(|| Error::Config("bot token is not configured".to_string()))?;
        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token,
            http: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, user_id: i64, text: &str) {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);
        let body = SendMessage {
            chat_id: user_id,
            text,
        };

        match self
            .http
            .post(&url)
            .json(&body)
            .timeout(SEND_TIMEOUT)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                warn!(
                    "Notification to user {user_id} rejected with {}",
                    response.status()
                );
            }
            Err(e) => {
                warn!("Notification to user {user_id} failed: {e}");
            }
        }
    }
}

/// Notifier that drops every message. Used for ephemeral and simulated runs
/// without a bot token.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, user_id: i64, text: &str) {
        debug!("Dropping notification to user {user_id}: {text}");
    }
}
