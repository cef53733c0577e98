use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{truncate_chars, Notifier, TransportError};

/// Discord rejects longer `content`.
const MAX_CHARS: usize = 2000;

#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

#[derive(Serialize)]
struct DiscordWebhookPayload<'a> {
    content: &'a str,
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, message: &str) -> Result<(), TransportError> {
        let payload = DiscordWebhookPayload {
            content: truncate_chars(message, MAX_CHARS),
        };
        let rsp = self
            .client
            .post(&self.webhook)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            // webhook URLs embed their secret
            .map_err(|e| TransportError::Request {
                channel: "discord",
                source: e.without_url(),
            })?;

        let status = rsp.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                channel: "discord",
                status,
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}
