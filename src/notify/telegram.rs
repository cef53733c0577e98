use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use super::{truncate_chars, Notifier, TransportError};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";
/// Bot API hard limit for one message.
const MAX_CHARS: usize = 4096;

/// Telegram bot `sendMessage`. Only an exact 200 counts as delivered.
#[derive(Clone)]
pub struct TelegramNotifier {
    api_base: String,
    token: String,
    chat_id: String,
    client: Client,
    timeout: Duration,
}

impl TelegramNotifier {
    pub fn new(token: String, chat_id: String) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token,
            chat_id,
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_api_base(mut self, base: String) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<(), TransportError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);
        let text = truncate_chars(message, MAX_CHARS);
        let rsp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .query(&[("chat_id", self.chat_id.as_str()), ("text", text)])
            .send()
            .await
            // the URL carries the bot token
            .map_err(|e| TransportError::Request {
                channel: "telegram",
                source: e.without_url(),
            })?;

        match rsp.status() {
            StatusCode::OK => Ok(()),
            status => Err(TransportError::Status {
                channel: "telegram",
                status,
            }),
        }
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
