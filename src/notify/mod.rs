// src/notify/mod.rs
pub mod discord;
pub mod telegram;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::watch::WatchConfig;
use crate::diff::ChangeDetails;
use crate::source::SourceDefinition;
use discord::DiscordNotifier;
use telegram::TelegramNotifier;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{channel} request failed: {source}")]
    Request {
        channel: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{channel} answered {status}")]
    Status {
        channel: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("none of {attempted} channel(s) delivered the message")]
    Undelivered { attempted: usize },
}

/// Delivers one human-readable message. No retries.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<(), TransportError>;
    fn name(&self) -> &'static str;
}

/// `[id] 2 new listing(s) found on <url>` plus one `- tag` line per new tag.
pub fn change_message(source: &SourceDefinition, details: &ChangeDetails) -> String {
    let mut msg = format!(
        "[{}] {} new listing(s) found on {}",
        source.id,
        details.count(),
        source.url
    );
    for tag in details.tags() {
        msg.push_str("\n- ");
        msg.push_str(tag);
    }
    msg
}

pub(crate) fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

/// Fans a message out to every configured channel.
/// Succeeds when at least one channel delivered; with no channels the message
/// is only logged.
pub struct NotifierMux {
    channels: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self { channels }
    }

    pub fn from_config(cfg: &WatchConfig) -> Self {
        let mut channels: Vec<Box<dyn Notifier>> = Vec::new();
        if let Some(tg) = &cfg.telegram {
            let mut n = TelegramNotifier::new(tg.token.clone(), tg.chat_id.clone())
                .with_timeout(cfg.notify_timeout_secs);
            if let Some(base) = &tg.api_base {
                n = n.with_api_base(base.clone());
            }
            channels.push(Box::new(n));
        }
        if let Some(dc) = &cfg.discord {
            channels.push(Box::new(
                DiscordNotifier::new(dc.webhook.clone()).with_timeout(cfg.notify_timeout_secs),
            ));
        }
        if channels.is_empty() {
            tracing::warn!("no notification channel configured; changes will only be logged");
        }
        Self { channels }
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }
}

#[async_trait]
impl Notifier for NotifierMux {
    async fn send(&self, message: &str) -> Result<(), TransportError> {
        if self.channels.is_empty() {
            tracing::info!(target: "notify", "{message}");
            return Ok(());
        }
        let mut delivered = 0usize;
        for ch in &self.channels {
            match ch.send(message).await {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(channel = ch.name(), error = %e, "notification failed"),
            }
        }
        if delivered == 0 {
            return Err(TransportError::Undelivered {
                attempted: self.channels.len(),
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mux"
    }
}
