// src/config/watch.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::extract::{ExtractSettings, DEFAULT_USER_AGENT};
use crate::source::{FetchStrategy, SelectorRule, SnapshotMode, SourceDefinition};

pub const ENV_CONFIG_PATH: &str = "WATCH_CONFIG_PATH";
pub const ENV_INTERVAL_SECS: &str = "WATCH_INTERVAL_SECS";
pub const ENV_STATE_DIR: &str = "WATCH_STATE_DIR";
pub const ENV_TELEGRAM_TOKEN: &str = "TELEGRAM_TOKEN";
pub const ENV_TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
pub const ENV_DISCORD_WEBHOOK: &str = "DISCORD_WEBHOOK_URL";

pub const DEFAULT_TOML_PATH: &str = "config/watch.toml";
pub const DEFAULT_JSON_PATH: &str = "config/watch.json";

fn default_interval_secs() -> u64 {
    900
}
fn default_state_dir() -> PathBuf {
    PathBuf::from("temp_files")
}
fn default_fetch_timeout_secs() -> u64 {
    30
}
fn default_render_timeout_secs() -> u64 {
    20
}
fn default_notify_timeout_secs() -> u64 {
    10
}
fn default_browser() -> String {
    "chromium".to_string()
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no [[source]] configured")]
    NoSources,
    #[error("interval_secs must be greater than zero")]
    ZeroInterval,
    #[error("WATCH_INTERVAL_SECS `{0}` is not a whole number of seconds")]
    BadIntervalEnv(String),
    #[error("source #{0} has an empty id")]
    EmptyId(usize),
    #[error("duplicate source id `{0}`")]
    DuplicateId(String),
    #[error("source `{id}`: filename `{filename}` must be a plain file name")]
    BadFilename { id: String, filename: String },
    #[error("sources `{first}` and `{second}` share the snapshot file `{filename}`")]
    SharedFilename {
        first: String,
        second: String,
        filename: String,
    },
    #[error("source `{id}`: url `{url}` must start with http:// or https://")]
    BadUrl { id: String, url: String },
    #[error("source `{id}`: html_tag `{tag}` is not a tag name")]
    BadTag { id: String, tag: String },
    #[error("telegram token is \"ENV\" but TELEGRAM_TOKEN is not set")]
    MissingTelegramToken,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TelegramConfig {
    /// "ENV" means: read from TELEGRAM_TOKEN
    pub token: String,
    pub chat_id: String,
    #[serde(default)]
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DiscordConfig {
    pub webhook: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    pub id: String,
    pub url: String,
    pub html_tag: String,
    #[serde(default)]
    pub html_class: String,
    pub filename: String,
    #[serde(default)]
    pub strategy: FetchStrategy,
    #[serde(default)]
    pub mode: SnapshotMode,
}

impl SourceConfig {
    pub fn definition(&self) -> SourceDefinition {
        SourceDefinition {
            id: self.id.trim().to_string(),
            url: self.url.trim().to_string(),
            selector: SelectorRule::new(self.html_tag.trim(), self.html_class.trim()),
            strategy: self.strategy,
            mode: self.mode,
            snapshot_file: self.filename.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct WatchConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// One task per source instead of strictly sequential processing.
    #[serde(default)]
    pub parallel: bool,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_render_timeout_secs")]
    pub render_timeout_secs: u64,
    /// Per-request bound for every notification channel.
    #[serde(default = "default_notify_timeout_secs")]
    pub notify_timeout_secs: u64,
    #[serde(default = "default_browser")]
    pub browser: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub metrics_addr: Option<SocketAddr>,
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub discord: Option<DiscordConfig>,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
}

impl WatchConfig {
    /// Load from an explicit path (TOML or JSON), apply env overrides, validate.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading watch config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut cfg = parse_config(&content, &ext)
            .with_context(|| format!("parsing {}", path.display()))?;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Resolution order:
    /// 1) $WATCH_CONFIG_PATH
    /// 2) config/watch.toml
    /// 3) config/watch.json
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        for candidate in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        Err(anyhow!(
            "no watch config found (set {ENV_CONFIG_PATH} or create {DEFAULT_TOML_PATH})"
        ))
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(raw) = env::var(ENV_INTERVAL_SECS) {
            if !raw.trim().is_empty() {
                self.interval_secs = raw
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::BadIntervalEnv(raw.clone()))?;
            }
        }
        if let Ok(dir) = env::var(ENV_STATE_DIR) {
            if !dir.trim().is_empty() {
                self.state_dir = PathBuf::from(dir.trim());
            }
        }

        let env_token = env::var(ENV_TELEGRAM_TOKEN).ok().filter(|v| !v.trim().is_empty());
        let env_chat = env::var(ENV_TELEGRAM_CHAT_ID).ok().filter(|v| !v.trim().is_empty());
        if let Some(tg) = self.telegram.as_mut() {
            match env_token {
                Some(token) => tg.token = token,
                None if tg.token.trim().eq_ignore_ascii_case("env") => {
                    return Err(ConfigError::MissingTelegramToken)
                }
                None => {}
            }
            if let Some(chat) = env_chat {
                tg.chat_id = chat;
            }
        } else if let (Some(token), Some(chat_id)) = (env_token, env_chat) {
            self.telegram = Some(TelegramConfig {
                token,
                chat_id,
                api_base: None,
            });
        }

        if let Ok(hook) = env::var(ENV_DISCORD_WEBHOOK) {
            if !hook.trim().is_empty() {
                self.discord = Some(DiscordConfig {
                    webhook: hook.trim().to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }
        let mut ids = HashSet::new();
        let mut files: Vec<(&str, &str)> = Vec::new();
        for (i, s) in self.sources.iter().enumerate() {
            let id = s.id.trim();
            if id.is_empty() {
                return Err(ConfigError::EmptyId(i));
            }
            if !ids.insert(id) {
                return Err(ConfigError::DuplicateId(id.to_string()));
            }
            let url = s.url.trim();
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::BadUrl {
                    id: id.to_string(),
                    url: url.to_string(),
                });
            }
            let tag = s.html_tag.trim();
            if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return Err(ConfigError::BadTag {
                    id: id.to_string(),
                    tag: tag.to_string(),
                });
            }
            let filename = s.filename.trim();
            if !is_plain_file_name(filename) {
                return Err(ConfigError::BadFilename {
                    id: id.to_string(),
                    filename: filename.to_string(),
                });
            }
            if let Some((first, _)) = files.iter().find(|(_, f)| *f == filename) {
                return Err(ConfigError::SharedFilename {
                    first: first.to_string(),
                    second: id.to_string(),
                    filename: filename.to_string(),
                });
            }
            files.push((id, filename));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn source_definitions(&self) -> Vec<SourceDefinition> {
        self.sources.iter().map(SourceConfig::definition).collect()
    }

    pub fn extract_settings(&self) -> ExtractSettings {
        ExtractSettings {
            user_agent: self.user_agent.clone(),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            browser: self.browser.clone(),
            render_timeout: Duration::from_secs(self.render_timeout_secs),
        }
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.starts_with('.')
}

fn parse_config(s: &str, hint_ext: &str) -> Result<WatchConfig> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        // Unknown extension: try TOML, then JSON.
        _ => toml::from_str(s)
            .map_err(anyhow::Error::from)
            .or_else(|_| serde_json::from_str(s).map_err(anyhow::Error::from))
            .map_err(|_| anyhow!("unsupported watch config format")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
interval_secs = 600

[[source]]
id = "funda"
url = "https://example.org/koop"
html_tag = "h2"
html_class = "search-result__header-title"
filename = "funda.txt"

[[source]]
id = "pararius"
url = "https://example.com/huur"
html_tag = "a"
html_class = "listing-search-item__link"
filename = "pararius.txt"
strategy = "rendered"
mode = "single"
"#;

    #[test]
    fn toml_defaults_and_sources() {
        let cfg = parse_config(SAMPLE, "toml").unwrap();
        assert_eq!(cfg.interval_secs, 600);
        assert_eq!(cfg.state_dir, PathBuf::from("temp_files"));
        assert_eq!(cfg.render_timeout_secs, 20);
        assert!(!cfg.parallel);
        let defs = cfg.source_definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].strategy, FetchStrategy::Plain);
        assert_eq!(defs[0].mode, SnapshotMode::Set);
        assert_eq!(defs[1].strategy, FetchStrategy::Rendered);
        assert_eq!(defs[1].mode, SnapshotMode::Single);
        assert_eq!(defs[1].selector, SelectorRule::new("a", "listing-search-item__link"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn json_is_accepted() {
        let json = r#"{"source":[{"id":"x","url":"http://a.b","html_tag":"li","html_class":"c","filename":"x.txt"}]}"#;
        let cfg = parse_config(json, "").unwrap();
        assert_eq!(cfg.interval_secs, 900);
        assert_eq!(cfg.sources[0].id, "x");
    }

    #[test]
    fn shared_snapshot_file_is_rejected() {
        let mut cfg = parse_config(SAMPLE, "toml").unwrap();
        cfg.sources[1].filename = "funda.txt".into();
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::SharedFilename {
                first: "funda".into(),
                second: "pararius".into(),
                filename: "funda.txt".into(),
            })
        );
    }

    #[test]
    fn bad_fields_are_rejected() {
        let base = parse_config(SAMPLE, "toml").unwrap();

        let mut c = base.clone();
        c.sources[0].filename = "../escape.txt".into();
        assert!(matches!(c.validate(), Err(ConfigError::BadFilename { .. })));

        let mut c = base.clone();
        c.sources[0].url = "ftp://example.org".into();
        assert!(matches!(c.validate(), Err(ConfigError::BadUrl { .. })));

        let mut c = base.clone();
        c.sources[0].html_tag = "h2.title".into();
        assert!(matches!(c.validate(), Err(ConfigError::BadTag { .. })));

        let mut c = base.clone();
        c.sources[1].id = "funda".into();
        assert_eq!(c.validate(), Err(ConfigError::DuplicateId("funda".into())));

        let mut c = base.clone();
        c.interval_secs = 0;
        assert_eq!(c.validate(), Err(ConfigError::ZeroInterval));

        let mut c = base;
        c.sources.clear();
        assert_eq!(c.validate(), Err(ConfigError::NoSources));
    }
}
