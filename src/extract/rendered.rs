// src/extract/rendered.rs
//! Rendered fetch: run a headless Chromium-family browser and read the DOM it
//! dumps after scripts ran. The whole run is bounded; on timeout the child is killed.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use super::FetchError;

/// Virtual time the browser grants page scripts before dumping the DOM.
const SCRIPT_BUDGET_MS: u64 = 5_000;
const STDERR_TAIL: usize = 300;

#[derive(Debug, Clone)]
pub struct RenderedFetcher {
    browser: String,
    user_agent: String,
    timeout: Duration,
}

impl RenderedFetcher {
    pub fn new(browser: &str, user_agent: &str, timeout: Duration) -> Self {
        Self {
            browser: browser.to_string(),
            user_agent: user_agent.to_string(),
            timeout,
        }
    }

    fn command(&self, url: &str) -> Command {
        let mut cmd = Command::new(&self.browser);
        cmd.arg("--headless")
            .arg("--disable-gpu")
            .arg(format!("--user-agent={}", self.user_agent))
            .arg(format!("--virtual-time-budget={SCRIPT_BUDGET_MS}"))
            .arg("--dump-dom")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let run = self.command(url).output();
        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(FetchError::BrowserSpawn {
                    browser: self.browser.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(FetchError::RenderTimeout {
                    url: url.to_string(),
                    secs: self.timeout.as_secs(),
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            let tail_from = stderr
                .char_indices()
                .rev()
                .nth(STDERR_TAIL)
                .map_or(0, |(i, _)| i);
            return Err(FetchError::BrowserFailed {
                url: url.to_string(),
                status: output.status.to_string(),
                stderr: stderr[tail_from..].to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
