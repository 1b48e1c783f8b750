//! Headless Chromium through Playwright.
//!
//! Each session is one `node` process running a small Playwright script. The
//! script launches a browser, waits for a single navigation request on
//! stdin (`{"url", "waitUntil", "timeout"}`), prints the rendered HTML to
//! stdout and exits. Closing the session kills the process if it is still
//! alive; dropping it does too.
//!
//! Requires `node` and the `playwright` package with Chromium installed.

use super::{RenderSession, Renderer, WaitPolicy};
use crate::config::Settings;
use crate::error::FetchError;
use serde_json::json;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tracing::{debug, instrument, warn};

const SCRIPT: &str = r#"
const { chromium } = require('playwright');
const readline = require('readline');

(async () => {
  const browser = await chromium.launch({ headless: true });
  try {
    const rl = readline.createInterface({ input: process.stdin });
    const line = await new Promise((resolve) => {
      rl.once('line', resolve);
      rl.once('close', () => resolve(null));
    });
    rl.close();
    if (line === null) {
      throw new Error('no navigation request received');
    }
    const request = JSON.parse(line);
    const page = await browser.newPage();
    await page.goto(request.url, { waitUntil: request.waitUntil, timeout: request.timeout });
    process.stdout.write(await page.content());
  } catch (err) {
    process.stderr.write(String(err && err.message ? err.message : err));
    process.exitCode = 1;
  } finally {
    await browser.close();
  }
})();
"#;

#[derive(Debug, Clone)]
pub struct PlaywrightRenderer {
    node_binary: String,
}

impl PlaywrightRenderer {
    pub fn new(settings: &Settings) -> Self {
        Self {
            node_binary: settings.node_binary.clone(),
        }
    }
}

/// A running `node` + Chromium process.
#[derive(Debug)]
pub struct PlaywrightSession {
    child: Child,
}

impl Renderer for PlaywrightRenderer {
    type Session = PlaywrightSession;

    async fn open(&self) -> Result<PlaywrightSession, FetchError> {
        let child = Command::new(&self.node_binary)
            .arg("-e")
            .arg(SCRIPT)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FetchError::Session(format!("cannot start {}: {e}", self.node_binary)))?;
        debug!(pid = ?child.id(), "Started Playwright session");
        Ok(PlaywrightSession { child })
    }
}

fn session_used() -> FetchError {
    FetchError::Session("session already navigated".into())
}

impl RenderSession for PlaywrightSession {
    #[instrument(level = "debug", skip_all, fields(%url, wait = wait.as_str()))]
    async fn navigate(&mut self, url: &str, wait: WaitPolicy, timeout: Duration) -> Result<String, FetchError> {
        let request = json!({
            "url": url,
            "waitUntil": wait.as_str(),
            "timeout": timeout.as_millis() as u64,
        });

        let mut stdin = self.child.stdin.take().ok_or_else(session_used)?;
        let mut stdout = self.child.stdout.take().ok_or_else(session_used)?;
        let mut stderr = self.child.stderr.take().ok_or_else(session_used)?;

        let line = format!("{request}\n");
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| FetchError::Session(format!("cannot send request: {e}")))?;
        drop(stdin);

        let mut html = String::new();
        let mut diagnostics = String::new();
        let (out, err) = tokio::join!(
            stdout.read_to_string(&mut html),
            stderr.read_to_string(&mut diagnostics)
        );
        out.map_err(|e| FetchError::Navigation(format!("cannot read page: {e}")))?;
        if let Err(e) = err {
            debug!(error = %e, "Could not read renderer diagnostics");
        }

        let status = self
            .child
            .wait()
            .await
            .map_err(|e| FetchError::Session(e.to_string()))?;
        if !status.success() {
            let reason = diagnostics.trim();
            return Err(FetchError::Navigation(if reason.is_empty() {
                format!("renderer exited with {status}")
            } else {
                reason.to_string()
            }));
        }
        Ok(html)
    }

    async fn close(mut self) {
        match self.child.try_wait() {
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => {
                if let Err(e) = self.child.kill().await {
                    warn!(error = %e, "Could not stop Playwright session");
                }
            }
        }
    }
}
